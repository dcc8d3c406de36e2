use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{AllowList, PolicyOverride, SanitizerConfig};
use crate::render::RenderOptions;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid render configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid wildcard '{0}': the only wildcard is \"*\"")]
    InvalidWildcard(String),
}

/// Data-only form of [`RenderOptions`], as read from JSON.
///
/// ```json
/// {
///   "allowedTags": { "augment": ["section"] },
///   "allowedLinkProtocols": { "override": "*" },
///   "trusted": true
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tags: Option<ListConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_attributes: Option<ListConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_link_protocols: Option<ListConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_media_protocols: Option<ListConfig>,
    pub replace_with_plaintext: bool,
    pub trusted: bool,
    pub allow_data_images: bool,
    pub streaming: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListConfig {
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub replace: Option<ListValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub augment: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListValue {
    Items(Vec<String>),
    /// Must be `"*"`.
    Wildcard(String),
}

impl RenderConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_options(self) -> ConfigResult<RenderOptions> {
        let sanitizer = SanitizerConfig {
            allowed_tags: resolve_list(self.allowed_tags)?,
            allowed_attributes: resolve_list(self.allowed_attributes)?,
            allowed_link_protocols: resolve_list(self.allowed_link_protocols)?,
            allowed_media_protocols: resolve_list(self.allowed_media_protocols)?,
            replace_with_plaintext: self.replace_with_plaintext,
            ..SanitizerConfig::default()
        };
        Ok(RenderOptions {
            trusted: self.trusted,
            allow_data_images: self.allow_data_images,
            streaming: self.streaming,
            sanitizer,
        })
    }
}

/// Parses a JSON render configuration straight into options.
pub fn parse_render_options(json: &str) -> ConfigResult<RenderOptions> {
    RenderConfig::from_json(json)?.into_options()
}

fn resolve_list(list: Option<ListConfig>) -> ConfigResult<Option<PolicyOverride>> {
    let Some(list) = list else {
        return Ok(None);
    };
    let replace = match list.replace {
        None => None,
        Some(ListValue::Items(items)) => Some(AllowList::only(items)),
        Some(ListValue::Wildcard(value)) if value == "*" => Some(AllowList::All),
        Some(ListValue::Wildcard(value)) => return Err(ConfigError::InvalidWildcard(value)),
    };
    Ok(Some(PolicyOverride {
        replace,
        augment: list.augment,
    }))
}
