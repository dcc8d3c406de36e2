use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::protocol::UriKind;
use crate::sanitizer::ElementView;

/// Tags kept by default: inline and block markup, tables and media. The only
/// form control is `input`, which the built-in element rule narrows to
/// disabled checkboxes.
pub const DEFAULT_TAGS: &[&str] = &[
    "a",
    "abbr",
    "b",
    "bdo",
    "blockquote",
    "br",
    "caption",
    "cite",
    "code",
    "col",
    "colgroup",
    "dd",
    "del",
    "details",
    "dfn",
    "div",
    "dl",
    "dt",
    "em",
    "figcaption",
    "figure",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "img",
    "input",
    "ins",
    "kbd",
    "label",
    "li",
    "mark",
    "ol",
    "p",
    "pre",
    "q",
    "rp",
    "rt",
    "ruby",
    "s",
    "samp",
    "small",
    "source",
    "span",
    "strike",
    "strong",
    "sub",
    "summary",
    "sup",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "time",
    "tr",
    "tt",
    "u",
    "ul",
    "var",
    "video",
    "wbr",
];

pub const DEFAULT_ATTRIBUTES: &[&str] = &[
    "align", "alt", "checked", "class", "colspan", "controls", "disabled", "height", "href",
    "poster", "rowspan", "src", "start", "style", "target", "title", "type", "width",
];

pub const DEFAULT_LINK_PROTOCOLS: &[&str] = &["http", "https"];
pub const DEFAULT_MEDIA_PROTOCOLS: &[&str] = &["http", "https"];

/// Link scheme that invokes host commands; only allowed for trusted content.
pub const COMMAND_SCHEME: &str = "command";
/// Inline media scheme, allowed only on explicit opt-in.
pub const DATA_SCHEME: &str = "data";

/// A set of permitted names (tags, attributes or URI schemes), or the
/// wildcard that permits everything. Names are stored in lowercase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AllowList {
    All,
    Only(BTreeSet<String>),
}

impl AllowList {
    pub fn only<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Only(
            items
                .into_iter()
                .map(|item| item.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(items) => items.contains(&name.to_ascii_lowercase()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Appends `items`. The wildcard already covers them.
    pub fn augment<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Self::Only(current) = self {
            current.extend(items.into_iter().map(|item| item.as_ref().to_ascii_lowercase()));
        }
    }
}

/// Caller adjustment of one allow-list: `replace` swaps the list out, then
/// `augment` is appended to whatever the list holds.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PolicyOverride {
    pub replace: Option<AllowList>,
    pub augment: Vec<String>,
}

impl PolicyOverride {
    pub fn replace(list: AllowList) -> Self {
        Self {
            replace: Some(list),
            augment: Vec::new(),
        }
    }

    pub fn augment<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replace: None,
            augment: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and_augment<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.augment.extend(items.into_iter().map(Into::into));
        self
    }

    fn apply(&self, list: &mut AllowList) {
        if let Some(replacement) = &self.replace {
            *list = replacement.clone();
        }
        list.augment(&self.augment);
    }
}

/// Verdict of an attribute hook.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HookDecision {
    Keep,
    Remove,
    /// Keep the attribute with a new value.
    Replace(String),
}

impl From<bool> for HookDecision {
    fn from(keep: bool) -> Self {
        if keep { Self::Keep } else { Self::Remove }
    }
}

/// Called as `hook(tag, attribute, value)` for every allow-listed attribute.
pub type AttributeHook = Arc<dyn Fn(&str, &str, &str) -> HookDecision + Send + Sync>;
/// Called as `hook(tag, element)`; returning `false` rejects the element.
pub type ElementHook = Arc<dyn Fn(&str, &ElementView<'_>) -> bool + Send + Sync>;

/// Partial configuration merged onto the defaults by every sanitize call.
#[derive(Clone, Default)]
pub struct SanitizerConfig {
    pub allowed_tags: Option<PolicyOverride>,
    pub allowed_attributes: Option<PolicyOverride>,
    pub allowed_link_protocols: Option<PolicyOverride>,
    pub allowed_media_protocols: Option<PolicyOverride>,
    pub attribute_hook: Option<AttributeHook>,
    pub element_hook: Option<ElementHook>,
    pub replace_with_plaintext: bool,
}

impl SanitizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str, &str) -> HookDecision + Send + Sync + 'static,
    {
        self.attribute_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_element_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &ElementView<'_>) -> bool + Send + Sync + 'static,
    {
        self.element_hook = Some(Arc::new(hook));
        self
    }

    /// Appends `items` to the augment list of an override slot, creating it
    /// when absent.
    pub(crate) fn augment_slot(slot: &mut Option<PolicyOverride>, items: &[&str]) {
        slot.get_or_insert_with(PolicyOverride::default)
            .augment
            .extend(items.iter().map(|item| item.to_string()));
    }
}

impl fmt::Debug for SanitizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizerConfig")
            .field("allowed_tags", &self.allowed_tags)
            .field("allowed_attributes", &self.allowed_attributes)
            .field("allowed_link_protocols", &self.allowed_link_protocols)
            .field("allowed_media_protocols", &self.allowed_media_protocols)
            .field("attribute_hook", &self.attribute_hook.is_some())
            .field("element_hook", &self.element_hook.is_some())
            .field("replace_with_plaintext", &self.replace_with_plaintext)
            .finish()
    }
}

/// Fully resolved allow-lists for one sanitize call. Hooks are not part of
/// the policy; the engine registers them for the duration of the call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SanitizerPolicy {
    pub tags: AllowList,
    pub attributes: AllowList,
    pub link_protocols: AllowList,
    pub media_protocols: AllowList,
    pub replace_with_plaintext: bool,
}

impl SanitizerPolicy {
    pub fn defaults() -> Self {
        Self {
            tags: AllowList::only(DEFAULT_TAGS),
            attributes: AllowList::only(DEFAULT_ATTRIBUTES),
            link_protocols: AllowList::only(DEFAULT_LINK_PROTOCOLS),
            media_protocols: AllowList::only(DEFAULT_MEDIA_PROTOCOLS),
            replace_with_plaintext: false,
        }
    }

    /// Merges `config` onto the defaults: replacements first, then augments.
    pub fn resolve(config: &SanitizerConfig) -> Self {
        let mut policy = Self::defaults();
        let slots = [
            (&config.allowed_tags, &mut policy.tags),
            (&config.allowed_attributes, &mut policy.attributes),
            (&config.allowed_link_protocols, &mut policy.link_protocols),
            (&config.allowed_media_protocols, &mut policy.media_protocols),
        ];
        for (adjustment, list) in slots {
            if let Some(adjustment) = adjustment {
                adjustment.apply(list);
            }
        }
        policy.replace_with_plaintext = config.replace_with_plaintext;
        policy
    }

    pub fn protocols_for(&self, kind: UriKind) -> &AllowList {
        match kind {
            UriKind::Link => &self.link_protocols,
            UriKind::Media => &self.media_protocols,
        }
    }
}

static SPAN_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(color:(#[0-9a-fA-F]+|var\(--theme(-[a-zA-Z0-9]+)+\));)?",
        r"(background-color:(#[0-9a-fA-F]+|var\(--theme(-[a-zA-Z0-9]+)+\));)?",
        r"(border-radius:[0-9]+px;)?$",
    ))
    .expect("valid regex")
});

static SPAN_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^icon icon-[a-z\-]+( icon-modifier-[a-z\-]+)?$")
        .expect("valid regex")
});

/// Attribute rules applied when the caller has no attribute hook.
///
/// Theme colors and icon classes survive on `span`; task checkboxes keep only
/// their state. Everything else that reached this point is kept.
pub fn markdown_attribute_policy(
    tag: &str,
    attr: &str,
    value: &str,
    checkbox: bool,
) -> HookDecision {
    if tag == "input" && checkbox {
        let keep = match attr {
            "type" => value.eq_ignore_ascii_case("checkbox"),
            "disabled" | "checked" => true,
            _ => false,
        };
        return keep.into();
    }
    match attr {
        "style" => (tag == "span" && SPAN_STYLE.is_match(value)).into(),
        "class" => (tag == "span" && SPAN_CLASS.is_match(value)).into(),
        _ => HookDecision::Keep,
    }
}
