use ammonia::Url;
use once_cell::sync::Lazy;

use crate::policy::AllowList;

/// Base that relative references resolve against. Its scheme is never in a
/// default allow-list, so relative URLs only pass when a caller allows it.
pub const NEUTRAL_BASE: &str = "relative-path://safemark/";

static BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse(NEUTRAL_BASE).ok());

/// Which protocol allow-list governs an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UriKind {
    /// Navigational attributes such as `href`.
    Link,
    /// Embedded resources such as `src`.
    Media,
}

pub fn uri_kind(attr: &str) -> Option<UriKind> {
    match attr {
        "href" => Some(UriKind::Link),
        "src" | "poster" => Some(UriKind::Media),
        _ => None,
    }
}

/// In-document navigation (`#section`), exempt from scheme checks.
pub fn is_fragment_link(value: &str) -> bool {
    value.starts_with('#')
}

/// Lowercase scheme of `uri` after resolving it against [`NEUTRAL_BASE`].
pub fn scheme_of(uri: &str) -> Option<String> {
    let base = BASE.as_ref()?;
    let url = base.join(uri).ok()?;
    Some(url.scheme().trim_end_matches(':').to_ascii_lowercase())
}

pub fn is_allowed_scheme(uri: &str, allowed: &AllowList) -> bool {
    match allowed {
        AllowList::All => true,
        AllowList::Only(schemes) => scheme_of(uri).is_some_and(|scheme| schemes.contains(&scheme)),
    }
}

#[cfg(test)]
mod tests {
    use super::{is_allowed_scheme, is_fragment_link, scheme_of};
    use crate::policy::AllowList;

    fn web() -> AllowList {
        AllowList::only(["http", "https"])
    }

    #[test]
    fn network_schemes_pass() {
        assert!(is_allowed_scheme("https://example.com/a", &web()));
        assert!(is_allowed_scheme("HTTP://EXAMPLE.COM", &web()));
    }

    #[test]
    fn script_and_data_schemes_fail() {
        assert!(!is_allowed_scheme("javascript:alert(1)", &web()));
        assert!(!is_allowed_scheme(" java\tscript:alert(1)", &web()));
        assert!(!is_allowed_scheme("data:image/png;base64,AAAA", &web()));
    }

    #[test]
    fn relative_references_resolve_to_the_neutral_scheme() {
        assert_eq!(scheme_of("docs/readme.md").as_deref(), Some("relative-path"));
        assert!(!is_allowed_scheme("docs/readme.md", &web()));
        assert!(is_allowed_scheme(
            "docs/readme.md",
            &AllowList::only(["relative-path"])
        ));
    }

    #[test]
    fn wildcard_allows_anything() {
        assert!(is_allowed_scheme("javascript:alert(1)", &AllowList::All));
        assert!(is_allowed_scheme("::not a url::", &AllowList::All));
    }

    #[test]
    fn fragments_are_detected() {
        assert!(is_fragment_link("#heading"));
        assert!(!is_fragment_link("page#heading"));
    }
}
