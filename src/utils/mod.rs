//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the entity id from a catalog link.
///
/// Links look like `/{kind}/{id}/{slug}/`, either site-relative or absolute.
pub fn entity_id_from_href(href: &str) -> Option<String> {
    let path = if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).ok()?.path().to_string()
    } else {
        href.to_string()
    };

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .nth(1)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.1001tracklists.com/").unwrap();
        assert_eq!(
            resolve_url(&base, "track/abc/"),
            "https://www.1001tracklists.com/track/abc/"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_entity_id_from_href() {
        assert_eq!(
            entity_id_from_href("/track/abc1/artist-song/"),
            Some("abc1".to_string())
        );
        assert_eq!(
            entity_id_from_href("https://www.1001tracklists.com/artist/x9/dj/"),
            Some("x9".to_string())
        );
        assert_eq!(entity_id_from_href("/track/"), None);
        assert_eq!(entity_id_from_href(""), None);
    }
}
