// src/extractors/address.rs
//! Address validation and icon-reference derivation
//!
//! The validation heuristic is loose: any whitespace-free text with a dot
//! counts as an address. Bare domains typed into the omnibox are kept and
//! free-text searches are dropped, but version strings and file names slip
//! through as well.

/// Prefix shared by the URL schemes browsers show in the address bar.
pub const URL_SCHEME_PREFIX: &str = "http";

/// Prefix of a scheme-less `www.` address.
pub const BARE_WWW_PREFIX: &str = "www";

/// Default third-party icon-fetch endpoint; the domain is appended.
pub const DEFAULT_ICON_SERVICE: &str = "https://www.google.com/s2/favicons?domain=";

/// Whether `candidate` plausibly is a web address.
pub fn is_valid_address(candidate: &str) -> bool {
    candidate.contains('.')
        && (candidate.starts_with(URL_SCHEME_PREFIX)
            || candidate.starts_with(BARE_WWW_PREFIX)
            || !candidate.chars().any(char::is_whitespace))
}

/// Extract the host part of `address`, falling back to the raw value.
pub fn icon_domain(address: &str) -> &str {
    parse_domain(address).unwrap_or(address)
}

fn parse_domain(address: &str) -> Option<&str> {
    let rest = if address.starts_with(URL_SCHEME_PREFIX) {
        address.split_once("//")?.1
    } else {
        address
    };
    rest.split('/').next().filter(|domain| !domain.is_empty())
}

/// Build the icon-fetch URL for `address` against `icon_service`.
pub fn derive_icon_reference(address: &str, icon_service: &str) -> String {
    format!("{}{}", icon_service, urlencoding::encode(icon_domain(address)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_addresses() {
        assert!(is_valid_address("example.com/path"));
        assert!(is_valid_address("http://a.b"));
        assert!(is_valid_address("https://news.example.com/a b"));
        assert!(is_valid_address("www.a.b"));
        assert!(is_valid_address("www.a.b with words"));
    }

    #[test]
    fn rejects_search_text() {
        assert!(!is_valid_address("search text"));
        assert!(!is_valid_address("search query text"));
        assert!(!is_valid_address("what is rust. a language"));
        assert!(!is_valid_address("localhost"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn keeps_loose_heuristic_for_dotted_tokens() {
        assert!(is_valid_address("v1.2.3"));
        assert!(is_valid_address("notes.txt"));
    }

    #[test]
    fn domain_from_scheme_address() {
        assert_eq!(icon_domain("https://news.example.com/a/b"), "news.example.com");
        assert_eq!(icon_domain("http://a.b"), "a.b");
    }

    #[test]
    fn domain_from_bare_address() {
        assert_eq!(icon_domain("example.com/a"), "example.com");
        assert_eq!(icon_domain("www.rust-lang.org"), "www.rust-lang.org");
    }

    #[test]
    fn malformed_input_falls_back_to_raw_value() {
        assert_eq!(icon_domain("httpbin.org"), "httpbin.org");
        assert_eq!(icon_domain("https:///path"), "https:///path");
        assert_eq!(icon_domain("/leading/slash"), "/leading/slash");
    }

    #[test]
    fn icon_reference_appends_encoded_domain() {
        assert_eq!(
            derive_icon_reference("https://news.example.com/a/b", DEFAULT_ICON_SERVICE),
            "https://www.google.com/s2/favicons?domain=news.example.com"
        );
        assert_eq!(
            derive_icon_reference("localhost.dev:8080/x", DEFAULT_ICON_SERVICE),
            "https://www.google.com/s2/favicons?domain=localhost.dev%3A8080"
        );
    }
}
