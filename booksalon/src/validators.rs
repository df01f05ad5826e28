use std::sync::LazyLock;

use email_address::EmailAddress;
use regex::Regex;
use url::Url;

static ISBN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]{9}[0-9Xx](?:[0-9]{13})?|[0-9]{13})$").expect("valid isbn pattern")
});

static DOCUMENT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{1,64}$").expect("valid key pattern"));

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Accepts ISBN-10, ISBN-13, or the two concatenated as the book API returns them
/// once whitespace is stripped.
pub fn is_valid_isbn(value: &str) -> bool {
    ISBN_PATTERN.is_match(value)
}

/// A value usable as a document id and inside a store key: ascii letters,
/// digits, `-` and `_`, at most 64 characters.
pub fn is_valid_document_key(value: &str) -> bool {
    DOCUMENT_KEY_PATTERN.is_match(value)
}

/// Removes every whitespace character from an ISBN field.
pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("reader@example.com"));
        assert!(!is_valid_email("invalid"));
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://example.com/cover.jpg"));
        assert!(!is_valid_url("not-a-url"));
    }

    #[test]
    fn isbn_validation() {
        assert!(is_valid_isbn("8996991341"));
        assert!(is_valid_isbn("9788996991342"));
        assert!(is_valid_isbn(&strip_whitespace("8996991341 9788996991342")));
        assert!(is_valid_isbn("899699134X"));
        assert!(!is_valid_isbn("12-34"));
        assert!(!is_valid_isbn("X996991341"));
        assert!(!is_valid_isbn("978899699134X"));
        assert!(!is_valid_isbn(&strip_whitespace("8996991341 978899699X342")));
    }

    #[test]
    fn document_key_validation() {
        assert!(is_valid_document_key("123"));
        assert!(is_valid_document_key("9788996991342"));
        assert!(!is_valid_document_key(""));
        assert!(!is_valid_document_key("a/b"));
        assert!(!is_valid_document_key("a:b"));
    }
}
