//! Participant identifier extraction.
//!
//! QR codes in the field carry either a bare participant id or a link to the
//! attendance endpoint with the id in its query string. Older badges encode
//! the whole link as the identifier, so a URL without a recognised parameter
//! is passed through unchanged.

use url::Url;

/// Query parameters that may carry the participant id, in priority order.
pub const ID_PARAMS: [&str; 3] = ["id", "uid", "participantId"];

/// Normalize a raw scan payload into a canonical participant identifier.
///
/// Never fails: anything that does not parse as an absolute URL is treated
/// as an identifier already.
///
/// # Examples
///
/// ```
/// use rollcall::extract_id;
///
/// assert_eq!(extract_id("https://host/exec?id=42&other=1"), "42");
/// assert_eq!(extract_id("  plain123 "), "plain123");
/// ```
#[must_use]
pub fn extract_id(raw: &str) -> String {
    let mut candidate = raw.trim().to_string();

    // A parameter value can itself be a link; unwrap until nothing changes so
    // that extracting twice yields the same identifier.
    while let Some(inner) = id_param(&candidate) {
        candidate = inner.trim().to_string();
    }

    candidate
}

/// Look up the first non-blank id parameter of a hierarchical URL.
fn id_param(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;

    // `Url::parse` accepts any `scheme:rest`, so "id:5" would count as a URL.
    // Only hierarchical links are worth inspecting.
    if url.cannot_be_a_base() {
        return None;
    }

    ID_PARAMS.iter().find_map(|name| {
        url.query_pairs()
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id_param() {
        assert_eq!(extract_id("https://host/exec?id=42&other=1"), "42");
    }

    #[test]
    fn test_extract_uid_param() {
        assert_eq!(extract_id("https://host/exec?uid=7"), "7");
    }

    #[test]
    fn test_extract_participant_id_param() {
        assert_eq!(extract_id("https://host/exec?participantId=P-9"), "P-9");
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(extract_id("https://host/exec?participantId=3&uid=2&id=1"), "1");
        assert_eq!(extract_id("https://host/exec?participantId=3&uid=2"), "2");
    }

    #[test]
    fn test_empty_param_falls_through() {
        assert_eq!(extract_id("https://host/exec?id=&uid=8"), "8");
    }

    #[test]
    fn test_blank_param_falls_through() {
        assert_eq!(extract_id("https://host/exec?id=%20&uid=8"), "8");
        assert_eq!(extract_id("https://host/exec?id=+&uid=%09&participantId=9"), "9");
        assert_eq!(
            extract_id("https://host/exec?id=%20%20"),
            "https://host/exec?id=%20%20"
        );
    }

    #[test]
    fn test_url_without_id_returns_trimmed_url() {
        assert_eq!(
            extract_id("  https://host/badge/abc?x=1  "),
            "https://host/badge/abc?x=1"
        );
    }

    #[test]
    fn test_plain_identifier() {
        assert_eq!(extract_id("plain123"), "plain123");
        assert_eq!(extract_id("  plain123\n"), "plain123");
    }

    #[test]
    fn test_text_with_id_fragment_is_unchanged() {
        let input = "not a url but has id=5 in text";
        assert_eq!(extract_id(input), input);
    }

    #[test]
    fn test_opaque_scheme_is_not_inspected() {
        assert_eq!(extract_id("id:5"), "id:5");
        assert_eq!(extract_id("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn test_percent_encoded_value_is_decoded() {
        assert_eq!(extract_id("https://host/exec?id=A%20B"), "A B");
    }

    #[test]
    fn test_nested_link_is_unwrapped() {
        assert_eq!(
            extract_id("https://host/exec?id=https%3A%2F%2Fother%2F%3Fid%3D9"),
            "9"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_id(""), "");
        assert_eq!(extract_id("   "), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://host/exec?id=42&other=1",
            "https://host/exec?uid=7",
            "https://host/badge/abc",
            "plain123",
            "  padded  ",
            "not a url but has id=5 in text",
            "https://host/exec?id=https%3A%2F%2Fother%2F%3Fid%3D9",
            "",
        ];
        for input in inputs {
            let once = extract_id(input);
            assert_eq!(extract_id(&once), once, "not idempotent for {input:?}");
        }
    }
}
