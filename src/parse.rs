use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use serde::Deserialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AnalyzerError;

static CREATED_AT_FORMAT: &[FormatItem<'_>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
);

static DISPLAY_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Parse the `created_at` field of a status, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub fn parse_created_at(created_at: &str) -> Result<OffsetDateTime, AnalyzerError> {
    OffsetDateTime::parse(created_at, CREATED_AT_FORMAT)
        .map(|t| t.to_offset(UtcOffset::UTC))
        .map_err(|e| AnalyzerError::Parse(format!("created_at {created_at:?}: {e}")))
}

pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(DISPLAY_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// The `source` field is an HTML anchor around the client name.
/// Returns the visible text, or the input itself when it holds no markup.
pub fn parse_source_text(source: &str) -> String {
    static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

    let fragment = Html::parse_fragment(source);
    let text: String = match fragment.select(&ANCHOR_SELECTOR).next() {
        Some(anchor) => anchor.text().collect(),
        None => fragment.root_element().text().collect(),
    };
    text.trim().to_owned()
}

/// Network location of a link with any leading `www.` removed.
///
/// Hosts come back lowercased and in their ASCII (punycode) form.
pub fn parse_url_domain(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    match url.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_owned()),
    }
}

/// Accepts `name` or `@name` and returns the bare screen name.
pub fn parse_screen_name(input: &str) -> Result<String, AnalyzerError> {
    static SCREEN_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@?(\w{1,15})$").unwrap());

    let caps = SCREEN_NAME_RE
        .captures(input.trim())
        .ok_or_else(|| AnalyzerError::InvalidScreenName(input.to_owned()))?;
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    if !name.is_ascii() {
        return Err(AnalyzerError::InvalidScreenName(input.to_owned()));
    }
    Ok(name.to_owned())
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Extract a readable message from a Twitter error body, falling back to the raw text.
pub fn parse_api_error(status: u16, body: &str) -> AnalyzerError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} (code {code})", e.message),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ => body.trim().to_owned(),
    };
    AnalyzerError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn created_at_is_utc() {
        let t = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(t, datetime!(2018-10-10 20:19:24 UTC));
    }

    #[test]
    fn created_at_with_offset_is_normalised() {
        let t = parse_created_at("Wed Oct 10 22:19:24 +0200 2018").unwrap();
        assert_eq!(t.offset(), UtcOffset::UTC);
        assert_eq!(t.hour(), 20);
    }

    #[test]
    fn created_at_rejects_garbage() {
        assert!(parse_created_at("2018-10-10T20:19:24Z").is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(
            format_timestamp(datetime!(2018-10-10 20:19:24 UTC)),
            "2018-10-10 20:19:24"
        );
    }

    #[test]
    fn source_anchor_text() {
        let source =
            r#"<a href="http://twitter.com/download/android" rel="nofollow">Twitter for Android</a>"#;
        assert_eq!(parse_source_text(source), "Twitter for Android");
    }

    #[test]
    fn source_plain_text() {
        assert_eq!(parse_source_text("web"), "web");
        assert_eq!(parse_source_text("WebClient"), "WebClient");
    }

    #[test]
    fn url_domain_strips_www() {
        assert_eq!(
            parse_url_domain("https://www.example.com/page?q=1").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            parse_url_domain("http://blog.example.org").as_deref(),
            Some("blog.example.org")
        );
    }

    #[test]
    fn url_domain_keeps_explicit_port() {
        assert_eq!(
            parse_url_domain("http://www.example.com:8080/x").as_deref(),
            Some("example.com:8080")
        );
    }

    #[test]
    fn url_domain_only_strips_leading_www() {
        assert_eq!(
            parse_url_domain("https://wwwexample.com").as_deref(),
            Some("wwwexample.com")
        );
        assert_eq!(
            parse_url_domain("https://www.www.example.com").as_deref(),
            Some("www.example.com")
        );
    }

    #[test]
    fn url_domain_uses_ascii_form_of_unicode_hosts() {
        assert_eq!(
            parse_url_domain("https://www.münchen.de/x").as_deref(),
            Some("xn--mnchen-3ya.de")
        );
        assert_eq!(
            parse_url_domain("https://xn--mnchen-3ya.de/y").as_deref(),
            Some("xn--mnchen-3ya.de")
        );
    }

    #[test]
    fn url_domain_rejects_relative() {
        assert_eq!(parse_url_domain("/relative/path"), None);
        assert_eq!(parse_url_domain("mailto:someone@example.com"), None);
    }

    #[test]
    fn screen_name_variants() {
        assert_eq!(parse_screen_name("jack").unwrap(), "jack");
        assert_eq!(parse_screen_name("@jack").unwrap(), "jack");
        assert_eq!(parse_screen_name(" Rust_Lang ").unwrap(), "Rust_Lang");
    }

    #[test]
    fn screen_name_rejects_invalid() {
        assert!(parse_screen_name("").is_err());
        assert!(parse_screen_name("has space").is_err());
        assert!(parse_screen_name("abcdefghijklmnop").is_err());
        assert!(parse_screen_name("naïve").is_err());
    }

    #[test]
    fn api_error_from_errors_array() {
        let body = r#"{"errors":[{"code":50,"message":"User not found."}]}"#;
        match parse_api_error(404, body) {
            AnalyzerError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "User not found. (code 50)");
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn api_error_from_plain_body() {
        match parse_api_error(401, "Not authorized.\n") {
            AnalyzerError::Api { message, .. } => assert_eq!(message, "Not authorized."),
            e => panic!("unexpected error {e:?}"),
        }
    }
}
