//! URL canonicalization (spec §4.3).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use url::Url;

static TRACKING_PARAMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "fbclid",
        "gclid",
        "msclkid",
        "mc_cid",
        "mc_eid",
        "ref",
        "_hsenc",
        "_hsmi",
        "igshid",
    ]
    .into_iter()
    .collect()
});

/// Rejects anything that isn't `http`/`https` (spec §8 scenario S3: a
/// `file://` document must be rejected with a validation error). Unparseable
/// URLs are rejected too rather than silently falling through to `normalize`.
pub fn require_http_scheme(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("url could not be parsed: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme `{other}`; only http and https are indexed")),
    }
}

/// Lowercase the host, strip the fragment, optionally strip tracking query
/// params. Preserves scheme, port, path and query order. Falls back to the
/// original input on parse failure — never panics, never rejects a URL the
/// webhook router already accepted.
pub fn normalize(url: &str, strip_tracking_params: bool) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_ascii_lowercase();
        if lowered != host {
            let _ = parsed.set_host(Some(&lowered));
        }
    }
    parsed.set_fragment(None);

    if strip_tracking_params {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(k.to_ascii_lowercase().as_str()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            let query = kept
                .iter()
                .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
                .collect::<Vec<_>>()
                .join("&");
            parsed.set_query(Some(&query));
        }
    }

    parsed.to_string()
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_host_and_strips_fragment() {
        let out = normalize("https://EXAMPLE.com/Path#section", false);
        assert_eq!(out, "https://example.com/Path");
    }

    #[test]
    fn strips_tracking_params_when_enabled() {
        let out = normalize("https://example.com/a?utm_source=x&keep=1", true);
        assert_eq!(out, "https://example.com/a?keep=1");
    }

    #[test]
    fn preserves_tracking_params_when_disabled() {
        let out = normalize("https://example.com/a?utm_source=x", false);
        assert_eq!(out, "https://example.com/a?utm_source=x");
    }

    #[test]
    fn preserves_port_and_trailing_slash() {
        let out = normalize("https://example.com:8443/path/", false);
        assert_eq!(out, "https://example.com:8443/path/");
    }

    #[test]
    fn falls_back_to_original_on_parse_failure() {
        let out = normalize("not a url at all", true);
        assert_eq!(out, "not a url at all");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("https://EXAMPLE.com/a?utm_source=x&keep=1#frag", true);
        let twice = normalize(&once, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(require_http_scheme("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(require_http_scheme("not a url at all").is_err());
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(require_http_scheme("http://example.com/a").is_ok());
        assert!(require_http_scheme("https://example.com/a").is_ok());
    }
}
