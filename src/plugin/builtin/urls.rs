//! URL sanitizing shared by the built-in producers

use std::collections::HashSet;

use url::{form_urlencoded, Url};

/// Strip query parameters not in `allow_params` (all of them when the set is
/// empty) and optionally the fragment. Relative and unparseable input gets the
/// same treatment on its raw `path?query#fragment` form.
pub fn sanitize_url(raw: &str, allow_params: &HashSet<String>, keep_hash: bool) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let Ok(mut url) = Url::parse(raw) else {
        return sanitize_relative(raw, allow_params, keep_hash);
    };

    let kept = allowed_pairs(url.query().unwrap_or_default(), allow_params);
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    if !keep_hash {
        url.set_fragment(None);
    }
    url.to_string()
}

fn sanitize_relative(raw: &str, allow_params: &HashSet<String>, keep_hash: bool) -> String {
    let (rest, fragment) = match raw.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (raw, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    let mut out = path.to_string();
    let kept = allowed_pairs(query, allow_params);
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&form_urlencoded::Serializer::new(String::new()).extend_pairs(kept).finish());
    }
    if let Some(fragment) = fragment.filter(|_| keep_hash) {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn allowed_pairs(query: &str, allow_params: &HashSet<String>) -> Vec<(String, String)> {
    if allow_params.is_empty() {
        return Vec::new();
    }
    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| allow_params.contains(key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(params: &[&str]) -> HashSet<String> {
        params.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_strips_all_query_by_default() {
        let url = sanitize_url("https://app.example.com/a?token=secret&x=1#top", &allow(&[]), true);
        assert_eq!(url, "https://app.example.com/a#top");
    }

    #[test]
    fn test_keeps_only_allowed_params() {
        let url = sanitize_url("https://app.example.com/a?token=secret&tab=2&q=x", &allow(&["tab", "q"]), true);
        assert_eq!(url, "https://app.example.com/a?tab=2&q=x");
    }

    #[test]
    fn test_drops_fragment_when_asked() {
        let url = sanitize_url("https://app.example.com/a#section", &allow(&[]), false);
        assert_eq!(url, "https://app.example.com/a");
    }

    #[test]
    fn test_relative_url_loses_query() {
        assert_eq!(sanitize_url("/checkout?token=secret#x", &allow(&[]), true), "/checkout#x");
        assert_eq!(sanitize_url("/checkout?token=secret#x", &allow(&[]), false), "/checkout");
        assert_eq!(sanitize_url("?token=secret", &allow(&[]), true), "");
    }

    #[test]
    fn test_relative_url_keeps_allowed_params() {
        let url = sanitize_url("cart?token=secret&tab=2", &allow(&["tab"]), true);
        assert_eq!(url, "cart?tab=2");
    }

    #[test]
    fn test_plain_text_without_query_unchanged() {
        assert_eq!(sanitize_url("not a url", &allow(&[]), true), "not a url");
        assert_eq!(sanitize_url("", &allow(&[]), true), "");
    }
}
