//! Cache key construction.
//!
//! Keys are `METHOD:path` with a `?`-prefixed query string whose parameters
//! are sorted alphabetically by name, so `a=1&b=2` and `b=2&a=1` resolve to
//! the same key.

/// Query parameter name that forces the cache to be skipped entirely.
pub const BYPASS_PARAM: &str = "nocache";

/// Builds the cache key for a request. `query` is the raw query string
/// without the leading `?` (may be empty).
pub fn cache_key(method: &str, path: &str, query: &str) -> String {
    if query.is_empty() {
        return format!("{}:{}", method, path);
    }

    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    if pairs.is_empty() {
        return format!("{}:{}", method, path);
    }
    pairs.sort_unstable_by_key(|pair| param_name(pair));

    format!("{}:{}?{}", method, path, pairs.join("&"))
}

/// True when the query string carries the `nocache` bypass flag.
pub fn has_bypass_flag(query: &str) -> bool {
    query
        .split('&')
        .any(|pair| param_name(pair) == BYPASS_PARAM)
}

fn param_name(pair: &str) -> &str {
    pair.split_once('=').map(|(name, _)| name).unwrap_or(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_without_query_omits_question_mark() {
        assert_eq!(cache_key("GET", "/api/v1/listings", ""), "GET:/api/v1/listings");
    }

    #[test]
    fn key_is_independent_of_parameter_order() {
        let a = cache_key("GET", "/listings", "a=1&b=2");
        let b = cache_key("GET", "/listings", "b=2&a=1");
        assert_eq!(a, b);
        assert_eq!(a, "GET:/listings?a=1&b=2");
    }

    #[test]
    fn different_values_produce_different_keys() {
        assert_ne!(
            cache_key("GET", "/listings", "city=recife"),
            cache_key("GET", "/listings", "city=olinda")
        );
    }

    #[test]
    fn bypass_flag_detected_with_and_without_value() {
        assert!(has_bypass_flag("nocache"));
        assert!(has_bypass_flag("nocache=1"));
        assert!(has_bypass_flag("city=recife&nocache=true"));
        assert!(!has_bypass_flag("city=recife"));
        assert!(!has_bypass_flag(""));
    }
}
