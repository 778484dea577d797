use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::HeaderMap;

static POP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+-([a-z0-9]+)$").expect("pop regex is valid"));

/// Location part of a point-of-presence name (`gateway-bank1-ams1` → `ams1`).
///
/// Names that do not look like `<node>-<location>` are returned unchanged.
pub fn pop_to_location(pop: &str) -> &str {
    POP_REGEX
        .captures(pop)
        .and_then(|c| c.get(1))
        .map_or(pop, |m| m.as_str())
}

/// POP that answered: the node header, or the load balancer's when absent.
pub(crate) fn pop_from_headers(headers: &HeaderMap) -> String {
    ["x-ipfs-pop", "x-ipfs-lb-pop"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn location_is_the_last_segment() {
        assert_eq!(pop_to_location("gateway-bank1-sjc1"), "sjc1");
        assert_eq!(pop_to_location("lb-ams"), "ams");
    }

    #[test]
    fn odd_names_pass_through() {
        assert_eq!(pop_to_location("localhost"), "localhost");
        assert_eq!(pop_to_location("Gateway-SJC1"), "Gateway-SJC1");
        assert_eq!(pop_to_location(""), "");
    }

    #[test]
    fn node_header_wins_over_load_balancer() {
        let mut h = HeaderMap::new();
        h.insert("x-ipfs-lb-pop", HeaderValue::from_static("lb-fra1"));
        assert_eq!(pop_from_headers(&h), "lb-fra1");

        h.insert("x-ipfs-pop", HeaderValue::from_static("gateway-bank2-fra1"));
        assert_eq!(pop_from_headers(&h), "gateway-bank2-fra1");

        assert_eq!(pop_from_headers(&HeaderMap::new()), "");
    }
}
