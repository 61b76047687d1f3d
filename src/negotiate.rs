//! Weighted `Accept*` header matching.
//!
//! One algorithm serves `Accept`, `Accept-Charset`, `Accept-Encoding` and
//! `Accept-Language`: split the header into items, order them by `q` weight,
//! and return the first server offer the best item admits.

/// A single comma-separated entry of an `Accept*` header.
#[derive(Debug, PartialEq)]
struct AcceptItem<'h> {
    value: &'h str,
    q: f32,
}

fn parse_accept(header: &str) -> Vec<AcceptItem<'_>> {
    let mut items: Vec<AcceptItem<'_>> = header
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.find(";q=") {
                Some(idx) => AcceptItem {
                    value: part[..idx].trim_end(),
                    q: parse_weight(&part[idx + 3..]),
                },
                None => AcceptItem { value: part, q: 1.0 },
            }
        })
        .collect();

    // `sort_by` is stable: equal weights keep header order.
    items.sort_by(|a, b| b.q.total_cmp(&a.q));
    items
}

fn parse_weight(raw: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(q) if q.is_nan() => 1.0,
        // `+ 0.0` folds `-0.0` into `0.0`, which `total_cmp` would order lower.
        Ok(q) => q.clamp(0.0, 1.0) + 0.0,
        Err(_) => 1.0,
    }
}

fn admits(item: &str, offer: &str) -> bool {
    if item == "*" || item == "*/*" || item.eq_ignore_ascii_case(offer) {
        return true;
    }
    match item.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => offer
            .as_bytes()
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes())),
        _ => false,
    }
}

/// Picks the offer that best satisfies `header`.
///
/// Returns the offer exactly as passed in, or `None` when the header is empty,
/// `offers` is empty, or no item admits any offer.
///
/// ```rust
/// use weft::negotiate::accepts;
///
/// let best = accepts("text/html,application/json;q=0.9", &["application/json", "text/html"]);
/// assert_eq!(best, Some("text/html"));
/// assert_eq!(accepts("*/*", &["application/xml"]), Some("application/xml"));
/// assert_eq!(accepts("image/*", &["text/plain"]), None);
/// ```
pub fn accepts<'o>(header: &str, offers: &[&'o str]) -> Option<&'o str> {
    if header.is_empty() || offers.is_empty() {
        return None;
    }

    parse_accept(header).iter().find_map(|item| {
        offers.iter().copied().find(|offer| admits(item.value, offer))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_weight_beats_explicit_lower_weight() {
        let best = accepts("text/html,application/json;q=0.9", &["application/json", "text/html"]);
        assert_eq!(best, Some("text/html"));
    }

    #[test]
    fn explicit_weights_reorder_items() {
        let best = accepts("text/html;q=0.2, application/json;q=0.8", &["text/html", "application/json"]);
        assert_eq!(best, Some("application/json"));
    }

    #[test]
    fn full_wildcard_takes_the_first_offer() {
        assert_eq!(accepts("*/*", &["application/xml"]), Some("application/xml"));
        assert_eq!(accepts("*", &["gzip", "br"]), Some("gzip"));
    }

    #[test]
    fn type_wildcard_matches_by_prefix() {
        assert_eq!(accepts("image/*", &["text/plain", "image/png"]), Some("image/png"));
        assert_eq!(accepts("image/*", &["text/plain"]), None);
    }

    #[test]
    fn matching_ignores_case_but_returns_the_offer_verbatim() {
        assert_eq!(accepts("TEXT/HTML", &["Text/Html"]), Some("Text/Html"));
        assert_eq!(accepts("Image/*", &["IMAGE/PNG"]), Some("IMAGE/PNG"));
    }

    #[test]
    fn ties_keep_header_order() {
        assert_eq!(accepts("fr, en", &["en", "fr"]), Some("fr"));
    }

    #[test]
    fn negative_zero_ties_with_zero() {
        assert_eq!(accepts("a;q=-0, b;q=0", &["b", "a"]), Some("a"));
    }

    #[test]
    fn unparsable_weight_defaults_to_one() {
        let items = parse_accept("gzip;q=abc, br;q=0.5");
        assert_eq!(items[0], AcceptItem { value: "gzip", q: 1.0 });
        assert_eq!(items[1], AcceptItem { value: "br", q: 0.5 });
    }

    #[test]
    fn weights_are_clamped() {
        let items = parse_accept("a;q=7, b;q=-1");
        assert_eq!(items[0].q, 1.0);
        assert_eq!(items[1].q, 0.0);
    }

    #[test]
    fn empty_inputs_never_match() {
        assert_eq!(accepts("", &["text/html"]), None);
        assert_eq!(accepts("text/html", &[]), None);
        assert_eq!(accepts("application/json", &["text/html"]), None);
    }
}
