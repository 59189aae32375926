/// Text normalization and label parsing for extracted fields
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*([kmb])?\b").expect("count pattern is valid")
});

const ZERO_WIDTH: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// Collapse whitespace runs to a single space, drop zero-width characters and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read an engagement counter out of a label such as "1,234", "1.2K" or
/// "3 comments". Anything unreadable counts as zero.
///
/// Without a suffix, `.` and `,` are thousands separators only when every
/// group after them has exactly three digits; otherwise the fractional part
/// is dropped.
pub fn parse_count(label: &str) -> u64 {
    let Some(caps) = COUNT_RE.captures(label) else {
        return 0;
    };
    let number = &caps[1];

    match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) => {
            let multiplier = match suffix.as_str() {
                "k" => 1_000.0,
                "m" => 1_000_000.0,
                _ => 1_000_000_000.0,
            };
            match number.replace(',', ".").parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => (value * multiplier).round() as u64,
                _ => 0,
            }
        }
        None => {
            let mut groups = number.split(['.', ',']);
            let head = groups.next().unwrap_or_default();
            let tail: Vec<&str> = groups.collect();
            let digits = if !tail.is_empty() && tail.iter().all(|g| g.len() == 3) {
                std::iter::once(head).chain(tail).collect::<String>()
            } else {
                head.to_string()
            };
            digits.parse().unwrap_or(0)
        }
    }
}

/// Resolve a link against the page and strip tracking parameters.
///
/// Returns `None` for empty, fragment-only, script and non-http links.
pub fn clean_link(href: &str, base: Option<&str>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }

    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => Url::parse(base?).ok()?.join(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("__") && key != "fbclid")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    Some(url.to_string())
}
