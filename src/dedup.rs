/// Duplicate detection by post identity
use crate::normalize::normalize_text;
use crate::record::Record;

/// Two records are the same post when their normalized content and author
/// both match. Ids are ignored: every extraction mints a fresh one.
pub fn is_duplicate(candidate: &Record, existing: &[Record]) -> bool {
    let content = normalize_text(&candidate.content);
    let author = normalize_text(&candidate.author);

    existing
        .iter()
        .any(|r| normalize_text(&r.content) == content && normalize_text(&r.author) == author)
}
