use crate::EntryType;

/// Trailing tokens that name the platform a symbol is available on.
const LANGUAGE_QUALIFIERS: &[&str] = &["clj", "cljs", "clj/s", "cljc"];

/// Drops a trailing platform qualifier token (`clj`, `cljs`, `clj/s`, ...) and trims.
///
/// A name consisting of nothing but a qualifier is left alone.
pub fn strip_language_qualifier(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.rsplit_once(char::is_whitespace) {
        Some((head, last))
            if LANGUAGE_QUALIFIERS
                .iter()
                .any(|q| q.eq_ignore_ascii_case(last)) =>
        {
            head.trim_end()
        }
        _ => trimmed,
    }
}

/// Classifies a def-block from the inline markers found in its title.
///
/// Markers are matched case-insensitively as substrings, in fixed precedence:
/// protocol, multimethod, macro. A marker that is exactly `var` yields
/// `Variable`. Everything else is `Function`.
pub fn classify_symbol_kind<'a, I>(markers: I) -> EntryType
where
    I: IntoIterator<Item = &'a str>,
{
    let markers: Vec<String> = markers
        .into_iter()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
        .collect();
    let any = |needle: &str| markers.iter().any(|m| m.contains(needle));

    if any("protocol") {
        EntryType::Protocol
    } else if any("multimethod") {
        EntryType::Method
    } else if any("macro") {
        EntryType::Macro
    } else if markers.iter().any(|m| m == "var") {
        EntryType::Variable
    } else {
        EntryType::Function
    }
}
