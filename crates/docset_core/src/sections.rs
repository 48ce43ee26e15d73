use crate::{DocEntry, EntryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H2,
    H3,
}

/// A sub-section heading as read from a page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: HeadingLevel,
    pub id: Option<String>,
    pub text: String,
}

impl Heading {
    pub fn new(level: HeadingLevel, id: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            level,
            id: id.map(ToOwned::to_owned),
            text: text.into(),
        }
    }
}

/// Folds ordered headings into section entries for the page at `page`.
///
/// The latest `H2` is the context for following `H3`s, which are named
/// `"<own> - <context>"`. An `H2` without an id still becomes the context.
pub fn fold_sections(page: &str, headings: &[Heading]) -> Vec<DocEntry> {
    let (_, entries) = headings.iter().fold(
        (None::<&str>, Vec::new()),
        |(context, mut entries), heading| {
            let text = heading.text.trim();
            let id = heading
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty());

            let name = match heading.level {
                HeadingLevel::H2 => text.to_string(),
                HeadingLevel::H3 => match context {
                    Some(ctx) if !ctx.is_empty() => format!("{text} - {ctx}"),
                    _ => text.to_string(),
                },
            };

            if let Some(id) = id {
                if !text.is_empty() {
                    entries.push(DocEntry::anchored(name, EntryType::Section, page, id));
                }
            }

            let context = match heading.level {
                HeadingLevel::H2 => Some(text),
                HeadingLevel::H3 => context,
            };
            (context, entries)
        },
    );
    entries
}
