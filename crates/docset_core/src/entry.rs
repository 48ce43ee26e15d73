use std::fmt;

use serde::Serialize;

/// Kind of an indexed documentation entry.
///
/// The last five variants are symbol kinds. `Function` is what a def-block
/// gets when its title carries no more specific marker, which also covers
/// plain vars that were not marked as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntryType {
    Namespace,
    Guide,
    Section,
    Variable,
    Macro,
    Protocol,
    Method,
    Function,
}

impl EntryType {
    /// Type name as stored in the search index.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Namespace => "Namespace",
            EntryType::Guide => "Guide",
            EntryType::Section => "Section",
            EntryType::Variable => "Variable",
            EntryType::Macro => "Macro",
            EntryType::Protocol => "Protocol",
            EntryType::Method => "Method",
            EntryType::Function => "Function",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One navigable unit of documentation.
///
/// `path` is relative to the bundle root, with an optional `#anchor` for
/// locations inside a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub path: String,
}

impl DocEntry {
    pub fn new(name: impl Into<String>, entry_type: EntryType, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_type,
            path: path.into(),
        }
    }

    pub fn anchored(
        name: impl Into<String>,
        entry_type: EntryType,
        page: &str,
        anchor: &str,
    ) -> Self {
        Self::new(name, entry_type, format!("{page}#{anchor}"))
    }
}
