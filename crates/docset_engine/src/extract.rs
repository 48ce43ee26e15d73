//! Index entries recovered from generated documentation pages.
//!
//! The bundle layout is fixed: namespace pages live in `api/`, narrative
//! guides in `doc/`. Everything here is heuristic; a page that does not look
//! the way we expect simply yields fewer entries.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docset_core::{
    classify_symbol_kind, fold_sections, strip_language_qualifier, DocEntry, EntryType, Heading,
    HeadingLevel, PageFailure,
};
use ego_tree::{NodeId, NodeRef};
use engine_logging::{engine_debug, engine_warn};
use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::consts::{
    ANY_HEADING_SELECTOR, API_DIR, DEF_BLOCK_SELECTOR, DEF_BLOCK_TITLE_SELECTOR, GUIDE_DIR,
    H1_SELECTOR, SECTION_HEADING_SELECTOR,
};
use crate::decode::load_page;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("bundle root {0} does not exist or is not a directory")]
    BundleRootMissing(PathBuf),
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything extracted from one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleEntries {
    pub entries: Vec<DocEntry>,
    pub api_pages: usize,
    pub guide_pages: usize,
    pub failed_pages: Vec<PageFailure>,
}

/// One entry per def-block that has both a name and an anchor, in document order.
pub fn extract_symbols(page: &Html, relative_path: &str) -> Vec<DocEntry> {
    page.select(&DEF_BLOCK_SELECTOR)
        .filter_map(|block| symbol_entry(block, relative_path))
        .collect()
}

fn symbol_entry(block: ElementRef<'_>, relative_path: &str) -> Option<DocEntry> {
    let title = block
        .select(&DEF_BLOCK_TITLE_SELECTOR)
        .next()
        .or_else(|| block.select(&ANY_HEADING_SELECTOR).next())?;

    let name_node = title
        .descendants()
        .find(|node| node.value().as_text().is_some_and(|t| !t.trim().is_empty()))?;
    let name = strip_language_qualifier(name_node.value().as_text()?);
    if name.is_empty() {
        return None;
    }

    let anchor = title
        .value()
        .attr("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())?;

    let markers = title_markers(title, name_node);
    let kind = classify_symbol_kind(markers.iter().map(String::as_str));
    Some(DocEntry::anchored(name, kind, relative_path, anchor))
}

/// Inline elements of a title that are not wrapping the name: their text
/// and their class names.
fn title_markers(title: ElementRef<'_>, name_node: NodeRef<'_, Node>) -> Vec<String> {
    let name_ancestors: HashSet<NodeId> = name_node.ancestors().map(|n| n.id()).collect();
    let mut markers = Vec::new();
    for node in title.descendants().skip(1) {
        if name_ancestors.contains(&node.id()) {
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        markers.push(heading_text(element));
        markers.extend(element.value().classes().map(ToOwned::to_owned));
    }
    markers
}

pub fn extract_namespace_entry(page: &Html, relative_path: &str) -> Option<DocEntry> {
    page_title(page).map(|name| DocEntry::new(name, EntryType::Namespace, relative_path))
}

pub fn extract_guide_entry(page: &Html, relative_path: &str) -> Option<DocEntry> {
    page_title(page).map(|name| DocEntry::new(name, EntryType::Guide, relative_path))
}

fn page_title(page: &Html) -> Option<String> {
    page.select(&H1_SELECTOR)
        .next()
        .map(heading_text)
        .filter(|text| !text.is_empty())
}

/// Second- and third-level headings, named with their enclosing `h2`.
pub fn extract_sections(page: &Html, relative_path: &str) -> Vec<DocEntry> {
    let headings: Vec<Heading> = page
        .select(&SECTION_HEADING_SELECTOR)
        .map(|element| {
            let level = if element.value().name().eq_ignore_ascii_case("h2") {
                HeadingLevel::H2
            } else {
                HeadingLevel::H3
            };
            Heading::new(level, element.value().attr("id"), heading_text(element))
        })
        .collect();
    fold_sections(relative_path, &headings)
}

/// All text below `element`, at any nesting depth, concatenated and trimmed.
pub fn heading_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(*element, &mut out);
    out.trim().to_string()
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if matches!(element.name(), "script" | "style") => {}
            _ => collect_text(child, out),
        }
    }
}

/// Symbols, then the namespace title, then sections.
pub fn api_page_entries(page: &Html, relative_path: &str) -> Vec<DocEntry> {
    let mut entries = extract_symbols(page, relative_path);
    entries.extend(extract_namespace_entry(page, relative_path));
    entries.extend(extract_sections(page, relative_path));
    entries
}

/// Guide title, then sections.
pub fn guide_page_entries(page: &Html, relative_path: &str) -> Vec<DocEntry> {
    let mut entries: Vec<DocEntry> = extract_guide_entry(page, relative_path)
        .into_iter()
        .collect();
    entries.extend(extract_sections(page, relative_path));
    entries
}

pub fn list_api_pages(bundle_root: &Path) -> Result<Vec<String>, ExtractError> {
    list_html_pages(bundle_root, API_DIR)
}

pub fn list_guide_pages(bundle_root: &Path) -> Result<Vec<String>, ExtractError> {
    list_html_pages(bundle_root, GUIDE_DIR)
}

/// `*.html` files directly inside `bundle_root/subdir`, as sorted
/// `subdir/name.html` paths. A missing directory is simply empty.
fn list_html_pages(bundle_root: &Path, subdir: &str) -> Result<Vec<String>, ExtractError> {
    let dir = bundle_root.join(subdir);
    let read_dir = match fs::read_dir(&dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(ExtractError::List { path: dir, source }),
    };

    let mut pages: Vec<String> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|e| is_html(&e.path()))
        .filter_map(|e| e.file_name().to_str().map(|name| format!("{subdir}/{name}")))
        .collect();
    pages.sort();
    Ok(pages)
}

pub(crate) fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

#[derive(Debug, Clone, Copy)]
enum PageKind {
    Api,
    Guide,
}

/// Entries for every API page followed by every guide page.
pub fn parse_all_entries(bundle_root: &Path) -> Result<Vec<DocEntry>, ExtractError> {
    extract_bundle(bundle_root).map(|bundle| bundle.entries)
}

/// Like [`parse_all_entries`], keeping page counts and unreadable pages.
pub fn extract_bundle(bundle_root: &Path) -> Result<BundleEntries, ExtractError> {
    if !bundle_root.is_dir() {
        return Err(ExtractError::BundleRootMissing(bundle_root.to_path_buf()));
    }

    let api_pages = list_api_pages(bundle_root)?;
    let guide_pages = list_guide_pages(bundle_root)?;
    let mut bundle = BundleEntries {
        api_pages: api_pages.len(),
        guide_pages: guide_pages.len(),
        ..BundleEntries::default()
    };

    let pages = api_pages
        .iter()
        .map(|p| (p, PageKind::Api))
        .chain(guide_pages.iter().map(|p| (p, PageKind::Guide)));

    for (relative_path, kind) in pages {
        let html = match load_page(&bundle_root.join(relative_path)) {
            Ok(html) => html,
            Err(err) => {
                engine_warn!("Skipping {}: {}", relative_path, err);
                bundle.failed_pages.push(PageFailure {
                    path: relative_path.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        let page = Html::parse_document(&html);
        let entries = match kind {
            PageKind::Api => api_page_entries(&page, relative_path),
            PageKind::Guide => guide_page_entries(&page, relative_path),
        };
        engine_debug!("{} entries from {}", entries.len(), relative_path);
        bundle.entries.extend(entries);
    }

    Ok(bundle)
}
