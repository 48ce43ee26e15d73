use std::collections::{HashMap, HashSet};

use html_escape::decode_html_entities;
use regex::Captures;

use crate::consts::{HASH_HREF_REGEX, IMG_TAG_REGEX, SRC_ATTR_REGEX};

/// Result of [`rewrite_image_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenImages {
    pub html: String,
    /// Mapping keys that were substituted at least once.
    pub replaced: HashSet<String>,
}

/// Replaces `src` values of `<img>` tags found in `mapping`.
///
/// Only the attribute inside an image tag is touched, so the same URL in
/// prose, links or scripts survives. Double-quoted, single-quoted and
/// unquoted values keep their quoting. Raw values are entity-decoded before
/// the lookup, matching what an HTML parser reports for the attribute.
pub fn rewrite_image_sources(html: &str, mapping: &HashMap<String, String>) -> RewrittenImages {
    let mut replaced = HashSet::new();
    if mapping.is_empty() {
        return RewrittenImages {
            html: html.to_string(),
            replaced,
        };
    }
    let html = IMG_TAG_REGEX
        .replace_all(html, |tag: &Captures| {
            SRC_ATTR_REGEX
                .replace(&tag[0], |attr: &Captures| rewrite_src(attr, mapping, &mut replaced))
                .into_owned()
        })
        .into_owned();
    RewrittenImages { html, replaced }
}

fn rewrite_src(
    attr: &Captures,
    mapping: &HashMap<String, String>,
    replaced: &mut HashSet<String>,
) -> String {
    let (value, quote) = if let Some(m) = attr.get(2) {
        (m.as_str(), "\"")
    } else if let Some(m) = attr.get(3) {
        (m.as_str(), "'")
    } else if let Some(m) = attr.get(4) {
        (m.as_str(), "")
    } else {
        return attr[0].to_string();
    };

    let lookup = decode_html_entities(value.trim());
    match mapping.get_key_value(lookup.as_ref()) {
        Some((url, local)) => {
            replaced.insert(url.clone());
            format!("{}{quote}{local}{quote}", &attr[1])
        }
        None => attr[0].to_string(),
    }
}

/// Points `href="#"` (and `'#'`, bare `#`) links at `root_page`.
pub fn rewrite_hash_links(html: &str, root_page: &str) -> String {
    HASH_HREF_REGEX
        .replace_all(html, |caps: &Captures| {
            let tail = caps.get(2).map_or("", |m| m.as_str());
            format!("{}\"{root_page}\"{tail}", &caps[1])
        })
        .into_owned()
}
