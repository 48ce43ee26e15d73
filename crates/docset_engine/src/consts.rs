use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect("valid selector"));
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($regex).expect("valid regex"));
    };
}

pub(crate) const API_DIR: &str = "api";
pub(crate) const GUIDE_DIR: &str = "doc";
pub(crate) const ROOT_PAGE: &str = "index.html";

// Entry extraction.
selector!(DEF_BLOCK_SELECTOR, ".def-block");
selector!(DEF_BLOCK_TITLE_SELECTOR, ".def-block-title");
selector!(ANY_HEADING_SELECTOR, "h1, h2, h3, h4, h5, h6");
selector!(H1_SELECTOR, "h1");
selector!(SECTION_HEADING_SELECTOR, "h2, h3");

// Asset localization.
selector!(IMG_SELECTOR, "img[src]");
// Quoted attribute values may contain `>`.
regex!(IMG_TAG_REGEX, r#"(?i)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#);
// Group 1 is everything up to the value; exactly one of 2/3/4 holds the value.
regex!(
    SRC_ATTR_REGEX,
    r#"(?i)(\ssrc\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#
);
// Group 1 is the attribute up to `=`; group 2 is what follows an unquoted `#`.
regex!(
    HASH_HREF_REGEX,
    r##"(?i)(\shref\s*=\s*)(?:"#"|'#'|#([\s>]|/>))"##
);
