//! Docset core: pure data model and extraction heuristics.
mod entry;
mod image;
mod sections;
mod stats;
mod symbol;

pub use entry::{DocEntry, EntryType};
pub use image::{
    classify_image_url, depth_prefix, extension_for_content_type, extension_for_url,
    image_extension, page_depth, relative_images_path, ImageClass, ImageReference, IMAGES_DIR,
};
pub use sections::{fold_sections, Heading, HeadingLevel};
pub use stats::{FileLocalization, LocalizationSummary, LocalizedAsset, PageFailure};
pub use symbol::{classify_symbol_kind, strip_language_qualifier};
