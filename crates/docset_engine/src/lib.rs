//! Docset engine: entry extraction, image localization and packaging IO.
mod consts;
mod decode;
mod docset;
mod engine;
mod extract;
mod fetch;
mod filename;
mod index;
mod localize;
mod persist;
mod report;
mod retry;
mod rewrite;
mod types;

pub use decode::{
    decode_html, encode_html, load_page, read_page, DecodeError, DecodedHtml, PageError,
};
pub use docset::{render_info_plist, DocsetError, DocsetLayout, DocsetMetadata};
pub use engine::{
    run_pipeline, ChannelProgressSink, DocsetEngine, EngineConfig, EngineError, NullProgressSink,
    PipelineOutput, ProgressSink,
};
pub use extract::{
    api_page_entries, extract_bundle, extract_guide_entry, extract_namespace_entry,
    extract_sections, extract_symbols, guide_page_entries, heading_text, list_api_pages,
    list_guide_pages, parse_all_entries, BundleEntries, ExtractError,
};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{content_addressed_filename, content_hash};
pub use index::{IndexError, SearchIndex, INDEX_FILENAME};
pub use localize::{
    collect_image_references, ImageLocalizer, LocalizeError, LocalizerSettings, PageLocalization,
    DEFAULT_CONCURRENCY,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use report::{build_report, write_report, ReportError, REPORT_FILENAME};
pub use retry::{
    fetch_with_retry, RetriedFetch, RetryFailure, RetryPolicy, DEFAULT_MAX_ATTEMPTS,
};
pub use rewrite::{rewrite_hash_links, rewrite_image_sources, RewrittenImages};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, PipelineEvent};
