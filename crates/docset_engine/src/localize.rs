//! Remote image localization.
//!
//! Every `<img>` pointing at an `http(s)` URL is downloaded once, stored under
//! a content-addressed name in the shared `images/` directory and the page is
//! rewritten to reference the local copy relative to its own depth.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use docset_core::{
    depth_prefix, extension_for_url, image_extension, page_depth, relative_images_path,
    FileLocalization, ImageClass, ImageReference, LocalizationSummary, LocalizedAsset, IMAGES_DIR,
};
use encoding_rs::Encoding;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::stream::{self, StreamExt};
use scraper::Html;

use crate::consts::{IMG_SELECTOR, ROOT_PAGE};
use crate::decode::{encode_html, read_page, DecodeError};
use crate::engine::{NullProgressSink, ProgressSink};
use crate::extract::is_html;
use crate::filename::content_addressed_filename;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::rewrite::{rewrite_hash_links, rewrite_image_sources};
use crate::{Fetcher, PipelineEvent};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct LocalizerSettings {
    /// Upper bound on image downloads in flight for one page.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for LocalizerSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocalizeError {
    #[error("documents root {0} does not exist or is not a directory")]
    DocumentsRootMissing(PathBuf),
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Encode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocalization {
    pub updated_content: String,
    pub results: Vec<LocalizedAsset>,
}

/// Image `src` values of a page in document order.
pub fn collect_image_references(content: &str) -> Vec<ImageReference> {
    let document = Html::parse_document(content);
    document
        .select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(|src| ImageReference::new(src.trim()))
        .collect()
}

pub struct ImageLocalizer {
    fetcher: Arc<dyn Fetcher>,
    settings: LocalizerSettings,
    // url -> stored file name, or the error message of the failed fetch
    outcomes: Mutex<HashMap<String, Result<String, String>>>,
}

impl ImageLocalizer {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: LocalizerSettings) -> Self {
        Self {
            fetcher,
            settings,
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    /// Localizes the remote images of one page.
    ///
    /// `page_path` is relative to `documents_root` (or absolute below it).
    /// Pages without remote images come back unchanged with no results.
    pub async fn localize_page(
        &self,
        content: &str,
        page_path: &Path,
        images_dir: &Path,
        documents_root: &Path,
    ) -> PageLocalization {
        let mut seen = HashSet::new();
        let remote: Vec<String> = collect_image_references(content)
            .into_iter()
            .filter(|reference| reference.class == ImageClass::Remote)
            .map(|reference| reference.url)
            .filter(|url| seen.insert(url.clone()))
            .collect();

        if remote.is_empty() {
            return PageLocalization {
                updated_content: content.to_string(),
                results: Vec::new(),
            };
        }

        let depth = page_depth(page_path, documents_root);
        let images_prefix = relative_images_path(depth);
        let writer = AtomicFileWriter::new(images_dir.to_path_buf());

        // `buffered` keeps discovery order whatever order downloads finish in.
        let outcomes: Vec<Result<String, String>> = stream::iter(remote.iter())
            .map(|url| self.localize_url(url, &writer))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mapping: HashMap<String, String> = remote
            .iter()
            .zip(&outcomes)
            .filter_map(|(url, outcome)| {
                let filename = outcome.as_ref().ok()?;
                Some((url.clone(), format!("{images_prefix}{filename}")))
            })
            .collect();

        let rewritten = rewrite_image_sources(content, &mapping);
        let results: Vec<LocalizedAsset> = remote
            .iter()
            .zip(outcomes)
            .map(|(url, outcome)| match (outcome, mapping.get(url)) {
                (Ok(_), Some(local)) if rewritten.replaced.contains(url) => {
                    LocalizedAsset::localized(url.as_str(), local.as_str())
                }
                (Ok(_), _) => {
                    engine_warn!("{}: no rewritable src for {}", page_path.display(), url);
                    LocalizedAsset::failed(
                        url.as_str(),
                        "image stored but src could not be rewritten",
                    )
                }
                (Err(message), _) => LocalizedAsset::failed(url.as_str(), message),
            })
            .collect();

        let root_page = format!("{}{ROOT_PAGE}", depth_prefix(depth));
        let updated_content = rewrite_hash_links(&rewritten.html, &root_page);

        PageLocalization {
            updated_content,
            results,
        }
    }

    async fn localize_url(&self, url: &str, writer: &AtomicFileWriter) -> Result<String, String> {
        let known = self.lock_outcomes().get(url).cloned();
        if let Some(known) = known {
            return known;
        }

        let outcome = self.download(url, writer).await;
        self.lock_outcomes().insert(url.to_string(), outcome.clone());
        outcome
    }

    async fn download(&self, url: &str, writer: &AtomicFileWriter) -> Result<String, String> {
        let fetched = fetch_with_retry(self.fetcher.as_ref(), url, &self.settings.retry)
            .await
            .map_err(|err| err.to_string())?;
        let output = fetched.output;

        let extension = image_extension(output.metadata.content_type.as_deref(), url)
            .or_else(|| extension_for_url(&output.metadata.final_url))
            .ok_or_else(|| match output.metadata.content_type.as_deref() {
                Some(ct) => format!("unable to determine image type (content type {ct})"),
                None => "unable to determine image type".to_string(),
            })?;

        let filename = content_addressed_filename(&output.bytes, extension);
        let (path, written) = writer
            .write_if_absent(&filename, &output.bytes)
            .map_err(|err| err.to_string())?;
        engine_debug!(
            "{} -> {:?} ({} bytes, {} attempt(s){})",
            url,
            path,
            output.bytes.len(),
            fetched.attempts,
            if written { "" } else { ", already stored" }
        );
        Ok(filename)
    }

    fn lock_outcomes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Result<String, String>>> {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn localize_all(
        &self,
        documents_root: &Path,
    ) -> Result<LocalizationSummary, LocalizeError> {
        self.localize_all_with(documents_root, &NullProgressSink).await
    }

    /// Localizes every HTML file below `documents_root` and writes changed
    /// pages back in place.
    pub async fn localize_all_with(
        &self,
        documents_root: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<LocalizationSummary, LocalizeError> {
        if !documents_root.is_dir() {
            return Err(LocalizeError::DocumentsRootMissing(
                documents_root.to_path_buf(),
            ));
        }
        let images_dir = documents_root.join(IMAGES_DIR);
        let mut summary = LocalizationSummary::default();

        for path in html_files(documents_root)? {
            let relative = path.strip_prefix(documents_root).unwrap_or(path.as_path());
            let display = relative_display(relative);

            let decoded = match read_page(&path) {
                Ok(decoded) => decoded,
                Err(err) => {
                    engine_warn!("Skipping {}: {}", display, err);
                    sink.emit(PipelineEvent::PageFailed {
                        path: display.clone(),
                        message: err.to_string(),
                    });
                    summary.record_page_failure(display, err.to_string());
                    continue;
                }
            };

            let page = self
                .localize_page(&decoded.html, relative, &images_dir, documents_root)
                .await;

            if page.updated_content != decoded.html {
                let written = write_in_place(&path, &page.updated_content, decoded.encoding);
                if let Err(err) = written {
                    engine_warn!("Cannot write back {}: {}", display, err);
                    sink.emit(PipelineEvent::PageFailed {
                        path: display.clone(),
                        message: err.to_string(),
                    });
                    summary.record_page_failure(display, err.to_string());
                    continue;
                }
            }

            let file = FileLocalization::new(display.clone(), page.results);
            if file.total > 0 {
                engine_info!(
                    "{}: {}/{} images localized",
                    display,
                    file.successful,
                    file.total
                );
                sink.emit(PipelineEvent::PageLocalized {
                    path: display,
                    successful: file.successful,
                    failed: file.failed,
                });
            }
            summary.record_file(file);
        }

        Ok(summary)
    }
}

/// Writes a rewritten page back in the encoding it was read with.
fn write_in_place(
    path: &Path,
    content: &str,
    encoding: &'static Encoding,
) -> Result<PathBuf, LocalizeError> {
    let bytes = encode_html(content, encoding)?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PersistError::OutputDir(format!("{} has no file name", path.display())))?;
    Ok(AtomicFileWriter::new(dir).write(name, &bytes)?)
}

fn relative_display(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// All `*.html` files below `root`, sorted by path.
fn html_files(root: &Path) -> Result<Vec<PathBuf>, LocalizeError> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let read_dir = fs::read_dir(&dir).map_err(|source| LocalizeError::List {
            path: dir.clone(),
            source,
        })?;
        for entry in read_dir.filter_map(|e| e.ok()) {
            let path = entry.path();
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => pending.push(path),
                Ok(ft) if ft.is_file() && is_html(&path) => files.push(path),
                _ => {}
            }
        }
    }
    files.sort();
    Ok(files)
}
