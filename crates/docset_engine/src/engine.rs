use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::{mpsc, Arc};

use docset_core::{DocEntry, EntryType, LocalizationSummary, PageFailure};
use engine_logging::engine_info;

use crate::extract::{extract_bundle, ExtractError};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::localize::{ImageLocalizer, LocalizeError, LocalizerSettings};
use crate::{FetchError, PipelineEvent};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: PipelineEvent) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub localizer: LocalizerSettings,
    /// When false, pages are indexed but remote images stay remote.
    pub localize_images: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            localizer: LocalizerSettings::default(),
            localize_images: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Localize(#[from] LocalizeError),
    #[error("cannot build http client: {0}")]
    Client(#[from] FetchError),
    #[error("cannot start runtime: {0}")]
    Runtime(#[from] io::Error),
    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    pub entries: Vec<DocEntry>,
    pub api_pages: usize,
    pub guide_pages: usize,
    pub extraction_failures: Vec<PageFailure>,
    pub localization: LocalizationSummary,
}

impl PipelineOutput {
    pub fn entry_counts(&self) -> BTreeMap<EntryType, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.entry_type).or_insert(0) += 1;
        }
        counts
    }
}

/// Extracts every entry of the bundle, then localizes the images below
/// `documents_root` when a localizer is given.
pub async fn run_pipeline(
    localizer: Option<&ImageLocalizer>,
    bundle_root: &Path,
    documents_root: &Path,
    sink: &dyn ProgressSink,
) -> Result<PipelineOutput, EngineError> {
    let root = bundle_root.to_path_buf();
    let bundle = tokio::task::spawn_blocking(move || extract_bundle(&root))
        .await
        .map_err(|err| EngineError::Task(err.to_string()))??;

    for failure in &bundle.failed_pages {
        sink.emit(PipelineEvent::PageFailed {
            path: failure.path.clone(),
            message: failure.message.clone(),
        });
    }
    sink.emit(PipelineEvent::EntriesExtracted {
        pages: bundle.api_pages + bundle.guide_pages,
        entries: bundle.entries.len(),
    });
    engine_info!(
        "Extracted {} entries from {} api and {} guide pages",
        bundle.entries.len(),
        bundle.api_pages,
        bundle.guide_pages
    );

    let localization = match localizer {
        Some(localizer) => localizer.localize_all_with(documents_root, sink).await?,
        None => LocalizationSummary::default(),
    };

    sink.emit(PipelineEvent::Finished {
        entries: bundle.entries.len(),
        images_total: localization.total,
        images_failed: localization.failed,
    });

    Ok(PipelineOutput {
        entries: bundle.entries,
        api_pages: bundle.api_pages,
        guide_pages: bundle.guide_pages,
        extraction_failures: bundle.failed_pages,
        localization,
    })
}

/// Blocking facade over the async pipeline; owns its own tokio runtime.
pub struct DocsetEngine {
    runtime: tokio::runtime::Runtime,
    localizer: Option<ImageLocalizer>,
}

impl DocsetEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let localizer = if config.localize_images {
            let fetcher = Arc::new(ReqwestFetcher::new(config.fetch)?);
            Some(ImageLocalizer::new(fetcher, config.localizer))
        } else {
            None
        };
        Self::build(localizer)
    }

    pub fn with_fetcher(
        fetcher: Arc<dyn Fetcher>,
        settings: LocalizerSettings,
    ) -> Result<Self, EngineError> {
        Self::build(Some(ImageLocalizer::new(fetcher, settings)))
    }

    fn build(localizer: Option<ImageLocalizer>) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("docset-engine")
            .build()?;
        Ok(Self { runtime, localizer })
    }

    pub fn run(
        &self,
        bundle_root: &Path,
        documents_root: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineOutput, EngineError> {
        self.runtime.block_on(run_pipeline(
            self.localizer.as_ref(),
            bundle_root,
            documents_root,
            sink,
        ))
    }

    /// Localization only, for documents that are already in place.
    pub fn localize(
        &self,
        documents_root: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<LocalizationSummary, EngineError> {
        match self.localizer.as_ref() {
            Some(localizer) => Ok(self
                .runtime
                .block_on(localizer.localize_all_with(documents_root, sink))?),
            None => Ok(LocalizationSummary::default()),
        }
    }
}
