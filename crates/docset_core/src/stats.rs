use serde::Serialize;

/// Outcome for one distinct remote image referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedAsset {
    pub source_url: String,
    pub local_path: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl LocalizedAsset {
    pub fn localized(source_url: impl Into<String>, local_path: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            local_path: Some(local_path.into()),
            success: true,
            error: None,
        }
    }

    pub fn failed(source_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            local_path: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLocalization {
    pub path: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub assets: Vec<LocalizedAsset>,
}

impl FileLocalization {
    pub fn new(path: impl Into<String>, assets: Vec<LocalizedAsset>) -> Self {
        let successful = assets.iter().filter(|a| a.success).count();
        Self {
            path: path.into(),
            total: assets.len(),
            successful,
            failed: assets.len() - successful,
            assets,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &LocalizedAsset> {
        self.assets.iter().filter(|a| !a.success)
    }
}

/// A page that could not be processed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub path: String,
    pub message: String,
}

/// Bundle-wide image localization counters.
///
/// Pages that failed outright are listed in `failed_pages` and never
/// counted in `total`/`successful`/`failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalizationSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub files: Vec<FileLocalization>,
    pub failed_pages: Vec<PageFailure>,
}

impl LocalizationSummary {
    pub fn record_file(&mut self, file: FileLocalization) {
        self.total += file.total;
        self.successful += file.successful;
        self.failed += file.failed;
        self.files.push(file);
    }

    pub fn record_page_failure(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.failed_pages.push(PageFailure {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Files that referenced at least one remote image.
    pub fn files_with_images(&self) -> impl Iterator<Item = &FileLocalization> {
        self.files.iter().filter(|f| f.total > 0)
    }
}
