//! On-disk docset layout: `<Name>.docset/Contents/{Info.plist, Resources/{docSet.dsidx, Documents/}}`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};

use crate::consts::ROOT_PAGE;
use crate::extract::list_api_pages;
use crate::index::INDEX_FILENAME;
use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum DocsetError {
    #[error("bundle root {0} does not exist or is not a directory")]
    BundleRootMissing(PathBuf),
    #[error("icon {0} does not exist")]
    IconMissing(PathBuf),
    #[error("cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsetMetadata {
    pub identifier: String,
    pub display_name: String,
    pub platform_family: String,
}

impl DocsetMetadata {
    pub fn new(name: &str, platform_family: &str) -> Self {
        Self {
            identifier: name.to_ascii_lowercase().replace(char::is_whitespace, "-"),
            display_name: name.to_string(),
            platform_family: platform_family.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocsetLayout {
    root: PathBuf,
}

impl DocsetLayout {
    pub fn new(output_dir: &Path, name: &str) -> Self {
        Self {
            root: output_dir.join(format!("{name}.docset")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contents_dir(&self) -> PathBuf {
        self.root.join("Contents")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.contents_dir().join("Resources")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.resources_dir().join("Documents")
    }

    pub fn index_path(&self) -> PathBuf {
        self.resources_dir().join(INDEX_FILENAME)
    }

    pub fn create(&self) -> Result<(), DocsetError> {
        ensure_output_dir(&self.documents_dir())?;
        Ok(())
    }

    /// Copies the whole bundle tree into `Documents`.
    pub fn copy_bundle(&self, bundle_root: &Path) -> Result<usize, DocsetError> {
        if !bundle_root.is_dir() {
            return Err(DocsetError::BundleRootMissing(bundle_root.to_path_buf()));
        }
        self.create()?;
        let copied = copy_tree(bundle_root, &self.documents_dir())?;
        engine_info!("Copied {} files into {:?}", copied, self.documents_dir());
        Ok(copied)
    }

    /// The page a docset browser opens first.
    pub fn index_page(&self) -> Option<String> {
        let documents = self.documents_dir();
        if documents.join(ROOT_PAGE).is_file() {
            return Some(ROOT_PAGE.to_string());
        }
        list_api_pages(&documents)
            .ok()
            .and_then(|pages| pages.into_iter().next())
    }

    pub fn write_info_plist(&self, metadata: &DocsetMetadata) -> Result<PathBuf, DocsetError> {
        let plist = render_info_plist(metadata, self.index_page().as_deref());
        let writer = AtomicFileWriter::new(self.contents_dir());
        Ok(writer.write("Info.plist", plist.as_bytes())?)
    }

    pub fn install_icon(&self, icon: &Path) -> Result<PathBuf, DocsetError> {
        if !icon.is_file() {
            return Err(DocsetError::IconMissing(icon.to_path_buf()));
        }
        let target = self.root.join("icon.png");
        ensure_output_dir(&self.root)?;
        fs::copy(icon, &target).map_err(|source| DocsetError::Copy {
            from: icon.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

pub fn render_info_plist(metadata: &DocsetMetadata, index_page: Option<&str>) -> String {
    let index_entry = index_page
        .map(|page| {
            format!(
                "\t<key>dashIndexFilePath</key>\n\t<string>{}</string>\n",
                xml_escape(page)
            )
        })
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
<plist version=\"1.0\">\n\
<dict>\n\
\t<key>CFBundleIdentifier</key>\n\t<string>{identifier}</string>\n\
\t<key>CFBundleName</key>\n\t<string>{name}</string>\n\
\t<key>DocSetPlatformFamily</key>\n\t<string>{family}</string>\n\
{index_entry}\
\t<key>isDashDocset</key>\n\t<true/>\n\
\t<key>isJavaScriptEnabled</key>\n\t<false/>\n\
</dict>\n\
</plist>\n",
        identifier = xml_escape(&metadata.identifier),
        name = xml_escape(&metadata.display_name),
        family = xml_escape(&metadata.platform_family),
    )
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, DocsetError> {
    let copy_err = |from: &Path, to: &Path, source: io::Error| DocsetError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    ensure_output_dir(to)?;
    let mut copied = 0;
    let read_dir = fs::read_dir(from).map_err(|e| copy_err(from, to, e))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| copy_err(from, to, e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| copy_err(&source, &target, e))?;
        if file_type.is_dir() {
            copied += copy_tree(&source, &target)?;
        } else if file_type.is_file() {
            fs::copy(&source, &target).map_err(|e| copy_err(&source, &target, e))?;
            copied += 1;
        } else {
            engine_debug!("Not copying {:?}", source);
        }
    }
    Ok(copied)
}
