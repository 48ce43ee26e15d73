use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, Once};
use std::time::Duration;

use docset_core::EntryType;
use docset_engine::{
    build_report, content_hash, render_info_plist, write_report, ChannelProgressSink,
    DocsetEngine, DocsetError, DocsetLayout, DocsetMetadata, EngineConfig, FailureKind,
    FetchError, FetchMetadata, FetchOutput, Fetcher, LocalizerSettings, PipelineEvent,
    RetryPolicy, SearchIndex, REPORT_FILENAME,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

static INIT: Once = Once::new();

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

fn fixture_bundle() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/bundle")
}

/// Serves `PNG` for `https://cdn.test/logo.png` and 404 for everything else.
#[derive(Default)]
struct StubFetcher {
    requests: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if url != "https://cdn.test/logo.png" {
            return Err(FetchError::new(FailureKind::HttpStatus(404), ""));
        }
        Ok(FetchOutput {
            bytes: PNG.to_vec(),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                content_type: Some("image/png".to_string()),
                byte_len: PNG.len() as u64,
            },
        })
    }
}

fn settings() -> LocalizerSettings {
    LocalizerSettings {
        concurrency: 2,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        },
    }
}

#[test]
fn layout_paths_follow_docset_structure() {
    let layout = DocsetLayout::new(Path::new("/out"), "core.async");
    assert_eq!(layout.root(), Path::new("/out/core.async.docset"));
    assert_eq!(
        layout.documents_dir(),
        Path::new("/out/core.async.docset/Contents/Resources/Documents")
    );
    assert_eq!(
        layout.index_path(),
        Path::new("/out/core.async.docset/Contents/Resources/docSet.dsidx")
    );
}

#[test]
fn info_plist_names_the_docset() {
    let meta = DocsetMetadata::new("Core Async", "clojure");
    assert_eq!(meta.identifier, "core-async");

    let plist = render_info_plist(&meta, Some("index.html"));
    assert!(plist.contains("<key>CFBundleIdentifier</key>\n\t<string>core-async</string>"));
    assert!(plist.contains("<key>CFBundleName</key>\n\t<string>Core Async</string>"));
    assert!(plist.contains("<key>DocSetPlatformFamily</key>\n\t<string>clojure</string>"));
    assert!(plist.contains("<key>dashIndexFilePath</key>\n\t<string>index.html</string>"));
    assert!(plist.contains("<key>isDashDocset</key>\n\t<true/>"));

    let escaped = render_info_plist(&DocsetMetadata::new("A&B", "x"), None);
    assert!(escaped.contains("<string>A&amp;B</string>"));
    assert!(!escaped.contains("dashIndexFilePath"));
}

#[test]
fn bundle_is_copied_and_plist_written() {
    let out = TempDir::new().unwrap();
    let layout = DocsetLayout::new(out.path(), "core.async");

    assert_eq!(layout.copy_bundle(&fixture_bundle()).unwrap(), 6);
    assert!(layout.documents_dir().join("doc/notes.txt").is_file());
    assert_eq!(layout.index_page().as_deref(), Some("index.html"));

    let plist = layout
        .write_info_plist(&DocsetMetadata::new("core.async", "clojure"))
        .unwrap();
    assert_eq!(plist, layout.contents_dir().join("Info.plist"));
    assert!(fs::read_to_string(plist).unwrap().contains("core.async"));
}

#[test]
fn index_page_falls_back_to_first_api_page() {
    let out = TempDir::new().unwrap();
    let layout = DocsetLayout::new(out.path(), "lib");
    let docs = layout.documents_dir();
    fs::create_dir_all(docs.join("api")).unwrap();
    fs::write(docs.join("api/b.html"), "").unwrap();
    fs::write(docs.join("api/a.html"), "").unwrap();
    assert_eq!(layout.index_page().as_deref(), Some("api/a.html"));
}

#[test]
fn missing_inputs_are_reported() {
    let out = TempDir::new().unwrap();
    let layout = DocsetLayout::new(out.path(), "lib");
    assert!(matches!(
        layout.copy_bundle(&out.path().join("nope")),
        Err(DocsetError::BundleRootMissing(_))
    ));
    assert!(matches!(
        layout.install_icon(&out.path().join("icon.png")),
        Err(DocsetError::IconMissing(_))
    ));

    let icon = out.path().join("source.png");
    fs::write(&icon, PNG).unwrap();
    let installed = layout.install_icon(&icon).unwrap();
    assert_eq!(installed, layout.root().join("icon.png"));
    assert_eq!(fs::read(installed).unwrap(), PNG);
}

#[test]
fn pipeline_without_images_indexes_fixture() {
    INIT.call_once(engine_logging::initialize_for_tests);
    let out = TempDir::new().unwrap();
    let layout = DocsetLayout::new(out.path(), "core.async");
    layout.copy_bundle(&fixture_bundle()).unwrap();
    let docs = layout.documents_dir();

    let engine = DocsetEngine::new(EngineConfig {
        localize_images: false,
        ..EngineConfig::default()
    })
    .unwrap();
    let (tx, rx) = mpsc::channel();
    let output = engine
        .run(&docs, &docs, &ChannelProgressSink::new(tx))
        .unwrap();

    assert_eq!(output.entries.len(), 16);
    assert_eq!(output.api_pages, 2);
    assert_eq!(output.guide_pages, 2);
    assert_eq!(output.entry_counts()[&EntryType::Section], 5);
    assert_eq!(output.localization.total, 0);

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            PipelineEvent::EntriesExtracted {
                pages: 4,
                entries: 16
            },
            PipelineEvent::Finished {
                entries: 16,
                images_total: 0,
                images_failed: 0
            },
        ]
    );

    let mut index = SearchIndex::create(&layout.index_path()).unwrap();
    assert_eq!(index.store(&output.entries).unwrap(), 16);
    // Untouched without a localizer.
    assert_eq!(
        fs::read_to_string(docs.join("index.html")).unwrap(),
        fs::read_to_string(fixture_bundle().join("index.html")).unwrap()
    );
}

#[test]
fn pipeline_localizes_images_and_reports() {
    INIT.call_once(engine_logging::initialize_for_tests);
    let out = TempDir::new().unwrap();
    let layout = DocsetLayout::new(out.path(), "core.async");
    layout.copy_bundle(&fixture_bundle()).unwrap();
    let docs = layout.documents_dir();
    fs::write(
        docs.join("doc/rationale.html"),
        r##"<h1>Rationale</h1><a href="#">home</a>
<img src="https://cdn.test/logo.png"><img src="https://cdn.test/gone.png">"##,
    )
    .unwrap();

    let fetcher = Arc::new(StubFetcher::default());
    let engine = DocsetEngine::with_fetcher(fetcher.clone(), settings()).unwrap();
    let (tx, rx) = mpsc::channel();
    let output = engine
        .run(&fixture_bundle(), &docs, &ChannelProgressSink::new(tx))
        .unwrap();

    let hash = content_hash(PNG);
    assert_eq!(
        fs::read_to_string(docs.join("doc/rationale.html")).unwrap(),
        format!(
            r#"<h1>Rationale</h1><a href="../index.html">home</a>
<img src="../images/{hash}.png"><img src="https://cdn.test/gone.png">"#
        )
    );
    assert!(docs.join(format!("images/{hash}.png")).is_file());
    // 404 is not retried.
    assert_eq!(fetcher.requests.lock().unwrap().len(), 2);

    assert_eq!(output.localization.total, 2);
    assert_eq!(output.localization.failed, 1);
    assert!(rx.try_iter().any(|event| event
        == PipelineEvent::PageLocalized {
            path: "doc/rationale.html".to_string(),
            successful: 1,
            failed: 1,
        }));

    let report = build_report(&output);
    assert_eq!(report["entries"]["total"], 16);
    assert_eq!(report["entries"]["by_type"]["Guide"], 2);
    assert_eq!(report["images"]["failed"], 1);
    let files = report["images"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], "doc/rationale.html");
    assert_eq!(
        files[0]["assets"][1]["source_url"],
        "https://cdn.test/gone.png"
    );

    let written = write_report(out.path(), &output).unwrap();
    assert_eq!(written, out.path().join(REPORT_FILENAME));
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
    assert_eq!(parsed, report);
}
