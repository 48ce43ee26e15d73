use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc, Once};
use std::time::Duration;

use docset_engine::{
    content_hash, ChannelProgressSink, FetchSettings, ImageLocalizer, LocalizeError,
    LocalizerSettings, PipelineEvent, ReqwestFetcher, RetryPolicy,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-png-body";
const GIF: &[u8] = b"GIF89a-fake-gif-body";

fn localizer() -> ImageLocalizer {
    INIT.call_once(engine_logging::initialize_for_tests);
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client");
    ImageLocalizer::new(
        Arc::new(fetcher),
        LocalizerSettings {
            concurrency: 4,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
            },
        },
    )
}

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn remote_image_is_stored_by_hash_and_rewritten() {
    let server = MockServer::start().await;
    serve(&server, "/x.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let url = format!("{}/x.png", server.uri());

    let docs = TempDir::new().unwrap();
    let images = docs.path().join("images");
    let html = format!(r##"<p>Source: {url}</p><img src="{url}"><a href="#">top</a>"##);

    let page = localizer()
        .localize_page(&html, Path::new("api/core.html"), &images, docs.path())
        .await;

    let filename = format!("{}.png", content_hash(PNG));
    let local = format!("../images/{filename}");
    assert_eq!(
        page.updated_content,
        format!(r#"<p>Source: {url}</p><img src="{local}"><a href="../index.html">top</a>"#)
    );
    assert_eq!(page.results.len(), 1);
    assert!(page.results[0].success);
    assert_eq!(page.results[0].local_path.as_deref(), Some(local.as_str()));
    assert_eq!(fs::read(images.join(filename)).unwrap(), PNG);
}

#[tokio::test]
async fn identical_bytes_collapse_to_one_file_and_urls_are_fetched_once() {
    let server = MockServer::start().await;
    for route in ["/a.png", "/b.png"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
            .expect(1)
            .mount(&server)
            .await;
    }
    let a = format!("{}/a.png", server.uri());
    let b = format!("{}/b.png", server.uri());

    let docs = TempDir::new().unwrap();
    let images = docs.path().join("images");
    let html = format!(r#"<img src="{a}"><img src='{b}'><img src="{a}">"#);

    let page = localizer()
        .localize_page(&html, Path::new("index.html"), &images, docs.path())
        .await;

    let local = format!("images/{}.png", content_hash(PNG));
    assert_eq!(
        page.updated_content,
        format!(r#"<img src="{local}"><img src='{local}'><img src="{local}">"#)
    );
    let urls: Vec<_> = page.results.iter().map(|r| r.source_url.clone()).collect();
    assert_eq!(urls, vec![a, b]);
    assert_eq!(fs::read_dir(&images).unwrap().count(), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let url = format!("{}/missing.png", server.uri());

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img src="{url}">"#);
    let page = localizer()
        .localize_page(&html, Path::new("api/a.html"), &docs.path().join("images"), docs.path())
        .await;

    assert_eq!(page.updated_content, html);
    assert_eq!(page.results.len(), 1);
    assert!(!page.results[0].success);
    assert_eq!(page.results[0].source_url, url);
    assert!(page.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("http status 404"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.gif"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    serve(&server, "/flaky.gif", ResponseTemplate::new(200).set_body_raw(GIF, "image/gif")).await;
    let url = format!("{}/flaky.gif", server.uri());

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img src="{url}">"#);
    let page = localizer()
        .localize_page(&html, Path::new("a.html"), &docs.path().join("images"), docs.path())
        .await;

    assert!(page.results[0].success, "{:?}", page.results[0]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(
        page.updated_content,
        format!(r#"<img src="images/{}.gif">"#, content_hash(GIF))
    );
}

#[tokio::test]
async fn exhausted_retries_are_reported() {
    let server = MockServer::start().await;
    serve(&server, "/down.png", ResponseTemplate::new(503)).await;
    let url = format!("{}/down.png", server.uri());

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img src="{url}">"#);
    let page = localizer()
        .localize_page(&html, Path::new("a.html"), &docs.path().join("images"), docs.path())
        .await;

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(
        page.results[0].error.as_deref().map(|e| e.starts_with("failed after 3 attempts")),
        Some(true)
    );
}

#[tokio::test]
async fn content_type_wins_and_suffix_is_fallback() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/badge",
        ResponseTemplate::new(200).set_body_raw("<svg/>", "image/svg+xml; charset=utf-8"),
    )
    .await;
    serve(
        &server,
        "/photo.JPEG",
        ResponseTemplate::new(200).set_body_raw(GIF, "application/octet-stream"),
    )
    .await;
    serve(
        &server,
        "/mystery",
        ResponseTemplate::new(200).set_body_raw(PNG, "application/octet-stream"),
    )
    .await;
    let base = server.uri();

    let docs = TempDir::new().unwrap();
    let html = format!(
        r#"<img src="{base}/badge"><img src="{base}/photo.JPEG"><img src="{base}/mystery">"#
    );
    let page = localizer()
        .localize_page(&html, Path::new("index.html"), &docs.path().join("images"), docs.path())
        .await;

    assert_eq!(
        page.results[0].local_path.as_deref(),
        Some(format!("images/{}.svg", content_hash(b"<svg/>")).as_str())
    );
    assert_eq!(
        page.results[1].local_path.as_deref(),
        Some(format!("images/{}.jpg", content_hash(GIF)).as_str())
    );
    assert!(!page.results[2].success);
    assert!(page.results[2]
        .error
        .as_deref()
        .unwrap()
        .contains("unable to determine image type"));
    assert!(page.updated_content.contains(&format!("{base}/mystery")));
}

#[tokio::test]
async fn local_and_data_images_are_untouched() {
    let docs = TempDir::new().unwrap();
    let html = r##"<a href="#">x</a><img src="images/logo.png"><img src="data:image/png;base64,AAAA">"##;
    let page = localizer()
        .localize_page(html, Path::new("api/a.html"), &docs.path().join("images"), docs.path())
        .await;
    assert_eq!(page.updated_content, html);
    assert!(page.results.is_empty());
    assert!(!docs.path().join("images").exists());
}

#[tokio::test]
async fn localize_all_rewrites_in_place_and_is_idempotent() {
    let server = MockServer::start().await;
    serve(&server, "/x.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    serve(&server, "/gone.png", ResponseTemplate::new(410)).await;
    let x = format!("{}/x.png", server.uri());
    let gone = format!("{}/gone.png", server.uri());

    let docs = TempDir::new().unwrap();
    let root = docs.path();
    fs::create_dir_all(root.join("api")).unwrap();
    fs::create_dir_all(root.join("doc/deep")).unwrap();
    fs::write(root.join("index.html"), "<h1>Home</h1>").unwrap();
    fs::write(root.join("api/a.html"), format!(r#"<img src="{x}"><img src="{gone}">"#)).unwrap();
    fs::write(root.join("doc/deep/b.html"), format!(r#"<img src="{x}">"#)).unwrap();

    let summary = localizer().localize_all(root).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.files.len(), 3);
    assert!(summary.failed_pages.is_empty());

    let hash = content_hash(PNG);
    assert_eq!(
        fs::read_to_string(root.join("api/a.html")).unwrap(),
        format!(r#"<img src="../images/{hash}.png"><img src="{gone}">"#)
    );
    assert_eq!(
        fs::read_to_string(root.join("doc/deep/b.html")).unwrap(),
        format!(r#"<img src="../../images/{hash}.png">"#)
    );
    assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), "<h1>Home</h1>");
    let failed: Vec<_> = summary.files.iter().flat_map(|f| f.failures()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source_url, gone);

    // Only the failed URL is left to try, and it stays failed.
    let again = localizer().localize_all(root).await.unwrap();
    assert_eq!(again.total, 1);
    assert_eq!(again.successful, 0);
    assert_eq!(
        fs::read_to_string(root.join("doc/deep/b.html")).unwrap(),
        format!(r#"<img src="../../images/{hash}.png">"#)
    );
}

#[tokio::test]
async fn localized_page_is_a_fixed_point() {
    let docs = TempDir::new().unwrap();
    let html = r#"<img src="../images/abcd.png"><p>https://a/x.png</p>"#;
    let page = localizer()
        .localize_page(html, Path::new("api/a.html"), &docs.path().join("images"), docs.path())
        .await;
    assert_eq!(page.updated_content, html);
    assert!(page.results.is_empty());
}

#[tokio::test]
async fn missing_documents_root_is_fatal() {
    let docs = TempDir::new().unwrap();
    let err = localizer()
        .localize_all(&docs.path().join("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, LocalizeError::DocumentsRootMissing(_)));
}

#[tokio::test]
async fn angle_bracket_in_alt_text_does_not_hide_the_src() {
    let server = MockServer::start().await;
    serve(&server, "/arrow.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let url = format!("{}/arrow.png", server.uri());

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img alt="chan -> go" src="{url}">"#);
    let page = localizer()
        .localize_page(&html, Path::new("doc/a.html"), &docs.path().join("images"), docs.path())
        .await;

    let local = format!("../images/{}.png", content_hash(PNG));
    assert_eq!(page.updated_content, format!(r#"<img alt="chan -> go" src="{local}">"#));
    assert!(page.results[0].success);
    assert_eq!(page.results[0].local_path.as_deref(), Some(local.as_str()));
}

#[tokio::test]
async fn entity_encoded_src_is_rewritten() {
    let server = MockServer::start().await;
    serve(&server, "/x.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let uri = server.uri();

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img src="{uri}/x&#46;png">"#);
    let page = localizer()
        .localize_page(&html, Path::new("index.html"), &docs.path().join("images"), docs.path())
        .await;

    assert_eq!(page.results[0].source_url, format!("{uri}/x.png"));
    assert!(page.results[0].success);
    assert_eq!(
        page.updated_content,
        format!(r#"<img src="images/{}.png">"#, content_hash(PNG))
    );
}

#[tokio::test]
async fn results_follow_discovery_order_not_completion_order() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/slow.gif",
        ResponseTemplate::new(200)
            .set_body_raw(GIF, "image/gif")
            .set_delay(Duration::from_millis(300)),
    )
    .await;
    serve(&server, "/fast.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let slow = format!("{}/slow.gif", server.uri());
    let fast = format!("{}/fast.png", server.uri());

    let docs = TempDir::new().unwrap();
    let html = format!(r#"<img src="{slow}"><img src="{fast}">"#);
    let page = localizer()
        .localize_page(&html, Path::new("index.html"), &docs.path().join("images"), docs.path())
        .await;

    let urls: Vec<_> = page.results.iter().map(|r| r.source_url.as_str()).collect();
    assert_eq!(urls, vec![slow.as_str(), fast.as_str()]);
    assert!(page.results.iter().all(|r| r.success));
    assert_eq!(
        page.updated_content,
        format!(
            r#"<img src="images/{}.gif"><img src="images/{}.png">"#,
            content_hash(GIF),
            content_hash(PNG)
        )
    );
}

#[tokio::test]
async fn unreadable_page_is_reported_and_skipped() {
    let server = MockServer::start().await;
    serve(&server, "/x.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let x = format!("{}/x.png", server.uri());

    let docs = TempDir::new().unwrap();
    let root = docs.path();
    // UTF-16LE BOM followed by an unpaired surrogate.
    fs::write(root.join("broken.html"), b"\xFF\xFE<\x00p\x00\x00\xD8").unwrap();
    fs::write(root.join("good.html"), format!(r#"<img src="{x}">"#)).unwrap();

    let (tx, rx) = mpsc::channel();
    let summary = localizer()
        .localize_all_with(root, &ChannelProgressSink::new(tx))
        .await
        .unwrap();

    assert_eq!(summary.failed_pages.len(), 1);
    assert_eq!(summary.failed_pages[0].path, "broken.html");
    assert_eq!(summary.total, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files.len(), 1);
    assert_eq!(summary.files[0].path, "good.html");
    assert_eq!(
        fs::read_to_string(root.join("good.html")).unwrap(),
        format!(r#"<img src="images/{}.png">"#, content_hash(PNG))
    );
    assert!(rx.try_iter().any(|event| matches!(
        event,
        PipelineEvent::PageFailed { ref path, .. } if path == "broken.html"
    )));
}

#[tokio::test]
async fn legacy_encoded_page_keeps_its_encoding() {
    let server = MockServer::start().await;
    serve(&server, "/x.png", ResponseTemplate::new(200).set_body_raw(PNG, "image/png")).await;
    let x = format!("{}/x.png", server.uri());

    let docs = TempDir::new().unwrap();
    let page = docs.path().join("menu.html");
    let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>\
<p>Caf\xe9 cr\xe8me br\xfbl\xe9e, d\xe9j\xe0 vu, na\xefve fa\xe7ade, \xe9l\xe8ve \xe0 la r\xe9sidence.</p>"
        .to_vec();
    bytes.extend_from_slice(format!(r#"<img src="{x}"></body></html>"#).as_bytes());
    fs::write(&page, &bytes).unwrap();

    let summary = localizer().localize_all(docs.path()).await.unwrap();
    assert_eq!(summary.successful, 1);

    let written = fs::read(&page).unwrap();
    let local = format!(r#"src="images/{}.png""#, content_hash(PNG));
    assert!(written.windows(local.len()).any(|w| w == local.as_bytes()));
    assert!(written.windows(4).any(|w| w == b"Caf\xe9"));
    assert!(std::str::from_utf8(&written).is_err());
}
