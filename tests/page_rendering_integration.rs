//! Integration tests for full page renders
//!
//! Covers recursive placeholder resolution, rendered-once bookkeeping, chunk
//! boundary handling and error propagation through `PageRenderer`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_stream::stream;
use futures::stream::{self, StreamExt};
use html_placeholder::assert_html_eq;
use html_placeholder::test_utils::{
    chunked_source, without_scripts, ErrorRecorder, FnModule, NoopModule,
};
use html_placeholder::{
    collect_string, decode_utf8, from_chunks, BoxError, ContentStream, Error, ErrorBus,
    ModuleDescriptor, PageRenderer, PlaceholderDescriptor, PlaceholderManifest, RenderConfig,
    Result,
};
use pretty_assertions::assert_eq;

fn layout() -> ModuleDescriptor {
    ModuleDescriptor::new("layout", NoopModule).with_static_placeholder(
        "__index",
        r#"<html><body><header id="nav_menu"></header><main id="news_feed">loading</main></body></html>"#,
    )
}

fn nav() -> ModuleDescriptor {
    ModuleDescriptor::new("nav", NoopModule)
        .with_static_placeholder("menu", "<ul><li>Home</li></ul>")
}

fn news() -> ModuleDescriptor {
    ModuleDescriptor::new("news", NoopModule)
        .with_static_placeholder("feed", r#"<article id="news_item"></article>"#)
        .with_static_placeholder("item", "<p>story</p>")
}

fn broken() -> ModuleDescriptor {
    ModuleDescriptor::new("broken", FnModule::new(|_context| Err("database down".into())))
        .with_static_placeholder("widget", "<b>never</b>")
        .with_static_placeholder("__error", "<em>unavailable</em>")
}

fn renderer(config: RenderConfig) -> (PageRenderer, ErrorRecorder) {
    let bus = Arc::new(ErrorBus::new());
    let recorder = ErrorRecorder::attach(&bus);
    let renderer = PageRenderer::builder()
        .with_module(layout())
        .with_module(nav())
        .with_module(news())
        .with_module(broken())
        .with_config(config)
        .with_error_bus(bus)
        .build()
        .unwrap();
    (renderer, recorder)
}

#[tokio::test]
async fn test_page_without_markers_is_unchanged() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let page = r#"<!doctype html><p class="x">plain <b>text</b></p><div id="unknown">keep</div>"#;

    let output = renderer.render_to_string(page).await.unwrap();
    assert_eq!(output, page);
    assert!(recorder.is_empty());
}

#[tokio::test]
async fn test_nested_placeholders_resolved() {
    let (renderer, _) = renderer(RenderConfig::server());
    let output = renderer
        .render_to_string(r#"<div id="news_feed">old</div>"#)
        .await
        .unwrap();

    assert_eq!(
        without_scripts(&output),
        r#"<div id="news_feed"><article id="news_item"><p>story</p></article></div>"#
    );
    let feed = output.find("window.__cache['news']['feed']={};").unwrap();
    let item = output.find("window.__cache['news']['item']={};").unwrap();
    assert!(feed < item);
}

#[tokio::test]
async fn test_placeholders_inside_unregistered_wrappers_resolved() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let page = r#"<div id="app"><header id="nav_menu">loading</header><main id="content"><section id="news_feed"></section></main></div>"#;

    let output = renderer.render_to_string(page).await.unwrap();
    assert_eq!(
        without_scripts(&output),
        r#"<div id="app"><header id="nav_menu"><ul><li>Home</li></ul></header><main id="content"><section id="news_feed"><article id="news_item"><p>story</p></article></section></main></div>"#
    );
    assert!(recorder.is_empty());
}

#[tokio::test]
async fn test_marker_with_omitted_end_tag_keeps_rest_of_page() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let page = r#"<ul><li id="nav_menu">old<li>two</ul><footer>tail</footer>"#;

    let output = renderer.render_to_string(page).await.unwrap();
    assert_eq!(
        without_scripts(&output),
        r#"<ul><li id="nav_menu"><ul><li>Home</li></ul><li>two</ul><footer>tail</footer>"#
    );
    assert!(recorder.is_empty());
}

#[tokio::test]
async fn test_dropping_page_drops_in_flight_render() {
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    let slow = ModuleDescriptor::new("slow", NoopModule).with_placeholder(
        PlaceholderDescriptor::new("feed", move || -> std::result::Result<ContentStream, BoxError> {
            let guard = DropFlag(flag.clone());
            Ok(Box::pin(stream! {
                let _guard = guard;
                yield Ok("first".to_string());
                futures::future::pending::<()>().await;
            }))
        }),
    );
    let renderer = PageRenderer::builder().with_module(slow).build().unwrap();

    let mut page = renderer.render(from_chunks(vec![
        r#"<div id="slow_feed"></div><footer>tail</footer>"#.to_string(),
    ]));
    loop {
        let chunk = page.next().await.unwrap().unwrap();
        if chunk == "first" {
            break;
        }
    }
    assert!(!dropped.load(Ordering::SeqCst));

    drop(page);
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_root_placeholder_render() {
    let (renderer, _) = renderer(RenderConfig::server());
    let output = renderer.render_placeholder_to_string("layout").await.unwrap();

    assert_html_eq!(
        &without_scripts(&output),
        r#"<html><body><header id="nav_menu"><ul><li>Home</li></ul></header><main id="news_feed"><article id="news_item"><p>story</p></article></main></body></html>"#
    );
    assert_eq!(output.matches("<script class=\"catberry-inline-script\">").count(), 4);
}

#[tokio::test]
async fn test_duplicate_marker_resolved_once() {
    let (renderer, _) = renderer(RenderConfig::server());
    let output = renderer
        .render_to_string(r#"<div id="nav_menu"></div><div id="nav_menu">keep</div>"#)
        .await
        .unwrap();

    assert_eq!(
        without_scripts(&output),
        r#"<div id="nav_menu"><ul><li>Home</li></ul></div><div id="nav_menu">keep</div>"#
    );
}

#[tokio::test]
async fn test_self_closing_marker() {
    let (renderer, _) = renderer(RenderConfig::server());
    let output = renderer
        .render_to_string(r#"<div id="nav_menu"/>tail"#)
        .await
        .unwrap();

    assert_eq!(
        without_scripts(&output),
        r#"<div id="nav_menu"/><ul><li>Home</li></ul>tail"#
    );
}

#[tokio::test]
async fn test_output_independent_of_chunk_boundaries() {
    let (renderer, _) = renderer(RenderConfig::server());
    let page = r#"<section><header id="nav_menu">x</header><p title="a > b">é</p><main id="news_feed"></main></section>"#;
    let expected = renderer.render_to_string(page).await.unwrap();

    for size in [1, 2, 3, 5, 8, 13, 64, 4096] {
        let stream = renderer.render(chunked_source(page, size));
        let chunks: Vec<Result<String>> = stream.collect().await;
        let output: String = chunks.into_iter().collect::<Result<Vec<_>>>().unwrap().concat();
        assert_eq!(output, expected, "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_error_placeholder_in_server_mode() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let output = renderer
        .render_to_string(r#"a<div id="broken_widget">x</div>b"#)
        .await
        .unwrap();

    assert_eq!(
        without_scripts(&output),
        r#"a<div id="broken_widget"><em>unavailable</em></div>b"#
    );
    assert_eq!(recorder.len(), 1);
    assert!(recorder.messages()[0].contains("database down"));
}

#[tokio::test]
async fn test_error_surfaces_in_strict_mode() {
    let (renderer, recorder) = renderer(RenderConfig::strict());
    let chunks: Vec<Result<String>> = renderer
        .render(from_chunks(vec![r#"a<div id="broken_widget">x</div>b"#.to_string()]))
        .collect()
        .await;

    let (ok, err): (Vec<_>, Vec<_>) = chunks.into_iter().partition(|c| c.is_ok());
    let output: String = ok.into_iter().map(|c| c.unwrap()).collect();
    assert_eq!(output, r#"a<div id="broken_widget">"#);
    assert_eq!(err.len(), 1);
    assert!(matches!(err[0], Err(Error::RenderFailure { .. })));
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_upstream_error_ends_page() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let source = stream::iter(vec![
        Ok("<p>".to_string()),
        Err(Error::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))),
        Ok("</p>".to_string()),
    ]);

    let result = collect_string(renderer.render(source)).await;
    assert!(matches!(result, Err(Error::UpstreamFailure(_))));
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_malformed_tag_reported_and_passed_through() {
    let (renderer, recorder) = renderer(RenderConfig::server());
    let page = r#"<div "odd" id="nav_menu">x</div>"#;

    let output = renderer.render_to_string(page).await.unwrap();
    assert_eq!(output, page);
    assert_eq!(recorder.len(), 1);
    assert!(recorder.messages()[0].starts_with("Scan error"));
}

#[tokio::test]
async fn test_request_cookies_reach_modules() {
    let greeting = ModuleDescriptor::new(
        "greeting",
        FnModule::new(|context| {
            if context.cookie("user") == "ada" {
                context.clear_hash();
            }
            Ok(())
        }),
    )
    .with_static_placeholder("hello", "hi");
    let renderer = PageRenderer::builder().with_module(greeting).build().unwrap();

    let page = r#"<span id="greeting_hello"></span>"#;
    let with_cookie = collect_string(
        renderer.render_with_cookies(from_chunks(vec![page.to_string()]), "user=ada; theme=dark"),
    )
    .await
    .unwrap();
    let without_cookie = renderer.render_to_string(page).await.unwrap();

    assert!(with_cookie.contains("window.location.hash = '';"));
    assert!(!without_cookie.contains("window.location.hash"));
}

#[tokio::test]
async fn test_byte_source_decoded() {
    let (renderer, _) = renderer(RenderConfig::server());
    let page = "<p>naïve</p><div id=\"nav_menu\"></div>";
    let bytes: Vec<io::Result<Vec<u8>>> = page
        .as_bytes()
        .chunks(3)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();

    let output = collect_string(renderer.render(decode_utf8(stream::iter(bytes))))
        .await
        .unwrap();
    assert_eq!(
        without_scripts(&output),
        "<p>naïve</p><div id=\"nav_menu\"><ul><li>Home</li></ul></div>"
    );
}

#[test]
fn test_browser_manifest_lists_non_root_placeholders() {
    let (renderer, _) = renderer(RenderConfig::server());
    let manifest = PlaceholderManifest::from_registry(renderer.registry());

    assert!(!manifest.contains("layout"));
    assert!(manifest.contains("nav_menu"));
    assert!(manifest.contains("news_item"));
    assert!(manifest.contains("broken_widget"));
    assert!(!manifest.contains("broken___error"));
    assert_eq!(manifest.placeholders.len(), 4);
}
