use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::executor::block_on;
use html_placeholder::test_utils::{chunked_source, NoopModule};
use html_placeholder::{
    collect_string, ModuleDescriptor, PageRenderer, RenderConfig, ScanEvent, TagScanner,
};

fn create_renderer(widgets: usize) -> PageRenderer {
    let mut module = ModuleDescriptor::new("widget", NoopModule);
    for i in 0..widgets {
        module = module.with_static_placeholder(
            format!("w{}", i),
            format!(r#"<article class="widget"><h2>Widget {}</h2><p>Body text</p></article>"#, i),
        );
    }

    PageRenderer::builder()
        .with_module(module)
        .with_config(RenderConfig::server())
        .build()
        .unwrap()
}

fn create_page(widgets: usize) -> String {
    let mut page = String::from(
        "<!doctype html><html><head><title>Bench</title><script>var a = 1 < 2;</script></head><body>",
    );
    for i in 0..widgets {
        page.push_str(&format!(
            r#"<section class="slot" data-index="{0}"><div id="widget_w{0}">loading</div></section>"#,
            i
        ));
    }
    page.push_str("</body></html>");
    page
}

fn bench_scanner(c: &mut Criterion) {
    let page = create_page(100);

    c.bench_function("scan_page_100_markers", |b| {
        b.iter(|| {
            let mut scanner = TagScanner::new();
            let mut markers = 0;
            for event in scanner.feed(black_box(&page)).into_iter().chain(scanner.finish()) {
                if let ScanEvent::Marker(_) = event {
                    markers += 1;
                }
            }
            markers
        })
    });
}

fn bench_page_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_rendering");

    for widgets in [1, 10, 100] {
        let renderer = create_renderer(widgets);
        let page = create_page(widgets);

        group.bench_with_input(BenchmarkId::new("widgets", widgets), &page, |b, page| {
            b.iter(|| block_on(renderer.render_to_string(black_box(page))).unwrap())
        });
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_sizes");
    let renderer = create_renderer(50);
    let page = create_page(50);

    for size in [16, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("bytes", size), &size, |b, &size| {
            b.iter(|| block_on(collect_string(renderer.render(chunked_source(&page, size)))).unwrap())
        });
    }

    group.finish();
}

criterion_group!(splice_benches, bench_scanner, bench_page_rendering, bench_chunk_sizes);
criterion_main!(splice_benches);
