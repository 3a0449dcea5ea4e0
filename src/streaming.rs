//! Streaming placeholder splicing
//!
//! This module owns the stream protocol of a page render: pulling chunks from
//! a source, feeding them to a [`TagScanner`], and substituting the content of
//! matched marker elements with the streams a [`MarkerHandler`] supplies.
//! Substitutions are drained fully, in order, before the source is read again,
//! so output order follows a depth-first, left-to-right walk of the markup.

use async_stream::stream;
use futures::stream::{self as futures_stream, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::handlers::MarkerHandler;
use crate::scanner::{ScanEvent, TagScanner};
use crate::types::ContentStream;

/// Substitute the content of marker elements found in `source`
///
/// For every marker the scanner reports, `handler` is asked for a
/// replacement:
///
/// - `None` leaves the element untouched. Its content is scanned like the
///   rest of the source, so markers nested in it are still resolved.
/// - `Some(stream)` emits the opening tag, then every chunk of `stream`, then
///   the element's close tag. The element's original content is dropped.
///
/// An error from the source or from a replacement stream is yielded and ends
/// the output. Dropping the output drops any replacement being drained.
///
/// # Examples
///
/// ```rust,ignore
/// use html_placeholder::streaming::{from_chunks, splice};
/// use html_placeholder::TagScanner;
///
/// let page = splice(
///     from_chunks(vec![r#"<div id="clock">--:--</div>"#.to_string()]),
///     TagScanner::new(),
///     |id: &str| (id == "clock").then(|| from_chunks(vec!["12:00".to_string()])),
/// );
/// assert_eq!(collect_string(page).await?, r#"<div id="clock">12:00</div>"#);
/// ```
pub fn splice<S, H>(source: S, mut scanner: TagScanner, mut handler: H) -> ContentStream
where
    S: Stream<Item = Result<String>> + Send + 'static,
    H: MarkerHandler + 'static,
{
    Box::pin(stream! {
        let mut source = Box::pin(source);
        // Depth of markers nested inside content being dropped
        let mut skipping: Option<usize> = None;
        let mut finished = false;

        while !finished {
            let events = match source.next().await {
                Some(Ok(chunk)) => scanner.feed(&chunk),
                Some(Err(error)) => {
                    yield Err(error);
                    return;
                }
                None => {
                    finished = true;
                    scanner.finish()
                }
            };

            for event in events {
                match event {
                    ScanEvent::Text(text) => {
                        if skipping.is_none() {
                            yield Ok(text);
                        }
                    }
                    ScanEvent::Marker(tag) => {
                        if let Some(depth) = skipping.as_mut() {
                            if !tag.self_closing {
                                *depth += 1;
                            }
                            continue;
                        }

                        let replacement = handler.resolve(&tag.id);
                        let self_closing = tag.self_closing;
                        yield Ok(tag.raw);

                        if let Some(mut nested) = replacement {
                            while let Some(chunk) = nested.next().await {
                                match chunk {
                                    Ok(chunk) => {
                                        yield Ok(chunk);
                                    }
                                    Err(error) => {
                                        yield Err(error);
                                        return;
                                    }
                                }
                            }
                            if !self_closing {
                                skipping = Some(0);
                            }
                        }
                    }
                    ScanEvent::Malformed(reason) => handler.malformed(&reason),
                    ScanEvent::MarkerEnd(close) => match skipping {
                        Some(0) | None => {
                            skipping = None;
                            if !close.is_empty() {
                                yield Ok(close);
                            }
                        }
                        Some(depth) => skipping = Some(depth - 1),
                    },
                }
            }
        }
    })
}

/// Decode a byte-chunk source into text chunks
///
/// Code points split across chunks are held back until complete. Invalid
/// UTF-8, or input ending inside a code point, ends the stream with
/// [`Error::UpstreamFailure`].
pub fn decode_utf8<S>(source: S) -> ContentStream
where
    S: Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static,
{
    Box::pin(stream! {
        let mut source = Box::pin(source);
        let mut pending: Vec<u8> = Vec::new();
        let mut offset = 0usize;

        while let Some(bytes) = source.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(error) => {
                    yield Err(Error::UpstreamFailure(error));
                    return;
                }
            };
            pending.extend_from_slice(&bytes);

            let valid = match std::str::from_utf8(&pending) {
                Ok(_) => Ok(pending.len()),
                Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
                Err(e) => Err(e.valid_up_to()),
            };
            match valid {
                Ok(0) => {}
                Ok(valid) => {
                    let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
                    pending.drain(..valid);
                    offset += valid;
                    yield Ok(text);
                }
                Err(at) => {
                    yield Err(Error::upstream(format!(
                        "invalid UTF-8 at byte {}",
                        offset + at
                    )));
                    return;
                }
            }
        }

        if !pending.is_empty() {
            yield Err(Error::upstream(format!(
                "input ended inside a UTF-8 sequence at byte {}",
                offset
            )));
        }
    })
}

/// A content stream over ready-made chunks
pub fn from_chunks<I>(chunks: I) -> ContentStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures_stream::iter(chunks.into_iter().map(Ok::<String, Error>)))
}

/// Drain a content stream into one string
pub async fn collect_string(mut stream: ContentStream) -> Result<String> {
    let mut output = String::new();
    while let Some(chunk) = stream.next().await {
        output.push_str(&chunk?);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        reasons: Arc<Mutex<Vec<String>>>,
    }

    impl MarkerHandler for Recorder {
        fn resolve(&mut self, id: &str) -> Option<ContentStream> {
            lookup(id)
        }

        fn malformed(&mut self, reason: &str) {
            self.reasons.lock().unwrap().push(reason.to_string());
        }
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn lookup(id: &str) -> Option<ContentStream> {
        match id {
            "a" => Some(from_chunks(vec!["A1".to_string(), "A2".to_string()])),
            "b" => Some(from_chunks(vec!["B".to_string()])),
            _ => None,
        }
    }

    async fn run(input: &str) -> Result<String> {
        let page = splice(
            from_chunks(vec![input.to_string()]),
            TagScanner::new(),
            lookup,
        );
        collect_string(page).await
    }

    #[tokio::test]
    async fn test_substitutes_content() {
        let output = run(r#"x<div id="a">old</div>y<p id="b"></p>z"#).await.unwrap();
        assert_eq!(output, r#"x<div id="a">A1A2</div>y<p id="b">B</p>z"#);
    }

    #[tokio::test]
    async fn test_unknown_marker_content_still_resolved() {
        let input = r#"<div id="unknown">keep <span id="a">this</span></div><i id="b">x</i>"#;
        let output = run(input).await.unwrap();
        assert_eq!(
            output,
            r#"<div id="unknown">keep <span id="a">A1A2</span></div><i id="b">B</i>"#
        );
    }

    #[tokio::test]
    async fn test_unknown_wrappers_nested_around_marker() {
        let input = r#"<main id="app"><div id="layout"><p id="b">old</p></div></main>"#;
        let output = run(input).await.unwrap();
        assert_eq!(
            output,
            r#"<main id="app"><div id="layout"><p id="b">B</p></div></main>"#
        );
    }

    #[tokio::test]
    async fn test_implicitly_closed_marker_keeps_following_source() {
        let output = run(r#"<ul><li id="a">old<li>two</ul><footer>tail</footer>"#)
            .await
            .unwrap();
        assert_eq!(output, r#"<ul><li id="a">A1A2<li>two</ul><footer>tail</footer>"#);
    }

    #[tokio::test]
    async fn test_unclosed_marker_reported_as_malformed() {
        let recorder = Recorder::default();
        let page = splice(
            from_chunks(vec![r#"<div id="a">never closed"#.to_string()]),
            TagScanner::new(),
            recorder.clone(),
        );
        let output = collect_string(page).await.unwrap();
        assert_eq!(output, r#"<div id="a">A1A2"#);
        assert_eq!(
            *recorder.reasons.lock().unwrap(),
            vec!["marker a not closed before end of input".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dropping_output_drops_nested_stream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let mut page = splice(
            from_chunks(vec![r#"<div id="slow">old</div>rest"#.to_string()]),
            TagScanner::new(),
            move |_: &str| -> Option<ContentStream> {
                let guard = DropFlag(flag.clone());
                Some(Box::pin(stream! {
                    let _guard = guard;
                    yield Ok("first".to_string());
                    future::pending::<()>().await;
                }))
            },
        );

        assert_eq!(page.next().await.unwrap().unwrap(), r#"<div id="slow">"#);
        assert_eq!(page.next().await.unwrap().unwrap(), "first");
        assert!(!dropped.load(Ordering::SeqCst));

        drop(page);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_nested_markers_in_dropped_content() {
        let output = run(r#"<div id="a"><div id="b">inner</div>tail</div>!"#)
            .await
            .unwrap();
        assert_eq!(output, r#"<div id="a">A1A2</div>!"#);
    }

    #[tokio::test]
    async fn test_self_closing_marker() {
        let output = run(r#"<div id="a"/>after"#).await.unwrap();
        assert_eq!(output, r#"<div id="a"/>A1A2after"#);
    }

    #[tokio::test]
    async fn test_nested_error_ends_output() {
        let page = splice(
            from_chunks(vec![r#"before<div id="e"></div>after"#.to_string()]),
            TagScanner::new(),
            |_: &str| -> Option<ContentStream> {
                Some(Box::pin(futures_stream::iter(vec![
                    Ok("partial".to_string()),
                    Err(Error::scan_static("boom")),
                ])))
            },
        );
        let chunks: Vec<Result<String>> = page.collect().await;
        let ok: String = chunks
            .iter()
            .filter_map(|c| c.as_ref().ok().cloned())
            .collect();
        assert_eq!(ok, r#"before<div id="e">partial"#);
        assert!(chunks.last().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_source_error_ends_output() {
        let source = futures_stream::iter(vec![
            Ok("one".to_string()),
            Err(Error::upstream("gone".to_string())),
            Ok("two".to_string()),
        ]);
        let page = splice(source, TagScanner::new(), lookup);
        let chunks: Vec<Result<String>> = page.collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], Err(Error::UpstreamFailure(_))));
    }

    #[tokio::test]
    async fn test_decode_utf8_split_code_point() {
        let bytes = "héllo".as_bytes().to_vec();
        let source = futures_stream::iter(vec![Ok(bytes[..2].to_vec()), Ok(bytes[2..].to_vec())]);
        let text = collect_string(decode_utf8(source)).await.unwrap();
        assert_eq!(text, "héllo");
    }

    #[tokio::test]
    async fn test_decode_utf8_invalid() {
        let source = futures_stream::iter(vec![Ok(vec![b'a', 0xff, b'b'])]);
        let result = collect_string(decode_utf8(source)).await;
        assert!(matches!(result, Err(Error::UpstreamFailure(_))));
    }

    #[tokio::test]
    async fn test_decode_utf8_truncated() {
        let source = futures_stream::iter(vec![Ok(vec![b'a', 0xc3])]);
        let result = collect_string(decode_utf8(source)).await;
        assert!(result.is_err());
    }
}
