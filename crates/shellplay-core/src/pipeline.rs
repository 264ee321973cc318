//! Generator composition with async streams.
//!
//! Four lazy stages chained by value:
//! `slow_type(upper(chars(stream_data(..))))`. Each stage owns the one before
//! it, so dropping the outermost stream releases the whole chain.

use std::io::Write;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::DemoResult;

/// Simulated async source: waits `delay` before each message, yields it,
/// then yields `separator` unless it is empty.
pub fn stream_data(
    messages: Vec<String>,
    separator: String,
    delay: Duration,
) -> impl Stream<Item = String> {
    stream::iter(messages)
        .then(move |message| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            message
        })
        .flat_map(move |message| {
            let mut items = vec![message];
            if !separator.is_empty() {
                items.push(separator.clone());
            }
            stream::iter(items)
        })
}

/// Split each string into its characters.
pub fn chars<S>(strings: S) -> impl Stream<Item = char>
where
    S: Stream<Item = String>,
{
    strings.flat_map(|s| stream::iter(s.chars().collect::<Vec<_>>()))
}

/// Uppercase every character. Characters whose uppercase form is longer
/// than one character (such as `ß`) yield each resulting character.
pub fn upper<S>(chars: S) -> impl Stream<Item = char>
where
    S: Stream<Item = char>,
{
    chars.flat_map(|c| stream::iter(c.to_uppercase()))
}

/// Yield each item, then pause for `delay` before pulling the next one.
pub fn slow_type<S>(items: S, delay: Duration) -> impl Stream<Item = S::Item>
where
    S: Stream + Unpin,
{
    stream::unfold((items, false), move |(mut items, pause)| async move {
        if pause && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let item = items.next().await?;
        Some((item, (items, true)))
    })
}

/// Build the full chain from configuration.
pub fn compose(config: &PipelineConfig) -> impl Stream<Item = char> {
    let source = stream_data(
        config.messages.clone(),
        config.separator.clone(),
        config.source_delay(),
    );
    slow_type(Box::pin(upper(chars(source))), config.char_delay())
}

/// Write every item to `out`, flushing after each so the typing effect is
/// visible. Consumes the stream; all of its stages are dropped on return,
/// including early return on a write error.
pub async fn drain<S, W>(items: S, out: &mut W) -> DemoResult<usize>
where
    S: Stream<Item = char>,
    W: Write,
{
    let mut items = Box::pin(items);
    let mut count = 0;
    let mut buf = [0u8; 4];
    while let Some(c) = items.next().await {
        out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
        out.flush()?;
        count += 1;
    }
    debug!(count, "pipeline drained");
    Ok(count)
}

/// Print the composed pipeline between a header and a footer.
pub async fn run_pipeline_demo<W: Write>(config: &PipelineConfig, out: &mut W) -> DemoResult<usize> {
    writeln!(out, "Streaming characters:\n")?;
    let count = drain(compose(config), out).await?;
    writeln!(out, "\n\nDone!")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn no_delay(messages: &[&str], separator: &str) -> PipelineConfig {
        PipelineConfig {
            messages: messages.iter().map(|m| m.to_string()).collect(),
            separator: separator.to_string(),
            source_delay_ms: 0,
            char_delay_ms: 0,
        }
    }

    /// Counts live instances; attached to a stage to observe its release.
    struct Tracker(Arc<AtomicUsize>);

    impl Tracker {
        fn new(live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self(live.clone())
        }
    }

    impl Drop for Tracker {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn tracked_source(
        messages: Vec<String>,
        live: &Arc<AtomicUsize>,
    ) -> impl Stream<Item = String> {
        let tracker = Tracker::new(live);
        stream_data(messages, String::new(), Duration::ZERO).map(move |s| {
            let _keep = &tracker;
            s
        })
    }

    /// Writer that fails after `limit` bytes.
    struct FailingWriter {
        written: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn source_interleaves_separator() {
        let items: Vec<String> = stream_data(
            vec!["a".into(), "b".into()],
            " ".into(),
            Duration::ZERO,
        )
        .collect()
        .await;
        assert_eq!(items, vec!["a", " ", "b", " "]);
    }

    #[tokio::test]
    async fn empty_separator_is_skipped() {
        let items: Vec<String> =
            stream_data(vec!["a".into(), "b".into()], String::new(), Duration::ZERO)
                .collect()
                .await;
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn pipeline_uppercases_in_order_without_loss() {
        let cfg = no_delay(&["hello", "world", "from", "async", "generators"], " ");
        let mut out = Vec::new();
        let count = drain(compose(&cfg), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "HELLO WORLD FROM ASYNC GENERATORS ");
        assert_eq!(count, text.chars().count());

        let expected: String = cfg
            .messages
            .concat()
            .chars()
            .flat_map(char::to_uppercase)
            .collect();
        let letters: String = text.chars().filter(|c| *c != ' ').collect();
        assert_eq!(letters, expected);
    }

    #[tokio::test]
    async fn multi_char_uppercase_expands() {
        let cfg = no_delay(&["straße"], "");
        let mut out = Vec::new();
        drain(compose(&cfg), &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "STRASSE");
    }

    #[tokio::test]
    async fn slow_type_preserves_items() {
        let items: Vec<u32> = slow_type(stream::iter(vec![1, 2, 3]), Duration::from_millis(1))
            .collect()
            .await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stages_released_after_drain() {
        let live = Arc::new(AtomicUsize::new(0));
        let source = tracked_source(vec!["ab".into(), "cd".into()], &live);
        let chain = slow_type(Box::pin(upper(chars(source))), Duration::ZERO);
        assert_eq!(live.load(Ordering::SeqCst), 1);

        let mut out = Vec::new();
        drain(chain, &mut out).await.unwrap();

        assert_eq!(out, b"ABCD");
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stages_released_when_consumer_fails() {
        let live = Arc::new(AtomicUsize::new(0));
        let source = tracked_source(vec!["abcdef".into()], &live);
        let chain = slow_type(Box::pin(upper(chars(source))), Duration::ZERO);

        let mut out = FailingWriter {
            written: 0,
            limit: 2,
        };
        assert!(drain(chain, &mut out).await.is_err());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn demo_prints_header_and_footer() {
        let cfg = no_delay(&["hi"], "");
        let mut out = Vec::new();
        let count = run_pipeline_demo(&cfg, &mut out).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Streaming characters:\n\nHI\n\nDone!\n"
        );
    }
}
