//! Destinations for encoded metric lines.
//!
//! Both sinks are shared by every execution unit of a run. Delivery is best
//! effort: a failed write or POST is logged and the next line goes out
//! anyway.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OutputTarget;
use crate::line_protocol::encode_all;
use crate::models::MetricPoint;

#[async_trait]
pub trait Sink: Send + Sync {
    async fn emit(&self, points: &[MetricPoint]);
}

/// Writes one line per point. The writer lock is held for a whole batch so
/// lines from concurrent units never interleave mid-line. Writes run on the
/// blocking pool, so a slow reader of stdout does not hold up async workers.
pub struct ConsoleSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self { out: Arc::new(Mutex::new(Box::new(writer))) }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn emit(&self, points: &[MetricPoint]) {
        let lines = encode_all(points);
        let count = lines.len();
        let out = self.out.clone();
        let written = tokio::task::spawn_blocking(move || {
            let mut out = out.lock();
            for line in &lines {
                if let Err(e) = writeln!(out, "{line}") {
                    warn!("failed to write datapoint to console: {}", e);
                }
            }
            if let Err(e) = out.flush() {
                warn!("failed to flush console output: {}", e);
            }
        })
        .await;
        match written {
            Ok(()) => debug!("Printed {} datapoints to STDOUT", count),
            Err(e) => warn!("console writer aborted: {}", e),
        }
    }
}

/// One POST per line to a write endpoint, over a single pooled client.
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn emit(&self, points: &[MetricPoint]) {
        let lines = encode_all(points);
        let mut failed = 0usize;
        for line in lines.iter() {
            match self.client.post(&self.url).body(line.clone()).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    failed += 1;
                    warn!("write endpoint {} answered {}", self.url, response.status());
                }
                Err(e) => {
                    failed += 1;
                    warn!("failed to send datapoint to {}: {}", self.url, e);
                }
            }
        }
        info!("Sending {} datapoints to: {} ({} failed)", lines.len(), self.url, failed);
    }
}

pub fn build_sink(target: &OutputTarget) -> Result<Arc<dyn Sink>, reqwest::Error> {
    Ok(match target {
        OutputTarget::Stdout => Arc::new(ConsoleSink::stdout()),
        OutputTarget::Http(url) => Arc::new(HttpSink::new(url.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::test_support::serve;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::collections::BTreeMap;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn point(unit: usize, seq: usize) -> MetricPoint {
        MetricPoint::new(
            "probe",
            BTreeMap::from([("unit".to_string(), unit.to_string())]),
            BTreeMap::from([("seq".to_string(), FieldValue::from(seq))]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_console_lines_stay_whole_under_concurrency() {
        let buf = SharedBuf::default();
        let sink: Arc<dyn Sink> = Arc::new(ConsoleSink::new(buf.clone()));

        let handles: Vec<_> = (0..8)
            .map(|unit| {
                let sink = sink.clone();
                tokio::spawn(async move {
                    for seq in 0..25 {
                        sink.emit(&[point(unit, seq)]).await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            assert!(line.starts_with("probe,unit="), "torn line: {line}");
            assert!(line.contains(" seq="), "torn line: {line}");
        }
    }

    struct SlowWriter(SharedBuf);

    impl Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(50));
            self.0.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_console_does_not_block_the_runtime() {
        let buf = SharedBuf::default();
        let sink = ConsoleSink::new(SlowWriter(buf.clone()));
        let points: Vec<_> = (0..4).map(|seq| point(0, seq)).collect();

        let (emitted_at, ticked_at) = tokio::join!(
            async {
                sink.emit(&points).await;
                std::time::Instant::now()
            },
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                std::time::Instant::now()
            }
        );

        assert!(ticked_at < emitted_at, "runtime thread was blocked by console writes");
        assert_eq!(buf.text().lines().count(), 4);
    }

    async fn write_endpoint(store: Arc<Mutex<Vec<String>>>) -> String {
        let router = Router::new()
            .route(
                "/write",
                post(|State(store): State<Arc<Mutex<Vec<String>>>>, body: String| async move {
                    let rejected = body.contains("seq=1");
                    store.lock().push(body);
                    if rejected {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .with_state(store);
        format!("{}/write", serve(router).await)
    }

    #[tokio::test]
    async fn test_http_posts_one_line_each_and_keeps_going() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let url = write_endpoint(store.clone()).await;
        let sink = HttpSink::new(url).unwrap();

        sink.emit(&[point(0, 0), point(0, 1), point(0, 2)]).await;

        let received = store.lock().clone();
        assert_eq!(
            received,
            vec!["probe,unit=0 seq=0", "probe,unit=0 seq=1", "probe,unit=0 seq=2"]
        );
    }

    #[tokio::test]
    async fn test_http_unreachable_endpoint_is_not_fatal() {
        let sink = HttpSink::new("http://127.0.0.1:9/write").unwrap();
        sink.emit(&[point(0, 0), point(0, 1)]).await;
    }
}
