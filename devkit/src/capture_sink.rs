use async_trait::async_trait;
use metric_collector::line_protocol::encode_all;
use metric_collector::models::MetricPoint;
use metric_collector::sink::Sink;
use parking_lot::Mutex;
use std::sync::Arc;

/// Sink keeping every batch it receives, in arrival order.
#[derive(Clone, Default)]
pub struct CaptureSink {
    batches: Arc<Mutex<Vec<Vec<MetricPoint>>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<MetricPoint> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn lines(&self) -> Vec<String> {
        encode_all(&self.points())
    }

    pub fn measurement(&self, name: &str) -> Vec<MetricPoint> {
        self.points().into_iter().filter(|p| p.measurement() == name).collect()
    }
}

#[async_trait]
impl Sink for CaptureSink {
    async fn emit(&self, points: &[MetricPoint]) {
        self.batches.lock().push(points.to_vec());
    }
}
