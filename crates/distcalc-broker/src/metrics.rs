use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus metrics for the broker
pub struct BrokerMetrics {
    pub registry: Registry,

    // Expressions by lifecycle event: submitted, done, error
    pub expressions_total: IntCounterVec,

    // Tasks by lifecycle event: created, completed, timed_out, discarded
    pub tasks_total: IntCounterVec,

    pub tasks_queued: IntGauge,
    pub tasks_claimed: IntGauge,
}

impl BrokerMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let expressions_total = IntCounterVec::new(
            Opts::new("dc_expressions_total", "Expressions by lifecycle event"),
            &["event"],
        )?;
        registry.register(Box::new(expressions_total.clone()))?;

        let tasks_total = IntCounterVec::new(
            Opts::new("dc_tasks_total", "Tasks by lifecycle event"),
            &["event"],
        )?;
        registry.register(Box::new(tasks_total.clone()))?;

        let tasks_queued = IntGauge::new("dc_tasks_queued", "Tasks currently in the queue")?;
        registry.register(Box::new(tasks_queued.clone()))?;

        let tasks_claimed = IntGauge::new("dc_tasks_claimed", "Queued tasks held by a worker")?;
        registry.register(Box::new(tasks_claimed.clone()))?;

        Ok(BrokerMetrics {
            registry,
            expressions_total,
            tasks_total,
            tasks_queued,
            tasks_claimed,
        })
    }

    pub fn inc_expressions(&self, event: &str) {
        self.expressions_total.with_label_values(&[event]).inc();
    }

    pub fn add_tasks(&self, event: &str, count: usize) {
        if count > 0 {
            self.tasks_total
                .with_label_values(&[event])
                .inc_by(count as u64);
        }
    }

    /// Update queue depth gauges
    pub fn update_queue_depth(&self, queued: usize, claimed: usize) {
        self.tasks_queued.set(queued as i64);
        self.tasks_claimed.set(claimed as i64);
    }

    /// Render the registry in the text exposition format
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_counters() {
        let metrics = BrokerMetrics::new().unwrap();
        metrics.inc_expressions("submitted");
        metrics.add_tasks("created", 3);
        metrics.update_queue_depth(3, 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("dc_expressions_total{event=\"submitted\"} 1"));
        assert!(text.contains("dc_tasks_total{event=\"created\"} 3"));
        assert!(text.contains("dc_tasks_claimed 1"));
    }
}
