//! Prometheus metrics for the crawl service.

use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

use crate::error::ServerError;

/// Outcome label values for `crawl_requests_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The engine ran and reported success.
    Success,
    /// The engine ran and reported failure.
    Failure,
    /// The URL was rejected before crawling.
    Rejected,
    /// The engine itself errored.
    Error,
}

impl CrawlOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlOutcome::Success => "success",
            CrawlOutcome::Failure => "failure",
            CrawlOutcome::Rejected => "rejected",
            CrawlOutcome::Error => "error",
        }
    }
}

/// Prometheus metrics for the crawl gateway.
pub struct Metrics {
    /// Registry for all metrics.
    registry: Registry,
    /// Total crawl requests by outcome.
    pub crawl_requests_total: CounterVec,
    /// Engine time per crawl in seconds.
    pub crawl_duration_seconds: Histogram,
    /// Cache epoch the last request resolved its settings in.
    pub config_generation: Gauge,
}

impl Metrics {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, ServerError> {
        let registry = Registry::new();

        let crawl_requests_total = CounterVec::new(
            Opts::new("crawl_requests_total", "Total number of crawl requests"),
            &["outcome"],
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

        let crawl_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "crawl_duration_seconds",
                "Time spent in the crawling engine in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

        let config_generation = Gauge::new(
            "config_generation",
            "Configuration cache epoch, incremented on every reload",
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

        registry
            .register(Box::new(crawl_requests_total.clone()))
            .map_err(|e| ServerError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(crawl_duration_seconds.clone()))
            .map_err(|e| ServerError::Metrics(e.to_string()))?;
        registry
            .register(Box::new(config_generation.clone()))
            .map_err(|e| ServerError::Metrics(e.to_string()))?;

        Ok(Self {
            registry,
            crawl_requests_total,
            crawl_duration_seconds,
            config_generation,
        })
    }

    /// Counts one request.
    pub fn record(&self, outcome: CrawlOutcome) {
        self.crawl_requests_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Records engine time for one crawl.
    pub fn observe_duration(&self, seconds: f64) {
        self.crawl_duration_seconds.observe(seconds);
    }

    /// Updates the config epoch gauge.
    pub fn set_config_generation(&self, generation: u64) {
        self.config_generation.set(generation as f64);
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, ServerError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| ServerError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| ServerError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_text_contains_recorded_values() {
        let metrics = Metrics::new().unwrap();
        metrics.record(CrawlOutcome::Success);
        metrics.record(CrawlOutcome::Success);
        metrics.record(CrawlOutcome::Rejected);
        metrics.set_config_generation(3);

        let text = metrics.gather().unwrap();
        assert!(text.contains("crawl_requests_total{outcome=\"success\"} 2"));
        assert!(text.contains("crawl_requests_total{outcome=\"rejected\"} 1"));
        assert!(text.contains("config_generation 3"));
    }
}
