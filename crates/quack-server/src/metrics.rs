//! Prometheus metrics

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    analyses: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let analyses = IntCounterVec::new(
            Opts::new("quackview_analyses_total", "Analyses handled, by outcome"),
            &["outcome"],
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "quackview_analysis_duration_seconds",
            "Time from request to result",
        ))?;

        registry.register(Box::new(analyses.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            analyses,
            duration,
        })
    }

    /// Record one analysis; `outcome` is `ok` or an error kind
    pub fn observe(&self, outcome: &str, seconds: f64) {
        self.analyses.with_label_values(&[outcome]).inc();
        self.duration.observe(seconds);
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
