use prometheus::{
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub matches_total: IntCounterVec,
    pub match_jobs_in_queue: IntGauge,
    pub match_latency_seconds: HistogramVec,
    pub claims_expired_total: IntCounter,
    pub requests_expired_total: IntCounter,
    pub sweep_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let matches_total = IntCounterVec::new(
            Opts::new("matches_total", "Total match attempts by outcome"),
            &["outcome"],
        )
        .expect("valid matches_total metric");

        let match_jobs_in_queue =
            IntGauge::new("match_jobs_in_queue", "Current number of queued match jobs")
                .expect("valid match_jobs_in_queue metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of match attempts in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let claims_expired_total = IntCounter::new(
            "claims_expired_total",
            "Claims reset to searching after the acceptance window lapsed",
        )
        .expect("valid claims_expired_total metric");

        let requests_expired_total = IntCounter::new(
            "requests_expired_total",
            "Requests cancelled after their absolute ttl",
        )
        .expect("valid requests_expired_total metric");

        let sweep_duration_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "sweep_duration_seconds",
            "Duration of expiry scanner sweeps in seconds",
        ))
        .expect("valid sweep_duration_seconds metric");

        registry
            .register(Box::new(matches_total.clone()))
            .expect("register matches_total");
        registry
            .register(Box::new(match_jobs_in_queue.clone()))
            .expect("register match_jobs_in_queue");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(claims_expired_total.clone()))
            .expect("register claims_expired_total");
        registry
            .register(Box::new(requests_expired_total.clone()))
            .expect("register requests_expired_total");
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .expect("register sweep_duration_seconds");

        Self {
            registry,
            matches_total,
            match_jobs_in_queue,
            match_latency_seconds,
            claims_expired_total,
            requests_expired_total,
            sweep_duration_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
