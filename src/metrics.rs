//! Prometheus metrics, exposed on `GET /metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static BETS_PLACED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("faircore_bets_placed_total", "Settled bets by game type"),
        &["game"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static BETS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "faircore_bets_rejected_total",
        "Bets rejected before settlement (bad params, insufficient funds)",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static IDEMPOTENT_REPLAYS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "faircore_idempotent_replays_total",
        "Requests answered from an already-settled round",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static LEDGER_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "faircore_ledger_conflicts_total",
        "Optimistic ledger commits that exhausted their retry budget",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static SEED_ROTATIONS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "faircore_seed_rotations_total",
        "Seed pair rotations performed",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static BET_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "faircore_bet_latency_seconds",
            "End-to-end bet placement latency",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Render the registry in the Prometheus text exposition format.
pub fn gather() -> String {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_and_render() {
        BETS_PLACED.with_label_values(&["dice"]).inc();
        BETS_REJECTED.inc();
        LEDGER_CONFLICTS.inc();
        let text = gather();
        assert!(text.contains("faircore_bets_placed_total"));
        assert!(text.contains("faircore_ledger_conflicts_total"));
    }
}
