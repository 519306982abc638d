//! Prometheus metrics for the Agora server.
//!
//! [`ApiMetrics`] owns a dedicated [`Registry`] that the `/metrics` endpoint
//! encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct ApiMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub proposals_created: IntCounter,
    /// Accepted ballots, labelled by `vote`.
    pub ballots_accepted: IntCounterVec,
    /// Rejected ballots, labelled by `reason`.
    pub ballots_rejected: IntCounterVec,
    /// Sum of the weights of every accepted ballot.
    pub vote_weight_total: IntCounter,

    // ── Gauges (refreshed on scrape) ────────────────────────────────────
    pub realtime_clients: IntGauge,
    pub proposals_stored: IntGauge,
}

impl ApiMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    ///
    /// Registration only fails on duplicate names, which a fresh registry
    /// cannot have.
    pub fn new() -> Self {
        let registry = Registry::new();

        let proposals_created = register_int_counter_with_registry!(
            Opts::new("agora_proposals_created_total", "Proposals created"),
            registry
        )
        .expect("failed to register proposals_created counter");

        let ballots_accepted = register_int_counter_vec_with_registry!(
            Opts::new("agora_ballots_accepted_total", "Ballots applied to a tally"),
            &["vote"],
            registry
        )
        .expect("failed to register ballots_accepted counter");

        let ballots_rejected = register_int_counter_vec_with_registry!(
            Opts::new("agora_ballots_rejected_total", "Ballots refused"),
            &["reason"],
            registry
        )
        .expect("failed to register ballots_rejected counter");

        let vote_weight_total = register_int_counter_with_registry!(
            Opts::new(
                "agora_vote_weight_total",
                "Cumulative weight added to tallies"
            ),
            registry
        )
        .expect("failed to register vote_weight_total counter");

        let realtime_clients = register_int_gauge_with_registry!(
            Opts::new(
                "agora_realtime_clients",
                "Currently connected realtime clients"
            ),
            registry
        )
        .expect("failed to register realtime_clients gauge");

        let proposals_stored = register_int_gauge_with_registry!(
            Opts::new("agora_proposals_stored", "Proposals in the store"),
            registry
        )
        .expect("failed to register proposals_stored gauge");

        Self {
            registry,
            proposals_created,
            ballots_accepted,
            ballots_rejected,
            vote_weight_total,
            realtime_clients,
            proposals_stored,
        }
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let m = ApiMetrics::new();
        m.proposals_created.inc();
        m.ballots_accepted.with_label_values(&["yes"]).inc();
        m.vote_weight_total.inc_by(7);
        let text = m.encode().unwrap();
        assert!(text.contains("agora_proposals_created_total 1"));
        assert!(text.contains("agora_ballots_accepted_total{vote=\"yes\"} 1"));
        assert!(text.contains("agora_vote_weight_total 7"));
    }
}
