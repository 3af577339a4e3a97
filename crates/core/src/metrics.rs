//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Submission lifecycle (created, finished by outcome, chain duration)
//! - Capabilities (identification/valuation calls, timeouts)
//! - LLM providers (requests, tokens)
//! - Retention and reconciliation

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Submissions accepted and persisted.
pub static SUBMISSIONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pokevalue_submissions_created_total",
        "Total submissions accepted",
    )
    .unwrap()
});

/// Submissions that reached a terminal status, by status.
pub static SUBMISSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pokevalue_submissions_finished_total",
            "Total submissions that reached a terminal status",
        ),
        &["status"], // "COMPLETED", "ERROR_IDENTIFICATION", "ERROR_VALUATION"
    )
    .unwrap()
});

/// Image payloads rejected before a submission was created.
pub static IMAGES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pokevalue_images_rejected_total",
            "Total image payloads rejected at validation",
        ),
        &["reason"], // "empty", "not_data_uri", "mime_type", "too_large", "base64"
    )
    .unwrap()
});

/// Time from creation to terminal status.
pub static CHAIN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pokevalue_chain_duration_seconds",
            "Duration of the identification and valuation chain",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 180.0]),
        &["status"],
    )
    .unwrap()
});

/// Store writes that failed while recording an outcome.
pub static STORE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pokevalue_store_failures_total",
        "Total store failures while recording a lifecycle outcome",
    )
    .unwrap()
});

// =============================================================================
// Capability Metrics
// =============================================================================

/// Capability calls by phase and result.
pub static CAPABILITY_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pokevalue_capability_calls_total",
            "Total identification and valuation calls",
        ),
        &["phase", "result"], // result: "success", "failed", "timeout"
    )
    .unwrap()
});

/// Capability call duration in seconds.
pub static CAPABILITY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pokevalue_capability_duration_seconds",
            "Duration of identification and valuation calls",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0]),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// LLM Metrics
// =============================================================================

/// LLM requests by provider and status.
pub static LLM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pokevalue_llm_requests_total", "Total LLM requests"),
        &["provider", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pokevalue_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Maintenance Metrics
// =============================================================================

/// Finished submissions deleted by the retention sweeper.
pub static SUBMISSIONS_PURGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pokevalue_submissions_purged_total",
        "Total finished submissions purged by retention",
    )
    .unwrap()
});

/// Submissions closed at startup because their chain was interrupted.
pub static SUBMISSIONS_RECONCILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pokevalue_submissions_reconciled_total",
        "Total interrupted submissions moved to an error status",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record token usage for one LLM response.
pub fn record_llm_usage(provider: &str, input_tokens: u32, output_tokens: u32) {
    LLM_TOKENS
        .with_label_values(&[provider, "input"])
        .inc_by(u64::from(input_tokens));
    LLM_TOKENS
        .with_label_values(&[provider, "output"])
        .inc_by(u64::from(output_tokens));
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(SUBMISSIONS_CREATED.clone()),
        Box::new(SUBMISSIONS_FINISHED.clone()),
        Box::new(IMAGES_REJECTED.clone()),
        Box::new(CHAIN_DURATION.clone()),
        Box::new(STORE_FAILURES.clone()),
        // Capabilities
        Box::new(CAPABILITY_CALLS.clone()),
        Box::new(CAPABILITY_DURATION.clone()),
        // LLM
        Box::new(LLM_REQUESTS.clone()),
        Box::new(LLM_TOKENS.clone()),
        // Maintenance
        Box::new(SUBMISSIONS_PURGED.clone()),
        Box::new(SUBMISSIONS_RECONCILED.clone()),
    ]
}
