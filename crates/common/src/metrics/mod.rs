//! Metrics and observability utilities
//!
//! Prometheus metrics for the retrieval core with
//! standardized naming conventions.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// Metrics prefix for all Artalk metrics
pub const METRICS_PREFIX: &str = "artalk";

/// Histogram buckets for retrieval latency (in seconds).
/// Retrieval includes one embedding call plus a full collection scroll.
pub const RETRIEVAL_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Retrieval metrics
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of context retrievals"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Context retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_context_chunks_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks in the last expanded context"
    );

    describe_counter!(
        format!("{}_integrity_gaps_total", METRICS_PREFIX),
        Unit::Count,
        "Neighbor chunk numbers missing from their collection"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_chunks_written_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the vector index"
    );

    describe_counter!(
        format!("{}_chunks_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks skipped during ingestion"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Collection ingestion latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a context retrieval
pub fn record_retrieval(duration_secs: f64, hit_count: usize, context_count: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if success {
        gauge!(format!("{}_context_chunks_count", METRICS_PREFIX)).set(context_count as f64);
        tracing::trace!(hit_count, context_count, "Retrieval metrics recorded");
    }
}

/// Helper to record a missing neighbor
pub fn record_integrity_gap(collection: &str) {
    counter!(
        format!("{}_integrity_gaps_total", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
        tracing::trace!(batch_size, "Embedding metrics recorded");
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    let name = if hit {
        format!("{}_cache_hits_total", METRICS_PREFIX)
    } else {
        format!("{}_cache_misses_total", METRICS_PREFIX)
    };
    counter!(name, "cache" => cache_name.to_string()).increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, written: usize, skipped: usize, collection: &str) {
    counter!(
        format!("{}_chunks_written_total", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .increment(written as u64);

    counter!(
        format!("{}_chunks_skipped_total", METRICS_PREFIX),
        "collection" => collection.to_string()
    )
    .increment(skipped as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
