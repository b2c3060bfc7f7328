// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.
//!
//! The metrics themselves are emitted where the work happens; this module
//! only attaches help text so the exposition is self-describing.

use metrics::{describe_counter, describe_histogram};

/// Register all Ragline metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "ragline_ingested_urls_total",
        "Source URLs processed by ingestion, labeled by outcome"
    );
    describe_counter!(
        "ragline_chunks_stored_total",
        "Chunks written to the vector store"
    );
    describe_counter!(
        "ragline_chat_requests_total",
        "Chat turns, labeled rag, refusal, direct, error, or cancelled"
    );
    describe_histogram!(
        "ragline_retrieval_hits",
        "Context chunks selected per chat turn"
    );
    describe_counter!(
        "ragline_retry_attempts_total",
        "Retries issued against a downstream service"
    );
    describe_counter!(
        "ragline_auth_failures_total",
        "Rejected gateway credentials, labeled by error type"
    );
    describe_counter!(
        "ragline_circuit_open_total",
        "Times a circuit breaker tripped open"
    );
}
