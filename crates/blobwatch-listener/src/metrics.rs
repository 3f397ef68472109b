//! Metric names emitted by the trigger pipeline

pub mod names {
    // Discovery metrics
    pub const DISCOVERY_CYCLES_TOTAL: &str = "blobwatch_discovery_cycles_total";
    pub const DISCOVERY_OBJECTS_LISTED_TOTAL: &str = "blobwatch_discovery_objects_listed_total";
    pub const DISCOVERY_LISTING_FAILURES_TOTAL: &str = "blobwatch_discovery_listing_failures_total";
    pub const DISCOVERY_EVALUATION_FAILURES_TOTAL: &str =
        "blobwatch_discovery_evaluation_failures_total";
    pub const DISCOVERY_MESSAGES_ENQUEUED_TOTAL: &str =
        "blobwatch_discovery_messages_enqueued_total";
    pub const RECEIPT_CONFLICTS_TOTAL: &str = "blobwatch_receipt_conflicts_total";
    pub const RECEIPTS_PURGED_TOTAL: &str = "blobwatch_receipts_purged_total";

    // Queue metrics
    pub const QUEUE_ENQUEUE_RETRIES_TOTAL: &str = "blobwatch_queue_enqueue_retries_total";
    pub const QUEUE_MESSAGES_FETCHED_TOTAL: &str = "blobwatch_queue_messages_fetched_total";
    pub const QUEUE_MESSAGES_PROCESSED_TOTAL: &str = "blobwatch_queue_messages_processed_total";
    pub const QUEUE_MESSAGES_IN_FLIGHT: &str = "blobwatch_queue_messages_in_flight";
    pub const FUNCTION_DURATION_SECONDS: &str = "blobwatch_function_duration_seconds";
}
