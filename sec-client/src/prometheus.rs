// metric names and reporting helpers, no exporter is installed by the library

use metrics::{counter, histogram};

pub const SEC_EVENTS_RECEIVED_TOTAL: &str = "sec_events_received_total";
pub const SEC_EVENTS_DROPPED_TOTAL: &str = "sec_events_dropped_total";
pub const SEC_BATCHES_DELIVERED_TOTAL: &str = "sec_batches_delivered_total";
pub const SEC_DELIVERY_ERRORS_TOTAL: &str = "sec_delivery_errors_total";

pub fn report_received_events(quantity: u64) {
    counter!(SEC_EVENTS_RECEIVED_TOTAL).increment(quantity);
}

pub fn report_dropped_events(cause: &'static str, quantity: u64) {
    if quantity > 0 {
        counter!(SEC_EVENTS_DROPPED_TOTAL, "cause" => cause).increment(quantity);
    }
}

pub fn report_throttled_events(quantity: u64) {
    report_dropped_events("throttled", quantity);
}

pub fn report_delivered_batch(mode: &'static str, size: usize) {
    counter!(SEC_BATCHES_DELIVERED_TOTAL, "mode" => mode).increment(1);
    histogram!("sec_event_batch_size").record(size as f64);
}

pub fn report_delivery_error(mode: &'static str) {
    counter!(SEC_DELIVERY_ERRORS_TOTAL, "mode" => mode).increment(1);
}
