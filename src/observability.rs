use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_LINES: Counter = Counter::new("parley.stream.lines");
pub(crate) static STREAM_EVENTS: Counter = Counter::new("parley.stream.events");
pub(crate) static STREAM_SKIPPED_EVENTS: Counter = Counter::new("parley.stream.skipped_events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_TTFE: Moments = Moments::new("parley.stream.ttfe_seconds");

pub(crate) static REPLIES_COMPLETED: Counter = Counter::new("parley.reply.completed");
pub(crate) static REPLIES_ABANDONED: Counter = Counter::new("parley.reply.abandoned");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_SKIPPED_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFE);

    collector.register_counter(&REPLIES_COMPLETED);
    collector.register_counter(&REPLIES_ABANDONED);
}
