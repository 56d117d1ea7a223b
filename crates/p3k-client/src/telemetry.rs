//! Metric names recorded by the client.
//!
//! Recording goes through the `metrics` facade. Without an installed recorder
//! the macros do nothing, so hosts opt in by installing an exporter.

use metrics::{describe_counter, Unit};

/// Transport constructions (one per connection attempt).
pub const CONNECTION_ATTEMPTS: &str = "p3k.connection.attempts";

/// Transport error events, including suppressed repeats.
pub const TRANSPORT_ERRORS: &str = "p3k.transport.errors";

/// Commands handed to a connected transport.
pub const COMMANDS_SENT: &str = "p3k.commands.sent";

/// Commands dropped because the transport was not usable.
pub const COMMANDS_REJECTED: &str = "p3k.commands.rejected";

/// Response lines parsed successfully.
pub const RESPONSES_PARSED: &str = "p3k.responses.parsed";

/// Response lines dropped as unparseable.
pub const RESPONSES_REJECTED: &str = "p3k.responses.rejected";

/// Register descriptions for every client metric.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(
        CONNECTION_ATTEMPTS,
        Unit::Count,
        "Transport constructions (one per connection attempt)"
    );
    describe_counter!(TRANSPORT_ERRORS, Unit::Count, "Transport error events");
    describe_counter!(COMMANDS_SENT, Unit::Count, "Commands written to the device");
    describe_counter!(
        COMMANDS_REJECTED,
        Unit::Count,
        "Commands dropped while not connected"
    );
    describe_counter!(RESPONSES_PARSED, Unit::Count, "Response lines parsed");
    describe_counter!(RESPONSES_REJECTED, Unit::Count, "Response lines dropped as unparseable");
}
