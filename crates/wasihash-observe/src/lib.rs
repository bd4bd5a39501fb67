//! Observability setup for wasihash: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
