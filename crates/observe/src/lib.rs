//! Observability plumbing shared between the binaries: tracing
//! initialization, the panic hook and the global metrics registry.
pub mod metrics;
pub mod panic_hook;
pub mod tracing;
