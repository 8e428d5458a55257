//! Observability utilities.

mod subscriber;
mod timer;

pub use subscriber::{env_filter, init_tracing};
pub use timer::SpanTimer;
