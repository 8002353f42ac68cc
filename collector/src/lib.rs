//! # Swift Health Collector
//!
//! Turns the text printed by `swift-recon` and `swift-dispersion-report` into
//! Prometheus gauges.
//!
//! ## Architecture
//!
//! - **`transcript`**: rewrites the Python literal dialect into JSON and splits a
//!   transcript into per-host payloads
//! - **`recon`** / **`dispersion`**: one [`Task`] per diagnostic category. A task
//!   runs its command, decodes the transcript and updates its own gauges
//! - **`registry`**: the [`Collector`] that hands cached gauges to a
//!   `prometheus::Registry`. It never runs a command
//! - **`scraper`**: the background loop driving every task's update and
//!   applying failure hysteresis to the exit code gauges

#[macro_use]
extern crate tracing;

pub mod clock;
pub mod command;
pub mod dispersion;
pub mod error;
pub mod metrics;
pub mod recon;
pub mod registry;
pub mod scraper;
pub mod task;
pub mod transcript;

pub use clock::{
    Clock,
    FixedClock,
    SystemClock,
};
pub use error::{
    CommandError,
    TaskError,
    TaskErrorKind,
};
pub use metrics::ExitCodeGauge;
pub use registry::{
    add_task,
    Collector,
};
pub use scraper::Scraper;
pub use task::{
    ExitCode,
    Query,
    QueryOutcome,
    Task,
};
