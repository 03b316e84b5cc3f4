//! Data model, extraction, storage and threshold checks for WebSphere
//! PerfServlet metrics.
//!
//! - [`extract`] turns a PerfServlet document into [`ServerRecord`]s.
//! - [`Store`] persists the records of one cell between runs.
//! - [`check`] evaluates a [`Query`] against a stored record.

#[macro_use]
extern crate tracing;

mod check;
pub mod extract;
mod metric;
pub mod record;
mod status;
mod store;

pub use check::{
    check,
    evaluate,
    Query,
};
pub use extract::{
    extract,
    parse_document,
    ExtractError,
};
pub use metric::Metric;
pub use record::{
    server_key,
    Destination,
    DestinationKind,
    ServerRecord,
};
pub use status::{
    percent,
    CheckResult,
    Status,
    Thresholds,
};
pub use store::{
    Store,
    StoreError,
};
