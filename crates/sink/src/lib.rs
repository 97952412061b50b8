//! Outbound collaborators: the event ingestion endpoint and the job
//! failure reporter built on top of it.

pub mod reporter;
pub mod sink;

pub use reporter::SinkReporter;
pub use sink::{EventSink, SinkError};
