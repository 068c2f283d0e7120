//! Domain types for agentpipe
//!
//! Core domain types: TaskRecord and its parts, TaskStatus, Stage.
//! All records serialize losslessly to JSON for transport and audit replay.

mod id;
mod record;
mod status;

pub use id::generate_id;
pub use record::{Analysis, Approval, ErrorDescriptor, ErrorKind, HistoryEntry, RecordError, TaskRecord};
pub use status::{Stage, TaskStatus};
