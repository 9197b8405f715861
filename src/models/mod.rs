//! # Data Model
//!
//! Records read from the `dlr` table and the replies decoded from the
//! status API.

pub mod pending_record;
pub mod status_result;

pub use pending_record::PendingRecord;
pub use status_result::{StatusDecision, StatusResult};
