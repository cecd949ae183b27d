//! Data models for profile records
//!
//! Files (stored and pending), attachment slots, record schemas and the record
//! itself, plus the normalized server representation a record is built from.

mod file;
mod record;
mod schema;
mod slot;

pub use file::*;
pub use record::{Record, RecordParseError, ServerRecord};
pub use schema::*;
pub use slot::*;
