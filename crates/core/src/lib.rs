//! Protocol types and pure logic for the assembly service client.
//!
//! An *assembly* is one server-side upload-and-process job. This crate
//! models its status wire format, the classification a poll loop applies
//! to each status snapshot, the append-only accumulation of per-step
//! results, and assembly id generation. No I/O lives here.

pub mod ids;
pub mod results;
pub mod status;
