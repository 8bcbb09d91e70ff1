//! Transaction identity as seen by the buffer pool.
//!
//! Frames record which transaction dirtied them so a commit can flush exactly
//! that transaction's pages.

pub mod id;

pub use id::{TransactionId, TransactionIdGenerator};
