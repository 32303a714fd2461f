//! Shared types for the order tracker workspace.

mod types;

pub use types::OrderUid;
