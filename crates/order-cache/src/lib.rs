//! Bounded in-memory cache of order aggregates.
//!
//! The cache sits in front of the order store:
//! - [`OrderCache`] keeps immutable `Arc<Order>` snapshots keyed by their UID
//! - [`Admission`] reports what a `put` did under the capacity policy

mod cache;

pub use cache::{Admission, OrderCache};
