//! Order service: the single place that keeps the cache coherent with the store.
//!
//! - [`OrderService::get_info`] reads through the cache into the store
//! - [`OrderService::create`] writes through the store into the cache
//! - [`OrderService::restore_cache`] warms the cache at startup
//! - [`OrderService::handle_order`] is the deadline-bounded ingestion entry point

pub mod error;
mod service;

pub use error::{Result, ServiceError};
pub use service::{CreateOutcome, OrderService, RestoreReport};
