//! Domain model for the order tracker.
//!
//! This crate holds the order aggregate as it travels through the system:
//! - [`Order`], the aggregate root, with its [`Delivery`], [`Payment`] and [`Item`]s
//! - [`Money`] for amounts in minor currency units
//! - [`ValidationError`] for aggregates that must not reach storage

pub mod error;
pub mod order;

pub use common::OrderUid;
pub use error::ValidationError;
pub use order::{Delivery, Item, Money, Order, Payment};
