//! Order aggregate and its parts.

mod aggregate;
mod delivery;
mod item;
mod payment;
mod value_objects;

pub use aggregate::Order;
pub use delivery::Delivery;
pub use item::Item;
pub use payment::Payment;
pub use value_objects::Money;
