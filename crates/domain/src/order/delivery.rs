use serde::{Deserialize, Serialize};

/// Recipient contact and address for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

impl Delivery {
    /// Text fields with their maximum length in characters.
    pub(crate) fn texts(&self) -> [(&'static str, &str, usize); 7] {
        [
            ("name", &self.name, 255),
            ("phone", &self.phone, 64),
            ("zip", &self.zip, 32),
            ("city", &self.city, 255),
            ("address", &self.address, 255),
            ("region", &self.region, 255),
            ("email", &self.email, 255),
        ]
    }
}
