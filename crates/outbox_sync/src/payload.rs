//! Typed pizza payload.
//!
//! The queue treats payloads as opaque JSON. This type is a convenience for
//! building the body the pizza create endpoint expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a "create pizza" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaPayload {
    /// Display name of the pizza.
    pub pizza_name: String,
    /// Who created it.
    pub created_by: String,
    /// Pizza size.
    #[serde(default = "PizzaPayload::default_size")]
    pub size: String,
    /// Toppings, in order.
    #[serde(default)]
    pub toppings: Vec<String>,
}

impl PizzaPayload {
    /// Creates a large pizza with no toppings.
    pub fn new(pizza_name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            pizza_name: pizza_name.into(),
            created_by: created_by.into(),
            size: Self::default_size(),
            toppings: Vec::new(),
        }
    }

    /// Sets the size.
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// Adds a topping.
    pub fn with_topping(mut self, topping: impl Into<String>) -> Self {
        self.toppings.push(topping.into());
        self
    }

    /// Converts to the opaque JSON payload.
    pub fn to_value(&self) -> Value {
        // A struct of strings always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn default_size() -> String {
        "Large".to_string()
    }
}
