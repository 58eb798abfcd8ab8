//! Submit command implementation.

use outbox_sync::{Outbox, PizzaPayload, Submission, SyncConfig};
use serde_json::Value;
use std::path::Path;

/// What to submit.
#[derive(Debug)]
pub enum Payload {
    /// A pizza built from flags.
    Pizza {
        /// Pizza name.
        name: String,
        /// Creator.
        created_by: String,
        /// Size.
        size: String,
        /// Toppings in order.
        toppings: Vec<String>,
    },
    /// A JSON object given verbatim.
    Raw(String),
}

impl Payload {
    /// Builds the request body.
    pub fn into_value(self) -> Result<Value, Box<dyn std::error::Error>> {
        match self {
            Payload::Pizza {
                name,
                created_by,
                size,
                toppings,
            } => {
                let pizza = toppings
                    .into_iter()
                    .fold(PizzaPayload::new(name, created_by).with_size(size), |p, t| {
                        p.with_topping(t)
                    });
                Ok(pizza.to_value())
            }
            Payload::Raw(raw) => Ok(serde_json::from_str(&raw)?),
        }
    }
}

/// Runs the submit command.
pub async fn run(
    dir: &Path,
    config: SyncConfig,
    payload: Payload,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = payload.into_value()?;
    let outbox = Outbox::open(dir, config)?;

    match outbox.submit(payload).await? {
        Submission::Created(record) => {
            println!("Created: {}", serde_json::to_string(&record)?);
        }
        Submission::Queued(key) => {
            println!("Origin unreachable, saved as {key}. Run `sync` when back online.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pizza_flags_build_payload() {
        let payload = Payload::Pizza {
            name: "Hawaiian".into(),
            created_by: "tester".into(),
            size: "Medium".into(),
            toppings: vec!["ham".into(), "pineapple".into()],
        };
        assert_eq!(
            payload.into_value().unwrap(),
            json!({
                "pizzaName": "Hawaiian",
                "createdBy": "tester",
                "size": "Medium",
                "toppings": ["ham", "pineapple"],
            })
        );
    }

    #[test]
    fn raw_json_is_parsed() {
        let payload = Payload::Raw(r#"{"pizzaName":"Raw"}"#.into());
        assert_eq!(payload.into_value().unwrap(), json!({"pizzaName": "Raw"}));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Payload::Raw("{".into()).into_value().is_err());
    }
}
