//! Product records returned by the agent's search tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A product as the agent presents it to the chat client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub name: String,
    pub brand: Option<String>,
    /// Already formatted by the agent, e.g. `R$ 199,90`.
    pub price: Option<String>,
    pub availability: Option<String>,
    /// 0 to 5.
    pub average_rating: Option<f64>,
    pub total_reviews: Option<u64>,
    pub customers_summary: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub url: String,
}

impl Product {
    /// First image, if the agent sent any.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn is_in_stock(&self) -> bool {
        self.availability
            .as_deref()
            .is_some_and(|a| a.to_lowercase().contains("stock"))
    }
}

/// Extract the `last_search` product list from a final agent state.
///
/// Returns `None` unless `last_search` is an array. Entries that are not
/// valid products are dropped.
pub fn last_search(state: &Value) -> Option<Vec<Product>> {
    let entries = state.get("last_search")?.as_array()?;
    let products = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<Product>(entry.clone()) {
                Ok(product) => Some(product),
                Err(e) => {
                    tracing::warn!(index, error = %e, "dropping malformed product record");
                    None
                }
            }
        })
        .collect();
    Some(products)
}
