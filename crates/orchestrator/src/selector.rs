//! Offer ranking.
//!
//! Only the first item of each provider is considered. The score weighs a
//! normalized price against available capacity:
//!
//! ```text
//! price_score    = 1 / (1 + price / 1000)
//! capacity_score = min(capacity / 100, 1)
//! score          = 0.6 * price_score + 0.4 * capacity_score
//! ```

use domain::protocol::payload::{self, coerce_f64};
use serde::Serialize;
use serde_json::Value;

pub const PRICE_WEIGHT: f64 = 0.6;
pub const CAPACITY_WEIGHT: f64 = 0.4;
/// Price at which the price score halves.
pub const PRICE_SCALE: f64 = 1000.0;
/// Capacity (kW) at which the capacity score saturates.
pub const CAPACITY_SCALE: f64 = 100.0;
/// Price assumed for items that do not quote one.
pub const MISSING_PRICE: f64 = 999_999.0;

/// One item a provider offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferItem {
    pub id: String,
    pub price: f64,
    /// Available capacity in kW.
    pub capacity: f64,
}

impl OfferItem {
    /// Reads an item from a catalog entry.
    ///
    /// Returns `None` if the id is missing or a numeric field is present but
    /// not a number.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let price = match value.pointer("/price/value") {
            Some(raw) => coerce_f64(raw)?,
            None => MISSING_PRICE,
        };
        let capacity = match value.pointer("/quantity/available/count") {
            Some(raw) => coerce_f64(raw)?,
            None => 0.0,
        };
        Some(Self {
            id,
            price,
            capacity,
        })
    }

    pub fn score(&self) -> f64 {
        let price_score = 1.0 / (1.0 + self.price / PRICE_SCALE);
        let capacity_score = (self.capacity / CAPACITY_SCALE).min(1.0);
        PRICE_WEIGHT * price_score + CAPACITY_WEIGHT * capacity_score
    }
}

/// A provider and the items it listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub provider_id: String,
    pub items: Vec<OfferItem>,
}

impl Offer {
    pub fn new(provider_id: impl Into<String>, items: Vec<OfferItem>) -> Self {
        Self {
            provider_id: provider_id.into(),
            items,
        }
    }

    /// Reads a provider entry from a catalog. Items are read up to the first
    /// malformed one.
    pub fn from_value(value: &Value) -> Option<Self> {
        let provider_id = value.get("id")?.as_str()?.to_string();
        let items = value
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map_while(OfferItem::from_value).collect())
            .unwrap_or_default();
        Some(Self { provider_id, items })
    }
}

/// Extracts the offers listed in an ON_DISCOVER payload.
pub fn offers_from_catalog(payload: &Value) -> Vec<Offer> {
    payload::catalog_providers(payload)
        .iter()
        .filter_map(Offer::from_value)
        .collect()
}

/// The winning offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedOffer {
    pub provider_id: String,
    pub item_id: String,
    pub price: f64,
    pub capacity: f64,
    pub score: f64,
}

/// Picks the offer with the highest score.
///
/// Ties keep the earlier offer. Offers without items or with a non-finite
/// score are skipped.
pub fn select_best(offers: &[Offer]) -> Option<SelectedOffer> {
    let mut best: Option<SelectedOffer> = None;

    for offer in offers {
        let Some(item) = offer.items.first() else {
            continue;
        };
        let score = item.score();
        if !score.is_finite() {
            tracing::debug!(provider_id = %offer.provider_id, "offer skipped: score is not finite");
            continue;
        }
        tracing::debug!(
            provider_id = %offer.provider_id,
            price = item.price,
            capacity = item.capacity,
            score,
            "offer ranked"
        );

        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(SelectedOffer {
                provider_id: offer.provider_id.clone(),
                item_id: item.id.clone(),
                price: item.price,
                capacity: item.capacity,
                score,
            });
        }
    }

    best
}
