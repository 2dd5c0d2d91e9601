//! Multi-asset values.
//!
//! A `Value` maps asset units (`"lovelace"` or `policy_id ++ asset_name_hex`)
//! to non-negative quantities. Zero entries are never stored, so an empty
//! value means "nothing".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{LOVELACE, POLICY_ID_SIZE};
use crate::hash::{AssetName, PolicyId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("invalid quantity for {unit}: {quantity}")]
    BadQuantity { unit: String, quantity: String },

    #[error("value overflow for {0}")]
    Overflow(String),

    #[error("insufficient {unit}: need {need}, have {have}")]
    Insufficient { unit: String, need: u64, have: u64 },
}

/// A single `{unit, quantity}` entry in the shape chain providers return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub unit: String,
    pub quantity: String,
}

impl Asset {
    pub fn new(unit: impl Into<String>, quantity: u64) -> Self {
        Self {
            unit: unit.into(),
            quantity: quantity.to_string(),
        }
    }

    pub fn lovelace(quantity: u64) -> Self {
        Self::new(LOVELACE, quantity)
    }
}

/// Build the unit string for a native token.
pub fn asset_unit(policy_id: &str, asset_name_hex: &str) -> String {
    format!("{}{}", policy_id, asset_name_hex)
}

/// Unit string of a typed policy id and asset name.
pub fn token_unit(policy_id: &PolicyId, asset_name: &AssetName) -> String {
    asset_unit(&policy_id.to_hex(), &asset_name.to_hex())
}

/// Split a unit into `(policy_id, asset_name_hex)`. Lovelace has no policy.
pub fn split_unit(unit: &str) -> Option<(&str, &str)> {
    if unit == LOVELACE || unit.len() < POLICY_ID_SIZE * 2 {
        return None;
    }
    Some(unit.split_at(POLICY_ID_SIZE * 2))
}

/// A bag of assets with exact integer arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value(BTreeMap<String, u64>);

impl Value {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_lovelace(amount: u64) -> Self {
        let mut v = Self::new();
        v.insert(LOVELACE, amount);
        v
    }

    /// Parse provider `{unit, quantity}` entries, summing duplicate units.
    pub fn from_assets(assets: &[Asset]) -> Result<Self, ValueError> {
        let mut v = Self::new();
        for asset in assets {
            let q: u64 = asset.quantity.parse().map_err(|_| ValueError::BadQuantity {
                unit: asset.unit.clone(),
                quantity: asset.quantity.clone(),
            })?;
            v.add_unit(&asset.unit, q)?;
        }
        Ok(v)
    }

    /// Convert back to provider entries, lovelace first.
    pub fn to_assets(&self) -> Vec<Asset> {
        let mut out = Vec::with_capacity(self.0.len());
        if let Some(l) = self.0.get(LOVELACE) {
            out.push(Asset::lovelace(*l));
        }
        for (unit, q) in &self.0 {
            if unit != LOVELACE {
                out.push(Asset::new(unit.clone(), *q));
            }
        }
        out
    }

    fn insert(&mut self, unit: &str, amount: u64) {
        if amount == 0 {
            self.0.remove(unit);
        } else {
            self.0.insert(unit.to_string(), amount);
        }
    }

    pub fn get(&self, unit: &str) -> u64 {
        self.0.get(unit).copied().unwrap_or(0)
    }

    pub fn lovelace(&self) -> u64 {
        self.get(LOVELACE)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(u, q)| (u.as_str(), *q))
    }

    /// Non-lovelace entries.
    pub fn tokens(&self) -> impl Iterator<Item = (&str, u64)> {
        self.units().filter(|(u, _)| *u != LOVELACE)
    }

    /// Whether any unit under `policy_id` is present.
    pub fn has_policy(&self, policy_id: &str) -> bool {
        self.tokens()
            .any(|(u, _)| split_unit(u).map(|(p, _)| p == policy_id).unwrap_or(false))
    }

    /// First asset name (hex) held under `policy_id`.
    pub fn asset_name_of(&self, policy_id: &str) -> Option<String> {
        self.tokens().find_map(|(u, _)| match split_unit(u) {
            Some((p, name)) if p == policy_id => Some(name.to_string()),
            _ => None,
        })
    }

    pub fn add_unit(&mut self, unit: &str, amount: u64) -> Result<(), ValueError> {
        let current = self.get(unit);
        let next = current
            .checked_add(amount)
            .ok_or_else(|| ValueError::Overflow(unit.to_string()))?;
        self.insert(unit, next);
        Ok(())
    }

    pub fn sub_unit(&mut self, unit: &str, amount: u64) -> Result<(), ValueError> {
        let current = self.get(unit);
        if current < amount {
            return Err(ValueError::Insufficient {
                unit: unit.to_string(),
                need: amount,
                have: current,
            });
        }
        self.insert(unit, current - amount);
        Ok(())
    }

    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        let mut out = self.clone();
        for (unit, q) in other.units() {
            out.add_unit(unit, q)?;
        }
        Ok(out)
    }

    /// `self - other`, failing if any unit would go negative.
    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        let mut out = self.clone();
        for (unit, q) in other.units() {
            out.sub_unit(unit, q)?;
        }
        Ok(out)
    }

    /// Whether `self` holds at least every quantity in `required`.
    pub fn covers(&self, required: &Value) -> bool {
        required.units().all(|(u, q)| self.get(u) >= q)
    }

    pub fn sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> Result<Value, ValueError> {
        let mut total = Value::new();
        for v in values {
            total = total.checked_add(v)?;
        }
        Ok(total)
    }
}
