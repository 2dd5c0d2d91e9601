//! Treasury UTxO selection.
//!
//! Greedy first-fit: for each native token in the requirement, take UTxOs
//! holding it in the order given until the token is covered; then take
//! remaining UTxOs until lovelace reaches the requested amount plus a
//! buffer. The buffer keeps the change output above the minimum UTxO
//! value. Change is the selected total minus the exact requirement.

use log::{debug, warn};

use ambassador_types::constants::LOVELACE;
use ambassador_types::{UTxO, Value};

use crate::TxError;

/// Result of a successful selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub selected: Vec<UTxO>,
    pub total: Value,
    /// `total - required`; empty when everything was consumed exactly.
    pub change: Value,
    /// Whether lovelace reached `required + buffer`, not only `required`.
    pub buffer_met: bool,
}

impl Selection {
    pub fn has_change(&self) -> bool {
        !self.change.is_empty()
    }
}

/// Select UTxOs from `available` covering `required`.
///
/// Fails with [`TxError::InsufficientFunds`] when no subset covers the
/// requirement. When the requirement is covered but the buffer is not,
/// the selection is still returned with `buffer_met == false`.
pub fn select_for_withdrawal(
    available: &[UTxO],
    required: &Value,
    buffer_lovelace: u64,
) -> Result<Selection, TxError> {
    let mut candidates: Vec<(UTxO, Value)> = Vec::with_capacity(available.len());
    for utxo in available {
        match utxo.value() {
            Ok(v) => candidates.push((utxo.clone(), v)),
            Err(e) => warn!("skipping {} in selection: {}", utxo.input, e),
        }
    }

    let mut taken = vec![false; candidates.len()];
    let mut total = Value::new();

    for (unit, need) in required.tokens() {
        for (i, (_, value)) in candidates.iter().enumerate() {
            if total.get(unit) >= need {
                break;
            }
            if !taken[i] && value.get(unit) > 0 {
                taken[i] = true;
                total = total.checked_add(value)?;
            }
        }
        let have = total.get(unit);
        if have < need {
            return Err(TxError::InsufficientFunds {
                unit: unit.to_string(),
                need,
                have,
            });
        }
    }

    let need_lovelace = required.lovelace();
    let target = need_lovelace.saturating_add(buffer_lovelace);
    for (i, (_, value)) in candidates.iter().enumerate() {
        if total.lovelace() >= target {
            break;
        }
        if !taken[i] {
            taken[i] = true;
            total = total.checked_add(value)?;
        }
    }

    if total.lovelace() < need_lovelace {
        return Err(TxError::InsufficientFunds {
            unit: LOVELACE.to_string(),
            need: need_lovelace,
            have: total.lovelace(),
        });
    }
    let buffer_met = total.lovelace() >= target;
    if !buffer_met {
        warn!(
            "selection covers {} lovelace but not the {} lovelace buffer; change may be below the minimum UTxO value",
            need_lovelace, buffer_lovelace
        );
    }

    let change = total.checked_sub(required)?;
    let selected: Vec<UTxO> = candidates
        .into_iter()
        .zip(taken)
        .filter_map(|((utxo, _), t)| t.then_some(utxo))
        .collect();
    debug!(
        "selected {} of {} UTxOs, total {} lovelace, change {} lovelace",
        selected.len(),
        available.len(),
        total.lovelace(),
        change.lovelace()
    );

    Ok(Selection {
        selected,
        total,
        change,
        buffer_met,
    })
}

/// Total value held by `utxos`, skipping entries with unparseable amounts.
pub fn total_balance(utxos: &[UTxO]) -> Result<Value, TxError> {
    let mut total = Value::new();
    for utxo in utxos {
        match utxo.value() {
            Ok(v) => total = total.checked_add(&v)?,
            Err(e) => warn!("skipping {} in balance: {}", utxo.input, e),
        }
    }
    Ok(total)
}

/// Fail before building when `available` cannot cover `required`.
pub fn ensure_balance(available: &Value, required: &Value) -> Result<(), TxError> {
    for (unit, need) in required.units() {
        let have = available.get(unit);
        if have < need {
            return Err(TxError::InsufficientFunds {
                unit: unit.to_string(),
                need,
                have,
            });
        }
    }
    Ok(())
}
