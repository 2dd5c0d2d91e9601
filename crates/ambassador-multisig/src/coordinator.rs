//! Collecting admin signatures across sessions.
//!
//! The coordinator keeps one [`DecisionRecord`] per key in a
//! [`DecisionStore`]. Every signing round re-reads the record, merges the
//! new witnesses into the stored transaction, and writes it back at the
//! version it read. A lost race is retried against the fresh record, so
//! concurrent signers never drop each other's witnesses.

use std::sync::Arc;

use log::{debug, info, warn};

use ambassador_tx::envelope::TxEnvelope;
use ambassador_tx::{ChainProvider, TxError, Wallet};
use ambassador_types::KeyHash;

use crate::decision::{DecisionRecord, DecisionState};
use crate::store::DecisionStore;
use crate::witness::{merge, Signed};
use crate::MultisigError;

pub const DEFAULT_BUCKET: &str = "decisions";
pub const DEFAULT_MAX_RETRIES: usize = 3;

pub struct Coordinator {
    store: Arc<dyn DecisionStore>,
    provider: Arc<dyn ChainProvider>,
    bucket: String,
    max_retries: usize,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DecisionStore>, provider: Arc<dyn ChainProvider>) -> Self {
        Self {
            store,
            provider,
            bucket: DEFAULT_BUCKET.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn load(&self, key: &str) -> Result<Option<(DecisionRecord, u64)>, MultisigError> {
        match self.store.get(&self.bucket, key).await? {
            Some(v) => Ok(Some((DecisionRecord::from_json(&v.value)?, v.version))),
            None => Ok(None),
        }
    }

    async fn load_existing(&self, key: &str) -> Result<(DecisionRecord, u64), MultisigError> {
        self.load(key)
            .await?
            .ok_or_else(|| MultisigError::NoDecision(key.to_string()))
    }

    pub async fn state(&self, key: &str) -> Result<DecisionState, MultisigError> {
        match self.load(key).await? {
            Some((record, _)) => record.state(),
            None => Ok(DecisionState::NoDecision),
        }
    }

    /// Record a newly built transaction as the pending decision under `key`.
    pub async fn initiate(
        &self,
        key: &str,
        decision: &str,
        tx_hex: &str,
        selected: Vec<KeyHash>,
        threshold: u64,
    ) -> Result<DecisionState, MultisigError> {
        let tx = TxEnvelope::from_hex(tx_hex)?;
        let record = DecisionRecord::new(decision, &tx, selected, threshold)?;
        match self.store.save(&self.bucket, key, record.to_json()?, None).await {
            Ok(_) => {}
            Err(MultisigError::Conflict { .. }) => return Err(MultisigError::DecisionExists(key.to_string())),
            Err(e) => return Err(e),
        }
        info!(
            "decision {} on {}: tx {}, {} selected admins",
            decision,
            key,
            record.tx_hash,
            record.selected.len()
        );
        record.state()
    }

    /// Whether `admin` is selected for the pending decision and has not signed.
    pub async fn needs_signature(&self, key: &str, admin: &KeyHash) -> Result<bool, MultisigError> {
        match self.load(key).await? {
            Some((record, _)) if record.submitted.is_none() && record.selected.contains(admin) => {
                Ok(!record.signed()?.contains(admin))
            }
            _ => Ok(false),
        }
    }

    /// Have `wallet`, holding `admin`'s key, sign the pending transaction.
    /// Signing again after a signature is recorded changes nothing.
    pub async fn sign(
        &self,
        key: &str,
        admin: &KeyHash,
        wallet: &dyn Wallet,
    ) -> Result<DecisionState, MultisigError> {
        let (record, _) = self.load_existing(key).await?;
        if let Some(tx_hash) = &record.submitted {
            return Err(MultisigError::AlreadySubmitted {
                key: key.to_string(),
                tx_hash: tx_hash.clone(),
            });
        }
        if !record.selected.contains(admin) {
            return Err(MultisigError::NotSelected(*admin));
        }
        if record.signed()?.contains(admin) {
            debug!("{} already signed {}", admin, key);
            return record.state();
        }

        let signed_hex = wallet
            .sign_tx(&record.tx_hex, true)
            .await
            .map_err(TxError::from)?;
        let incoming = Signed::from_hex(&signed_hex)?;
        let state = self.merge_signed(key, &incoming).await?;
        let signed = match &state {
            DecisionState::Decided { signed, .. } | DecisionState::QuorumMet { signed, .. } => signed.contains(admin),
            _ => true,
        };
        if !signed {
            return Err(TxError::Invalid(format!("wallet did not produce a signature for {}", admin)).into());
        }
        Ok(state)
    }

    /// Merge externally collected signatures: a signed transaction or a
    /// bare witness set, hex encoded.
    pub async fn add_signatures(&self, key: &str, signed_hex: &str) -> Result<DecisionState, MultisigError> {
        let incoming = Signed::from_hex(signed_hex)?;
        self.merge_signed(key, &incoming).await
    }

    async fn merge_signed(&self, key: &str, incoming: &Signed) -> Result<DecisionState, MultisigError> {
        let mut attempt = 0;
        loop {
            let (mut record, version) = self.load_existing(key).await?;
            if let Some(tx_hash) = &record.submitted {
                return Err(MultisigError::AlreadySubmitted {
                    key: key.to_string(),
                    tx_hash: tx_hash.clone(),
                });
            }
            let mut tx = record.envelope()?;
            let added = merge(&mut tx, incoming)?;
            if let Some(outsider) = added.iter().find(|k| !record.selected.contains(k)) {
                return Err(MultisigError::NotSelected(*outsider));
            }
            if added.is_empty() {
                return record.state();
            }
            record.tx_hex = tx.to_hex()?;

            match self
                .store
                .save(&self.bucket, key, record.to_json()?, Some(version))
                .await
            {
                Ok(_) => {
                    let state = record.state()?;
                    info!("{} signature(s) added to {}: {:?}", added.len(), key, state);
                    return Ok(state);
                }
                Err(e @ MultisigError::Conflict { .. }) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!("{} changed while signing, merging again (attempt {})", key, attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Submit once the quorum is met and mark the decision submitted.
    pub async fn submit(&self, key: &str) -> Result<String, MultisigError> {
        let (record, _) = self.load_existing(key).await?;
        if let Some(tx_hash) = &record.submitted {
            return Err(MultisigError::AlreadySubmitted {
                key: key.to_string(),
                tx_hash: tx_hash.clone(),
            });
        }
        let signed = record.signed()?.len();
        if signed < record.required() {
            return Err(MultisigError::QuorumNotMet {
                signed,
                required: record.required(),
            });
        }

        let tx_hash = match self.provider.submit_tx(&record.tx_hex).await {
            Ok(h) => h,
            Err(e) => {
                let e = TxError::from(e);
                if e.is_recoverable() {
                    warn!("submission of {} rejected, inputs already spent: {}", key, e);
                }
                return Err(e.into());
            }
        };
        self.mark_submitted(key, &tx_hash).await?;
        info!("submitted {} as {}", key, tx_hash);
        Ok(tx_hash)
    }

    async fn mark_submitted(&self, key: &str, tx_hash: &str) -> Result<(), MultisigError> {
        let mut attempt = 0;
        loop {
            let (mut record, version) = self.load_existing(key).await?;
            record.submitted = Some(tx_hash.to_string());
            match self
                .store
                .save(&self.bucket, key, record.to_json()?, Some(version))
                .await
            {
                Ok(_) => return Ok(()),
                Err(e @ MultisigError::Conflict { .. }) if attempt >= self.max_retries => return Err(e),
                Err(MultisigError::Conflict { .. }) => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop the pending decision, e.g. after its inputs were spent elsewhere.
    pub async fn discard(&self, key: &str) -> Result<(), MultisigError> {
        self.store.delete(&self.bucket, key).await
    }
}
