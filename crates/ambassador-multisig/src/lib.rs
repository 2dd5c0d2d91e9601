//! Multisig coordination for admin transactions.
//!
//! An admin builds a transaction with `ambassador-tx`, selecting the admins
//! whose signatures it requires, and records it with
//! [`Coordinator::initiate`]. Each selected admin then signs in their own
//! session; witnesses are verified and merged into the stored transaction.
//! Once every selected admin has signed, the transaction can be submitted.

pub mod coordinator;
pub mod decision;
pub mod error;
pub mod store;
pub mod witness;

pub use coordinator::Coordinator;
pub use decision::{decision_key, DecisionRecord, DecisionState};
pub use error::MultisigError;
pub use store::{DecisionStore, MemoryDecisionStore, Versioned};
