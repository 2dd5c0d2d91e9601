//! Chain-query provider for Blockfrost-compatible REST APIs.
//!
//! # Example
//!
//! ```ignore
//! use ambassador_rpc::BlockfrostProvider;
//! use ambassador_tx::ChainProvider;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = BlockfrostProvider::new(
//!         "https://cardano-preprod.blockfrost.io/api/v0",
//!         "preprod...",
//!     )
//!     .unwrap();
//!     let utxos = provider.fetch_address_utxos("addr_test1...").await.unwrap();
//!     println!("{} utxos", utxos.len());
//! }
//! ```

pub mod blockfrost;
pub mod client;
pub mod error;

pub use blockfrost::BlockfrostProvider;
pub use client::{RpcClient, RpcConfig};
pub use error::RpcError;
