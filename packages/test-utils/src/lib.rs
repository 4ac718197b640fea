//! Deterministic fixtures for the BTC staking contract tests.
//!
//! Everything is generated in code from string seeds: BTC keys, the staking,
//! slashing and unbonding transactions of a delegation, covenant signature
//! bundles, a chain of BTC headers with inclusion proofs, and lists of
//! committed public randomness with their EOTS votes.

mod btc_chain;
mod delegation;
mod keys;
mod randomness;

pub use btc_chain::{header_hex, BtcChain, BTC_BASE_TIME, REGTEST_BITS};
pub use delegation::{funding_outpoint, funding_tx, StakingSetup, StakingTxs};
pub use keys::{covenant_keys, BtcKey};
pub use randomness::PubRandList;
