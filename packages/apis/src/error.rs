use hex::FromHexError;
use thiserror::Error;

use cosmwasm_std::StdError;

#[derive(Error, Debug, PartialEq)]
pub enum StakingApiError {
    #[error("{0}")]
    Std(#[from] StdError),
    #[error("{0}")]
    HexError(#[from] FromHexError),
    #[error("Staking tx hash hex string is not {0} chars long")]
    InvalidStakingTxHash(usize),
    #[error("Invalid Btc public key: {0}")]
    InvalidBtcPk(String),
    #[error("Empty Btc public key")]
    EmptyBtcPk,
    #[error("Empty proof of possession")]
    MissingPop,
    #[error("Unsupported proof of possession signature type: {0}")]
    InvalidPopSigType(i32),
    #[error("Empty chain id")]
    EmptyChainId,
    #[error("No Finality Providers Btc public keys")]
    EmptyBtcPkList,
    #[error("Duplicate Finality Provider Btc public key: {0}")]
    DuplicatedBtcPk(String),
    #[error("Empty Staking tx")]
    EmptyStakingTx,
    #[error("Empty Slashing tx")]
    EmptySlashingTx,
    #[error("Empty Unbonding tx")]
    EmptyUnbondingTx,
    #[error("Invalid staking time blocks: {0}, max: {1}")]
    ErrInvalidStakingTime(u32, u32),
    #[error("Invalid unbonding time blocks: {0}, max: {1}")]
    ErrInvalidUnbondingTime(u32, u32),
    #[error("Unbonding value {0} must be lower than the staking value {1}")]
    ErrInvalidUnbondingValue(u64, u64),
    #[error("Empty signature")]
    EmptySignature,
    #[error("Invalid signature length: expected {0}, got {1}")]
    InvalidSignatureLength(usize, usize),
    #[error("Expected {0} covenant adaptor signatures, got {1}")]
    WrongAdaptorSigCount(usize, usize),
    #[error("Invalid commission rate: {0}")]
    InvalidCommission(String),
    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),
    #[error("Description error: {0}")]
    DescriptionErr(String),
}

impl StakingApiError {
    pub fn description_err(msg: impl Into<String>) -> Self {
        StakingApiError::DescriptionErr(msg.into())
    }
}
