use cosmwasm_std::{OverflowError, StdError};
use cw_controllers::AdminError;
use cw_utils::PaymentError;
use hex::FromHexError;
use thiserror::Error;

use babylon_apis::btc_staking_api::BTCDelegationStatus;
use babylon_apis::error::StakingApiError;
use babylon_merkle::error::MerkleError;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    StdError(#[from] StdError),
    #[error("{0}")]
    Overflow(#[from] OverflowError),
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("{0}")]
    Admin(#[from] AdminError),
    #[error("{0}")]
    HexError(#[from] FromHexError),
    #[error("{0}")]
    ApiError(#[from] StakingApiError),
    #[error("{0}")]
    MerkleError(#[from] MerkleError),
    #[error("{0}")]
    BtcStaking(#[from] babylon_btcstaking::error::Error),
    #[error("{0}")]
    Eots(#[from] eots::Error),
    #[error("Unauthorized")]
    Unauthorized,

    // Parameters
    #[error("Unknown parameters version: {0}")]
    UnknownParamVersion(u32),
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    // Finality providers
    #[error("Finality provider already exists: {0}")]
    FinalityProviderAlreadyExists(String),
    #[error("Finality provider not found: {0}")]
    FinalityProviderNotFound(String),
    #[error("Finality provider {0} is slashed")]
    FinalityProviderSlashed(String),
    #[error("Finality provider {0} is jailed")]
    FinalityProviderJailed(String),
    #[error("Finality provider {0} is not jailed")]
    FinalityProviderNotJailed(String),
    #[error("Jail period of finality provider {0} has not passed yet")]
    JailPeriodNotPassed(String),
    #[error("Finality provider {0} cannot be unjailed in the block that resumed finality")]
    UnjailBlockedByResumeFinality(String),
    #[error("Commission rate {0} is lower than the minimum {1}")]
    CommissionTooLow(String, String),
    #[error("Invalid proof of possession: {0}")]
    InvalidPop(String),
    #[error("A delegation must restake to exactly one finality provider of this chain, got {0}")]
    InvalidNativeFpCount(usize),

    // Delegations
    #[error("Staking tx hash already exists: {0}")]
    DelegationAlreadyExists(String),
    #[error("Delegation not found: {0}")]
    DelegationNotFound(String),
    #[error("Delegation to finality provider already exists: {0} {1}")]
    DelegationToFpAlreadyExists(String, String),
    #[error("Delegation is in state {actual:?}, expected {expected:?}")]
    WrongDelegationState {
        expected: BTCDelegationStatus,
        actual: BTCDelegationStatus,
    },
    #[error("Staking value {0} is out of range [{1}, {2}]")]
    StakeOutOfRange(u64, u64, u64),
    #[error("Staking time {0} is out of range [{1}, {2}]")]
    StakingTimeOutOfRange(u32, u32, u32),
    #[error("Invalid unbonding time: {0}, expected {1}")]
    InvalidUnbondingTime(u32, u32),
    #[error("Invalid unbonding value: {0}, expected {1}")]
    InvalidUnbondingValue(u64, u64),
    #[error("Invalid staking tx: {0}")]
    InvalidStakingTx(String),
    #[error("Invalid Btc tx: {0}")]
    InvalidBtcTx(String),
    #[error("Invalid delegator signature: {0}")]
    InvalidDelegatorSig(String),
    #[error("Staking tx of delegation {0} is already included in a BTC block")]
    AlreadyIncluded(String),
    #[error("Staking tx has {0} confirmations, {1} required")]
    InsufficientDepth(u32, u32),
    #[error("Spending tx has {0} confirmations, {1} required")]
    NotEnoughConfirmations(u32, u32),
    #[error("Staking time of delegation {0} is already over")]
    StakingTimeExpired(String),
    #[error("Invalid unbonding witness: {0}")]
    InvalidUnbondingWitness(String),
    #[error("Invalid stake expansion: {0}")]
    InvalidStakeExpansion(String),

    // Covenant signatures
    #[error("Unknown covenant key: {0}")]
    UnknownCovenantKey(String),
    #[error("Covenant {0} already signed delegation {1}")]
    DuplicateCovenantSig(String, String),
    #[error("Expected {0} adaptor signatures, got {1}")]
    WrongAdaptorSigCount(usize, usize),
    #[error("Invalid adaptor signature: {0}")]
    AdaptorSigInvalid(String),
    #[error("Invalid covenant signature: {0}")]
    SchnorrSigInvalid(String),

    // Light client
    #[error("BTC header not found: {0}")]
    HeaderUnknown(String),
    #[error("BTC header {0} is not on the main chain")]
    HeaderNotOnMainChain(String),
    #[error("Invalid BTC header: {0}")]
    InvalidHeader(String),
    #[error("Invalid inclusion proof: {0}")]
    InvalidInclusionProof(String),
    #[error("Finalized epoch {0} must be greater than the last finalized epoch {1}")]
    EpochNotMonotonic(u64, u64),
    #[error("Epoch {0} is not sealed yet")]
    EpochNotSealed(u64),

    // Finality
    #[error("Height {0} is lower than the finality activation height {1}")]
    HeightBeforeActivation(u64, u64),
    #[error("The request contains too few public randomness. Required minimum: {0}, actual: {1}")]
    TooFewPubRand(u64, u64),
    #[error("The start height ({0}) has overlap with the height of the highest public randomness committed ({1})")]
    InvalidPubRandHeight(u64, u64),
    #[error("Invalid commitment length: {0}")]
    InvalidCommitmentLength(usize),
    #[error("Invalid commitment signature: {0}")]
    InvalidCommitmentSignature(String),
    #[error("Finality provider {0} has not committed public randomness at height {1}")]
    PubRandNotCommitted(String, u64),
    #[error("Public randomness of finality provider {0} at height {1} is not BTC-timestamped yet")]
    PubRandCommitNotTimestamped(String, u64),
    #[error("The inclusion proof for height {0} does not correspond to the given height ({1})")]
    InvalidFinalitySigHeight(u64, u64),
    #[error("The total amount of public randomnesses in the proof ({0}) does not match the amount of public committed randomness ({1})")]
    InvalidFinalitySigAmount(u64, u64),
    #[error("Invalid public randomness inclusion proof")]
    PubRandProofInvalid,
    #[error("Invalid EOTS signature")]
    EotsSigInvalid,
    #[error("Finality provider {0} has no voting power at height {1}")]
    NoVotingPower(String, u64),
    #[error("Block {0} is not indexed")]
    BlockNotFound(u64),
    #[error("Halting height {0} must be lower than the current height {1}")]
    InvalidHaltingHeight(u64, u64),
    #[error("Failed to extract secret key: {0}")]
    SecretKeyExtraction(String),
    #[error("The finalized block {0} has a finality provider set")]
    FinalisedBlockWithFinalityProviderSet(u64),
    #[error("The finalized block {0} has no finality provider set")]
    FinalisedBlockWithoutFinalityProviderSet(u64),

    // Rewards
    #[error("Co-staking rewards must be paid in {0}")]
    InvalidRewardDenom(String),
}
