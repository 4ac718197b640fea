use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Bitcoin error: {0}")]
    BitcoinError(#[from] babylon_bitcoin::error::Error),
    #[error("EOTS error: {0}")]
    EotsError(#[from] eots::Error),
    #[error("Failed to decompress bytes to a projective point")]
    DecompressPointFailed {},
    #[error("Point {0} is at infinity")]
    PointAtInfinity(String),
    #[error("Point {0} has odd y axis")]
    PointWithOddY(String),
    #[error("Failed to verify adaptor signature")]
    VerifyAdaptorSigFailed {},
    #[error("Malformed adaptor signature: expected {0} bytes, got {1}")]
    MalformedAdaptorSignature(usize, usize),
    #[error("Invalid first byte of adaptor signature: expected 0x02 or 0x03, got {0}")]
    InvalidAdaptorSignatureFirstByte(u8),
    #[error("Decryption key does not match the adaptor signature's encryption key")]
    DecryptionKeyMismatch {},
    #[error("Adaptor signature nonce is zero")]
    ZeroNonce {},
    #[error("Failed to parse bytes as a mod n scalar")]
    FailedToParseScalar {},
    #[error("Failed to parse public key: {0}")]
    FailedToParsePublicKey(String),
    #[error("Failed to parse secret key")]
    FailedToParseSecretKey {},
    #[error("Cannot create multisig script with less than 2 keys")]
    InsufficientMultisigKeys {},
    #[error("Duplicate key in list of keys")]
    DuplicateKeys {},
    #[error("Quorum cannot be greater than the number of keys")]
    QuorumExceedsKeyCount {},
    #[error("Failed to add leaf")]
    AddLeafFailed {},
    #[error("Failed to finalize taproot")]
    FinalizeTaprootFailed {},
    #[error("Script is not a leaf of the taproot tree")]
    ControlBlockNotFound {},
    #[error("Failed to compute sighash: {0}")]
    SighashFailed(String),
    #[error("Tx input count mismatch: expected {0}, got {1}")]
    TxInputCountMismatch(usize, usize),
    #[error("Tx output count mismatch: expected {0}, got {1}")]
    TxOutputCountMismatch(usize, usize),
    #[error("Prevout count mismatch: tx has {0} inputs, got {1} prevouts")]
    PrevoutCountMismatch(usize, usize),
    #[error("Tx output index not found")]
    TxOutputIndexNotFound {},
    #[error("Invalid schnorr signature: {0}")]
    InvalidSchnorrSignature(String),
    #[error("Transaction is replaceable.")]
    TxIsReplaceable {},
    #[error("Transaction has locktime.")]
    TxHasLocktime {},
    #[error("Slashing transaction must slash at least {0} satoshis")]
    InsufficientSlashingAmount(u64),
    #[error("Slashing transaction must pay to the provided slashing address")]
    InvalidSlashingAddress {},
    #[error("Invalid slashing tx change output script")]
    InvalidSlashingTxChangeOutputScript {},
    #[error("Transaction contains dust outputs")]
    TxContainsDustOutputs {},
    #[error("Slashing transaction fee must be larger than {0}")]
    InsufficientSlashingFee(u64),
    #[error("Slashing transaction min fee must be larger than 0")]
    InvalidSlashingTxMinFee {},
    #[error("Slashing transaction must not spend more than the staking transaction")]
    SlashingTxOverspend {},
    #[error("Invalid slashing rate")]
    InvalidSlashingRate {},
    #[error("Invalid funding output index {0}, tx has {1} outputs")]
    InvalidFundingOutputIndex(u32, usize),
    #[error("Slashing transaction must spend staking output")]
    StakingOutputNotSpentBySlashingTx {},
    #[error("Unbonding transaction must spend staking output")]
    StakingOutputNotSpentByUnbondingTx {},
    #[error("Staking output does not commit to the expected script")]
    StakingOutputScriptMismatch {},
    #[error("Staking output value mismatch: expected {0}, got {1}")]
    StakingOutputValueMismatch(u64, u64),
    #[error("Unbonding output does not commit to the expected script")]
    UnbondingOutputScriptMismatch {},
    #[error("Unbonding output value mismatch: expected {0}, got {1}")]
    UnbondingOutputValueMismatch(u64, u64),
    #[error("Lock time {0} does not fit in a relative time lock")]
    LockTimeTooLarge(u32),
    #[error("Malformed witness: {0}")]
    MalformedWitness(String),
    #[error("Witness does not spend through the expected script path")]
    WitnessScriptMismatch {},
    #[error("Not enough covenant signatures: got {0}, quorum {1}")]
    CovenantQuorumNotMet(usize, usize),
    #[error("Missing signature of finality provider key {0}")]
    MissingFinalityProviderKey(String),
}
