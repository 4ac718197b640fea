use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{to_json_binary, Binary, Decimal, Response, StdResult, Uint128};
#[cfg(not(target_arch = "wasm32"))]
use {
    crate::state::config::Config,
    crate::state::costaking::{CostakerTracker, CurrentRewards},
    crate::state::finality::{SigningInfo, SlashedDelegation},
    babylon_apis::btc_staking_api::FinalityProvider,
    babylon_apis::finality_api::PubRandCommit,
    cw_controllers::AdminResponse,
};

use babylon_apis::btc_staking_api::{
    BTCDelegationStatus, BtcInclusionProof, CovenantSigs, FinalityProviderDescription,
    NewBtcDelegation, NewFinalityProvider,
};
use babylon_apis::finality_api::{Evidence, IndexedBlock};
use babylon_apis::rewards_api::RewardKind;
use babylon_merkle::Proof;

use crate::state::config::FinalityConfig;
use crate::state::delegations::BtcDelegation;
use crate::state::params::Params;

/// Header the light client starts from
#[cw_serde]
pub struct BtcBaseHeader {
    /// Consensus-serialized header, hex encoded
    pub header_hex: String,
    pub height: u32,
}

#[cw_serde]
#[derive(Default)]
pub struct InstantiateMsg {
    /// Version 0 of the staking parameters
    pub params: Option<Params>,
    pub finality: Option<FinalityConfig>,
    pub admin: Option<String>,
    /// Address receiving the babylon commission. Defaults to the instantiator
    pub babylon: Option<String>,
    pub btc_light_client: Option<BtcBaseHeader>,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Change the admin
    UpdateAdmin { admin: Option<String> },
    /// Append a new version of the staking parameters. Admin only
    UpdateParams { params: Params },
    /// Replace the finality configuration. Admin only
    UpdateFinalityConfig { config: FinalityConfig },
    /// Register the sender as a finality provider
    CreateFinalityProvider { fp: NewFinalityProvider },
    /// Update the description and commission of a finality provider. Owner only
    EditFinalityProvider {
        btc_pk_hex: String,
        description: Option<FinalityProviderDescription>,
        commission: Decimal,
    },
    /// Create a pending BTC delegation, staked by the sender
    CreateBtcDelegation { delegation: NewBtcDelegation },
    /// Submit the signatures of a covenant member on a delegation
    AddCovenantSigs { sigs: CovenantSigs },
    /// Prove the staking tx of a verified delegation is k-deep on Bitcoin
    AddBtcDelegationInclusionProof {
        staking_tx_hash_hex: String,
        proof: BtcInclusionProof,
    },
    /// Prove the staking output of a delegation was spent on Bitcoin
    BtcUndelegate {
        staking_tx_hash_hex: String,
        /// The tx spending the staking output, with its witness
        stake_spending_tx: Binary,
        spending_tx_inclusion_proof: BtcInclusionProof,
        /// Txs funding the other inputs of the spending tx
        funding_txs: Vec<Binary>,
    },
    /// Replace an active delegation with a bigger one, whose staking tx spends the previous
    /// staking output and `funding_tx`
    BtcStakeExpand {
        previous_staking_tx_hash_hex: String,
        delegation: NewBtcDelegation,
        funding_tx: Binary,
    },
    /// Commit a merkle root of public randomness of a finality provider
    CommitPublicRandomness {
        fp_pubkey_hex: String,
        start_height: u64,
        num_pub_rand: u64,
        commitment: Binary,
        signature: Binary,
    },
    /// Vote for a block
    SubmitFinalitySignature {
        fp_pubkey_hex: String,
        height: u64,
        pub_rand: Binary,
        proof: Proof,
        block_app_hash: Binary,
        signature: Binary,
    },
    /// Prove a finality provider signed two different blocks at the same height
    SubmitEquivocationEvidence { evidence: Evidence, proof: Proof },
    /// Unjail a finality provider. Its owner after the jail period, or the admin
    UnjailFinalityProvider { fp_pubkey_hex: String },
    /// Jail the listed finality providers from the halting height on, so that the remaining
    /// ones can finalize blocks again. Admin only
    ResumeFinality {
        fp_pks_hex: Vec<String>,
        halting_height: u64,
    },
    /// Withdraw the whole reward gauge of the given kind
    WithdrawRewards { kind: RewardKind },
    /// Deposit the attached funds as co-staking rewards
    AddCostakingRewards {},
}

#[cw_serde]
pub enum SudoMsg {
    /// Processes the expiry of delegations
    BeginBlock {
        hash_hex: String,
        app_hash_hex: String,
    },
    /// Indexes the block, tallies votes, computes the next active set and distributes rewards
    EndBlock {
        hash_hex: String,
        app_hash_hex: String,
    },
    /// Consensus-serialized BTC headers, hex encoded, each one extending a known header
    BtcHeaders { headers: Vec<String> },
    /// An epoch got finalized on Bitcoin
    EpochFinalized { epoch: u64 },
    /// The native stake of a delegator to a validator changed
    BabyDelegationChanged {
        delegator: String,
        validator: String,
        shares: Uint128,
    },
    ValidatorJailed { validator: String },
    ValidatorUnjailed { validator: String },
    ValidatorSlashed { validator: String, fraction: Decimal },
}

/// Data of executions whose fees the host may refund
#[cw_serde]
pub struct ExecuteResult {
    pub refundable: bool,
}

impl ExecuteResult {
    pub fn refundable() -> Self {
        ExecuteResult { refundable: true }
    }

    pub fn not_refundable() -> Self {
        ExecuteResult { refundable: false }
    }

    /// Sets the response data and the `refundable` attribute
    pub fn attach<T>(self, res: Response<T>) -> StdResult<Response<T>> {
        Ok(res
            .add_attribute("refundable", self.refundable.to_string())
            .set_data(to_json_binary(&self)?))
    }
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    /// `Config` returns the current configuration of the btc-staking contract
    #[returns(Config)]
    Config {},
    /// `FinalityConfig` returns the finality configuration
    #[returns(FinalityConfig)]
    FinalityConfig {},
    /// `Params` returns the given version of the staking parameters, or the latest one
    #[returns(ParamsResponse)]
    Params { version: Option<u32> },
    /// `AllParams` returns every version of the staking parameters
    #[returns(AllParamsResponse)]
    AllParams {},
    /// `Admin` returns the current admin of the contract
    #[returns(AdminResponse)]
    Admin {},
    /// `FinalityProvider` returns the finality provider by its BTC public key, in hex format
    #[returns(FinalityProvider)]
    FinalityProvider { btc_pk_hex: String },
    /// `FinalityProviders` returns the list of registered finality providers
    ///
    /// `start_after` is the BTC public key of the FP to start after, or `None` to start from the beginning
    #[returns(FinalityProvidersResponse)]
    FinalityProviders {
        start_after: Option<String>,
        limit: Option<u32>,
    },
    /// `FinalityProviderInfo` returns the finality provider information by its BTC public key,
    /// at the given height, or at the current height if `height` is `None`
    #[returns(FinalityProviderInfo)]
    FinalityProviderInfo {
        btc_pk_hex: String,
        height: Option<u64>,
    },
    /// `FinalityProvidersByPower` returns the list of finality provider infos sorted by their
    /// aggregated power, in descending order.
    ///
    /// `start_after` is the BTC public key of the FP to start after, or `None` to start from the top
    #[returns(FinalityProvidersByPowerResponse)]
    FinalityProvidersByPower {
        start_after: Option<FinalityProviderInfo>,
        limit: Option<u32>,
    },
    /// `ActiveFinalityProviders` returns the active finality provider set at the given height
    #[returns(FinalityProvidersByPowerResponse)]
    ActiveFinalityProviders { height: u64 },
    /// `SigningInfo` returns the liveness information of a finality provider
    #[returns(Option<SigningInfo>)]
    SigningInfo { btc_pk_hex: String },
    /// `Delegation` returns delegation information by its staking tx hash, in hex format
    #[returns(DelegationResponse)]
    Delegation { staking_tx_hash_hex: String },
    /// `Delegations` return the list of delegations
    ///
    /// `start_after` is the staking tx hash (in hex format) of the delegation to start after,
    /// or `None` to start from the beginning.
    /// `status` is an optional filter on the delegation status
    #[returns(BtcDelegationsResponse)]
    Delegations {
        start_after: Option<String>,
        limit: Option<u32>,
        status: Option<BTCDelegationStatus>,
    },
    /// `DelegationsByFP` returns the list of staking tx hashes (in hex format) corresponding to
    /// delegations, for a given finality provider.
    ///
    /// `btc_pk_hex` is the BTC public key of the finality provider, in hex format.
    #[returns(DelegationsByFPResponse)]
    DelegationsByFP { btc_pk_hex: String },
    /// `DelegationsByStaker` returns the delegations of a staker
    #[returns(BtcDelegationsResponse)]
    DelegationsByStaker {
        staker_addr: String,
        status: Option<BTCDelegationStatus>,
    },
    /// `SlashedDelegation` returns the assembled slashing tx of a delegation, if slashed
    #[returns(Option<SlashedDelegation>)]
    SlashedDelegation { staking_tx_hash_hex: String },
    /// `PubRandCommit` returns the public random commitments for a given FP.
    ///
    /// `btc_pk_hex` is the BTC public key of the finality provider, in hex format.
    ///
    /// `start_after` is the height of to start after (before, if `reverse` is `true`),
    /// or `None` to start from the beginning (end, if `reverse` is `true`).
    /// `limit` is the maximum number of commitments to return.
    /// `reverse` is an optional flag to return the commitments in reverse order
    #[returns(Vec<PubRandCommit>)]
    PubRandCommit {
        btc_pk_hex: String,
        start_after: Option<u64>,
        limit: Option<u32>,
        reverse: Option<bool>,
    },
    /// `PubRandCommitForHeight` returns the commitment of a FP covering the given height
    #[returns(Option<PubRandCommit>)]
    PubRandCommitForHeight { btc_pk_hex: String, height: u64 },
    /// `FirstPubRandCommit` returns the first public random commitment (if any) for a given FP.
    ///
    /// It's a convenience shortcut of `PubRandCommit` with a `limit` of 1, and `reverse` set to
    /// false.
    ///
    /// `btc_pk_hex` is the BTC public key of the finality provider, in hex format.
    #[returns(Option<PubRandCommit>)]
    FirstPubRandCommit { btc_pk_hex: String },
    /// `LastPubRandCommit` returns the last public random commitment (if any) for a given FP.
    ///
    /// It's a convenience shortcut of `PubRandCommit` with a `limit` of 1, and `reverse` set to
    /// true.
    ///
    /// `btc_pk_hex` is the BTC public key of the finality provider, in hex format.
    #[returns(Option<PubRandCommit>)]
    LastPubRandCommit { btc_pk_hex: String },
    /// `FinalitySignature` returns the signature of the finality provider for a given block height
    #[returns(FinalitySignatureResponse)]
    FinalitySignature { btc_pk_hex: String, height: u64 },
    /// `Votes` returns the BTC public keys of the finality providers that voted at the given height
    #[returns(VotesResponse)]
    Votes { height: u64 },
    /// `Block` returns the indexed block information at height
    #[returns(IndexedBlock)]
    Block { height: u64 },
    /// `Blocks` return the list of indexed blocks.
    ///
    /// `start_after` is the height of the block to start after (before, if `reverse` is `true`),
    /// or `None` to start from the beginning (end, if `reverse` is `true`).
    /// `limit` is the maximum number of blocks to return.
    /// `finalised` is an optional filter to return only finalised blocks.
    /// `reverse` is an optional flag to return the blocks in reverse order
    #[returns(BlocksResponse)]
    Blocks {
        start_after: Option<u64>,
        limit: Option<u32>,
        finalised: Option<bool>,
        reverse: Option<bool>,
    },
    /// `Evidence` returns the evidence for a given FP and block height
    #[returns(EvidenceResponse)]
    Evidence { btc_pk_hex: String, height: u64 },
    /// `ActivatedHeight` returns the height at which the contract gets its first delegation, if any
    #[returns(ActivatedHeightResponse)]
    ActivatedHeight {},
    /// `BtcTip` returns the tip of the BTC light client
    #[returns(BtcTipResponse)]
    BtcTip {},
    /// `LastFinalizedEpoch` returns the last epoch finalized on Bitcoin, if any
    #[returns(Option<u64>)]
    LastFinalizedEpoch {},
    /// `Costaker` returns the co-staking tracker of an address
    #[returns(CostakerTracker)]
    Costaker { address: String },
    /// `CurrentRewards` returns the running co-staking rewards period
    #[returns(CurrentRewards)]
    CurrentRewards {},
    /// `PendingRewards` returns the withdrawable rewards of an address, of the given kind
    #[returns(PendingRewardsResponse)]
    PendingRewards { address: String, kind: RewardKind },
}

#[cw_serde]
pub struct ParamsResponse {
    pub version: u32,
    pub params: Params,
}

#[cw_serde]
pub struct AllParamsResponse {
    pub params: Vec<ParamsResponse>,
}

#[cw_serde]
pub struct FinalityProvidersResponse {
    pub fps: Vec<babylon_apis::btc_staking_api::FinalityProvider>,
}

#[cw_serde]
pub struct FinalityProvidersByPowerResponse {
    pub fps: Vec<FinalityProviderInfo>,
}

#[cw_serde]
pub struct FinalityProviderInfo {
    /// `btc_pk_hex` is the Bitcoin secp256k1 PK of this finality provider.
    /// The PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// `power` is the aggregated power of this finality provider.
    /// The power is calculated based on the amount of BTC delegated to this finality provider
    pub power: u64,
}

#[cw_serde]
pub struct DelegationResponse {
    pub staking_tx_hash_hex: String,
    /// Status at the current BTC tip
    pub status: BTCDelegationStatus,
    pub delegation: BtcDelegation,
}

#[cw_serde]
pub struct BtcDelegationsResponse {
    pub delegations: Vec<DelegationResponse>,
}

#[cw_serde]
pub struct DelegationsByFPResponse {
    pub hashes: Vec<String>,
}

#[cw_serde]
pub struct FinalitySignatureResponse {
    pub signature: Vec<u8>,
}

#[cw_serde]
pub struct VotesResponse {
    pub btc_pks: Vec<String>,
}

#[cw_serde]
pub struct BlocksResponse {
    pub blocks: Vec<IndexedBlock>,
}

#[cw_serde]
pub struct EvidenceResponse {
    pub evidence: Option<Evidence>,
}

#[cw_serde]
pub struct ActivatedHeightResponse {
    pub height: u64,
}

#[cw_serde]
pub struct BtcTipResponse {
    pub height: u32,
    /// Block hash, in the usual (reversed) hex encoding
    pub hash_hex: String,
}

#[cw_serde]
pub struct PendingRewardsResponse {
    pub amount: Uint128,
}
