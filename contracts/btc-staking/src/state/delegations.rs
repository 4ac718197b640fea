use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Order, StdResult, Storage, Uint128};
use cw_storage_plus::{Index, IndexList, IndexedMap, KeyDeserialize, Map, MultiIndex};

use babylon_apis::btc_staking_api::{
    BTCDelegationStatus, CovenantAdaptorSignatures, SignatureInfo, HASH_SIZE,
};
use babylon_apis::Bytes;

use crate::error::ContractError;
use crate::state::points_alignment::PointsAlignment;

#[cw_serde]
pub struct BtcDelegation {
    /// staker_addr is the address to receive rewards from BTC delegation
    pub staker_addr: Addr,
    /// btc_pk_hex is the Bitcoin secp256k1 PK of the BTC delegator.
    /// The PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// fp_btc_pk_list is the list of BIP-340 PKs of the finality providers that
    /// this BTC delegation delegates to
    pub fp_btc_pk_list: Vec<String>,
    /// native_fp is the finality provider of this chain the stake is restaked to.
    /// It is the one getting voting power from this delegation
    pub native_fp: String,
    /// start_height is the BTC height of the block including the staking tx.
    /// Zero until the inclusion is proven
    pub start_height: u32,
    /// end_height is the BTC height at which the staking time-lock elapses
    pub end_height: u32,
    /// total_sat is the total BTC stakes in this delegation, quantified in satoshi
    pub total_sat: u64,
    /// staking_time is the staking time-lock, in BTC blocks
    pub staking_time: u32,
    /// staking_tx is the staking tx
    pub staking_tx: Bytes,
    /// staking_output_idx is the index of the staking output in the staking tx
    pub staking_output_idx: u32,
    /// slashing_tx is the slashing tx
    pub slashing_tx: Bytes,
    /// delegator_slashing_sig is the signature on the slashing tx
    /// by the delegator (i.e. SK corresponding to btc_pk).
    /// It will be a part of the witness for the staking tx output.
    pub delegator_slashing_sig: Bytes,
    /// covenant_sigs is a list of adaptor signatures on the slashing tx
    /// by each covenant member.
    /// It will be a part of the witness for the staking tx output.
    pub covenant_sigs: Vec<CovenantAdaptorSignatures>,
    /// unbonding_time is used in unbonding output time-lock path and in slashing transactions
    /// change outputs
    pub unbonding_time: u32,
    /// undelegation_info is the undelegation info of this delegation.
    pub undelegation_info: UndelegationInfo,
    /// params version used to validate the delegation
    pub params_version: u32,
    /// stk_exp is set when this delegation expands a previous one
    pub stk_exp: Option<StakeExpansion>,
}

#[cw_serde]
pub struct UndelegationInfo {
    /// unbonding_tx is the transaction which will transfer the funds from staking
    /// output to unbonding output. Unbonding output will usually have lower timelock
    /// than staking output.
    pub unbonding_tx: Bytes,
    /// covenant_unbonding_sig_list is the list of signatures on the unbonding tx
    /// by covenant members
    pub covenant_unbonding_sig_list: Vec<SignatureInfo>,
    /// slashing_tx is the unbonding slashing tx
    pub slashing_tx: Bytes,
    /// delegator_slashing_sig is the signature on the slashing tx
    /// by the delegator (i.e. SK corresponding to btc_pk).
    /// It will be a part of the witness for the unbonding tx output.
    pub delegator_slashing_sig: Bytes,
    /// covenant_slashing_sigs is a list of adaptor signatures on the
    /// unbonding slashing tx by each covenant member
    /// It will be a part of the witness for the staking tx output.
    pub covenant_slashing_sigs: Vec<CovenantAdaptorSignatures>,
    /// delegator_unbonding_info is set once the staking output is proven spent on Bitcoin
    pub delegator_unbonding_info: Option<DelegatorUnbondingInfo>,
}

#[cw_serde]
pub struct DelegatorUnbondingInfo {
    /// spend_stake_tx is the tx that spent the staking output
    pub spend_stake_tx: Bytes,
}

#[cw_serde]
pub struct StakeExpansion {
    /// previous_staking_tx_hash is the hash of the staking tx of the expanded delegation
    pub previous_staking_tx_hash: Bytes,
    /// other_funding_tx_out is the serialized output funding the additional stake
    pub other_funding_tx_out: Bytes,
    /// previous_stk_covenant_sigs are the covenant signatures spending the previous staking
    /// output through its unbonding path
    pub previous_stk_covenant_sigs: Vec<SignatureInfo>,
}

impl BtcDelegation {
    pub fn is_unbonded_early(&self) -> bool {
        self.undelegation_info.delegator_unbonding_info.is_some()
    }

    pub fn has_covenant_quorum(&self, quorum: u32) -> bool {
        self.covenant_sigs.len() >= quorum as usize
            && self.undelegation_info.covenant_unbonding_sig_list.len() >= quorum as usize
            && self
                .stk_exp
                .as_ref()
                .map(|exp| exp.previous_stk_covenant_sigs.len() >= quorum as usize)
                .unwrap_or(true)
    }

    pub fn is_included(&self) -> bool {
        self.start_height > 0
    }

    /// BTC height from which the delegation counts as expired
    pub fn expiry_height(&self) -> u32 {
        (self.end_height + 1).saturating_sub(self.unbonding_time)
    }

    /// Status of the delegation at the given BTC tip, with `k` the confirmation depth
    pub fn get_status(&self, btc_tip: u32, k: u32, quorum: u32) -> BTCDelegationStatus {
        if self.is_unbonded_early() {
            BTCDelegationStatus::UNBONDED
        } else if !self.has_covenant_quorum(quorum) {
            BTCDelegationStatus::PENDING
        } else if !self.is_included() || btc_tip < self.start_height + k {
            BTCDelegationStatus::VERIFIED
        } else if btc_tip >= self.expiry_height() {
            BTCDelegationStatus::EXPIRED
        } else {
            BTCDelegationStatus::ACTIVE
        }
    }
}

/// Delegations by staking tx hash
pub(crate) const DELEGATIONS: Map<&[u8; HASH_SIZE], BtcDelegation> = Map::new("btc_delegations");

/// Staking tx hashes of active delegations, by the BTC height they expire at
pub(crate) const EXPIRY_QUEUE: Map<u32, Vec<Bytes>> = Map::new("expiry_queue");

/// Schedules the expiry of a delegation at `height`
pub fn schedule_expiry(
    storage: &mut dyn Storage,
    height: u32,
    staking_tx_hash: &[u8; HASH_SIZE],
) -> StdResult<()> {
    let mut hashes = EXPIRY_QUEUE.may_load(storage, height)?.unwrap_or_default();
    hashes.push(staking_tx_hash.to_vec());
    EXPIRY_QUEUE.save(storage, height, &hashes)
}

/// Removes a delegation from the expiry queue, if present
pub fn unschedule_expiry(
    storage: &mut dyn Storage,
    height: u32,
    staking_tx_hash: &[u8; HASH_SIZE],
) -> StdResult<()> {
    let Some(mut hashes) = EXPIRY_QUEUE.may_load(storage, height)? else {
        return Ok(());
    };
    hashes.retain(|hash| hash.as_slice() != staking_tx_hash.as_slice());
    if hashes.is_empty() {
        EXPIRY_QUEUE.remove(storage, height);
        Ok(())
    } else {
        EXPIRY_QUEUE.save(storage, height, &hashes)
    }
}

/// Single delegation related information - entry per `(staking hash, finality provider public key)`
/// pair, including distribution alignment
#[cw_serde]
pub struct Delegation {
    /// The delegator's address
    pub staker_addr: Addr,
    /// How many satoshis of this delegation currently give voting power to the finality
    /// provider
    pub stake: u64,
    /// Points alignment of the reward distribution
    pub points_alignment: PointsAlignment,
    /// Rewards already withdrawn by this user
    pub withdrawn_funds: Uint128,
}

#[allow(clippy::type_complexity)]
pub struct DelegationIndexes<'a> {
    // Delegations by finality provider's public key and staking hash.
    // Last type param defines the pk deserialization type
    pub rev: MultiIndex<'a, (String, Vec<u8>), Delegation, (Vec<u8>, String)>,
    // Delegations by staker's address and staking hash.
    // Last type param defines the pk deserialization type
    pub staker: MultiIndex<'a, (String, Vec<u8>), Delegation, (Vec<u8>, String)>,
}

impl<'a> IndexList<Delegation> for DelegationIndexes<'a> {
    fn get_indexes(&'_ self) -> Box<dyn Iterator<Item = &'_ dyn Index<Delegation>> + '_> {
        let v: Vec<&dyn Index<Delegation>> = vec![&self.rev, &self.staker];
        Box::new(v.into_iter())
    }
}

pub struct Delegations<'a> {
    pub delegation: IndexedMap<(&'a [u8], &'a str), Delegation, DelegationIndexes<'a>>,
}

impl<'a> Delegations<'a> {
    fn deserialize_pk(pk: &[u8]) -> (Vec<u8>, String) {
        <(Vec<u8>, String)>::from_slice(pk).unwrap() // mustn't fail
    }

    pub fn new(
        storage_key: &'static str,
        fp_subkey: &'static str,
        staker_subkey: &'static str,
    ) -> Self {
        let indexes = DelegationIndexes {
            rev: MultiIndex::new(
                |pk, _| {
                    let (staking_hash, fp) = Self::deserialize_pk(pk);
                    (fp, staking_hash)
                },
                storage_key,
                fp_subkey,
            ),
            staker: MultiIndex::new(
                |pk, del| {
                    let (staking_hash, _) = Self::deserialize_pk(pk);
                    (del.staker_addr.to_string(), staking_hash)
                },
                storage_key,
                staker_subkey,
            ),
        };
        let delegations = IndexedMap::new(storage_key, indexes);

        Self {
            delegation: delegations,
        }
    }

    /// Registers a delegation to a finality provider, without stake until it activates
    pub fn create_distribution(
        &self,
        storage: &mut dyn Storage,
        staking_tx_hash: &[u8; HASH_SIZE],
        fp_btc_pk_hex: &str,
        staker_addr: &Addr,
    ) -> Result<(), ContractError> {
        self.delegation
            .update(storage, (staking_tx_hash.as_slice(), fp_btc_pk_hex), |del| match del {
                Some(_) => Err(ContractError::DelegationToFpAlreadyExists(
                    hex::encode(staking_tx_hash),
                    fp_btc_pk_hex.to_string(),
                )),
                None => Ok(Delegation {
                    staker_addr: staker_addr.clone(),
                    stake: 0,
                    points_alignment: PointsAlignment::new(),
                    withdrawn_funds: Uint128::zero(),
                }),
            })?;
        Ok(())
    }

    pub fn delegations_by_fp(
        &self,
        storage: &dyn Storage,
        fp: &str,
    ) -> StdResult<Vec<(Vec<u8>, Delegation)>> {
        self.delegation
            .idx
            .rev
            .sub_prefix(fp.to_string())
            .range(storage, None, None, Order::Ascending)
            .map(|item| {
                let ((hash, _), del) = item?;
                Ok((hash, del))
            })
            .collect::<StdResult<Vec<(Vec<u8>, Delegation)>>>()
    }

    /// Distribution entries of a staker, as `((staking hash, fp), entry)`
    pub fn delegations_by_staker(
        &self,
        storage: &dyn Storage,
        staker: &Addr,
    ) -> StdResult<Vec<((Vec<u8>, String), Delegation)>> {
        self.delegation
            .idx
            .staker
            .sub_prefix(staker.to_string())
            .range(storage, None, None, Order::Ascending)
            .collect()
    }
}

const DELEGATIONS_KEY: &str = "delegations";
const FP_SUBKEY: &str = "fp";
const STAKER_SUBKEY: &str = "staker";

/// Indexed map for delegations and finality providers.
pub fn delegations<'a>() -> Delegations<'a> {
    Delegations::new(DELEGATIONS_KEY, FP_SUBKEY, STAKER_SUBKEY)
}
