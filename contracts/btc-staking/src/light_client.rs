use std::str::FromStr;

use cosmwasm_std::{DepsMut, Env, Event, Response, StdResult, Storage};

use babylon_apis::btc_staking_api::{BtcInclusionProof, HASH_SIZE};
use babylon_apis::Validate;
use babylon_bindings::BabylonMsg;
use babylon_bitcoin::merkle::{split_merkle_path, verify_merkle_proof};
use babylon_bitcoin::{deserialize, serialize, BlockHash, BlockHeader, Hash, Transaction};

use crate::error::ContractError;
use crate::msg::BtcBaseHeader;
use crate::state::config::FINALITY_CONFIG;
use crate::state::finality::LAST_FINALIZED_EPOCH;
use crate::state::light_client::{BtcHeaderInfo, BTC_HEADERS, BTC_TIP, MAIN_CHAIN};

/// Read access to the BTC header chain
pub trait BtcLightClient {
    /// Height of the tip of the main chain
    fn tip_height(&self) -> Result<u32, ContractError>;

    fn header(&self, hash: &[u8; HASH_SIZE]) -> Result<Option<BtcHeaderInfo>, ContractError>;

    /// How many blocks are on top of a main chain header
    fn header_depth(&self, hash: &[u8; HASH_SIZE]) -> Result<u32, ContractError>;

    /// Whether `ancestor` is `descendant` or one of its predecessors
    fn is_ancestor(
        &self,
        ancestor: &[u8; HASH_SIZE],
        descendant: &[u8; HASH_SIZE],
    ) -> Result<bool, ContractError>;
}

/// Read access to the epochs checkpointed on Bitcoin
pub trait EpochCheckpoint {
    fn last_btc_timestamped_epoch(&self) -> StdResult<Option<u64>>;

    /// Whether every block of the epoch has been produced
    fn is_epoch_sealed(&self, epoch: u64) -> bool;
}

/// The light client backed by the headers the host reports
pub struct StoredLightClient<'a> {
    storage: &'a dyn Storage,
}

impl<'a> StoredLightClient<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    fn main_chain_header(&self, hash: &[u8; HASH_SIZE]) -> Result<BtcHeaderInfo, ContractError> {
        let info = self
            .header(hash)?
            .ok_or_else(|| ContractError::HeaderUnknown(display_hash(hash)))?;
        match MAIN_CHAIN.may_load(self.storage, info.height)? {
            Some(main) if main == info.hash => Ok(info),
            _ => Err(ContractError::HeaderNotOnMainChain(display_hash(hash))),
        }
    }
}

impl BtcLightClient for StoredLightClient<'_> {
    fn tip_height(&self) -> Result<u32, ContractError> {
        Ok(BTC_TIP
            .may_load(self.storage)?
            .map(|tip| tip.height)
            .unwrap_or_default())
    }

    fn header(&self, hash: &[u8; HASH_SIZE]) -> Result<Option<BtcHeaderInfo>, ContractError> {
        Ok(BTC_HEADERS.may_load(self.storage, hash)?)
    }

    fn header_depth(&self, hash: &[u8; HASH_SIZE]) -> Result<u32, ContractError> {
        let info = self.main_chain_header(hash)?;
        Ok(self.tip_height()?.saturating_sub(info.height))
    }

    fn is_ancestor(
        &self,
        ancestor: &[u8; HASH_SIZE],
        descendant: &[u8; HASH_SIZE],
    ) -> Result<bool, ContractError> {
        let ancestor = self
            .header(ancestor)?
            .ok_or_else(|| ContractError::HeaderUnknown(display_hash(ancestor)))?;
        let mut current = self
            .header(descendant)?
            .ok_or_else(|| ContractError::HeaderUnknown(display_hash(descendant)))?;
        while current.height > ancestor.height {
            let prev = parse_header(&current.header)?.prev_blockhash.to_byte_array();
            current = match self.header(&prev)? {
                Some(info) => info,
                None => return Ok(false),
            };
        }
        Ok(current.hash == ancestor.hash)
    }
}

/// Finalized epochs as reported by the checkpointing module
pub struct StoredCheckpoints<'a> {
    storage: &'a dyn Storage,
    height: u64,
    epoch_length: u64,
}

impl<'a> StoredCheckpoints<'a> {
    pub fn new(storage: &'a dyn Storage, height: u64, epoch_length: u64) -> Self {
        Self {
            storage,
            height,
            epoch_length,
        }
    }
}

impl EpochCheckpoint for StoredCheckpoints<'_> {
    fn last_btc_timestamped_epoch(&self) -> StdResult<Option<u64>> {
        LAST_FINALIZED_EPOCH.may_load(self.storage)
    }

    fn is_epoch_sealed(&self, epoch: u64) -> bool {
        self.height >= (epoch + 1) * self.epoch_length
    }
}

/// Epoch of the block at `height`
pub fn epoch_of(height: u64, epoch_length: u64) -> u64 {
    height / epoch_length
}

/// Hash in the usual (reversed) hex encoding
pub fn display_hash(hash: &[u8; HASH_SIZE]) -> String {
    BlockHash::from_byte_array(*hash).to_string()
}

fn parse_header(bytes: &[u8]) -> Result<BlockHeader, ContractError> {
    deserialize(bytes).map_err(|e| ContractError::InvalidHeader(e.to_string()))
}

fn header_info(header: &BlockHeader, height: u32) -> BtcHeaderInfo {
    BtcHeaderInfo {
        header: serialize(header),
        hash: header.block_hash().to_byte_array().to_vec(),
        height,
    }
}

fn hash_key(hash: &[u8]) -> Result<[u8; HASH_SIZE], ContractError> {
    hash.try_into()
        .map_err(|_| ContractError::InvalidHeader(format!("invalid hash {}", hex::encode(hash))))
}

/// Seeds the header store with the base header, which becomes the tip
pub fn init_light_client(
    storage: &mut dyn Storage,
    base: &BtcBaseHeader,
) -> Result<(), ContractError> {
    let header = parse_header(&hex::decode(&base.header_hex)?)?;
    let info = header_info(&header, base.height);
    let hash = hash_key(&info.hash)?;
    BTC_HEADERS.save(storage, &hash, &info)?;
    MAIN_CHAIN.save(storage, info.height, &info.hash)?;
    BTC_TIP.save(storage, &info)?;
    Ok(())
}

/// handle_btc_headers stores new headers, each of them extending a known header.
/// A header higher than the tip becomes the new tip, and the main chain is rewritten
/// down to the fork point
pub fn handle_btc_headers(
    deps: &mut DepsMut,
    headers: &[String],
) -> Result<Response<BabylonMsg>, ContractError> {
    let mut tip = BTC_TIP
        .may_load(deps.storage)?
        .ok_or_else(|| ContractError::HeaderUnknown("light client is not initialised".to_string()))?;
    let mut reorged_from = None;

    for header_hex in headers {
        let header = parse_header(&hex::decode(header_hex)?)?;
        let hash = header.block_hash().to_byte_array();
        if BTC_HEADERS.has(deps.storage, &hash) {
            continue;
        }
        let prev_hash = header.prev_blockhash.to_byte_array();
        let parent = BTC_HEADERS
            .may_load(deps.storage, &prev_hash)?
            .ok_or_else(|| ContractError::HeaderUnknown(header.prev_blockhash.to_string()))?;
        let info = header_info(&header, parent.height + 1);
        BTC_HEADERS.save(deps.storage, &hash, &info)?;

        if info.height > tip.height {
            if parent.hash != tip.hash {
                let fork_height = rewrite_main_chain(deps.storage, &parent)?;
                reorged_from = Some(reorged_from.map_or(fork_height, |h: u32| h.min(fork_height)));
            }
            MAIN_CHAIN.save(deps.storage, info.height, &info.hash)?;
            tip = info;
        }
    }
    BTC_TIP.save(deps.storage, &tip)?;

    let mut event = Event::new("btc_headers")
        .add_attribute("module", "btc_staking")
        .add_attribute("tip_height", tip.height.to_string())
        .add_attribute("tip_hash", display_hash(&hash_key(&tip.hash)?));
    if let Some(height) = reorged_from {
        deps.api
            .debug(&format!("BTC reorg: main chain rewritten from height {height}"));
        event = event.add_attribute("reorg_from_height", height.to_string());
    }
    Ok(Response::new().add_event(event))
}

/// Makes `from` and its predecessors the main chain, returning the height of the first
/// rewritten entry
fn rewrite_main_chain(
    storage: &mut dyn Storage,
    from: &BtcHeaderInfo,
) -> Result<u32, ContractError> {
    let mut current = from.clone();
    loop {
        match MAIN_CHAIN.may_load(storage, current.height)? {
            Some(hash) if hash == current.hash => return Ok(current.height + 1),
            _ => {
                MAIN_CHAIN.save(storage, current.height, &current.hash)?;
                let prev = parse_header(&current.header)?.prev_blockhash.to_byte_array();
                current = match BTC_HEADERS.may_load(storage, &prev)? {
                    Some(info) => info,
                    // Below the base header
                    None => return Ok(current.height),
                };
            }
        }
    }
}

/// verify_tx_inclusion checks that `tx` is in a main chain block, returning that block
pub fn verify_tx_inclusion(
    storage: &dyn Storage,
    tx: &Transaction,
    proof: &BtcInclusionProof,
) -> Result<BtcHeaderInfo, ContractError> {
    proof.validate()?;
    let block_hash = BlockHash::from_str(&proof.block_hash_hex)
        .map_err(|e| ContractError::InvalidInclusionProof(e.to_string()))?
        .to_byte_array();
    let info = StoredLightClient::new(storage).main_chain_header(&block_hash)?;
    let header = parse_header(&info.header)?;

    let path = split_merkle_path(&proof.merkle_path)
        .map_err(|e| ContractError::InvalidInclusionProof(e.to_string()))?;
    if !verify_merkle_proof(
        tx,
        &path,
        proof.tx_index as usize,
        &header.merkle_root.to_raw_hash(),
    ) {
        return Err(ContractError::InvalidInclusionProof(format!(
            "tx {} is not in block {}",
            tx.txid(),
            proof.block_hash_hex
        )));
    }
    Ok(info)
}

/// handle_epoch_finalized records an epoch checkpointed on Bitcoin. Public randomness
/// committed up to this epoch becomes usable
pub fn handle_epoch_finalized(
    deps: &mut DepsMut,
    env: &Env,
    epoch: u64,
) -> Result<Response<BabylonMsg>, ContractError> {
    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    let checkpoints = StoredCheckpoints::new(deps.storage, env.block.height, cfg.epoch_length);
    if let Some(last) = checkpoints.last_btc_timestamped_epoch()? {
        if epoch <= last {
            return Err(ContractError::EpochNotMonotonic(epoch, last));
        }
    }
    if !checkpoints.is_epoch_sealed(epoch) {
        return Err(ContractError::EpochNotSealed(epoch));
    }
    LAST_FINALIZED_EPOCH.save(deps.storage, &epoch)?;

    Ok(Response::new().add_event(
        Event::new("epoch_finalized")
            .add_attribute("module", "btc_staking")
            .add_attribute("epoch", epoch.to_string()),
    ))
}
