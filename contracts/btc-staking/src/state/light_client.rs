use cosmwasm_schema::cw_serde;
use cw_storage_plus::{Item, Map};

use babylon_apis::btc_staking_api::HASH_SIZE;
use babylon_apis::Bytes;

/// A BTC header known to the light client
#[cw_serde]
pub struct BtcHeaderInfo {
    /// Consensus-serialized header
    pub header: Bytes,
    /// Block hash, in internal byte order
    pub hash: Bytes,
    pub height: u32,
}

/// Every known header, by block hash
pub(crate) const BTC_HEADERS: Map<&[u8; HASH_SIZE], BtcHeaderInfo> = Map::new("btc_headers");

/// Block hashes of the main chain, by height
pub(crate) const MAIN_CHAIN: Map<u32, Bytes> = Map::new("btc_main_chain");

/// Tip of the main chain
pub(crate) const BTC_TIP: Item<BtcHeaderInfo> = Item::new("btc_tip");
