//! Custom messages the BTC staking contract emits to its host chain.

use babylon_apis::finality_api::Evidence;
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{CosmosMsg, Empty};

#[cw_serde]
pub enum BabylonMsg {
    /// Reports a finality provider that signed two conflicting blocks at the
    /// same height. The host is expected to slash the offender's native stake.
    EquivocationEvidence { evidence: Evidence },
}

/// The contract does not issue custom queries
pub type BabylonQuery = Empty;

impl cosmwasm_std::CustomMsg for BabylonMsg {}

impl From<Evidence> for BabylonMsg {
    fn from(evidence: Evidence) -> Self {
        BabylonMsg::EquivocationEvidence { evidence }
    }
}

impl From<BabylonMsg> for CosmosMsg<BabylonMsg> {
    fn from(msg: BabylonMsg) -> Self {
        CosmosMsg::Custom(msg)
    }
}
