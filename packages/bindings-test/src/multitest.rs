use anyhow::{bail, Result as AnyResult};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::cmp::max;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

use cosmwasm_std::testing::{MockApi, MockStorage};
use cosmwasm_std::{
    Addr, Api, Binary, BlockInfo, CustomQuery, Empty, Querier, QuerierResult, StdError, StdResult,
    Storage, Timestamp,
};
use cw_multi_test::{
    App, AppResponse, BankKeeper, BasicAppBuilder, CosmosRouter, Module, WasmKeeper,
};
use cw_storage_plus::Item;

use babylon_apis::finality_api::Evidence;
use babylon_bindings::{BabylonMsg, BabylonQuery};

/// Stands in for the hosting chain's Babylon module. Reported equivocation evidence is
/// recorded so tests can inspect it
pub struct BabylonModule {}

/// How many seconds per block
/// (when we increment block.height, use this multiplier for block.time)
pub const BLOCK_TIME: u64 = 5;

const REPORTED_EVIDENCES: Item<Vec<(Addr, Evidence)>> = Item::new("babylon_reported_evidences");

impl BabylonModule {
    /// Evidence reported so far, with the contract that reported it
    pub fn reported_evidences(&self, storage: &dyn Storage) -> StdResult<Vec<(Addr, Evidence)>> {
        Ok(REPORTED_EVIDENCES.may_load(storage)?.unwrap_or_default())
    }
}

impl Module for BabylonModule {
    type ExecT = BabylonMsg;
    type QueryT = Empty;
    type SudoT = Empty;

    fn execute<ExecC, QueryC>(
        &self,
        _api: &dyn Api,
        storage: &mut dyn Storage,
        _router: &dyn CosmosRouter<ExecC = ExecC, QueryC = QueryC>,
        _block: &BlockInfo,
        sender: Addr,
        msg: BabylonMsg,
    ) -> AnyResult<AppResponse>
    where
        ExecC: Debug + Clone + PartialEq + JsonSchema + DeserializeOwned + 'static,
        QueryC: CustomQuery + DeserializeOwned + 'static,
    {
        match msg {
            BabylonMsg::EquivocationEvidence { evidence } => {
                let mut reported = REPORTED_EVIDENCES.may_load(storage)?.unwrap_or_default();
                reported.push((sender, evidence));
                REPORTED_EVIDENCES.save(storage, &reported)?;
                Ok(AppResponse::default())
            }
        }
    }

    fn query(
        &self,
        _api: &dyn Api,
        _storage: &dyn Storage,
        _querier: &dyn Querier,
        _block: &BlockInfo,
        _request: BabylonQuery,
    ) -> AnyResult<Binary> {
        bail!("query not implemented for BabylonModule")
    }

    fn sudo<ExecC, QueryC>(
        &self,
        _api: &dyn Api,
        _storage: &mut dyn Storage,
        _router: &dyn CosmosRouter<ExecC = ExecC, QueryC = QueryC>,
        _block: &BlockInfo,
        _msg: Self::SudoT,
    ) -> AnyResult<AppResponse>
    where
        ExecC: Debug + Clone + PartialEq + JsonSchema + DeserializeOwned + 'static,
        QueryC: CustomQuery + DeserializeOwned + 'static,
    {
        bail!("sudo not implemented for BabylonModule")
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum BabylonError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

pub type BabylonAppWrapped =
    App<BankKeeper, MockApi, MockStorage, BabylonModule, WasmKeeper<BabylonMsg, BabylonQuery>>;

pub struct BabylonApp(BabylonAppWrapped);

impl Deref for BabylonApp {
    type Target = BabylonAppWrapped;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BabylonApp {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Querier for BabylonApp {
    fn raw_query(&self, bin_request: &[u8]) -> QuerierResult {
        self.0.raw_query(bin_request)
    }
}

impl BabylonApp {
    pub fn new() -> Self {
        Self(
            BasicAppBuilder::<BabylonMsg, BabylonQuery>::new_custom()
                .with_custom(BabylonModule {})
                .build(|_, _, _| {}),
        )
    }

    pub fn new_at_height(height: u64) -> Self {
        let block_info = BlockInfo {
            height,
            time: Timestamp::from_seconds(1714119228 + height * BLOCK_TIME),
            chain_id: "babylon-testnet-phase-3".to_owned(),
        };

        Self(
            BasicAppBuilder::<BabylonMsg, BabylonQuery>::new_custom()
                .with_custom(BabylonModule {})
                .with_block(block_info)
                .build(|_, _, _| {}),
        )
    }

    pub fn block_info(&self) -> BlockInfo {
        self.0.block_info()
    }

    /// Equivocation evidence the contracts reported to the hosting chain
    pub fn reported_evidences(&self) -> StdResult<Vec<(Addr, Evidence)>> {
        self.0
            .read_module(|router, _, storage| router.custom.reported_evidences(storage))
    }

    /// This advances BlockInfo by given number of blocks.
    /// It does not do any callbacks, but keeps the ratio of seconds/block
    pub fn advance_blocks(&mut self, blocks: u64) {
        self.update_block(|block| {
            block.time = block.time.plus_seconds(BLOCK_TIME * blocks);
            block.height += blocks;
        });
    }

    /// This advances BlockInfo by given number of seconds.
    /// It does not do any callbacks, but keeps the ratio of seconds/block
    pub fn advance_seconds(&mut self, seconds: u64) {
        self.update_block(|block| {
            block.time = block.time.plus_seconds(seconds);
            block.height += max(1, seconds / BLOCK_TIME);
        });
    }
}

impl Default for BabylonApp {
    fn default() -> Self {
        Self::new()
    }
}
