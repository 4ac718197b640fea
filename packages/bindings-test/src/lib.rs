mod multitest;

use std::marker::PhantomData;

use cosmwasm_std::{
    testing::{MockApi, MockQuerier, MockStorage},
    OwnedDeps,
};

use babylon_bindings::BabylonQuery;

pub use multitest::{BabylonApp, BabylonAppWrapped, BabylonError, BabylonModule, BLOCK_TIME};

pub type BabylonDeps = OwnedDeps<MockStorage, MockApi, MockQuerier, BabylonQuery>;

/// Mock dependencies whose querier only answers bank and wasm queries
pub fn mock_deps_babylon() -> BabylonDeps {
    OwnedDeps {
        storage: MockStorage::default(),
        api: MockApi::default(),
        querier: MockQuerier::default(),
        custom_query_type: PhantomData,
    }
}
