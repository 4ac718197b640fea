use babylon_apis::btc_staking_api::{FinalityProviderDescription, NewFinalityProvider};
use babylon_btcstaking::signing_context::fp_pop_context;
use cosmwasm_std::Decimal;
use test_utils::{covenant_keys, funding_outpoint, BtcKey, StakingSetup};

use crate::state::params::Params;

/// Members of the covenant committee of `staking_params`
pub(crate) fn covenants() -> Vec<BtcKey> {
    covenant_keys(5)
}

/// Default parameters, with a 3-of-5 covenant committee
pub(crate) fn staking_params() -> Params {
    Params {
        covenant_pks: covenants().iter().map(BtcKey::pk_hex).collect(),
        covenant_quorum: 3,
        ..Default::default()
    }
}

/// The transactions of a delegation of `staker_seed` to `fps`, valid under `staking_params`
pub(crate) fn staking_setup(
    staker_seed: &str,
    fps: &[&BtcKey],
    staking_value: u64,
    staking_time: u32,
) -> StakingSetup {
    let params = staking_params();
    StakingSetup {
        staker: BtcKey::from_seed(staker_seed),
        fp_pks: fps.iter().map(|fp| fp.pk).collect(),
        covenant_pks: params.covenant_keys().unwrap(),
        covenant_quorum: params.covenant_quorum,
        staking_time,
        staking_value,
        unbonding_time: params.unbonding_time_blocks,
        unbonding_fee: params.unbonding_fee_sat,
        slashing_pk_script: params.slashing_script().unwrap(),
        slashing_rate: params.slashing_rate().unwrap(),
        slashing_fee: params.min_slashing_tx_fee_sat,
        network: params.network(),
        funding: funding_outpoint(&format!("{staker_seed}/{staking_value}/{staking_time}")),
    }
}

/// Registration message of a finality provider of `consumer_id`, owned by `addr`, on the
/// chain `chain_id`
pub(crate) fn new_fp(
    key: &BtcKey,
    chain_id: &str,
    addr: &str,
    consumer_id: &str,
) -> NewFinalityProvider {
    NewFinalityProvider {
        description: Some(FinalityProviderDescription {
            moniker: format!("fp-{}", &key.pk_hex()[..8]),
            identity: "".to_string(),
            website: "".to_string(),
            security_contact: "".to_string(),
            details: "".to_string(),
        }),
        commission: Decimal::percent(5),
        btc_pk_hex: key.pk_hex(),
        pop: Some(key.pop(&fp_pop_context(chain_id, addr), addr)),
        consumer_id: consumer_id.to_string(),
    }
}
