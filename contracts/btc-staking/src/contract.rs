#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_json_binary, Deps, DepsMut, Empty, Env, Event, MessageInfo, QueryResponse, Response,
};
use cw2::set_contract_version;
use cw_utils::{maybe_addr, nonpayable};

use babylon_bindings::BabylonMsg;

use crate::error::ContractError;
use crate::finality::{
    compute_active_finality_providers, handle_finality_signature,
    handle_public_randomness_commit, index_block, tally_blocks,
};
use crate::hooks::dispatch;
use crate::light_client::{
    handle_btc_headers, handle_epoch_finalized, init_light_client, BtcLightClient,
    StoredLightClient,
};
use crate::liveness::{handle_liveness, handle_resume_finality, handle_unjail};
use crate::msg::{ExecuteMsg, InstantiateMsg, QueryMsg, SudoMsg};
use crate::rewards::{add_costaking_rewards, distribute_rewards, withdraw_rewards};
use crate::slashing::handle_equivocation_evidence;
use crate::staking::{
    expire_delegations, handle_create_delegation, handle_create_fp, handle_edit_fp,
    handle_inclusion_proof, handle_stake_expand, handle_undelegate,
};
use crate::state::config::{Config, ADMIN, CONFIG, FINALITY_CONFIG};
use crate::state::finality::BTC_HEIGHT;
use crate::state::params::{add_params, latest_params};
use crate::state::staking::ACTIVATED_HEIGHT;
use crate::{costaking, covenant, queries};

pub const CONTRACT_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    mut deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response<BabylonMsg>, ContractError> {
    nonpayable(&info)?;
    let api = deps.api;
    let babylon = maybe_addr(api, msg.babylon)?.unwrap_or(info.sender);
    let config = Config {
        babylon,
        consumer_id: env.block.chain_id,
    };
    CONFIG.save(deps.storage, &config)?;

    ADMIN.set(deps.branch(), maybe_addr(api, msg.admin.clone())?)?;

    let params = msg.params.unwrap_or_default();
    params.validate()?;
    add_params(deps.storage, &params)?;

    let finality = msg.finality.unwrap_or_default();
    finality.validate()?;
    FINALITY_CONFIG.save(deps.storage, &finality)?;

    if let Some(base) = &msg.btc_light_client {
        init_light_client(deps.storage, base)?;
    }
    // initialize storage, so no issue when reading for the first time
    costaking::init(deps.storage)?;

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new().add_attribute("action", "instantiate"))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> Result<QueryResponse, ContractError> {
    match msg {
        QueryMsg::Config {} => Ok(to_json_binary(&queries::config(deps)?)?),
        QueryMsg::FinalityConfig {} => Ok(to_json_binary(&queries::finality_config(deps)?)?),
        QueryMsg::Params { version } => Ok(to_json_binary(&queries::params(deps, version)?)?),
        QueryMsg::AllParams {} => Ok(to_json_binary(&queries::all_params(deps)?)?),
        QueryMsg::Admin {} => to_json_binary(&ADMIN.query_admin(deps)?).map_err(Into::into),
        QueryMsg::FinalityProvider { btc_pk_hex } => Ok(to_json_binary(
            &queries::finality_provider(deps, btc_pk_hex)?,
        )?),
        QueryMsg::FinalityProviders { start_after, limit } => Ok(to_json_binary(
            &queries::finality_providers(deps, start_after, limit)?,
        )?),
        QueryMsg::FinalityProviderInfo { btc_pk_hex, height } => Ok(to_json_binary(
            &queries::finality_provider_info(deps, btc_pk_hex, height)?,
        )?),
        QueryMsg::FinalityProvidersByPower { start_after, limit } => Ok(to_json_binary(
            &queries::finality_providers_by_power(deps, start_after, limit)?,
        )?),
        QueryMsg::ActiveFinalityProviders { height } => Ok(to_json_binary(
            &queries::active_finality_providers(deps, height)?,
        )?),
        QueryMsg::SigningInfo { btc_pk_hex } => Ok(to_json_binary(&queries::signing_info(
            deps, btc_pk_hex,
        )?)?),
        QueryMsg::Delegation {
            staking_tx_hash_hex,
        } => Ok(to_json_binary(&queries::delegation(
            deps,
            staking_tx_hash_hex,
        )?)?),
        QueryMsg::Delegations {
            start_after,
            limit,
            status,
        } => Ok(to_json_binary(&queries::delegations(
            deps,
            start_after,
            limit,
            status,
        )?)?),
        QueryMsg::DelegationsByFP { btc_pk_hex } => Ok(to_json_binary(
            &queries::delegations_by_fp(deps, btc_pk_hex)?,
        )?),
        QueryMsg::DelegationsByStaker {
            staker_addr,
            status,
        } => Ok(to_json_binary(&queries::delegations_by_staker(
            deps,
            staker_addr,
            status,
        )?)?),
        QueryMsg::SlashedDelegation {
            staking_tx_hash_hex,
        } => Ok(to_json_binary(&queries::slashed_delegation(
            deps,
            staking_tx_hash_hex,
        )?)?),
        QueryMsg::PubRandCommit {
            btc_pk_hex,
            start_after,
            limit,
            reverse,
        } => Ok(to_json_binary(&queries::pub_rand_commits(
            deps,
            btc_pk_hex,
            start_after,
            limit,
            reverse,
        )?)?),
        QueryMsg::PubRandCommitForHeight { btc_pk_hex, height } => Ok(to_json_binary(
            &queries::pub_rand_commit_for_height(deps, btc_pk_hex, height)?,
        )?),
        QueryMsg::FirstPubRandCommit { btc_pk_hex } => Ok(to_json_binary(
            &queries::first_pub_rand_commit(deps, btc_pk_hex)?,
        )?),
        QueryMsg::LastPubRandCommit { btc_pk_hex } => Ok(to_json_binary(
            &queries::last_pub_rand_commit(deps, btc_pk_hex)?,
        )?),
        QueryMsg::FinalitySignature { btc_pk_hex, height } => Ok(to_json_binary(
            &queries::finality_signature(deps, btc_pk_hex, height)?,
        )?),
        QueryMsg::Votes { height } => Ok(to_json_binary(&queries::votes(deps, height)?)?),
        QueryMsg::Block { height } => Ok(to_json_binary(&queries::block(deps, height)?)?),
        QueryMsg::Blocks {
            start_after,
            limit,
            finalised,
            reverse,
        } => Ok(to_json_binary(&queries::blocks(
            deps,
            start_after,
            limit,
            finalised,
            reverse,
        )?)?),
        QueryMsg::Evidence { btc_pk_hex, height } => Ok(to_json_binary(&queries::evidence(
            deps, btc_pk_hex, height,
        )?)?),
        QueryMsg::ActivatedHeight {} => Ok(to_json_binary(&queries::activated_height(deps)?)?),
        QueryMsg::BtcTip {} => Ok(to_json_binary(&queries::btc_tip(deps)?)?),
        QueryMsg::LastFinalizedEpoch {} => {
            Ok(to_json_binary(&queries::last_finalized_epoch(deps)?)?)
        }
        QueryMsg::Costaker { address } => {
            Ok(to_json_binary(&queries::costaker(deps, address)?)?)
        }
        QueryMsg::CurrentRewards {} => Ok(to_json_binary(&queries::current_rewards(deps)?)?),
        QueryMsg::PendingRewards { address, kind } => Ok(to_json_binary(
            &queries::pending_rewards(deps, address, kind)?,
        )?),
    }
}

/// Only bumps the stored contract version
#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: Empty) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new().add_attribute("action", "migrate"))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response<BabylonMsg>, ContractError> {
    if !matches!(msg, ExecuteMsg::AddCostakingRewards {}) {
        nonpayable(&info)?;
    }
    let api = deps.api;
    match msg {
        ExecuteMsg::UpdateAdmin { admin } => ADMIN
            .execute_update_admin(deps, info, maybe_addr(api, admin)?)
            .map_err(Into::into),
        ExecuteMsg::UpdateParams { params } => {
            ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
            params.validate()?;
            let (_, previous) = latest_params(deps.storage)?;
            let version = add_params(deps.storage, &params)?;
            let mut event =
                Event::new("params_updated").add_attribute("version", version.to_string());
            if previous.score_ratio_btc_by_baby != params.score_ratio_btc_by_baby {
                let rescored = costaking::rescore_all(deps.storage)?;
                event = event.add_attribute("rescored_costakers", rescored.to_string());
            }
            Ok(Response::new().add_event(event))
        }
        ExecuteMsg::UpdateFinalityConfig { config } => {
            ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
            config.validate()?;
            FINALITY_CONFIG.save(deps.storage, &config)?;
            Ok(Response::new().add_attribute("action", "update_finality_config"))
        }
        ExecuteMsg::CreateFinalityProvider { fp } => handle_create_fp(deps, &info, &fp),
        ExecuteMsg::EditFinalityProvider {
            btc_pk_hex,
            description,
            commission,
        } => handle_edit_fp(deps, &info, &btc_pk_hex, description, commission),
        ExecuteMsg::CreateBtcDelegation { delegation } => {
            handle_create_delegation(deps, &info, &delegation)
        }
        ExecuteMsg::AddCovenantSigs { sigs } => covenant::handle_covenant_sigs(deps, &env, &sigs),
        ExecuteMsg::AddBtcDelegationInclusionProof {
            staking_tx_hash_hex,
            proof,
        } => handle_inclusion_proof(deps, &env, &staking_tx_hash_hex, &proof),
        ExecuteMsg::BtcUndelegate {
            staking_tx_hash_hex,
            stake_spending_tx,
            spending_tx_inclusion_proof,
            funding_txs,
        } => handle_undelegate(
            deps,
            &env,
            &staking_tx_hash_hex,
            &stake_spending_tx,
            &spending_tx_inclusion_proof,
            &funding_txs,
        ),
        ExecuteMsg::BtcStakeExpand {
            previous_staking_tx_hash_hex,
            delegation,
            funding_tx,
        } => handle_stake_expand(
            deps,
            &info,
            &previous_staking_tx_hash_hex,
            &delegation,
            &funding_tx,
        ),
        ExecuteMsg::CommitPublicRandomness {
            fp_pubkey_hex,
            start_height,
            num_pub_rand,
            commitment,
            signature,
        } => handle_public_randomness_commit(
            deps,
            &env,
            &fp_pubkey_hex,
            start_height,
            num_pub_rand,
            &commitment,
            &signature,
        ),
        ExecuteMsg::SubmitFinalitySignature {
            fp_pubkey_hex,
            height,
            pub_rand,
            proof,
            block_app_hash,
            signature,
        } => handle_finality_signature(
            deps,
            &env,
            &fp_pubkey_hex,
            height,
            &pub_rand,
            &proof,
            &block_app_hash,
            &signature,
        ),
        ExecuteMsg::SubmitEquivocationEvidence { evidence, proof } => {
            handle_equivocation_evidence(deps, &env, &evidence, &proof)
        }
        ExecuteMsg::UnjailFinalityProvider { fp_pubkey_hex } => {
            handle_unjail(deps, &env, &info, &fp_pubkey_hex)
        }
        ExecuteMsg::ResumeFinality {
            fp_pks_hex,
            halting_height,
        } => handle_resume_finality(deps, &env, &info, &fp_pks_hex, halting_height),
        ExecuteMsg::WithdrawRewards { kind } => withdraw_rewards(deps, &info, kind),
        ExecuteMsg::AddCostakingRewards {} => add_costaking_rewards(deps, &info),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(
    mut deps: DepsMut,
    env: Env,
    msg: SudoMsg,
) -> Result<Response<BabylonMsg>, ContractError> {
    match msg {
        SudoMsg::BeginBlock { .. } => handle_begin_block(&mut deps, env),
        SudoMsg::EndBlock {
            hash_hex: _,
            app_hash_hex,
        } => handle_end_block(&mut deps, env, &app_hash_hex),
        SudoMsg::BtcHeaders { headers } => handle_btc_headers(&mut deps, &headers),
        SudoMsg::EpochFinalized { epoch } => handle_epoch_finalized(&mut deps, &env, epoch),
        SudoMsg::BabyDelegationChanged {
            delegator,
            validator,
            shares,
        } => {
            let delegator = deps.api.addr_validate(&delegator)?;
            let event = costaking::handle_baby_delegation_changed(
                deps.storage,
                &delegator,
                &validator,
                shares,
            )?;
            Ok(Response::new().add_event(event))
        }
        SudoMsg::ValidatorJailed { validator } => Ok(Response::new().add_event(
            costaking::handle_validator_jailed(deps.storage, &validator)?,
        )),
        SudoMsg::ValidatorUnjailed { validator } => Ok(Response::new().add_event(
            costaking::handle_validator_unjailed(deps.storage, &validator)?,
        )),
        SudoMsg::ValidatorSlashed {
            validator,
            fraction,
        } => Ok(Response::new().add_event(costaking::handle_validator_slashed(
            deps.storage,
            &validator,
            fraction,
        )?)),
    }
}

/// Removes the voting power of the delegations expired at the current BTC tip, and records
/// the tip for this height
fn handle_begin_block(deps: &mut DepsMut, env: Env) -> Result<Response<BabylonMsg>, ContractError> {
    let btc_tip = StoredLightClient::new(deps.storage).tip_height()?;
    let (hooks, events) = expire_delegations(deps.storage, btc_tip)?;
    dispatch(deps.storage, env.block.height, &hooks)?;
    BTC_HEIGHT.save(deps.storage, env.block.height, &btc_tip)?;

    Ok(Response::new().add_events(events))
}

fn handle_end_block(
    deps: &mut DepsMut,
    env: Env,
    app_hash_hex: &str,
) -> Result<Response<BabylonMsg>, ContractError> {
    // If the BTC staking protocol is activated i.e. there exists a height where at least one
    // finality provider has voting power, start indexing and tallying blocks
    let mut res = Response::new();
    let mut finalized = vec![];
    if let Some(activated_height) = ACTIVATED_HEIGHT.may_load(deps.storage)? {
        // Index the current block
        let ev = index_block(deps.storage, env.block.height, &hex::decode(app_hash_hex)?)?;
        res = res.add_event(ev);
        // Tally all non-finalised blocks, up to the previous one
        let (heights, events) = tally_blocks(
            deps.storage,
            activated_height,
            env.block.height.saturating_sub(1),
        )?;
        finalized = heights;
        res = res.add_events(events);
        // Jail the finality providers that stopped voting
        let events = handle_liveness(deps.storage, &env, activated_height)?;
        res = res.add_events(events);
    }

    // Compute the active finality provider set of the next block
    compute_active_finality_providers(deps.storage, env.block.height + 1)?;

    let rewards = distribute_rewards(deps, &env, &finalized)?;
    Ok(res
        .add_submessages(rewards.messages)
        .add_events(rewards.events))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use babylon_apis::btc_staking_api::BTCDelegationStatus;
    use cosmwasm_std::testing::{message_info, mock_dependencies, mock_env, MockApi};
    use cosmwasm_std::{from_json, Addr, Timestamp};
    use cw_controllers::AdminResponse;

    use test_utils::{header_hex, BtcChain, BtcKey, StakingTxs};

    use crate::msg::{BtcBaseHeader, ParamsResponse};
    use crate::state::config::FinalityConfig;
    use crate::test_utils::{covenants, new_fp, staking_params, staking_setup};

    pub(crate) const CREATOR: &str = "creator";
    pub(crate) const INIT_ADMIN: &str = "initial_admin";
    const NEW_ADMIN: &str = "new_admin";

    /// Chain id of `mock_env`, which is also the consumer id of this chain
    pub(crate) const CHAIN_ID: &str = "cosmos-testnet-14002";

    /// Block environment at `height`, five seconds per block
    pub(crate) fn env_at(height: u64) -> Env {
        let mut env = mock_env();
        env.block.height = height;
        env.block.time = Timestamp::from_seconds(1_700_000_000 + height * 5);
        env
    }

    /// Instantiates the contract with `staking_params`, an admin, and the base header of `chain`
    pub(crate) fn instantiate_with_chain(deps: DepsMut, chain: &BtcChain) {
        let info = message_info(&MockApi::default().addr_make(CREATOR), &[]);
        let admin = MockApi::default().addr_make(INIT_ADMIN);
        let msg = InstantiateMsg {
            params: Some(staking_params()),
            finality: None,
            admin: Some(admin.to_string()),
            babylon: None,
            btc_light_client: Some(BtcBaseHeader {
                header_hex: header_hex(chain.base_header()),
                height: chain.base_height,
            }),
        };
        instantiate(deps, env_at(1), info, msg).unwrap();
    }

    /// Reports the headers of `chain` above `from_height`
    pub(crate) fn report_headers(deps: DepsMut, chain: &BtcChain, from_height: u32) {
        let headers = chain
            .headers_after(from_height)
            .iter()
            .map(header_hex)
            .collect();
        sudo(deps, mock_env(), SudoMsg::BtcHeaders { headers }).unwrap();
    }

    /// Registers `key` as a finality provider of this chain, owned by `owner_seed`
    pub(crate) fn register_fp(deps: DepsMut, key: &BtcKey, owner_seed: &str) -> Addr {
        let owner = MockApi::default().addr_make(owner_seed);
        let fp = new_fp(key, CHAIN_ID, owner.as_str(), CHAIN_ID);
        execute(
            deps,
            mock_env(),
            message_info(&owner, &[]),
            ExecuteMsg::CreateFinalityProvider { fp },
        )
        .unwrap();
        owner
    }

    /// Submits the signatures of the first `n` covenant members
    pub(crate) fn add_covenant_sigs(mut deps: DepsMut, txs: &StakingTxs, n: usize) {
        let sender = MockApi::default().addr_make("covenant");
        for cov in covenants().iter().take(n) {
            execute(
                deps.branch(),
                mock_env(),
                message_info(&sender, &[]),
                ExecuteMsg::AddCovenantSigs {
                    sigs: txs.covenant_sigs(cov),
                },
            )
            .unwrap();
        }
    }

    /// Stakes `value` satoshis of `staker_seed` to `fps`: the staking tx gets mined 6 blocks
    /// deep, and the delegation becomes active at height 100
    pub(crate) fn activate_delegation(
        mut deps: DepsMut,
        chain: &mut BtcChain,
        fps: &[&BtcKey],
        staker_seed: &str,
        value: u64,
    ) -> StakingTxs {
        let staker = MockApi::default().addr_make(staker_seed);
        let txs = staking_setup(staker_seed, fps, value, 1000).build();
        let before = chain.tip_height();
        let height = chain.add_block(vec![txs.staking_tx.clone()]);
        chain.add_empty_blocks(6);
        report_headers(deps.branch(), chain, before);

        let proof = chain.inclusion_proof(height, 1);
        execute(
            deps.branch(),
            env_at(100),
            message_info(&staker, &[]),
            ExecuteMsg::CreateBtcDelegation {
                delegation: txs.new_delegation(CHAIN_ID, staker.as_str(), Some(proof)),
            },
        )
        .unwrap();
        let sender = MockApi::default().addr_make("covenant");
        for cov in covenants().iter().take(3) {
            execute(
                deps.branch(),
                env_at(100),
                message_info(&sender, &[]),
                ExecuteMsg::AddCovenantSigs {
                    sigs: txs.covenant_sigs(cov),
                },
            )
            .unwrap();
        }
        txs
    }

    /// Marks `epoch` as finalized on Bitcoin, at block `height`
    pub(crate) fn finalize_epoch(deps: DepsMut, height: u64, epoch: u64) {
        sudo(deps, env_at(height), SudoMsg::EpochFinalized { epoch }).unwrap();
    }

    pub(crate) fn begin_block(deps: DepsMut, height: u64) -> Response<BabylonMsg> {
        sudo(
            deps,
            env_at(height),
            SudoMsg::BeginBlock {
                hash_hex: hex::encode(format!("hash-{height}")),
                app_hash_hex: "".to_string(),
            },
        )
        .unwrap()
    }

    pub(crate) fn end_block(deps: DepsMut, height: u64, app_hash: &[u8]) -> Response<BabylonMsg> {
        sudo(
            deps,
            env_at(height),
            SudoMsg::EndBlock {
                hash_hex: hex::encode(format!("hash-{height}")),
                app_hash_hex: hex::encode(app_hash),
            },
        )
        .unwrap()
    }

    #[test]
    fn instantiate_without_admin() {
        let mut deps = mock_dependencies();
        let info = message_info(&deps.api.addr_make(CREATOR), &[]);
        let res = instantiate(deps.as_mut(), mock_env(), info.clone(), InstantiateMsg::default())
            .unwrap();
        assert!(res.messages.is_empty());

        assert_eq!(ADMIN.query_admin(deps.as_ref()).unwrap().admin, None);
        // The instantiator stands in for the host chain
        let config = queries::config(deps.as_ref()).unwrap();
        assert_eq!(config.babylon, info.sender);
        assert_eq!(config.consumer_id, CHAIN_ID);
        assert_eq!(queries::params(deps.as_ref(), None).unwrap().version, 0);
    }

    #[test]
    fn instantiate_with_admin() {
        let mut deps = mock_dependencies();
        let init_admin = deps.api.addr_make(INIT_ADMIN);
        let msg = InstantiateMsg {
            admin: Some(init_admin.to_string()),
            ..Default::default()
        };
        instantiate(
            deps.as_mut(),
            mock_env(),
            message_info(&MockApi::default().addr_make(CREATOR), &[]),
            msg,
        )
        .unwrap();

        let res = query(deps.as_ref(), mock_env(), QueryMsg::Admin {}).unwrap();
        let admin: AdminResponse = from_json(res).unwrap();
        assert_eq!(admin.admin, Some(init_admin.to_string()));
    }

    #[test]
    fn test_update_admin() {
        let mut deps = mock_dependencies();
        let init_admin = deps.api.addr_make(INIT_ADMIN);
        let new_admin = deps.api.addr_make(NEW_ADMIN);
        let msg = InstantiateMsg {
            admin: Some(init_admin.to_string()),
            ..Default::default()
        };
        instantiate(
            deps.as_mut(),
            mock_env(),
            message_info(&MockApi::default().addr_make(CREATOR), &[]),
            msg,
        )
        .unwrap();

        let config = FinalityConfig {
            jail_duration: 600,
            ..Default::default()
        };
        let update_config = ExecuteMsg::UpdateFinalityConfig {
            config: config.clone(),
        };
        let non_admin = message_info(&deps.api.addr_make("non_admin"), &[]);
        let err = execute(deps.as_mut(), mock_env(), non_admin, update_config.clone())
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::Admin(cw_controllers::AdminError::NotAdmin {})
        );

        let update_admin = ExecuteMsg::UpdateAdmin {
            admin: Some(new_admin.to_string()),
        };
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&init_admin, &[]),
            update_admin,
        )
        .unwrap();
        ADMIN.assert_admin(deps.as_ref(), &new_admin).unwrap();

        // Only the new admin may tune finality now
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&init_admin, &[]),
            update_config.clone(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::Admin(cw_controllers::AdminError::NotAdmin {})
        );
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&new_admin, &[]),
            update_config,
        )
        .unwrap();
        assert_eq!(queries::finality_config(deps.as_ref()).unwrap(), config);
    }

    #[test]
    fn params_are_versioned() {
        let mut deps = mock_dependencies();
        let chain = BtcChain::new(100);
        instantiate_with_chain(deps.as_mut(), &chain);
        let admin = deps.api.addr_make(INIT_ADMIN);

        let mut params = staking_params();
        params.min_staking_value_sat = 50_000;
        let msg = ExecuteMsg::UpdateParams {
            params: params.clone(),
        };
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&MockApi::default().addr_make("non_admin"), &[]),
            msg.clone(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::Admin(cw_controllers::AdminError::NotAdmin {})
        );
        execute(deps.as_mut(), mock_env(), message_info(&admin, &[]), msg).unwrap();

        let latest: ParamsResponse = from_json(
            query(deps.as_ref(), mock_env(), QueryMsg::Params { version: None }).unwrap(),
        )
        .unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.params, params);
        // Older versions stay available
        let first = queries::params(deps.as_ref(), Some(0)).unwrap();
        assert_eq!(first.params, staking_params());
        assert_eq!(
            queries::params(deps.as_ref(), Some(2)).unwrap_err(),
            ContractError::UnknownParamVersion(2)
        );
    }

    #[test]
    fn begin_block_expires_delegations() {
        let mut deps = mock_dependencies();
        let mut chain = BtcChain::new(100);
        instantiate_with_chain(deps.as_mut(), &chain);
        let fp1 = BtcKey::from_seed("fp1");
        register_fp(deps.as_mut(), &fp1, "fp1-owner");
        let txs = activate_delegation(deps.as_mut(), &mut chain, &[&fp1], "staker", 100_000);
        let del = queries::delegation(deps.as_ref(), txs.staking_tx_hash_hex()).unwrap();
        let expiry_height = del.delegation.expiry_height();

        // One block before the expiry height
        let before = chain.tip_height();
        chain.add_empty_blocks(expiry_height - 1 - before);
        report_headers(deps.as_mut(), &chain, before);
        let res = begin_block(deps.as_mut(), 200);
        assert!(res.events.is_empty());
        assert_eq!(
            queries::finality_provider_info(deps.as_ref(), fp1.pk_hex(), None)
                .unwrap()
                .power,
            100_000
        );

        let before = chain.tip_height();
        chain.add_empty_blocks(1);
        report_headers(deps.as_mut(), &chain, before);
        let res = begin_block(deps.as_mut(), 201);
        assert_eq!(res.events.len(), 1);
        assert_eq!(res.events[0].ty, "delegation_expired");
        assert_eq!(
            queries::finality_provider_info(deps.as_ref(), fp1.pk_hex(), None)
                .unwrap()
                .power,
            0
        );
        let del = queries::delegation(deps.as_ref(), txs.staking_tx_hash_hex()).unwrap();
        assert_eq!(del.status, BTCDelegationStatus::EXPIRED);
        // Power at the previous height is kept
        assert_eq!(
            queries::finality_provider_info(deps.as_ref(), fp1.pk_hex(), Some(201))
                .unwrap()
                .power,
            100_000
        );

        // Nothing left to expire
        let res = begin_block(deps.as_mut(), 202);
        assert!(res.events.is_empty());
        assert_eq!(BTC_HEIGHT.load(&deps.storage, 202).unwrap(), expiry_height);
    }

    #[test]
    fn migrate_bumps_version() {
        let mut deps = mock_dependencies();
        instantiate(
            deps.as_mut(),
            mock_env(),
            message_info(&MockApi::default().addr_make(CREATOR), &[]),
            InstantiateMsg::default(),
        )
        .unwrap();
        migrate(deps.as_mut(), mock_env(), Empty {}).unwrap();
        let version = cw2::get_contract_version(&deps.storage).unwrap();
        assert_eq!(version.contract, CONTRACT_NAME);
        assert_eq!(version.version, CONTRACT_VERSION);
    }
}
