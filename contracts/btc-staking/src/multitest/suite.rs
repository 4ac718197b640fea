use anyhow::Result as AnyResult;
use derivative::Derivative;

use cosmwasm_std::{coins, Addr, Binary, Coin, Uint128};

use cw_multi_test::{AppResponse, Contract, ContractWrapper, Executor};

use babylon_apis::btc_staking_api::{BtcInclusionProof, FinalityProvider};
use babylon_apis::finality_api::Evidence;
use babylon_apis::rewards_api::RewardKind;
use babylon_bindings::BabylonMsg;
use babylon_bindings_test::BabylonApp;

use test_utils::{header_hex, BtcChain, BtcKey, PubRandList, StakingTxs};

use crate::msg::{
    BtcBaseHeader, DelegationResponse, EvidenceResponse, ExecuteMsg,
    FinalityProvidersByPowerResponse, FinalitySignatureResponse, InstantiateMsg,
    PendingRewardsResponse, QueryMsg, SudoMsg,
};
use crate::state::config::FinalityConfig;
use crate::state::costaking::CostakerTracker;
use crate::state::finality::SigningInfo;
use crate::state::params::Params;
use crate::test_utils::{covenants, new_fp, staking_params, staking_setup};

fn contract_btc_staking() -> Box<dyn Contract<BabylonMsg>> {
    let contract = ContractWrapper::new(
        crate::contract::execute,
        crate::contract::instantiate,
        crate::contract::query,
    )
    .with_sudo(crate::contract::sudo);
    Box::new(contract)
}

/// Staking time of the delegations the suite creates, in BTC blocks
const STAKING_TIME: u32 = 1000;

#[derive(Derivative)]
#[derivative(Default = "new")]
pub struct SuiteBuilder {
    init_funds: Vec<Coin>,
    params: Option<Params>,
    finality: Option<FinalityConfig>,
}

impl SuiteBuilder {
    pub fn with_funds(mut self, funds: &[Coin]) -> Self {
        self.init_funds = funds.to_vec();
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_finality(mut self, finality: FinalityConfig) -> Self {
        self.finality = Some(finality);
        self
    }

    #[track_caller]
    pub fn build(self) -> Suite {
        let mut app = BabylonApp::new_at_height(100);
        let owner = app.api().addr_make("owner");

        app.init_modules(|router, _api, storage| -> AnyResult<()> {
            router.bank.init_balance(storage, &owner, self.init_funds)
        })
        .unwrap();

        let code_id = app.store_code_with_creator(owner.clone(), contract_btc_staking());
        let chain = BtcChain::new(100);
        let contract = app
            .instantiate_contract(
                code_id,
                owner.clone(),
                &InstantiateMsg {
                    params: Some(self.params.unwrap_or_else(staking_params)),
                    finality: self.finality,
                    admin: Some(owner.to_string()),
                    babylon: None,
                    btc_light_client: Some(BtcBaseHeader {
                        header_hex: header_hex(chain.base_header()),
                        height: chain.base_height,
                    }),
                },
                &[],
                "btc-staking",
                Some(owner.to_string()),
            )
            .unwrap();
        let chain_id = app.block_info().chain_id;

        Suite {
            app,
            owner,
            contract,
            chain,
            chain_id,
        }
    }
}

pub struct Suite {
    pub app: BabylonApp,
    /// Instantiator, admin and holder of the initial funds
    pub owner: Addr,
    pub contract: Addr,
    /// The BTC chain the contract's light client follows
    pub chain: BtcChain,
    chain_id: String,
}

impl Suite {
    pub fn addr(&self, seed: &str) -> Addr {
        self.app.api().addr_make(seed)
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn height(&self) -> u64 {
        self.app.block_info().height
    }

    /// The app hash of the block at `height`
    pub fn app_hash(height: u64) -> Vec<u8> {
        format!("block-{height}").into_bytes()
    }

    /// Ends the current block, and begins the next one
    #[track_caller]
    pub fn next_block(&mut self) -> AnyResult<()> {
        let height = self.height();
        self.app.wasm_sudo(
            self.contract.clone(),
            &SudoMsg::EndBlock {
                hash_hex: hex::encode(Self::app_hash(height)),
                app_hash_hex: hex::encode(Self::app_hash(height)),
            },
        )?;
        self.app.advance_blocks(1);
        let height = self.height();
        self.app.wasm_sudo(
            self.contract.clone(),
            &SudoMsg::BeginBlock {
                hash_hex: hex::encode(Self::app_hash(height)),
                app_hash_hex: "".to_string(),
            },
        )?;
        Ok(())
    }

    /// Moves to `height` without running the blocks in between
    pub fn skip_to(&mut self, height: u64) {
        let current = self.height();
        self.app.advance_blocks(height - current);
    }

    #[track_caller]
    pub fn finalize_epoch(&mut self, epoch: u64) -> AnyResult<AppResponse> {
        self.app
            .wasm_sudo(self.contract.clone(), &SudoMsg::EpochFinalized { epoch })
    }

    /// Reports the BTC headers above `from_height`
    #[track_caller]
    pub fn report_headers(&mut self, from_height: u32) -> AnyResult<AppResponse> {
        let headers = self
            .chain
            .headers_after(from_height)
            .iter()
            .map(header_hex)
            .collect();
        self.app
            .wasm_sudo(self.contract.clone(), &SudoMsg::BtcHeaders { headers })
    }

    /// Mines the staking tx of `txs`, buries it under `depth` blocks, and returns its
    /// inclusion proof
    #[track_caller]
    pub fn mine_staking_tx(&mut self, txs: &StakingTxs, depth: u32) -> BtcInclusionProof {
        let before = self.chain.tip_height();
        let height = self.chain.add_block(vec![txs.staking_tx.clone()]);
        self.chain.add_empty_blocks(depth);
        self.report_headers(before).unwrap();
        self.chain.inclusion_proof(height, 1)
    }

    #[track_caller]
    pub fn register_finality_provider(&mut self, key: &BtcKey, owner_seed: &str) -> AnyResult<Addr> {
        let owner = self.addr(owner_seed);
        let fp = new_fp(key, &self.chain_id, owner.as_str(), &self.chain_id);
        self.app.execute_contract(
            owner.clone(),
            self.contract.clone(),
            &ExecuteMsg::CreateFinalityProvider { fp },
            &[],
        )?;
        Ok(owner)
    }

    #[track_caller]
    pub fn create_delegation(
        &mut self,
        txs: &StakingTxs,
        staker_seed: &str,
        proof: Option<BtcInclusionProof>,
    ) -> AnyResult<AppResponse> {
        let staker = self.addr(staker_seed);
        let delegation = txs.new_delegation(&self.chain_id, staker.as_str(), proof);
        self.app.execute_contract(
            staker,
            self.contract.clone(),
            &ExecuteMsg::CreateBtcDelegation { delegation },
            &[],
        )
    }

    /// Submits the signatures of the covenant member `cov`
    #[track_caller]
    pub fn add_covenant_sigs(&mut self, txs: &StakingTxs, cov: &BtcKey) -> AnyResult<AppResponse> {
        let sender = self.addr("covenant");
        self.app.execute_contract(
            sender,
            self.contract.clone(),
            &ExecuteMsg::AddCovenantSigs {
                sigs: txs.covenant_sigs(cov),
            },
            &[],
        )
    }

    #[track_caller]
    pub fn add_inclusion_proof(
        &mut self,
        txs: &StakingTxs,
        proof: BtcInclusionProof,
    ) -> AnyResult<AppResponse> {
        let sender = self.addr("reporter");
        self.app.execute_contract(
            sender,
            self.contract.clone(),
            &ExecuteMsg::AddBtcDelegationInclusionProof {
                staking_tx_hash_hex: txs.staking_tx_hash_hex(),
                proof,
            },
            &[],
        )
    }

    /// Stakes `value` satoshis of `staker_seed` to `fp`, k-deep and with a covenant quorum
    #[track_caller]
    pub fn activate_delegation(&mut self, fp: &BtcKey, staker_seed: &str, value: u64) -> StakingTxs {
        let txs = staking_setup(staker_seed, &[fp], value, STAKING_TIME).build();
        let proof = self.mine_staking_tx(&txs, 6);
        self.create_delegation(&txs, staker_seed, Some(proof)).unwrap();
        for cov in covenants().iter().take(3) {
            self.add_covenant_sigs(&txs, cov).unwrap();
        }
        txs
    }

    #[track_caller]
    pub fn commit_public_randomness(
        &mut self,
        list: &PubRandList,
        fp_owner: &Addr,
    ) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            fp_owner.clone(),
            self.contract.clone(),
            &ExecuteMsg::CommitPublicRandomness {
                fp_pubkey_hex: list.fp.pk_hex(),
                start_height: list.start_height,
                num_pub_rand: list.num_pub_rand(),
                commitment: Binary::new(list.commitment.clone()),
                signature: list.commit_sig(&self.chain_id, fp_owner.as_str()),
            },
            &[],
        )
    }

    /// Votes for `app_hash` at `height`
    #[track_caller]
    pub fn submit_finality_signature(
        &mut self,
        list: &PubRandList,
        fp_owner: &Addr,
        height: u64,
        app_hash: &[u8],
    ) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            fp_owner.clone(),
            self.contract.clone(),
            &ExecuteMsg::SubmitFinalitySignature {
                fp_pubkey_hex: list.fp.pk_hex(),
                height,
                pub_rand: list.pub_rand(height),
                proof: list.proof(height),
                block_app_hash: Binary::new(app_hash.to_vec()),
                signature: list.vote(&self.chain_id, fp_owner.as_str(), height, app_hash),
            },
            &[],
        )
    }

    /// Registers `key`, stakes `sats` of `staker_seed` to it and commits its public
    /// randomness. The finality provider is in the active set from height 151
    #[track_caller]
    pub fn activate_finality_provider(
        &mut self,
        key: &BtcKey,
        owner_seed: &str,
        staker_seed: &str,
        sats: u64,
    ) -> (Addr, PubRandList) {
        let owner = self.register_finality_provider(key, owner_seed).unwrap();
        self.activate_delegation(key, staker_seed, sats);
        let list = PubRandList::generate(key, 150, 200);
        self.commit_public_randomness(&list, &owner).unwrap();

        self.skip_to(150);
        self.finalize_epoch(2).unwrap();
        self.next_block().unwrap();
        (owner, list)
    }

    #[track_caller]
    pub fn unjail(&mut self, sender: &Addr, key: &BtcKey) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            sender.clone(),
            self.contract.clone(),
            &ExecuteMsg::UnjailFinalityProvider {
                fp_pubkey_hex: key.pk_hex(),
            },
            &[],
        )
    }

    #[track_caller]
    pub fn baby_delegation_changed(
        &mut self,
        delegator: &Addr,
        validator: &str,
        shares: u128,
    ) -> AnyResult<AppResponse> {
        self.app.wasm_sudo(
            self.contract.clone(),
            &SudoMsg::BabyDelegationChanged {
                delegator: delegator.to_string(),
                validator: validator.to_string(),
                shares: Uint128::new(shares),
            },
        )
    }

    #[track_caller]
    pub fn update_params(&mut self, params: Params) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            self.owner.clone(),
            self.contract.clone(),
            &ExecuteMsg::UpdateParams { params },
            &[],
        )
    }

    /// Deposits `amount` of the owner's funds as co-staking rewards
    #[track_caller]
    pub fn add_costaking_rewards(&mut self, amount: u128, denom: &str) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            self.owner.clone(),
            self.contract.clone(),
            &ExecuteMsg::AddCostakingRewards {},
            &coins(amount, denom),
        )
    }

    #[track_caller]
    pub fn withdraw_rewards(&mut self, sender: &Addr, kind: RewardKind) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            sender.clone(),
            self.contract.clone(),
            &ExecuteMsg::WithdrawRewards { kind },
            &[],
        )
    }

    #[track_caller]
    pub fn get_delegation(&self, txs: &StakingTxs) -> DelegationResponse {
        self.app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::Delegation {
                    staking_tx_hash_hex: txs.staking_tx_hash_hex(),
                },
            )
            .unwrap()
    }

    #[track_caller]
    pub fn get_finality_provider(&self, key: &BtcKey) -> FinalityProvider {
        self.app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::FinalityProvider {
                    btc_pk_hex: key.pk_hex(),
                },
            )
            .unwrap()
    }

    #[track_caller]
    pub fn get_active_finality_providers(&self, height: u64) -> Vec<String> {
        let res: FinalityProvidersByPowerResponse = self
            .app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::ActiveFinalityProviders { height },
            )
            .unwrap();
        res.fps.into_iter().map(|fp| fp.btc_pk_hex).collect()
    }

    #[track_caller]
    pub fn get_signing_info(&self, key: &BtcKey) -> Option<SigningInfo> {
        self.app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::SigningInfo {
                    btc_pk_hex: key.pk_hex(),
                },
            )
            .unwrap()
    }

    #[track_caller]
    pub fn get_finality_signature(&self, key: &BtcKey, height: u64) -> FinalitySignatureResponse {
        self.app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::FinalitySignature {
                    btc_pk_hex: key.pk_hex(),
                    height,
                },
            )
            .unwrap()
    }

    #[track_caller]
    pub fn get_evidence(&self, key: &BtcKey, height: u64) -> Option<Evidence> {
        let res: EvidenceResponse = self
            .app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::Evidence {
                    btc_pk_hex: key.pk_hex(),
                    height,
                },
            )
            .unwrap();
        res.evidence
    }

    #[track_caller]
    pub fn get_costaker(&self, addr: &Addr) -> CostakerTracker {
        self.app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::Costaker {
                    address: addr.to_string(),
                },
            )
            .unwrap()
    }

    #[track_caller]
    pub fn get_pending_rewards(&self, addr: &Addr, kind: RewardKind) -> Uint128 {
        let res: PendingRewardsResponse = self
            .app
            .wrap()
            .query_wasm_smart(
                self.contract.clone(),
                &QueryMsg::PendingRewards {
                    address: addr.to_string(),
                    kind,
                },
            )
            .unwrap();
        res.amount
    }
}
