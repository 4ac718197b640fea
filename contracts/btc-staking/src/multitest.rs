mod suite;

use assert_matches::assert_matches;
use cosmwasm_std::coins;

use babylon_apis::btc_staking_api::BTCDelegationStatus;
use babylon_apis::rewards_api::RewardKind;
use test_utils::BtcKey;

use crate::error::ContractError;
use crate::test_utils::{covenants, staking_params, staking_setup};
use suite::{Suite, SuiteBuilder};

const DENOM: &str = "ubbn";

mod delegation {
    use super::*;

    #[test]
    fn delegation_becomes_active_with_quorum_and_inclusion() {
        let mut suite = SuiteBuilder::new().build();
        let fp1 = BtcKey::from_seed("fp1");
        suite.register_finality_provider(&fp1, "fp1-owner").unwrap();

        let txs = staking_setup("staker", &[&fp1], 2_000_000, 500).build();
        suite.create_delegation(&txs, "staker", None).unwrap();
        assert_eq!(
            suite.get_delegation(&txs).status,
            BTCDelegationStatus::PENDING
        );

        let covenants = covenants();
        suite.add_covenant_sigs(&txs, &covenants[0]).unwrap();
        suite.add_covenant_sigs(&txs, &covenants[1]).unwrap();
        assert_eq!(
            suite.get_delegation(&txs).status,
            BTCDelegationStatus::PENDING
        );
        suite.add_covenant_sigs(&txs, &covenants[2]).unwrap();
        assert_eq!(
            suite.get_delegation(&txs).status,
            BTCDelegationStatus::VERIFIED
        );

        // A replayed submission is rejected
        let err = suite
            .add_covenant_sigs(&txs, &covenants[2])
            .unwrap_err()
            .downcast::<ContractError>()
            .unwrap();
        assert_matches!(err, ContractError::DuplicateCovenantSig(..));

        let proof = suite.mine_staking_tx(&txs, 10);
        suite.add_inclusion_proof(&txs, proof).unwrap();
        let del = suite.get_delegation(&txs);
        assert_eq!(del.status, BTCDelegationStatus::ACTIVE);
        assert_eq!(del.delegation.total_sat, 2_000_000);
        assert_eq!(del.delegation.end_height, del.delegation.start_height + 500);
    }

    #[test]
    fn delegation_without_quorum_stays_pending() {
        let mut suite = SuiteBuilder::new().build();
        let fp1 = BtcKey::from_seed("fp1");
        suite.register_finality_provider(&fp1, "fp1-owner").unwrap();

        let txs = staking_setup("staker", &[&fp1], 2_000_000, 500).build();
        suite.create_delegation(&txs, "staker", None).unwrap();
        for cov in covenants().iter().take(2) {
            suite.add_covenant_sigs(&txs, cov).unwrap();
        }
        assert_eq!(
            suite.get_delegation(&txs).status,
            BTCDelegationStatus::PENDING
        );

        let proof = suite.mine_staking_tx(&txs, 10);
        let err = suite
            .add_inclusion_proof(&txs, proof)
            .unwrap_err()
            .downcast::<ContractError>()
            .unwrap();
        assert_eq!(
            err,
            ContractError::WrongDelegationState {
                expected: BTCDelegationStatus::VERIFIED,
                actual: BTCDelegationStatus::PENDING,
            }
        );
        assert_eq!(
            suite.get_delegation(&txs).status,
            BTCDelegationStatus::PENDING
        );
    }
}

mod finality {
    use super::*;
    use crate::state::config::FinalityConfig;

    #[test]
    fn double_vote_slashes_finality_provider() {
        let mut suite = SuiteBuilder::new().build();
        let fp1 = BtcKey::from_seed("fp1");
        let (owner, list) = suite.activate_finality_provider(&fp1, "fp1-owner", "staker", 100_000);
        assert_eq!(suite.get_active_finality_providers(151), vec![fp1.pk_hex()]);

        // Block 151 gets indexed
        suite.next_block().unwrap();
        let canonical = Suite::app_hash(151);
        suite
            .submit_finality_signature(&list, &owner, 151, &canonical)
            .unwrap();

        // Same public randomness, another block
        let res = suite
            .submit_finality_signature(&list, &owner, 151, b"fork-151")
            .unwrap();
        let fp = suite.get_finality_provider(&fp1);
        assert_eq!(fp.slashed_babylon_height, 152);

        let sk_hex = res
            .events
            .iter()
            .find(|e| e.ty == "wasm-equivocation")
            .and_then(|e| e.attributes.iter().find(|a| a.key == "secret_key"))
            .map(|a| a.value.clone())
            .unwrap();
        let sk = eots::SecretKey::from_hex(&sk_hex).unwrap();
        assert_eq!(hex::encode(sk.pubkey().to_bytes()), fp1.pk_hex());

        // The host got notified
        let reported = suite.app.reported_evidences().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, suite.contract);
        assert_eq!(reported[0].1.block_height, 151);
        assert_eq!(suite.get_evidence(&fp1, 151), Some(reported[0].1.clone()));

        // The first vote is kept, the conflicting one discarded
        let sig = suite.get_finality_signature(&fp1, 151).signature;
        let chain_id = suite.chain_id().to_string();
        assert_eq!(
            sig,
            list.vote(&chain_id, owner.as_str(), 151, &canonical)
                .to_vec()
        );

        suite.next_block().unwrap();
        let err = suite
            .submit_finality_signature(&list, &owner, 152, &Suite::app_hash(152))
            .unwrap_err()
            .downcast::<ContractError>()
            .unwrap();
        assert_eq!(err, ContractError::FinalityProviderSlashed(fp1.pk_hex()));
        assert!(suite.get_active_finality_providers(153).is_empty());
    }

    #[test]
    fn missing_votes_jail_finality_provider() {
        let mut suite = SuiteBuilder::new()
            .with_finality(FinalityConfig {
                signed_blocks_window: 10,
                jail_duration: 60,
                ..Default::default()
            })
            .build();
        let fp1 = BtcKey::from_seed("fp1");
        let (owner, _) = suite.activate_finality_provider(&fp1, "fp1-owner", "staker", 100_000);

        // Votes for 151 are due by 154
        while suite.height() < 163 {
            suite.next_block().unwrap();
        }
        assert!(!suite.get_finality_provider(&fp1).jailed);
        assert_eq!(
            suite.get_signing_info(&fp1).unwrap().missed_blocks_counter,
            9
        );

        let jailed_at = suite.app.block_info().time;
        suite.next_block().unwrap();
        let fp = suite.get_finality_provider(&fp1);
        assert!(fp.jailed);
        assert_eq!(fp.jailed_until, Some(jailed_at.plus_seconds(60)));
        assert!(suite.get_active_finality_providers(164).is_empty());

        let err = suite
            .unjail(&owner, &fp1)
            .unwrap_err()
            .downcast::<ContractError>()
            .unwrap();
        assert_eq!(err, ContractError::JailPeriodNotPassed(fp1.pk_hex()));

        suite.app.advance_seconds(60);
        suite.unjail(&owner, &fp1).unwrap();
        assert!(!suite.get_finality_provider(&fp1).jailed);

        // Back in the active set from the next block
        suite.next_block().unwrap();
        let height = suite.height();
        assert_eq!(
            suite.get_active_finality_providers(height),
            vec![fp1.pk_hex()]
        );
    }
}

mod costaking {
    use super::*;
    use cosmwasm_std::Uint128;

    use crate::state::params::Params;

    fn params() -> Params {
        Params {
            score_ratio_btc_by_baby: Uint128::new(500),
            ..staking_params()
        }
    }

    #[test]
    fn score_is_capped_by_native_stake() {
        let mut suite = SuiteBuilder::new()
            .with_params(params())
            .with_funds(&coins(10_000_000, DENOM))
            .build();
        let fp1 = BtcKey::from_seed("fp1");
        suite.register_finality_provider(&fp1, "fp1-owner").unwrap();
        suite.activate_delegation(&fp1, "d1", 10_000);
        let d1 = suite.addr("d1");

        let tracker = suite.get_costaker(&d1);
        assert_eq!(tracker.active_satoshis, 10_000);
        assert_eq!(tracker.total_score, Uint128::zero());

        suite
            .baby_delegation_changed(&d1, "val1", 5_000_000)
            .unwrap();
        let tracker = suite.get_costaker(&d1);
        assert_eq!(tracker.active_baby, Uint128::new(5_000_000));
        assert_eq!(tracker.total_score, Uint128::new(10_000));

        suite.add_costaking_rewards(1_000_000, DENOM).unwrap();
        assert_eq!(
            suite.get_pending_rewards(&d1, RewardKind::Costaker),
            Uint128::new(1_000_000)
        );

        suite.withdraw_rewards(&d1, RewardKind::Costaker).unwrap();
        let balance = suite.app.wrap().query_balance(&d1, DENOM).unwrap();
        assert_eq!(balance.amount, Uint128::new(1_000_000));
        // Nothing left for a second withdrawal
        suite.withdraw_rewards(&d1, RewardKind::Costaker).unwrap();
        let balance = suite.app.wrap().query_balance(&d1, DENOM).unwrap();
        assert_eq!(balance.amount, Uint128::new(1_000_000));
        assert_eq!(
            suite.get_pending_rewards(&d1, RewardKind::Costaker),
            Uint128::zero()
        );
    }

    #[test]
    fn ratio_update_rescores_untouched_costakers() {
        let mut suite = SuiteBuilder::new()
            .with_params(params())
            .with_funds(&coins(10_000_000, DENOM))
            .build();
        let fp1 = BtcKey::from_seed("fp1");
        suite.register_finality_provider(&fp1, "fp1-owner").unwrap();
        suite.activate_delegation(&fp1, "d1", 10_000);
        let d1 = suite.addr("d1");
        suite
            .baby_delegation_changed(&d1, "val1", 5_000_000)
            .unwrap();
        assert_eq!(suite.get_costaker(&d1).total_score, Uint128::new(10_000));

        let res = suite
            .update_params(Params {
                score_ratio_btc_by_baby: Uint128::new(1_000),
                ..params()
            })
            .unwrap();
        let rescored = res
            .events
            .iter()
            .find(|e| e.ty == "wasm-params_updated")
            .and_then(|e| e.attributes.iter().find(|a| a.key == "rescored_costakers"))
            .map(|a| a.value.clone());
        assert_eq!(rescored.as_deref(), Some("1"));
        assert_eq!(suite.get_costaker(&d1).total_score, Uint128::new(5_000));

        // Other parameter changes leave the scores alone
        let res = suite
            .update_params(Params {
                score_ratio_btc_by_baby: Uint128::new(1_000),
                min_staking_value_sat: 20_000,
                ..params()
            })
            .unwrap();
        let params_updated = res
            .events
            .iter()
            .find(|e| e.ty == "wasm-params_updated")
            .unwrap();
        assert!(!params_updated
            .attributes
            .iter()
            .any(|a| a.key == "rescored_costakers"));
    }

    #[test]
    fn jailed_finality_provider_stake_leaves_tracker() {
        let mut suite = SuiteBuilder::new()
            .with_params(params())
            .with_finality(crate::state::config::FinalityConfig {
                signed_blocks_window: 2,
                ..Default::default()
            })
            .with_funds(&coins(10_000_000, DENOM))
            .build();
        let fp1 = BtcKey::from_seed("fp1");
        suite.activate_finality_provider(&fp1, "fp1-owner", "d1", 10_000);
        let d1 = suite.addr("d1");
        suite
            .baby_delegation_changed(&d1, "val1", 5_000_000)
            .unwrap();
        assert_eq!(suite.get_costaker(&d1).total_score, Uint128::new(10_000));

        // Votes for 151 and 152 are missed by the end of block 155
        while !suite.get_finality_provider(&fp1).jailed {
            assert!(suite.height() <= 155, "fp1 should be jailed by now");
            suite.next_block().unwrap();
        }
        let tracker = suite.get_costaker(&d1);
        assert_eq!(tracker.active_satoshis, 0);
        assert_eq!(tracker.total_score, Uint128::zero());

        suite.add_costaking_rewards(1_000_000, DENOM).unwrap();
        assert_eq!(
            suite.get_pending_rewards(&d1, RewardKind::Costaker),
            Uint128::zero()
        );
    }
}
