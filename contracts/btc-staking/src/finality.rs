use std::cmp::max;

use cosmwasm_std::Order::Ascending;
use cosmwasm_std::{DepsMut, Env, Event, Response, StdResult, Storage};

use babylon_apis::finality_api::{Evidence, IndexedBlock, PubRandCommit};
use babylon_bindings::BabylonMsg;
use babylon_btcstaking::signing_context::{
    fp_fin_vote_context, fp_rand_commit_context, rand_commit_payload, verify_context_signature,
    vote_message,
};
use babylon_merkle::Proof;

use crate::error::ContractError;
use crate::light_client::epoch_of;
use crate::msg::{ExecuteResult, FinalityProviderInfo};
use crate::slashing::slash_finality_provider;
use crate::state::config::{CONFIG, FINALITY_CONFIG};
use crate::state::finality::{Vote, BLOCKS, FP_SET, NEXT_HEIGHT, VOTES};
use crate::state::public_randomness::{
    get_last_pub_rand_commit, get_pub_rand_commit_for_height,
    get_timestamped_pub_rand_commit_for_height, is_timestamped, PUB_RAND_COMMITS,
};
use crate::state::staking::{fps_by_power, load_fp, ACTIVATED_HEIGHT};
use crate::validation::decode_btc_pk;

pub fn handle_public_randomness_commit(
    deps: DepsMut,
    env: &Env,
    fp_pubkey_hex: &str,
    start_height: u64,
    num_pub_rand: u64,
    commitment: &[u8],
    signature: &[u8],
) -> Result<Response<BabylonMsg>, ContractError> {
    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    // Ensure the request contains enough amounts of public randomness
    if num_pub_rand < cfg.min_pub_rand {
        return Err(ContractError::TooFewPubRand(cfg.min_pub_rand, num_pub_rand));
    }
    if commitment.len() != 32 {
        return Err(ContractError::InvalidCommitmentLength(commitment.len()));
    }

    // Ensure the finality provider is registered
    let fp = load_fp(deps.storage, fp_pubkey_hex)?;
    // Verify signature over the list
    let consumer_id = CONFIG.load(deps.storage)?.consumer_id;
    verify_context_signature(
        &decode_btc_pk(fp_pubkey_hex)?,
        &fp_rand_commit_context(&consumer_id, fp.addr.as_str()),
        &rand_commit_payload(start_height, num_pub_rand, commitment),
        signature,
    )
    .map_err(|e| ContractError::InvalidCommitmentSignature(e.to_string()))?;

    // Check for overlapping heights if there is a last commit
    if let Some(last_pr_commit) = get_last_pub_rand_commit(deps.storage, fp_pubkey_hex)? {
        if start_height <= last_pr_commit.end_height() {
            return Err(ContractError::InvalidPubRandHeight(
                start_height,
                last_pr_commit.end_height(),
            ));
        }
    }

    // All good, store the given public randomness commitment
    let pr_commit = PubRandCommit {
        start_height,
        num_pub_rand,
        height: env.block.height,
        epoch_num: epoch_of(env.block.height, cfg.epoch_length),
        commitment: commitment.to_vec(),
    };
    PUB_RAND_COMMITS.save(
        deps.storage,
        (fp_pubkey_hex, pr_commit.start_height),
        &pr_commit,
    )?;

    Ok(Response::new().add_event(
        Event::new("pub_rand_committed")
            .add_attribute("fp_btc_pk", fp_pubkey_hex)
            .add_attribute("start_height", start_height.to_string())
            .add_attribute("num_pub_rand", num_pub_rand.to_string())
            .add_attribute("epoch", pr_commit.epoch_num.to_string()),
    ))
}

#[allow(clippy::too_many_arguments)]
pub fn handle_finality_signature(
    mut deps: DepsMut,
    env: &Env,
    fp_btc_pk_hex: &str,
    height: u64,
    pub_rand: &[u8],
    proof: &Proof,
    block_app_hash: &[u8],
    signature: &[u8],
) -> Result<Response<BabylonMsg>, ContractError> {
    let cfg = FINALITY_CONFIG.load(deps.storage)?;
    if height < cfg.finality_activation_height {
        return Err(ContractError::HeightBeforeActivation(
            height,
            cfg.finality_activation_height,
        ));
    }

    // Ensure the finality provider exists, and is neither slashed nor jailed
    let fp = load_fp(deps.storage, fp_btc_pk_hex)?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderSlashed(
            fp_btc_pk_hex.to_string(),
        ));
    }
    if fp.jailed {
        return Err(ContractError::FinalityProviderJailed(
            fp_btc_pk_hex.to_string(),
        ));
    }

    // Ensure the finality provider is in the active set at this height
    let in_active_set = FP_SET
        .may_load(deps.storage, height)?
        .unwrap_or_default()
        .iter()
        .any(|info| info.btc_pk_hex == fp_btc_pk_hex);
    if !in_active_set {
        return Err(ContractError::NoVotingPower(
            fp_btc_pk_hex.to_string(),
            height,
        ));
    }
    if !BLOCKS.has(deps.storage, height) {
        return Err(ContractError::BlockNotFound(height));
    }

    // Ensure the finality provider has not cast the same vote yet
    let existing_vote = VOTES.may_load(deps.storage, (height, fp_btc_pk_hex))?;
    if let Some(vote) = &existing_vote {
        if vote.app_hash == block_app_hash && vote.signature == signature {
            deps.api.debug(&format!(
                "Received duplicated finality vote. Height: {height}, Finality Provider: {fp_btc_pk_hex}"
            ));
            // Exactly the same vote already exists, succeed without advancing anything
            return ExecuteResult::not_refundable()
                .attach(Response::new())
                .map_err(Into::into);
        }
    }

    // Find the public randomness commitment for this height from this finality provider
    let pr_commit =
        get_timestamped_pub_rand_commit_for_height(deps.storage, fp_btc_pk_hex, height)?;
    let consumer_id = CONFIG.load(deps.storage)?.consumer_id;
    let vote_ctx = fp_fin_vote_context(&consumer_id, fp.addr.as_str());
    verify_finality_signature(
        fp_btc_pk_hex,
        height,
        pub_rand,
        proof,
        &pr_commit,
        &vote_ctx,
        block_app_hash,
        signature,
    )?;

    match existing_vote {
        Some(vote) => {
            // A valid vote for another block at the same height, with the same randomness:
            // the secret key leaks. The new vote is discarded, the slashing is kept
            let evidence = Evidence {
                fp_btc_pk: hex::decode(fp_btc_pk_hex)?,
                block_height: height,
                pub_rand: pub_rand.to_vec(),
                canonical_app_hash: vote.app_hash,
                fork_app_hash: block_app_hash.to_vec(),
                canonical_finality_sig: vote.signature,
                fork_finality_sig: signature.to_vec(),
            };
            let (msg, events) = slash_finality_provider(&mut deps, env, &evidence, &vote_ctx)?;
            Ok(Response::new().add_message(msg).add_events(events))
        }
        None => {
            VOTES.save(
                deps.storage,
                (height, fp_btc_pk_hex),
                &Vote {
                    app_hash: block_app_hash.to_vec(),
                    pub_rand: pub_rand.to_vec(),
                    signature: signature.to_vec(),
                },
            )?;
            let res = Response::new().add_event(
                Event::new("finality_vote")
                    .add_attribute("fp_btc_pk", fp_btc_pk_hex)
                    .add_attribute("height", height.to_string())
                    .add_attribute("app_hash", hex::encode(block_app_hash)),
            );
            ExecuteResult::refundable().attach(res).map_err(Into::into)
        }
    }
}

/// Verifies a finality signature w.r.t. the public randomness commitment:
/// - Public randomness inclusion proof.
/// - EOTS signature over the vote message
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_finality_signature(
    fp_btc_pk_hex: &str,
    block_height: u64,
    pub_rand: &[u8],
    proof: &Proof,
    pr_commit: &PubRandCommit,
    vote_ctx: &str,
    app_hash: &[u8],
    signature: &[u8],
) -> Result<(), ContractError> {
    let proof_height = pr_commit
        .start_height
        .checked_add(proof.index)
        .ok_or(ContractError::PubRandProofInvalid)?;
    if block_height != proof_height {
        return Err(ContractError::InvalidFinalitySigHeight(
            proof_height,
            block_height,
        ));
    }
    // Verify the total amount of randomness is the same as in the commitment
    if proof.total != pr_commit.num_pub_rand {
        return Err(ContractError::InvalidFinalitySigAmount(
            proof.total,
            pr_commit.num_pub_rand,
        ));
    }
    // Verify the proof of inclusion for this public randomness
    proof
        .verify(&pr_commit.commitment, pub_rand)
        .map_err(|_| ContractError::PubRandProofInvalid)?;

    // Public randomness is good, verify finality signature
    let pubkey = eots::PublicKey::from_hex(fp_btc_pk_hex)?;
    let pub_rand = eots::new_pub_rand(pub_rand)?;
    let signature = eots::new_sig(signature)?;
    let msg = vote_message(vote_ctx, block_height, app_hash);
    if !pubkey.verify(&pub_rand, &msg, &signature) {
        return Err(ContractError::EotsSigInvalid);
    }
    Ok(())
}

/// Finality providers of the active set at `height` that voted for the indexed block, with
/// their voting power. Jailed and slashed providers do not count
pub fn block_voters(
    storage: &dyn Storage,
    height: u64,
) -> Result<Vec<(String, u64)>, ContractError> {
    let Some(block) = BLOCKS.may_load(storage, height)? else {
        return Ok(vec![]);
    };
    let fp_set = FP_SET.may_load(storage, height)?.unwrap_or_default();
    let mut voters = vec![];
    for fp in fp_set {
        let Some(vote) = VOTES.may_load(storage, (height, fp.btc_pk_hex.as_str()))? else {
            continue;
        };
        if vote.app_hash != block.app_hash {
            continue;
        }
        let provider = load_fp(storage, &fp.btc_pk_hex)?;
        if provider.jailed || provider.is_slashed() {
            continue;
        }
        voters.push((fp.btc_pk_hex, fp.power));
    }
    Ok(voters)
}

pub fn index_block(
    storage: &mut dyn Storage,
    height: u64,
    app_hash: &[u8],
) -> Result<Event, ContractError> {
    let indexed_block = IndexedBlock {
        height,
        app_hash: app_hash.into(),
        finalized: false,
    };
    BLOCKS.save(storage, height, &indexed_block)?;

    Ok(Event::new("index_block")
        .add_attribute("module", "btc_staking")
        .add_attribute("last_height", height.to_string()))
}

/// TallyBlocks tries to finalise all blocks that are non-finalised AND have a non-nil
/// finality provider set, from the earliest to `height`.
///
/// It ensures that the chain `[activated_height, height]` contains either
/// - finalised blocks (i.e., blocks with a finality provider set AND QC of this finality provider set),
/// - non-finalisable blocks (i.e. blocks with no active finality providers),
///
/// but no blocks that have a finality provider set and do not receive a QC. Returns the heights
/// finalised by this call, with their events
pub fn tally_blocks(
    storage: &mut dyn Storage,
    activated_height: u64,
    height: u64,
) -> Result<(Vec<u64>, Vec<Event>), ContractError> {
    // Start finalising blocks since max(activated_height, next_height)
    let next_height = NEXT_HEIGHT.may_load(storage)?.unwrap_or(0);
    let start_height = max(activated_height, next_height);

    // There are 4 different scenarios:
    // - Has finality providers, non-finalised: Tally and try to finalise.
    // - Does not have finality providers, non-finalised: Non-finalisable, continue.
    // - Has finality providers, finalised: Impossible, error.
    // - Does not have finality providers, finalised: Impossible, error.
    let mut finalized = vec![];
    let mut events = vec![];
    for h in start_height..=height {
        let Some(mut indexed_block) = BLOCKS.may_load(storage, h)? else {
            break;
        };
        // Get the finality provider set of this block
        let fp_set = FP_SET.may_load(storage, h)?;

        match (fp_set, indexed_block.finalized) {
            (Some(fp_set), false) => {
                // Has finality providers, non-finalised: tally and try to finalise the block
                let voters = block_voters(storage, h)?;
                if tally(&fp_set, &voters) {
                    // If this block gets >2/3 votes, finalise it
                    events.push(finalize_block(storage, &mut indexed_block)?);
                    finalized.push(h);
                } else {
                    // If not, then this block and all subsequent blocks should not be finalised.
                    // Thus, we need to break here
                    break;
                }
            }
            (None, false) => {
                // Does not have finality providers, non-finalised: not finalisable,
                // Increment the next height to finalise and continue
                NEXT_HEIGHT.save(storage, &(indexed_block.height + 1))?;
                continue;
            }
            (Some(_), true) => {
                return Err(ContractError::FinalisedBlockWithFinalityProviderSet(
                    indexed_block.height,
                ));
            }
            (None, true) => {
                return Err(ContractError::FinalisedBlockWithoutFinalityProviderSet(
                    indexed_block.height,
                ));
            }
        }
    }
    Ok((finalized, events))
}

/// `tally` checks whether a block with the given finality provider set and votes reaches a quorum
/// or not
fn tally(fp_set: &[FinalityProviderInfo], voters: &[(String, u64)]) -> bool {
    let total_power: u128 = fp_set.iter().map(|fp| u128::from(fp.power)).sum();
    let voted_power: u128 = voters.iter().map(|(_, power)| u128::from(*power)).sum();
    voted_power * 3 > total_power * 2
}

fn finalize_block(
    storage: &mut dyn Storage,
    block: &mut IndexedBlock,
) -> Result<Event, ContractError> {
    block.finalized = true;
    BLOCKS.save(storage, block.height, block)?;
    NEXT_HEIGHT.save(storage, &(block.height + 1))?;

    Ok(Event::new("block_finalized")
        .add_attribute("module", "btc_staking")
        .add_attribute("height", block.height.to_string())
        .add_attribute("app_hash", hex::encode(&block.app_hash)))
}

/// `compute_active_finality_providers` selects the top finality providers by voting power that
/// can vote at `height`: not jailed, not slashed, and with BTC-timestamped public randomness
/// for it. The set is stored only when non-empty; the first one activates finality
pub fn compute_active_finality_providers(
    storage: &mut dyn Storage,
    height: u64,
) -> Result<Vec<FinalityProviderInfo>, ContractError> {
    let cfg = FINALITY_CONFIG.load(storage)?;
    if height < cfg.finality_activation_height {
        return Ok(vec![]);
    }

    let mut active = vec![];
    for (btc_pk_hex, power) in fps_by_power(storage, None, None)? {
        if active.len() >= cfg.max_active_finality_providers as usize {
            break;
        }
        if power == 0 {
            // Sorted by power, nothing below can vote
            break;
        }
        let fp = load_fp(storage, &btc_pk_hex)?;
        if fp.jailed || fp.is_slashed() {
            continue;
        }
        let timestamped = match get_pub_rand_commit_for_height(storage, &btc_pk_hex, height)? {
            Some(commit) => is_timestamped(storage, &commit)?,
            None => false,
        };
        if !timestamped {
            continue;
        }
        active.push(FinalityProviderInfo { btc_pk_hex, power });
    }

    if !active.is_empty() {
        FP_SET.save(storage, height, &active)?;
        if ACTIVATED_HEIGHT.may_load(storage)?.is_none() {
            ACTIVATED_HEIGHT.save(storage, &height)?;
        }
    }
    Ok(active)
}

/// Finality providers that voted at `height`, whatever the block
pub(crate) fn voted_at(storage: &dyn Storage, height: u64) -> StdResult<Vec<String>> {
    VOTES
        .prefix(height)
        .keys(storage, None, None, Ascending)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cosmwasm_std::testing::{message_info, mock_dependencies};
    use cosmwasm_std::Binary;

    use test_utils::{BtcChain, BtcKey, PubRandList};

    use crate::contract::tests::{
        activate_delegation, end_block, env_at, finalize_epoch, instantiate_with_chain,
        register_fp, CHAIN_ID,
    };
    use crate::contract::execute;
    use crate::msg::ExecuteMsg;
    use crate::queries;

    pub(crate) fn commit_msg(list: &PubRandList, fp_addr: &str) -> ExecuteMsg {
        ExecuteMsg::CommitPublicRandomness {
            fp_pubkey_hex: list.fp.pk_hex(),
            start_height: list.start_height,
            num_pub_rand: list.num_pub_rand(),
            commitment: Binary::new(list.commitment.clone()),
            signature: list.commit_sig(CHAIN_ID, fp_addr),
        }
    }

    pub(crate) fn vote_msg(
        list: &PubRandList,
        fp_addr: &str,
        height: u64,
        app_hash: &[u8],
    ) -> ExecuteMsg {
        ExecuteMsg::SubmitFinalitySignature {
            fp_pubkey_hex: list.fp.pk_hex(),
            height,
            pub_rand: list.pub_rand(height),
            proof: list.proof(height),
            block_app_hash: Binary::new(app_hash.to_vec()),
            signature: list.vote(CHAIN_ID, fp_addr, height, app_hash),
        }
    }

    #[test]
    fn commit_public_randomness_works() {
        let mut deps = mock_dependencies();
        let chain = BtcChain::new(100);
        instantiate_with_chain(deps.as_mut(), &chain);
        let fp1 = BtcKey::from_seed("fp1");
        let owner = register_fp(deps.as_mut(), &fp1, "fp1-owner");
        let info = message_info(&owner, &[]);

        let list = PubRandList::generate(&fp1, 200, 100);
        // Signed for another address
        let mut msg = commit_msg(&list, owner.as_str());
        if let ExecuteMsg::CommitPublicRandomness { signature, .. } = &mut msg {
            *signature = list.commit_sig(CHAIN_ID, "someone-else");
        }
        let err = execute(deps.as_mut(), env_at(120), info.clone(), msg).unwrap_err();
        assert_matches!(err, ContractError::InvalidCommitmentSignature(_));

        execute(
            deps.as_mut(),
            env_at(120),
            info.clone(),
            commit_msg(&list, owner.as_str()),
        )
        .unwrap();
        let commit = queries::last_pub_rand_commit(deps.as_ref(), fp1.pk_hex())
            .unwrap()
            .unwrap();
        assert_eq!(commit.start_height, 200);
        assert_eq!(commit.end_height(), 299);
        assert_eq!(commit.epoch_num, 2);

        // Overlapping commitment
        let overlapping = PubRandList::generate(&fp1, 250, 100);
        let err = execute(
            deps.as_mut(),
            env_at(121),
            info.clone(),
            commit_msg(&overlapping, owner.as_str()),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::InvalidPubRandHeight(250, 299));

        let next = PubRandList::generate(&fp1, 300, 100);
        execute(
            deps.as_mut(),
            env_at(121),
            info,
            commit_msg(&next, owner.as_str()),
        )
        .unwrap();
        let commit = queries::pub_rand_commit_for_height(deps.as_ref(), fp1.pk_hex(), 301)
            .unwrap()
            .unwrap();
        assert_eq!(commit.start_height, 300);
    }

    /// fp1 with all the stake, in the active set from height 151
    pub(crate) fn active_fp(deps: DepsMut<'_>) -> (BtcKey, cosmwasm_std::Addr, PubRandList) {
        let mut deps = deps;
        let mut chain = BtcChain::new(100);
        instantiate_with_chain(deps.branch(), &chain);
        let fp1 = BtcKey::from_seed("fp1");
        let owner = register_fp(deps.branch(), &fp1, "fp1-owner");
        activate_delegation(deps.branch(), &mut chain, &[&fp1], "staker", 100_000);

        let list = PubRandList::generate(&fp1, 150, 200);
        execute(
            deps.branch(),
            env_at(120),
            message_info(&owner, &[]),
            commit_msg(&list, owner.as_str()),
        )
        .unwrap();
        finalize_epoch(deps.branch(), 150, 2);
        end_block(deps.branch(), 150, b"block-150");
        (fp1, owner, list)
    }

    #[test]
    fn votes_finalize_blocks() {
        let mut deps = mock_dependencies();
        let (fp1, owner, list) = active_fp(deps.as_mut());
        let fp_set = queries::active_finality_providers(deps.as_ref(), 151).unwrap();
        assert_eq!(fp_set.fps.len(), 1);
        assert_eq!(fp_set.fps[0].power, 100_000);

        end_block(deps.as_mut(), 151, b"block-151");
        let info = message_info(&owner, &[]);
        // Not yet indexed
        let err = execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&list, owner.as_str(), 152, b"block-152"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::BlockNotFound(152));

        let res = execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&list, owner.as_str(), 151, b"block-151"),
        )
        .unwrap();
        assert_eq!(res.events[0].ty, "finality_vote");
        let votes = queries::votes(deps.as_ref(), 151).unwrap();
        assert_eq!(votes.btc_pks, vec![fp1.pk_hex()]);

        // The exact same vote again is a no-op
        let res = execute(
            deps.as_mut(),
            env_at(152),
            info,
            vote_msg(&list, owner.as_str(), 151, b"block-151"),
        )
        .unwrap();
        assert!(res.events.is_empty());
        assert_eq!(
            res.data,
            Some(cosmwasm_std::to_json_binary(&ExecuteResult::not_refundable()).unwrap())
        );

        let res = end_block(deps.as_mut(), 152, b"block-152");
        assert!(res.events.iter().any(|e| e.ty == "block_finalized"));
        let block = queries::block(deps.as_ref(), 151).unwrap();
        assert!(block.finalized);
        let block = queries::block(deps.as_ref(), 152).unwrap();
        assert!(!block.finalized);
    }

    #[test]
    fn votes_need_activation_and_valid_signature() {
        let mut deps = mock_dependencies();
        let (fp1, owner, list) = active_fp(deps.as_mut());
        end_block(deps.as_mut(), 151, b"block-151");
        let info = message_info(&owner, &[]);

        // Signature over another block
        let mut msg = vote_msg(&list, owner.as_str(), 151, b"block-151");
        if let ExecuteMsg::SubmitFinalitySignature { signature, .. } = &mut msg {
            *signature = list.vote(CHAIN_ID, owner.as_str(), 151, b"other");
        }
        let err = execute(deps.as_mut(), env_at(152), info.clone(), msg).unwrap_err();
        assert_eq!(err, ContractError::EotsSigInvalid);

        // Randomness of another height
        let mut msg = vote_msg(&list, owner.as_str(), 151, b"block-151");
        if let ExecuteMsg::SubmitFinalitySignature { pub_rand, .. } = &mut msg {
            *pub_rand = list.pub_rand(160);
        }
        let err = execute(deps.as_mut(), env_at(152), info.clone(), msg).unwrap_err();
        assert_eq!(err, ContractError::PubRandProofInvalid);

        // Not in the active set at that height
        let early = PubRandList::generate(&fp1, 140, 10);
        let err = execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&early, owner.as_str(), 140, b"block-140"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::NoVotingPower(fp1.pk_hex(), 140));

        // Before the activation height
        let mut cfg = FINALITY_CONFIG.load(&deps.storage).unwrap();
        cfg.finality_activation_height = 152;
        FINALITY_CONFIG.save(&mut deps.storage, &cfg).unwrap();
        let err = execute(
            deps.as_mut(),
            env_at(152),
            info,
            vote_msg(&list, owner.as_str(), 151, b"block-151"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::HeightBeforeActivation(151, 152));
    }

    #[test]
    fn slashed_voter_does_not_finalize() {
        let mut deps = mock_dependencies();
        let (fp1, owner, list) = active_fp(deps.as_mut());
        end_block(deps.as_mut(), 151, b"block-151");
        let info = message_info(&owner, &[]);
        execute(
            deps.as_mut(),
            env_at(152),
            info.clone(),
            vote_msg(&list, owner.as_str(), 151, b"block-151"),
        )
        .unwrap();
        execute(
            deps.as_mut(),
            env_at(152),
            info,
            vote_msg(&list, owner.as_str(), 151, b"fork-151"),
        )
        .unwrap();
        assert!(load_fp(&deps.storage, &fp1.pk_hex()).unwrap().is_slashed());

        // The canonical vote is kept, but its power no longer counts
        assert_eq!(voted_at(&deps.storage, 151).unwrap(), vec![fp1.pk_hex()]);
        assert!(block_voters(&deps.storage, 151).unwrap().is_empty());

        let res = end_block(deps.as_mut(), 152, b"block-152");
        assert!(!res.events.iter().any(|e| e.ty == "block_finalized"));
        assert!(!res.events.iter().any(|e| e.ty == "rewards_distributed"));
        assert!(!queries::block(deps.as_ref(), 151).unwrap().finalized);
    }

    #[test]
    fn proof_index_overflow_is_rejected() {
        let fp1 = BtcKey::from_seed("fp1");
        let list = PubRandList::generate(&fp1, 150, 10);
        let pr_commit = PubRandCommit {
            start_height: list.start_height,
            num_pub_rand: list.num_pub_rand(),
            height: 100,
            epoch_num: 1,
            commitment: list.commitment.clone(),
        };
        let mut proof = list.proof(151);
        proof.index = u64::MAX;
        let ctx = fp_fin_vote_context(CHAIN_ID, "fp1-owner");
        let err = verify_finality_signature(
            &fp1.pk_hex(),
            151,
            &list.pub_rand(151),
            &proof,
            &pr_commit,
            &ctx,
            b"block-151",
            &list.vote(CHAIN_ID, "fp1-owner", 151, b"block-151"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::PubRandProofInvalid);
    }

    #[test]
    fn randomness_must_be_timestamped() {
        let mut deps = mock_dependencies();
        let mut chain = BtcChain::new(100);
        instantiate_with_chain(deps.as_mut(), &chain);
        let fp1 = BtcKey::from_seed("fp1");
        let owner = register_fp(deps.as_mut(), &fp1, "fp1-owner");
        activate_delegation(deps.as_mut(), &mut chain, &[&fp1], "staker", 100_000);

        let list = PubRandList::generate(&fp1, 150, 200);
        execute(
            deps.as_mut(),
            env_at(120),
            message_info(&owner, &[]),
            commit_msg(&list, owner.as_str()),
        )
        .unwrap();
        // Epoch 2 is not finalized: the provider stays out of the active set
        end_block(deps.as_mut(), 150, b"block-150");
        let fp_set = queries::active_finality_providers(deps.as_ref(), 151).unwrap();
        assert!(fp_set.fps.is_empty());
        assert_eq!(queries::activated_height(deps.as_ref()).unwrap().height, 0);

        finalize_epoch(deps.as_mut(), 151, 2);
        end_block(deps.as_mut(), 151, b"block-151");
        let fp_set = queries::active_finality_providers(deps.as_ref(), 152).unwrap();
        assert_eq!(fp_set.fps.len(), 1);
        assert_eq!(queries::activated_height(deps.as_ref()).unwrap().height, 152);
        assert!(voted_at(&deps.storage, 151).unwrap().is_empty());
    }
}
