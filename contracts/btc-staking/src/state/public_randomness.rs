use cosmwasm_std::Order::{Ascending, Descending};
use cosmwasm_std::{StdResult, Storage};
use cw_storage_plus::{Bound, Map};

use babylon_apis::finality_api::PubRandCommit;

use crate::error::ContractError;
use crate::state::finality::LAST_FINALIZED_EPOCH;

/// Map of public randomness commitments by fp and start height
pub const PUB_RAND_COMMITS: Map<(&str, u64), PubRandCommit> = Map::new("fp_pub_rand_commit");

pub fn get_pub_rand_commit_for_height(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
    height: u64,
) -> Result<Option<PubRandCommit>, ContractError> {
    let end_at = Some(Bound::inclusive(height));
    let res = PUB_RAND_COMMITS
        .prefix(fp_btc_pk_hex)
        .range_raw(storage, None, end_at, Descending)
        .take(1)
        .map(|item| {
            let (_, value) = item?;
            Ok(value)
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(res.into_iter().next().filter(|commit| commit.in_range(height)))
}

/// Whether the epoch a commitment was submitted in is finalized on Bitcoin
pub fn is_timestamped(storage: &dyn Storage, pr_commit: &PubRandCommit) -> StdResult<bool> {
    Ok(LAST_FINALIZED_EPOCH
        .may_load(storage)?
        .is_some_and(|epoch| pr_commit.epoch_num <= epoch))
}

// `get_timestamped_pub_rand_commit_for_height` finds the BTC-timestamped public randomness
// commitment that includes the given height for the given finality provider
pub fn get_timestamped_pub_rand_commit_for_height(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
    height: u64,
) -> Result<PubRandCommit, ContractError> {
    let pr_commit = get_pub_rand_commit_for_height(storage, fp_btc_pk_hex, height)?.ok_or_else(
        || ContractError::PubRandNotCommitted(fp_btc_pk_hex.to_string(), height),
    )?;
    if !is_timestamped(storage, &pr_commit)? {
        return Err(ContractError::PubRandCommitNotTimestamped(
            fp_btc_pk_hex.to_string(),
            height,
        ));
    }
    Ok(pr_commit)
}

pub fn get_first_pub_rand_commit(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
) -> Result<Option<PubRandCommit>, ContractError> {
    let res = get_pub_rand_commit(storage, fp_btc_pk_hex, None, Some(1), Some(false))?;
    Ok(res.into_iter().next())
}

pub fn get_last_pub_rand_commit(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
) -> Result<Option<PubRandCommit>, ContractError> {
    let res = get_pub_rand_commit(storage, fp_btc_pk_hex, None, Some(1), Some(true))?;
    Ok(res.into_iter().next())
}

// Settings for pagination
const MAX_LIMIT: u32 = 30;
const DEFAULT_LIMIT: u32 = 10;

pub fn get_pub_rand_commit(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
    start_after: Option<u64>,
    limit: Option<u32>,
    reverse: Option<bool>,
) -> Result<Vec<PubRandCommit>, ContractError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after.map(Bound::exclusive);
    let (start, end, order) = if reverse.unwrap_or(false) {
        (None, start_after, Descending)
    } else {
        (start_after, None, Ascending)
    };
    let res = PUB_RAND_COMMITS
        .prefix(fp_btc_pk_hex)
        .range_raw(storage, start, end, order)
        .take(limit)
        .map(|item| {
            let (_, value) = item?;
            Ok(value)
        })
        .collect::<StdResult<Vec<_>>>()?;

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    fn commit(start_height: u64, num_pub_rand: u64, epoch_num: u64) -> PubRandCommit {
        PubRandCommit {
            start_height,
            num_pub_rand,
            height: epoch_num * 10,
            epoch_num,
            commitment: vec![7u8; 32],
        }
    }

    #[test]
    fn commitment_lookup_by_height() {
        let mut storage = MockStorage::new();
        PUB_RAND_COMMITS
            .save(&mut storage, ("fp1", 10), &commit(10, 10, 1))
            .unwrap();
        PUB_RAND_COMMITS
            .save(&mut storage, ("fp1", 30), &commit(30, 5, 2))
            .unwrap();

        assert_eq!(
            get_pub_rand_commit_for_height(&storage, "fp1", 19).unwrap(),
            Some(commit(10, 10, 1))
        );
        // Gap between the two commitments
        assert_eq!(
            get_pub_rand_commit_for_height(&storage, "fp1", 25).unwrap(),
            None
        );
        assert_eq!(
            get_pub_rand_commit_for_height(&storage, "fp2", 12).unwrap(),
            None
        );

        assert_eq!(
            get_first_pub_rand_commit(&storage, "fp1").unwrap(),
            Some(commit(10, 10, 1))
        );
        assert_eq!(
            get_last_pub_rand_commit(&storage, "fp1").unwrap(),
            Some(commit(30, 5, 2))
        );
    }

    #[test]
    fn commitments_are_usable_once_timestamped() {
        let mut storage = MockStorage::new();
        PUB_RAND_COMMITS
            .save(&mut storage, ("fp1", 30), &commit(30, 5, 2))
            .unwrap();

        assert_eq!(
            get_timestamped_pub_rand_commit_for_height(&storage, "fp1", 31).unwrap_err(),
            ContractError::PubRandCommitNotTimestamped("fp1".to_string(), 31)
        );
        LAST_FINALIZED_EPOCH.save(&mut storage, &1).unwrap();
        assert!(get_timestamped_pub_rand_commit_for_height(&storage, "fp1", 31).is_err());
        LAST_FINALIZED_EPOCH.save(&mut storage, &2).unwrap();
        assert_eq!(
            get_timestamped_pub_rand_commit_for_height(&storage, "fp1", 31).unwrap(),
            commit(30, 5, 2)
        );
        assert_eq!(
            get_timestamped_pub_rand_commit_for_height(&storage, "fp1", 35).unwrap_err(),
            ContractError::PubRandNotCommitted("fp1".to_string(), 35)
        );
    }
}
