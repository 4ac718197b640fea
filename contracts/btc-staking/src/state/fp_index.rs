use cw_storage_plus::{Index, IndexList, MultiIndex};

use crate::state::staking::FinalityProviderState;

/// Secondary indexes over the per-height finality provider snapshots
pub struct FinalityProviderIndexes<'a> {
    /// Voting power, for ordering the active set
    pub power: MultiIndex<'a, u64, FinalityProviderState, String>,
}

impl IndexList<FinalityProviderState> for FinalityProviderIndexes<'_> {
    fn get_indexes(&self) -> Box<dyn Iterator<Item = &dyn Index<FinalityProviderState>> + '_> {
        let indexes: Vec<&dyn Index<FinalityProviderState>> = vec![&self.power];
        Box::new(indexes.into_iter())
    }
}
