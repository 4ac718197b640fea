use std::cmp::Ordering;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint256;

/// Points alignment is how many points should be added / subtracted from the points a
/// delegation earned through its finality provider's points-per-stake, due to stake changes.
/// It has to be a signed type, so the stored value is offset by `Uint256::MAX / 2`, keeping
/// every calculation within U256.
#[cw_serde]
#[derive(Copy)]
pub struct PointsAlignment(Uint256);

impl PointsAlignment {
    pub fn new() -> Self {
        Self(Uint256::MAX >> 1)
    }

    /// Align points with alignment
    pub fn align(self, points: Uint256) -> Uint256 {
        match self.0.cmp(&(Uint256::MAX >> 1)) {
            // Negative alignment: add it first and remove the offset after, to stay in range
            Ordering::Less => points + self.0 - (Uint256::MAX >> 1),
            Ordering::Greater => points + (self.0 - (Uint256::MAX >> 1)),
            Ordering::Equal => points,
        }
    }

    /// A stake increase must not earn the points distributed before it
    ///
    /// * amount - satoshis added
    /// * pps - points per stake right now
    pub fn stake_increased(&mut self, amount: u64, pps: Uint256) {
        self.0 -= Uint256::from(amount) * pps;
    }

    /// A stake decrease keeps the points already earned by the removed stake
    ///
    /// * amount - satoshis removed
    /// * pps - points per stake right now
    pub fn stake_decreased(&mut self, amount: u64, pps: Uint256) {
        self.0 += Uint256::from(amount) * pps;
    }
}

impl Default for PointsAlignment {
    fn default() -> Self {
        Self::new()
    }
}
