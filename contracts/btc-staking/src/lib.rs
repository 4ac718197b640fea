mod costaking;
mod covenant;
mod finality;
mod hooks;
mod light_client;
mod liveness;
mod rewards;
mod slashing;
mod staking;
mod validation;

pub mod contract;
pub mod error;
pub mod msg;
pub mod queries;
pub mod state;

#[cfg(test)]
mod multitest;
#[cfg(test)]
mod test_utils;
