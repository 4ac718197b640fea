pub mod config;
pub mod costaking;
pub mod delegations;
pub mod finality;
pub mod light_client;
pub mod params;
pub mod points_alignment;
pub mod public_randomness;
pub mod rewards;
pub mod staking;

mod fp_index;
