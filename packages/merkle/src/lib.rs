pub mod error;
pub mod hash;
pub mod proof;
pub mod tree;

pub use proof::{proofs_from_byte_slices, Proof};
pub use tree::hash_from_byte_slices;
