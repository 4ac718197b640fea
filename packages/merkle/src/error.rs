use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MerkleError {
    #[error("Leaf hash must be {expected} bytes, got {actual}")]
    InvalidLeafHashSize { expected: usize, actual: usize },
    #[error("Aunt #{index} must be {expected} bytes, got {actual}")]
    InvalidAuntSize {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Proof carries {0} aunts, at most {1} allowed")]
    TooManyAunts(usize, usize),
    #[error("Root hash cannot be empty")]
    EmptyRoot,
    #[error("Leaf does not match the proof's leaf hash")]
    LeafHashMismatch,
    #[error("Proof does not lead to the expected root hash")]
    RootHashMismatch,
    #[error("Index {index} is out of range for a tree of {total} leaves")]
    InvalidIndex { index: u64, total: u64 },
    #[error("Expected {expected} aunts for this position, got {actual}")]
    WrongAuntCount { expected: usize, actual: usize },
}
