use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Merkle proof element {0} is not a 32-byte hash")]
    InvalidMerkleProofElement(usize),
    #[error("Transaction index {0} is out of range for {1} transactions")]
    TxIndexOutOfRange(usize, usize),
    #[error("Cannot compute the merkle root of an empty block")]
    EmptyBlock {},
}
