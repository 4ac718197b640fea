pub use bitcoin::{
    block::{Header as BlockHeader, Version},
    consensus::encode::Error as EncodeError,
    consensus::{deserialize, serialize},
    hash_types,
    hashes::{sha256d, Hash},
    BlockHash, CompactTarget, Transaction, TxMerkleNode, Txid,
};

pub mod chain_params;
pub mod error;
pub mod merkle;

pub type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::constants::genesis_block;

    #[test]
    fn regtest_genesis_header_round_trips() {
        let header = genesis_block(bitcoin::Network::Regtest).header;
        let bytes = serialize(&header);
        assert_eq!(bytes.len(), 80);

        let decoded: BlockHeader = deserialize(&bytes).unwrap();
        assert_eq!(decoded.block_hash(), header.block_hash());
        assert_eq!(
            decoded.block_hash().to_string(),
            "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206"
        );
    }
}
