use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version as TxVersion;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};
use cosmwasm_std::Binary;

use babylon_apis::btc_staking_api::BtcInclusionProof;
use babylon_bitcoin::merkle::merkle_root_and_path;
use babylon_bitcoin::{
    serialize, BlockHash, BlockHeader, CompactTarget, Hash, Transaction, TxMerkleNode, Txid,
    Version,
};

/// Difficulty bits of regtest blocks
pub const REGTEST_BITS: u32 = 0x207fffff;
/// Timestamp of the base header
pub const BTC_BASE_TIME: u32 = 1_700_000_000;

/// Hex encoding of a consensus-serialized header
pub fn header_hex(header: &BlockHeader) -> String {
    hex::encode(serialize(header))
}

fn coinbase(height: u32) -> Transaction {
    Transaction {
        version: TxVersion::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(height.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(50),
            script_pubkey: ScriptBuf::new(),
        }],
    }
}

/// A chain of BTC blocks built on top of a base header. Every block carries a coinbase
/// followed by the given transactions
pub struct BtcChain {
    pub base_height: u32,
    headers: Vec<BlockHeader>,
    txids: Vec<Vec<Txid>>,
}

impl BtcChain {
    pub fn new(base_height: u32) -> Self {
        let mut chain = BtcChain {
            base_height,
            headers: vec![],
            txids: vec![],
        };
        chain.push(BlockHash::all_zeros(), vec![]);
        chain
    }

    fn push(&mut self, prev_blockhash: BlockHash, txs: Vec<Transaction>) -> u32 {
        let height = self.base_height + self.headers.len() as u32;
        let txids: Vec<Txid> = std::iter::once(coinbase(height))
            .chain(txs)
            .map(|tx| tx.txid())
            .collect();
        let (root, _) = merkle_root_and_path(&txids, 0).unwrap();
        self.headers.push(BlockHeader {
            version: Version::from_consensus(4),
            prev_blockhash,
            merkle_root: TxMerkleNode::from_raw_hash(root),
            time: BTC_BASE_TIME + 600 * (height - self.base_height),
            bits: CompactTarget::from_consensus(REGTEST_BITS),
            nonce: height,
        });
        self.txids.push(txids);
        height
    }

    pub fn base_header(&self) -> &BlockHeader {
        &self.headers[0]
    }

    pub fn tip_height(&self) -> u32 {
        self.base_height + self.headers.len() as u32 - 1
    }

    pub fn header(&self, height: u32) -> &BlockHeader {
        &self.headers[(height - self.base_height) as usize]
    }

    /// Mines a block with the given transactions, returning its height
    pub fn add_block(&mut self, txs: Vec<Transaction>) -> u32 {
        let prev = self.headers[self.headers.len() - 1].block_hash();
        self.push(prev, txs)
    }

    /// Mines `n` blocks without transactions, returning their headers
    pub fn add_empty_blocks(&mut self, n: u32) -> Vec<BlockHeader> {
        (0..n)
            .map(|_| {
                let height = self.add_block(vec![]);
                *self.header(height)
            })
            .collect()
    }

    /// Headers above `height`, up to the tip
    pub fn headers_after(&self, height: u32) -> Vec<BlockHeader> {
        self.headers[(height + 1 - self.base_height) as usize..].to_vec()
    }

    /// Inclusion proof of the `tx_index`-th transaction of the block at `height`, counting
    /// the coinbase as index 0
    pub fn inclusion_proof(&self, height: u32, tx_index: u32) -> BtcInclusionProof {
        let idx = (height - self.base_height) as usize;
        let (_, path) = merkle_root_and_path(&self.txids[idx], tx_index as usize).unwrap();
        BtcInclusionProof {
            block_hash_hex: self.headers[idx].block_hash().to_string(),
            tx_index,
            merkle_path: Binary::new(path.concat()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babylon_bitcoin::merkle::{split_merkle_path, verify_merkle_proof};
    use babylon_bitcoin::sha256d;

    #[test]
    fn inclusion_proof_matches_header() {
        let mut chain = BtcChain::new(100);
        let tx = coinbase(7777);
        let height = chain.add_block(vec![tx.clone()]);
        assert_eq!(height, 101);
        assert_eq!(chain.tip_height(), 101);

        let proof = chain.inclusion_proof(height, 1);
        let path = split_merkle_path(&proof.merkle_path).unwrap();
        let root: sha256d::Hash = chain.header(height).merkle_root.to_raw_hash();
        assert!(verify_merkle_proof(&tx, &path, 1, &root));
        assert_eq!(
            chain.header(height).prev_blockhash,
            chain.base_header().block_hash()
        );
    }
}
