use minechain_core::{block_hash, Block, Difficulty};

pub fn difficulty(zeros: u8) -> Difficulty {
    Difficulty::new(zeros).expect("valid difficulty")
}

/// Asserts linkage, contiguity and proof of work without going through
/// `chain::verify`.
pub fn assert_chain_invariants(chain: &[Block], difficulty: Difficulty) {
    assert!(!chain.is_empty(), "chain must hold genesis");
    assert!(chain[0].is_genesis(), "first block must be genesis");
    for (i, block) in chain.iter().enumerate() {
        assert_eq!(block.index, i as u64, "index gap at position {i}");
        if i == 0 {
            continue;
        }
        let prev = &chain[i - 1];
        assert_eq!(block.prev_hash, prev.hash, "broken link at {i}");
        assert!(block.timestamp >= prev.timestamp, "timestamp regression at {i}");
        let recomputed = block_hash(
            block.index,
            block.timestamp,
            &block.payload,
            &block.prev_hash,
            block.nonce,
        );
        assert_eq!(recomputed, block.hash, "hash mismatch at {i}");
        let prefix = "0".repeat(difficulty.zeros() as usize);
        assert!(
            block.hash.to_hex().starts_with(&prefix),
            "block {i} lacks proof of work"
        );
    }
}
