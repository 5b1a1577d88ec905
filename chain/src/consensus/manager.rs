//! Longest-chain manager with orphan buffering and reorganization.
//!
//! The manager owns three collections guarded by a single mutex:
//!
//! - `by_height`: the current main chain, indexed 0..n-1,
//! - `by_hash`: hash index over exactly the main-chain blocks,
//! - `orphans`: blocks whose ancestor path to genesis is not yet
//!   reconstructable, or whose branch is not yet longer than the main
//!   chain.
//!
//! All reads, writes, reorganizations, and orphan resolution run under
//! that one lock, so block application is linearized and a reorg is
//! atomic from an external observer's viewpoint.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Mutex;

use crate::hash;
use crate::types::{unix_nanos, Block, GENESIS_PREVIOUS_HASH};

use super::error::ChainError;

/// How an accepted block was spliced into the chain.
///
/// Orphan admission is a success (the block is retained for future
/// resolution), but callers often want to report it differently from
/// an append, so the disposition is returned explicitly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockDisposition {
    /// The block became the height-0 block of an empty chain.
    Genesis,
    /// The block extended the current tip.
    Extended,
    /// The block completed a strictly longer fork; the main chain was
    /// replaced.
    Reorganized,
    /// The block was parked in the orphan pool.
    Orphaned,
}

#[derive(Default)]
struct ChainState {
    by_height: BTreeMap<u64, Block>,
    by_hash: HashMap<Vec<u8>, Block>,
    orphans: HashMap<Vec<u8>, Block>,
}

impl ChainState {
    fn find_by_hash(&self, hash: &[u8]) -> Option<&Block> {
        self.by_hash.get(hash).or_else(|| self.orphans.get(hash))
    }

    /// Walks back from `block` to the genesis sentinel, resolving each
    /// parent via the main chain or the orphan pool, and returns the
    /// ordered chain `[genesis, .., block]`.
    fn try_form_chain(&self, block: &Block) -> Result<Vec<Block>, ChainError> {
        let mut chain = vec![block.clone()];
        let mut current = block.clone();

        while current.header.previous_hash != GENESIS_PREVIOUS_HASH {
            match self.find_by_hash(&current.header.previous_hash) {
                Some(parent) => {
                    chain.push(parent.clone());
                    current = parent.clone();
                }
                None => {
                    return Err(ChainError::UnknownAncestor(hash::to_hex(
                        &current.header.previous_hash,
                    )));
                }
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Replaces the main chain with `new_chain` (assumed to start at
    /// genesis and be strictly longer), then drops any orphan that is
    /// now part of the main chain so the two pools stay disjoint.
    fn reorganize(&mut self, new_chain: Vec<Block>) {
        self.by_height.clear();
        self.by_hash.clear();

        for (height, block) in new_chain.into_iter().enumerate() {
            self.by_hash.insert(block.header.hash.clone(), block.clone());
            self.by_height.insert(height as u64, block);
        }

        let absorbed: Vec<Vec<u8>> = self
            .orphans
            .keys()
            .filter(|key| self.by_hash.contains_key(*key))
            .cloned()
            .collect();
        for key in absorbed {
            self.orphans.remove(&key);
        }
    }

    /// Re-checks every orphan to fixed point: any orphan that now
    /// completes a strictly longer chain triggers a reorganization and
    /// leaves the pool. Orphans that neither attach nor supersede
    /// remain for future re-checks.
    fn process_orphans(&mut self) {
        loop {
            let mut progress = false;
            let keys: Vec<Vec<u8>> = self.orphans.keys().cloned().collect();

            for key in keys {
                let orphan = match self.orphans.get(&key) {
                    Some(block) => block.clone(),
                    None => continue,
                };

                let candidate = match self.try_form_chain(&orphan) {
                    Ok(chain) => chain,
                    Err(_) => continue,
                };

                if candidate.len() as u64 > self.by_height.len() as u64 {
                    tracing::info!(
                        orphan = %hash::to_hex(&orphan.header.hash),
                        new_length = candidate.len(),
                        "reorganizing chain using orphan block"
                    );
                    self.reorganize(candidate);
                    self.orphans.remove(&key);
                    progress = true;
                }
            }

            if !progress {
                break;
            }
        }
    }
}

/// Thread-safe longest-chain store.
#[derive(Default)]
pub struct ChainManager {
    state: Mutex<ChainState>,
}

impl ChainManager {
    /// Creates a new, empty chain manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to splice `block` into the chain.
    ///
    /// Returns the [`BlockDisposition`] on success. Duplicates and
    /// blocks whose ancestry is unknown to both pools are rejected with
    /// distinct errors; no state is mutated on failure.
    pub fn add_block(&self, mut block: Block) -> Result<BlockDisposition, ChainError> {
        let mut state = self.state.lock().expect("chain state lock poisoned");

        if state.by_hash.contains_key(&block.header.hash)
            || state.orphans.contains_key(&block.header.hash)
        {
            return Err(ChainError::DuplicateBlock(hash::to_hex(&block.header.hash)));
        }

        let height = state.by_height.len() as u64;
        if height == 0 {
            block.header.previous_hash = GENESIS_PREVIOUS_HASH.to_vec();
            block.header.timestamp = unix_nanos();
            state.by_hash.insert(block.header.hash.clone(), block.clone());
            state.by_height.insert(0, block);
            state.process_orphans();
            return Ok(BlockDisposition::Genesis);
        }

        let tip_hash = state
            .by_height
            .get(&(height - 1))
            .map(|tip| tip.header.hash.clone())
            .unwrap_or_default();

        if block.header.previous_hash == tip_hash {
            block.header.timestamp = unix_nanos();
            state.by_hash.insert(block.header.hash.clone(), block.clone());
            state.by_height.insert(height, block);
            state.process_orphans();
            return Ok(BlockDisposition::Extended);
        }

        match state.try_form_chain(&block) {
            Ok(candidate) => {
                if candidate.len() as u64 > height {
                    tracing::info!(
                        new_length = candidate.len(),
                        old_length = height,
                        "reorganizing chain to a longer fork"
                    );
                    state.reorganize(candidate);
                    state.process_orphans();
                    Ok(BlockDisposition::Reorganized)
                } else {
                    tracing::debug!(
                        block = %hash::to_hex(&block.header.hash),
                        "valid fork is not longer; parking block as orphan"
                    );
                    state.orphans.insert(block.header.hash.clone(), block);
                    state.process_orphans();
                    Ok(BlockDisposition::Orphaned)
                }
            }
            Err(_) => {
                if state.find_by_hash(&block.header.previous_hash).is_none() {
                    tracing::debug!(
                        block = %hash::to_hex(&block.header.hash),
                        ancestor = %hash::to_hex(&block.header.previous_hash),
                        "discarding block with unknown ancestor"
                    );
                    return Err(ChainError::UnknownAncestor(hash::to_hex(
                        &block.header.previous_hash,
                    )));
                }

                tracing::debug!(
                    block = %hash::to_hex(&block.header.hash),
                    "ancestor known but chain incomplete; parking block as orphan"
                );
                state.orphans.insert(block.header.hash.clone(), block);
                Ok(BlockDisposition::Orphaned)
            }
        }
    }

    /// Returns `true` if a main-chain block with this hash exists.
    pub fn has_block(&self, hash: &[u8]) -> bool {
        let state = self.state.lock().expect("chain state lock poisoned");
        state.by_hash.contains_key(hash)
    }

    /// Fetches a main-chain block by hash, if present.
    pub fn get_block(&self, hash: &[u8]) -> Option<Block> {
        let state = self.state.lock().expect("chain state lock poisoned");
        state.by_hash.get(hash).cloned()
    }

    /// Fetches a main-chain block by height, if present.
    pub fn get_block_by_height(&self, height: u64) -> Option<Block> {
        let state = self.state.lock().expect("chain state lock poisoned");
        state.by_height.get(&height).cloned()
    }

    /// Fetches the inclusive height range `[start, end]`.
    ///
    /// Fails when `start > end` or when any height in the range is
    /// missing.
    pub fn fetch_blocks(&self, start: u64, end: u64) -> Result<Vec<Block>, ChainError> {
        if start > end {
            return Err(ChainError::InvalidRange { start, end });
        }

        let state = self.state.lock().expect("chain state lock poisoned");
        let mut blocks = Vec::with_capacity((end - start + 1) as usize);
        for height in start..=end {
            match state.by_height.get(&height) {
                Some(block) => blocks.push(block.clone()),
                None => return Err(ChainError::HeightNotFound(height)),
            }
        }
        Ok(blocks)
    }

    /// Returns `true` if any main-chain block carries this Merkle root.
    pub fn has_merkle_root(&self, merkle_root: &[u8]) -> bool {
        let state = self.state.lock().expect("chain state lock poisoned");
        state
            .by_height
            .values()
            .any(|block| block.header.merkle_root == merkle_root)
    }

    /// Returns the current main-chain length.
    pub fn height(&self) -> u64 {
        let state = self.state.lock().expect("chain state lock poisoned");
        state.by_height.len() as u64
    }

    /// Returns the current tip block, if the chain is initialized.
    pub fn tip(&self) -> Option<Block> {
        let state = self.state.lock().expect("chain state lock poisoned");
        let height = state.by_height.len() as u64;
        if height == 0 {
            return None;
        }
        state.by_height.get(&(height - 1)).cloned()
    }

    /// Returns the number of parked orphans.
    pub fn orphan_count(&self) -> usize {
        let state = self.state.lock().expect("chain state lock poisoned");
        state.orphans.len()
    }

    /// Clears the main chain and the orphan pool.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("chain state lock poisoned");
        state.by_height.clear();
        state.by_hash.clear();
        state.orphans.clear();
    }

    /// Writes the main chain to `path` as a JSON object keyed by
    /// decimal height.
    pub fn persist(&self, path: &Path) -> Result<(), ChainError> {
        let state = self.state.lock().expect("chain state lock poisoned");
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &state.by_height)?;
        Ok(())
    }

    /// Replaces the main chain with the snapshot at `path`, rebuilding
    /// the hash index from the height index.
    pub fn load(&self, path: &Path) -> Result<(), ChainError> {
        let file = File::open(path)?;
        let by_height: BTreeMap<u64, Block> = serde_json::from_reader(BufReader::new(file))?;

        let mut state = self.state.lock().expect("chain state lock poisoned");
        state.by_hash.clear();
        for block in by_height.values() {
            state.by_hash.insert(block.header.hash.clone(), block.clone());
        }
        state.by_height = by_height;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHeader;

    /// Builds a block with an explicit identity and parent reference.
    fn make_block(hash: &[u8], previous: &[u8]) -> Block {
        Block {
            header: BlockHeader {
                previous_hash: previous.to_vec(),
                hash: hash.to_vec(),
                timestamp: 1_700_000_000_000_000_000,
                ..BlockHeader::default()
            },
            transactions: Vec::new(),
        }
    }

    fn seeded_chain() -> ChainManager {
        // Heights {0: A, 1: B}.
        let chain = ChainManager::new();
        chain
            .add_block(make_block(b"A", b"GENESIS_TAG"))
            .expect("genesis should be accepted");
        chain
            .add_block(make_block(b"B", b"A"))
            .expect("tip extension should be accepted");
        chain
    }

    #[test]
    fn genesis_and_tip_extension_assign_heights() {
        let chain = seeded_chain();

        assert_eq!(chain.height(), 2);
        assert_eq!(chain.get_block_by_height(0).unwrap().header.hash, b"A");
        assert_eq!(chain.get_block_by_height(1).unwrap().header.hash, b"B");

        // The genesis sentinel replaces whatever the producer sent.
        assert_eq!(
            chain.get_block_by_height(0).unwrap().header.previous_hash,
            GENESIS_PREVIOUS_HASH
        );
    }

    #[test]
    fn every_accepted_block_links_to_its_parent() {
        let chain = seeded_chain();
        chain.add_block(make_block(b"C", b"B")).unwrap();

        for height in 1..chain.height() {
            let child = chain.get_block_by_height(height).unwrap();
            let parent = chain.get_block_by_height(height - 1).unwrap();
            assert_eq!(child.header.previous_hash, parent.header.hash);
        }
    }

    #[test]
    fn accepted_blocks_are_indexed_by_hash_and_height() {
        let chain = seeded_chain();
        let block = make_block(b"C", b"B");
        chain.add_block(block.clone()).unwrap();

        assert!(chain.has_block(b"C"));
        assert_eq!(chain.get_block(b"C").unwrap().header.hash, b"C");
        assert_eq!(chain.get_block_by_height(2).unwrap().header.hash, b"C");
    }

    #[test]
    fn duplicate_blocks_are_rejected() {
        let chain = seeded_chain();
        let err = chain.add_block(make_block(b"B", b"A")).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateBlock(_)));
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn duplicate_orphans_are_rejected() {
        let chain = seeded_chain();
        assert_eq!(
            chain.add_block(make_block(b"F1", b"A")).unwrap(),
            BlockDisposition::Orphaned
        );
        let err = chain.add_block(make_block(b"F1", b"A")).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateBlock(_)));
    }

    #[test]
    fn longer_fork_triggers_reorganization() {
        let chain = seeded_chain();

        // F1 competes with B at height 1: parked as orphan.
        assert_eq!(
            chain.add_block(make_block(b"F1", b"A")).unwrap(),
            BlockDisposition::Orphaned
        );
        assert_eq!(chain.get_block_by_height(1).unwrap().header.hash, b"B");

        // F2 completes a strictly longer fork: reorganize.
        assert_eq!(
            chain.add_block(make_block(b"F2", b"F1")).unwrap(),
            BlockDisposition::Reorganized
        );

        assert_eq!(chain.height(), 3);
        assert_eq!(chain.get_block_by_height(0).unwrap().header.hash, b"A");
        assert_eq!(chain.get_block_by_height(1).unwrap().header.hash, b"F1");
        assert_eq!(chain.get_block_by_height(2).unwrap().header.hash, b"F2");

        // The absorbed orphan left the pool; the displaced B did not
        // re-enter the main chain.
        assert_eq!(chain.orphan_count(), 0);
        assert!(!chain.has_block(b"B"));
    }

    #[test]
    fn equal_length_fork_does_not_reorganize() {
        let chain = seeded_chain();
        assert_eq!(
            chain.add_block(make_block(b"F1", b"A")).unwrap(),
            BlockDisposition::Orphaned
        );

        // The incumbent wins ties.
        assert_eq!(chain.get_block_by_height(1).unwrap().header.hash, b"B");
        assert_eq!(chain.orphan_count(), 1);
    }

    #[test]
    fn disconnected_block_is_rejected_and_chain_unchanged() {
        let chain = seeded_chain();
        let err = chain.add_block(make_block(b"X", b"UNKNOWN")).unwrap_err();
        assert!(matches!(err, ChainError::UnknownAncestor(_)));

        assert_eq!(chain.height(), 2);
        assert!(!chain.has_block(b"X"));
        assert_eq!(chain.orphan_count(), 0);
    }

    #[test]
    fn three_way_competition_selects_longest_fork() {
        let chain = ChainManager::new();
        chain.add_block(make_block(b"G", b"GENESIS")).unwrap();

        // Fork 1, length 2, extends the tip directly.
        chain.add_block(make_block(b"F1_1", b"G")).unwrap();
        chain.add_block(make_block(b"F1_2", b"F1_1")).unwrap();

        // Fork 2, length 3, arrives block by block.
        assert_eq!(
            chain.add_block(make_block(b"F2_1", b"G")).unwrap(),
            BlockDisposition::Orphaned
        );
        assert_eq!(
            chain.add_block(make_block(b"F2_2", b"F2_1")).unwrap(),
            BlockDisposition::Orphaned
        );
        assert_eq!(
            chain.add_block(make_block(b"F2_3", b"F2_2")).unwrap(),
            BlockDisposition::Reorganized
        );

        assert_eq!(chain.height(), 4);
        assert_eq!(chain.get_block_by_height(0).unwrap().header.hash, b"G");
        assert_eq!(chain.get_block_by_height(1).unwrap().header.hash, b"F2_1");
        assert_eq!(chain.get_block_by_height(2).unwrap().header.hash, b"F2_2");
        assert_eq!(chain.get_block_by_height(3).unwrap().header.hash, b"F2_3");
    }

    #[test]
    fn fetch_blocks_returns_inclusive_range() {
        let chain = seeded_chain();
        chain.add_block(make_block(b"C", b"B")).unwrap();

        let blocks = chain.fetch_blocks(0, 2).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].header.hash, b"A");
        assert_eq!(blocks[2].header.hash, b"C");
    }

    #[test]
    fn fetch_blocks_rejects_inverted_and_missing_ranges() {
        let chain = seeded_chain();

        let err = chain.fetch_blocks(3, 1).unwrap_err();
        assert!(matches!(err, ChainError::InvalidRange { .. }));

        let err = chain.fetch_blocks(0, 9).unwrap_err();
        assert!(matches!(err, ChainError::HeightNotFound(2)));
    }

    #[test]
    fn has_merkle_root_sees_main_chain_roots() {
        let chain = ChainManager::new();
        let mut genesis = make_block(b"G", b"GENESIS");
        genesis.header.merkle_root = b"root-g".to_vec();
        chain.add_block(genesis).unwrap();

        assert!(chain.has_merkle_root(b"root-g"));
        assert!(!chain.has_merkle_root(b"root-x"));
    }

    #[test]
    fn tip_tracks_the_highest_block() {
        let chain = ChainManager::new();
        assert!(chain.tip().is_none());

        chain.add_block(make_block(b"G", b"GENESIS")).unwrap();
        assert_eq!(chain.tip().unwrap().header.hash, b"G");

        chain.add_block(make_block(b"B1", b"G")).unwrap();
        assert_eq!(chain.tip().unwrap().header.hash, b"B1");
    }

    #[test]
    fn reset_clears_everything() {
        let chain = seeded_chain();
        chain.add_block(make_block(b"F1", b"A")).unwrap();

        chain.reset();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.orphan_count(), 0);
        assert!(!chain.has_block(b"A"));
    }

    #[test]
    fn snapshot_round_trips_and_rebuilds_hash_index() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("blockchain.json");

        let chain = seeded_chain();
        chain.add_block(make_block(b"C", b"B")).unwrap();
        chain.persist(&path).expect("persist should succeed");

        let restored = ChainManager::new();
        restored.load(&path).expect("load should succeed");

        assert_eq!(restored.height(), 3);
        assert_eq!(restored.get_block_by_height(2).unwrap().header.hash, b"C");
        assert!(restored.has_block(b"A"));
        assert!(restored.has_block(b"B"));
        assert!(restored.has_block(b"C"));
    }

    #[test]
    fn loading_a_missing_snapshot_fails_with_io_error() {
        let chain = ChainManager::new();
        let err = chain.load(Path::new("does-not-exist.json")).unwrap_err();
        assert!(matches!(err, ChainError::Io(_)));
    }

    #[test]
    fn concurrent_additions_linearize_under_the_lock() {
        use std::sync::Arc;

        let chain = Arc::new(ChainManager::new());
        chain.add_block(make_block(b"G", b"GENESIS")).unwrap();

        // Ten competitors race to extend the same tip; exactly one can
        // win each height, the rest park as orphans or get rejected.
        let mut handles = Vec::new();
        for i in 0..10u8 {
            let chain = chain.clone();
            handles.push(std::thread::spawn(move || {
                let _ = chain.add_block(make_block(&[b'R', i], b"G"));
            }));
        }
        for handle in handles {
            handle.join().expect("racer thread panicked");
        }

        assert_eq!(chain.height(), 2);
        for height in 1..chain.height() {
            let child = chain.get_block_by_height(height).unwrap();
            let parent = chain.get_block_by_height(height - 1).unwrap();
            assert_eq!(child.header.previous_hash, parent.header.hash);
        }
    }
}
