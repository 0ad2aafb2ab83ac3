//! Merkle commitment module
//!
//! Hashes a block's outputs into leaves, reduces them to a single root with sorted-pair
//! SHA-256 hashing, and produces and checks membership proofs against that root.

/// Output-to-leaf canonicalisation and tree construction
mod builder;
/// Tree layers, proofs and verification
mod tree;

pub use builder::MerkleTreeBuilder;
pub use tree::{Hash32, MerkleProof, MerkleTree, hash};

/// Errors raised by tree construction and proof generation.
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
	#[error("Cannot build a Merkle tree from an empty leaf set")]
	EmptyInput,

	#[error("Leaf index {index} out of range for tree with {leaf_count} leaves")]
	IndexOutOfRange { index: usize, leaf_count: usize },

	#[error("Output {tx_hash}:{output_index} is not part of the leaf set")]
	OutputNotFound { tx_hash: String, output_index: u32 },
}
