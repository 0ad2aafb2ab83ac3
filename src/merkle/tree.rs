//!
//! Binary SHA-256 Merkle tree with sorted-pair node hashing.
//!
//! Each parent is `SHA256(min(a, b) || max(a, b))` where the comparison is over raw bytes,
//! so combining two siblings is commutative. A layer with an odd number of nodes pairs its
//! last node with itself. Proofs therefore attest membership only: they carry the sibling
//! path but the recomputation never depends on which side a node was on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::MerkleError;

/// A 32-byte SHA-256 digest used for leaves, inner nodes and the root.
pub type Hash32 = [u8; 32];

/// Hash arbitrary bytes with SHA-256.
pub fn hash(data: &[u8]) -> Hash32 {
	Sha256::digest(data).into()
}

/// Combine two child hashes into their parent.
///
/// The pair is ordered by unsigned byte value before hashing, so
/// `combine(a, b) == combine(b, a)`.
pub fn combine(a: &Hash32, b: &Hash32) -> Hash32 {
	let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
	let mut hasher = Sha256::new();
	hasher.update(lo);
	hasher.update(hi);
	hasher.finalize().into()
}

/// Which side of its pair a node occupied when the proof was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSide {
	/// Even position within its layer.
	Left,
	/// Odd position within its layer.
	Right,
}

/// Membership proof for a single leaf.
///
/// `siblings` and `sides` are in leaf-to-root order and always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
	#[serde(with = "hex_hash")]
	pub leaf: Hash32,
	#[serde(with = "hex_hash")]
	pub root: Hash32,
	#[serde(with = "hex_hashes")]
	pub siblings: Vec<Hash32>,
	pub sides: Vec<NodeSide>,
}

/// An immutable Merkle tree over a non-empty, ordered leaf set.
#[derive(Debug, Clone)]
pub struct MerkleTree {
	/// `layers[0]` holds the leaves, the last layer holds only the root.
	layers: Vec<Vec<Hash32>>,
}

impl MerkleTree {
	/// Build a tree from leaf digests.
	///
	/// Returns [`MerkleError::EmptyInput`] when `leaves` is empty.
	pub fn new(leaves: Vec<Hash32>) -> Result<Self, MerkleError> {
		if leaves.is_empty() {
			return Err(MerkleError::EmptyInput);
		}

		let mut layers = vec![leaves];
		while let Some(current) = layers.last().filter(|layer| layer.len() > 1) {
			let next: Vec<Hash32> = current
				.chunks(2)
				.map(|pair| match pair {
					[left, right] => combine(left, right),
					[last] => combine(last, last),
					_ => unreachable!("chunks(2) yields one or two elements"),
				})
				.collect();
			layers.push(next);
		}

		Ok(Self { layers })
	}

	/// The root digest. A single-leaf tree's root is the leaf itself.
	pub fn root(&self) -> Hash32 {
		self.layers[self.layers.len() - 1][0]
	}

	pub fn leaf_count(&self) -> usize {
		self.layers[0].len()
	}

	/// Number of layers including the leaf layer and the root layer.
	pub fn depth(&self) -> usize {
		self.layers.len()
	}

	/// Produce the membership proof for the leaf at `index`.
	pub fn proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
		let leaf_count = self.leaf_count();
		if index >= leaf_count {
			return Err(MerkleError::IndexOutOfRange { index, leaf_count });
		}

		let mut siblings = Vec::with_capacity(self.layers.len() - 1);
		let mut sides = Vec::with_capacity(self.layers.len() - 1);
		let mut position = index;

		for layer in &self.layers[..self.layers.len() - 1] {
			let is_right = position % 2 == 1;
			// The odd tail at the end of a layer is its own sibling.
			let sibling = if is_right {
				position - 1
			} else {
				(position + 1).min(layer.len() - 1)
			};

			if let Some(node) = layer.get(sibling) {
				siblings.push(*node);
				sides.push(if is_right {
					NodeSide::Right
				} else {
					NodeSide::Left
				});
			}

			position /= 2;
		}

		Ok(MerkleProof {
			leaf: self.layers[0][index],
			root: self.root(),
			siblings,
			sides,
		})
	}

	/// Check a proof by re-hashing the leaf with each sibling in turn.
	///
	/// The recorded sides are not consulted: sorted-pair hashing makes them irrelevant to
	/// the recomputed value.
	pub fn verify(proof: &MerkleProof) -> bool {
		if proof.siblings.len() != proof.sides.len() {
			return false;
		}

		let computed = proof
			.siblings
			.iter()
			.fold(proof.leaf, |acc, sibling| combine(&acc, sibling));

		computed == proof.root
	}
}

mod hex_hash {
	use super::Hash32;
	use serde::{Deserialize, Deserializer, Serializer, de::Error};

	pub fn serialize<S: Serializer>(hash: &Hash32, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&hex::encode(hash))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
		bytes
			.try_into()
			.map_err(|_| D::Error::custom("expected a 32-byte hash"))
	}
}

mod hex_hashes {
	use super::Hash32;
	use serde::{Deserialize, Deserializer, Serializer, de::Error, ser::SerializeSeq};

	pub fn serialize<S: Serializer>(hashes: &[Hash32], serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(hashes.len()))?;
		for hash in hashes {
			seq.serialize_element(&hex::encode(hash))?;
		}
		seq.end()
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(
		deserializer: D,
	) -> Result<Vec<Hash32>, D::Error> {
		Vec::<String>::deserialize(deserializer)?
			.into_iter()
			.map(|encoded| {
				let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
				bytes
					.try_into()
					.map_err(|_| D::Error::custom("expected a 32-byte hash"))
			})
			.collect()
	}
}
