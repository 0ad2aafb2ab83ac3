//!
//! Builds per-block Merkle commitments from Monero outputs.
//!
//! Every output is canonicalised into a compact JSON object with a fixed key order and
//! hashed with SHA-256 to form its leaf. The key order and spelling are part of the
//! commitment format: changing either changes every root posted on-chain.

use serde::Serialize;
use tracing::debug;

use super::{Hash32, MerkleError, MerkleProof, MerkleTree, hash};
use crate::monero::Output;

/// Canonical leaf encoding. Field order is significant.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeafPreimage<'a> {
	tx_hash: &'a str,
	output_index: u32,
	stealth_address: &'a str,
	one_time_address: &'a str,
	ecdh_amount: &'a str,
}

/// Stateless builder turning ordered outputs into a [`MerkleTree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleTreeBuilder;

impl MerkleTreeBuilder {
	pub fn new() -> Self {
		Self
	}

	/// Canonical byte encoding of an output's leaf preimage.
	pub fn serialize_output(output: &Output) -> Vec<u8> {
		let preimage = LeafPreimage {
			tx_hash: &output.tx_hash,
			output_index: output.output_index,
			stealth_address: &output.stealth_address,
			one_time_address: &output.one_time_address,
			ecdh_amount: &output.ecdh_info.amount,
		};

		// Serializing borrowed strings and an integer into a Vec cannot fail.
		serde_json::to_vec(&preimage).unwrap_or_default()
	}

	/// The 32-byte leaf digest of an output.
	pub fn leaf(output: &Output) -> Hash32 {
		hash(&Self::serialize_output(output))
	}

	/// Build a tree over `outputs` in the order given.
	pub fn build_from_outputs(&self, outputs: &[Output]) -> Result<MerkleTree, MerkleError> {
		if outputs.is_empty() {
			return Err(MerkleError::EmptyInput);
		}

		let leaves = outputs.iter().map(Self::leaf).collect();
		let tree = MerkleTree::new(leaves)?;
		debug!(
			"Built Merkle tree over {} outputs ({} layers)",
			tree.leaf_count(),
			tree.depth()
		);
		Ok(tree)
	}

	/// Build the tree for `outputs` and prove membership of the output identified by
	/// `(tx_hash, output_index)`.
	pub fn proof_for_output(
		&self,
		outputs: &[Output],
		tx_hash: &str,
		output_index: u32,
	) -> Result<MerkleProof, MerkleError> {
		let tree = self.build_from_outputs(outputs)?;

		let index = outputs
			.iter()
			.position(|output| output.tx_hash == tx_hash && output.output_index == output_index)
			.ok_or_else(|| MerkleError::OutputNotFound {
				tx_hash: tx_hash.to_string(),
				output_index,
			})?;

		tree.proof(index)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::monero::EcdhInfo;

	fn output(tx_hash: &str, output_index: u32) -> Output {
		Output {
			tx_hash: tx_hash.to_string(),
			output_index,
			amount: 0,
			stealth_address: format!("{tx_hash}-key-{output_index}"),
			one_time_address: format!("{tx_hash}-outpk-{output_index}"),
			ecdh_info: EcdhInfo {
				amount: format!("{output_index:016x}"),
				mask: "0".to_string(),
			},
			block_height: 1_948_001,
		}
	}

	#[test]
	fn leaf_preimage_is_compact_json_in_fixed_order() {
		let out = Output {
			tx_hash: "ab".to_string(),
			output_index: 3,
			amount: 0,
			stealth_address: "cd".to_string(),
			one_time_address: "ef".to_string(),
			ecdh_info: EcdhInfo {
				amount: "01".to_string(),
				mask: "ff".to_string(),
			},
			block_height: 7,
		};

		let bytes = MerkleTreeBuilder::serialize_output(&out);
		assert_eq!(
			String::from_utf8(bytes).unwrap(),
			r#"{"txHash":"ab","outputIndex":3,"stealthAddress":"cd","oneTimeAddress":"ef","ecdhAmount":"01"}"#
		);
	}

	#[test]
	fn leaf_ignores_fields_outside_the_preimage() {
		let a = output("aa", 0);
		let mut b = a.clone();
		b.amount = 42;
		b.block_height = 1;
		b.ecdh_info.mask = "different".to_string();

		assert_eq!(MerkleTreeBuilder::leaf(&a), MerkleTreeBuilder::leaf(&b));

		b.ecdh_info.amount = "changed".to_string();
		assert_ne!(MerkleTreeBuilder::leaf(&a), MerkleTreeBuilder::leaf(&b));
	}

	#[test]
	fn empty_outputs_are_rejected() {
		let builder = MerkleTreeBuilder::new();
		assert!(matches!(
			builder.build_from_outputs(&[]),
			Err(MerkleError::EmptyInput)
		));
	}

	#[test]
	fn same_outputs_build_same_root() {
		let builder = MerkleTreeBuilder::new();
		let outputs = vec![output("aa", 0), output("aa", 1), output("bb", 0)];

		let first = builder.build_from_outputs(&outputs).unwrap();
		let second = builder.build_from_outputs(&outputs.clone()).unwrap();
		assert_eq!(first.root(), second.root());
		assert_eq!(first.leaf_count(), 3);
	}

	#[test]
	fn proof_for_output_finds_by_hash_and_index() {
		let builder = MerkleTreeBuilder::new();
		let outputs = vec![output("aa", 0), output("aa", 1), output("bb", 0)];

		let proof = builder.proof_for_output(&outputs, "aa", 1).unwrap();
		assert_eq!(proof.leaf, MerkleTreeBuilder::leaf(&outputs[1]));
		assert!(MerkleTree::verify(&proof));

		let root = builder.build_from_outputs(&outputs).unwrap().root();
		assert_eq!(proof.root, root);
	}

	#[test]
	fn proof_for_missing_output_fails() {
		let builder = MerkleTreeBuilder::new();
		let outputs = vec![output("aa", 0)];

		let err = builder.proof_for_output(&outputs, "aa", 5).unwrap_err();
		assert!(matches!(
			err,
			MerkleError::OutputNotFound { output_index: 5, .. }
		));
	}

	#[test]
	fn proof_json_names_sides_and_hex_encodes_hashes() {
		let builder = MerkleTreeBuilder::new();
		let outputs = vec![output("aa", 0), output("aa", 1), output("bb", 0)];

		let proof = builder.proof_for_output(&outputs, "bb", 0).unwrap();
		let json = serde_json::to_value(&proof).unwrap();

		assert_eq!(
			json["leaf"],
			hex::encode(MerkleTreeBuilder::leaf(&outputs[2]))
		);
		assert_eq!(json["sides"], serde_json::json!(["left", "right"]));
		assert_eq!(json["siblings"].as_array().unwrap().len(), 2);
	}
}
