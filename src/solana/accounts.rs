//!
//! Oracle program account addresses, binary layouts and instruction encoding.
//!
//! All integers are little-endian. Both account kinds start with an 8-byte record-type
//! discriminator written by the program; it is skipped on decode.
//!
//! ```text
//! oracle state : disc[8] | authority[32] | last_updated_block u64 | total_roots_posted u64
//! root record  : disc[8] | block_height u64 | root_hash[32] | timestamp i64 | output_count u32
//! instruction  : tag u8 (0 = Initialize, 1 = PostMerkleRoot) | payload
//! ```

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk_ids::{system_program, sysvar};

use super::types::{OracleState, RootRecord, SolanaError};

/// Seed of the singleton oracle-state PDA.
pub const ORACLE_STATE_SEED: &[u8] = b"oracle_state";
/// Seed prefix of per-height root-record PDAs; followed by the height as `u64` LE.
pub const MERKLE_ROOT_SEED: &[u8] = b"merkle_root";

pub const DISCRIMINATOR_LEN: usize = 8;
pub const ORACLE_STATE_LEN: usize = DISCRIMINATOR_LEN + 32 + 8 + 8;
pub const ROOT_PAYLOAD_LEN: usize = 8 + 32 + 8 + 4;
pub const ROOT_RECORD_LEN: usize = DISCRIMINATOR_LEN + ROOT_PAYLOAD_LEN;

/// Leading instruction byte selecting the program operation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleInstruction {
	Initialize = 0,
	PostMerkleRoot = 1,
}

pub fn oracle_state_address(program_id: &Pubkey) -> (Pubkey, u8) {
	Pubkey::find_program_address(&[ORACLE_STATE_SEED], program_id)
}

pub fn root_record_address(program_id: &Pubkey, block_height: u64) -> (Pubkey, u8) {
	Pubkey::find_program_address(&[MERKLE_ROOT_SEED, &block_height.to_le_bytes()], program_id)
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
	let mut out = [0u8; N];
	out.copy_from_slice(&data[offset..offset + N]);
	out
}

impl RootRecord {
	/// PostMerkleRoot payload: the root-record fields without the discriminator.
	pub fn encode_payload(&self) -> [u8; ROOT_PAYLOAD_LEN] {
		let mut payload = [0u8; ROOT_PAYLOAD_LEN];
		payload[0..8].copy_from_slice(&self.block_height.to_le_bytes());
		payload[8..40].copy_from_slice(&self.root_hash);
		payload[40..48].copy_from_slice(&self.timestamp.to_le_bytes());
		payload[48..52].copy_from_slice(&self.output_count.to_le_bytes());
		payload
	}

	/// Decode root-record account data.
	pub fn decode_account(data: &[u8]) -> Result<Self, SolanaError> {
		if data.len() < ROOT_RECORD_LEN {
			return Err(SolanaError::ProtocolError(format!(
				"Root record account is {} bytes, expected at least {}",
				data.len(),
				ROOT_RECORD_LEN
			)));
		}

		let body = &data[DISCRIMINATOR_LEN..];
		Ok(Self {
			block_height: u64::from_le_bytes(read_array(body, 0)),
			root_hash: read_array(body, 8),
			timestamp: i64::from_le_bytes(read_array(body, 40)),
			output_count: u32::from_le_bytes(read_array(body, 48)),
		})
	}
}

impl OracleState {
	/// Decode oracle-state account data.
	pub fn decode_account(data: &[u8]) -> Result<Self, SolanaError> {
		if data.len() < ORACLE_STATE_LEN {
			return Err(SolanaError::ProtocolError(format!(
				"Oracle state account is {} bytes, expected at least {}",
				data.len(),
				ORACLE_STATE_LEN
			)));
		}

		let body = &data[DISCRIMINATOR_LEN..];
		Ok(Self {
			authority: Pubkey::new_from_array(read_array(body, 0)),
			last_updated_block: u64::from_le_bytes(read_array(body, 32)),
			total_roots_posted: u64::from_le_bytes(read_array(body, 40)),
		})
	}
}

pub fn initialize_instruction(program_id: &Pubkey, authority: &Pubkey) -> Instruction {
	let (oracle_state, _) = oracle_state_address(program_id);

	Instruction {
		program_id: *program_id,
		accounts: vec![
			AccountMeta::new(*authority, true),
			AccountMeta::new(oracle_state, false),
			AccountMeta::new_readonly(system_program::ID, false),
			AccountMeta::new_readonly(sysvar::rent::ID, false),
		],
		data: vec![OracleInstruction::Initialize as u8],
	}
}

pub fn post_root_instruction(
	program_id: &Pubkey,
	authority: &Pubkey,
	record: &RootRecord,
) -> Instruction {
	let (oracle_state, _) = oracle_state_address(program_id);
	let (root_record, _) = root_record_address(program_id, record.block_height);

	let mut data = Vec::with_capacity(1 + ROOT_PAYLOAD_LEN);
	data.push(OracleInstruction::PostMerkleRoot as u8);
	data.extend_from_slice(&record.encode_payload());

	Instruction {
		program_id: *program_id,
		accounts: vec![
			AccountMeta::new(*authority, true),
			AccountMeta::new(oracle_state, false),
			AccountMeta::new(root_record, false),
			AccountMeta::new_readonly(system_program::ID, false),
			AccountMeta::new_readonly(sysvar::rent::ID, false),
		],
		data,
	}
}
