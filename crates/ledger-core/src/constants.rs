pub const BYTE: usize = 8;
pub const U64_SIZE: usize = std::mem::size_of::<u64>();
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ACCOUNT_ID_SIZE: usize = 16;
/// index, previous hash, merkle root, tx count, timestamp, nonce
pub const HEADER_HASH_INPUT_SIZE: usize = U64_SIZE + HASH_SIZE + HASH_SIZE + U64_SIZE * 3;
/// Largest leading-zero-bit target a SHA-256 digest can meet.
pub const MAX_LEADING_ZERO_BITS: u64 = (HASH_SIZE * BYTE) as u64;
pub const DEFAULT_ROUNDS: u64 = 1_000_000;
pub const DEFAULT_REWARD: u64 = 1;
pub const POW_TARGET_DIFFICULTY: u64 = 20;
