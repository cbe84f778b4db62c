//! Checksummed 160-bit hashes used as ledger addresses.
//!
//! An address is the base32 encoding of 160 bits: 128 bits of truncated
//! RIPEMD-160 interleaved with 32 checksum bits. The checksum bits sit at
//! offsets obtained by accumulating the non-zero digits of pi, and carry bytes
//! 5, 13, 21 and 29 of the SHA-256 of the clean 128 bits.

#[cfg(test)]
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const PI: &[u8] = b"14159265358979323846264338327950288419716939937510";
const CHASH_BITS: usize = 160;
const CHECKSUM_BITS: usize = 32;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encoded length of a 160-bit chash.
pub const CHASH160_LEN: usize = 32;

fn checksum_offsets() -> Vec<usize> {
	let mut offsets = Vec::with_capacity(CHECKSUM_BITS);
	let mut offset = 0;
	for digit in PI.iter().map(|d| (d - b'0') as usize) {
		if digit == 0 {
			continue;
		}
		offset += digit;
		if offset >= CHASH_BITS {
			break;
		}
		offsets.push(offset);
	}
	debug_assert_eq!(offsets.len(), CHECKSUM_BITS);
	offsets
}

fn to_bits(bytes: &[u8]) -> Vec<bool> {
	bytes
		.iter()
		.flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
		.collect()
}

fn from_bits(bits: &[bool]) -> Vec<u8> {
	bits.chunks(8)
		.map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit)))
		.collect()
}

fn checksum(clean_data: &[u8]) -> [u8; 4] {
	let full = Sha256::digest(clean_data);
	[full[5], full[13], full[21], full[29]]
}

#[cfg(test)]
fn mix_checksum(clean_bits: &[bool], checksum_bits: &[bool]) -> Vec<bool> {
	let offsets = checksum_offsets();
	let mut clean = clean_bits.iter();
	let mut check = checksum_bits.iter();
	(0..CHASH_BITS)
		.filter_map(|pos| {
			if offsets.contains(&pos) {
				check.next().copied()
			} else {
				clean.next().copied()
			}
		})
		.collect()
}

fn separate_checksum(bits: &[bool]) -> (Vec<bool>, Vec<bool>) {
	let offsets = checksum_offsets();
	let (check, clean): (Vec<(usize, &bool)>, Vec<(usize, &bool)>) = bits
		.iter()
		.enumerate()
		.partition(|(pos, _)| offsets.contains(pos));
	(
		clean.into_iter().map(|(_, b)| *b).collect(),
		check.into_iter().map(|(_, b)| *b).collect(),
	)
}

#[cfg(test)]
fn base32_encode(bytes: &[u8]) -> String {
	to_bits(bytes)
		.chunks(5)
		.map(|chunk| {
			let index = chunk
				.iter()
				.chain(std::iter::repeat(&false))
				.take(5)
				.fold(0usize, |acc, bit| (acc << 1) | usize::from(*bit));
			BASE32_ALPHABET[index] as char
		})
		.collect()
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
	let mut bits = Vec::with_capacity(encoded.len() * 5);
	for c in encoded.bytes() {
		let value = BASE32_ALPHABET.iter().position(|a| *a == c)?;
		bits.extend((0..5).rev().map(|i| (value >> i) & 1 == 1));
	}
	bits.truncate(bits.len() - bits.len() % 8);
	Some(from_bits(&bits))
}

/// Derive the 160-bit chash address of `data`.
#[cfg(test)]
pub fn chash160(data: &[u8]) -> String {
	let hash = Ripemd160::digest(data);
	let truncated = &hash[4..];
	let mixed = mix_checksum(&to_bits(truncated), &to_bits(&checksum(truncated)));
	base32_encode(&from_bits(&mixed))
}

/// Whether `encoded` is a well-formed 160-bit chash with a matching checksum.
pub fn is_chash_valid(encoded: &str) -> bool {
	if encoded.len() != CHASH160_LEN {
		return false;
	}
	let Some(bytes) = base32_decode(encoded) else {
		return false;
	};
	if bytes.len() * 8 != CHASH_BITS {
		return false;
	}
	let (clean, check) = separate_checksum(&to_bits(&bytes));
	from_bits(&check) == checksum(&from_bits(&clean))
}
