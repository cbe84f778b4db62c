//!
//! Argument predicates shared by the RPC services and the event channel.
//!
//! All checks are pure and run before any collaborator is consulted.

/// Checksummed address encoding
pub mod chash;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Encoded length of a unit hash.
pub const HASH_LENGTH: usize = 44;

/// Uppercase 32-character chash with a valid checksum.
pub fn is_valid_address(address: &str) -> bool {
	address.len() == chash::CHASH160_LEN
		&& address == address.to_uppercase()
		&& chash::is_chash_valid(address)
}

/// Same as [`is_valid_address`] but tolerant of lowercase input.
pub fn is_valid_address_any_case(address: &str) -> bool {
	is_valid_address(&address.to_uppercase())
}

/// The value as a strictly positive integer, if it is one.
///
/// Strings, negative numbers and fractions are rejected.
pub fn positive_integer(value: &Value) -> Option<u64> {
	value.as_u64().filter(|n| *n > 0)
}

pub fn nonnegative_integer(value: &Value) -> Option<u64> {
	value.as_u64()
}

/// Standard base64 string of `HASH_LENGTH` characters that round-trips exactly.
pub fn is_valid_base64_hash(encoded: &str) -> bool {
	if encoded.len() != HASH_LENGTH {
		return false;
	}
	match STANDARD.decode(encoded) {
		Ok(bytes) => STANDARD.encode(bytes) == encoded,
		Err(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::chash::chash160;
	use super::*;
	use serde_json::json;

	#[test]
	fn address_must_be_uppercase_unless_any_case() {
		let address = chash160(b"wallet-address");
		assert!(is_valid_address(&address));

		let lower = address.to_lowercase();
		assert!(!is_valid_address(&lower));
		assert!(is_valid_address_any_case(&lower));
		assert!(!is_valid_address("not-a-real-address"));
	}

	#[test]
	fn positive_integer_rejects_non_positive_and_non_numeric() {
		assert_eq!(positive_integer(&json!(7)), Some(7));
		for rejected in [json!(0), json!(-1), json!("abc"), json!("5"), json!(1.5), json!(null)] {
			assert_eq!(positive_integer(&rejected), None, "{} accepted", rejected);
		}
		assert_eq!(nonnegative_integer(&json!(0)), Some(0));
	}

	#[test]
	fn base64_hash_requires_exact_length_and_padding() {
		let hash = STANDARD.encode([7u8; 32]);
		assert!(is_valid_base64_hash(&hash));
		assert!(!is_valid_base64_hash(&hash[..43]));
		assert!(!is_valid_base64_hash(&"!".repeat(44)));
	}
}
