use crate::error::{MinerError, Result};
use crate::utils::DIGEST_LEN;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

// Digests are 256 bits wide, so the target and nonce live in the same space
const SEARCH_SPACE_BITS: usize = 256;

/// Parse a hex string into an unsigned big integer.
///
/// Leading zeros are ignored and the length is free; anything that is not an ASCII
/// hex digit (including an empty string or a `0x` prefix) is rejected.
pub fn parse_hex(value: &str) -> Result<BigUint> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(MinerError::MalformedHex(value.to_string()));
    }
    BigUint::parse_bytes(value.as_bytes(), 16)
        .ok_or_else(|| MinerError::MalformedHex(value.to_string()))
}

/// Returns true when `id_hex <= target_hex` as unsigned integers
pub fn is_valid(id_hex: &str, target_hex: &str) -> Result<bool> {
    let id = parse_hex(id_hex)?;
    let target = parse_hex(target_hex)?;
    Ok(id <= target)
}

/// Largest value the nonce (or any 256-bit quantity) may take
pub fn max_search_value() -> BigUint {
    (BigUint::one() << SEARCH_SPACE_BITS) - BigUint::one()
}

/// A parsed difficulty target, kept around so the search loop never re-parses it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyTarget {
    hex: String,
    value: BigUint,
}

impl DifficultyTarget {
    pub fn from_hex(hex: &str) -> Result<DifficultyTarget> {
        let value = parse_hex(hex)?;
        if value > max_search_value() {
            return Err(MinerError::MalformedHex(format!(
                "{hex} (target wider than {SEARCH_SPACE_BITS} bits)"
            )));
        }
        Ok(DifficultyTarget {
            hex: hex.to_string(),
            value,
        })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Check a raw digest against the target
    pub fn is_met_by(&self, digest: &[u8; DIGEST_LEN]) -> bool {
        BigUint::from_bytes_be(digest) <= self.value
    }

    /// Check a hex id against the target
    pub fn is_met_by_hex(&self, id_hex: &str) -> Result<bool> {
        Ok(parse_hex(id_hex)? <= self.value)
    }

    /// Mean number of attempts needed for a uniformly random digest to land at or
    /// below the target: `2^256 / (target + 1)`
    pub fn expected_tries(&self) -> f64 {
        let space = BigUint::one() << SEARCH_SPACE_BITS;
        let tries = space / (&self.value + BigUint::one());
        tries.to_f64().unwrap_or(f64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET_15: &str = "000000000000000000000000000000000000000000000000000000000000000f";

    #[test]
    fn test_numeric_comparison() {
        let id_10 = format!("{:064x}", 10);
        let id_20 = format!("{:064x}", 20);
        assert!(is_valid(&id_10, TARGET_15).unwrap());
        assert!(!is_valid(&id_20, TARGET_15).unwrap());
        assert!(is_valid(TARGET_15, TARGET_15).unwrap());
    }

    #[test]
    fn test_lengths_need_not_match() {
        // Equal values padded differently behave identically
        let padded = format!("{:064x}", 10);
        for id in ["a", "0a", "000000a", padded.as_str()] {
            assert!(is_valid(id, "f").unwrap());
            assert!(is_valid(id, TARGET_15).unwrap());
            assert!(!is_valid(id, "09").unwrap());
        }
        // Lexical order would get this wrong
        assert!(!is_valid("100", "0ff").unwrap());
    }

    #[test]
    fn test_uppercase_accepted() {
        assert!(is_valid("0A", "0f").unwrap());
    }

    #[test]
    fn test_malformed_hex() {
        assert_eq!(
            is_valid("zz", TARGET_15),
            Err(MinerError::MalformedHex("zz".to_string()))
        );
        assert!(matches!(is_valid("0a", ""), Err(MinerError::MalformedHex(_))));
        assert!(matches!(is_valid("0x0a", "f"), Err(MinerError::MalformedHex(_))));
        assert!(matches!(is_valid("0_a", "f"), Err(MinerError::MalformedHex(_))));
    }

    #[test]
    fn test_target_matches_digest() {
        let target = DifficultyTarget::from_hex(TARGET_15).unwrap();
        let mut digest = [0u8; DIGEST_LEN];
        digest[DIGEST_LEN - 1] = 10;
        assert!(target.is_met_by(&digest));
        digest[DIGEST_LEN - 1] = 20;
        assert!(!target.is_met_by(&digest));
        assert!(target.is_met_by_hex("0a").unwrap());
    }

    #[test]
    fn test_target_too_wide() {
        let wide = format!("1{}", "0".repeat(64));
        assert!(matches!(
            DifficultyTarget::from_hex(&wide),
            Err(MinerError::MalformedHex(_))
        ));
    }

    #[test]
    fn test_expected_tries() {
        let loosest = DifficultyTarget::from_hex(&"f".repeat(64)).unwrap();
        assert_eq!(loosest.expected_tries(), 1.0);

        // Half of the space qualifies
        let half = DifficultyTarget::from_hex(&format!("7{}", "f".repeat(63))).unwrap();
        assert_eq!(half.expected_tries(), 2.0);
    }

    #[test]
    fn test_max_search_value() {
        assert_eq!(max_search_value(), parse_hex(&"f".repeat(64)).unwrap());
    }
}
