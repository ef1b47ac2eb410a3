//! 32-bit FNV-1 hashing of metric names.
//!
//! Each metric's position along the noise coordinate and its baseline level
//! are derived from this hash, so a given name always traces the same curve.

const OFFSET_BASIS: u32 = 2_166_136_261;
const PRIME: u32 = 16_777_619;

/// FNV-1 hash of `bytes`: multiply by the prime, then xor in each byte.
#[must_use]
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(PRIME) ^ u32::from(*byte)
    })
}

#[cfg(test)]
mod tests {
    use super::fnv1_32;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(fnv1_32(b""), 2_166_136_261);
    }

    #[test]
    fn known_hashes() {
        assert_eq!(fnv1_32(b"a"), 84_696_446);
        assert_eq!(fnv1_32(b"foo.bar"), 2_097_228_606);
        assert_eq!(fnv1_32(b"foo.bar.baz"), 3_045_365_595);
    }

    #[test]
    fn order_matters() {
        assert_ne!(fnv1_32(b"foo.bar"), fnv1_32(b"bar.foo"));
    }
}
