/// 128-bit FNV-1a digest of a shader source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceHash(pub u128);

impl SourceHash {
    /// Lowercase hex, 32 characters.
    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }
}

impl std::fmt::Display for SourceHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Hashes `source` after trimming surrounding whitespace.
pub fn fingerprint(source: &str) -> SourceHash {
    let mut h = Fnv1a128::new();
    h.write_bytes(source.trim().as_bytes());
    SourceHash(h.finish())
}

struct Fnv1a128(u128);

impl Fnv1a128 {
    const OFFSET_BASIS: u128 = 0x6c62272e07bb014262b821756295c58d;
    const PRIME: u128 = 0x0000000001000000000000000000013b;

    fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u128;
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    fn finish(self) -> u128 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(fingerprint("").to_hex(), "6c62272e07bb014262b821756295c58d");
    }

    #[test]
    fn hex_is_32_lowercase_chars() {
        let hex = fingerprint("@fragment fn fs_main() {}").to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(fingerprint("  abc\n"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }

    #[test]
    fn display_matches_to_hex() {
        let h = fingerprint("x");
        assert_eq!(h.to_string(), h.to_hex());
    }
}
