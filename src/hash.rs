use std::fmt::Debug;

/// 32 byte BLAKE3 digest identifying a target or a whole collection.
///
/// Handle implementations derive it from stable identity data (for local
/// files, the path), never from the backing resource itself, so it stays
/// valid whether or not the resource currently exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    /// Digest an arbitrary buffer.
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = vec![0u8; 64];

        for (i, &byte) in self.0.iter().enumerate() {
            acc[i * 2] = HEX[(byte >> 4) as usize];
            acc[i * 2 + 1] = HEX[(byte & 0xF) as usize];
        }

        String::from_utf8(acc).unwrap()
    }
}

impl Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(Hash32::hash("out/a.json"), Hash32::hash("out/a.json"));
        assert_ne!(Hash32::hash("out/a.json"), Hash32::hash("out/b.json"));
    }

    #[test]
    fn test_to_hex() {
        let hex = Hash32::default().to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.bytes().all(|b| b == b'0'));

        assert_eq!(Hash32::hash("x").to_hex().len(), 64);
    }
}
