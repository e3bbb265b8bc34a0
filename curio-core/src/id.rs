use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;

// CurioAddress uniquely identifies a record (asset or collection) or an
// external identity (wallet, delegate, oracle account). It is a 32 byte
// identifier resembling a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurioAddress([u8; 32]);

impl fmt::Display for CurioAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format as a hex string with a prefix of the first 6 bytes
        let prefix = hex::encode(&self.0[0..6]);
        write!(f, "cur:{}", prefix)
    }
}

impl Ord for CurioAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for CurioAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for CurioAddress {
    fn default() -> Self {
        CurioAddress([0; 32])
    }
}

impl Deref for CurioAddress {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl CurioAddress {
    pub fn new(bytes: [u8; 32]) -> Self {
        CurioAddress(bytes)
    }

    /// Get a reference to the internal bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn hash_seeds(seeds: &[&[u8]], bump: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // Domain separator
        hasher.update(b"CURIO_Record");

        for seed in seeds {
            hasher.update(seed);
        }

        hasher.update([bump]);

        hasher.finalize().into()
    }

    /// Verify that a 32-byte array is not a valid point on the ed25519 curve
    ///
    /// Derived addresses must be off-curve so they can never collide with a
    /// signing keypair.
    pub fn is_off_curve(bytes: &[u8; 32]) -> bool {
        let Ok(compressed_edwards_y) = CompressedEdwardsY::from_slice(bytes.as_ref()) else {
            return true;
        };
        compressed_edwards_y.decompress().is_none()
    }

    /// Try to derive an address for the given seeds
    pub fn try_derive(seeds: &[&[u8]]) -> Option<(CurioAddress, u8)> {
        for bump in 0..255 {
            let bytes = Self::hash_seeds(seeds, bump);
            if Self::is_off_curve(&bytes) {
                return Some((CurioAddress(bytes), bump));
            }
        }
        None
    }

    /// Derive an address for the given seeds
    pub fn derive(seeds: &[&[u8]]) -> (CurioAddress, u8) {
        Self::try_derive(seeds).expect("failed to derive an off-curve address")
    }

    /// Generate a unique CurioAddress for testing purposes - exposed for
    /// tests in other crates
    pub fn unique_address_for_tests() -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("Time went backwards")
            .as_nanos()
            .to_le_bytes();

        let counter = TEST_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let (addr, _) = Self::derive(&[&timestamp, &counter.to_le_bytes()]);
        addr
    }
}

static TEST_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let (a, bump_a) = CurioAddress::derive(&[b"collection", b"My NFT Collection"]);
        let (b, bump_b) = CurioAddress::derive(&[b"collection", b"My NFT Collection"]);
        assert_eq!(a, b);
        assert_eq!(bump_a, bump_b);
    }

    #[test]
    fn test_derive_differs_by_seed() {
        let (a, _) = CurioAddress::derive(&[b"asset", b"one"]);
        let (b, _) = CurioAddress::derive(&[b"asset", b"two"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derived_addresses_are_off_curve() {
        for seed in [&b"alpha"[..], &b"beta"[..], &b"gamma"[..]] {
            let (addr, _) = CurioAddress::derive(&[seed]);
            assert!(CurioAddress::is_off_curve(&addr));
        }
    }

    #[test]
    fn test_display_prefix() {
        let addr = CurioAddress::new([0xab; 32]);
        assert_eq!(format!("{}", addr), "cur:abababababab");
    }

    #[test]
    fn test_unique_test_addresses_do_not_collide() {
        let a = CurioAddress::unique_address_for_tests();
        let b = CurioAddress::unique_address_for_tests();
        assert_ne!(a, b);
    }
}
