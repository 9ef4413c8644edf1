use glam::Vec3;
use sha2::{Digest, Sha256};

/// First eight bytes of the SHA-256 digest, little-endian. Identical on
/// every platform and toolchain.
pub fn stable_hash(bytes: impl AsRef<[u8]>) -> u64 {
    let digest = Sha256::digest(bytes.as_ref());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

pub fn stable_triple(bytes: impl AsRef<[u8]>) -> Vec3 {
    let hash = stable_hash(bytes);

    let x = ((hash & 0x1f_ffff) as f64 / 0x1f_ffff as f64) as f32;
    let y = (((hash >> 21) & 0x1f_ffff) as f64 / 0x1f_ffff as f64) as f32;
    let z = (((hash >> 42) & 0x1f_ffff) as f64 / 0x1f_ffff as f64) as f32;
    Vec3::new(x, y, z)
}

/// Deterministic point in `[0, extent)^3` for scattering graph vertices
/// before the force layout starts.
pub fn scatter_position(bytes: impl AsRef<[u8]>, extent: f32) -> Vec3 {
    (stable_triple(bytes) * extent).min(Vec3::splat(extent * 0.999_9))
}
