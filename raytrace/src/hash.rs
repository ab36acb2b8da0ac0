use std::fmt;
use std::hash::Hasher;

use glam::Vec3;

/// 64-bit FNV-1a over the little-endian bytes of everything written into it.
///
/// Unlike `DefaultHasher`, the output is guaranteed to be stable across
/// processes and compiler versions, which matters since it's used to name
/// files in the BVH cache.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    state: u64,
}

impl ContentHasher {
    pub const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new() -> Self {
        Self::with_seed(Self::OFFSET_BASIS)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write(&value.to_bits().to_le_bytes());
    }

    pub fn write_point(&mut self, point: Vec3) {
        self.write_f32(point.x);
        self.write_f32(point.y);
        self.write_f32(point.z);
    }

    /// Writes triangle's corners in the order they were given (corner, then
    /// axis).
    pub fn write_triangle(&mut self, positions: [Vec3; 3]) {
        for position in positions {
            self.write_point(position);
        }
    }

    pub fn hash(&self) -> ContentHash {
        ContentHash(self.state)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for ContentHasher {
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContentHash(u64);

impl ContentHash {
    pub fn new(hash: u64) -> Self {
        Self(hash)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
