use std::time::{SystemTime, UNIX_EPOCH};

/// The 32-bit variant of the Xorshift PRNG algorithm, kept in-tree so the test suite does
/// not need a `rand` dependency.
#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub struct Xorshift32(pub u32);
impl Xorshift32 {
    pub fn from_system_time() -> Self {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|e| e.duration());
        Self(dur.subsec_nanos())
    }
    /// Seeds off both the given ID and the clock, so that every test site gets a stream of
    /// its own and reruns don't repeat it.
    pub fn from_id(id: &str) -> Self {
        let mut hash = 2166136261_u32;
        for byte in id.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(16777619);
        }
        // The all-zeroes state is the one fixed point of the permutation.
        Self((hash ^ Self::from_system_time().0) | 1)
    }
    pub fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }
}
impl Iterator for Xorshift32 {
    type Item = u32;
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next())
    }
}
