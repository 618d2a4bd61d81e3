/// Weak per-chunk checksum in the Adler-32 family.
///
/// `s1` accumulates the byte sum and `s2` the sum of running prefix sums;
/// both are truncated to 16 bits after every update. The checksum is cheap
/// enough to compute for every chunk of a large file and rejects almost all
/// mismatching chunk pairs before the strong digest is consulted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates a checksum with zeroed state.
    #[must_use]
    pub const fn new() -> Self {
        Self { s1: 0, s2: 0, len: 0 }
    }

    /// Computes the checksum of `chunk` in one call.
    #[must_use]
    pub fn of(chunk: &[u8]) -> Self {
        let mut checksum = Self::new();
        checksum.update(chunk);
        checksum
    }

    /// Clears the state back to its initial value.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of bytes that contributed to the current state.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bytes have been observed yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Folds an additional slice of bytes into the state.
    pub fn update(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        let mut s1 = self.s1;
        let mut s2 = self.s2;

        let mut blocks = chunk.chunks_exact(4);
        for block in &mut blocks {
            s1 = s1.wrapping_add(u32::from(block[0]));
            s2 = s2.wrapping_add(s1);

            s1 = s1.wrapping_add(u32::from(block[1]));
            s2 = s2.wrapping_add(s1);

            s1 = s1.wrapping_add(u32::from(block[2]));
            s2 = s2.wrapping_add(s1);

            s1 = s1.wrapping_add(u32::from(block[3]));
            s2 = s2.wrapping_add(s1);
        }

        for &byte in blocks.remainder() {
            s1 = s1.wrapping_add(u32::from(byte));
            s2 = s2.wrapping_add(s1);
        }

        self.s1 = s1 & 0xffff;
        self.s2 = s2 & 0xffff;
        self.len = self.len.saturating_add(chunk.len());
    }

    /// Returns the checksum in the packed 32-bit representation.
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }

    /// Returns the current state as a structured digest.
    #[must_use]
    pub fn digest(&self) -> RollingDigest {
        RollingDigest {
            s1: self.s1 as u16,
            s2: self.s2 as u16,
            len: self.len,
        }
    }
}

/// Digest produced by [`RollingChecksum`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RollingDigest {
    s1: u16,
    s2: u16,
    len: usize,
}

impl RollingDigest {
    /// First checksum component (sum of bytes).
    #[must_use]
    pub const fn sum1(&self) -> u16 {
        self.s1
    }

    /// Second checksum component (sum of prefix sums).
    #[must_use]
    pub const fn sum2(&self) -> u16 {
        self.s2
    }

    /// Number of bytes that contributed to the digest.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the digest covers an empty range.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the checksum in the packed 32-bit representation.
    #[must_use]
    pub const fn value(&self) -> u32 {
        ((self.s2 as u32) << 16) | (self.s1 as u32)
    }
}
