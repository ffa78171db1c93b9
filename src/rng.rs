//! Mersenne-Twister random number generation
//!
//! MT19937 with its raw state exposed for wire transfer: the master seeds
//! every slave with its own generator state so the pseudo-random stream
//! is preserved across checkpoints and process boundaries. The generator
//! implements [`rand_core::RngCore`] and [`rand_core::SeedableRng`], so
//! every `rand` / `rand_distr` combinator applies to it.

use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::{impls, RngCore, SeedableRng};

use crate::codec::wire::{WireRead, WireWrite};

/// Number of 32-bit state words
const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// MT19937 generator with transferable state
///
/// The state is the classic 625-word vector: 624 state words plus the
/// index of the next word to temper.
#[derive(Clone)]
pub struct MersenneTwister {
    mt: [u32; N],
    mti: usize,
}

impl std::fmt::Debug for MersenneTwister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MersenneTwister")
            .field("mti", &self.mti)
            .finish_non_exhaustive()
    }
}

impl MersenneTwister {
    /// Create a generator from a 32-bit seed
    pub fn new(seed: u32) -> Self {
        let mut mt = [0u32; N];
        mt[0] = seed;
        for i in 1..N {
            mt[i] = 1_812_433_253u32
                .wrapping_mul(mt[i - 1] ^ (mt[i - 1] >> 30))
                .wrapping_add(i as u32);
        }
        Self { mt, mti: N }
    }

    /// Create a generator seeded from the wall clock (`seed=time`)
    pub fn from_time() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::new(millis as u32)
    }

    fn twist(&mut self) {
        for i in 0..N {
            let y = (self.mt[i] & UPPER_MASK) | (self.mt[(i + 1) % N] & LOWER_MASK);
            let mut next = self.mt[(i + M) % N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.mt[i] = next;
        }
        self.mti = 0;
    }

    /// Draw the next tempered 32-bit word
    pub fn next_word(&mut self) -> u32 {
        if self.mti >= N {
            self.twist();
        }
        let mut y = self.mt[self.mti];
        self.mti += 1;
        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    /// Write the state: `i32` index, then the 624 state words as `i32`
    pub fn write_state<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_i32(self.mti as i32)?;
        for word in &self.mt {
            out.write_i32(*word as i32)?;
        }
        Ok(())
    }

    /// Restore the state written by [`write_state`](Self::write_state)
    ///
    /// After a restore the generator continues the exact output sequence
    /// of the generator whose state was written.
    pub fn read_state<R: Read>(&mut self, input: &mut R) -> io::Result<()> {
        let mti = input.read_i32()?;
        if !(0..=N as i32).contains(&mti) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Mersenne-Twister index {mti} out of range"),
            ));
        }
        self.mti = mti as usize;
        for word in &mut self.mt {
            *word = input.read_i32()? as u32;
        }
        Ok(())
    }
}

impl RngCore for MersenneTwister {
    fn next_u32(&mut self) -> u32 {
        self.next_word()
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for MersenneTwister {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state as u32)
    }
}
