//! CRC-32C (Castagnoli) checksum used for frame integrity.
//!
//! Every frame carries a CRC-32C computed over its checksummed region (the
//! metadata length field, the metadata bytes and the payload).  Producers and
//! consumers written in other languages compute the same value, so the seed
//! (all ones), the reflected polynomial and the final complement are part of
//! the wire contract and must never change.
//!
//! # How the table-driven CRC works (for beginners)
//!
//! A CRC is the remainder of a polynomial division over GF(2).  Doing that
//! division bit by bit is slow, so we precompute what one input byte does to
//! the running remainder (`TABLES[0]`), and what that byte does when it is
//! followed by `k` more bytes (`TABLES[k]`).  With eight tables we can fold a
//! whole 8-byte word into the remainder with eight lookups ("slicing-by-8").
//! Any 0–7 trailing bytes use the single-byte step.  Because CRC is linear
//! over concatenation, both steps produce exactly the same result as the
//! bit-by-bit definition.

/// CRC-32C polynomial `0x1EDC6F41` in reflected (LSB-first) form.
pub const CASTAGNOLI_POLY: u32 = 0x82F6_3B78;

/// Initial value of the running CRC.
const SEED: u32 = !0;

/// Slicing-by-8 lookup tables, generated at compile time.
static TABLES: [[u32; 256]; 8] = make_tables();

const fn make_tables() -> [[u32; 256]; 8] {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CASTAGNOLI_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut k = 1;
    while k < 8 {
        let mut i = 0;
        while i < 256 {
            let prev = tables[k - 1][i];
            tables[k][i] = (prev >> 8) ^ tables[0][(prev & 0xFF) as usize];
            i += 1;
        }
        k += 1;
    }

    tables
}

/// Folds one byte into a running (un-complemented) CRC value.
#[inline]
pub fn crc32c_u8(crc: u32, byte: u8) -> u32 {
    TABLES[0][((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// Folds one 8-byte word into a running (un-complemented) CRC value.
///
/// `word` must hold the eight input bytes in little-endian order, i.e. the
/// value of `u64::from_le_bytes(chunk)`.
#[inline]
pub fn crc32c_u64(crc: u32, word: u64) -> u32 {
    let x = word ^ crc as u64;
    TABLES[7][(x & 0xFF) as usize]
        ^ TABLES[6][((x >> 8) & 0xFF) as usize]
        ^ TABLES[5][((x >> 16) & 0xFF) as usize]
        ^ TABLES[4][((x >> 24) & 0xFF) as usize]
        ^ TABLES[3][((x >> 32) & 0xFF) as usize]
        ^ TABLES[2][((x >> 40) & 0xFF) as usize]
        ^ TABLES[1][((x >> 48) & 0xFF) as usize]
        ^ TABLES[0][(x >> 56) as usize]
}

fn update(mut crc: u32, bytes: &[u8]) -> u32 {
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        // chunks_exact guarantees 8 bytes
        let word = u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        crc = crc32c_u64(crc, word);
    }
    for &byte in chunks.remainder() {
        crc = crc32c_u8(crc, byte);
    }
    crc
}

/// Computes the CRC-32C of `bytes` in one call.
///
/// # Examples
///
/// ```rust
/// use pulsar_wire::checksum::crc32c;
///
/// assert_eq!(crc32c(b""), 0);
/// assert_eq!(crc32c(b"123456789"), 0xE306_9283);
/// ```
pub fn crc32c(bytes: &[u8]) -> u32 {
    !update(SEED, bytes)
}

/// Incremental CRC-32C for data that arrives in several pieces.
///
/// Feeding a buffer through any sequence of [`update`](Crc32c::update) calls
/// yields the same value as a single [`crc32c`] call over the concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32c {
    state: u32,
}

impl Crc32c {
    /// Creates a hasher in its initial (empty input) state.
    pub fn new() -> Self {
        Self { state: SEED }
    }

    /// Folds `bytes` into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        self.state = update(self.state, bytes);
    }

    /// Returns the checksum of everything fed so far.
    ///
    /// The hasher is not consumed, so more data can still be appended.
    pub fn finalize(&self) -> u32 {
        !self.state
    }
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::new()
    }
}
