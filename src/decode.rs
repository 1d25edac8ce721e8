//! Register-to-value decoding.
//!
//! Holding registers arrive as big-endian 16-bit words. The meters store every
//! logical 32-bit float with its two words swapped: the low word is
//! transmitted before the high word. Getting that swap wrong produces
//! plausible-looking but wrong measurements, so the reconstruction lives here
//! as explicit, separately tested routines. Clock, uptime and the 64-bit
//! accumulator registers are plain big-endian and bypass the swap.

/// Reconstructs a 32-bit value from the four wire bytes of a word-swapped pair
/// of registers.
///
/// Arguments are the bytes in wire order: high and low byte of the first
/// (low) word, then high and low byte of the second (high) word.
pub fn words_to_u32(lo_hi: u8, lo_lo: u8, hi_hi: u8, hi_lo: u8) -> u32 {
    u32::from_be_bytes([hi_hi, hi_lo, lo_hi, lo_lo])
}

/// Reinterprets the 32 bits as an IEEE-754 single-precision float.
pub fn bits_to_f32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Decodes a word-swapped float straight from four wire bytes.
pub fn swapped_f32(bytes: &[u8]) -> f32 {
    bits_to_f32(words_to_u32(bytes[0], bytes[1], bytes[2], bytes[3]))
}

/// Extracts the manufacture date packed into one 16-bit word.
///
/// Layout, LSB first: day 5 bits, month 4 bits, year 7 bits.
pub fn packed_date(word: u16) -> (u16, u16, u16) {
    let day = word & 0x1F;
    let month = (word >> 5) & 0x0F;
    let year = word >> 9;
    (day, month, year)
}

/// Scales a raw integer accumulator by a fixed decimal divisor.
pub fn scaled_fixed_point(raw: u64, divisor: f64) -> f32 {
    (raw as f64 / divisor) as f32
}

/// Plain big-endian word from two payload bytes.
pub fn to_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Plain big-endian 32-bit value from four payload bytes.
pub fn to_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Plain big-endian 64-bit value from eight payload bytes.
pub fn to_u64_be(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}
