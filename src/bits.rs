//! Bit-field helpers shared by the runtime and the assembler.

/// Bits `lo..hi` of `word`, shifted down to bit 0.
#[inline]
pub fn slice(word: u16, lo: u32, hi: u32) -> u16 {
    debug_assert!(lo < hi && hi <= 16);
    let width = hi - lo;
    let mask = if width == 16 { u16::MAX } else { (1u16 << width) - 1 };
    (word >> lo) & mask
}

#[inline]
pub fn bit(word: u16, i: u32) -> bool {
    word & (1 << i) != 0
}

/// Sign-extend the lowest `bits` bits of `val` to a full word.
#[inline]
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}

/// Whether `word`, read as two's complement, fits a signed field of `bits` bits.
///
/// A field of width `n` holds `-2^(n-1)..=2^(n-1)-1`; anything else would be truncated
/// when sliced into the instruction.
#[inline]
pub fn check_number(word: u16, bits: u32) -> bool {
    debug_assert!(bits > 0 && bits <= 16);
    let value = word as i16 as i32;
    let bound = 1i32 << (bits - 1);
    (-bound..bound).contains(&value)
}

/// Whether `word` fits an unsigned field of `bits` bits.
#[inline]
pub fn check_unsigned(word: u16, bits: u32) -> bool {
    debug_assert!(bits > 0 && bits <= 16);
    bits == 16 || word < (1 << bits)
}

/// Format a word as 16 `0`/`1` characters, most significant bit first.
pub fn word_to_bin(word: u16) -> String {
    format!("{word:016b}")
}
