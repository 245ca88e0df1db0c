//! CRC-32 as used by ZIP (and gzip, Ethernet, PNG).
//!
//! Reflected polynomial `0xEDB88320`, seeded with `0xFFFFFFFF` and
//! inverted on output. The lookup table is built at compile time, so it
//! can be shared by any number of concurrent archive builds.

/// Reflected form of the IEEE 802.3 polynomial.
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Precomputed table, one entry per byte value.
pub static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = i as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ POLYNOMIAL
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// Checksum `data` with the shared table.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_with_table(&CRC32_TABLE, data)
}

/// Checksum `data` with an explicit lookup table.
///
/// An empty buffer yields `0`.
pub fn crc32_with_table(table: &[u32; 256], data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = table[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}
