//! # CRC8-DVB-S2 Implementation
//!
//! Checksum used by MSP v2 frames. Covers flags, function id, length and
//! payload; the preamble is excluded.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00
//! **Check** (`"123456789"`): 0xBC

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Lookup table, one entry per possible accumulator value
const CRC8_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        table[i] = shift_byte(i as u8);
        i += 1;
    }

    table
}

/// Eight shift/xor rounds over a single accumulator value
const fn shift_byte(mut crc: u8) -> u8 {
    let mut round = 0;

    while round < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
        round += 1;
    }

    crc
}

/// Calculate CRC8-DVB-S2 checksum
///
/// Accepts any byte slice, including an empty one (which yields 0x00).
///
/// # Examples
///
/// ```
/// use msp_autofly::msp::crc::crc8_dvb_s2;
///
/// // flags + MSP_STATUS + zero length
/// assert_eq!(crc8_dvb_s2(&[0x00, 0x65, 0x00, 0x00, 0x00]), 0xCA);
/// ```
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

#[cfg(test)]
fn crc8_dvb_s2_bitwise(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;
        crc = shift_byte(crc);
    }

    crc
}
