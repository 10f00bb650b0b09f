//! CRC-16/ARC as used in the P1 telegram trailer.
//!
//! Polynomial 0x8005, initial value 0, input and output reflected, no final
//! XOR. The checksum covers everything from `/` through `!`.

use crc::{Crc, CRC_16_ARC};

const P1_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Compute the CRC-16/ARC of `payload`.
pub fn checksum(payload: &[u8]) -> u16 {
    P1_CRC.checksum(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_check_value() {
        assert_eq!(checksum(b"123456789"), 0xBB3D);
    }

    #[test]
    fn empty_payload_is_zero() {
        assert_eq!(checksum(b""), 0x0000);
    }

    #[test]
    fn covers_header_through_bang() {
        assert_eq!(checksum(b"/ABC5\r\ndata\r\n!"), 0xE86D);
    }
}
