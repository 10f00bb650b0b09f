use std::borrow::Cow;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::bytes::Regex;

use crate::crc::checksum;
use crate::error::{Result, TelegramError};

/// Header marker: `/`, three identification characters, protocol digit `5`.
static START_OF_TELEGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/[^\r\n]{3}5").expect("start pattern is valid"));

/// Trailer: `!`, the checksum field, CR LF. The field width is checked
/// separately so a short or long field is reported as malformed.
static END_OF_TELEGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)!([0-9A-Za-z]*)\r\n").expect("end pattern is valid"));

/// Number of hex digits in the trailer checksum.
pub const CHECKSUM_DIGITS: usize = 4;

/// Position of one telegram inside a raw buffer.
///
/// ```text
/// noise /ISk5\2MT382-1000\r\n ... \r\n ! E86D \r\n noise
///       ^start                       ^bang      ^end
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of the `/` that starts the header.
    pub start: usize,
    /// Offset of the `!` that starts the trailer.
    pub bang: usize,
    /// Offset just past the trailer's CR LF.
    pub end: usize,
}

impl Span {
    /// Bytes covered by the CRC: `start..=bang`.
    pub fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[self.start..=self.bang]
    }

    /// The checksum field between `!` and CR LF.
    pub fn checksum_field<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[self.bang + 1..self.end - 2]
    }

    /// Length of the complete telegram.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Never true for a located telegram; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Find the first header marker and the first trailer after it.
///
/// Does not look at the checksum.
pub fn locate(raw: &[u8]) -> Result<Span> {
    let start = start_of_telegram(raw).ok_or(TelegramError::MissingStartMarker)?;
    let (bang, end) = end_of_telegram(raw, start).ok_or(TelegramError::MissingEndMarker)?;
    Ok(Span { start, bang, end })
}

/// Offset of the first header marker.
pub(crate) fn start_of_telegram(raw: &[u8]) -> Option<usize> {
    START_OF_TELEGRAM.find(raw).map(|m| m.start())
}

/// Offsets of the first trailer at or after `from`: (`!`, past CR LF).
pub(crate) fn end_of_telegram(raw: &[u8], from: usize) -> Option<(usize, usize)> {
    END_OF_TELEGRAM
        .find(&raw[from..])
        .map(|m| (from + m.start(), from + m.end()))
}

/// Check the trailer of a located telegram and return its checksum.
pub(crate) fn verify(raw: &[u8], span: &Span) -> Result<u16> {
    let declared = parse_checksum(span.checksum_field(raw))?;
    let computed = checksum(span.payload(raw));
    if computed != declared {
        return Err(TelegramError::ChecksumMismatch { declared, computed });
    }
    Ok(declared)
}

fn parse_checksum(field: &[u8]) -> Result<u16> {
    let malformed = || TelegramError::MalformedChecksum {
        field: String::from_utf8_lossy(field).into_owned(),
    };

    if field.len() != CHECKSUM_DIGITS || !field.iter().all(u8::is_ascii_hexdigit) {
        return Err(malformed());
    }
    let digits = std::str::from_utf8(field).map_err(|_| malformed())?;
    u16::from_str_radix(digits, 16).map_err(|_| malformed())
}

/// Locate and verify the first complete telegram in `raw`.
///
/// Bytes before the header and after the trailer are ignored. On success
/// the returned telegram holds exactly `/...!HHHH\r\n`.
pub fn validate(raw: &[u8]) -> Result<Telegram> {
    let span = locate(raw)?;
    let checksum = verify(raw, &span)?;
    Ok(Telegram {
        bytes: Bytes::copy_from_slice(&raw[span.start..span.end]),
        checksum,
    })
}

/// A complete, checksum-verified P1 telegram.
///
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Telegram {
    bytes: Bytes,
    checksum: u16,
}

impl Telegram {
    /// Wrap bytes that [`verify`] already accepted.
    pub(crate) fn from_verified(bytes: Bytes, checksum: u16) -> Self {
        Self { bytes, checksum }
    }

    /// The raw telegram, header through trailer CR LF.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the telegram and return its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a validated telegram.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The CRC declared in (and verified against) the trailer.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// The meter identification: the header line without the leading `/`.
    pub fn identification(&self) -> Cow<'_, str> {
        let header = self.bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let header = header.strip_suffix(b"\r").unwrap_or(header);
        String::from_utf8_lossy(&header[1..])
    }

    /// Non-empty lines between the header and the trailer, without CR LF.
    pub fn data_lines(&self) -> impl Iterator<Item = &[u8]> {
        let body = &self.bytes[..self.bytes.len() - (CHECKSUM_DIGITS + 3)];
        body.split(|b| *b == b'\n')
            .skip(1)
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
    }

    /// Lossy UTF-8 view of the whole telegram.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl AsRef<[u8]> for Telegram {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build `/{ident}\r\n{body}!{crc}\r\n` with a correct checksum.
    fn frame(ident: &str, body: &str) -> String {
        let payload = format!("/{ident}\r\n{body}!");
        format!("{payload}{:04X}\r\n", checksum(payload.as_bytes()))
    }

    #[test]
    fn validates_example_with_surrounding_noise() {
        let raw = b"noise/ABC5\r\ndata\r\n!E86D\r\nmore-noise";
        let telegram = validate(raw).unwrap();
        assert_eq!(telegram.as_bytes(), b"/ABC5\r\ndata\r\n!E86D\r\n");
        assert_eq!(telegram.checksum(), 0xE86D);
    }

    #[test]
    fn wrong_declared_checksum_is_mismatch() {
        let raw = b"noise/ABC5\r\ndata\r\n!E86E\r\nmore-noise";
        let err = validate(raw).unwrap_err();
        assert!(matches!(
            err,
            TelegramError::ChecksumMismatch {
                declared: 0xE86E,
                computed: 0xE86D
            }
        ));
    }

    #[test]
    fn lowercase_hex_is_accepted() {
        let telegram = validate(b"/ABC5\r\ndata\r\n!e86d\r\n").unwrap();
        assert_eq!(telegram.checksum(), 0xE86D);
    }

    #[test]
    fn missing_header_is_reported() {
        let err = validate(b"ABC5\r\ndata\r\n!E86D\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MissingStartMarker));
    }

    #[test]
    fn header_requires_protocol_digit_five() {
        let err = validate(b"/ABC4\r\ndata\r\n!E86D\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MissingStartMarker));
    }

    #[test]
    fn header_characters_cannot_span_lines() {
        let err = validate(b"/A\r\n5\r\ndata\r\n!0000\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MissingStartMarker));
    }

    #[test]
    fn missing_trailer_is_reported() {
        let err = validate(b"/ABC5\r\ndata\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MissingEndMarker));
    }

    #[test]
    fn trailer_without_crlf_is_missing() {
        let err = validate(b"/ABC5\r\ndata\r\n!E86D").unwrap_err();
        assert!(matches!(err, TelegramError::MissingEndMarker));
    }

    #[test]
    fn trailer_before_header_is_ignored() {
        let err = validate(b"!E86D\r\n/ABC5\r\ndata\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MissingEndMarker));
    }

    #[test]
    fn short_checksum_is_malformed() {
        let err = validate(b"/ABC5\r\ndata\r\n!E86\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MalformedChecksum { ref field } if field == "E86"));
    }

    #[test]
    fn long_checksum_is_malformed() {
        let err = validate(b"/ABC5\r\ndata\r\n!E86D0\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MalformedChecksum { .. }));
    }

    #[test]
    fn non_hex_checksum_is_malformed() {
        let err = validate(b"/ABC5\r\ndata\r\n!E8GD\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MalformedChecksum { .. }));
    }

    #[test]
    fn empty_checksum_is_malformed() {
        let err = validate(b"/ABC5\r\ndata\r\n!\r\n").unwrap_err();
        assert!(matches!(err, TelegramError::MalformedChecksum { .. }));
    }

    #[test]
    fn any_flipped_payload_byte_is_detected() {
        let good = frame("ISk5\\2MT382-1000", "\r\n1-0:1.8.1(123456.789*kWh)\r\n");
        let payload_len = good.find('!').unwrap() + 1;

        for index in 1..payload_len - 1 {
            let mut corrupted = good.clone().into_bytes();
            corrupted[index] ^= 0x01;
            // Flipping a header or trailer byte can destroy the markers themselves.
            match validate(&corrupted) {
                Err(TelegramError::ChecksumMismatch { .. })
                | Err(TelegramError::MissingStartMarker)
                | Err(TelegramError::MissingEndMarker) => {}
                other => panic!("flip at {index} not detected: {other:?}"),
            }
        }
    }

    #[test]
    fn flipped_data_byte_is_checksum_mismatch() {
        let good = frame("KFM5KAIFA-METER", "\r\n1-0:1.7.0(00.412*kW)\r\n");
        let index = good.find("00.412").unwrap();
        let mut corrupted = good.into_bytes();
        corrupted[index] = b'9';
        assert!(matches!(
            validate(&corrupted),
            Err(TelegramError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn first_of_two_telegrams_is_returned() {
        let first = frame("AAA5", "first\r\n");
        let second = frame("BBB5", "second\r\n");
        let raw = format!("{first}{second}");
        let telegram = validate(raw.as_bytes()).unwrap();
        assert_eq!(telegram.as_bytes(), first.as_bytes());
    }

    #[test]
    fn locate_reports_marker_offsets() {
        let raw = b"xx/ABC5\r\ndata\r\n!E86D\r\nyy";
        let span = locate(raw).unwrap();
        assert_eq!(span.start, 2);
        assert_eq!(raw[span.bang], b'!');
        assert_eq!(span.end, raw.len() - 2);
        assert_eq!(span.payload(raw), b"/ABC5\r\ndata\r\n!");
        assert_eq!(span.checksum_field(raw), b"E86D");
        assert_eq!(span.len(), 20);
    }

    #[test]
    fn identification_and_data_lines() {
        let raw = frame(
            "ISk5\\2MT382-1000",
            "\r\n1-3:0.2.8(50)\r\n1-0:1.7.0(01.193*kW)\r\n",
        );
        let telegram = validate(raw.as_bytes()).unwrap();
        assert_eq!(telegram.identification(), "ISk5\\2MT382-1000");

        let lines: Vec<&[u8]> = telegram.data_lines().collect();
        assert_eq!(
            lines,
            vec![b"1-3:0.2.8(50)".as_ref(), b"1-0:1.7.0(01.193*kW)".as_ref()]
        );
    }

    #[test]
    fn clones_share_content() {
        let telegram = validate(b"/ABC5\r\ndata\r\n!E86D\r\n").unwrap();
        let copy = telegram.clone();
        assert_eq!(telegram, copy);
        assert_eq!(copy.len(), telegram.as_bytes().len());
        assert!(!copy.is_empty());
    }
}
