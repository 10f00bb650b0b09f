use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SerialError};

/// A line speed the serial driver accepts.
///
/// DSMR 2.2 meters transmit at 9600 baud, DSMR 4 and 5 at 115200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaudRate(u32);

impl BaudRate {
    /// Speeds accepted by [`BaudRate::new`].
    pub const SUPPORTED: [u32; 18] = [
        0, 50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400,
        57600, 115200,
    ];

    /// DSMR 2.2 default.
    pub const B9600: BaudRate = BaudRate(9600);
    /// DSMR 4 and 5.
    pub const B115200: BaudRate = BaudRate(115200);

    /// Validate a numeric speed.
    pub fn new(bits_per_second: u32) -> Result<Self> {
        if Self::SUPPORTED.contains(&bits_per_second) {
            Ok(Self(bits_per_second))
        } else {
            Err(SerialError::UnsupportedBaudRate(bits_per_second.to_string()))
        }
    }

    /// The speed in bits per second.
    pub fn bits_per_second(self) -> u32 {
        self.0
    }

    /// The termios `speed_t` constant for this rate.
    #[cfg(unix)]
    pub fn as_speed(self) -> libc::speed_t {
        match self.0 {
            0 => libc::B0,
            50 => libc::B50,
            75 => libc::B75,
            110 => libc::B110,
            134 => libc::B134,
            150 => libc::B150,
            200 => libc::B200,
            300 => libc::B300,
            600 => libc::B600,
            1200 => libc::B1200,
            1800 => libc::B1800,
            2400 => libc::B2400,
            4800 => libc::B4800,
            9600 => libc::B9600,
            19200 => libc::B19200,
            38400 => libc::B38400,
            57600 => libc::B57600,
            // `new` admits nothing else.
            _ => libc::B115200,
        }
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::B9600
    }
}

impl FromStr for BaudRate {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| SerialError::UnsupportedBaudRate(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data bits, parity and stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CharacterFormat {
    /// 8 data bits, no parity, 1 stop bit (DSMR 4 and 5).
    #[default]
    EightNoneOne,
    /// 7 data bits, even parity, 1 stop bit (DSMR 2.2).
    SevenEvenOne,
}

impl FromStr for CharacterFormat {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "8N1" => Ok(Self::EightNoneOne),
            "7E1" => Ok(Self::SevenEvenOne),
            _ => Err(SerialError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for CharacterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EightNoneOne => f.write_str("8N1"),
            Self::SevenEvenOne => f.write_str("7E1"),
        }
    }
}

/// Everything needed to configure a P1 serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerialSettings {
    pub baud_rate: BaudRate,
    pub format: CharacterFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_speeds() {
        assert_eq!("9600".parse::<BaudRate>().unwrap(), BaudRate::B9600);
        assert_eq!(" 115200 ".parse::<BaudRate>().unwrap(), BaudRate::B115200);
        assert_eq!("0".parse::<BaudRate>().unwrap().bits_per_second(), 0);
    }

    #[test]
    fn rejects_unsupported_speed() {
        let err = "12345".parse::<BaudRate>().unwrap_err();
        assert!(matches!(err, SerialError::UnsupportedBaudRate(ref s) if s == "12345"));
    }

    #[test]
    fn rejects_non_numeric_speed() {
        assert!(matches!(
            "fast".parse::<BaudRate>(),
            Err(SerialError::UnsupportedBaudRate(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn maps_to_termios_constants() {
        assert_eq!(BaudRate::B9600.as_speed(), libc::B9600);
        assert_eq!(BaudRate::B115200.as_speed(), libc::B115200);
        assert_eq!(BaudRate::new(38400).unwrap().as_speed(), libc::B38400);
    }

    #[test]
    fn character_format_parsing() {
        assert_eq!(
            "7e1".parse::<CharacterFormat>().unwrap(),
            CharacterFormat::SevenEvenOne
        );
        assert_eq!(
            "8N1".parse::<CharacterFormat>().unwrap(),
            CharacterFormat::EightNoneOne
        );
        assert!(matches!(
            "8E2".parse::<CharacterFormat>(),
            Err(SerialError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn default_settings_match_dsmr_2_2_speed() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, BaudRate::B9600);
        assert_eq!(settings.format, CharacterFormat::EightNoneOne);
    }
}
