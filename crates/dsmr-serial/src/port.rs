use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::baud::{CharacterFormat, SerialSettings};
use crate::error::{Result, SerialError};

/// An open serial device in raw mode.
///
/// Reads block until at least one byte is available.
pub struct SerialPort {
    file: File,
    path: PathBuf,
    settings: SerialSettings,
}

impl SerialPort {
    /// Open `path` read-only and apply `settings`.
    ///
    /// The device does not become the controlling terminal (`O_NOCTTY`) and
    /// input already queued in the driver is discarded.
    pub fn open(path: impl AsRef<Path>, settings: SerialSettings) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)
            .map_err(|e| SerialError::Open {
                path: path.clone(),
                source: e,
            })?;

        configure(&file, settings).map_err(|e| SerialError::Configure {
            path: path.clone(),
            source: e,
        })?;

        info!(
            ?path,
            baud_rate = %settings.baud_rate,
            format = %settings.format,
            "opened serial device"
        );

        Ok(Self {
            file,
            path,
            settings,
        })
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The line settings applied at open.
    pub fn settings(&self) -> SerialSettings {
        self.settings
    }

    /// Try to clone this port (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            settings: self.settings,
        })
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud_rate", &self.settings.baud_rate.bits_per_second())
            .field("format", &self.settings.format)
            .finish()
    }
}

fn check(rc: libc::c_int) -> std::io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn configure(file: &File, settings: SerialSettings) -> std::io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: termios is a plain C struct; an all-zero value is a valid
    // starting point that tcgetattr overwrites before any field is read.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by `file` and `tio` is a valid
    // writable termios for the duration of each call.
    unsafe {
        check(libc::tcgetattr(fd, &mut tio))?;
        libc::cfmakeraw(&mut tio);
    }

    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !libc::CSTOPB;
    match settings.format {
        CharacterFormat::EightNoneOne => {
            tio.c_cflag &= !(libc::CSIZE | libc::PARENB);
            tio.c_cflag |= libc::CS8;
        }
        CharacterFormat::SevenEvenOne => {
            tio.c_cflag &= !(libc::CSIZE | libc::PARODD);
            tio.c_cflag |= libc::CS7 | libc::PARENB;
        }
    }
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;

    let speed = settings.baud_rate.as_speed();

    // SAFETY: same descriptor and termios as above.
    unsafe {
        check(libc::cfsetispeed(&mut tio, speed))?;
        check(libc::cfsetospeed(&mut tio, speed))?;
        check(libc::tcsetattr(fd, libc::TCSANOW, &tio))?;
        check(libc::tcflush(fd, libc::TCIFLUSH))?;
    }

    debug!(fd, "applied raw termios settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baud::BaudRate;

    #[test]
    fn open_missing_device_fails() {
        let path = std::env::temp_dir().join(format!("dsmr-missing-tty-{}", std::process::id()));
        let result = SerialPort::open(&path, SerialSettings::default());
        assert!(matches!(
            result,
            Err(SerialError::Open { path: ref p, .. }) if p == &path
        ));
    }

    #[test]
    fn open_regular_file_fails_to_configure() {
        let dir = std::env::temp_dir().join(format!("dsmr-serial-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("not-a-tty");
        std::fs::write(&path, b"/ABC5\r\n").unwrap();

        let settings = SerialSettings {
            baud_rate: BaudRate::B115200,
            format: CharacterFormat::EightNoneOne,
        };
        let result = SerialPort::open(&path, settings);
        assert!(matches!(result, Err(SerialError::Configure { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn configure_error_mentions_path() {
        let err = SerialError::Configure {
            path: PathBuf::from("/dev/ttyUSB0"),
            source: std::io::Error::from_raw_os_error(libc::ENOTTY),
        };
        assert!(err.to_string().starts_with("failed to configure /dev/ttyUSB0"));
    }
}
