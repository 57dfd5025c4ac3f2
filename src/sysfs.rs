//! GPIO lines through the Linux sysfs interface, on top of
//! `linux-embedded-hal`'s [`SysfsPin`].
//!
//! A [`SysfsLine`] exports its line and sets the direction when opened and
//! unexports the line when dropped, so the line is released on every exit
//! path, including a driver that fails to come up.

use std::io;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use linux_embedded_hal::sysfs_gpio::{self, Direction};
use linux_embedded_hal::{Delay, SysfsPin, SysfsPinError};
use log::{debug, warn};

use crate::hx711::{Config, Gain, Hx711};

/// An exported sysfs GPIO line.
pub struct SysfsLine {
    pin: SysfsPin,
}

impl SysfsLine {
    pub fn input(line: u64) -> Result<Self, SysfsPinError> {
        Self::open(line, Direction::In)
    }

    /// Output line, initially driven low.
    pub fn output(line: u64) -> Result<Self, SysfsPinError> {
        Self::open(line, Direction::Low)
    }

    fn open(line: u64, direction: Direction) -> Result<Self, SysfsPinError> {
        let pin = SysfsPin::new(line);
        pin.export().or_else(already_exported)?;
        // from here on, dropping `line` unexports
        let line = SysfsLine { pin };
        line.pin.set_direction(direction)?;
        debug!("gpio{} exported as {direction:?}", line.number());
        Ok(line)
    }

    pub fn number(&self) -> u64 {
        self.pin.get_pin_num()
    }
}

/// Exporting a line that is already exported fails with `EBUSY`.
fn already_exported(err: sysfs_gpio::Error) -> Result<(), sysfs_gpio::Error> {
    match err {
        sysfs_gpio::Error::Io(ref e) if e.kind() == io::ErrorKind::ResourceBusy => Ok(()),
        err => Err(err),
    }
}

impl Drop for SysfsLine {
    fn drop(&mut self) {
        if let Err(e) = self.pin.unexport() {
            warn!("failed to unexport gpio{}: {e}", self.number());
        }
    }
}

impl ErrorType for SysfsLine {
    type Error = SysfsPinError;
}

impl InputPin for SysfsLine {
    fn is_high(&mut self) -> Result<bool, SysfsPinError> {
        self.pin.is_high()
    }

    fn is_low(&mut self) -> Result<bool, SysfsPinError> {
        self.pin.is_low()
    }
}

impl OutputPin for SysfsLine {
    fn set_low(&mut self) -> Result<(), SysfsPinError> {
        self.pin.set_low()
    }

    fn set_high(&mut self) -> Result<(), SysfsPinError> {
        self.pin.set_high()
    }
}

pub type SysfsHx711 = Hx711<SysfsLine, SysfsLine, Delay>;

impl Hx711<SysfsLine, SysfsLine, Delay> {
    /// Open an HX711 wired to two sysfs GPIO lines.
    ///
    /// Sysfs writes are slow enough on their own, so no extra delay is added
    /// between clock edges.
    pub fn open_sysfs(dout: u64, sck: u64, gain: Gain) -> Result<Self, crate::Error<SysfsPinError>> {
        let dt_pin = SysfsLine::input(dout).map_err(crate::Error::Io)?;
        let sck_pin = SysfsLine::output(sck).map_err(crate::Error::Io)?;
        let config = Config::default().with_gain(gain).with_clock_delay_us(0);
        Self::with_config(dt_pin, sck_pin, Delay, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_export_counts_as_exported() {
        let busy = sysfs_gpio::Error::Io(io::Error::from(io::ErrorKind::ResourceBusy));
        assert!(already_exported(busy).is_ok());
    }

    #[test]
    fn other_export_errors_propagate() {
        let denied = sysfs_gpio::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            already_exported(denied),
            Err(sysfs_gpio::Error::Io(e)) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        let unsupported = sysfs_gpio::Error::Unsupported("gpio".into());
        assert!(already_exported(unsupported).is_err());
    }

    #[test]
    fn missing_line_fails_to_open() {
        // no gpio controller has a line this high
        assert!(SysfsLine::input(999_999).is_err());
        assert!(matches!(
            SysfsHx711::open_sysfs(999_998, 999_999, Gain::A128),
            Err(crate::Error::Io(_))
        ));
    }
}
