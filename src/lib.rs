//! Driver for the HX711 load cell amplifier, built on the `embedded-hal`
//! digital traits, with a thread-safe tare/calibration layer on top.
//!
//! [`hx711::Hx711`] bit-bangs the two-wire protocol and averages samples under
//! an internal lock, [`sensor::LoadCellSensor`] turns raw counts into physical
//! units and [`sysfs::SysfsLine`] provides GPIO lines on Linux.

pub mod error;
pub mod hx711;
pub mod sensor;
pub mod sysfs;

pub use error::Error;

/// Something that can produce an averaged raw ADC count.
///
/// Implemented by [`hx711::Hx711`]; the load cell layer only depends on this.
pub trait RawSource {
    /// Error type of the underlying GPIO lines.
    type LineError;

    /// Average `samples` consecutive conversions.
    fn read_average(&self, samples: usize) -> Result<i32, Error<Self::LineError>>;
}

pub trait LoadCell {
    type Error;

    /// Read the averaged raw count, without offset or scale applied.
    fn read_raw(&self, samples: usize) -> Result<i32, Self::Error>;

    /// Read the value after removing the offset and applying the scale.
    fn read_weight(&self, samples: usize) -> Result<f64, Self::Error>;

    /// Zero the load cell offset by averaging `samples` readings.
    fn tare(&self, samples: usize) -> Result<(), Self::Error>;

    /// Derive the scale from a known weight currently on the load cell.
    /// Use this to ensure that 1kg ~ 1kg
    fn calibrate(&self, known_weight: f64, samples: usize) -> Result<(), Self::Error>;

    /// Get the load cell offset.
    fn offset(&self) -> i32;

    /// Set the scale directly, e.g. from a previous calibration.
    fn set_scale(&self, scale: f64) -> Result<(), Self::Error>;

    /// Get the scale.
    fn scale(&self) -> f64;
}
