//! Tare and calibration on top of a raw ADC source.

use core::cell::Cell;

use critical_section::Mutex;
use log::debug;

use crate::{Error, LoadCell, RawSource};

/// Offset and scale, always read and replaced together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Raw count at zero load.
    pub offset: i32,
    /// Physical units per count above the offset.
    pub scale: f64,
}

impl Calibration {
    pub fn weight(&self, raw: i32) -> f64 {
        (i64::from(raw) - i64::from(self.offset)) as f64 * self.scale
    }
}

/// A load cell read through a borrowed driver.
///
/// The driver has to outlive the sensor. Raw reads go through the driver's own
/// lock; the sensor only guards its [`Calibration`].
///
/// The calibration sits in a `critical_section::Mutex`. On hosted targets the
/// `std` implementation of `critical-section` is one process-wide lock, so all
/// sensors (and every other `critical_section::with` user) contend on it. It
/// is only held to copy the offset/scale pair in or out, never across a read.
pub struct LoadCellSensor<'d, A: ?Sized> {
    adc: &'d A,
    calibration: Mutex<Cell<Calibration>>,
}

impl<'d, A> LoadCellSensor<'d, A>
where
    A: RawSource + ?Sized,
{
    /// Bind to a ready driver with offset 0. Use a scale of `1.0` to get raw
    /// counts until calibrated.
    pub fn new(adc: &'d A, scale: f64) -> Result<Self, Error<A::LineError>> {
        if !scale.is_finite() {
            return Err(Error::InvalidArgument("scale must be finite"));
        }
        Ok(Self {
            adc,
            calibration: Mutex::new(Cell::new(Calibration { offset: 0, scale })),
        })
    }

    pub fn calibration(&self) -> Calibration {
        critical_section::with(|cs| self.calibration.borrow(cs).get())
    }

    /// Release the sensor. The driver stays usable.
    pub fn close(self) {}
}

impl<A> LoadCell for LoadCellSensor<'_, A>
where
    A: RawSource + ?Sized,
{
    type Error = Error<A::LineError>;

    fn read_raw(&self, samples: usize) -> Result<i32, Self::Error> {
        self.adc.read_average(samples)
    }

    fn read_weight(&self, samples: usize) -> Result<f64, Self::Error> {
        let raw = self.adc.read_average(samples)?;
        Ok(self.calibration().weight(raw))
    }

    fn tare(&self, samples: usize) -> Result<(), Self::Error> {
        let raw = self.adc.read_average(samples)?;
        critical_section::with(|cs| {
            let cell = self.calibration.borrow(cs);
            cell.set(Calibration {
                offset: raw,
                ..cell.get()
            });
        });
        debug!("tare offset {raw}");
        Ok(())
    }

    fn calibrate(&self, known_weight: f64, samples: usize) -> Result<(), Self::Error> {
        if known_weight == 0.0 || !known_weight.is_finite() {
            return Err(Error::InvalidArgument("known weight must be finite and non-zero"));
        }
        let raw = self.adc.read_average(samples)?;
        let scale = critical_section::with(|cs| -> Result<f64, Self::Error> {
            let cell = self.calibration.borrow(cs);
            let current = cell.get();
            let delta = i64::from(raw) - i64::from(current.offset);
            if delta == 0 {
                return Err(Error::InvalidArgument(
                    "calibration reading equals the tare offset",
                ));
            }
            let scale = known_weight / delta as f64;
            cell.set(Calibration { scale, ..current });
            Ok(scale)
        })?;
        debug!("calibrated: raw {raw}, scale {scale}");
        Ok(())
    }

    fn offset(&self) -> i32 {
        self.calibration().offset
    }

    fn set_scale(&self, scale: f64) -> Result<(), Self::Error> {
        if !scale.is_finite() {
            return Err(Error::InvalidArgument("scale must be finite"));
        }
        critical_section::with(|cs| {
            let cell = self.calibration.borrow(cs);
            cell.set(Calibration {
                scale,
                ..cell.get()
            });
        });
        Ok(())
    }

    fn scale(&self) -> f64 {
        self.calibration().scale
    }
}
