//! Bit-banged HX711 driver.
//!
//! Every bus transaction (readiness wait, the 24 data pulses, the trailing
//! gain pulses and the settling delays of an averaged read) runs under one
//! lock, so concurrent callers never interleave their pulse trains.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, trace, warn};

use crate::{Error, RawSource};

pub const HX711_MINIMUM: i32 = -(1 << 23);
pub const HX711_MAXIMUM: i32 = (1 << 23) - 1;

const DATA_BITS: u32 = 24;
const SIGN_BIT: u32 = 1 << (DATA_BITS - 1);
const READY_POLL_MS: u32 = 1;

/// Channel and gain used for the *next* conversion, selected by the number of
/// clock pulses sent after the 24 data bits.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    /// Channel A, gain 128.
    #[default]
    A128 = 1, // extra pulses
    /// Channel B, gain 32.
    B32 = 2,
    /// Channel A, gain 64.
    A64 = 3,
}

impl Gain {
    /// Number of trailing clock pulses that select this gain.
    pub const fn pulses(self) -> u8 {
        self as u8
    }
}

/// Timing and gain settings of a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub gain: Gain,
    /// Readiness window used by [`Hx711::read_average`].
    pub ready_timeout_ms: u32,
    /// Pause after each sample of an averaged read.
    pub settle_delay_ms: u32,
    /// Hold time after changing the power state.
    pub power_delay_us: u32,
    /// Half period of a clock pulse. Keep well below 60 us, a longer high
    /// phase powers the chip down.
    pub clock_delay_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gain: Gain::A128,
            ready_timeout_ms: 1000,
            settle_delay_ms: 2,
            power_delay_us: 80,
            clock_delay_us: 1,
        }
    }
}

impl Config {
    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_ready_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.ready_timeout_ms = timeout_ms;
        self
    }

    pub fn with_settle_delay_ms(mut self, delay_ms: u32) -> Self {
        self.settle_delay_ms = delay_ms;
        self
    }

    pub fn with_power_delay_us(mut self, delay_us: u32) -> Self {
        self.power_delay_us = delay_us;
        self
    }

    pub fn with_clock_delay_us(mut self, delay_us: u32) -> Self {
        self.clock_delay_us = delay_us;
        self
    }
}

/// Sign extend a 24 bit two's complement conversion result.
pub const fn sign_extend(raw: u32) -> i32 {
    let raw = raw & 0x00FF_FFFF;
    if raw & SIGN_BIT != 0 {
        // negative, fill with 1s
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}

struct Bus<DT, SCK, D> {
    dt_pin: DT,
    sck_pin: SCK,
    delay: D,
}

impl<DT, SCK, D> Bus<DT, SCK, D>
where
    DT: InputPin,
    SCK: OutputPin<Error = DT::Error>,
    D: DelayNs,
{
    fn ready_wait(&mut self, timeout_ms: u32) -> Result<(), Error<DT::Error>> {
        let limit = Duration::from_millis(u64::from(timeout_ms));
        let start = Instant::now();
        loop {
            // if the dt pin is low, device is ready for read
            if self.dt_pin.is_low().map_err(Error::Io)? {
                return Ok(());
            }
            if start.elapsed() > limit {
                warn!("hx711 not ready after {timeout_ms} ms");
                return Err(Error::Timeout { timeout_ms });
            }
            self.delay.delay_ms(READY_POLL_MS);
        }
    }

    fn read_raw_one(&mut self, gain: Gain, half_period_us: u32) -> Result<i32, Error<DT::Error>> {
        let mut value: u32 = 0;
        for _ in 0..DATA_BITS {
            // bits arrive MSB first
            let bit = self.clock_pulse(half_period_us, true)?;
            value = (value << 1) | u32::from(bit);
        }
        // send gain mode for next reading
        for _ in 0..gain.pulses() {
            self.clock_pulse(half_period_us, false)?;
        }
        Ok(sign_extend(value))
    }

    /// One clock pulse, sampling DOUT on the high phase when `sample` is set.
    ///
    /// SCK is always driven low again, even when the pulse fails: a clock left
    /// high for more than 60 us powers the chip down.
    fn clock_pulse(&mut self, half_period_us: u32, sample: bool) -> Result<bool, Error<DT::Error>> {
        let pulse = self.pulse(half_period_us, sample);
        if pulse.is_err() {
            let _ = self.sck_pin.set_low();
        }
        pulse
    }

    fn pulse(&mut self, half_period_us: u32, sample: bool) -> Result<bool, Error<DT::Error>> {
        self.sck_pin.set_high().map_err(Error::Io)?;
        self.delay.delay_us(half_period_us);
        let bit = if sample {
            self.dt_pin.is_high().map_err(Error::Io)?
        } else {
            false
        };
        self.sck_pin.set_low().map_err(Error::Io)?;
        self.delay.delay_us(half_period_us);
        Ok(bit)
    }
}

/// HX711 bound to a data (DOUT) and a clock (PD_SCK) line.
///
/// All methods take `&self`; share the driver between threads by reference or
/// behind an `Arc`.
pub struct Hx711<DT, SCK, D> {
    bus: Mutex<Bus<DT, SCK, D>>,
    config: Config,
}

impl<DT, SCK, D> Hx711<DT, SCK, D>
where
    DT: InputPin,
    SCK: OutputPin<Error = DT::Error>,
    D: DelayNs,
{
    /// Creates a driver with default timing and drives the clock low, which
    /// leaves the chip powered up.
    pub fn new(dt_pin: DT, sck_pin: SCK, delay: D, gain: Gain) -> Result<Self, Error<DT::Error>> {
        Self::with_config(dt_pin, sck_pin, delay, Config::default().with_gain(gain))
    }

    pub fn with_config(
        dt_pin: DT,
        mut sck_pin: SCK,
        delay: D,
        config: Config,
    ) -> Result<Self, Error<DT::Error>> {
        sck_pin.set_low().map_err(Error::Io)?;
        debug!("hx711 ready, gain {:?}", config.gain);
        Ok(Self {
            bus: Mutex::new(Bus {
                dt_pin,
                sck_pin,
                delay,
            }),
            config,
        })
    }

    pub fn gain(&self) -> Gain {
        self.config.gain
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Poll DOUT until the chip signals a finished conversion.
    pub fn ready_wait(&self, timeout_ms: u32) -> Result<(), Error<DT::Error>> {
        self.lock().ready_wait(timeout_ms)
    }

    /// Wait for the chip, then average `samples` consecutive conversions.
    ///
    /// The bus stays locked for the whole call. The result is the truncating
    /// integer mean of the samples.
    pub fn read_average(&self, samples: usize) -> Result<i32, Error<DT::Error>> {
        if samples == 0 {
            return Err(Error::InvalidArgument("sample count must be positive"));
        }
        let sum = {
            let mut bus = self.lock();
            bus.ready_wait(self.config.ready_timeout_ms)?;
            let mut sum: i64 = 0;
            for _ in 0..samples {
                let value = bus.read_raw_one(self.config.gain, self.config.clock_delay_us)?;
                trace!("hx711 sample {value}");
                sum += i64::from(value);
                bus.delay.delay_ms(self.config.settle_delay_ms);
            }
            sum
        };
        // the mean of i32 samples always fits an i32
        let average = (sum / samples as i64) as i32;
        debug!("hx711 average of {samples} samples: {average}");
        Ok(average)
    }

    /// Hold the clock high to put the chip into its low power state.
    ///
    /// Reading while powered down is not detected; call [`Hx711::power_up`]
    /// first.
    pub fn power_down(&self) -> Result<(), Error<DT::Error>> {
        let mut bus = self.lock();
        bus.sck_pin.set_high().map_err(Error::Io)?;
        bus.delay.delay_us(self.config.power_delay_us);
        debug!("hx711 powered down");
        Ok(())
    }

    /// Drive the clock low to wake the chip. It resets to channel A, gain 128.
    pub fn power_up(&self) -> Result<(), Error<DT::Error>> {
        let mut bus = self.lock();
        bus.sck_pin.set_low().map_err(Error::Io)?;
        bus.delay.delay_us(self.config.power_delay_us);
        debug!("hx711 powered up");
        Ok(())
    }

    /// Give back the lines and the delay.
    pub fn release(self) -> (DT, SCK, D) {
        let bus = self.bus.into_inner().unwrap_or_else(PoisonError::into_inner);
        (bus.dt_pin, bus.sck_pin, bus.delay)
    }

    /// Drop the driver together with its lines.
    pub fn close(self) {
        drop(self.release());
        debug!("hx711 closed");
    }

    fn lock(&self) -> MutexGuard<'_, Bus<DT, SCK, D>> {
        // a panicking reader leaves the pins in a usable state
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<DT, SCK, D> RawSource for Hx711<DT, SCK, D>
where
    DT: InputPin,
    SCK: OutputPin<Error = DT::Error>,
    D: DelayNs,
{
    type LineError = DT::Error;

    fn read_average(&self, samples: usize) -> Result<i32, Error<DT::Error>> {
        Hx711::read_average(self, samples)
    }
}
