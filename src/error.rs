use thiserror::Error;

/// Errors returned by the driver and the load cell layer.
///
/// `E` is the error type of the GPIO lines the driver was built on.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// A required argument was out of range (zero samples, zero calibration
    /// weight, zero calibration delta, non-finite scale).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Reading or driving one of the GPIO lines failed.
    #[error("gpio line error: {0}")]
    Io(E),

    /// DOUT did not go low within the allotted window.
    #[error("hx711 not ready within {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let io: Error<&str> = Error::Io("gpio49: permission denied");
        assert_eq!(io.to_string(), "gpio line error: gpio49: permission denied");
        let timeout: Error<&str> = Error::Timeout { timeout_ms: 1000 };
        assert_eq!(timeout.to_string(), "hx711 not ready within 1000 ms");
        let invalid: Error<&str> = Error::InvalidArgument("sample count must be positive");
        assert_eq!(
            invalid.to_string(),
            "invalid argument: sample count must be positive"
        );
    }
}
