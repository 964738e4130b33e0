use super::SensorError;

/// A single ADC input scaled to the full unsigned 16-bit range.
///
/// The ADC peripheral itself belongs to the HAL; boards wrap their channel
/// in a small adapter implementing this trait.
pub trait AnalogChannel {
    /// Sample the channel once. `0` is ground, `u16::MAX` is the reference voltage.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}
