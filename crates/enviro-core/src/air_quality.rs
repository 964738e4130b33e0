//! Air-quality LED indicator.
//!
//! PM2.5 concentration is mapped onto the ten bands of the UK Daily Air
//! Quality Index and shown as a single RGB color.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use log::{debug, info};
use micromath::F32Ext;
use thiserror_no_std::Error;

use crate::sensors::SensorReading;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedError {
    #[error("LED write failed: {details}")]
    WriteFailed { details: &'static str },
}

/// Single addressable RGB LED (or a strip treated as one).
pub trait RgbLed {
    fn fill(&mut self, color: Rgb888) -> Result<(), LedError>;
}

/// Half-open concentration range `[lower, upper)` and its color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBand {
    /// DAQI index minus one.
    pub index: u8,
    pub lower: f32,
    pub upper: f32,
    pub color: Rgb888,
}

impl ColorBand {
    const fn new(index: u8, lower: f32, upper: f32, color: u32) -> Self {
        Self {
            index,
            lower,
            upper,
            color: Rgb888::new((color >> 16) as u8, (color >> 8) as u8, color as u8),
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.lower && value < self.upper
    }
}

/// PM2.5 bands in ug/m3. Together they cover the whole real line.
pub const BANDS: [ColorBand; 10] = [
    ColorBand::new(0, f32::NEG_INFINITY, 12.0, 0x9CFF9C),
    ColorBand::new(1, 12.0, 24.0, 0x31FF00),
    ColorBand::new(2, 24.0, 36.0, 0x31CF00),
    ColorBand::new(3, 36.0, 42.0, 0xF0F000),
    ColorBand::new(4, 42.0, 48.0, 0xFFCF00),
    ColorBand::new(5, 48.0, 54.0, 0xFF9A00),
    ColorBand::new(6, 54.0, 59.0, 0xFF6464),
    ColorBand::new(7, 59.0, 65.0, 0xFF0000),
    ColorBand::new(8, 65.0, 71.0, 0x900000),
    ColorBand::new(9, 71.0, f32::INFINITY, 0xCE30FF),
];

/// First band containing `value`. NaN falls into band 0.
pub fn band_for(value: f32) -> &'static ColorBand {
    BANDS
        .iter()
        .find(|band| band.contains(value))
        .unwrap_or(&BANDS[0])
}

pub struct AirQualityIndicator<L> {
    led: L,
    brightness: f32,
}

impl<L: RgbLed> AirQualityIndicator<L> {
    /// Take the LED and switch it off. `brightness` is clamped to `0.0..=1.0`.
    pub fn new(mut led: L, brightness: f32) -> Result<Self, LedError> {
        led.fill(Rgb888::BLACK)?;
        let brightness = if brightness.is_nan() {
            0.0
        } else {
            brightness.max(0.0).min(1.0)
        };
        info!("Air quality LED ready at brightness {}", brightness);
        Ok(Self { led, brightness })
    }

    /// Show the band for the reading's PM2.5 concentration.
    pub fn show(&mut self, reading: &SensorReading) -> Result<&'static ColorBand, LedError> {
        let band = band_for(reading.pm2_5);
        debug!("PM2.5 {} -> band {}", reading.pm2_5, band.index);
        self.led.fill(self.scale(band.color))?;
        Ok(band)
    }

    pub fn led(&self) -> &L {
        &self.led
    }

    fn scale(&self, color: Rgb888) -> Rgb888 {
        let channel = |c: u8| F32Ext::round(f32::from(c) * self.brightness) as u8;
        Rgb888::new(channel(color.r()), channel(color.g()), channel(color.b()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct RecordingLed {
        colors: Vec<Rgb888>,
    }

    impl RgbLed for RecordingLed {
        fn fill(&mut self, color: Rgb888) -> Result<(), LedError> {
            self.colors.push(color);
            Ok(())
        }
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(band_for(70.0).index, 8);
        assert_eq!(band_for(71.0).index, 9);
        assert_eq!(band_for(11.0).index, 0);
        assert_eq!(band_for(12.0).index, 1);
        assert_eq!(band_for(-3.0).index, 0);
        assert_eq!(band_for(1.0e6).index, 9);
        assert_eq!(band_for(f32::NAN).index, 0);
    }

    #[test]
    fn test_bands_are_contiguous_and_ordered() {
        for (i, pair) in BANDS.windows(2).enumerate() {
            assert_eq!(pair[0].upper, pair[1].lower);
            assert_eq!(pair[0].index as usize, i);
        }
        assert_eq!(BANDS[0].lower, f32::NEG_INFINITY);
        assert_eq!(BANDS[9].upper, f32::INFINITY);
    }

    #[test]
    fn test_indicator_starts_dark_and_scales_color() {
        let mut indicator = AirQualityIndicator::new(RecordingLed::default(), 0.5).unwrap();
        let reading = SensorReading {
            pm2_5: 60.0,
            ..Default::default()
        };

        let band = indicator.show(&reading).unwrap();

        assert_eq!(band.color, Rgb888::new(0xFF, 0, 0));
        assert_eq!(
            indicator.led().colors,
            [Rgb888::BLACK, Rgb888::new(128, 0, 0)]
        );
    }

    #[test]
    fn test_brightness_is_clamped() {
        let mut indicator = AirQualityIndicator::new(RecordingLed::default(), 4.0).unwrap();
        indicator.show(&SensorReading::default()).unwrap();
        assert_eq!(indicator.led().colors[1], Rgb888::new(0x9C, 0xFF, 0x9C));
    }
}
