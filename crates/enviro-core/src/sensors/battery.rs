use log::debug;

use super::{AnalogChannel, Sensor, SensorError, SensorReading, SensorReadings};

/// ADC reference voltage in millivolts.
const DEFAULT_REFERENCE_MV: f32 = 3300.0;

/// Most boards halve the battery voltage before it reaches the ADC.
const DEFAULT_DIVIDER_RATIO: f32 = 2.0;

pub struct BatteryReadings {
    pub millivolts: u16,
}

impl SensorReadings for BatteryReadings {
    fn apply(self, reading: &mut SensorReading) {
        reading.battery_voltage = self.millivolts;
    }
}

/// Battery voltage monitor on a resistor divider feeding an ADC channel.
pub struct BatteryMonitor<A> {
    channel: A,
    reference_mv: f32,
    divider_ratio: f32,
}

impl<A: AnalogChannel> BatteryMonitor<A> {
    pub fn new(channel: A) -> Self {
        Self::with_divider(channel, DEFAULT_REFERENCE_MV, DEFAULT_DIVIDER_RATIO)
    }

    pub fn with_divider(channel: A, reference_mv: f32, divider_ratio: f32) -> Self {
        Self {
            channel,
            reference_mv,
            divider_ratio,
        }
    }

    fn to_millivolts(&self, raw: u16) -> u16 {
        let mv = (raw as f32 / u16::MAX as f32) * self.reference_mv * self.divider_ratio;
        mv.clamp(0.0, u16::MAX as f32) as u16
    }
}

impl<A: AnalogChannel> Sensor for BatteryMonitor<A> {
    type Readings = BatteryReadings;
    const NAME: &'static str = "Battery";

    fn read(&mut self) -> Result<BatteryReadings, SensorError> {
        let raw = self.channel.read_raw()?;
        let millivolts = self.to_millivolts(raw);
        debug!("Battery: raw {} -> {} mV", raw, millivolts);
        Ok(BatteryReadings { millivolts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdc(u16);

    impl AnalogChannel for FixedAdc {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_full_scale_reads_twice_reference() {
        let mut monitor = BatteryMonitor::new(FixedAdc(u16::MAX));
        assert_eq!(monitor.read().unwrap().millivolts, 6600);
    }

    #[test]
    fn test_half_scale_on_custom_divider() {
        let mut monitor = BatteryMonitor::with_divider(FixedAdc(u16::MAX / 2), 3300.0, 1.0);
        let mv = monitor.read().unwrap().millivolts;
        assert!((1648..=1650).contains(&mv), "got {mv}");
    }
}
