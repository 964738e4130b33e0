use bh1750_embedded::{Address, Resolution, r#async::Bh1750Async};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error};

use super::{Sensor, SensorError, SensorReading, SensorReadings};

pub struct BH1750Readings {
    pub lux: f32,
}

impl SensorReadings for BH1750Readings {
    fn apply(self, reading: &mut SensorReading) {
        reading.light = self.lux;
    }
}

/// Ambient light sensor using one-time high resolution measurements.
///
/// The driver is async; each read is driven to completion in place so the
/// poller keeps its blocking cycle.
pub struct BH1750Sensor<I, D> {
    sensor: Bh1750Async<I, D>,
}

impl<I: I2c, D: DelayNs> BH1750Sensor<I, D> {
    /// Sensor with the ADDR pin pulled low (0x23).
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_address(i2c, delay, Address::Low)
    }

    pub fn with_address(i2c: I, delay: D, address: Address) -> Self {
        Self {
            sensor: Bh1750Async::<I, D>::new(i2c, delay, address),
        }
    }
}

impl<I: I2c, D: DelayNs> Sensor for BH1750Sensor<I, D> {
    type Readings = BH1750Readings;
    const NAME: &'static str = "BH1750";

    fn read(&mut self) -> Result<BH1750Readings, SensorError> {
        block_on(self.sensor.one_time_measurement(Resolution::High))
            .map(|lux| {
                debug!("BH1750: measured {} lux", lux);
                BH1750Readings { lux }
            })
            .map_err(|e| {
                error!("BH1750 one_time_measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "BH1750",
                    operation: "one_time_measurement",
                    details: "Failed to read lux value during a single one-time measurement",
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, Operation};

    /// Answers every read with a fixed payload.
    struct FakeBus {
        response: [u8; 2],
        fail: bool,
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(_) => {}
                    Operation::Read(buf) => {
                        for (slot, byte) in buf.iter_mut().zip(self.response.iter().cycle()) {
                            *slot = *byte;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_converts_raw_counts_to_lux() {
        let bus = FakeBus {
            response: [0x01, 0x2C], // 300 counts
            fail: false,
        };
        let mut sensor = BH1750Sensor::new(bus, NoDelay);

        let readings = sensor.read().unwrap();

        assert!((readings.lux - 250.0).abs() < 1.0, "got {}", readings.lux);
    }

    #[test]
    fn test_bus_failure_is_reported() {
        let bus = FakeBus {
            response: [0, 0],
            fail: true,
        };
        let mut sensor = BH1750Sensor::new(bus, NoDelay);

        assert!(matches!(
            sensor.read(),
            Err(SensorError::ReadFailed { sensor: "BH1750", .. })
        ));
    }
}
