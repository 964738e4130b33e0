use ::bme680::{
    Bme680, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode, SettingsBuilder,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal_0_2::blocking::delay::DelayMs;
use embedded_hal_0_2::blocking::i2c::{Read, Write};
use log::{error, info};

use super::{Sensor, SensorError, SensorReading, SensorReadings, altitude_from_pressure};

/// Fallback wait for a forced measurement when the profile cannot be computed.
const DEFAULT_PROFILE_MS: u32 = 100;

pub struct BME680Readings {
    pub temperature_c: f32,
    pub humidity_percent: f32,
    pub pressure_hpa: f32,
    pub altitude_m: f32,
}

impl SensorReadings for BME680Readings {
    fn apply(self, reading: &mut SensorReading) {
        reading.temperature = self.temperature_c;
        reading.humidity = self.humidity_percent;
        reading.pressure = self.pressure_hpa;
        reading.altitude = self.altitude_m;
    }
}

/// Presents an embedded-hal 1.0 bus through the 0.2 blocking traits the
/// `bme680` driver is written against.
pub struct I2cCompat<I>(pub I);

impl<I: I2c> Write for I2cCompat<I> {
    type Error = I::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.write(address, bytes)
    }
}

impl<I: I2c> Read for I2cCompat<I> {
    type Error = I::Error;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(address, buffer)
    }
}

/// 0.2 millisecond delay backed by an embedded-hal 1.0 [`DelayNs`].
pub struct DelayCompat<D>(pub D);

impl<D: DelayNs> DelayMs<u8> for DelayCompat<D> {
    fn delay_ms(&mut self, ms: u8) {
        self.0.delay_ms(u32::from(ms));
    }
}

/// Temperature, humidity and pressure from a BME680 in forced mode.
///
/// The gas heater stays off; gas readings come from the analog MICS6814.
pub struct BME680Sensor<I, D> {
    bme: Bme680<I2cCompat<I>, DelayCompat<D>>,
    delay: DelayCompat<D>,
    profile_ms: u32,
    sea_level_hpa: f32,
}

impl<I: I2c, D: DelayNs> BME680Sensor<I, D> {
    pub fn new(i2c: I, delay: D, sea_level_hpa: f32) -> Result<Self, SensorError> {
        let mut delay = DelayCompat(delay);
        let mut bme = Bme680::init(I2cCompat(i2c), &mut delay, I2CAddress::Secondary)
            .map_err(|e| {
                error!("BME680 init failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "BME680",
                    details: "Device did not answer on the I2C bus",
                }
            })?;

        let settings = SettingsBuilder::new()
            .with_humidity_oversampling(OversamplingSetting::OS2x)
            .with_pressure_oversampling(OversamplingSetting::OS4x)
            .with_temperature_oversampling(OversamplingSetting::OS8x)
            .with_temperature_filter(IIRFilterSize::Size3)
            .with_run_gas(false)
            .build();

        let profile_ms = match bme.get_profile_dur(&settings.0) {
            Ok(duration) => u32::try_from(duration.as_millis()).unwrap_or(DEFAULT_PROFILE_MS),
            Err(e) => {
                error!("BME680 profile duration unavailable: {:?}", e);
                DEFAULT_PROFILE_MS
            }
        };

        bme.set_sensor_settings(&mut delay, settings).map_err(|e| {
            error!("BME680 settings rejected: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "BME680",
                details: "Failed to apply oversampling settings",
            }
        })?;

        info!("BME680 ready, measurement profile {} ms", profile_ms);

        Ok(Self {
            bme,
            delay,
            profile_ms,
            sea_level_hpa,
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor for BME680Sensor<I, D> {
    type Readings = BME680Readings;
    const NAME: &'static str = "BME680";

    fn read(&mut self) -> Result<BME680Readings, SensorError> {
        self.bme
            .set_sensor_mode(&mut self.delay, PowerMode::ForcedMode)
            .map_err(|e| {
                error!("BME680 forced mode failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "BME680",
                    operation: "trigger measurement",
                    details: "I2C communication error",
                }
            })?;

        self.delay.0.delay_ms(self.profile_ms);

        let (data, _condition) = self.bme.get_sensor_data(&mut self.delay).map_err(|e| {
            error!("BME680 data read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "BME680",
                operation: "read measurement",
                details: "I2C communication error",
            }
        })?;

        let pressure_hpa = data.pressure_hpa() as f32;
        Ok(BME680Readings {
            temperature_c: data.temperature_celsius() as f32,
            humidity_percent: data.humidity_percent() as f32,
            pressure_hpa,
            altitude_m: altitude_from_pressure(pressure_hpa, self.sea_level_hpa),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// Bus with nothing attached: every transaction is NACKed.
    struct EmptyBus;

    impl ErrorType for EmptyBus {
        type Error = ErrorKind;
    }

    impl I2c for EmptyBus {
        fn transaction(
            &mut self,
            _address: u8,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    /// Answers every read with the BME680 chip id and records writes.
    struct ChipIdBus {
        writes: Vec<(u8, Vec<u8>)>,
    }

    impl ErrorType for ChipIdBus {
        type Error = ErrorKind;
    }

    impl I2c for ChipIdBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => buf.fill(0x61),
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn test_missing_device_fails_initialization() {
        let result = BME680Sensor::new(
            EmptyBus,
            RecordingDelay::default(),
            crate::sensors::DEFAULT_SEA_LEVEL_HPA,
        );

        assert!(matches!(
            result,
            Err(SensorError::InitializationFailed { sensor: "BME680", .. })
        ));
    }

    #[test]
    fn test_compat_bus_forwards_to_secondary_address() {
        let mut bus = I2cCompat(ChipIdBus { writes: Vec::new() });
        let mut buf = [0u8; 1];

        Write::write(&mut bus, 0x77, &[0xE0, 0xB6]).unwrap();
        Read::read(&mut bus, 0x77, &mut buf).unwrap();

        assert_eq!(bus.0.writes, [(0x77, alloc::vec![0xE0, 0xB6])]);
        assert_eq!(buf, [0x61]);
    }

    #[test]
    fn test_compat_delay_waits_in_milliseconds() {
        let mut delay = DelayCompat(RecordingDelay::default());

        DelayMs::delay_ms(&mut delay, 10u8);

        assert_eq!(delay.0.total_ns, 10_000_000);
    }
}
