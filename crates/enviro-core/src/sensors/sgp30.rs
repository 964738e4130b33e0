use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info};

use super::{Sensor, SensorError, SensorReading, SensorReadings, sensirion_crc8};

/// Fixed I2C address of the SGP30.
pub const SGP30_ADDRESS: u8 = 0x58;

const CMD_IAQ_INIT: [u8; 2] = [0x20, 0x03];
const CMD_MEASURE_IAQ: [u8; 2] = [0x20, 0x08];
const CMD_GET_IAQ_BASELINE: [u8; 2] = [0x20, 0x15];

const IAQ_INIT_MS: u32 = 10;
const MEASURE_IAQ_MS: u32 = 12;
const GET_BASELINE_MS: u32 = 10;

/// eCO2 and TVOC readings from the SGP30.
pub struct SGP30Readings {
    pub eco2_ppm: u16,
    pub tvoc_ppb: u16,
}

impl SensorReadings for SGP30Readings {
    fn apply(self, reading: &mut SensorReading) {
        reading.eco2 = self.eco2_ppm;
        reading.tvoc = self.tvoc_ppb;
    }
}

/// IAQ algorithm baseline, logged during calibration so it can be restored by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SGP30Baseline {
    pub eco2: u16,
    pub tvoc: u16,
}

/// Air-quality (eCO2/TVOC) sensor.
pub struct SGP30Sensor<I, D> {
    i2c: I,
    delay: D,
    initialized: bool,
}

impl<I: I2c, D: DelayNs> SGP30Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            initialized: false,
        }
    }

    /// Start the on-chip IAQ algorithm.
    /// Done lazily on the first read so construction never touches the bus.
    fn initialize(&mut self) -> Result<(), SensorError> {
        self.i2c.write(SGP30_ADDRESS, &CMD_IAQ_INIT).map_err(|e| {
            error!("SGP30 iaq_init failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "SGP30",
                details: "Failed to start the IAQ algorithm",
            }
        })?;
        self.delay.delay_ms(IAQ_INIT_MS);

        info!("SGP30: IAQ algorithm started");
        self.initialized = true;
        Ok(())
    }

    /// Issue a command and read back two CRC-protected words.
    fn read_words(
        &mut self,
        command: &[u8; 2],
        wait_ms: u32,
        operation: &'static str,
    ) -> Result<[u16; 2], SensorError> {
        self.i2c.write(SGP30_ADDRESS, command).map_err(|e| {
            error!("SGP30 {} command failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: "SGP30",
                operation,
                details: "I2C write not acknowledged",
            }
        })?;

        self.delay.delay_ms(wait_ms);

        let mut buf = [0u8; 6];
        self.i2c.read(SGP30_ADDRESS, &mut buf).map_err(|e| {
            error!("SGP30 {} read failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: "SGP30",
                operation,
                details: "I2C communication error",
            }
        })?;

        decode_words(&buf)
    }

    /// Read the current IAQ baseline.
    pub fn baseline(&mut self) -> Result<SGP30Baseline, SensorError> {
        let [eco2, tvoc] = self.read_words(&CMD_GET_IAQ_BASELINE, GET_BASELINE_MS, "get baseline")?;
        Ok(SGP30Baseline { eco2, tvoc })
    }
}

/// Split a 6-byte response into two words, verifying each CRC.
fn decode_words(buf: &[u8; 6]) -> Result<[u16; 2], SensorError> {
    let mut words = [0u16; 2];
    for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(3)) {
        let computed = sensirion_crc8(&chunk[..2]);
        if computed != chunk[2] {
            return Err(SensorError::ChecksumMismatch {
                sensor: "SGP30",
                expected: chunk[2] as u16,
                computed: computed as u16,
            });
        }
        *word = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Ok(words)
}

impl<I: I2c, D: DelayNs> Sensor for SGP30Sensor<I, D> {
    type Readings = SGP30Readings;
    const NAME: &'static str = "SGP30";

    fn read(&mut self) -> Result<SGP30Readings, SensorError> {
        if !self.initialized {
            self.initialize()?;
        }

        let [eco2_ppm, tvoc_ppb] =
            self.read_words(&CMD_MEASURE_IAQ, MEASURE_IAQ_MS, "measure IAQ")?;

        Ok(SGP30Readings { eco2_ppm, tvoc_ppb })
    }

    fn calibrate(&mut self) -> Result<(), SensorError> {
        if !self.initialized {
            self.initialize()?;
        }

        let baseline = self.baseline()?;
        info!(
            "SGP30 baseline: eCO2 {:#06x}, TVOC {:#06x}",
            baseline.eco2, baseline.tvoc
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    fn encode(word: u16) -> [u8; 3] {
        let [hi, lo] = word.to_be_bytes();
        [hi, lo, sensirion_crc8(&[hi, lo])]
    }

    fn response(a: u16, b: u16) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[..3].copy_from_slice(&encode(a));
        out[3..].copy_from_slice(&encode(b));
        out
    }

    struct FakeSgp30 {
        commands: Vec<[u8; 2]>,
        response: [u8; 6],
    }

    impl ErrorType for FakeSgp30 {
        type Error = ErrorKind;
    }

    impl I2c for FakeSgp30 {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, SGP30_ADDRESS);
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.commands.push([bytes[0], bytes[1]]),
                    Operation::Read(buf) => buf.copy_from_slice(&self.response),
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_first_read_initializes_then_measures() {
        let bus = FakeSgp30 {
            commands: Vec::new(),
            response: response(450, 12),
        };
        let mut sensor = SGP30Sensor::new(bus, NoDelay);

        let readings = sensor.read().unwrap();
        assert_eq!(readings.eco2_ppm, 450);
        assert_eq!(readings.tvoc_ppb, 12);

        sensor.read().unwrap();
        assert_eq!(
            sensor.i2c.commands,
            [CMD_IAQ_INIT, CMD_MEASURE_IAQ, CMD_MEASURE_IAQ]
        );
    }

    #[test]
    fn test_corrupted_crc_is_rejected() {
        let mut buf = response(400, 0);
        buf[2] ^= 0xFF;

        assert!(matches!(
            decode_words(&buf),
            Err(SensorError::ChecksumMismatch { sensor: "SGP30", .. })
        ));
    }

    #[test]
    fn test_calibrate_reads_baseline() {
        let bus = FakeSgp30 {
            commands: Vec::new(),
            response: response(0x8A2E, 0x8F41),
        };
        let mut sensor = SGP30Sensor::new(bus, NoDelay);

        sensor.calibrate().unwrap();

        assert_eq!(sensor.i2c.commands.last(), Some(&CMD_GET_IAQ_BASELINE));
        assert_eq!(
            sensor.baseline().unwrap(),
            SGP30Baseline {
                eco2: 0x8A2E,
                tvoc: 0x8F41
            }
        );
    }
}
