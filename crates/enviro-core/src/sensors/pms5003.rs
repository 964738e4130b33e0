use embedded_io::Read;
use log::{debug, error};

use super::{Sensor, SensorError, SensorReading, SensorReadings};

const FRAME_LEN: usize = 32;
const START_BYTE_1: u8 = 0x42;
const START_BYTE_2: u8 = 0x4D;

/// Value of the length field: 13 data words plus the checksum.
const FRAME_BODY_LEN: u16 = 28;

/// Give up hunting for a start sequence after this many bytes.
const MAX_SYNC_BYTES: usize = 2 * FRAME_LEN;

/// Particulate concentrations under atmospheric conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PMS5003Readings {
    pub pm1: u16,
    pub pm2_5: u16,
    pub pm10: u16,
}

impl SensorReadings for PMS5003Readings {
    fn apply(self, reading: &mut SensorReading) {
        reading.pm1 = self.pm1 as f32;
        reading.pm2_5 = self.pm2_5 as f32;
        reading.pm10 = self.pm10 as f32;
    }
}

/// Plantower PMS5003 particulate sensor on a UART in active mode.
pub struct PMS5003Sensor<U> {
    uart: U,
}

impl<U: Read> PMS5003Sensor<U> {
    pub fn new(uart: U) -> Self {
        Self { uart }
    }

    fn read_byte(&mut self) -> Result<u8, SensorError> {
        let mut byte = [0u8; 1];
        self.uart.read_exact(&mut byte).map_err(|e| {
            error!("PMS5003 UART read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "PMS5003",
                operation: "read frame",
                details: "UART read error or end of stream",
            }
        })?;
        Ok(byte[0])
    }

    /// Skip bytes until the two-byte start sequence, then read the rest of the frame.
    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], SensorError> {
        let mut previous = 0u8;
        let mut synced = false;
        for _ in 0..MAX_SYNC_BYTES {
            let byte = self.read_byte()?;
            if previous == START_BYTE_1 && byte == START_BYTE_2 {
                synced = true;
                break;
            }
            previous = byte;
        }

        if !synced {
            return Err(SensorError::Timeout {
                sensor: "PMS5003",
                operation: "find frame start",
            });
        }

        let mut frame = [0u8; FRAME_LEN];
        frame[0] = START_BYTE_1;
        frame[1] = START_BYTE_2;
        self.uart.read_exact(&mut frame[2..]).map_err(|e| {
            error!("PMS5003 UART read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "PMS5003",
                operation: "read frame body",
                details: "UART read error or end of stream",
            }
        })?;
        Ok(frame)
    }
}

fn word(frame: &[u8; FRAME_LEN], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

/// Validate a complete frame and extract the atmospheric PM values.
pub(crate) fn parse_frame(frame: &[u8; FRAME_LEN]) -> Result<PMS5003Readings, SensorError> {
    if frame[0] != START_BYTE_1 || frame[1] != START_BYTE_2 {
        return Err(SensorError::InvalidFrame {
            sensor: "PMS5003",
            details: "missing start bytes",
        });
    }

    if word(frame, 2) != FRAME_BODY_LEN {
        return Err(SensorError::InvalidFrame {
            sensor: "PMS5003",
            details: "unexpected frame length",
        });
    }

    let computed = frame[..FRAME_LEN - 2]
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    let expected = word(frame, FRAME_LEN - 2);
    if computed != expected {
        return Err(SensorError::ChecksumMismatch {
            sensor: "PMS5003",
            expected,
            computed,
        });
    }

    // Words 1-3 are the CF=1 "standard particle" values, 4-6 the atmospheric ones.
    Ok(PMS5003Readings {
        pm1: word(frame, 10),
        pm2_5: word(frame, 12),
        pm10: word(frame, 14),
    })
}

impl<U: Read> Sensor for PMS5003Sensor<U> {
    type Readings = PMS5003Readings;
    const NAME: &'static str = "PMS5003";

    fn read(&mut self) -> Result<PMS5003Readings, SensorError> {
        let frame = self.read_frame()?;
        let readings = parse_frame(&frame)?;
        debug!(
            "PMS5003: PM1 {} PM2.5 {} PM10 {}",
            readings.pm1, readings.pm2_5, readings.pm10
        );
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn frame(pm1: u16, pm2_5: u16, pm10: u16) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = START_BYTE_1;
        frame[1] = START_BYTE_2;
        frame[2..4].copy_from_slice(&FRAME_BODY_LEN.to_be_bytes());
        // CF=1 values differ from the atmospheric ones so a wrong offset shows up.
        frame[4..6].copy_from_slice(&(pm1 + 100).to_be_bytes());
        frame[10..12].copy_from_slice(&pm1.to_be_bytes());
        frame[12..14].copy_from_slice(&pm2_5.to_be_bytes());
        frame[14..16].copy_from_slice(&pm10.to_be_bytes());
        let sum = frame[..FRAME_LEN - 2]
            .iter()
            .fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
        frame[FRAME_LEN - 2..].copy_from_slice(&sum.to_be_bytes());
        frame
    }

    #[test]
    fn test_reads_frame_after_leading_garbage() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x00, 0x42, 0x13, 0x4D]);
        stream.extend_from_slice(&frame(5, 12, 20));

        let mut sensor = PMS5003Sensor::new(stream.as_slice());
        let readings = sensor.read().unwrap();

        assert_eq!(
            readings,
            PMS5003Readings {
                pm1: 5,
                pm2_5: 12,
                pm10: 20
            }
        );
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let mut bytes = frame(1, 2, 3);
        bytes[12] ^= 0x01;

        assert!(matches!(
            parse_frame(&bytes),
            Err(SensorError::ChecksumMismatch { sensor: "PMS5003", .. })
        ));
    }

    #[test]
    fn test_truncated_stream_fails() {
        let bytes = frame(1, 2, 3);
        let mut sensor = PMS5003Sensor::new(&bytes[..20]);

        assert!(matches!(
            sensor.read(),
            Err(SensorError::ReadFailed { sensor: "PMS5003", .. })
        ));
    }

    #[test]
    fn test_no_start_sequence_times_out() {
        let noise = [0x11u8; MAX_SYNC_BYTES + 4];
        let mut sensor = PMS5003Sensor::new(&noise[..]);

        assert!(matches!(
            sensor.read(),
            Err(SensorError::Timeout { sensor: "PMS5003", .. })
        ));
    }
}
