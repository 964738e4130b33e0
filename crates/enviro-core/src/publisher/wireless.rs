use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use super::TransportError;

/// Attempts made to reach the wireless co-processor at boot.
pub const HANDSHAKE_ATTEMPTS: u8 = 3;

/// Pause between handshake attempts.
pub const HANDSHAKE_PAUSE_MS: u32 = 1000;

/// Firmware version string reported by the co-processor.
pub type FirmwareVersion = heapless::String<32>;

/// Control plane of the wireless co-processor.
pub trait WirelessAdapter {
    fn firmware_version(&mut self) -> Result<FirmwareVersion, TransportError>;

    fn reset(&mut self) -> Result<(), TransportError>;
}

/// Probe the adapter until it answers, resetting it between attempts.
///
/// This is the only automatic retry in the network path. When it gives up the
/// station runs without a publisher.
pub fn handshake<A, D>(
    adapter: &mut A,
    delay: &mut D,
    attempts: u8,
    pause_ms: u32,
) -> Result<FirmwareVersion, TransportError>
where
    A: WirelessAdapter,
    D: DelayNs,
{
    for attempt in 1..=attempts {
        match adapter.firmware_version() {
            Ok(version) => {
                info!("Wireless firmware: {}", version);
                return Ok(version);
            }
            Err(e) => {
                warn!(
                    "Retrying wireless adapter ({}/{}): {}",
                    attempt, attempts, e
                );
                delay.delay_ms(pause_ms);
                if let Err(e) = adapter.reset() {
                    warn!("Wireless adapter reset failed: {}", e);
                }
            }
        }
    }

    error!("Was not able to find the wireless adapter");
    Err(TransportError::AdapterUnavailable { attempts })
}
