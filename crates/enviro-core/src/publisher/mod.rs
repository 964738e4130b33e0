//! MQTT publishing with Home-Assistant discovery.
//!
//! The MQTT client itself sits behind [`Transport`]; this module decides what
//! goes on which topic and in what order.

mod discovery;
mod wireless;

use alloc::string::String;

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::sensors::SensorReading;

pub use discovery::{
    ENVIRO_PLUS, SensorEntity, build_discovery_payload, config_topic, state_topic,
};
pub use wireless::{
    FirmwareVersion, HANDSHAKE_ATTEMPTS, HANDSHAKE_PAUSE_MS, WirelessAdapter, handshake,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("Broker connection failed: {details}")]
    Connect { details: &'static str },
    #[error("Publish failed: {details}")]
    Publish { details: &'static str },
    #[error("Disconnect failed: {details}")]
    Disconnect { details: &'static str },
    #[error("Payload encoding failed: {details}")]
    Encode { details: &'static str },
    #[error("Wireless adapter did not answer after {attempts} attempts")]
    AdapterUnavailable { attempts: u8 },
}

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Pub/sub link to the broker.
pub trait Transport {
    fn connect(&mut self) -> Result<(), TransportError>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Publishes readings as one JSON state document per cycle.
///
/// Each cycle opens and closes its own broker session. Discovery configs go
/// out once, on the first cycle that gets them all through.
pub struct Publisher<T> {
    transport: T,
    device_name: String,
    entities: &'static [SensorEntity],
    discovery_sent: bool,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, device_name: &str) -> Self {
        Self::with_entities(transport, device_name, &ENVIRO_PLUS)
    }

    pub fn with_entities(
        transport: T,
        device_name: &str,
        entities: &'static [SensorEntity],
    ) -> Self {
        Self {
            transport,
            device_name: String::from(device_name),
            entities,
            discovery_sent: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn discovery_sent(&self) -> bool {
        self.discovery_sent
    }

    /// Connect, publish and disconnect.
    ///
    /// Without a reading nothing touches the transport. A failed publish still
    /// disconnects; the publish error is the one returned. Nothing is retried.
    pub fn connect_and_send(&mut self, reading: Option<&SensorReading>) -> Result<(), TransportError> {
        let Some(reading) = reading else {
            warn!("No readings, skipping connect");
            return Ok(());
        };

        let state = serde_json::to_vec(reading).map_err(|e| {
            error!("Failed to encode state payload: {}", e);
            TransportError::Encode {
                details: "state payload is not serializable",
            }
        })?;

        self.transport.connect().inspect_err(|e| {
            error!("MQTT connect failed: {}", e);
        })?;

        let published = self.publish_all(&state);
        let disconnected = self.transport.disconnect();

        match (published, disconnected) {
            (Err(e), disconnected) => {
                error!("MQTT publish failed: {}", e);
                if let Err(d) = disconnected {
                    error!("MQTT disconnect failed: {}", d);
                }
                Err(e)
            }
            (Ok(()), Err(d)) => {
                error!("MQTT disconnect failed: {}", d);
                Err(d)
            }
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn publish_all(&mut self, state: &[u8]) -> Result<(), TransportError> {
        if !self.discovery_sent {
            self.publish_discovery()?;
            self.discovery_sent = true;
            info!(
                "Announced {} entities for {}",
                self.entities.len(),
                self.device_name
            );
        }

        let topic = state_topic(&self.device_name);
        debug!("Sending {} bytes to {}", state.len(), topic);
        self.transport
            .publish(&topic, state, false, QoS::AtMostOnce)
    }

    fn publish_discovery(&mut self) -> Result<(), TransportError> {
        for entity in self.entities {
            let payload = build_discovery_payload(&self.device_name, entity)?;
            let topic = config_topic(&self.device_name, entity);
            debug!("Sending {} bytes to {}", payload.len(), topic);
            self.transport
                .publish(&topic, payload.as_bytes(), true, QoS::AtLeastOnce)?;
        }
        Ok(())
    }
}
