//! Station configuration.
//!
//! Everything the station needs is passed in at construction; there is no
//! global state. The struct round-trips through `postcard` so it can live as a
//! small blob in flash next to the firmware.

use alloc::vec;
use alloc::vec::Vec;

use log::error;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::Duration;
use crate::sensors::{DEFAULT_SEA_LEVEL_HPA, SensorReading};

/// Calibration runs every half hour regardless of the update rate.
pub const CALIBRATION_INTERVAL_SECS: u32 = 1800;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to decode configuration blob: {reason}")]
    Decode { reason: postcard::Error },
    #[error("failed to encode configuration: {reason}")]
    Encode { reason: postcard::Error },
    #[error("plot has {configured} channels but {selected} plot sources are selected")]
    ChannelMismatch { configured: usize, selected: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct StationConfig<'a> {
    /// Prefix for every MQTT topic and Home-Assistant entity name.
    pub device_name: &'a str,
    pub update_interval_secs: f32,
    /// LED scale factor in `0.0..=1.0`.
    pub led_brightness: f32,
    pub sea_level_hpa: f32,
    pub plot: PlotConfig,
    /// Reading field feeding each plot channel, in channel order.
    pub plot_channels: Vec<PlotChannel>,
    pub network: NetworkConfig<'a>,
}

impl Default for StationConfig<'_> {
    fn default() -> Self {
        Self {
            device_name: "enviro",
            update_interval_secs: 2.0,
            led_brightness: 0.1,
            sea_level_hpa: DEFAULT_SEA_LEVEL_HPA,
            plot: PlotConfig::default(),
            plot_channels: vec![PlotChannel::Pm1, PlotChannel::Pm2_5, PlotChannel::Pm10],
            network: NetworkConfig::default(),
        }
    }
}

impl<'a> StationConfig<'a> {
    /// Decode a stored blob. String fields borrow from `bytes`.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|reason| {
            error!("Stored configuration is unreadable: {}", reason);
            ConfigError::Decode { reason }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|reason| ConfigError::Encode { reason })
    }

    /// Cross-field checks that the plot buffer cannot see on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plot_channels.len() != self.plot.channel_count {
            return Err(ConfigError::ChannelMismatch {
                configured: self.plot.channel_count,
                selected: self.plot_channels.len(),
            });
        }
        Ok(())
    }

    /// Update interval with sub-second precision.
    pub fn update_interval(&self) -> Duration {
        let millis = if self.update_interval_secs.is_finite() && self.update_interval_secs > 0.0 {
            (self.update_interval_secs * 1000.0) as u64
        } else {
            0
        };
        Duration::millis(millis)
    }

    /// Fixed at [`CALIBRATION_INTERVAL_SECS`]; not part of the stored blob.
    pub fn calibration_interval(&self) -> Duration {
        Duration::secs(u64::from(CALIBRATION_INTERVAL_SECS))
    }
}

/// Geometry, palette and value range of the scrolling plot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub channel_count: usize,
    /// One 0xRRGGBB color per channel.
    pub colors: Vec<u32>,
    pub background: u32,
    pub value_min: f32,
    pub value_max: f32,
    pub width: u16,
    /// Height of the plot area, excluding `top_offset`.
    pub height: u16,
    /// Rows reserved above the plot on the physical panel.
    pub top_offset: u16,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            channel_count: 3,
            colors: vec![0x00FFFF, 0xFFCF00, 0xFF6464],
            background: 0x000000,
            value_min: 0.0,
            value_max: 70.0,
            width: 160,
            height: 80,
            top_offset: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct NetworkConfig<'a> {
    pub enabled: bool,
    pub broker: &'a str,
    pub port: u16,
}

impl Default for NetworkConfig<'_> {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: "homeassistant.local",
            port: 1883,
        }
    }
}

/// Reading field plotted on one channel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotChannel {
    Temperature,
    Humidity,
    Pressure,
    Pm1,
    Pm2_5,
    Pm10,
    Eco2,
    Tvoc,
    Light,
    Oxidising,
    Reducing,
    Nh3,
}

impl PlotChannel {
    pub fn value(self, reading: &SensorReading) -> f32 {
        match self {
            PlotChannel::Temperature => reading.temperature,
            PlotChannel::Humidity => reading.humidity,
            PlotChannel::Pressure => reading.pressure,
            PlotChannel::Pm1 => reading.pm1,
            PlotChannel::Pm2_5 => reading.pm2_5,
            PlotChannel::Pm10 => reading.pm10,
            PlotChannel::Eco2 => f32::from(reading.eco2),
            PlotChannel::Tvoc => f32::from(reading.tvoc),
            PlotChannel::Light => reading.light,
            PlotChannel::Oxidising => reading.oxidising,
            PlotChannel::Reducing => reading.reducing,
            PlotChannel::Nh3 => reading.nh3,
        }
    }
}
