//! Orchestrator wiring committed readings to the LED, the plot and MQTT.
//!
//! Consumers run in a fixed order and are isolated from each other: a failing
//! LED never keeps the plot from updating, and a dead broker never blanks the
//! display.

use alloc::vec::Vec;

use log::{info, warn};
use thiserror_no_std::Error;

use crate::air_quality::{AirQualityIndicator, LedError, RgbLed};
use crate::config::{ConfigError, PlotChannel, StationConfig};
use crate::plot::{MAX_CHANNELS, PlotBuffer, PlotDisplay, PlotError, PlotRenderer};
use crate::poller::UpdateListener;
use crate::publisher::{Publisher, Transport, TransportError};
use crate::sensors::SensorReading;

/// Number of consumers fed on every update.
const CONSUMERS: usize = 3;

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Configuration error: {0}")]
    Config(ConfigError),
    #[error("Air quality LED error: {0}")]
    Indicator(LedError),
    #[error("Plot error: {0}")]
    Plot(PlotError),
    #[error("Publish error: {0}")]
    Publish(TransportError),
}

impl From<ConfigError> for StationError {
    fn from(e: ConfigError) -> Self {
        StationError::Config(e)
    }
}

impl From<LedError> for StationError {
    fn from(e: LedError) -> Self {
        StationError::Indicator(e)
    }
}

impl From<PlotError> for StationError {
    fn from(e: PlotError) -> Self {
        StationError::Plot(e)
    }
}

impl From<TransportError> for StationError {
    fn from(e: TransportError) -> Self {
        StationError::Publish(e)
    }
}

pub struct Station<L, D, T> {
    indicator: AirQualityIndicator<L>,
    plot: PlotBuffer,
    renderer: PlotRenderer<D>,
    plot_channels: Vec<PlotChannel>,
    publisher: Option<Publisher<T>>,
    last_errors: heapless::Vec<StationError, CONSUMERS>,
    updates: u32,
}

impl<L, D, T> Station<L, D, T>
where
    L: RgbLed,
    D: PlotDisplay,
    T: Transport,
{
    /// Assemble a station from already-configured parts.
    ///
    /// `plot` must come from `config.plot`; `display` is usually a
    /// `PaletteFrameBuffer` sized from it. Pass `None` as the publisher to run
    /// offline.
    pub fn new(
        config: &StationConfig<'_>,
        plot: PlotBuffer,
        display: D,
        led: L,
        publisher: Option<Publisher<T>>,
    ) -> Result<Self, StationError> {
        config.validate()?;
        let indicator = AirQualityIndicator::new(led, config.led_brightness)?;

        info!(
            "Station {} ready ({} plot channels, publishing {})",
            config.device_name,
            config.plot_channels.len(),
            if publisher.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            indicator,
            plot,
            renderer: PlotRenderer::new(display),
            plot_channels: config.plot_channels.clone(),
            publisher,
            last_errors: heapless::Vec::new(),
            updates: 0,
        })
    }

    /// Feed one committed reading to every consumer.
    ///
    /// Returns the number of consumers that failed; details are logged and
    /// kept in [`Station::last_errors`] until the next update.
    pub fn handle(&mut self, reading: &SensorReading) -> usize {
        self.last_errors.clear();
        self.updates = self.updates.wrapping_add(1);

        if let Err(e) = self.indicator.show(reading) {
            warn!("Air quality LED not updated: {}", e);
            self.record(e.into());
        }

        if let Err(e) = self.update_display(reading) {
            warn!("Display not updated: {}", e);
            self.record(e.into());
        }

        let published = match self.publisher.as_mut() {
            Some(publisher) => publisher.connect_and_send(Some(reading)),
            None => Ok(()),
        };
        if let Err(e) = published {
            warn!("Reading not published: {}", e);
            self.record(e.into());
        }

        self.last_errors.len()
    }

    /// Redraw the whole plot from history.
    pub fn refresh_display(&mut self) -> Result<(), StationError> {
        self.renderer.render(&mut self.plot, true)?;
        Ok(())
    }

    pub fn last_errors(&self) -> &[StationError] {
        &self.last_errors
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }

    pub fn plot(&self) -> &PlotBuffer {
        &self.plot
    }

    pub fn display(&self) -> &D {
        self.renderer.display()
    }

    pub fn led(&self) -> &L {
        self.indicator.led()
    }

    pub fn publisher(&self) -> Option<&Publisher<T>> {
        self.publisher.as_ref()
    }

    /// Hand back the display, e.g. to save a snapshot on the host.
    pub fn into_display(self) -> D {
        self.renderer.into_inner()
    }

    fn update_display(&mut self, reading: &SensorReading) -> Result<(), PlotError> {
        let mut values = [0.0f32; MAX_CHANNELS];
        let count = self.plot_channels.len().min(MAX_CHANNELS);
        for (slot, channel) in values.iter_mut().zip(self.plot_channels.iter()) {
            *slot = channel.value(reading);
        }
        self.plot.push_sample(&values[..count])?;
        self.renderer.render(&mut self.plot, false)
    }

    fn record(&mut self, error: StationError) {
        let _ = self.last_errors.push(error);
    }
}

impl<L, D, T> UpdateListener for Station<L, D, T>
where
    L: RgbLed,
    D: PlotDisplay,
    T: Transport,
{
    fn on_update(&mut self, reading: &SensorReading) {
        self.handle(reading);
    }
}
