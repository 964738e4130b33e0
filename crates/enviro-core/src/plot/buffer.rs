use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::Rgb888;
use log::{debug, info};
use micromath::F32Ext;

use super::{BACKGROUND_INDEX, MAX_CHANNELS, PlotError, PlotResult};
use crate::config::PlotConfig;

/// One pushed sample: up to [`MAX_CHANNELS`] clamped values.
type Sample = heapless::Vec<f32, MAX_CHANNELS>;

/// Set pixel `(x, y)` of the plot grid to palette entry `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWrite {
    pub x: u16,
    pub y: u16,
    pub index: u8,
}

/// Pixel changes needed to bring the display up to date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameDelta {
    /// Every pixel goes back to the background before `writes` apply.
    pub cleared: bool,
    pub writes: Vec<PixelWrite>,
}

/// Bounded sample history plus the indexed grid it is drawn into.
///
/// History grows by one entry per push and is capped at `width + 1`
/// entries; the extra entry is what lets a scroll frame compare every column
/// against what the panel currently shows.
#[derive(Debug, Clone)]
pub struct PlotBuffer {
    channel_count: usize,
    palette: Vec<Rgb888>,
    value_min: f32,
    value_max: f32,
    width: u16,
    height: u16,
    history: VecDeque<Sample>,
    /// History as drawn on the panel, captured before the push that scrolls.
    previous_frame: Vec<Sample>,
    grid: Vec<u8>,
}

impl PlotBuffer {
    /// Validate `config` and allocate the palette and pixel grid.
    pub fn configure(config: &PlotConfig) -> PlotResult<Self> {
        if config.channel_count == 0 {
            return Err(PlotError::Config {
                details: "at least one channel is required",
            });
        }
        if config.channel_count > MAX_CHANNELS {
            return Err(PlotError::Config {
                details: "too many channels",
            });
        }
        if config.channel_count > config.colors.len() {
            return Err(PlotError::Config {
                details: "more channels than palette colors",
            });
        }
        // Written this way round so NaN bounds are rejected too.
        if !(config.value_min < config.value_max) {
            return Err(PlotError::Config {
                details: "value_min must be below value_max",
            });
        }
        if config.width == 0 || config.height == 0 {
            return Err(PlotError::Config {
                details: "plot area is empty",
            });
        }

        let palette = core::iter::once(config.background)
            .chain(config.colors[..config.channel_count].iter().copied())
            .map(rgb888_from_u32)
            .collect();

        info!(
            "Plot configured: {} channels, {}x{} px, range {}..{}",
            config.channel_count, config.width, config.height, config.value_min, config.value_max
        );

        Ok(Self {
            channel_count: config.channel_count,
            palette,
            value_min: config.value_min,
            value_max: config.value_max,
            width: config.width,
            height: config.height,
            history: VecDeque::with_capacity(config.width as usize + 1),
            previous_frame: Vec::with_capacity(config.width as usize),
            grid: vec![BACKGROUND_INDEX; config.width as usize * config.height as usize],
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Background first, then one color per channel.
    pub fn palette(&self) -> &[Rgb888] {
        &self.palette
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Most recently pushed sample, after clamping.
    pub fn latest(&self) -> Option<&[f32]> {
        self.history.back().map(|sample| sample.as_slice())
    }

    /// Palette index currently stored at `(x, y)`.
    pub fn pixel(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.grid
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Append one sample vector, clamping each value into the plot range.
    ///
    /// Passing fewer values than channels is allowed; the missing channels are
    /// simply not drawn for that column.
    pub fn push_sample(&mut self, values: &[f32]) -> PlotResult<()> {
        if values.len() > self.channel_count {
            return Err(PlotError::Range {
                given: values.len(),
                channels: self.channel_count,
            });
        }

        let mut sample = Sample::new();
        for &value in values {
            // max/min rather than clamp: NaN collapses to value_min.
            let clamped = value.max(self.value_min).min(self.value_max);
            if sample.push(clamped).is_err() {
                return Err(PlotError::Range {
                    given: values.len(),
                    channels: MAX_CHANNELS,
                });
            }
        }

        let width = self.width as usize;
        if self.history.len() <= width {
            self.previous_frame.clear();
            self.previous_frame.extend(self.history.iter().cloned());
        }

        self.history.push_back(sample);
        while self.history.len() > width + 1 {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Work out the pixel writes for the next frame and apply them to the grid.
    ///
    /// Until the history exceeds the plot width only the newest column is
    /// drawn. Once it scrolls, every column is compared with what the panel
    /// shows and only the pixels that moved are rewritten. `full_refresh`
    /// clears the grid and redraws everything.
    pub fn compute_frame_delta(&mut self, full_refresh: bool) -> PlotResult<FrameDelta> {
        if self.history.is_empty() {
            return Err(PlotError::EmptyBuffer);
        }

        let width = self.width as usize;
        let delta = if full_refresh {
            self.trim_to_width();
            self.full_delta()
        } else if self.history.len() > width {
            self.trim_to_width();
            self.scroll_delta()
        } else {
            self.incremental_delta()
        };

        debug!(
            "Plot frame: {} writes{}",
            delta.writes.len(),
            if delta.cleared { " after clear" } else { "" }
        );

        self.apply(&delta);
        Ok(delta)
    }

    fn trim_to_width(&mut self) {
        while self.history.len() > self.width as usize {
            self.history.pop_front();
        }
    }

    fn incremental_delta(&self) -> FrameDelta {
        let mut writes = Vec::new();
        if let Some(sample) = self.history.back() {
            let x = (self.history.len() - 1) as u16;
            for (channel, &value) in sample.iter().enumerate() {
                writes.push(PixelWrite {
                    x,
                    y: self.y_for(value),
                    index: channel as u8 + 1,
                });
            }
        }
        FrameDelta {
            cleared: false,
            writes,
        }
    }

    fn scroll_delta(&self) -> FrameDelta {
        let mut writes = Vec::new();

        for (x, (new, old)) in self.history.iter().zip(self.previous_frame.iter()).enumerate() {
            let x = x as u16;
            let old_ys = self.column_ys(old);
            let new_ys = self.column_ys(new);

            // Rows a moved channel leaves or enters.
            let mut touched: heapless::Vec<u16, { 2 * MAX_CHANNELS }> = heapless::Vec::new();
            for channel in 0..MAX_CHANNELS {
                if old_ys[channel] == new_ys[channel] {
                    continue;
                }
                for y in [old_ys[channel], new_ys[channel]].into_iter().flatten() {
                    if !touched.contains(&y) {
                        let _ = touched.push(y);
                    }
                }
            }

            // One write per touched row, carrying whatever a full redraw would
            // leave there. Rows that end up unchanged are skipped.
            for &y in &touched {
                let shown = top_index_at(&old_ys, y);
                let wanted = top_index_at(&new_ys, y);
                if shown != wanted {
                    writes.push(PixelWrite {
                        x,
                        y,
                        index: wanted,
                    });
                }
            }
        }

        FrameDelta {
            cleared: false,
            writes,
        }
    }

    fn full_delta(&self) -> FrameDelta {
        let mut writes = Vec::with_capacity(self.history.len() * self.channel_count);
        for (x, sample) in self.history.iter().enumerate() {
            for (channel, &value) in sample.iter().enumerate() {
                writes.push(PixelWrite {
                    x: x as u16,
                    y: self.y_for(value),
                    index: channel as u8 + 1,
                });
            }
        }
        FrameDelta {
            cleared: true,
            writes,
        }
    }

    fn apply(&mut self, delta: &FrameDelta) {
        if delta.cleared {
            self.grid.fill(BACKGROUND_INDEX);
        }
        let width = self.width as usize;
        for write in &delta.writes {
            if let Some(pixel) = self
                .grid
                .get_mut(write.y as usize * width + write.x as usize)
            {
                *pixel = write.index;
            }
        }
    }

    fn column_ys(&self, sample: &Sample) -> [Option<u16>; MAX_CHANNELS] {
        let mut ys = [None; MAX_CHANNELS];
        for (slot, &value) in ys.iter_mut().zip(sample.iter()) {
            *slot = Some(self.y_for(value));
        }
        ys
    }

    /// Row for `value`; larger values plot higher.
    fn y_for(&self, value: f32) -> u16 {
        let bottom = (self.height - 1) as f32;
        let y = F32Ext::round(remap(value, self.value_min, self.value_max, bottom, 0.0));
        y.max(0.0).min(bottom) as u16
    }
}

/// Palette index a column shows at row `y`: the highest channel drawn
/// there, or the background.
fn top_index_at(ys: &[Option<u16>; MAX_CHANNELS], y: u16) -> u8 {
    ys.iter()
        .rposition(|row| *row == Some(y))
        .map_or(BACKGROUND_INDEX, |channel| channel as u8 + 1)
}

/// Linear map of `value` from `[old_min, old_max]` onto `[new_min, new_max]`.
///
/// A degenerate source range maps everything to `new_min`.
pub fn remap(value: f32, old_min: f32, old_max: f32, new_min: f32, new_max: f32) -> f32 {
    let span = old_max - old_min;
    if span == 0.0 {
        return new_min;
    }
    ((value - old_min) * (new_max - new_min)) / span + new_min
}

fn rgb888_from_u32(color: u32) -> Rgb888 {
    Rgb888::new((color >> 16) as u8, (color >> 8) as u8, color as u8)
}
