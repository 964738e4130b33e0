use log::debug;

use super::{BACKGROUND_INDEX, PlotBuffer, PlotResult};

/// Indexed-color surface the plot is drawn onto.
pub trait PlotDisplay {
    /// Stage one pixel. Coordinates are relative to the plot area.
    fn set_pixel(&mut self, x: u16, y: u16, index: u8) -> PlotResult<()>;

    /// Make every staged pixel visible.
    fn present(&mut self) -> PlotResult<()>;
}

impl<T: PlotDisplay + ?Sized> PlotDisplay for &mut T {
    fn set_pixel(&mut self, x: u16, y: u16, index: u8) -> PlotResult<()> {
        (**self).set_pixel(x, y, index)
    }

    fn present(&mut self) -> PlotResult<()> {
        (**self).present()
    }
}

/// Drives a [`PlotDisplay`] from a [`PlotBuffer`].
pub struct PlotRenderer<D> {
    display: D,
}

impl<D: PlotDisplay> PlotRenderer<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }

    /// Compute the next frame from `buffer` and send it to the display.
    pub fn render(&mut self, buffer: &mut PlotBuffer, full_refresh: bool) -> PlotResult<()> {
        let delta = buffer.compute_frame_delta(full_refresh)?;

        if delta.cleared {
            debug!("Clearing {}x{} plot area", buffer.width(), buffer.height());
            for y in 0..buffer.height() {
                for x in 0..buffer.width() {
                    self.display.set_pixel(x, y, BACKGROUND_INDEX)?;
                }
            }
        }

        for write in &delta.writes {
            self.display.set_pixel(write.x, write.y, write.index)?;
        }

        self.display.present()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn into_inner(self) -> D {
        self.display
    }
}
