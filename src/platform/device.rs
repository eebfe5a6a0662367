/// Device metrics that decide raster density and delivery

/// Viewports at or below this width count as constrained.
pub const CONSTRAINED_VIEWPORT_WIDTH: u32 = 768;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetrics {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
    pub touch: bool,
}

impl Default for DeviceMetrics {
    fn default() -> Self {
        Self::desktop()
    }
}

impl DeviceMetrics {
    pub fn desktop() -> Self {
        DeviceMetrics {
            width: 1280,
            height: 720,
            dpr: 1.0,
            touch: false,
        }
    }

    pub fn mobile() -> Self {
        DeviceMetrics {
            width: 390,
            height: 844,
            dpr: 3.0,
            touch: true,
        }
    }

    /// Small or touch-first viewport (phones, most tablets).
    pub fn is_constrained(&self) -> bool {
        self.width <= CONSTRAINED_VIEWPORT_WIDTH || self.touch
    }

    /// Pixel ratio used when rasterizing: the device ratio, or 1 on
    /// constrained devices to keep canvases within mobile memory limits.
    pub fn raster_dpr(&self) -> f32 {
        if self.is_constrained() || !(self.dpr > 0.0) {
            1.0
        } else {
            self.dpr
        }
    }
}
