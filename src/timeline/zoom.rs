/// Pixels per day at each zoom stop
pub const ZOOM_STOPS: [f64; 10] = [2.0, 4.0, 6.0, 8.0, 12.0, 16.0, 24.0, 32.0, 48.0, 64.0];

/// An index into `ZOOM_STOPS`, always in range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Zoom(usize);

impl Default for Zoom {
    fn default() -> Self {
        Zoom(5)
    }
}

impl Zoom {
    pub fn new(index: usize) -> Self {
        Zoom(index.min(ZOOM_STOPS.len() - 1))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn pixels_per_day(self) -> f64 {
        ZOOM_STOPS[self.0]
    }

    /// Move by a signed number of stops, clamped to the list
    pub fn step(self, stops: i64) -> Zoom {
        let target = (self.0 as i64 + stops).clamp(0, ZOOM_STOPS.len() as i64 - 1);
        Zoom(target as usize)
    }
}

/// Coalesces recompute requests so at most one runs per animation frame
#[derive(Debug, Clone, Default)]
pub struct FrameGate {
    pending: bool,
    requested: u64,
    ran: u64,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a recompute. Returns true if this request scheduled a frame,
    /// false if one was already pending.
    pub fn request(&mut self) -> bool {
        self.requested += 1;
        !std::mem::replace(&mut self.pending, true)
    }

    /// Called once per animation frame; true when the caller should recompute
    pub fn on_frame(&mut self) -> bool {
        if std::mem::take(&mut self.pending) {
            self.ran += 1;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Requests received and recomputes actually run, for diagnostics
    pub fn counts(&self) -> (u64, u64) {
        (self.requested, self.ran)
    }
}

/// Zoom driven by a horizontal drag: every `pixels_per_stop` of travel
/// moves one zoom stop, and geometry is recomputed through a `FrameGate`.
#[derive(Debug, Clone)]
pub struct ZoomDrag {
    origin_x: f64,
    origin: Zoom,
    target: Zoom,
    applied: Zoom,
    pixels_per_stop: f64,
    gate: FrameGate,
}

impl ZoomDrag {
    pub fn begin(x: f64, zoom: Zoom, pixels_per_stop: f64) -> Self {
        ZoomDrag {
            origin_x: x,
            origin: zoom,
            target: zoom,
            applied: zoom,
            pixels_per_stop: pixels_per_stop.max(1.0),
            gate: FrameGate::new(),
        }
    }

    pub fn pointer_move(&mut self, x: f64) {
        let stops = ((x - self.origin_x) / self.pixels_per_stop).trunc() as i64;
        let target = self.origin.step(stops);
        if target != self.target {
            self.target = target;
            self.gate.request();
        }
    }

    /// The zoom to recompute geometry at, if it changed since the last frame
    pub fn on_frame(&mut self) -> Option<Zoom> {
        if !self.gate.on_frame() || self.target == self.applied {
            return None;
        }
        self.applied = self.target;
        Some(self.applied)
    }

    pub fn finish(self) -> Zoom {
        self.target
    }

    pub fn gate(&self) -> &FrameGate {
        &self.gate
    }
}
