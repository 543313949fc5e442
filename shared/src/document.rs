use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_ZOOM_PERCENT: u16 = 100;
pub const MAX_ZOOM_PERCENT: u16 = 300;
pub const ZOOM_STEP_PERCENT: u16 = 25;

/// Loading flag and zoom for the embedded document viewer.
///
/// Each `open` starts a new generation so the fallback timeout of a previous
/// document cannot clear the loading flag of the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentViewer {
    loading: bool,
    zoom_percent: u16,
    #[serde(skip)]
    generation: u64,
}

impl Default for DocumentViewer {
    fn default() -> Self {
        Self {
            loading: false,
            zoom_percent: MIN_ZOOM_PERCENT,
            generation: 0,
        }
    }
}

impl DocumentViewer {
    /// Returns the generation to pass back with the timeout.
    pub fn open(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.zoom_percent = MIN_ZOOM_PERCENT;
        self.generation
    }

    pub fn loaded(&mut self) {
        self.loading = false;
    }

    pub fn timed_out(&mut self, generation: u64) {
        if generation == self.generation && self.loading {
            debug!(generation, "document load timed out, hiding loader");
            self.loading = false;
        }
    }

    pub fn zoom_in(&mut self) {
        self.zoom_percent = (self.zoom_percent + ZOOM_STEP_PERCENT).min(MAX_ZOOM_PERCENT);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_percent = self
            .zoom_percent
            .saturating_sub(ZOOM_STEP_PERCENT)
            .max(MIN_ZOOM_PERCENT);
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn zoom_percent(&self) -> u16 {
        self.zoom_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped() {
        let mut viewer = DocumentViewer::default();
        viewer.zoom_out();
        assert_eq!(viewer.zoom_percent(), 100);
        for _ in 0..20 {
            viewer.zoom_in();
        }
        assert_eq!(viewer.zoom_percent(), 300);
        viewer.zoom_out();
        assert_eq!(viewer.zoom_percent(), 275);
    }

    #[test]
    fn stale_timeout_does_not_clear_newer_load() {
        let mut viewer = DocumentViewer::default();
        let first = viewer.open();
        let _second = viewer.open();
        viewer.timed_out(first);
        assert!(viewer.is_loading());
    }

    #[test]
    fn timeout_clears_a_stalled_loader() {
        let mut viewer = DocumentViewer::default();
        let generation = viewer.open();
        viewer.timed_out(generation);
        assert!(!viewer.is_loading());
    }
}
