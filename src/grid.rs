// Reduced-resolution cache of pixel -> direction lookups.
//
// Built once per (viewport, mode, decimation) and reused every frame, so the
// per-frame loop pays no trigonometry for the projection itself.

use crate::error::{Error, Result};
use crate::projection::{Direction, ProjectionMode, Projector, Viewport};

/// Side length of the pixel block that shares one sampled direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimationFactor(usize);

impl DecimationFactor {
    pub const FULL: DecimationFactor = DecimationFactor(1);

    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::invalid("decimation must be >= 1, got 0"));
        }
        Ok(Self(k))
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Next quality step for the runtime toggle: 1 -> 2 -> 4 -> 8 -> 1.
    pub fn cycle(self) -> Self {
        match self.0 {
            1 => Self(2),
            2 | 3 => Self(4),
            4..=7 => Self(8),
            _ => Self(1),
        }
    }
}

/// Parameters a grid was built for. Any change forces a rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridKey {
    pub viewport: Viewport,
    pub mode: ProjectionMode,
    pub decimation: DecimationFactor,
    pub projector: Projector,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    pub direction: Direction,
    pub valid: bool,
}

pub struct CachedGrid {
    key: GridKey,
    cols: usize,
    rows: usize,
    cells: Vec<GridCell>,
}

impl CachedGrid {
    pub fn key(&self) -> &GridKey {
        &self.key
    }

    pub fn matches(&self, key: &GridKey) -> bool {
        self.key == *key
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Index into `cells()` of the block covering full-resolution pixel `(px, py)`.
    pub fn index_of(&self, px: usize, py: usize) -> usize {
        let k = self.key.decimation.get();
        let cx = (px / k).min(self.cols - 1);
        let cy = (py / k).min(self.rows - 1);
        cy * self.cols + cx
    }

    /// Cached direction for full-resolution pixel `(px, py)`.
    #[cfg(test)]
    pub fn sample(&self, px: usize, py: usize) -> (Direction, bool) {
        let c = self.cells[self.index_of(px, py)];
        (c.direction, c.valid)
    }
}

pub struct SampleGrid;

impl SampleGrid {
    pub fn build(key: GridKey) -> CachedGrid {
        let k = key.decimation.get();
        let (w, h) = (key.viewport.width, key.viewport.height);
        let cols = w.div_ceil(k).max(1);
        let rows = h.div_ceil(k).max(1);

        let mut cells = Vec::with_capacity(cols * rows);
        for cy in 0..rows {
            let y0 = cy * k;
            let y1 = (y0 + k).min(h.max(1));
            let py = (y0 + y1) as f64 / 2.0;
            for cx in 0..cols {
                let x0 = cx * k;
                let x1 = (x0 + k).min(w.max(1));
                let px = (x0 + x1) as f64 / 2.0;

                let point = key.viewport.from_pixel(px, py);
                let direction = key.projector.unproject(point, &key.mode);
                cells.push(GridCell { direction, valid: point.valid });
            }
        }

        CachedGrid { key, cols, rows, cells }
    }
}
