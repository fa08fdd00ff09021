// Per-frame orchestration: animation tick, grid cache, parallel shading.

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::animation::{AnimationController, ControlInput, EyeState};
use crate::color;
use crate::font;
use crate::grid::{CachedGrid, DecimationFactor, GridKey, SampleGrid};
use crate::pattern::{GlobePattern, HarmonicPattern, PatternSynthesizer};
use crate::projection::{Direction, ProjectionMode, Projector, Viewport};

/// What gets painted onto the dome.
pub enum Content {
    Eyeball(PatternSynthesizer),
    Harmonics(HarmonicPattern),
    Globe(GlobePattern),
}

impl Content {
    fn background(&self) -> [u8; 4] {
        match self {
            Content::Eyeball(synth) => color::opaque(synth.palette().background),
            Content::Harmonics(_) | Content::Globe(_) => [0, 0, 0, 255],
        }
    }

    /// The eyeball is shaded in the frame of the projection kind, so it stays
    /// centered on the reference axis whichever kind is active.
    fn color(&self, direction: Direction, mode: &ProjectionMode, eye: &EyeState, time: f64) -> [u8; 4] {
        match self {
            Content::Eyeball(synth) => synth.color(mode.kind_frame(direction), eye),
            Content::Harmonics(h) => h.color(direction, time),
            Content::Globe(g) => g.color(direction, time),
        }
    }

    fn label(&self) -> String {
        match self {
            Content::Eyeball(_) => "eye".to_string(),
            Content::Harmonics(h) => h.label(),
            Content::Globe(_) => "globe".to_string(),
        }
    }
}

pub struct FrameRenderer<R: Rng> {
    animation: AnimationController<R>,
    content: Content,
    projector: Projector,
    viewport: Viewport,
    mode: ProjectionMode,
    decimation: DecimationFactor,
    grid: Option<CachedGrid>,
    /// One shaded color per grid cell, reused between frames.
    cells: Vec<[u8; 4]>,
    buffer: Vec<u8>,
    last_elapsed: Option<f64>,
    hud: bool,
    fps: f64,
}

impl<R: Rng> FrameRenderer<R> {
    pub fn new(content: Content, animation: AnimationController<R>, viewport: Viewport, projector: Projector) -> Self {
        Self {
            animation,
            content,
            projector,
            viewport,
            mode: ProjectionMode::polar(),
            decimation: DecimationFactor::FULL,
            grid: None,
            cells: Vec::new(),
            buffer: vec![0; viewport.width * viewport.height * 4],
            last_elapsed: None,
            hud: false,
            fps: 0.0,
        }
    }

    pub fn with_mode(mut self, mode: ProjectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hud(mut self, hud: bool) -> Self {
        self.hud = hud;
        self
    }

    pub fn decimation(&self) -> DecimationFactor {
        self.decimation
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    #[cfg(test)]
    pub fn grid(&self) -> Option<&CachedGrid> {
        self.grid.as_ref()
    }

    pub fn eye_state(&self) -> EyeState {
        self.animation.state()
    }

    pub fn apply(&mut self, input: ControlInput) {
        self.animation.apply(input);
    }

    pub fn set_decimation(&mut self, decimation: DecimationFactor) {
        self.decimation = decimation;
    }

    pub fn cycle_decimation(&mut self) -> DecimationFactor {
        self.decimation = self.decimation.cycle();
        self.decimation
    }

    pub fn toggle_projection(&mut self) {
        self.mode.kind = self.mode.kind.toggle();
    }

    pub fn toggle_hud(&mut self) {
        self.hud = !self.hud;
    }

    /// Frames-per-second figure shown in the HUD.
    pub fn set_fps(&mut self, fps: f64) {
        self.fps = fps;
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) == (self.viewport.width, self.viewport.height) {
            return;
        }
        self.viewport.width = width;
        self.viewport.height = height;
        self.buffer = vec![0; width * height * 4];
    }

    fn key(&self) -> GridKey {
        GridKey {
            viewport: self.viewport,
            mode: self.mode,
            decimation: self.decimation,
            projector: self.projector,
        }
    }

    /// Render the frame at `elapsed` seconds since start and return the RGBA
    /// buffer (`width * height * 4` bytes).
    pub fn render_frame(&mut self, elapsed: f64) -> &[u8] {
        let dt = self.last_elapsed.map_or(0.0, |prev| elapsed - prev);
        self.last_elapsed = Some(elapsed);
        self.animation.tick(dt);

        let key = self.key();
        if !self.grid.as_ref().is_some_and(|g| g.matches(&key)) {
            let grid = SampleGrid::build(key);
            let built = grid.key();
            debug!(
                "grid rebuilt: {}x{} cells (k={}, {}, {}x{})",
                grid.cols(),
                grid.rows(),
                built.decimation.get(),
                built.mode.kind.label(),
                built.viewport.width,
                built.viewport.height,
            );
            self.grid = Some(grid);
        }
        let Some(grid) = self.grid.as_ref() else {
            return &self.buffer;
        };

        let eye = self.eye_state();
        let time = self.animation.now();
        let background = self.content.background();
        let content = &self.content;
        let mode = self.mode;
        let cols = grid.cols();

        self.cells.clear();
        self.cells.resize(cols * grid.rows(), background);
        self.cells
            .par_chunks_mut(cols)
            .zip(grid.cells().par_chunks(cols))
            .for_each(|(out, row)| {
                for (px, cell) in out.iter_mut().zip(row) {
                    if cell.valid {
                        *px = content.color(cell.direction, &mode, &eye, time);
                    }
                }
            });

        let width = self.viewport.width;
        let cells = &self.cells;
        self.buffer
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(py, line)| {
                for (px, dst) in line.chunks_exact_mut(4).enumerate() {
                    dst.copy_from_slice(&cells[grid.index_of(px, py)]);
                }
            });

        if self.hud {
            let text = self.hud_text(&eye);
            font::draw_hud(&mut self.buffer, width, self.viewport.height, &text);
        }
        &self.buffer
    }

    fn hud_text(&self, eye: &EyeState) -> String {
        format!(
            "{} {} pupil {:.2} lid {:.2} k={} {:.0}fps",
            self.content.label(),
            self.mode.kind.label(),
            eye.pupil,
            eye.aperture,
            self.decimation.get(),
            self.fps,
        )
    }
}
