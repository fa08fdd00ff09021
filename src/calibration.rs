// Offline calibration charts for lining the projector up with the dome.
//
// Two wireframes are drawn straight through `Projector` (no sample grid, no
// animation): a polar chart with equal-angle rings around the pole and a
// standard chart with latitude/longitude lines and the pole at the top.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::font;
use crate::projection::{Direction, ProjectionMode, Projector, Viewport};
use crate::raster::{self, Canvas};

pub const POLAR_FILE: &str = "polar_view_wireframe.png";
pub const STANDARD_FILE: &str = "standard_view_wireframe.png";
pub const SIDECAR_FILE: &str = "calibration.yaml";

const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];
const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const GRAY: [u8; 3] = [128, 128, 128];

const CROSSHAIR_HALF: f64 = 20.0;
const RING_POINTS: usize = 360;
const MERIDIAN_POINTS: usize = 180;

/// Playback hints written next to the charts.
#[derive(Debug, Serialize)]
struct PlaybackHint<'a> {
    width: usize,
    height: usize,
    margin: f64,
    scale_x: f64,
    scale_y: f64,
    aspect_override: &'a str,
    polar: &'a str,
    standard: &'a str,
}

pub struct CalibrationGridGenerator {
    config: CalibrationConfig,
    projector: Projector,
    viewport: Viewport,
}

impl CalibrationGridGenerator {
    pub fn new(config: CalibrationConfig, projector: Projector) -> Self {
        let viewport = Viewport::new(config.width, config.height).with_margin(config.margin, config.scale_x, config.scale_y);
        Self { config, projector, viewport }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Azimuth rings every 15 degrees around the pole (45 in red), meridians
    /// every 30 degrees (prime meridian in green), ring labels and a crosshair.
    pub fn polar(&self) -> Canvas {
        let mode = ProjectionMode::polar();
        let mut canvas = Canvas::new(self.config.width, self.config.height, BLACK);

        let rings: Vec<u32> = (15..=90).step_by(15).collect();
        for &deg in &rings {
            let theta = (deg as f64).to_radians();
            let ring = (0..=RING_POINTS).map(|i| Direction::from_spherical(theta, 2.0 * PI * i as f64 / RING_POINTS as f64 - PI));
            self.trace(&mut canvas, &mode, ring, if deg == 45 { RED } else { GRAY });
        }
        self.meridians(&mut canvas, &mode);

        let scale = self.label_scale();
        for &deg in &rings {
            let edge = self.projector.project(Direction::from_spherical((deg as f64).to_radians(), 0.0), &mode);
            let (x, y) = self.viewport.to_pixel(edge);
            let label = deg.to_string();
            let top = y - 4.0 - (font::FONT_HEIGHT * scale) as f64;
            let left = x - (font::text_width(&label, scale) / 2) as f64;
            if top >= 0.0 && left >= 0.0 {
                font::draw_text(&mut canvas.pixels, canvas.width, left as usize, top as usize, &label, WHITE, scale);
            }
        }

        self.crosshair(&mut canvas);
        canvas
    }

    /// Latitudes every 20 degrees from -80 to 80 (equator in red), meridians
    /// every 30 degrees, and a crosshair.
    pub fn standard(&self) -> Canvas {
        let mode = ProjectionMode::standard();
        let mut canvas = Canvas::new(self.config.width, self.config.height, BLACK);

        for lat in (-80..=80).step_by(20) {
            let theta = (90.0 - lat as f64).to_radians();
            let line = (0..=RING_POINTS).map(|i| Direction::from_spherical(theta, 2.0 * PI * i as f64 / RING_POINTS as f64 - PI));
            self.trace(&mut canvas, &mode, line, if lat == 0 { RED } else { GRAY });
        }
        self.meridians(&mut canvas, &mode);

        self.crosshair(&mut canvas);
        canvas
    }

    /// Write both charts and the sidecar into `dir`, creating it if needed.
    pub fn write_artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(3);

        for (name, canvas) in [(POLAR_FILE, self.polar()), (STANDARD_FILE, self.standard())] {
            let path = dir.join(name);
            raster::write_png(&path, &canvas.pixels, canvas.width, canvas.height)?;
            info!("wrote {}", path.display());
            written.push(path);
        }

        let hint = PlaybackHint {
            width: self.config.width,
            height: self.config.height,
            margin: self.config.margin,
            scale_x: self.config.scale_x,
            scale_y: self.config.scale_y,
            aspect_override: &self.config.aspect_override,
            polar: POLAR_FILE,
            standard: STANDARD_FILE,
        };
        let yaml = serde_yaml::to_string(&hint).map_err(|e| Error::invalid(format!("sidecar: {e}")))?;
        let path = dir.join(SIDECAR_FILE);
        fs::write(&path, yaml)?;
        info!("wrote {}", path.display());
        written.push(path);

        Ok(written)
    }

    fn meridians(&self, canvas: &mut Canvas, mode: &ProjectionMode) {
        for lon in (-180..180).step_by(30) {
            let phi = (lon as f64).to_radians();
            let line = (0..=MERIDIAN_POINTS).map(|i| Direction::from_spherical(PI * i as f64 / MERIDIAN_POINTS as f64, phi));
            self.trace(canvas, mode, line, if lon == 0 { GREEN } else { GRAY });
        }
    }

    /// Project a densely sampled curve and draw its visible stretches.
    fn trace(&self, canvas: &mut Canvas, mode: &ProjectionMode, curve: impl Iterator<Item = Direction>, color: [u8; 3]) {
        let (rx, ry) = self.viewport.radii();
        let max_jump = rx.max(ry) * 0.25;
        let width = self.config.line_width;
        let flush = |canvas: &mut Canvas, run: &mut Vec<(f64, f64)>| {
            match run.as_slice() {
                [] => {}
                [(x, y)] => canvas.dot(*x, *y, width, color),
                points => canvas.polyline(points, max_jump, width, color),
            }
            run.clear();
        };
        let mut run: Vec<(f64, f64)> = Vec::new();
        for d in curve {
            let p = self.projector.project(d, mode);
            if p.valid {
                run.push(self.viewport.to_pixel(p));
            } else {
                flush(canvas, &mut run);
            }
        }
        flush(canvas, &mut run);
    }

    fn crosshair(&self, canvas: &mut Canvas) {
        let (cx, cy) = self.viewport.center();
        let w = self.config.line_width;
        canvas.line((cx - CROSSHAIR_HALF, cy), (cx + CROSSHAIR_HALF, cy), w, WHITE);
        canvas.line((cx, cy - CROSSHAIR_HALF), (cx, cy + CROSSHAIR_HALF), w, WHITE);
    }

    fn label_scale(&self) -> usize {
        (self.config.width.min(self.config.height) / 480).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(width: usize, height: usize, scale: f64) -> CalibrationGridGenerator {
        let config = CalibrationConfig {
            width,
            height,
            scale_x: scale,
            scale_y: scale,
            ..CalibrationConfig::default()
        };
        CalibrationGridGenerator::new(config, Projector::default())
    }

    /// Centers of the ring crossings met walking out from the image center at
    /// `angle` radians below the horizontal.
    fn ring_crossings(canvas: &Canvas, angle: f64, start: f64) -> Vec<f64> {
        let (cx, cy) = (canvas.width as f64 / 2.0, canvas.height as f64 / 2.0);
        let mut runs: Vec<Vec<f64>> = Vec::new();
        let mut inside = false;
        let mut t = start;
        loop {
            let x = cx + t * angle.cos();
            let y = cy + t * angle.sin();
            if x < 0.0 || y < 0.0 || x >= canvas.width as f64 || y >= canvas.height as f64 {
                break;
            }
            let c = canvas.get(x as usize, y as usize);
            let on_ring = c == GRAY || c == RED;
            if on_ring {
                if !inside {
                    runs.push(Vec::new());
                }
                runs.last_mut().unwrap().push(t);
            }
            inside = on_ring;
            t += 0.25;
        }
        runs.iter().map(|r| r.iter().sum::<f64>() / r.len() as f64).collect()
    }

    #[test]
    fn test_polar_rings_equally_spaced() {
        let canvas = generator(1600, 1600, 1.0).polar();
        let centers = ring_crossings(&canvas, 15f64.to_radians(), 30.0);
        assert_eq!(centers.len(), 6, "expected six rings, found {centers:?}");
        let gaps: Vec<f64> = centers.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        for g in &gaps {
            assert!((g - mean).abs() / mean < 0.01, "ring gaps not uniform: {gaps:?}");
        }
        // First ring sits one gap out from the pole.
        assert!((centers[0] - mean).abs() / mean < 0.02, "first ring at {}", centers[0]);
    }

    #[test]
    fn test_polar_ring_pixels_and_gaps() {
        let g = generator(640, 480, 0.8);
        let canvas = g.polar();
        let mode = ProjectionMode::polar();
        let phi = (-15f64).to_radians();
        let at = |deg: f64| {
            let p = g.projector.project(Direction::from_spherical(deg.to_radians(), phi), &mode);
            let (x, y) = g.viewport().to_pixel(p);
            canvas.get(x.round() as usize, y.round() as usize)
        };
        assert_eq!(at(30.0), GRAY);
        assert_eq!(at(45.0), RED);
        assert_eq!(at(22.5), BLACK);
        assert_eq!(at(52.5), BLACK);
    }

    #[test]
    fn test_polar_crosshair_and_meridian() {
        let canvas = generator(640, 480, 0.8).polar();
        assert_eq!(canvas.get(320, 240), WHITE);
        // Prime meridian runs right of center along the horizontal.
        assert_eq!(canvas.get(320 + 100, 240), GREEN);
    }

    #[test]
    fn test_standard_equator_and_pole() {
        let g = generator(640, 480, 0.8);
        let canvas = g.standard();
        let mode = ProjectionMode::standard();
        // The equator crosses the center line below the crosshair arm.
        let p = g.projector.project(Direction::from_spherical(PI / 2.0, -PI / 2.0 + 0.5), &mode);
        let (x, y) = g.viewport().to_pixel(p);
        assert_eq!(canvas.get(x.round() as usize, y.round() as usize), RED);
        // The pole projects to the top of the disc.
        let pole = g.projector.project(Direction::FORWARD, &mode);
        assert!(pole.y > 0.99);
    }

    #[test]
    fn test_write_artifacts() {
        let dir = std::env::temp_dir().join(format!("eyedome-calibration-{}", std::process::id()));
        let g = generator(320, 240, 0.8);
        let written = g.write_artifacts(&dir).unwrap();
        assert_eq!(written.len(), 3);
        for name in [POLAR_FILE, STANDARD_FILE, SIDECAR_FILE] {
            assert!(dir.join(name).exists(), "{name} missing");
        }

        let bytes = fs::read(dir.join(POLAR_FILE)).unwrap();
        let reader = png::Decoder::new(std::io::Cursor::new(bytes)).read_info().unwrap();
        assert_eq!((reader.info().width, reader.info().height), (320, 240));

        let sidecar: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(dir.join(SIDECAR_FILE)).unwrap()).unwrap();
        assert_eq!(sidecar["aspect_override"].as_str(), Some("16:9"));
        assert_eq!(sidecar["scale_x"].as_f64(), Some(0.8));
        fs::remove_dir_all(&dir).ok();
    }
}
