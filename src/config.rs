use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::animation::AnimationTiming;
use crate::color::ColorMap;
use crate::error::{Error, Result};
use crate::grid::DecimationFactor;
use crate::pattern::{EyeColor, EyeGeometry, GlobeGrid, GlobePattern, HarmonicPattern};
use crate::projection::{Orientation, ProjectionKind, ProjectionMode, Projector, Viewport};

pub const DEFAULT_PATH: &str = "eyedome.yaml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub content: ContentKind,
    pub eye: EyeConfig,
    pub harmonics: HarmonicsConfig,
    pub globe: GlobeConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Eyeball,
    Harmonics,
    Globe,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: usize,
    pub height: usize,
    pub fullscreen: bool,
    pub target_fps: usize,
    pub decimation: usize,
    pub margin: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Full field of view across the disc; 180 shows one hemisphere.
    pub fov_degrees: f64,
    pub projection: ProjectionKind,
    /// Physical tilt of the projector relative to the dome, applied after
    /// the projection kind. Yaw and pitch aim the reference axis; roll then
    /// spins the image about the view center.
    pub mount_yaw_deg: f64,
    pub mount_pitch_deg: f64,
    pub mount_roll_deg: f64,
    pub hud: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    /// Preset name, checked by `validate` so a typo reads as a bad value.
    pub color: String,
    pub iris_radius_x_deg: f64,
    pub iris_radius_y_deg: f64,
    /// Half-height of the lid opening above and below the horizon when fully open.
    pub lid_open_deg: f64,
    /// Pupil radius as a fraction of the iris radius.
    pub pupil: f64,
    pub pupil_min: f64,
    pub pupil_max: f64,
    pub pupil_step: f64,
    pub max_gaze_deg: f64,
    pub gaze_step: f64,
    pub saccade_interval: [f64; 2],
    pub saccade_duration: f64,
    pub blink_interval: [f64; 2],
    pub blink_close: f64,
    pub blink_hold: f64,
    pub blink_open: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HarmonicsConfig {
    pub l: u32,
    pub m: i32,
    /// Radians per second around the content pole.
    pub rotation_speed: f64,
    pub gain: f64,
    pub colormap: ColorMap,
}

/// Rotating latitude/longitude wireframe, in degrees.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    /// Radians per second around the pole.
    pub rotation_speed: f64,
    pub latitude_step_deg: f64,
    pub longitude_step_deg: f64,
    pub min_latitude_deg: f64,
    pub max_latitude_deg: f64,
    pub highlight_latitude_deg: f64,
    pub line_width_deg: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub width: usize,
    pub height: usize,
    pub margin: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Aspect the playback viewer should force, recorded in the sidecar.
    pub aspect_override: String,
    pub line_width: usize,
    pub output_dir: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            fullscreen: true,
            target_fps: 60,
            decimation: 2,
            margin: 0.9,
            scale_x: 1.0,
            scale_y: 1.0,
            fov_degrees: 180.0,
            projection: ProjectionKind::Polar,
            mount_yaw_deg: 0.0,
            mount_pitch_deg: 0.0,
            mount_roll_deg: 0.0,
            hud: false,
        }
    }
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            color: EyeColor::Green.name().to_string(),
            iris_radius_x_deg: 45.0,
            iris_radius_y_deg: 42.0,
            lid_open_deg: 90.0,
            pupil: 0.3,
            pupil_min: 0.18,
            pupil_max: 0.36,
            pupil_step: 0.02,
            max_gaze_deg: 30.0,
            gaze_step: 0.1,
            saccade_interval: [2.0, 5.0],
            saccade_duration: 0.12,
            blink_interval: [3.0, 6.0],
            blink_close: 0.08,
            blink_hold: 0.05,
            blink_open: 0.15,
            seed: None,
        }
    }
}

impl Default for HarmonicsConfig {
    fn default() -> Self {
        Self {
            l: 2,
            m: 1,
            rotation_speed: 0.3,
            gain: 1.0,
            colormap: ColorMap::BlueWhiteRed,
        }
    }
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 0.2,
            latitude_step_deg: 5.0,
            longitude_step_deg: 15.0,
            min_latitude_deg: 50.0,
            max_latitude_deg: 80.0,
            highlight_latitude_deg: 60.0,
            line_width_deg: 1.0,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            margin: 0.9,
            scale_x: 0.80,
            scale_y: 0.78,
            aspect_override: "16:9".to_string(),
            line_width: 2,
            output_dir: PathBuf::from("."),
        }
    }
}

fn positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!("{name} must be positive, got {v}")))
    }
}

fn interval(name: &str, [lo, hi]: [f64; 2]) -> Result<()> {
    positive(name, lo)?;
    if hi < lo || !hi.is_finite() {
        return Err(Error::invalid(format!("{name} must be [min, max] with min <= max, got [{lo}, {hi}]")));
    }
    Ok(())
}

impl Config {
    /// Reject values the renderer cannot honor. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        let d = &self.display;
        if d.width == 0 || d.height == 0 {
            return Err(Error::invalid(format!("display size must be non-zero, got {}x{}", d.width, d.height)));
        }
        if d.target_fps == 0 {
            return Err(Error::invalid("display.target_fps must be >= 1"));
        }
        DecimationFactor::new(d.decimation)?;
        positive("display.margin", d.margin)?;
        positive("display.scale_x", d.scale_x)?;
        positive("display.scale_y", d.scale_y)?;
        if !(d.fov_degrees > 0.0 && d.fov_degrees <= 360.0) {
            return Err(Error::invalid(format!("display.fov_degrees must be in (0, 360], got {}", d.fov_degrees)));
        }
        for (name, v) in [("yaw", d.mount_yaw_deg), ("pitch", d.mount_pitch_deg), ("roll", d.mount_roll_deg)] {
            if !v.is_finite() {
                return Err(Error::invalid(format!("display.mount_{name}_deg must be finite, got {v}")));
            }
        }

        let e = &self.eye;
        self.eye_color()?;
        positive("eye.iris_radius_x_deg", e.iris_radius_x_deg)?;
        positive("eye.iris_radius_y_deg", e.iris_radius_y_deg)?;
        positive("eye.lid_open_deg", e.lid_open_deg)?;
        positive("eye.pupil_min", e.pupil_min)?;
        if !(e.pupil_min <= e.pupil && e.pupil <= e.pupil_max && e.pupil_max < 1.0) {
            return Err(Error::invalid(format!(
                "eye.pupil must satisfy pupil_min <= pupil <= pupil_max < 1, got {} <= {} <= {}",
                e.pupil_min, e.pupil, e.pupil_max
            )));
        }
        positive("eye.pupil_step", e.pupil_step)?;
        positive("eye.max_gaze_deg", e.max_gaze_deg)?;
        positive("eye.gaze_step", e.gaze_step)?;
        interval("eye.saccade_interval", e.saccade_interval)?;
        positive("eye.saccade_duration", e.saccade_duration)?;
        interval("eye.blink_interval", e.blink_interval)?;
        positive("eye.blink_close", e.blink_close)?;
        positive("eye.blink_hold", e.blink_hold)?;
        positive("eye.blink_open", e.blink_open)?;

        self.harmonic_pattern()?;
        self.globe_pattern()?;

        let c = &self.calibration;
        if c.width == 0 || c.height == 0 {
            return Err(Error::invalid(format!("calibration size must be non-zero, got {}x{}", c.width, c.height)));
        }
        positive("calibration.margin", c.margin)?;
        positive("calibration.scale_x", c.scale_x)?;
        positive("calibration.scale_y", c.scale_y)?;
        if c.line_width == 0 {
            return Err(Error::invalid("calibration.line_width must be >= 1"));
        }
        Ok(())
    }

    pub fn projector(&self) -> Result<Projector> {
        Projector::new((self.display.fov_degrees / 2.0).to_radians())
    }

    pub fn projection_mode(&self) -> ProjectionMode {
        let d = &self.display;
        let mount = Orientation::roll(d.mount_roll_deg.to_radians())
            .compose(&Orientation::looking_at(d.mount_yaw_deg.to_radians(), d.mount_pitch_deg.to_radians()));
        ProjectionMode { kind: d.projection, ..ProjectionMode::polar() }.with_orientation(mount)
    }

    pub fn viewport(&self, width: usize, height: usize) -> Viewport {
        let d = &self.display;
        Viewport::new(width, height).with_margin(d.margin, d.scale_x, d.scale_y)
    }

    pub fn decimation(&self) -> Result<DecimationFactor> {
        DecimationFactor::new(self.display.decimation)
    }

    pub fn eye_color(&self) -> Result<EyeColor> {
        self.eye.color.parse()
    }

    pub fn eye_geometry(&self) -> EyeGeometry {
        let e = &self.eye;
        EyeGeometry {
            iris_radius_x: e.iris_radius_x_deg.to_radians(),
            iris_radius_y: e.iris_radius_y_deg.to_radians(),
            // Keep the default exact so a fully open lid never clips the horizon.
            lid_open_angle: if e.lid_open_deg == 90.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                e.lid_open_deg.to_radians()
            },
        }
    }

    pub fn animation_timing(&self) -> AnimationTiming {
        let e = &self.eye;
        AnimationTiming {
            saccade_interval: (e.saccade_interval[0], e.saccade_interval[1]),
            saccade_duration: e.saccade_duration,
            max_gaze: e.max_gaze_deg.to_radians(),
            gaze_step: e.gaze_step,
            blink_interval: (e.blink_interval[0], e.blink_interval[1]),
            blink_close: e.blink_close,
            blink_hold: e.blink_hold,
            blink_open: e.blink_open,
            pupil_range: (e.pupil_min, e.pupil_max),
            pupil_step: e.pupil_step,
            pupil_initial: e.pupil,
        }
    }

    pub fn harmonic_pattern(&self) -> Result<HarmonicPattern> {
        let h = &self.harmonics;
        HarmonicPattern::new(h.l, h.m, h.rotation_speed, h.gain, h.colormap)
    }

    pub fn globe_pattern(&self) -> Result<GlobePattern> {
        let g = &self.globe;
        let grid = GlobeGrid {
            latitude_step: g.latitude_step_deg.to_radians(),
            longitude_step: g.longitude_step_deg.to_radians(),
            min_latitude: g.min_latitude_deg.to_radians(),
            max_latitude: g.max_latitude_deg.to_radians(),
            highlight_latitude: g.highlight_latitude_deg.to_radians(),
            line_width: g.line_width_deg.to_radians(),
        };
        GlobePattern::new(grid, g.rotation_speed)
    }
}

/// Read `path`, or `eyedome.yaml` in the working directory when no path is
/// given. A missing default file means defaults; an explicit path must exist.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_PATH), false),
    };
    let cfg = if !required && !path.exists() {
        Config::default()
    } else {
        let contents = std::fs::read_to_string(path)?;
        let cfg = parse(&contents, path)?;
        info!("loaded configuration from {}", path.display());
        cfg
    };
    cfg.validate()?;
    Ok(cfg)
}

fn parse(contents: &str, path: &Path) -> Result<Config> {
    // An empty file is a valid all-defaults config.
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(contents).map_err(|source| Error::ConfigParse { path: path.to_path_buf(), source })
}
