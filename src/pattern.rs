// Procedural content evaluated per sampled direction.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::str::FromStr;

use crate::animation::EyeState;
use crate::color::{self, ColorMap};
use crate::error::{Error, Result};
use crate::projection::Direction;

/// Named iris palettes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EyeColor {
    Green,
    Blue,
    Brown,
    Hazel,
    Gray,
}

impl EyeColor {
    pub const ALL: [EyeColor; 5] = [
        EyeColor::Green,
        EyeColor::Blue,
        EyeColor::Brown,
        EyeColor::Hazel,
        EyeColor::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EyeColor::Green => "green",
            EyeColor::Blue => "blue",
            EyeColor::Brown => "brown",
            EyeColor::Hazel => "hazel",
            EyeColor::Gray => "gray",
        }
    }

    pub fn palette(self) -> Palette {
        // (base, dark) iris pairs
        let (iris_base, iris_dark) = match self {
            EyeColor::Green => ([34, 139, 34], [0, 100, 0]),
            EyeColor::Blue => ([70, 130, 180], [25, 25, 112]),
            EyeColor::Brown => ([139, 69, 19], [101, 67, 33]),
            EyeColor::Hazel => ([154, 205, 50], [107, 142, 35]),
            EyeColor::Gray => ([105, 105, 105], [64, 64, 64]),
        };
        Palette {
            iris_base,
            iris_dark,
            sclera: [248, 248, 255],
            pupil: [0, 0, 0],
            eyelid: [205, 133, 63],
            background: [0, 0, 0],
        }
    }
}

impl FromStr for EyeColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EyeColor::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = EyeColor::ALL.iter().map(|c| c.name()).collect();
                Error::invalid(format!("unknown eye color '{s}' (expected one of {})", names.join("|")))
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub iris_base: [u8; 3],
    pub iris_dark: [u8; 3],
    pub sclera: [u8; 3],
    pub pupil: [u8; 3],
    pub eyelid: [u8; 3],
    pub background: [u8; 3],
}

/// Angular sizes of the eye features, all in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeGeometry {
    /// Iris ellipse half-widths around the gaze axis.
    pub iris_radius_x: f64,
    pub iris_radius_y: f64,
    /// Half-height of the lid opening at aperture 1.0, as elevation.
    pub lid_open_angle: f64,
}

impl Default for EyeGeometry {
    fn default() -> Self {
        Self {
            iris_radius_x: 45f64.to_radians(),
            iris_radius_y: 42f64.to_radians(),
            lid_open_angle: FRAC_PI_2,
        }
    }
}

/// Region of the eye a direction falls in before lid occlusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Pupil,
    Iris,
    Sclera,
}

/// `r` is the normalized iris-ellipse radius; the pupil is a fraction of it.
fn classify(r: f64, pupil: f64) -> Region {
    if r <= pupil {
        Region::Pupil
    } else if r <= 1.0 {
        Region::Iris
    } else {
        Region::Sclera
    }
}

pub struct PatternSynthesizer {
    palette: Palette,
    geometry: EyeGeometry,
    /// Field-of-view half-angle; the sclera falloff reaches 10% at this angle.
    max_angle: f64,
}

impl PatternSynthesizer {
    pub fn new(palette: Palette, geometry: EyeGeometry, max_angle: f64) -> Self {
        Self { palette, geometry, max_angle }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Eye-local coordinates: azimuthal-equidistant offset from the gaze axis.
    fn gaze_local(&self, direction: Direction, eye: &EyeState) -> (f64, f64, f64) {
        let local = eye.gaze_frame.unrotate(direction);
        let rho = local.x().hypot(local.y());
        let angle = direction.angle_to(eye.gaze);
        if rho > 0.0 {
            (angle * local.x() / rho, angle * local.y() / rho, angle)
        } else {
            (0.0, 0.0, angle)
        }
    }

    #[cfg(test)]
    pub fn region(&self, direction: Direction, eye: &EyeState) -> Region {
        let (u, v, _) = self.gaze_local(direction, eye);
        let r = (u / self.geometry.iris_radius_x).hypot(v / self.geometry.iris_radius_y);
        classify(r, eye.pupil)
    }

    /// Directions whose elevation exceeds the current lid opening.
    pub fn occluded(&self, direction: Direction, aperture: f64) -> bool {
        let limit = aperture.clamp(0.0, 1.0) * self.geometry.lid_open_angle;
        if limit <= 0.0 {
            return true;
        }
        direction.y().clamp(-1.0, 1.0).asin().abs() > limit
    }

    pub fn color(&self, direction: Direction, eye: &EyeState) -> [u8; 4] {
        let p = &self.palette;
        let (u, v, angle) = self.gaze_local(direction, eye);
        let eu = u / self.geometry.iris_radius_x;
        let ev = v / self.geometry.iris_radius_y;
        let r = eu.hypot(ev);

        let base = match classify(r, eye.pupil) {
            Region::Pupil => color::opaque(p.pupil),
            Region::Iris => {
                let radial = (r * 8.0 * PI).sin() * 0.3 + 0.7;
                let azimuth = ev.atan2(eu);
                let angular = (azimuth * 12.0).sin() * 0.2 + 0.8;
                color::mix(p.iris_dark, p.iris_base, radial * angular)
            }
            Region::Sclera => {
                let t = (angle / self.max_angle).min(1.0);
                color::shade(p.sclera, 1.0 - 0.1 * t * t)
            }
        };

        // Lids always win.
        if self.occluded(direction, eye.aperture) {
            color::opaque(p.eyelid)
        } else {
            base
        }
    }
}

/// Rotating real spherical harmonic `Re Y_l^m` on the content sphere.
pub struct HarmonicPattern {
    l: u32,
    m: i32,
    norm: f64,
    rotation_speed: f64,
    gain: f64,
    colormap: ColorMap,
}

impl HarmonicPattern {
    pub fn new(l: u32, m: i32, rotation_speed: f64, gain: f64, colormap: ColorMap) -> Result<Self> {
        if m.unsigned_abs() > l {
            return Err(Error::invalid(format!("harmonic order |m| must be <= l, got l={l} m={m}")));
        }
        if !gain.is_finite() || gain <= 0.0 {
            return Err(Error::invalid(format!("harmonic gain must be positive, got {gain}")));
        }
        let am = m.unsigned_abs();
        // (l-m)!/(l+m)! as a running product to stay in range
        let ratio: f64 = ((l - am + 1)..=(l + am)).map(|k| 1.0 / k as f64).product();
        let mut norm = ((2 * l + 1) as f64 / (4.0 * PI) * ratio).sqrt();
        if m < 0 && am % 2 == 1 {
            norm = -norm;
        }
        Ok(Self { l, m, norm, rotation_speed, gain, colormap })
    }

    pub fn label(&self) -> String {
        format!("y{}.{}", self.l, self.m)
    }

    pub fn value(&self, direction: Direction, time: f64) -> f64 {
        let theta = direction.x().hypot(direction.y()).atan2(direction.z());
        let phi = direction.y().atan2(direction.x()) + self.rotation_speed * time;
        let am = self.m.unsigned_abs();
        self.norm * assoc_legendre(self.l, am, theta.cos()) * (am as f64 * phi).cos()
    }

    pub fn color(&self, direction: Direction, time: f64) -> [u8; 4] {
        let v = (self.value(direction, time) * self.gain).clamp(-1.0, 1.0);
        color::map_to_rgba(0.5 + 0.5 * v, self.colormap)
    }
}

/// Line spacing of the wireframe globe, all in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobeGrid {
    pub latitude_step: f64,
    pub longitude_step: f64,
    /// Parallels are drawn from `min_latitude` up to `max_latitude`.
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub highlight_latitude: f64,
    pub line_width: f64,
}

impl Default for GlobeGrid {
    fn default() -> Self {
        Self {
            latitude_step: 5f64.to_radians(),
            longitude_step: 15f64.to_radians(),
            min_latitude: 50f64.to_radians(),
            max_latitude: 80f64.to_radians(),
            highlight_latitude: 60f64.to_radians(),
            line_width: 1f64.to_radians(),
        }
    }
}

const GLOBE_GRAY: [u8; 3] = [128, 128, 128];
const GLOBE_HIGHLIGHT: [u8; 3] = [255, 0, 0];
const GLOBE_PRIME: [u8; 3] = [0, 255, 0];

/// Rotating latitude/longitude wireframe with the pole on the reference axis.
///
/// Meridians are painted over parallels. The prime meridian is green, the
/// highlighted parallel red, every other line gray on black.
pub struct GlobePattern {
    grid: GlobeGrid,
    rotation_speed: f64,
}

impl GlobePattern {
    pub fn new(grid: GlobeGrid, rotation_speed: f64) -> Result<Self> {
        let GlobeGrid { latitude_step, longitude_step, min_latitude, max_latitude, highlight_latitude, line_width } = grid;
        if !(latitude_step > 0.0 && latitude_step <= FRAC_PI_2) {
            return Err(Error::invalid(format!("globe latitude step must be in (0, 90] degrees, got {}", latitude_step.to_degrees())));
        }
        if !(longitude_step > 0.0 && longitude_step <= PI) {
            return Err(Error::invalid(format!("globe longitude step must be in (0, 180] degrees, got {}", longitude_step.to_degrees())));
        }
        if !(line_width > 0.0 && line_width < latitude_step.min(longitude_step)) {
            return Err(Error::invalid(format!("globe line width must be positive and below the line spacing, got {}", line_width.to_degrees())));
        }
        if !(0.0..=FRAC_PI_2).contains(&min_latitude) || !(min_latitude..=FRAC_PI_2).contains(&max_latitude) {
            return Err(Error::invalid(format!(
                "globe latitudes must satisfy 0 <= min <= max <= 90, got {}..{}",
                min_latitude.to_degrees(),
                max_latitude.to_degrees()
            )));
        }
        if !highlight_latitude.is_finite() {
            return Err(Error::invalid("globe highlight latitude must be finite"));
        }
        if !rotation_speed.is_finite() {
            return Err(Error::invalid(format!("globe rotation speed must be finite, got {rotation_speed}")));
        }
        Ok(Self { grid, rotation_speed })
    }

    pub fn color(&self, direction: Direction, time: f64) -> [u8; 4] {
        let g = &self.grid;
        let half = g.line_width / 2.0;
        let theta = direction.x().hypot(direction.y()).atan2(direction.z());
        let longitude = direction.y().atan2(direction.x()) - self.rotation_speed * time;

        let meridian = (longitude / g.longitude_step).round() * g.longitude_step;
        if (theta.sin() * (longitude - meridian).sin().abs()).asin() <= half {
            let wrapped = meridian.rem_euclid(TAU);
            let prime = wrapped < 1e-9 || TAU - wrapped < 1e-9;
            return color::opaque(if prime { GLOBE_PRIME } else { GLOBE_GRAY });
        }

        let latitude = FRAC_PI_2 - theta;
        let parallel = (latitude / g.latitude_step).round() * g.latitude_step;
        let drawn = parallel >= g.min_latitude - 1e-9 && parallel <= g.max_latitude + 1e-9;
        if drawn && (latitude - parallel).abs() <= half {
            let highlight = (parallel - g.highlight_latitude).abs() < 1e-9;
            return color::opaque(if highlight { GLOBE_HIGHLIGHT } else { GLOBE_GRAY });
        }
        [0, 0, 0, 255]
    }
}

/// Associated Legendre function `P_l^m(x)` with the Condon-Shortley phase.
fn assoc_legendre(l: u32, m: u32, x: f64) -> f64 {
    let x = x.clamp(-1.0, 1.0);
    let mut pmm = 1.0;
    if m > 0 {
        let s = ((1.0 - x) * (1.0 + x)).sqrt();
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= -fact * s;
            fact += 2.0;
        }
    }
    if l == m {
        return pmm;
    }
    let mut pmm1 = x * (2 * m + 1) as f64 * pmm;
    for ll in (m + 2)..=l {
        let pll = ((2 * ll - 1) as f64 * x * pmm1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmm1;
        pmm1 = pll;
    }
    pmm1
}
