// Azimuthal-equidistant projection between view directions and display space.
//
// View space: +x right, +y up, +z forward (out of the dome toward the viewer).
// The projection center is always view-forward; modes differ in which sphere
// direction they rotate onto it.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Slack on the field-of-view edge so rim directions survive rotation round-off.
const EDGE_EPSILON: f64 = 1e-12;

/// Unit vector from the display's focal point. Normalized on construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Direction {
    x: f64,
    y: f64,
    z: f64,
}

impl Direction {
    pub const FORWARD: Direction = Direction { x: 0.0, y: 0.0, z: 1.0 };
    #[cfg(test)]
    pub const UP: Direction = Direction { x: 0.0, y: 1.0, z: 0.0 };

    /// Normalize `(x, y, z)`. A zero or non-finite vector becomes `FORWARD`.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let norm = (x * x + y * y + z * z).sqrt();
        if !norm.is_finite() || norm < 1e-300 {
            return Self::FORWARD;
        }
        Self { x: x / norm, y: y / norm, z: z / norm }
    }

    /// Direction at polar angle `theta` from +z and azimuth `phi` from +x.
    pub fn from_spherical(theta: f64, phi: f64) -> Self {
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        Self::new(st * cp, st * sp, ct)
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn z(self) -> f64 {
        self.z
    }

    pub fn dot(self, other: Direction) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Great-circle angle to `other`, stable near 0 and π.
    pub fn angle_to(self, other: Direction) -> f64 {
        let cx = self.y * other.z - self.z * other.y;
        let cy = self.z * other.x - self.x * other.z;
        let cz = self.x * other.y - self.y * other.x;
        (cx * cx + cy * cy + cz * cz).sqrt().atan2(self.dot(other))
    }
}

/// Rotation matrix applied to directions before projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    m: [[f64; 3]; 3],
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Rotation taking `FORWARD` to the direction with the given yaw (about +y,
    /// positive toward +x) and pitch (positive toward +y).
    pub fn looking_at(yaw: f64, pitch: f64) -> Self {
        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        // Ry(yaw) * Rx(-pitch)
        Self {
            m: [
                [cy, -sy * sp, sy * cp],
                [0.0, cp, sp],
                [-sy, -cy * sp, cy * cp],
            ],
        }
    }

    /// Roll about the forward axis, used to spin content on the dome.
    pub fn roll(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// `self` applied after `first`.
    pub fn compose(&self, first: &Orientation) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * first.m[k][j]).sum();
            }
        }
        Self { m }
    }

    pub fn rotate(&self, d: Direction) -> Direction {
        let m = &self.m;
        Direction::new(
            m[0][0] * d.x + m[0][1] * d.y + m[0][2] * d.z,
            m[1][0] * d.x + m[1][1] * d.y + m[1][2] * d.z,
            m[2][0] * d.x + m[2][1] * d.y + m[2][2] * d.z,
        )
    }

    /// Inverse rotation (transpose).
    pub fn unrotate(&self, d: Direction) -> Direction {
        let m = &self.m;
        Direction::new(
            m[0][0] * d.x + m[1][0] * d.y + m[2][0] * d.z,
            m[0][1] * d.x + m[1][1] * d.y + m[2][1] * d.z,
            m[0][2] * d.x + m[1][2] * d.y + m[2][2] * d.z,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// Sphere pole (+z) at the image center.
    Polar,
    /// Sphere pole at the top of the image; the equator faces the viewer.
    Standard,
}

impl ProjectionKind {
    pub fn toggle(self) -> Self {
        match self {
            ProjectionKind::Polar => ProjectionKind::Standard,
            ProjectionKind::Standard => ProjectionKind::Polar,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProjectionKind::Polar => "polar",
            ProjectionKind::Standard => "standard",
        }
    }

    fn rotation(self) -> Orientation {
        match self {
            ProjectionKind::Polar => Orientation::IDENTITY,
            // (x, y, z) -> (x, z, -y)
            ProjectionKind::Standard => Orientation {
                m: [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]],
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionMode {
    pub kind: ProjectionKind,
    pub orientation: Orientation,
}

impl ProjectionMode {
    pub fn polar() -> Self {
        Self { kind: ProjectionKind::Polar, orientation: Orientation::IDENTITY }
    }

    pub fn standard() -> Self {
        Self { kind: ProjectionKind::Standard, orientation: Orientation::IDENTITY }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    fn to_view(&self, d: Direction) -> Direction {
        self.orientation.rotate(self.kind.rotation().rotate(d))
    }

    fn from_view(&self, v: Direction) -> Direction {
        self.kind.rotation().unrotate(self.orientation.unrotate(v))
    }

    /// `d` expressed in the frame of the projection kind alone, ignoring the
    /// mount orientation.
    pub fn kind_frame(&self, d: Direction) -> Direction {
        self.kind.rotation().rotate(d)
    }

    /// The sphere direction that lands on the image center.
    pub fn reference_axis(&self) -> Direction {
        self.from_view(Direction::FORWARD)
    }
}

/// Normalized display coordinate: center (0, 0), +y up, radius 1 at the
/// field-of-view edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    pub valid: bool,
}

impl ScreenPoint {
    /// Point inside the display disc is valid; anything beyond radius 1 is not.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, valid: x.hypot(y) <= 1.0 }
    }

    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projector {
    max_angle: f64,
}

impl Default for Projector {
    fn default() -> Self {
        Self { max_angle: FRAC_PI_2 }
    }
}

impl Projector {
    /// `max_angle` is the field-of-view half-angle in radians, in (0, π].
    pub fn new(max_angle: f64) -> Result<Self> {
        if !(max_angle > 0.0 && max_angle <= PI) {
            return Err(Error::invalid(format!(
                "field-of-view half-angle must be in (0, 180] degrees, got {:.3}",
                max_angle.to_degrees()
            )));
        }
        Ok(Self { max_angle })
    }

    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }

    pub fn project(&self, direction: Direction, mode: &ProjectionMode) -> ScreenPoint {
        let v = mode.to_view(direction);
        let rho = v.x.hypot(v.y);
        let angle = rho.atan2(v.z);
        let r = angle / self.max_angle;
        // Azimuth is 0 by convention on the axis itself.
        let (cos_az, sin_az) = if rho > 0.0 { (v.x / rho, v.y / rho) } else { (1.0, 0.0) };
        ScreenPoint {
            x: r * cos_az,
            y: r * sin_az,
            valid: angle <= self.max_angle + EDGE_EPSILON,
        }
    }

    pub fn unproject(&self, point: ScreenPoint, mode: &ProjectionMode) -> Direction {
        let r = point.radius();
        let (s, c) = (r * self.max_angle).sin_cos();
        let (cos_az, sin_az) = if r > 0.0 { (point.x / r, point.y / r) } else { (1.0, 0.0) };
        mode.from_view(Direction::new(s * cos_az, s * sin_az, c))
    }
}

/// Pixel mapping of the display disc for one output resolution.
///
/// The usable radius is `min(width, height) / 2 * margin`, stretched per axis
/// by `1 / scale_x` and `1 / scale_y` to compensate the physical margin of the
/// dome and the player's aspect handling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
    pub margin: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, margin: 0.9, scale_x: 1.0, scale_y: 1.0 }
    }

    pub fn with_margin(mut self, margin: f64, scale_x: f64, scale_y: f64) -> Self {
        self.margin = margin;
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Pixel radii of the unit disc along x and y.
    pub fn radii(&self) -> (f64, f64) {
        let base = self.width.min(self.height) as f64 / 2.0 * self.margin;
        (base / self.scale_x, base / self.scale_y)
    }

    pub fn to_pixel(&self, p: ScreenPoint) -> (f64, f64) {
        let (cx, cy) = self.center();
        let (rx, ry) = self.radii();
        (cx + p.x * rx, cy - p.y * ry)
    }

    pub fn from_pixel(&self, px: f64, py: f64) -> ScreenPoint {
        let (cx, cy) = self.center();
        let (rx, ry) = self.radii();
        ScreenPoint::new((px - cx) / rx, (cy - py) / ry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes() -> [ProjectionMode; 3] {
        [
            ProjectionMode::polar(),
            ProjectionMode::standard(),
            ProjectionMode::polar().with_orientation(Orientation::looking_at(0.3, -0.2)),
        ]
    }

    #[test]
    fn test_direction_normalized() {
        let d = Direction::new(3.0, 0.0, 4.0);
        assert!((d.x() - 0.6).abs() < 1e-12);
        assert!((d.z() - 0.8).abs() < 1e-12);
        assert!((d.dot(d) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_is_forward() {
        assert_eq!(Direction::new(0.0, 0.0, 0.0), Direction::FORWARD);
        assert_eq!(Direction::new(f64::NAN, 1.0, 0.0), Direction::FORWARD);
    }

    #[test]
    fn test_round_trip_within_field_of_view() {
        let projector = Projector::default();
        for mode in modes() {
            let axis = mode.reference_axis();
            for i in 0..=18 {
                for j in 0..24 {
                    let theta = (i as f64 / 18.0) * FRAC_PI_2;
                    let phi = j as f64 / 24.0 * 2.0 * PI;
                    // Build a direction at angle theta from the mode's axis.
                    let local = Direction::from_spherical(theta, phi);
                    let d = mode.from_view(local);
                    assert!((d.angle_to(axis) - theta).abs() < 1e-9);

                    let p = projector.project(d, &mode);
                    assert!(p.valid, "theta={theta} should be visible");
                    let back = projector.unproject(p, &mode);
                    let err = (back.x() - d.x())
                        .abs()
                        .max((back.y() - d.y()).abs())
                        .max((back.z() - d.z()).abs());
                    assert!(err < 1e-6, "{:?}: round trip error {err} at theta={theta} phi={phi}", mode.kind);
                }
            }
        }
    }

    #[test]
    fn test_reference_axis_projects_to_center() {
        let projector = Projector::default();
        for mode in [ProjectionMode::polar(), ProjectionMode::standard()] {
            let p = projector.project(mode.reference_axis(), &mode);
            assert_eq!(p.x, 0.0, "{:?}", mode.kind);
            assert_eq!(p.y, 0.0, "{:?}", mode.kind);
            assert!(p.valid);
        }
        let tilted = modes()[2];
        let p = projector.project(tilted.reference_axis(), &tilted);
        assert!(p.radius() < 1e-12);
    }

    #[test]
    fn test_radius_monotonic_in_angle() {
        let projector = Projector::default();
        for mode in modes() {
            let mut last = -1.0;
            for i in 0..=90 {
                let theta = (i as f64).to_radians();
                let d = mode.from_view(Direction::from_spherical(theta, 1.1));
                let r = projector.project(d, &mode).radius();
                assert!(r > last, "radius not increasing at {i} degrees");
                last = r;
            }
        }
    }

    #[test]
    fn test_radius_linear_in_angle() {
        let projector = Projector::default();
        let mode = ProjectionMode::polar();
        let p = projector.project(Direction::from_spherical(FRAC_PI_2 / 3.0, 0.0), &mode);
        assert!((p.radius() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_behind_hemisphere_is_invalid() {
        let projector = Projector::default();
        let mode = ProjectionMode::polar();
        let p = projector.project(Direction::new(1.0, 0.0, -0.1), &mode);
        assert!(!p.valid);
        assert!(p.radius() > 1.0);
        let antipode = projector.project(Direction::new(0.0, 0.0, -1.0), &mode);
        assert!(!antipode.valid);
        assert!((antipode.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_standard_puts_pole_at_top() {
        let projector = Projector::default();
        let mode = ProjectionMode::standard();
        let p = projector.project(Direction::new(0.0, 0.0, 1.0), &mode);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
        assert_eq!(mode.reference_axis(), Direction::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_kind_frame_centers_reference_axis() {
        for mode in [ProjectionMode::polar(), ProjectionMode::standard()] {
            let f = mode.kind_frame(mode.reference_axis());
            assert!((f.z() - 1.0).abs() < 1e-12, "{:?} -> {f:?}", mode.kind);
        }
        let standard = ProjectionMode::standard();
        assert_eq!(standard.kind_frame(Direction::new(0.0, 0.0, 1.0)), Direction::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_wider_fov_shrinks_radius() {
        let wide = Projector::new(PI).unwrap();
        let d = Direction::from_spherical(FRAC_PI_2, 0.0);
        let p = wide.project(d, &ProjectionMode::polar());
        assert!((p.radius() - 0.5).abs() < 1e-12);
        assert!(p.valid);
    }

    #[test]
    fn test_projector_rejects_bad_fov() {
        assert!(Projector::new(0.0).is_err());
        assert!(Projector::new(-1.0).is_err());
        assert!(Projector::new(4.0).is_err());
        assert!(Projector::new(f64::NAN).is_err());
    }

    #[test]
    fn test_looking_at_maps_forward() {
        let o = Orientation::looking_at(0.4, 0.25);
        let d = o.rotate(Direction::FORWARD);
        assert!((d.x() - 0.4f64.sin() * 0.25f64.cos()).abs() < 1e-12);
        assert!((d.y() - 0.25f64.sin()).abs() < 1e-12);
        let back = o.unrotate(d);
        assert!((back.z() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_compose_matches_sequential_rotation() {
        let a = Orientation::looking_at(0.2, 0.1);
        let b = Orientation::roll(0.7);
        let d = Direction::new(0.3, -0.4, 0.8);
        let seq = a.rotate(b.rotate(d));
        let composed = a.compose(&b).rotate(d);
        assert!((seq.x() - composed.x()).abs() < 1e-12);
        assert!((seq.y() - composed.y()).abs() < 1e-12);
        assert!((seq.z() - composed.z()).abs() < 1e-12);
    }

    #[test]
    fn test_viewport_pixel_round_trip() {
        let vp = Viewport::new(640, 480).with_margin(0.9, 0.8, 0.78);
        let p = ScreenPoint::new(0.3, -0.45);
        let (px, py) = vp.to_pixel(p);
        let back = vp.from_pixel(px, py);
        assert!((back.x - p.x).abs() < 1e-12);
        assert!((back.y - p.y).abs() < 1e-12);
        // +y is up: negative y lands below the center row.
        assert!(py > 240.0);
    }

    #[test]
    fn test_viewport_radii() {
        let vp = Viewport::new(1280, 720);
        let (rx, ry) = vp.radii();
        assert!((rx - 324.0).abs() < 1e-9);
        assert!((ry - 324.0).abs() < 1e-9);
        assert!(!vp.from_pixel(0.0, 0.0).valid);
        assert!(vp.from_pixel(640.0, 360.0).valid);
    }
}
