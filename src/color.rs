use serde::Deserialize;

/// Diverging maps for signed content such as spherical harmonics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMap {
    /// Negative lobes blue, zero white, positive lobes red.
    BlueWhiteRed,
    /// Deep blue through a white interface into orange and lava red.
    OceanLava,
}

impl ColorMap {
    /// Five evenly spaced stops at 0, 0.25, 0.5, 0.75 and 1.
    fn stops(self) -> &'static [[u8; 3]; 5] {
        match self {
            // Ends stay saturated so faint lobes still read on the dome.
            ColorMap::BlueWhiteRed => &[
                [0, 0, 255],
                [128, 128, 255],
                [255, 255, 255],
                [255, 128, 128],
                [255, 0, 0],
            ],
            // Inner stops stay dark; only the zero crossing glows.
            ColorMap::OceanLava => &[
                [10, 30, 120],
                [20, 90, 200],
                [250, 250, 240],
                [220, 80, 10],
                [160, 20, 20],
            ],
        }
    }
}

/// Map `t` in [0, 1] through `colormap`. NaN maps to the midpoint.
pub fn map_to_rgba(t: f64, colormap: ColorMap) -> [u8; 4] {
    let stops = colormap.stops();
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    let seg = t * (stops.len() - 1) as f64;
    let i = (seg as usize).min(stops.len() - 2);
    mix(stops[i], stops[i + 1], seg - i as f64)
}

/// Linear blend of two RGB colors, `t=0` gives `a`.
pub fn mix(a: [u8; 3], b: [u8; 3], t: f64) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let ch = |i: usize| (a[i] as f64 + t * (b[i] as f64 - a[i] as f64)).round() as u8;
    [ch(0), ch(1), ch(2), 255]
}

/// Scale an RGB color by a brightness factor in [0, 1].
pub fn shade(c: [u8; 3], factor: f64) -> [u8; 4] {
    let f = factor.clamp(0.0, 1.0);
    [
        (c[0] as f64 * f) as u8,
        (c[1] as f64 * f) as u8,
        (c[2] as f64 * f) as u8,
        255,
    ]
}

pub fn opaque(c: [u8; 3]) -> [u8; 4] {
    [c[0], c[1], c[2], 255]
}
