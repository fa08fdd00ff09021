// RGBA raster helpers: a drawing canvas and an uncompressed PNG encoder.
//
// The encoder wraps raw scanlines in stored deflate blocks. No compression
// work is done, so it is fast enough to run every frame for the terminal
// surface and simple enough to use for the calibration artifacts.

use std::fs;
use std::path::Path;

use crate::error::Result;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const STORED_BLOCK_MAX: usize = 65535;

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = crc_table();

fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(!0u32, |crc, &b| {
        CRC_TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8)
    })
}

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    // Largest run that cannot overflow u32 before reducing.
    const NMAX: usize = 5552;
    let (mut a, mut b) = (1u32, 0u32);
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

/// Reusable PNG encoder. Scratch buffers survive between calls so the
/// per-frame path does not allocate once warmed up.
#[derive(Default)]
pub struct PngEncoder {
    scanlines: Vec<u8>,
    out: Vec<u8>,
}

impl PngEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `rgba` (row-major, 4 bytes per pixel) and return the PNG bytes.
    pub fn encode(&mut self, rgba: &[u8], width: usize, height: usize) -> &[u8] {
        let stride = width * 4;
        debug_assert!(rgba.len() >= stride * height);

        // Filter type 0 before every row.
        self.scanlines.clear();
        self.scanlines.reserve((stride + 1) * height);
        for row in rgba.chunks_exact(stride.max(1)).take(height) {
            self.scanlines.push(0);
            self.scanlines.extend_from_slice(row);
        }

        let raw = &self.scanlines;
        let blocks = raw.len().div_ceil(STORED_BLOCK_MAX).max(1);
        let idat_len = 2 + blocks * 5 + raw.len() + 4;

        let out = &mut self.out;
        out.clear();
        out.reserve(PNG_SIGNATURE.len() + 25 + 12 + idat_len + 12);
        out.extend_from_slice(&PNG_SIGNATURE);

        let mut ihdr = [0u8; 13];
        ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
        ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
        ihdr[8] = 8; // bits per channel
        ihdr[9] = 6; // truecolor with alpha
        push_chunk(out, b"IHDR", &ihdr);

        out.extend_from_slice(&(idat_len as u32).to_be_bytes());
        let crc_from = out.len();
        out.extend_from_slice(b"IDAT");
        out.extend_from_slice(&[0x78, 0x01]);
        if raw.is_empty() {
            out.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
        }
        let mut rest = raw.chunks(STORED_BLOCK_MAX).peekable();
        while let Some(block) = rest.next() {
            let last = rest.peek().is_none();
            let len = block.len() as u16;
            out.push(u8::from(last));
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&(!len).to_le_bytes());
            out.extend_from_slice(block);
        }
        out.extend_from_slice(&adler32(raw).to_be_bytes());
        let crc = crc32(&out[crc_from..]);
        out.extend_from_slice(&crc.to_be_bytes());

        push_chunk(out, b"IEND", &[]);
        &self.out
    }
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let crc_from = out.len();
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let crc = crc32(&out[crc_from..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

/// Encode and write a PNG file in one step.
pub fn write_png(path: &Path, rgba: &[u8], width: usize, height: usize) -> Result<()> {
    let mut encoder = PngEncoder::new();
    fs::write(path, encoder.encode(rgba, width, height))?;
    Ok(())
}

/// Owned RGBA image with the primitives the calibration charts need.
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, background: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[background[0], background[1], background[2], 255]);
        }
        Self { width, height, pixels }
    }

    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// Set one pixel; out-of-bounds coordinates are ignored.
    pub fn plot(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let i = (y as usize * self.width + x as usize) * 4;
        self.pixels[i..i + 3].copy_from_slice(&color);
        self.pixels[i + 3] = 255;
    }

    /// Filled square of side `size` centred on (x, y).
    pub fn dot(&mut self, x: f64, y: f64, size: usize, color: [u8; 3]) {
        let size = size.max(1) as i64;
        let x0 = (x - (size - 1) as f64 / 2.0).round() as i64;
        let y0 = (y - (size - 1) as f64 / 2.0).round() as i64;
        for dy in 0..size {
            for dx in 0..size {
                self.plot(x0 + dx, y0 + dy, color);
            }
        }
    }

    /// Straight segment stamped with `width`-pixel dots at sub-pixel steps.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), width: usize, color: [u8; 3]) {
        let len = (to.0 - from.0).hypot(to.1 - from.1);
        let steps = (len * 2.0).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.dot(x, y, width, color);
        }
    }

    /// Connect consecutive points. Segments that jump farther than `max_jump`
    /// pixels are skipped so a curve leaving the visible disc does not get
    /// bridged across the image.
    pub fn polyline(&mut self, points: &[(f64, f64)], max_jump: f64, width: usize, color: [u8; 3]) {
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if (b.0 - a.0).hypot(b.1 - a.1) <= max_jump {
                self.line(a, b, width, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, 90, 255]);
            }
        }
        rgba
    }

    fn decode(bytes: &[u8]) -> (u32, u32, Vec<u8>) {
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let mut reader = decoder.read_info().expect("PNG should be decodable");
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).expect("frame should decode");
        assert_eq!(info.color_type, png::ColorType::Rgba);
        buf.truncate(info.buffer_size());
        (info.width, info.height, buf)
    }

    #[test]
    fn test_checksums() {
        assert_eq!(crc32(&[]), 0);
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(adler32(&[]), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn test_png_decodes_to_same_pixels() {
        let rgba = gradient(37, 19);
        let mut enc = PngEncoder::new();
        let (w, h, pixels) = decode(enc.encode(&rgba, 37, 19));
        assert_eq!((w, h), (37, 19));
        assert_eq!(pixels, rgba);
    }

    #[test]
    fn test_png_spanning_multiple_blocks() {
        // 200x100 RGBA is ~80 KB of scanlines, more than one stored block.
        let rgba = gradient(200, 100);
        let mut enc = PngEncoder::new();
        let (_, _, pixels) = decode(enc.encode(&rgba, 200, 100));
        assert_eq!(pixels, rgba);
    }

    #[test]
    fn test_encoder_reuse() {
        let mut enc = PngEncoder::new();
        let small = enc.encode(&gradient(4, 4), 4, 4).len();
        let big = enc.encode(&gradient(16, 16), 16, 16).len();
        assert!(big > small);
        let again = enc.encode(&gradient(4, 4), 4, 4).len();
        assert_eq!(again, small);
    }

    #[test]
    fn test_write_png_file() {
        let dir = std::env::temp_dir().join(format!("eyedome-raster-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("g.png");
        let rgba = gradient(8, 8);
        write_png(&path, &rgba, 8, 8).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(decode(&bytes).2, rgba);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_canvas_plot_ignores_out_of_bounds() {
        let mut c = Canvas::new(4, 3, [0, 0, 0]);
        c.plot(-1, 0, [255, 0, 0]);
        c.plot(4, 0, [255, 0, 0]);
        c.plot(1, 2, [255, 0, 0]);
        assert_eq!(c.get(1, 2), [255, 0, 0]);
        assert_eq!(c.pixels.iter().filter(|&&v| v == 255).count(), 4 * 3 + 1);
    }

    #[test]
    fn test_canvas_line_covers_endpoints() {
        let mut c = Canvas::new(20, 20, [0, 0, 0]);
        c.line((2.0, 3.0), (17.0, 12.0), 1, [9, 9, 9]);
        assert_eq!(c.get(2, 3), [9, 9, 9]);
        assert_eq!(c.get(17, 12), [9, 9, 9]);
        assert_eq!(c.get(17, 3), [0, 0, 0]);
    }

    #[test]
    fn test_polyline_skips_long_jumps() {
        let mut c = Canvas::new(20, 20, [0, 0, 0]);
        c.polyline(&[(1.0, 1.0), (3.0, 1.0), (18.0, 18.0)], 5.0, 1, [7, 7, 7]);
        assert_eq!(c.get(2, 1), [7, 7, 7]);
        assert_eq!(c.get(10, 10), [0, 0, 0]);
    }
}
