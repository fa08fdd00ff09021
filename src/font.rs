//! 5x7 bitmap font for the HUD line and calibration labels.

pub const FONT_WIDTH: usize = 5;
pub const FONT_HEIGHT: usize = 7;

/// HUD strip layout: padding around one line of text.
const HUD_PAD: usize = 3;
pub const HUD_HEIGHT: usize = HUD_PAD * 2 + FONT_HEIGHT;
const HUD_BACKGROUND: [u8; 3] = [0x0D, 0x0D, 0x0D];
const HUD_TEXT: [u8; 3] = [0x88, 0x88, 0x88];

/// Glyph rows, lower 5 bits per row, bit 4 is the leftmost column.
/// Covers digits and the letters the HUD prints; anything else renders blank.
const fn glyph(ch: u8) -> [u8; FONT_HEIGHT] {
    match ch {
        b'.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00],
        b'-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        b'=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        b'0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        b'1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        b'2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        b'3' => [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E],
        b'4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        b'5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        b'6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        b'7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        b'8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        b'9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        b'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        b'b' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        b'd' => [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        b'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        b'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        b'g' => [0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x0E],
        b'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        b'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        b'l' => [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        b'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        b'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        b'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        b'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        b's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        b't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        b'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        b'y' => [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        _ => [0x00; FONT_HEIGHT],
    }
}

fn put(buf: &mut [u8], frame_width: usize, x: usize, y: usize, color: [u8; 3]) {
    if x >= frame_width {
        return;
    }
    let offset = (y * frame_width + x) * 4;
    if offset + 3 < buf.len() {
        buf[offset..offset + 3].copy_from_slice(&color);
        buf[offset + 3] = 255;
    }
}

/// Width in pixels of `text` drawn at integer `scale`.
pub fn text_width(text: &str, scale: usize) -> usize {
    let n = text.len();
    if n == 0 { 0 } else { (n * (FONT_WIDTH + 1) - 1) * scale.max(1) }
}

/// Draw `text` with its top-left at (x, y), each font pixel blown up to a
/// `scale`x`scale` block. Returns the x position after the last character.
pub fn draw_text(buf: &mut [u8], frame_width: usize, x: usize, y: usize, text: &str, color: [u8; 3], scale: usize) -> usize {
    let scale = scale.max(1);
    let mut cx = x;
    for &ch in text.as_bytes() {
        let g = glyph(ch);
        for (row, bits) in g.iter().enumerate() {
            for col in 0..FONT_WIDTH {
                if bits & (1 << (FONT_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        put(buf, frame_width, cx + col * scale + sx, y + row * scale + sy, color);
                    }
                }
            }
        }
        cx += (FONT_WIDTH + 1) * scale;
    }
    cx
}

/// Dark strip across the top of the frame with one line of status text.
/// Text that does not fit is cut at the right edge.
pub fn draw_hud(buf: &mut [u8], frame_width: usize, frame_height: usize, text: &str) {
    let strip = HUD_HEIGHT.min(frame_height);
    for y in 0..strip {
        for x in 0..frame_width {
            put(buf, frame_width, x, y, HUD_BACKGROUND);
        }
    }
    let fits = (frame_width.saturating_sub(HUD_PAD)) / (FONT_WIDTH + 1);
    let shown: String = text.chars().take(fits).collect();
    draw_text(buf, frame_width, HUD_PAD + 1, HUD_PAD, &shown, HUD_TEXT, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyphs_present() {
        for ch in b"0123456789.=-abdefgiklnoprstuy".iter() {
            assert!(glyph(*ch).iter().any(|&r| r != 0), "glyph {:?} is blank", *ch as char);
        }
        assert!(glyph(b' ').iter().all(|&r| r == 0));
        assert!(glyph(b'?').iter().all(|&r| r == 0));
    }

    #[test]
    fn test_draw_text_advances_cursor() {
        let w = 64;
        let mut buf = vec![0u8; w * 16 * 4];
        let end = draw_text(&mut buf, w, 2, 2, "k=4", [255, 255, 255], 1);
        assert_eq!(end, 2 + 3 * (FONT_WIDTH + 1));
        assert!(buf.iter().step_by(4).any(|&v| v == 255));
    }

    #[test]
    fn test_scaled_text_is_bigger() {
        let w = 64;
        let mut one = vec![0u8; w * 32 * 4];
        let mut two = vec![0u8; w * 32 * 4];
        draw_text(&mut one, w, 0, 0, "45", [255, 0, 0], 1);
        draw_text(&mut two, w, 0, 0, "45", [255, 0, 0], 2);
        let lit = |b: &[u8]| b.chunks(4).filter(|p| p[0] == 255).count();
        assert_eq!(lit(&two), lit(&one) * 4);
        assert_eq!(text_width("45", 2), 22);
    }

    #[test]
    fn test_draw_text_clips_at_right_edge() {
        let w = 8;
        let mut buf = vec![0u8; w * 8 * 4];
        draw_text(&mut buf, w, 4, 0, "88", [255, 255, 255], 1);
        // Nothing wraps onto the next row.
        for y in 0..FONT_HEIGHT {
            for x in 0..4 {
                assert_eq!(buf[(y * w + x) * 4], 0, "pixel ({x},{y}) wrapped");
            }
        }
    }

    #[test]
    fn test_hud_strip_drawn() {
        let (w, h) = (120, 40);
        let mut buf = vec![0u8; w * h * 4];
        draw_hud(&mut buf, w, h, "polar k=2");
        assert_eq!(&buf[0..3], &HUD_BACKGROUND);
        let below = (HUD_HEIGHT * w) * 4;
        assert_eq!(buf[below + 3], 0, "HUD should not paint below its strip");
        let text_px = buf[..below].chunks(4).filter(|p| p[0] == HUD_TEXT[0]).count();
        assert!(text_px > 0);
    }
}
