//! iTerm2 inline-image encoder for the terminal surface.
//!
//! Each frame becomes `ESC ] 1337 ; File=... : <base64 png> BEL`. The PNG is
//! built with the stored-block encoder from `raster`, which keeps per-frame
//! cost at a memcpy plus checksums.
use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::raster::PngEncoder;

#[derive(Default)]
pub struct Iterm2Encoder {
    png: PngEncoder,
    b64: String,
    seq: Vec<u8>,
}

impl Iterm2Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the escape sequence for an RGBA frame of `width`x`height`,
    /// asking the terminal to scale it to `disp_w`x`disp_h` pixels.
    pub fn encode(&mut self, rgba: &[u8], width: usize, height: usize, disp_w: usize, disp_h: usize) -> &[u8] {
        let png = self.png.encode(rgba, width, height);
        self.b64.clear();
        STANDARD.encode_string(png, &mut self.b64);

        self.seq.clear();
        // Writing into a Vec cannot fail.
        let _ = write!(
            self.seq,
            "\x1b]1337;File=inline=1;size={};width={}px;height={}px;preserveAspectRatio=0:{}\x07",
            png.len(),
            disp_w,
            disp_h,
            self.b64,
        );
        &self.seq
    }
}
