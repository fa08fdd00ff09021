// Display surfaces: a minifb window and an iTerm2 terminal.

use std::io::{BufWriter, Stdout, Write};

use log::{info, warn};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::animation::{ControlInput, Nudge};
use crate::error::{Error, Result};
use crate::input::KeyDecoder;
use crate::iterm2::Iterm2Encoder;

/// Something the user did since the last poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Quit,
    Control(ControlInput),
    CycleDecimation,
    ToggleProjection,
    ToggleHud,
}

pub trait Surface {
    /// Pixel size frames should be rendered at.
    fn size(&self) -> (usize, usize);
    fn is_open(&self) -> bool;
    fn poll_events(&mut self) -> Vec<SurfaceEvent>;
    fn present(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()>;
}

/// Convert RGBA bytes to minifb's 0RGB words.
fn rgba_to_argb(rgba: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(rgba.chunks_exact(4).map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32));
}

pub struct WindowSurface {
    window: Window,
    argb: Vec<u32>,
}

impl WindowSurface {
    /// `fullscreen` opens a borderless, topmost window at the requested size.
    pub fn open(title: &str, width: usize, height: usize, fullscreen: bool, target_fps: usize) -> Result<Self> {
        let options = WindowOptions {
            borderless: fullscreen,
            topmost: fullscreen,
            resize: !fullscreen,
            ..WindowOptions::default()
        };
        let mut window = Window::new(title, width, height, options).map_err(|e| Error::SurfaceUnavailable(e.to_string()))?;
        window.set_target_fps(target_fps);
        info!("window {width}x{height} open (fullscreen: {fullscreen})");
        Ok(Self { window, argb: Vec::new() })
    }
}

/// Keys that fire once per press.
const WINDOW_KEYS: [(Key, SurfaceEvent); 9] = [
    (Key::Escape, SurfaceEvent::Quit),
    (Key::Q, SurfaceEvent::Quit),
    (Key::Space, SurfaceEvent::Control(ControlInput::Blink)),
    (Key::R, SurfaceEvent::Control(ControlInput::Recenter)),
    (Key::D, SurfaceEvent::CycleDecimation),
    (Key::P, SurfaceEvent::ToggleProjection),
    (Key::H, SurfaceEvent::ToggleHud),
    (Key::Equal, SurfaceEvent::Control(ControlInput::DilatePupil)),
    (Key::Minus, SurfaceEvent::Control(ControlInput::ConstrictPupil)),
];

/// Keys that auto-repeat while held.
const WINDOW_REPEAT_KEYS: [(Key, SurfaceEvent); 6] = [
    (Key::Up, SurfaceEvent::Control(ControlInput::Look(Nudge::Up))),
    (Key::Down, SurfaceEvent::Control(ControlInput::Look(Nudge::Down))),
    (Key::Left, SurfaceEvent::Control(ControlInput::Look(Nudge::Left))),
    (Key::Right, SurfaceEvent::Control(ControlInput::Look(Nudge::Right))),
    (Key::NumPadPlus, SurfaceEvent::Control(ControlInput::DilatePupil)),
    (Key::NumPadMinus, SurfaceEvent::Control(ControlInput::ConstrictPupil)),
];

impl Surface for WindowSurface {
    fn size(&self) -> (usize, usize) {
        self.window.get_size()
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        let mut events = Vec::new();
        for (key, event) in WINDOW_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::No) {
                events.push(event);
            }
        }
        for (key, event) in WINDOW_REPEAT_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::Yes) {
                events.push(event);
            }
        }
        events
    }

    fn present(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()> {
        rgba_to_argb(rgba, &mut self.argb);
        self.window
            .update_with_buffer(&self.argb, width, height)
            .map_err(|e| Error::SurfaceUnavailable(e.to_string()))
    }
}

/// Raw-mode stdin and pixel-size queries on unix terminals.
#[cfg(unix)]
mod raw_term {
    /// Restores the original termios settings on drop.
    pub struct RawTerminal {
        original: libc::termios,
    }

    impl RawTerminal {
        /// Disable ICANON and ECHO (ISIG stays on so Ctrl+C still works),
        /// with VMIN=0 VTIME=0. `None` when stdin is not a terminal.
        pub fn enter() -> Option<Self> {
            unsafe {
                let mut original = std::mem::zeroed::<libc::termios>();
                if libc::tcgetattr(libc::STDIN_FILENO, &mut original) != 0 {
                    return None;
                }
                let mut raw = original;
                raw.c_lflag &= !(libc::ICANON | libc::ECHO);
                raw.c_cc[libc::VMIN] = 0;
                raw.c_cc[libc::VTIME] = 0;
                if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
                    return None;
                }
                Some(Self { original })
            }
        }
    }

    impl Drop for RawTerminal {
        fn drop(&mut self) {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
            }
        }
    }

    /// Non-blocking read; 0 when nothing is waiting.
    pub fn read_stdin(buf: &mut [u8]) -> usize {
        unsafe {
            let flags = libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL);
            let _ = libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags | libc::O_NONBLOCK);
            let n = libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len());
            let _ = libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags);
            if n > 0 { n as usize } else { 0 }
        }
    }

    pub fn stdout_is_tty() -> bool {
        unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 }
    }

    /// Terminal size in pixels, if the terminal reports one.
    pub fn pixel_size() -> Option<(usize, usize)> {
        let mut ws = libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
        let ret = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
        if ret == 0 && ws.ws_xpixel > 0 && ws.ws_ypixel > 0 {
            Some((ws.ws_xpixel as usize, ws.ws_ypixel as usize))
        } else {
            None
        }
    }
}

#[cfg(not(unix))]
mod raw_term {
    pub struct RawTerminal;

    impl RawTerminal {
        pub fn enter() -> Option<Self> {
            None
        }
    }

    pub fn read_stdin(_buf: &mut [u8]) -> usize {
        0
    }

    pub fn stdout_is_tty() -> bool {
        false
    }

    pub fn pixel_size() -> Option<(usize, usize)> {
        None
    }
}

/// Fallback when the terminal does not report its pixel size.
const TERMINAL_FALLBACK: (usize, usize) = (800, 800);
/// Render cap; the terminal scales frames up to its own size.
const TERMINAL_MAX_RENDER_PIXELS: usize = 480 * 480;

/// Render size for a terminal of `term_w`x`term_h` pixels, capped at
/// `max_pixels` with the aspect ratio kept.
pub fn capped_render_dims(term_w: usize, term_h: usize, max_pixels: usize) -> (usize, usize) {
    let actual = term_w * term_h;
    let scale = if actual > max_pixels { (max_pixels as f64 / actual as f64).sqrt() } else { 1.0 };
    let rw = ((term_w as f64 * scale) as usize).max(2);
    let rh = ((term_h as f64 * scale) as usize).max(2);
    (rw, rh)
}

/// Frames as iTerm2 inline images on the alternate screen; keys from raw stdin.
pub struct TerminalSurface {
    out: BufWriter<Stdout>,
    _raw: Option<raw_term::RawTerminal>,
    decoder: KeyDecoder,
    encoder: Iterm2Encoder,
    term_size: (usize, usize),
    open: bool,
}

impl TerminalSurface {
    pub fn open() -> Result<Self> {
        if !raw_term::stdout_is_tty() {
            return Err(Error::SurfaceUnavailable("stdout is not a terminal".to_string()));
        }
        let term_size = raw_term::pixel_size().unwrap_or_else(|| {
            warn!("terminal did not report a pixel size; assuming {}x{}", TERMINAL_FALLBACK.0, TERMINAL_FALLBACK.1);
            TERMINAL_FALLBACK
        });
        let mut out = BufWriter::with_capacity(4 * 1024 * 1024, std::io::stdout());
        // Alternate screen, hidden cursor, cleared.
        out.write_all(b"\x1b[?1049h\x1b[?25l\x1b[2J")?;
        out.flush()?;
        let raw = raw_term::RawTerminal::enter();
        if raw.is_none() {
            warn!("stdin is not a terminal; keyboard input disabled");
        }
        info!("terminal surface {}x{} px", term_size.0, term_size.1);
        Ok(Self {
            out,
            _raw: raw,
            decoder: KeyDecoder::new(),
            encoder: Iterm2Encoder::new(),
            term_size,
            open: true,
        })
    }
}

impl Surface for TerminalSurface {
    fn size(&self) -> (usize, usize) {
        capped_render_dims(self.term_size.0, self.term_size.1, TERMINAL_MAX_RENDER_PIXELS)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        let mut buf = [0u8; 64];
        let n = raw_term::read_stdin(&mut buf);
        let events: Vec<SurfaceEvent> = self.decoder.feed(&buf[..n]).into_iter().filter_map(|k| k.event()).collect();
        if events.contains(&SurfaceEvent::Quit) {
            self.open = false;
        }
        events
    }

    fn present(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()> {
        let seq = self.encoder.encode(rgba, width, height, self.term_size.0, self.term_size.1);
        let written = self
            .out
            .write_all(b"\x1b[H")
            .and_then(|_| self.out.write_all(seq))
            .and_then(|_| self.out.flush());
        written.map_err(|e| {
            self.open = false;
            Error::SurfaceUnavailable(format!("terminal write failed: {e}"))
        })
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        // Show cursor, leave the alternate screen. Raw mode is restored by its own guard.
        let _ = self.out.write_all(b"\x1b[?25h\x1b[?1049l");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_to_argb() {
        let mut out = Vec::new();
        rgba_to_argb(&[0x12, 0x34, 0x56, 0xFF, 1, 2, 3, 0], &mut out);
        assert_eq!(out, vec![0x0012_3456, 0x0001_0203]);
    }

    #[test]
    fn test_capped_render_dims_small_terminal() {
        assert_eq!(capped_render_dims(320, 200, 480 * 480), (320, 200));
    }

    #[test]
    fn test_capped_render_dims_large_terminal() {
        let (w, h) = capped_render_dims(2400, 1600, 480 * 480);
        assert!(w * h <= 480 * 480);
        let aspect = w as f64 / h as f64;
        assert!((aspect - 1.5).abs() < 0.01, "aspect drifted: {aspect}");
    }

    #[test]
    fn test_capped_render_dims_minimum() {
        assert_eq!(capped_render_dims(1, 1, 480 * 480), (2, 2));
    }

    #[test]
    fn test_pixel_size_query_does_not_panic() {
        // Under a test harness stdout is usually not a terminal.
        let _ = raw_term::pixel_size();
        let _ = raw_term::stdout_is_tty();
    }

    #[test]
    fn test_window_keymap_covers_controls() {
        let all: Vec<SurfaceEvent> = WINDOW_KEYS.iter().chain(WINDOW_REPEAT_KEYS.iter()).map(|(_, e)| *e).collect();
        for e in [
            SurfaceEvent::Quit,
            SurfaceEvent::CycleDecimation,
            SurfaceEvent::ToggleHud,
            SurfaceEvent::Control(ControlInput::Blink),
            SurfaceEvent::Control(ControlInput::Recenter),
            SurfaceEvent::Control(ControlInput::Look(Nudge::Up)),
            SurfaceEvent::Control(ControlInput::DilatePupil),
            SurfaceEvent::Control(ControlInput::ConstrictPupil),
        ] {
            assert!(all.contains(&e), "{e:?} has no key");
        }
    }
}
