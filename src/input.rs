use log::warn;

use crate::animation::{ControlInput, Nudge};
use crate::surface::SurfaceEvent;

/// Terminal key event parsed from raw stdin bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermKey {
    Space,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Char(char),
}

/// Parse one key from the front of `buf`.
/// Returns `(parsed_key, bytes_consumed)`. `consumed=0` means need more data.
pub fn parse_key(buf: &[u8]) -> (Option<TermKey>, usize) {
    if buf.is_empty() {
        return (None, 0);
    }
    match buf[0] {
        0x1b => {
            if buf.len() < 2 || buf[1] != b'[' {
                return (Some(TermKey::Escape), 1);
            }
            // CSI: ESC [ <final>
            if buf.len() < 3 {
                return (None, 0);
            }
            let key = match buf[2] {
                b'A' => Some(TermKey::Up),
                b'B' => Some(TermKey::Down),
                b'C' => Some(TermKey::Right),
                b'D' => Some(TermKey::Left),
                _ => None,
            };
            (key, 3)
        }
        b' ' => (Some(TermKey::Space), 1),
        b'q' | b'r' | b'd' | b'p' | b'h' | b'+' | b'=' | b'-' => (Some(TermKey::Char(buf[0] as char)), 1),
        _ => (None, 1),
    }
}

impl TermKey {
    pub fn event(self) -> Option<SurfaceEvent> {
        let control = |c| Some(SurfaceEvent::Control(c));
        match self {
            TermKey::Escape | TermKey::Char('q') => Some(SurfaceEvent::Quit),
            TermKey::Space => control(ControlInput::Blink),
            TermKey::Up => control(ControlInput::Look(Nudge::Up)),
            TermKey::Down => control(ControlInput::Look(Nudge::Down)),
            TermKey::Left => control(ControlInput::Look(Nudge::Left)),
            TermKey::Right => control(ControlInput::Look(Nudge::Right)),
            TermKey::Char('r') => control(ControlInput::Recenter),
            TermKey::Char('+') | TermKey::Char('=') => control(ControlInput::DilatePupil),
            TermKey::Char('-') => control(ControlInput::ConstrictPupil),
            TermKey::Char('d') => Some(SurfaceEvent::CycleDecimation),
            TermKey::Char('p') => Some(SurfaceEvent::ToggleProjection),
            TermKey::Char('h') => Some(SurfaceEvent::ToggleHud),
            TermKey::Char(_) => None,
        }
    }
}

/// Accumulates stdin bytes across reads so escape sequences split between
/// two reads still decode.
pub struct KeyDecoder {
    pending: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self { pending: Vec::with_capacity(64) }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TermKey> {
        self.pending.extend_from_slice(bytes);
        let mut keys = Vec::new();
        let mut cursor = 0;
        while cursor < self.pending.len() {
            let (key, consumed) = parse_key(&self.pending[cursor..]);
            if consumed == 0 {
                break;
            }
            match key {
                Some(k) => keys.push(k),
                None => warn!("ignoring undecodable input {:02x?}", &self.pending[cursor..cursor + consumed]),
            }
            cursor += consumed;
        }
        self.pending.drain(..cursor);
        keys
    }
}
