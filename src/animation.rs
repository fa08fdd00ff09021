// Eye animation: gaze saccades, blink cycle, pupil size.
//
// Three independently timed actors advanced by one logical clock. All state
// lives in the controller; the renderer only sees `EyeState` snapshots.

use rand::Rng;

use crate::projection::{Direction, Orientation};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationTiming {
    /// Fixation length range in seconds.
    pub saccade_interval: (f64, f64),
    pub saccade_duration: f64,
    /// Gaze limit for yaw and pitch, radians.
    pub max_gaze: f64,
    /// Target offset per manual nudge, radians.
    pub gaze_step: f64,
    /// Time between blinks, seconds.
    pub blink_interval: (f64, f64),
    pub blink_close: f64,
    pub blink_hold: f64,
    pub blink_open: f64,
    pub pupil_range: (f64, f64),
    pub pupil_step: f64,
    pub pupil_initial: f64,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            saccade_interval: (2.0, 5.0),
            saccade_duration: 0.12,
            max_gaze: 30f64.to_radians(),
            gaze_step: 0.1,
            blink_interval: (3.0, 6.0),
            blink_close: 0.08,
            blink_hold: 0.05,
            blink_open: 0.15,
            pupil_range: (0.18, 0.36),
            pupil_step: 0.02,
            pupil_initial: 0.3,
        }
    }
}

/// Gaze angles: yaw positive toward +x, pitch positive toward +y.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gaze {
    pub yaw: f64,
    pub pitch: f64,
}

impl Gaze {
    pub const CENTER: Gaze = Gaze { yaw: 0.0, pitch: 0.0 };

    fn lerp(self, to: Gaze, t: f64) -> Gaze {
        Gaze {
            yaw: self.yaw + (to.yaw - self.yaw) * t,
            pitch: self.pitch + (to.pitch - self.pitch) * t,
        }
    }

    fn clamped(self, limit: f64) -> Gaze {
        Gaze {
            yaw: self.yaw.clamp(-limit, limit),
            pitch: self.pitch.clamp(-limit, limit),
        }
    }

    pub fn frame(self) -> Orientation {
        Orientation::looking_at(self.yaw, self.pitch)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GazePhase {
    Fixating { until: f64 },
    Saccading { from: Gaze, to: Gaze, started: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LidPhase {
    Open { until: f64 },
    /// Closing from aperture `from` (1.0 unless interrupted mid-opening).
    Closing { from: f64, started: f64 },
    Closed { until: f64 },
    Opening { started: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nudge {
    Up,
    Down,
    Left,
    Right,
}

/// Manual controls delivered by the surface once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlInput {
    Look(Nudge),
    Recenter,
    Blink,
    DilatePupil,
    ConstrictPupil,
}

/// Per-frame snapshot consumed by the pattern synthesizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeState {
    pub gaze: Direction,
    /// Rotation taking `Direction::FORWARD` onto `gaze`.
    pub gaze_frame: Orientation,
    /// Eyelid openness, 0.0 closed to 1.0 open.
    pub aperture: f64,
    /// Pupil radius as a fraction of the iris radius.
    pub pupil: f64,
    pub next_saccade_at: Option<f64>,
    pub next_blink_at: Option<f64>,
}

impl EyeState {
    /// Looking straight ahead with lids fully open.
    #[cfg(test)]
    pub fn centered(pupil: f64) -> Self {
        Self {
            gaze: Direction::FORWARD,
            gaze_frame: Orientation::IDENTITY,
            aperture: 1.0,
            pupil,
            next_saccade_at: None,
            next_blink_at: None,
        }
    }
}

// Floor on phase durations so a zero-length phase cannot stall the clock.
const MIN_PHASE: f64 = 1e-3;

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub struct AnimationController<R: Rng> {
    rng: R,
    timing: AnimationTiming,
    now: f64,
    gaze: Gaze,
    target: Gaze,
    gaze_phase: GazePhase,
    lid_phase: LidPhase,
    pupil: f64,
}

impl<R: Rng> AnimationController<R> {
    pub fn new(timing: AnimationTiming, mut rng: R) -> Self {
        let fixation = draw(&mut rng, timing.saccade_interval);
        let open = draw(&mut rng, timing.blink_interval);
        let (lo, hi) = timing.pupil_range;
        Self {
            rng,
            timing,
            now: 0.0,
            gaze: Gaze::CENTER,
            target: Gaze::CENTER,
            gaze_phase: GazePhase::Fixating { until: fixation },
            lid_phase: LidPhase::Open { until: open },
            pupil: timing.pupil_initial.clamp(lo, hi),
        }
    }

    /// Seconds of logical time elapsed since construction.
    pub fn now(&self) -> f64 {
        self.now
    }

    #[cfg(test)]
    pub fn gaze(&self) -> Gaze {
        self.gaze
    }

    #[cfg(test)]
    pub fn gaze_phase(&self) -> GazePhase {
        self.gaze_phase
    }

    #[cfg(test)]
    pub fn lid_phase(&self) -> LidPhase {
        self.lid_phase
    }

    /// Advance every actor by `dt` seconds. Negative or non-finite input is
    /// treated as no time passing.
    pub fn tick(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt;
        }
        self.advance_gaze();
        self.advance_lid();
    }

    pub fn apply(&mut self, input: ControlInput) {
        let step = self.timing.gaze_step;
        match input {
            ControlInput::Look(nudge) => {
                let mut target = self.target;
                match nudge {
                    Nudge::Up => target.pitch += step,
                    Nudge::Down => target.pitch -= step,
                    Nudge::Left => target.yaw -= step,
                    Nudge::Right => target.yaw += step,
                }
                self.command_gaze(target);
            }
            ControlInput::Recenter => self.command_gaze(Gaze::CENTER),
            ControlInput::Blink => match self.lid_phase {
                LidPhase::Open { .. } | LidPhase::Opening { .. } => {
                    let from = self.aperture();
                    self.lid_phase = LidPhase::Closing { from, started: self.now };
                }
                LidPhase::Closing { .. } | LidPhase::Closed { .. } => {}
            },
            ControlInput::DilatePupil => self.adjust_pupil(self.timing.pupil_step),
            ControlInput::ConstrictPupil => self.adjust_pupil(-self.timing.pupil_step),
        }
    }

    pub fn state(&self) -> EyeState {
        let frame = self.gaze.frame();
        EyeState {
            gaze: frame.rotate(Direction::FORWARD),
            gaze_frame: frame,
            aperture: self.aperture(),
            pupil: self.pupil,
            next_saccade_at: match self.gaze_phase {
                GazePhase::Fixating { until } => Some(until),
                GazePhase::Saccading { .. } => None,
            },
            next_blink_at: match self.lid_phase {
                LidPhase::Open { until } => Some(until),
                _ => None,
            },
        }
    }

    pub fn aperture(&self) -> f64 {
        let a = match self.lid_phase {
            LidPhase::Open { .. } => 1.0,
            LidPhase::Closing { from, started } => {
                let d = self.close_duration(from);
                from * (1.0 - (self.now - started) / d)
            }
            LidPhase::Closed { .. } => 0.0,
            LidPhase::Opening { started } => (self.now - started) / self.timing.blink_open.max(MIN_PHASE),
        };
        a.clamp(0.0, 1.0)
    }

    fn close_duration(&self, from: f64) -> f64 {
        (self.timing.blink_close * from).max(MIN_PHASE)
    }

    /// Cancel any in-flight saccade and head for `target` from where the eye is now.
    fn command_gaze(&mut self, target: Gaze) {
        self.target = target.clamped(self.timing.max_gaze);
        self.gaze_phase = GazePhase::Saccading {
            from: self.gaze,
            to: self.target,
            started: self.now,
        };
        self.advance_gaze();
    }

    fn adjust_pupil(&mut self, delta: f64) {
        let (lo, hi) = self.timing.pupil_range;
        self.pupil = (self.pupil + delta).clamp(lo, hi);
    }

    fn advance_gaze(&mut self) {
        let duration = self.timing.saccade_duration.max(MIN_PHASE);
        loop {
            match self.gaze_phase {
                GazePhase::Fixating { until } if self.now >= until => {
                    let limit = self.timing.max_gaze;
                    let to = Gaze {
                        yaw: self.rng.gen_range(-limit..=limit),
                        pitch: self.rng.gen_range(-limit..=limit),
                    };
                    self.target = to;
                    self.gaze_phase = GazePhase::Saccading { from: self.gaze, to, started: until };
                }
                GazePhase::Fixating { .. } => break,
                GazePhase::Saccading { from, to, started } => {
                    let t = (self.now - started) / duration;
                    if t >= 1.0 {
                        self.gaze = to;
                        let rest = draw(&mut self.rng, self.timing.saccade_interval);
                        self.gaze_phase = GazePhase::Fixating { until: started + duration + rest };
                    } else {
                        self.gaze = from.lerp(to, smoothstep(t));
                        break;
                    }
                }
            }
        }
    }

    fn advance_lid(&mut self) {
        let hold = self.timing.blink_hold.max(MIN_PHASE);
        let open = self.timing.blink_open.max(MIN_PHASE);
        loop {
            self.lid_phase = match self.lid_phase {
                LidPhase::Open { until } if self.now >= until => {
                    LidPhase::Closing { from: 1.0, started: until }
                }
                LidPhase::Closing { from, started } => {
                    let end = started + self.close_duration(from);
                    if self.now < end {
                        break;
                    }
                    LidPhase::Closed { until: end + hold }
                }
                LidPhase::Closed { until } if self.now >= until => LidPhase::Opening { started: until },
                LidPhase::Opening { started } if self.now >= started + open => {
                    let rest = draw(&mut self.rng, self.timing.blink_interval);
                    LidPhase::Open { until: started + open + rest }
                }
                _ => break,
            };
        }
    }
}

fn draw<R: Rng>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    let lo = lo.max(MIN_PHASE);
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}
