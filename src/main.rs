mod animation;
mod calibration;
mod color;
mod config;
mod error;
mod font;
mod frame;
mod grid;
mod input;
mod iterm2;
mod pattern;
mod projection;
mod raster;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use animation::AnimationController;
use calibration::CalibrationGridGenerator;
use config::{Config, ContentKind};
use error::{Error, Result};
use frame::{Content, FrameRenderer};
use pattern::{EyeColor, PatternSynthesizer};
use surface::{Surface, SurfaceEvent, TerminalSurface, WindowSurface};

struct Defaults;

impl Defaults {
    const WINDOW_TITLE: &'static str = "eyedome";
    const FPS_LOG_INTERVAL: Duration = Duration::from_secs(5);
    /// Poll interval while the surface reports a zero size (minimized window).
    const IDLE_INTERVAL: Duration = Duration::from_millis(50);
}

/// Command-line overrides layered on top of the YAML config.
#[derive(Debug, Default, PartialEq)]
struct Args {
    windowed: bool,
    headless: bool,
    /// Set by `--harmonics` or `--globe`.
    content: Option<ContentKind>,
    color: Option<EyeColor>,
    l: Option<u32>,
    m: Option<i32>,
    k: Option<usize>,
    /// `Some(None)` means calibrate into the configured output directory.
    calibrate: Option<Option<PathBuf>>,
    config: Option<PathBuf>,
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid(format!("{key}= expects a number, got '{value}'")))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--windowed" => parsed.windowed = true,
            "--headless" => parsed.headless = true,
            "--harmonics" | "--globe" => {
                let kind = if arg == "--globe" { ContentKind::Globe } else { ContentKind::Harmonics };
                if parsed.content.is_some_and(|k| k != kind) {
                    return Err(Error::invalid("--harmonics and --globe are mutually exclusive"));
                }
                parsed.content = Some(kind);
            }
            "--calibrate" => {
                let dir = args.next_if(|next| !next.starts_with("--") && !next.contains('=')).map(PathBuf::from);
                parsed.calibrate = Some(dir);
            }
            "--config" => {
                let path = args.next().ok_or_else(|| Error::invalid("--config needs a path"))?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => match other.split_once('=') {
                Some(("color", v)) => parsed.color = Some(v.parse()?),
                Some(("l", v)) => parsed.l = Some(number("l", v)?),
                Some(("m", v)) => parsed.m = Some(number("m", v)?),
                Some(("k", v)) => parsed.k = Some(number("k", v)?),
                _ => return Err(Error::invalid(format!("unknown argument '{other}'"))),
            },
        }
    }
    Ok(parsed)
}

impl Args {
    fn apply(&self, cfg: &mut Config) {
        if self.windowed {
            cfg.display.fullscreen = false;
        }
        if let Some(kind) = self.content {
            cfg.content = kind;
        }
        if let Some(color) = self.color {
            cfg.eye.color = color.name().to_string();
        }
        if let Some(l) = self.l {
            cfg.harmonics.l = l;
        }
        if let Some(m) = self.m {
            cfg.harmonics.m = m;
        }
        if let Some(k) = self.k {
            cfg.display.decimation = k;
        }
    }
}

fn build_renderer(cfg: &Config, width: usize, height: usize) -> Result<FrameRenderer<StdRng>> {
    let projector = cfg.projector()?;
    let content = match cfg.content {
        ContentKind::Eyeball => Content::Eyeball(PatternSynthesizer::new(
            cfg.eye_color()?.palette(),
            cfg.eye_geometry(),
            projector.max_angle(),
        )),
        ContentKind::Harmonics => Content::Harmonics(cfg.harmonic_pattern()?),
        ContentKind::Globe => Content::Globe(cfg.globe_pattern()?),
    };
    let rng = match cfg.eye.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let animation = AnimationController::new(cfg.animation_timing(), rng);
    let mode = cfg.projection_mode();
    debug!("{} projection centered on {:?}", mode.kind.label(), mode.reference_axis());
    let mut renderer = FrameRenderer::new(content, animation, cfg.viewport(width, height), projector)
        .with_mode(mode)
        .with_hud(cfg.display.hud);
    renderer.set_decimation(cfg.decimation()?);
    Ok(renderer)
}

fn run_loop(surface: &mut dyn Surface, renderer: &mut FrameRenderer<StdRng>, running: &AtomicBool, target_fps: usize) -> Result<()> {
    let frame_interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
    let start = Instant::now();
    let mut frames = 0u32;
    let mut fps_mark = Instant::now();

    while running.load(Ordering::SeqCst) && surface.is_open() {
        let frame_start = Instant::now();

        for event in surface.poll_events() {
            match event {
                SurfaceEvent::Quit => running.store(false, Ordering::SeqCst),
                SurfaceEvent::Control(input) => renderer.apply(input),
                SurfaceEvent::CycleDecimation => {
                    let k = renderer.cycle_decimation();
                    info!("decimation k={}", k.get());
                }
                SurfaceEvent::ToggleProjection => {
                    renderer.toggle_projection();
                    info!("projection {}", renderer.mode().kind.label());
                }
                SurfaceEvent::ToggleHud => renderer.toggle_hud(),
            }
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let (w, h) = surface.size();
        if w == 0 || h == 0 {
            std::thread::sleep(Defaults::IDLE_INTERVAL);
            continue;
        }
        renderer.resize(w, h);
        let rgba = renderer.render_frame(start.elapsed().as_secs_f64());
        surface.present(rgba, w, h)?;

        frames += 1;
        let since = fps_mark.elapsed();
        if since >= Defaults::FPS_LOG_INTERVAL {
            let fps = frames as f64 / since.as_secs_f64();
            info!("{fps:.1} fps at {w}x{h}, k={}", renderer.decimation().get());
            renderer.set_fps(fps);
            frames = 0;
            fps_mark = Instant::now();
        }

        let spent = frame_start.elapsed();
        if spent < frame_interval {
            std::thread::sleep(frame_interval - spent);
        }
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let mut cfg = config::load(args.config.as_deref())?;
    args.apply(&mut cfg);
    cfg.validate()?;

    if let Some(dir) = &args.calibrate {
        let dir = dir.clone().unwrap_or_else(|| cfg.calibration.output_dir.clone());
        let generator = CalibrationGridGenerator::new(cfg.calibration.clone(), cfg.projector()?);
        let written = generator.write_artifacts(&dir)?;
        info!("calibration: {} files in {}", written.len(), dir.display());
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        warn!("could not install Ctrl+C handler: {e}");
    }

    let mut surface: Box<dyn Surface> = if args.headless {
        Box::new(TerminalSurface::open()?)
    } else {
        let d = &cfg.display;
        Box::new(WindowSurface::open(Defaults::WINDOW_TITLE, d.width, d.height, d.fullscreen, d.target_fps)?)
    };

    let (w, h) = surface.size();
    let mut renderer = build_renderer(&cfg, w.max(1), h.max(1))?;
    info!(
        "rendering {:?} content, {} projection, k={}, {} fps target",
        cfg.content,
        renderer.mode().kind.label(),
        renderer.decimation().get(),
        cfg.display.target_fps,
    );
    run_loop(surface.as_mut(), &mut renderer, &running, cfg.display.target_fps)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ControlInput;
    use crate::color::ColorMap;
    use crate::grid::DecimationFactor;
    use crate::projection::ProjectionKind;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_flags_and_overrides() {
        let a = args(&["--windowed", "--harmonics", "color=blue", "l=3", "m=-2", "k=4"]).unwrap();
        assert!(a.windowed && !a.headless);
        assert_eq!(a.content, Some(ContentKind::Harmonics));
        assert_eq!(a.color, Some(EyeColor::Blue));
        assert_eq!((a.l, a.m, a.k), (Some(3), Some(-2), Some(4)));
    }

    #[test]
    fn test_parse_calibrate_with_and_without_dir() {
        assert_eq!(args(&["--calibrate"]).unwrap().calibrate, Some(None));
        assert_eq!(args(&["--calibrate", "out"]).unwrap().calibrate, Some(Some(PathBuf::from("out"))));
        let a = args(&["--calibrate", "--headless"]).unwrap();
        assert_eq!(a.calibrate, Some(None));
        assert!(a.headless);
        let a = args(&["--calibrate", "k=2"]).unwrap();
        assert_eq!(a.calibrate, Some(None));
        assert_eq!(a.k, Some(2));
    }

    #[test]
    fn test_parse_config_path() {
        assert_eq!(args(&["--config", "dome.yaml"]).unwrap().config, Some(PathBuf::from("dome.yaml")));
        assert!(args(&["--config"]).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(args(&["color=purple"]), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(args(&["k=two"]), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(args(&["--fast"]), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(args(&["--globe", "--harmonics"]), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_globe_flag() {
        let a = args(&["--globe", "--windowed"]).unwrap();
        assert_eq!(a.content, Some(ContentKind::Globe));
        let mut cfg = Config::default();
        a.apply(&mut cfg);
        assert_eq!(cfg.content, ContentKind::Globe);
        cfg.validate().unwrap();

        // Odd size at full resolution puts a sample row on the prime meridian.
        cfg.display.decimation = 1;

        let mut r = build_renderer(&cfg, 41, 41).unwrap();
        let buf = r.render_frame(0.0).to_vec();
        assert_eq!(&buf[0..4], &[0, 0, 0, 255]);
        assert!(buf.chunks_exact(4).any(|p| p == [0, 255, 0, 255]), "prime meridian missing");
    }

    #[test]
    fn test_apply_overrides() {
        let mut cfg = Config::default();
        args(&["--windowed", "--harmonics", "color=gray", "l=4", "m=2", "k=8"]).unwrap().apply(&mut cfg);
        assert!(!cfg.display.fullscreen);
        assert_eq!(cfg.content, ContentKind::Harmonics);
        assert_eq!(cfg.eye_color().unwrap(), EyeColor::Gray);
        assert_eq!((cfg.harmonics.l, cfg.harmonics.m), (4, 2));
        assert_eq!(cfg.display.decimation, 8);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_zero_decimation_rejected_after_override() {
        let mut cfg = Config::default();
        args(&["k=0"]).unwrap().apply(&mut cfg);
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_build_renderer_eyeball() {
        let mut cfg = Config::default();
        cfg.eye.seed = Some(7);
        let mut r = build_renderer(&cfg, 64, 48).unwrap();
        assert_eq!(r.decimation(), DecimationFactor::new(2).unwrap());
        assert_eq!(r.render_frame(0.0).len(), 64 * 48 * 4);
        r.apply(ControlInput::Blink);
        r.render_frame(0.05);
        assert!(r.eye_state().aperture < 1.0);
    }

    #[test]
    fn test_build_renderer_harmonics() {
        let mut cfg = Config::default();
        cfg.content = ContentKind::Harmonics;
        cfg.harmonics.colormap = ColorMap::OceanLava;
        cfg.display.projection = ProjectionKind::Standard;
        let mut r = build_renderer(&cfg, 40, 40).unwrap();
        assert_eq!(r.mode().kind, ProjectionKind::Standard);
        let buf = r.render_frame(0.0).to_vec();
        // Corners fall outside the disc.
        assert_eq!(&buf[0..4], &[0, 0, 0, 255]);
    }

    /// Scripted surface: replays queued events and counts presented frames.
    struct FakeSurface {
        events: Vec<Vec<SurfaceEvent>>,
        presented: usize,
    }

    impl Surface for FakeSurface {
        fn size(&self) -> (usize, usize) {
            (32, 24)
        }

        fn is_open(&self) -> bool {
            true
        }

        fn poll_events(&mut self) -> Vec<SurfaceEvent> {
            if self.events.is_empty() { vec![SurfaceEvent::Quit] } else { self.events.remove(0) }
        }

        fn present(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()> {
            assert_eq!(rgba.len(), width * height * 4);
            self.presented += 1;
            Ok(())
        }
    }

    /// Surface whose window went away: every present fails.
    struct LostSurface {
        presents: usize,
    }

    impl Surface for LostSurface {
        fn size(&self) -> (usize, usize) {
            (16, 16)
        }

        fn is_open(&self) -> bool {
            true
        }

        fn poll_events(&mut self) -> Vec<SurfaceEvent> {
            Vec::new()
        }

        fn present(&mut self, _rgba: &[u8], _width: usize, _height: usize) -> Result<()> {
            self.presents += 1;
            Err(Error::SurfaceUnavailable("window closed".to_string()))
        }
    }

    #[test]
    fn test_run_loop_stops_on_lost_surface() {
        let mut cfg = Config::default();
        cfg.eye.seed = Some(5);
        let mut renderer = build_renderer(&cfg, 16, 16).unwrap();
        let mut surface = LostSurface { presents: 0 };
        let running = AtomicBool::new(true);
        let result = run_loop(&mut surface, &mut renderer, &running, 1000);
        assert!(matches!(result, Err(Error::SurfaceUnavailable(_))), "{result:?}");
        assert_eq!(surface.presents, 1);
        assert!(running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_loop_handles_events_until_quit() {
        let mut cfg = Config::default();
        cfg.eye.seed = Some(1);
        let mut renderer = build_renderer(&cfg, 32, 24).unwrap();
        let mut surface = FakeSurface {
            events: vec![vec![SurfaceEvent::CycleDecimation], vec![SurfaceEvent::ToggleProjection, SurfaceEvent::ToggleHud]],
            presented: 0,
        };
        let running = AtomicBool::new(true);
        run_loop(&mut surface, &mut renderer, &running, 1000).unwrap();
        assert_eq!(surface.presented, 2);
        assert_eq!(renderer.decimation().get(), 4);
        assert_eq!(renderer.mode().kind, ProjectionKind::Standard);
        assert!(!running.load(Ordering::SeqCst));
    }
}
