use dlo_core::{nalgebra::Point3, PointCloud};
use dlo_optimize::HildrethSolver;
use dlo_tracking::{DloTracker, TrackerSettings, TrackingFrame};
use log::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Clone)]
#[structopt(name = "dlo-sandbox", about = "A tool for testing DLO tracking on a synthetic cable")]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `dlo_tracking::TrackerSettings`.
    #[structopt(short, long, default_value = "dlo-settings.json")]
    settings: PathBuf,
    /// The number of frames to track after initialization
    #[structopt(short, long, default_value = "50")]
    frames: usize,
    /// The number of points observed per frame
    #[structopt(long, default_value = "400")]
    points: usize,
    /// The half width of the uniform noise added to every coordinate
    #[structopt(long, default_value = "0.002")]
    noise: f64,
    /// The fraction of the cable, around its middle, hidden from the sensor
    #[structopt(long, default_value = "0.0")]
    occlusion: f64,
    /// The length of the cable
    #[structopt(long, default_value = "0.5")]
    length: f64,
    /// The seed of the noise generator
    #[structopt(long, default_value = "5")]
    seed: u64,
    /// The maximum number of sweeps of the quadratic program solver
    #[structopt(long, default_value = "10000")]
    solver_iterations: usize,
    /// Output JSON file to deposit the tracked frames
    #[structopt(short, long)]
    output: Option<PathBuf>,
}

/// A cable lying across the view with a wave travelling along it.
fn cable(opt: &Opt, t: f64, frame: usize) -> Point3<f64> {
    let phase = 0.15 * frame as f64;
    let wave = 0.03 * (2.0 * std::f64::consts::PI * t - phase).sin();
    Point3::new(opt.length * (t - 0.5), wave, 0.8 + 0.5 * wave)
}

fn observe(opt: &Opt, frame: usize, rng: &mut Pcg64) -> PointCloud {
    let hidden = (0.5 - 0.5 * opt.occlusion)..(0.5 + 0.5 * opt.occlusion);
    (0..opt.points)
        .map(|i| i as f64 / opt.points.saturating_sub(1).max(1) as f64)
        .filter(|t| !hidden.contains(t))
        .map(|t| {
            let mut point = cable(opt, t, frame);
            if opt.noise > 0.0 {
                for k in 0..3 {
                    point[k] += rng.gen_range(-opt.noise..opt.noise);
                }
            }
            point
        })
        .collect()
}

/// Mean distance from the tracked nodes to the true cable.
fn tracking_error(opt: &Opt, frame: &TrackingFrame, index: usize) -> f64 {
    let truth: Vec<_> = (0..=1000)
        .map(|i| cable(opt, i as f64 / 1000.0, index))
        .collect();
    frame
        .nodes
        .iter()
        .map(|node| {
            truth
                .iter()
                .map(|p| (p - node).norm())
                .fold(f64::INFINITY, f64::min)
        })
        .sum::<f64>()
        / frame.nodes.len().max(1) as f64
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let settings: TrackerSettings = settings.unwrap_or_default();

    let solver = HildrethSolver::new().max_iterations(opt.solver_iterations);
    let mut tracker = DloTracker::new(settings, solver);
    let mut rng = Pcg64::seed_from_u64(opt.seed);

    let mut frames = Vec::with_capacity(opt.frames + 1);
    match tracker.initialize(&observe(&opt, 0, &mut rng)) {
        Ok(frame) => {
            info!(
                "initialized with mean error {:.5}",
                tracking_error(&opt, &frame, 0)
            );
            frames.push(frame);
        }
        Err(e) => {
            error!("unable to initialize tracking: {}", e);
            return;
        }
    }

    let mut degraded = 0;
    for index in 1..=opt.frames {
        match tracker.track(&observe(&opt, index, &mut rng)) {
            Ok(frame) => {
                if frame.is_degraded() {
                    degraded += 1;
                }
                info!(
                    "frame {} mean error {:.5} sigma2 {:.3e} constraints {}{}",
                    index,
                    tracking_error(&opt, &frame, index),
                    frame.sigma2,
                    frame.constraints,
                    frame
                        .visible
                        .as_ref()
                        .map(|visible| format!(" visible {}", visible.len()))
                        .unwrap_or_default()
                );
                frames.push(frame);
            }
            Err(e) => {
                error!("frame {} could not be tracked: {}", index, e);
                return;
            }
        }
    }
    info!("tracked {} frames, {} degraded", opt.frames, degraded);

    if let Some(path) = &opt.output {
        info!("exporting the tracked frames");
        match std::fs::File::create(path) {
            Ok(file) => {
                if let Err(e) = serde_json::to_writer_pretty(file, &frames) {
                    error!("unable to save tracked frames: {}", e);
                }
            }
            Err(e) => error!("unable to create {}: {}", path.display(), e),
        }
    }
}
