//! depthsync CLI
//!
//! Drives synthetic live and recorded sessions through the coordinator.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use depthsync::{
    config::Config,
    source::{
        synthetic::{self, CameraOutputs},
        CameraConfig, PinholeProjection, SyntheticCamera,
    },
    stats::{read_persisted, SessionStats},
    sync::{device_index, group_devices, SeekOrigin},
    Coordinator, StreamId, StreamKind, SubjectId, SyncEvent, WaitStatus, VERSION,
};

#[derive(Parser)]
#[command(name = "depthsync")]
#[command(version = VERSION)]
#[command(about = "Depth-sensor stream synchronization and pose triggers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Discipline {
    /// Wait for every generating stream each tick
    All,
    /// Advance the first depth stream only; others are picked up if ready
    One,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live session fed by synthetic cameras
    Run {
        /// Number of simulated devices
        #[arg(long, default_value = "1")]
        devices: usize,

        /// Stop after this many ticks (runs until Ctrl+C if omitted)
        #[arg(long)]
        ticks: Option<u64>,

        /// Waiting discipline
        #[arg(long, value_enum, default_value = "all")]
        discipline: Discipline,

        /// Frame width
        #[arg(long, default_value = "160")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "120")]
        height: u32,

        /// Mirror every stream's output
        #[arg(long)]
        mirror: bool,
    },

    /// Replay a synthetic recording
    Play {
        /// Frames per recorded track
        #[arg(long, default_value = "90")]
        frames: u64,

        /// Playback multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Stop at end of data instead of looping
        #[arg(long)]
        no_repeat: bool,

        /// Pace delivery by recorded timestamps
        #[arg(long)]
        realtime: bool,
    },

    /// Group instance identities (e.g. Depth1 Image1 Depth2) into devices
    Devices {
        /// Instance identities reported by the sensor runtime
        names: Vec<String>,
    },

    /// Show configuration
    Config,

    /// Show statistics from previous sessions
    Status,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            devices,
            ticks,
            discipline,
            width,
            height,
            mirror,
        } => cmd_run(devices, ticks, discipline, width, height, mirror),
        Commands::Play {
            frames,
            speed,
            no_repeat,
            realtime,
        } => cmd_play(frames, speed, !no_repeat, realtime),
        Commands::Devices { names } => {
            cmd_devices(&names);
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("using default configuration: {e}");
            Config::default()
        }
    }
}

fn cmd_run(
    devices: usize,
    ticks: Option<u64>,
    discipline: Discipline,
    width: u32,
    height: u32,
    mirror: bool,
) -> anyhow::Result<()> {
    println!("depthsync v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("could not create directories: {e}");
    }

    let stats = Arc::new(SessionStats::with_persistence(config.stats_path()));
    let mut coordinator = Coordinator::live(config.clone())
        .with_projection(Box::new(PinholeProjection::for_resolution(width, height)))
        .with_stats(stats.clone());
    let events = coordinator.subscribe();

    println!("Starting live session {}", coordinator.session_id());
    println!("  Devices: {devices}");
    println!("  Resolution: {width}x{height}");
    println!("  Discipline: {discipline:?}");
    println!("  Mirror: {mirror}");
    println!("  Wait timeout: {}ms", config.wait_timeout.as_millis());
    println!();

    let mut cameras = Vec::with_capacity(devices);
    let mut depth_streams = Vec::with_capacity(devices);
    for device in 0..devices.max(1) {
        let suffix = device + 1;
        let depth = coordinator.register_stream(&format!("Depth{suffix}"), StreamKind::Depth)?;
        let image = coordinator.register_stream(&format!("Image{suffix}"), StreamKind::Image)?;
        coordinator.set_viewpoint(depth, image)?;

        let camera_config = CameraConfig {
            width,
            height,
            max_depth: config.max_depth,
            subject: SubjectId(device as u32 + 1),
            ..Default::default()
        };
        let outputs = CameraOutputs {
            depth: Some(coordinator.frame_sink(depth)?),
            image: Some(coordinator.frame_sink(image)?),
            joints: Some(coordinator.joint_sink()),
        };
        cameras.push((SyntheticCamera::new(camera_config), outputs));
        depth_streams.push(depth);
    }

    coordinator.set_global_mirror(mirror)?;

    for bundle in coordinator.device_bundles() {
        println!(
            "Device {}: image {:?}, depth {:?}",
            bundle.index, bundle.image, bundle.depth
        );
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    coordinator.start_all()?;
    for (camera, outputs) in &mut cameras {
        camera.start(outputs.clone())?;
    }

    let region = depthsync::SharedRegion::new();
    let monitor = spawn_monitor(region.reader(), running.clone());

    let primary = depth_streams[0];
    let mut crossed_before = false;
    while running.load(Ordering::SeqCst) && ticks.map_or(true, |t| coordinator.tick() < t) {
        let status = match discipline {
            Discipline::All => coordinator.wait_and_update_all()?,
            Discipline::One => coordinator.wait_for_one(primary)?,
        };

        match status {
            WaitStatus::Ready => {
                coordinator.publish_to(&region);
                report_tick(&coordinator, primary, &mut crossed_before);
            }
            WaitStatus::NoData => tracing::warn!("no frames within the wait timeout"),
            WaitStatus::EndOfStream => break,
        }

        for event in events.receiver.try_iter() {
            if let SyncEvent::Stream(event) = event {
                tracing::debug!(?event, "stream event");
            }
        }
    }

    println!();
    println!("Stopping session...");
    running.store(false, Ordering::SeqCst);
    for (camera, _) in &mut cameras {
        camera.stop();
    }
    coordinator.stop_all()?;
    if monitor.join().is_err() {
        tracing::warn!("shared state monitor panicked");
    }

    for stream in coordinator.streams() {
        let dropped = coordinator.dropped_frames(stream.id)?;
        if dropped > 0 {
            println!("  {} dropped {dropped} frames", stream.instance_name);
        }
    }

    if let Err(e) = stats.save() {
        tracing::warn!("could not save session stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

/// Print cross transitions and a periodic tick line.
fn report_tick(coordinator: &Coordinator, primary: StreamId, crossed_before: &mut bool) {
    let crossed = match coordinator.cross_event() {
        Some(event) => {
            if !*crossed_before {
                println!(
                    "[{}] Cross detected: {} at ({:.1}, {:.1})",
                    Utc::now().format("%H:%M:%S"),
                    event.subject,
                    event.point.x,
                    event.point.y
                );
            }
            true
        }
        None => false,
    };
    *crossed_before = crossed;

    if coordinator.tick() % 30 == 0 {
        if let Ok(frame) = coordinator.latest_frame(primary) {
            let lit = coordinator
                .intensity_buffer(primary)
                .map(|buffer| buffer.iter().filter(|&&v| v > 0).count())
                .unwrap_or(0);
            println!(
                "[{}] tick {} | frame {} | {} lit pixels | subjects: {}",
                Utc::now().format("%H:%M:%S"),
                coordinator.tick(),
                frame.frame_index,
                lit,
                coordinator.tracked_subjects().len()
            );
        }
    }
}

/// Consumer polling the shared region at its own cadence.
fn spawn_monitor(
    mut reader: depthsync::sync::RegionReader,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            if let Some(polled) = reader.poll() {
                if polled.fresh {
                    tracing::debug!(
                        tick = polled.state.tick,
                        frames = polled.state.frames.len(),
                        "shared state"
                    );
                }
            }
            thread::sleep(Duration::from_millis(250));
        }
    })
}

fn cmd_play(frames: u64, speed: f64, repeat: bool, realtime: bool) -> anyhow::Result<()> {
    println!("depthsync v{VERSION}");
    println!();

    let mut config = load_config();
    config.playback.speed = speed;
    config.playback.repeat = repeat;
    config.playback.realtime = realtime;
    config.validate()?;

    let camera = CameraConfig {
        max_depth: config.max_depth,
        ..Default::default()
    };
    let recording = synthetic::recording(&camera, 0, frames.max(1))?;
    let stats = Arc::new(SessionStats::with_persistence(config.stats_path()));
    let mut coordinator = Coordinator::recorded(config, recording)?.with_stats(stats.clone());
    let depth = coordinator
        .find_stream(StreamKind::Depth)
        .context("recording has no depth track")?;

    println!("Replaying {} frames per track", coordinator.frame_count(depth)?);
    println!("  Speed: {}x", coordinator.speed()?);
    println!("  Repeat: {}", coordinator.is_repeat()?);
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    coordinator.start_all()?;
    let joints = coordinator.joint_sink();
    let mut seeked = false;
    let mut crossed_before = false;
    // with repeat on, stop after two passes
    let limit = frames.max(1) * 2;

    while running.load(Ordering::SeqCst) && coordinator.tick() < limit {
        let frame = coordinator.tell_frame(depth)?;
        joints.push(synthetic::skeleton(&camera, frame));

        match coordinator.wait_and_update_all()? {
            WaitStatus::Ready => report_tick(&coordinator, depth, &mut crossed_before),
            WaitStatus::NoData => continue,
            WaitStatus::EndOfStream => {
                println!("End of stream after {} ticks", coordinator.tick());
                break;
            }
        }

        if !seeked && coordinator.tell_frame(depth)? == frames / 2 {
            let index = coordinator.seek_to_frame(depth, 0, SeekOrigin::Set)?;
            println!(
                "Seeked {} to frame {index} ({}us)",
                depth,
                coordinator.tell_timestamp()?
            );
            seeked = true;
        }
    }

    coordinator.stop_all()?;
    if let Err(e) = stats.save() {
        tracing::warn!("could not save session stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_devices(names: &[String]) {
    let mut streams = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let lower = name.to_lowercase();
        let kind = if lower.starts_with("depth") {
            StreamKind::Depth
        } else if lower.starts_with("image") {
            StreamKind::Image
        } else {
            eprintln!("Skipping '{name}': expected an Image* or Depth* identity");
            continue;
        };
        let device = device_index(name).unwrap_or(0);
        println!("{name:<12} -> device {device}");
        streams.push((StreamId(i as u32 + 1), kind, device));
    }

    println!();
    for bundle in group_devices(streams) {
        let label = |id: Option<StreamId>| {
            id.and_then(|id| names.get(id.0 as usize - 1).cloned())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "Device {}: image {}, depth {}{}",
            bundle.index,
            label(bundle.image),
            label(bundle.depth),
            if bundle.is_complete() { "" } else { " (incomplete)" }
        );
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_status() {
    let config = load_config();

    println!("depthsync Status");
    println!("================");
    println!();

    let path = config.stats_path();
    if !path.exists() {
        println!("No previous session data found.");
        return;
    }

    match read_persisted(&path) {
        Ok(stats) => {
            println!("Previous sessions ({}):", stats.last_updated.format("%Y-%m-%d %H:%M:%S"));
            println!("  Ticks: {}", stats.ticks);
            println!("  Frames delivered: {}", stats.frames_delivered);
            println!("  Waits timed out: {}", stats.waits_timed_out);
            println!("  Cross events: {}", stats.cross_events);
            println!("  End-of-stream notifications: {}", stats.end_of_stream);
        }
        Err(e) => eprintln!("Could not read {path:?}: {e}"),
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
