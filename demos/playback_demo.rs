//! Demonstration of a recorded depthsync session.
//!
//! This example shows how to:
//! 1. Build an in-memory recording from the synthetic camera
//! 2. Replay it through the coordinator
//! 3. Align the depth stream to the image viewpoint
//! 4. Seek and read back positions
//! 5. Watch stream and cross events
//!
//! Run with: cargo run --example playback_demo

use depthsync::{
    source::synthetic, CameraConfig, Config, Coordinator, SeekOrigin, StreamKind, SyncEvent,
    WaitStatus,
};

const PREVIEW_COLUMNS: u32 = 40;
const PREVIEW_ROWS: u32 = 12;

fn main() -> anyhow::Result<()> {
    println!("depthsync - Playback Demo");
    println!("=========================");
    println!();

    let camera = CameraConfig {
        width: 80,
        height: 60,
        pose_period: 10,
        ..Default::default()
    };
    let recording = synthetic::recording(&camera, 0, 40)?;

    let mut config = Config::default();
    config.playback.repeat = false;

    let mut coordinator = Coordinator::recorded(config, recording)?;
    let events = coordinator.subscribe();

    let depth = coordinator
        .find_stream(StreamKind::Depth)
        .ok_or_else(|| anyhow::anyhow!("no depth track"))?;
    let image = coordinator
        .find_stream(StreamKind::Image)
        .ok_or_else(|| anyhow::anyhow!("no image track"))?;

    println!("Session: {}", coordinator.session_id());
    for bundle in coordinator.device_bundles() {
        println!(
            "Device {}: image {:?}, depth {:?}",
            bundle.index, bundle.image, bundle.depth
        );
    }
    println!("Frames per track: {}", coordinator.frame_count(depth)?);
    println!();

    if coordinator.is_viewpoint_supported(depth, image)? {
        coordinator.set_viewpoint(depth, image)?;
        println!("Depth aligned to image viewpoint");
    }
    coordinator.frame_sync_with(depth, image)?;
    coordinator.start_all()?;

    let joints = coordinator.joint_sink();
    let mut seeked = false;

    loop {
        joints.push(synthetic::skeleton(&camera, coordinator.tell_frame(depth)?));

        match coordinator.wait_for_one(depth)? {
            WaitStatus::Ready => {}
            WaitStatus::NoData => continue,
            WaitStatus::EndOfStream => break,
        }

        if coordinator.tick() == 1 {
            println!("First depth frame:");
            preview(&coordinator.intensity_buffer(depth)?, camera.width, camera.height);
            println!();
        }

        if !seeked && coordinator.tell_frame(depth)? == 20 {
            let index = coordinator.seek_to_frame(depth, -10, SeekOrigin::Current)?;
            println!(
                "Seeked back to frame {index}; image now at {}",
                coordinator.tell_frame(image)?
            );
            seeked = true;
        }

        for event in events.receiver.try_iter() {
            match event {
                SyncEvent::Cross(cross) => println!(
                    "  Arms crossed: {} at ({:.0}, {:.0}) t={}us",
                    cross.subject, cross.point.x, cross.point.y, cross.timestamp
                ),
                SyncEvent::Joint(joint) => println!("  Joint event: {joint:?}"),
                SyncEvent::Stream(stream) => println!("  Stream event: {stream:?}"),
            }
        }
    }

    for event in events.receiver.try_iter() {
        println!("  Final event: {event:?}");
    }

    coordinator.stop_all()?;

    println!();
    println!("Replay finished after {} ticks", coordinator.tick());
    println!("Cross events seen: {}", coordinator.cross_events().len());
    println!();
    println!("{}", coordinator.stats().summary());
    Ok(())
}

/// Coarse ASCII rendering of an intensity buffer.
fn preview(buffer: &[u8], width: u32, height: u32) {
    const RAMP: &[u8] = b" .:-=+*#%@";
    for row in 0..PREVIEW_ROWS {
        let y = row * height / PREVIEW_ROWS;
        let line: String = (0..PREVIEW_COLUMNS)
            .map(|col| {
                let x = col * width / PREVIEW_COLUMNS;
                let value = buffer
                    .get((y * width + x) as usize)
                    .copied()
                    .unwrap_or(0);
                RAMP[value as usize * (RAMP.len() - 1) / 255] as char
            })
            .collect();
        println!("    {line}");
    }
}
