//! Wearsense demo runner.
//!
//! Feeds the live engine a short synthetic dual-device stream (a minute
//! of sitting, walking, then running, compressed to a few seconds of
//! timeline) and prints what an observing UI would see: the published
//! prediction slots and the persisted activity history.
//!
//! For library use, see lib.rs.

use std::sync::Arc;

use wearsense::inference::ModelBank;
use wearsense::pipeline::{EngineConfig, LiveEngine};
use wearsense::prefs::PrefStore;
use wearsense::store::HistoryStore;
use wearsense::types::{BasicActivity, DeviceKind, SensorFrame};
use wearsense::wire::encode_frame;

/// One frame per 20 ms, matching a 50 Hz sensor.
const FRAME_SPACING_MS: u64 = 20;

fn chest_frame(now_ms: u64, phase: Phase) -> SensorFrame {
    let swing = match phase {
        Phase::Sitting => 0.0,
        Phase::Walking => (now_ms as f32 * 0.04).sin() * 2.0,
        Phase::Running => (now_ms as f32 * 0.07).sin() * 9.0,
    };
    SensorFrame::new(now_ms, [0.05, 0.1, 9.8 + swing], [0.02, 0.02, 0.02])
}

fn wrist_frame(now_ms: u64, phase: Phase) -> SensorFrame {
    let chest = chest_frame(now_ms, phase);
    SensorFrame::with_mag(now_ms, chest.accel, chest.gyro, [22.0, -4.0, 40.0])
}

#[derive(Clone, Copy)]
enum Phase {
    Sitting,
    Walking,
    Running,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let dir = std::env::temp_dir().join("wearsense-demo");
    std::fs::create_dir_all(&dir)?;

    let history = Arc::new(HistoryStore::open(dir.join("history.sqlite"))?);
    let prefs = Arc::new(PrefStore::open(dir.join("prefs.json"))?);
    history.clear()?;

    let mut engine = LiveEngine::new(
        EngineConfig::default(),
        ModelBank::builtin(),
        Arc::clone(&history),
        Arc::clone(&prefs),
        0,
    )?;

    println!("wearsense demo: streaming synthetic dual-device data");

    let phases = [
        (Phase::Sitting, 2_000u64),
        (Phase::Walking, 2_000),
        (Phase::Running, 2_000),
    ];

    let mut now_ms = 0u64;
    for (phase, duration_ms) in phases {
        let end_ms = now_ms + duration_ms;
        while now_ms < end_ms {
            now_ms += FRAME_SPACING_MS;
            let chest = encode_frame(DeviceKind::Chest, &chest_frame(now_ms, phase))?;
            engine.on_payload(&chest, now_ms)?;
            let wrist = encode_frame(DeviceKind::Wrist, &wrist_frame(now_ms, phase))?;
            engine.on_payload(&wrist, now_ms)?;
        }

        println!();
        println!("after {now_ms} ms:");
        if let Some((index, conf)) = prefs.basic_slot(0) {
            let label = BasicActivity::from_index(index as usize)
                .map(|a| a.label())
                .unwrap_or("?");
            println!("  coarse top-1: {label} ({conf:.2})");
        }
        if let Some((index, conf)) = prefs.detailed_slot(0) {
            println!("  fused top-1: class {index} ({conf:.2})");
        }
    }

    engine.shutdown()?;

    println!();
    println!("persisted activity history:");
    for record in history.get_all()? {
        println!(
            "  #{} {} {}..{} ms ({} ms)",
            record.id, record.label, record.start_ms, record.end_ms, record.interval_ms
        );
    }

    Ok(())
}
