//! Logic capture via sigrok-cli subprocess or a recorded capture file
//!
//! Spawns sigrok-cli streaming packed level bytes on stdout (or opens a
//! recorded binary capture), feeds them through the MM2 edge decoder on a
//! dedicated thread, and hands decode events to the application over a
//! bounded channel.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::decoder::{DecodeError, DecoderStats, Mm2Decoder};
use super::source::{LevelEdgeSource, Polarity};
use crate::annotate::{DecodeEvent, EventSink};

/// Capture configuration
#[derive(Clone)]
pub struct CaptureConfig {
    pub sigrok_cli_path: String,
    pub driver: String,
    /// Decode a recorded capture instead of driving hardware.
    pub capture_file: Option<PathBuf>,
    pub sample_rate: u32,
    pub channel: u8,
    pub polarity: Polarity,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sigrok_cli_path: "sigrok-cli".to_string(),
            driver: "fx2lafw".to_string(),
            capture_file: None,
            sample_rate: 1_000_000, // 1 MSPS resolves the 26 μs short pulse
            channel: 0,
            polarity: Polarity::ActiveHigh,
        }
    }
}

/// Decoder statistics shared with the application (atomic for thread-safe
/// access from the async side).
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub syncs_detected: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub magnet_frames: AtomicU64,
    pub locomotive_frames: AtomicU64,
    pub repeat_frames: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn publish(&self, stats: &DecoderStats) {
        self.syncs_detected.store(stats.syncs_detected, Ordering::Relaxed);
        self.frames_decoded.store(stats.frames_decoded, Ordering::Relaxed);
        self.frames_rejected.store(stats.frames_rejected, Ordering::Relaxed);
        self.magnet_frames.store(stats.magnet_frames, Ordering::Relaxed);
        self.locomotive_frames
            .store(stats.locomotive_frames, Ordering::Relaxed);
        self.repeat_frames.store(stats.repeat_frames, Ordering::Relaxed);
    }
}

/// Sink pushing decode events into the channel to the application.
struct ChannelSink {
    tx: Sender<DecodeEvent>,
    closed: bool,
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: DecodeEvent) {
        if !self.closed && self.tx.send(event).is_err() {
            self.closed = true;
        }
    }
}

/// Logic capture controller
pub struct LogicCapture {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl LogicCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
        }
    }

    /// Start decoding and return a receiver for decode events.
    pub fn start(&self) -> Result<Receiver<DecodeEvent>> {
        info!("===========================================");
        info!("  Starting MM2 logic capture");
        info!("===========================================");
        match &self.config.capture_file {
            Some(path) => info!("  Capture file: {}", path.display()),
            None => {
                info!("  sigrok-cli path: {}", self.config.sigrok_cli_path);
                info!("  Driver: {}", self.config.driver);
            }
        }
        info!("  Sample rate: {} Hz", self.config.sample_rate);
        info!("  Channel: {}", self.config.channel);
        info!("  Polarity: {}", self.config.polarity.as_str());

        let (event_tx, event_rx) = bounded::<DecodeEvent>(4096);

        let config = self.config.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("mm2-decode".to_string())
            .spawn(move || {
                if let Err(e) = run_capture(config, running.clone(), stats, event_tx) {
                    error!("Capture error: {:#}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .context("Failed to spawn decode thread")?;

        Ok(event_rx)
    }

    pub fn stop(&self) {
        info!("Stopping logic capture...");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }
}

impl Drop for LogicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the level-byte stream: a recorded capture file or a sigrok-cli
/// subprocess streaming to stdout.
fn open_stream(config: &CaptureConfig) -> Result<(Box<dyn Read + Send>, Option<Child>)> {
    if let Some(path) = &config.capture_file {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open capture file {}", path.display()))?;
        return Ok((Box::new(file), None));
    }

    let mut cmd = Command::new(&config.sigrok_cli_path);
    cmd.arg("-d")
        .arg(&config.driver)
        .arg("--config")
        .arg(format!("samplerate={}", config.sample_rate))
        .arg("-O")
        .arg("binary")
        .arg("--continuous")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    info!("Executing: {:?}", cmd);

    let mut child = cmd
        .spawn()
        .context("Failed to spawn sigrok-cli. Make sure it is installed and in PATH")?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture sigrok-cli stdout")?;

    // Forward capture tool chatter into our log.
    if let Some(stderr) = child.stderr.take() {
        thread::spawn(move || {
            let reader = std::io::BufReader::new(stderr);
            for line in reader.lines().map_while(Result::ok) {
                if !line.trim().is_empty() {
                    info!("[sigrok-cli] {}", line.trim());
                }
            }
        });
    }

    Ok((Box::new(stdout), Some(child)))
}

/// Main decode loop (runs in the dedicated thread).
fn run_capture(
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    event_tx: Sender<DecodeEvent>,
) -> Result<()> {
    let (reader, mut child) = open_stream(&config)?;

    let source = LevelEdgeSource::new(reader, config.channel, config.polarity);
    let mut decoder = Mm2Decoder::new(source, config.sample_rate)?;
    let mut sink = ChannelSink {
        tx: event_tx,
        closed: false,
    };

    info!("Decoding MM2 frames from level stream...");

    let mut last_stats_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        match decoder.poll(&mut sink) {
            Ok(true) => {}
            Ok(false) => {
                info!("Capture stream ended");
                break;
            }
            Err(e @ DecodeError::TruncatedFrame { .. }) => {
                if running.load(Ordering::SeqCst) {
                    stats.publish(&decoder.stats);
                    return Err(e).context("Capture ended mid-frame");
                }
                info!("Capture stopped mid-frame");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if sink.closed {
            warn!("Event channel closed, stopping decode");
            break;
        }

        stats.publish(&decoder.stats);

        if last_stats_log.elapsed() >= Duration::from_secs(5) {
            info!(
                "[Decoder] Syncs: {} | Frames: {} ({} loco, {} magnet, {} repeats) | Rejected: {}",
                decoder.stats.syncs_detected,
                decoder.stats.frames_decoded,
                decoder.stats.locomotive_frames,
                decoder.stats.magnet_frames,
                decoder.stats.repeat_frames,
                decoder.stats.frames_rejected,
            );
            last_stats_log = Instant::now();
        }
    }

    if let Some(child) = child.as_mut() {
        let _ = child.kill();
    }

    stats.publish(&decoder.stats);
    info!(
        "Decode stopped. Frames: {}, rejected: {}",
        decoder.stats.frames_decoded, decoder.stats.frames_rejected,
    );

    Ok(())
}
