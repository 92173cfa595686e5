//! MM2 Capture - Märklin Motorola 2 decoder for logic captures
//!
//! Reads logic-level samples from a sigrok-compatible analyzer (or a recorded
//! capture file), decodes MM2 locomotive and accessory commands from the edge
//! timing, and streams decoded data to the gateway.

mod annotate;
mod command_tracker;
mod config;
mod edge;
mod grpc;
mod mm2;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

use annotate::{format_duration, DecodeEvent};
use command_tracker::CommandTracker;
use config::Config;
use edge::{CaptureConfig, LogicCapture};
use grpc::mm2::{CaptureStatus, CommandEvent, DecoderMetrics};
use grpc::StreamingGatewayClient;
use mm2::types::{Mm2Command, RepeatKind};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   MM2 Capture - Märklin Motorola 2");
    info!("   logic-analyzer protocol decoder");
    info!("===========================================");

    // Load configuration
    let config = Config::from_env();

    // A sample rate is the one non-negotiable input: every threshold in the
    // decoder is a time, and samples only become time through it.
    let sample_rate = config
        .sample_rate
        .context("SAMPLE_RATE is not set; cannot decode without a sample rate")?;

    info!("Configuration:");
    info!("  Gateway URL: {}", config.gateway_url);
    info!("  Device ID: {}", config.device_id);
    info!("  Sample rate: {} Hz", sample_rate);
    info!("  Channel: {}", config.capture_channel);
    info!("  Polarity: {}", config.polarity.as_str());
    match &config.capture_file {
        Some(path) => info!("  Capture file: {}", path.display()),
        None => info!("  Driver: {} via {}", config.capture_driver, config.sigrok_cli_path),
    }

    // Create channels for data flow to the gRPC gateway
    let (command_tx, command_rx) = mpsc::channel::<CommandEvent>(1000);
    let (metrics_tx, metrics_rx) = mpsc::channel::<DecoderMetrics>(100);
    let (status_tx, status_rx) = mpsc::channel::<CaptureStatus>(10);

    // Start gRPC streaming to the gateway
    let gateway_url = config.gateway_url.clone();
    let command_handle = tokio::spawn(async move {
        let client = StreamingGatewayClient::new(&gateway_url);
        if let Err(e) = client.stream_commands(command_rx).await {
            error!("Command stream failed: {}", e);
        }
    });

    let gateway_url = config.gateway_url.clone();
    let metrics_handle = tokio::spawn(async move {
        let client = StreamingGatewayClient::new(&gateway_url);
        if let Err(e) = client.stream_metrics(metrics_rx).await {
            error!("Metrics stream failed: {}", e);
        }
    });

    let gateway_url = config.gateway_url.clone();
    let status_handle = tokio::spawn(async move {
        let client = StreamingGatewayClient::new(&gateway_url);
        if let Err(e) = client.stream_status(status_rx).await {
            error!("Status stream failed: {}", e);
        }
    });

    // Optional JSONL export of decoded commands
    let mut jsonl_writer = match &config.jsonl_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create JSONL export {}", path.display()))?;
            info!("Exporting decoded commands to {}", path.display());
            Some(BufWriter::new(file))
        }
        None => None,
    };

    // Start the capture/decode thread
    let capture = LogicCapture::new(CaptureConfig {
        sigrok_cli_path: config.sigrok_cli_path.clone(),
        driver: config.capture_driver.clone(),
        capture_file: config.capture_file.clone(),
        sample_rate,
        channel: config.capture_channel,
        polarity: config.polarity,
    });
    let event_rx = match capture.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Failed to start logic capture: {}", e);
            return Err(e);
        }
    };

    // Send initial capture status
    let _ = status_tx.send(capture_status(&config, sample_rate, true)).await;

    info!("===========================================");
    info!("  Decoding... Press Ctrl+C to stop.");
    info!("===========================================");

    // Per-address state aggregation
    let mut tracker = CommandTracker::default();

    // Track statistics
    let mut commands_processed = 0u64;
    let mut commands_since_report = 0u64;
    let mut last_heartbeat = Instant::now();
    let mut last_signal_report = Instant::now();
    let mut last_tracker_report = Instant::now();

    // Main processing loop - receive decode events from the capture thread
    loop {
        match event_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => match event {
                DecodeEvent::Timing { span, seconds } => {
                    trace!(
                        "[timing] {}..{}: {}",
                        span.start,
                        span.end,
                        format_duration(seconds)
                    );
                }
                DecodeEvent::Bit { span, value } => {
                    trace!("[bit] {}..{}: {}", span.start, span.end, value);
                }
                DecodeEvent::Trit { span, value } => {
                    debug!("[trit] {}..{}: {}", span.start, span.end, value);
                }
                DecodeEvent::Field { span, field } => {
                    debug!("[decoded] {}..{}: {}", span.start, span.end, field);
                }
                DecodeEvent::Packet { span, repeat } => {
                    debug!(
                        "[package] {}..{}: Package: {}",
                        span.start,
                        span.end,
                        repeat.package_number()
                    );
                }
                DecodeEvent::Raw { bytes, .. } => {
                    trace!("[raw] {}", hex::encode(bytes));
                }
                DecodeEvent::Command(cmd) => {
                    commands_processed += 1;
                    commands_since_report += 1;

                    info!(
                        ">>> MM2 {} address {} | {}{} | Package: {}",
                        cmd.kind,
                        cmd.address,
                        cmd.function
                            .map(|f| format!("function {} | ", f))
                            .unwrap_or_default(),
                        cmd.speed
                            .map(|s| format!("speed {}", s))
                            .unwrap_or_else(|| "placeholder 0".to_string()),
                        cmd.repeat.package_number(),
                    );

                    if let Some(writer) = jsonl_writer.as_mut() {
                        if let Err(e) = write_jsonl(writer, &cmd) {
                            warn!("JSONL export failed: {}", e);
                        }
                    }

                    if let Some(state) = tracker.update(&cmd) {
                        debug!(
                            "[tracker] address {}: speed={:?} direction={:?} function={:?}",
                            state.address, state.speed, state.direction, state.function
                        );
                    }

                    let event = command_event(&config.device_id, &cmd);
                    if let Err(e) = command_tx.send(event).await {
                        warn!("Failed to send command event: {}", e);
                    }
                }
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // No event received, continue with periodic tasks
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                info!("Decode event channel closed");
                break;
            }
        }

        // Periodic capture status heartbeat
        if last_heartbeat.elapsed() >= Duration::from_secs(5) {
            let status = capture_status(&config, sample_rate, capture.is_running());
            let _ = status_tx.send(status).await;
            last_heartbeat = Instant::now();
        }

        // Periodic decoder metrics
        if last_signal_report.elapsed().as_millis() >= config.signal_report_interval_ms as u128 {
            let elapsed = last_signal_report.elapsed().as_secs_f32();
            let stats = capture.stats();
            let metrics = DecoderMetrics {
                device_id: config.device_id.clone(),
                timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
                command_rate: commands_since_report as f32 / elapsed.max(1.0),
                syncs_detected: stats.syncs_detected.load(std::sync::atomic::Ordering::Relaxed),
                frames_decoded: stats.frames_decoded.load(std::sync::atomic::Ordering::Relaxed),
                frames_rejected: stats.frames_rejected.load(std::sync::atomic::Ordering::Relaxed),
                magnet_frames: stats.magnet_frames.load(std::sync::atomic::Ordering::Relaxed),
                locomotive_frames: stats
                    .locomotive_frames
                    .load(std::sync::atomic::Ordering::Relaxed),
                repeat_frames: stats.repeat_frames.load(std::sync::atomic::Ordering::Relaxed),
            };
            let _ = metrics_tx.send(metrics).await;
            last_signal_report = Instant::now();
            commands_since_report = 0;
        }

        // Periodic tracker summary and expiry
        if last_tracker_report.elapsed() >= Duration::from_secs(10) {
            tracker.expire();
            info!("[Tracker] {}", tracker.stats_summary());
            last_tracker_report = Instant::now();
        }

        // The decode thread stops on capture EOF or fatal error
        if !capture.is_running() && event_rx.is_empty() {
            info!("Capture finished");
            break;
        }
    }

    // Cleanup
    capture.stop();

    if let Some(writer) = jsonl_writer.as_mut() {
        if let Err(e) = writer.flush() {
            warn!("Failed to flush JSONL export: {}", e);
        }
    }

    // Send disconnected status
    let _ = status_tx
        .send(capture_status(&config, sample_rate, false))
        .await;

    // Cancel streaming tasks
    command_handle.abort();
    metrics_handle.abort();
    status_handle.abort();

    info!("Shutdown complete. Commands decoded: {}", commands_processed);
    Ok(())
}

/// Build the capture status heartbeat message.
fn capture_status(config: &Config, sample_rate: u32, connected: bool) -> CaptureStatus {
    CaptureStatus {
        device_id: config.device_id.clone(),
        connected,
        sample_rate,
        polarity: config.polarity.as_str().to_string(),
        channel: config.capture_channel as u32,
        timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
    }
}

/// Convert a decoded command to its protobuf event.
fn command_event(device_id: &str, cmd: &Mm2Command) -> CommandEvent {
    CommandEvent {
        device_id: device_id.to_string(),
        timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
        address: cmd.address as u32,
        kind: cmd.kind.to_string(),
        has_function: cmd.function.is_some(),
        function: cmd.function.map(|t| t.value() as u32).unwrap_or(0),
        speed: cmd.speed.map(|s| s.to_string()).unwrap_or_default(),
        repeat: cmd.repeat == RepeatKind::Repeat,
        start_sample: cmd.start_sample,
        end_sample: cmd.end_sample,
        raw: cmd.raw.to_vec(),
    }
}

/// Append one decoded command to the JSONL export.
fn write_jsonl(writer: &mut BufWriter<File>, cmd: &Mm2Command) -> Result<()> {
    let line = serde_json::to_string(cmd)?;
    writeln!(writer, "{}", line)?;
    Ok(())
}
