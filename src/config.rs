//! Configuration loaded from environment variables

use std::path::PathBuf;

use crate::edge::Polarity;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway URL for gRPC streaming
    pub gateway_url: String,

    /// Device ID string for identification
    pub device_id: String,

    /// Path to the sigrok-cli executable
    pub sigrok_cli_path: String,

    /// sigrok driver for the attached logic analyzer
    pub capture_driver: String,

    /// Recorded capture file to decode instead of live hardware
    pub capture_file: Option<PathBuf>,

    /// Capture sample rate in Hz. Required: decoding cannot start without it.
    pub sample_rate: Option<u32>,

    /// Logic channel carrying the MM2 data line (bit index in each sample byte)
    pub capture_channel: u8,

    /// Line polarity; selects which transition acts as the sync trigger
    pub polarity: Polarity,

    /// Optional JSONL export file for decoded commands
    pub jsonl_path: Option<PathBuf>,

    /// Decoder metrics reporting interval in milliseconds
    pub signal_report_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            gateway_url: std::env::var("GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:30051".to_string()),

            device_id: std::env::var("DEVICE_ID")
                .unwrap_or_else(|_| "MM2-CAPTURE-0".to_string()),

            sigrok_cli_path: std::env::var("SIGROK_CLI_PATH")
                .unwrap_or_else(|_| "sigrok-cli".to_string()),

            capture_driver: std::env::var("CAPTURE_DRIVER")
                .unwrap_or_else(|_| "fx2lafw".to_string()),

            capture_file: std::env::var("CAPTURE_FILE").ok().map(PathBuf::from),

            sample_rate: std::env::var("SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok()),

            capture_channel: std::env::var("CAPTURE_CHANNEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            polarity: std::env::var("POLARITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),

            jsonl_path: std::env::var("JSONL_PATH").ok().map(PathBuf::from),

            signal_report_interval_ms: std::env::var("SIGNAL_REPORT_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        }
    }
}
