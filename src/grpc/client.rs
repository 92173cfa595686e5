//! gRPC client streaming decoded MM2 traffic to the gateway

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tracing::{info, warn};

use super::mm2::{
    mm2_gateway_client::Mm2GatewayClient, CaptureStatus, CommandEvent, DecoderMetrics,
};

const RECONNECT_DELAY_SECS: u64 = 2;

/// Streaming gateway client. Each stream dials its own connection and blocks
/// until the gateway is reachable, so a late-starting gateway loses nothing
/// but time.
pub struct StreamingGatewayClient {
    gateway_url: String,
}

impl StreamingGatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            gateway_url: gateway_url.to_string(),
        }
    }

    /// Dial the gateway, retrying until it answers.
    async fn connect(&self, stream_name: &str) -> Channel {
        info!("[{}] Connecting to gateway: {}", stream_name, self.gateway_url);
        loop {
            match Channel::from_shared(self.gateway_url.clone()) {
                Ok(endpoint) => match endpoint.connect().await {
                    Ok(channel) => {
                        info!("[{}] Connected to gateway", stream_name);
                        return channel;
                    }
                    Err(e) => {
                        warn!(
                            "[{}] Gateway not reachable: {}. Retrying in {}s...",
                            stream_name, e, RECONNECT_DELAY_SECS
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        "[{}] Invalid gateway URL: {}. Retrying in {}s...",
                        stream_name, e, RECONNECT_DELAY_SECS
                    );
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
        }
    }

    /// Stream decoded commands to the gateway (takes ownership of the receiver).
    pub async fn stream_commands(&self, rx: mpsc::Receiver<CommandEvent>) -> Result<()> {
        let channel = self.connect("Commands").await;
        let mut client = Mm2GatewayClient::new(channel);
        let stream = ReceiverStream::new(rx);

        match client.stream_commands(stream).await {
            Ok(response) => {
                info!("[Commands] Stream ended: {:?}", response.into_inner());
                Ok(())
            }
            Err(e) => {
                warn!("[Commands] Stream error: {}", e);
                Err(e.into())
            }
        }
    }

    /// Stream decoder metrics to the gateway.
    pub async fn stream_metrics(&self, rx: mpsc::Receiver<DecoderMetrics>) -> Result<()> {
        let channel = self.connect("Metrics").await;
        let mut client = Mm2GatewayClient::new(channel);
        let stream = ReceiverStream::new(rx);

        match client.stream_metrics(stream).await {
            Ok(response) => {
                info!("[Metrics] Stream ended: {:?}", response.into_inner());
                Ok(())
            }
            Err(e) => {
                warn!("[Metrics] Stream error: {}", e);
                Err(e.into())
            }
        }
    }

    /// Stream capture status heartbeats to the gateway.
    pub async fn stream_status(&self, rx: mpsc::Receiver<CaptureStatus>) -> Result<()> {
        let channel = self.connect("Status").await;
        let mut client = Mm2GatewayClient::new(channel);
        let stream = ReceiverStream::new(rx);

        match client.stream_status(stream).await {
            Ok(response) => {
                info!("[Status] Stream ended: {:?}", response.into_inner());
                Ok(())
            }
            Err(e) => {
                warn!("[Status] Stream error: {}", e);
                Err(e.into())
            }
        }
    }
}
