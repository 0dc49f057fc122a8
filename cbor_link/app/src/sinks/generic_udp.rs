use anyhow::{Context, Result};
use api::{AnimationSink, FrameUpdate, SinkError, SourceId, StaticLayout};
use log::info;
use serde::Serialize;
use std::net::UdpSocket;

/// Messages as they go out on the wire, one JSON object per datagram.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundMessage<'a> {
    DeclareSubject {
        source: SourceId,
        subject: &'a str,
        layout: &'a StaticLayout,
    },
    Frame {
        source: SourceId,
        subject: &'a str,
        frame: &'a FrameUpdate,
    },
}

/// Forwards declarations and frames as JSON datagrams to a fixed target.
pub struct GenericUdpSink {
    socket: Option<UdpSocket>,
    target_address: String,
}

impl GenericUdpSink {
    pub fn new(target_address: String) -> Self {
        Self {
            socket: None,
            target_address,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing Generic UDP sink...");
        // Bind to 0.0.0.0:0 to let OS pick a port
        let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind UDP socket")?;
        socket
            .connect(&self.target_address)
            .context(format!("Failed to connect to {}", self.target_address))?;
        socket
            .set_nonblocking(true)
            .context("Failed to set non-blocking mode")?;

        self.socket = Some(socket);
        info!(
            "Generic UDP sink initialized. Target: {}",
            self.target_address
        );
        Ok(())
    }

    fn send(&self, message: &OutboundMessage<'_>) -> Result<(), SinkError> {
        let Some(socket) = &self.socket else {
            return Err(SinkError::Rejected("UDP sink not initialized".to_string()));
        };
        let json = serde_json::to_vec(message).map_err(|e| SinkError::Encode(e.to_string()))?;
        socket.send(&json)?;
        Ok(())
    }
}

impl AnimationSink for GenericUdpSink {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError> {
        self.send(&OutboundMessage::DeclareSubject {
            source,
            subject,
            layout,
        })
    }

    fn publish_frame(
        &mut self,
        source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError> {
        self.send(&OutboundMessage::Frame {
            source,
            subject,
            frame,
        })
    }
}
