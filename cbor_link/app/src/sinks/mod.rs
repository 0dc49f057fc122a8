pub mod generic_udp;

use anyhow::Result;
use api::{AnimationSink, FrameUpdate, SinkError, SourceId, StaticLayout};
use common::{OutputConfig, OutputMode};
use generic_udp::GenericUdpSink;
use log::{debug, info};

/// Writes declarations and frames to the log.
#[derive(Default)]
pub struct LogSink {
    frames: u64,
}

impl AnimationSink for LogSink {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError> {
        info!(
            "[{}] subject '{}': {}",
            source,
            subject,
            layout.property_names.join(", ")
        );
        Ok(())
    }

    fn publish_frame(
        &mut self,
        _source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError> {
        self.frames += 1;
        debug!(
            "frame #{} for '{}': {:?}",
            self.frames, subject, frame.property_values
        );
        Ok(())
    }
}

pub enum SinkBackend {
    Log(LogSink),
    Generic(GenericUdpSink),
}

impl SinkBackend {
    pub fn initialize(&mut self) -> Result<()> {
        match self {
            Self::Log(_) => Ok(()),
            Self::Generic(s) => s.initialize(),
        }
    }
}

impl AnimationSink for SinkBackend {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError> {
        match self {
            Self::Log(s) => s.declare_subject(source, subject, layout),
            Self::Generic(s) => s.declare_subject(source, subject, layout),
        }
    }

    fn publish_frame(
        &mut self,
        source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError> {
        match self {
            Self::Log(s) => s.publish_frame(source, subject, frame),
            Self::Generic(s) => s.publish_frame(source, subject, frame),
        }
    }
}

pub fn create_sink(config: &OutputConfig) -> SinkBackend {
    match config.mode {
        OutputMode::Log => {
            info!("Writing animation updates to the log");
            SinkBackend::Log(LogSink::default())
        }
        OutputMode::Generic => SinkBackend::Generic(GenericUdpSink::new(format!(
            "{}:{}",
            config.send_address, config.send_port
        ))),
    }
}
