use log::{error, warn};
use std::fmt;
use std::net::SocketAddr;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::{
    decode_frame, AnimationSink, Endpoint, FramePublisher, Listener, PipelineStats, PublishError,
    RawDatagram, SourceConfig, SourceError, SourceId, StatsSnapshot, SubjectRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// The endpoint could not be bound. Not retried.
    DeviceNotFound,
    Receiving,
    Stopped,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("Device Not Found"),
            Self::Receiving => f.write_str("Receiving"),
            Self::Stopped => f.write_str("Stopped"),
        }
    }
}

/// A CBOR frame source: the receive thread plus the consumer-side state.
///
/// The listener runs on its own thread. Decoding, registry updates and sink
/// calls all happen on whichever thread calls [`CborSource::process_pending`]
/// or [`CborSource::process_for`].
pub struct CborSource<S> {
    endpoint: Endpoint,
    listener: Option<Listener>,
    bind_error: Option<SourceError>,
    inbox: Receiver<RawDatagram>,
    publisher: FramePublisher<S>,
    stats: Arc<PipelineStats>,
}

impl<S: AnimationSink> CborSource<S> {
    /// Parses an `ip:port` connection string and starts listening on it.
    ///
    /// Only an unparsable string is an error here. A bind failure still
    /// yields a source, reporting [`SourceStatus::DeviceNotFound`].
    pub fn connect(connection: &str, sink: S, config: &SourceConfig) -> Result<Self, SourceError> {
        let endpoint = connection.parse()?;
        Ok(Self::new(endpoint, sink, config))
    }

    pub fn from_config(config: &SourceConfig, sink: S) -> Result<Self, SourceError> {
        Self::connect(&config.connection, sink, config)
    }

    pub fn new(endpoint: Endpoint, sink: S, config: &SourceConfig) -> Self {
        let stats = Arc::new(PipelineStats::new());
        let (tx, inbox) = sync_channel(config.queue_capacity.max(1));

        let (listener, bind_error) = match Listener::start(endpoint, tx, stats.clone()) {
            Ok(listener) => (Some(listener), None),
            Err(e) => {
                error!("CBOR source on {} is unavailable: {}", endpoint, e);
                (None, Some(e))
            }
        };

        let publisher = FramePublisher::new(SourceId::new(), sink)
            .with_policy(config.missing_properties, config.fill_value)
            .with_stats(stats.clone());

        Self {
            endpoint,
            listener,
            bind_error,
            inbox,
            publisher,
            stats,
        }
    }

    pub fn id(&self) -> SourceId {
        self.publisher.source_id()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(Listener::local_addr)
    }

    pub fn bind_error(&self) -> Option<&SourceError> {
        self.bind_error.as_ref()
    }

    pub fn status(&self) -> SourceStatus {
        match &self.listener {
            None => SourceStatus::DeviceNotFound,
            Some(listener) if listener.is_valid() => SourceStatus::Receiving,
            Some(_) => SourceStatus::Stopped,
        }
    }

    /// Whether the host should keep presenting this source as live. No I/O.
    pub fn is_source_still_valid(&self) -> bool {
        self.listener.as_ref().is_some_and(Listener::is_valid)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn registry(&self) -> &SubjectRegistry {
        self.publisher.registry()
    }

    pub fn sink(&self) -> &S {
        self.publisher.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.publisher.sink_mut()
    }

    /// Flags the receive thread to stop without waiting for it.
    pub fn request_shutdown(&self) -> bool {
        if let Some(listener) = &self.listener {
            listener.stop();
        }
        true
    }

    /// Stops and joins the receive thread and closes the socket.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.shutdown();
        }
    }

    /// Handles every datagram already queued, without blocking.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(datagram) = self.inbox.try_recv() {
            self.handle_datagram(datagram);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for a datagram, then handles everything queued.
    pub fn process_for(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(datagram) => {
                self.handle_datagram(datagram);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                // No receive thread left to feed the queue.
                thread::sleep(timeout);
                0
            }
        }
    }

    /// Decodes and publishes one datagram. Failures are logged and counted,
    /// never propagated.
    pub fn handle_datagram(&mut self, datagram: RawDatagram) {
        let frame = match decode_frame(datagram.bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_decode_error();
                warn!(
                    "Dropping {} byte datagram from {}: {}",
                    datagram.len(),
                    datagram.sender(),
                    e
                );
                return;
            }
        };

        match self.publisher.publish(frame) {
            Ok(_) => {}
            Err(e @ PublishError::MissingProperty { .. }) => {
                self.stats.record_rejected_frame();
                warn!("Dropping frame: {}", e);
            }
            Err(PublishError::Sink(e)) => {
                warn!("Animation sink rejected update: {}", e);
            }
        }
    }
}
