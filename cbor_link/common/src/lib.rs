pub use api::{AnimationSink, Bone, FrameUpdate, SinkError, SourceId, StaticLayout, Transform};

pub mod config;
mod decoder;
mod endpoint;
mod error;
mod listener;
mod registry;
mod source;
mod stats;

pub use config::{AppConfig, MissingPropertyPolicy, OutputConfig, OutputMode, SourceConfig};
pub use decoder::{decode_frame, DecodedFrame};
pub use endpoint::Endpoint;
pub use error::{DecodeError, PublishError, SourceError};
pub use listener::{Listener, RawDatagram, MULTICAST_TTL, RECV_BUFFER_SIZE, WAIT_TIME};
pub use registry::{FramePublisher, PublishOutcome, SubjectRecord, SubjectRegistry};
pub use source::{CborSource, SourceStatus};
pub use stats::{PipelineStats, StatsSnapshot};
