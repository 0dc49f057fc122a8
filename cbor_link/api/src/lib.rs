use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity token of one receiving source, handed to the sink with every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One entity of a subject's hierarchy. `parent` is `None` for a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
}

/// The one-time description of a subject: its entity hierarchy and the
/// ordered scalar property names every later frame reports values for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticLayout {
    pub bones: Vec<Bone>,
    pub property_names: Vec<String>,
}

impl StaticLayout {
    /// A single root bone named after the subject, carrying `property_names`.
    pub fn single_root(subject: &str, property_names: Vec<String>) -> Self {
        Self {
            bones: vec![Bone {
                name: subject.to_string(),
                parent: None,
            }],
            property_names,
        }
    }
}

/// Per-datagram snapshot: one transform per bone of the layout and one value
/// per declared property, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub transforms: Vec<Transform>,
    pub property_values: Vec<f32>,
}

/// Errors a sink may return from a declare or publish call.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected the call: {0}")]
    Rejected(String),
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode sink message: {0}")]
    Encode(String),
}

/// Downstream animation consumer.
///
/// `declare_subject` is called at most once per subject name, always before
/// the first `publish_frame` for that subject. `frame.property_values` always
/// has the length of the declared `layout.property_names`.
pub trait AnimationSink {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError>;

    fn publish_frame(
        &mut self,
        source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError>;
}

impl<S: AnimationSink + ?Sized> AnimationSink for Box<S> {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError> {
        (**self).declare_subject(source, subject, layout)
    }

    fn publish_frame(
        &mut self,
        source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError> {
        (**self).publish_frame(source, subject, frame)
    }
}
