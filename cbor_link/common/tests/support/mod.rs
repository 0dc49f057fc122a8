#![allow(dead_code)]

use ciborium::Value;
use common::{AnimationSink, FrameUpdate, SinkError, SourceId, StaticLayout};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Declared {
        subject: String,
        layout: StaticLayout,
    },
    Frame {
        subject: String,
        frame: FrameUpdate,
    },
}

/// Records every sink call in order. Can be told to refuse calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
    pub sources: Vec<SourceId>,
    pub reject_declarations: usize,
    pub reject_frames: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declarations(&self, subject: &str) -> Vec<&StaticLayout> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Declared { subject: s, layout } if s == subject => Some(layout),
                _ => None,
            })
            .collect()
    }

    pub fn frames(&self, subject: &str) -> Vec<&FrameUpdate> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Frame { subject: s, frame } if s == subject => Some(frame),
                _ => None,
            })
            .collect()
    }
}

impl AnimationSink for RecordingSink {
    fn declare_subject(
        &mut self,
        source: SourceId,
        subject: &str,
        layout: &StaticLayout,
    ) -> Result<(), SinkError> {
        if self.reject_declarations > 0 {
            self.reject_declarations -= 1;
            return Err(SinkError::Rejected(format!("no room for {subject}")));
        }
        self.sources.push(source);
        self.events.push(SinkEvent::Declared {
            subject: subject.to_string(),
            layout: layout.clone(),
        });
        Ok(())
    }

    fn publish_frame(
        &mut self,
        source: SourceId,
        subject: &str,
        frame: &FrameUpdate,
    ) -> Result<(), SinkError> {
        if self.reject_frames {
            return Err(SinkError::Rejected("frames disabled".to_string()));
        }
        self.sources.push(source);
        self.events.push(SinkEvent::Frame {
            subject: subject.to_string(),
            frame: frame.clone(),
        });
        Ok(())
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (text(k), v)).collect())
}

pub fn blendshapes(shapes: &[(&str, f32)]) -> Value {
    map(shapes
        .iter()
        .map(|(name, weight)| (*name, Value::Float(*weight as f64)))
        .collect())
}

/// Row-major 4x4 identity, as phone-side senders emit it.
pub fn identity_matrix() -> Value {
    Value::Array(
        (0..16)
            .map(|i| Value::Float(if i % 5 == 0 { 1.0 } else { 0.0 }))
            .collect(),
    )
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).expect("CBOR encoding into a Vec cannot fail");
    buf
}

/// A well-formed face datagram.
pub fn face_payload(name: &str, shapes: &[(&str, f32)]) -> Vec<u8> {
    encode(&map(vec![
        ("name", text(name)),
        ("blendshapes", blendshapes(shapes)),
        ("transform", identity_matrix()),
    ]))
}
