use log::{info, trace};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    AnimationSink, DecodedFrame, FrameUpdate, MissingPropertyPolicy, PipelineStats, PublishError,
    SourceId, StaticLayout, Transform,
};

/// A subject seen at least once, with the property schema frozen at first sight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    name: String,
    property_names: Vec<String>,
}

impl SubjectRecord {
    fn from_frame(frame: &DecodedFrame) -> Self {
        Self {
            name: frame.subject_name.clone(),
            property_names: frame.blendshape_names().map(str::to_string).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    pub fn layout(&self) -> StaticLayout {
        StaticLayout::single_root(&self.name, self.property_names.clone())
    }

    /// Values of `frame` laid out in this record's property order.
    fn aligned_values(
        &self,
        frame: &DecodedFrame,
        policy: MissingPropertyPolicy,
        fill_value: f32,
    ) -> Result<Vec<f32>, PublishError> {
        let values: HashMap<&str, f32> = frame
            .blendshapes
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
            .collect();

        self.property_names
            .iter()
            .map(|name| match (values.get(name.as_str()), policy) {
                (Some(weight), _) => Ok(*weight),
                (None, MissingPropertyPolicy::Fill) => Ok(fill_value),
                (None, MissingPropertyPolicy::Reject) => Err(PublishError::MissingProperty {
                    subject: self.name.clone(),
                    property: name.clone(),
                }),
            })
            .collect()
    }
}

/// Subjects known to one source, keyed by name. Records are never removed.
#[derive(Debug, Default)]
pub struct SubjectRegistry {
    subjects: HashMap<String, SubjectRecord>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SubjectRecord> {
        self.subjects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subjects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The subject was new; its layout was declared before the frame.
    Declared,
    Updated,
}

/// Turns decoded frames into sink calls, declaring each subject once.
pub struct FramePublisher<S> {
    source: SourceId,
    registry: SubjectRegistry,
    sink: S,
    policy: MissingPropertyPolicy,
    fill_value: f32,
    stats: Arc<PipelineStats>,
}

impl<S: AnimationSink> FramePublisher<S> {
    pub fn new(source: SourceId, sink: S) -> Self {
        Self {
            source,
            registry: SubjectRegistry::new(),
            sink,
            policy: MissingPropertyPolicy::default(),
            fill_value: 0.0,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    pub fn with_policy(mut self, policy: MissingPropertyPolicy, fill_value: f32) -> Self {
        self.policy = policy;
        self.fill_value = fill_value;
        self
    }

    pub fn with_stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }

    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Publishes one frame, declaring its subject first if it has not been seen.
    ///
    /// A rejected declaration leaves the subject unknown, so the next frame
    /// for it retries the declaration.
    pub fn publish(&mut self, frame: DecodedFrame) -> Result<PublishOutcome, PublishError> {
        let Self {
            source,
            registry,
            sink,
            policy,
            fill_value,
            stats,
        } = self;

        let (record, outcome) = match registry.subjects.entry(frame.subject_name.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), PublishOutcome::Updated),
            Entry::Vacant(slot) => {
                let record = SubjectRecord::from_frame(&frame);
                if let Err(e) = sink.declare_subject(*source, &record.name, &record.layout()) {
                    stats.record_sink_rejection();
                    return Err(e.into());
                }
                stats.record_declared();
                info!(
                    "Declared subject '{}' with {} properties",
                    record.name,
                    record.property_names.len()
                );
                (slot.insert(record), PublishOutcome::Declared)
            }
        };

        let update = FrameUpdate {
            transforms: vec![Transform::IDENTITY],
            property_values: record.aligned_values(&frame, *policy, *fill_value)?,
        };

        if let Err(e) = sink.publish_frame(*source, &record.name, &update) {
            stats.record_sink_rejection();
            return Err(e.into());
        }
        stats.record_published();
        trace!(
            "Published frame for '{}' ({} values)",
            record.name,
            update.property_values.len()
        );

        Ok(outcome)
    }
}
