//! Subject registry and publisher behavior.

mod support;

use common::{
    decode_frame, DecodedFrame, FramePublisher, MissingPropertyPolicy, PublishError,
    PublishOutcome, SourceId, Transform,
};
use support::{face_payload, RecordingSink, SinkEvent};

fn frame(name: &str, shapes: &[(&str, f32)]) -> DecodedFrame {
    decode_frame(&face_payload(name, shapes)).unwrap()
}

fn publisher() -> FramePublisher<RecordingSink> {
    FramePublisher::new(SourceId::new(), RecordingSink::new())
}

#[test]
fn first_frame_declares_then_publishes() {
    let mut publisher = publisher();
    let outcome = publisher
        .publish(frame("Face1", &[("jawOpen", 0.5), ("eyeBlinkL", 1.0)]))
        .unwrap();
    assert_eq!(outcome, PublishOutcome::Declared);

    let events = &publisher.sink().events;
    assert_eq!(events.len(), 2);

    let SinkEvent::Declared { subject, layout } = &events[0] else {
        panic!("expected a declaration first, got {:?}", events[0]);
    };
    assert_eq!(subject, "Face1");
    assert_eq!(layout.bones.len(), 1);
    assert_eq!(layout.bones[0].name, "Face1");
    assert_eq!(layout.bones[0].parent, None);
    assert_eq!(layout.property_names, vec!["jawOpen", "eyeBlinkL"]);

    let SinkEvent::Frame { subject, frame } = &events[1] else {
        panic!("expected a frame second, got {:?}", events[1]);
    };
    assert_eq!(subject, "Face1");
    assert_eq!(frame.transforms, vec![Transform::IDENTITY]);
    assert_eq!(frame.property_values, vec![0.5, 1.0]);
}

#[test]
fn declares_each_subject_once() {
    let mut publisher = publisher();
    for i in 0..50 {
        let w = i as f32 / 50.0;
        publisher.publish(frame("Face1", &[("jawOpen", w)])).unwrap();
        publisher.publish(frame("Face2", &[("jawOpen", w)])).unwrap();
    }

    let sink = publisher.sink();
    assert_eq!(sink.declarations("Face1").len(), 1);
    assert_eq!(sink.declarations("Face2").len(), 1);
    assert_eq!(sink.frames("Face1").len(), 50);
    assert_eq!(sink.frames("Face2").len(), 50);
    assert_eq!(publisher.registry().len(), 2);

    let stats = publisher.stats().snapshot();
    assert_eq!(stats.subjects_declared, 2);
    assert_eq!(stats.frames_published, 100);
}

#[test]
fn declaration_precedes_first_frame_for_every_subject() {
    let mut publisher = publisher();
    let subjects = ["A", "B", "A", "C", "B", "C", "A"];
    for s in subjects {
        publisher.publish(frame(s, &[("x", 0.1)])).unwrap();
    }

    for s in ["A", "B", "C"] {
        let events = &publisher.sink().events;
        let declared_at = events
            .iter()
            .position(|e| matches!(e, SinkEvent::Declared { subject, .. } if subject == s))
            .unwrap();
        let first_frame_at = events
            .iter()
            .position(|e| matches!(e, SinkEvent::Frame { subject, .. } if subject == s))
            .unwrap();
        assert!(declared_at < first_frame_at, "subject {s}");
    }
}

#[test]
fn every_call_carries_the_source_id() {
    let id = SourceId::new();
    let mut publisher = FramePublisher::new(id, RecordingSink::new());
    publisher.publish(frame("Face1", &[("a", 0.0)])).unwrap();
    publisher.publish(frame("Face1", &[("a", 0.0)])).unwrap();

    assert_eq!(publisher.sink().sources, vec![id, id, id]);
}

mod schema_freeze {
    use super::*;

    #[test]
    fn reordered_keys_are_realigned() {
        let mut publisher = publisher();
        publisher
            .publish(frame("Face1", &[("jawOpen", 0.5), ("eyeBlinkL", 1.0)]))
            .unwrap();
        let outcome = publisher
            .publish(frame("Face1", &[("eyeBlinkL", 0.2), ("jawOpen", 0.4)]))
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Updated);

        let frames = publisher.sink().frames("Face1");
        assert_eq!(frames[1].property_values, vec![0.4, 0.2]);
    }

    #[test]
    fn new_keys_do_not_change_the_schema() {
        let mut publisher = publisher();
        publisher.publish(frame("Face1", &[("jawOpen", 0.5)])).unwrap();
        publisher
            .publish(frame("Face1", &[("jawOpen", 0.6), ("tongueOut", 0.9)]))
            .unwrap();

        let record = publisher.registry().get("Face1").unwrap();
        assert_eq!(record.property_names(), ["jawOpen".to_string()]);

        let sink = publisher.sink();
        assert_eq!(sink.declarations("Face1").len(), 1);
        assert_eq!(sink.frames("Face1")[1].property_values, vec![0.6]);
    }

    #[test]
    fn missing_key_is_filled_by_default() {
        let mut publisher = publisher();
        publisher
            .publish(frame("Face1", &[("jawOpen", 0.5), ("eyeBlinkL", 1.0)]))
            .unwrap();
        publisher.publish(frame("Face1", &[("jawOpen", 0.1)])).unwrap();

        let frames = publisher.sink().frames("Face1");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].property_values, vec![0.1, 0.0]);
    }

    #[test]
    fn missing_key_uses_configured_fill_value() {
        let mut publisher = publisher().with_policy(MissingPropertyPolicy::Fill, -1.0);
        publisher
            .publish(frame("Face1", &[("jawOpen", 0.5), ("eyeBlinkL", 1.0)]))
            .unwrap();
        publisher.publish(frame("Face1", &[("eyeBlinkL", 0.3)])).unwrap();

        let frames = publisher.sink().frames("Face1");
        assert_eq!(frames[1].property_values, vec![-1.0, 0.3]);
    }

    #[test]
    fn missing_key_is_rejected_when_strict() {
        let mut publisher = publisher().with_policy(MissingPropertyPolicy::Reject, 0.0);
        publisher
            .publish(frame("Face1", &[("jawOpen", 0.5), ("eyeBlinkL", 1.0)]))
            .unwrap();

        let err = publisher
            .publish(frame("Face1", &[("jawOpen", 0.1)]))
            .unwrap_err();
        match err {
            PublishError::MissingProperty { subject, property } => {
                assert_eq!(subject, "Face1");
                assert_eq!(property, "eyeBlinkL");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing was published for the rejected frame.
        assert_eq!(publisher.sink().frames("Face1").len(), 1);

        publisher
            .publish(frame("Face1", &[("jawOpen", 0.2), ("eyeBlinkL", 0.8)]))
            .unwrap();
        assert_eq!(publisher.sink().frames("Face1").len(), 2);
    }
}

mod sink_rejection {
    use super::*;

    #[test]
    fn rejected_declaration_is_retried_on_next_frame() {
        let mut sink = RecordingSink::new();
        sink.reject_declarations = 1;
        let mut publisher = FramePublisher::new(SourceId::new(), sink);

        let err = publisher
            .publish(frame("Face1", &[("jawOpen", 0.5)]))
            .unwrap_err();
        assert!(matches!(err, PublishError::Sink(_)));
        assert!(publisher.registry().is_empty());
        assert!(publisher.sink().events.is_empty());

        let outcome = publisher.publish(frame("Face1", &[("jawOpen", 0.6)])).unwrap();
        assert_eq!(outcome, PublishOutcome::Declared);
        assert_eq!(publisher.sink().declarations("Face1").len(), 1);
        assert_eq!(publisher.sink().frames("Face1").len(), 1);
        assert_eq!(publisher.stats().snapshot().sink_rejections, 1);
    }

    #[test]
    fn rejected_frame_keeps_subject_declared() {
        let mut sink = RecordingSink::new();
        sink.reject_frames = true;
        let mut publisher = FramePublisher::new(SourceId::new(), sink);

        assert!(publisher.publish(frame("Face1", &[("a", 0.5)])).is_err());
        assert!(publisher.registry().contains("Face1"));

        publisher.sink_mut().reject_frames = false;
        publisher.publish(frame("Face1", &[("a", 0.7)])).unwrap();

        let sink = publisher.into_sink();
        assert_eq!(sink.declarations("Face1").len(), 1);
        assert_eq!(sink.frames("Face1").len(), 1);
    }
}
