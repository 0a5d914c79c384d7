//! Assertions over run reports, events and tutorial state.

use std::collections::BTreeSet;

use crate::core::RunReport;
use crate::events::CollectingEventSink;
use crate::tutorial::TutorialState;

/// Asserts that exactly these stages completed, in this order.
pub fn assert_stages_ran(report: &RunReport, expected: &[&str]) {
    assert_eq!(
        report.stage_names(),
        expected,
        "Unexpected stage sequence in run {}",
        report.run_id
    );
}

/// Asserts the number of events of a type.
pub fn assert_event_count(sink: &CollectingEventSink, event_type: &str, expected: usize) {
    let count = sink.event_types().iter().filter(|t| *t == event_type).count();
    assert_eq!(
        count, expected,
        "Expected {expected} '{event_type}' events, got {count}: {:?}",
        sink.event_types()
    );
}

/// Asserts the structural invariants of a finished tutorial state.
pub fn assert_tutorial_consistent(state: &TutorialState) {
    let n = state.abstractions.len();
    assert!(n > 0, "No abstractions identified");

    let graph = state
        .relationships
        .as_ref()
        .unwrap_or_else(|| panic!("Relationships missing"));
    for relationship in &graph.relationships {
        assert_ne!(relationship.from, relationship.to, "Self-loop in {relationship:?}");
        assert!(relationship.from < n && relationship.to < n, "Out of range: {relationship:?}");
    }

    let ordered: BTreeSet<usize> = state.chapter_order.iter().copied().collect();
    assert_eq!(
        (ordered.len(), state.chapter_order.len()),
        (n, n),
        "Chapter order {:?} is not a permutation of 0..{n}",
        state.chapter_order
    );

    let written: Vec<usize> = state.chapters.iter().map(|c| c.abstraction).collect();
    assert_eq!(written, state.chapter_order, "Chapters out of teaching order");
    for (position, chapter) in state.chapters.iter().enumerate() {
        assert_eq!(chapter.number, position + 1);
        let heading = format!("# Chapter {}: {}", chapter.number, chapter.title);
        assert!(
            chapter.body.starts_with(&heading),
            "Chapter {} does not start with '{heading}'",
            chapter.number
        );
    }
}
