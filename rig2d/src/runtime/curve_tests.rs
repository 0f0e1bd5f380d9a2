use crate::{CurveKind, CurveTable, CurveTimeline};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn two_key_timeline(setup: impl FnOnce(&mut CurveTable)) -> CurveTimeline {
    let mut timeline = CurveTimeline::new(2, 1, 1);
    timeline.set_frame(0, 0.0, &[0.0]);
    timeline.set_frame(1, 1.0, &[10.0]);
    setup(timeline.curves_mut());
    timeline
}

#[test]
fn linear_segments_interpolate_evenly() {
    let timeline = two_key_timeline(|_| {});
    assert_approx(timeline.sample_component(0.0, 0), 0.0);
    assert_approx(timeline.sample_component(0.25, 0), 2.5);
    assert_approx(timeline.sample_component(1.0, 0), 10.0);
}

#[test]
fn stepped_segments_hold_the_left_value() {
    let timeline = two_key_timeline(|curves| curves.set_stepped(0, 0));
    assert_approx(timeline.sample_component(0.5, 0), 0.0);
    assert_approx(timeline.sample_component(0.999, 0), 0.0);
    assert_approx(timeline.sample_component(1.0, 0), 10.0);
}

#[test]
fn bezier_percent_is_anchored_at_both_ends() {
    let mut table = CurveTable::new(1, 1, 1);
    assert!(table.set_bezier(0, 0, 0, [0.25, 0.0, 0.75, 1.0]));
    assert_eq!(table.kind(0, 0), CurveKind::Bezier(0));

    assert_approx(table.percent(0, 0, 0.0), 0.0);
    assert_approx(table.percent(0, 0, 1.0), 1.0);
    assert_approx(table.percent(0, 0, 0.5), 0.5);
    assert!(table.percent(0, 0, 0.2) < 0.2);
    assert!(table.percent(0, 0, 0.8) > 0.8);
}

#[test]
fn bezier_percent_clamps_the_fraction() {
    let mut table = CurveTable::new(1, 1, 1);
    table.set_bezier(0, 0, 0, [0.5, 0.0, 1.0, 1.0]);
    assert_approx(table.percent(0, 0, -1.0), 0.0);
    assert_approx(table.percent(0, 0, 2.0), 1.0);
    assert_approx(table.percent(0, 0, f32::NAN), 0.0);
}

#[test]
fn bezier_curves_ease_a_timeline_segment() {
    let timeline = two_key_timeline(|curves| {
        curves.set_bezier(0, 0, 0, [0.5, 0.0, 1.0, 1.0]);
    });
    let eased = timeline.sample_component(0.5, 0);
    assert!(eased < 5.0, "ease-in should lag behind linear, got {eased}");
    assert_approx(timeline.sample_component(1.0, 0), 10.0);
}

#[test]
fn set_bezier_rejects_unallocated_slots() {
    let mut table = CurveTable::new(2, 1, 1);
    assert!(!table.set_bezier(1, 0, 0, [0.25, 0.0, 0.75, 1.0]));
    assert_eq!(table.kind(0, 0), CurveKind::Linear);
}

#[test]
fn shrink_drops_unused_bezier_storage() {
    let mut table = CurveTable::new(3, 1, 3);
    assert!(table.set_bezier(0, 0, 0, [0.25, 0.0, 0.75, 1.0]));
    assert!(table.set_bezier(2, 1, 0, [0.25, 0.0, 0.75, 1.0]));

    table.shrink(1);

    assert_eq!(table.bezier_count(), 1);
    assert_eq!(table.kind(0, 0), CurveKind::Bezier(0));
    assert_eq!(table.kind(1, 0), CurveKind::Linear);
}

#[test]
fn components_keep_independent_curves() {
    let mut timeline = CurveTimeline::new(2, 2, 0);
    timeline.set_frame(0, 0.0, &[0.0, 0.0]);
    timeline.set_frame(1, 2.0, &[4.0, 8.0]);
    timeline.curves_mut().set_stepped(0, 1);

    let mut out = [0.0; 2];
    timeline.sample(1.0, &mut out);
    assert_approx(out[0], 2.0);
    assert_approx(out[1], 0.0);
}

#[test]
fn search_finds_the_last_key_at_or_before_time() {
    let mut timeline = CurveTimeline::new(3, 1, 0);
    timeline.set_frame(0, 0.0, &[1.0]);
    timeline.set_frame(1, 1.0, &[2.0]);
    timeline.set_frame(2, 2.0, &[3.0]);

    assert_eq!(timeline.search(-0.5), None);
    assert_eq!(timeline.search(0.0), Some(0));
    assert_eq!(timeline.search(1.5), Some(1));
    assert_eq!(timeline.search(2.0), Some(2));
    assert_eq!(timeline.search(9.0), Some(2));

    assert_approx(timeline.sample_component(-1.0, 0), 1.0);
    assert_approx(timeline.sample_component(5.0, 0), 3.0);
}

#[test]
fn validate_rejects_decreasing_or_non_finite_times() {
    let mut timeline = CurveTimeline::new(2, 1, 0);
    timeline.set_frame(0, 1.0, &[0.0]);
    timeline.set_frame(1, 0.5, &[0.0]);
    assert!(timeline.validate().is_err());

    timeline.set_frame(1, f32::NAN, &[0.0]);
    assert!(timeline.validate().is_err());

    timeline.set_frame(1, 1.0, &[0.0]);
    assert!(timeline.validate().is_ok());
}
