use crate::{
    Attachment, BoneData, BoundingBoxAttachment, PointAttachment, RegionAttachment, Skeleton,
    SkeletonData, VertexData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_all_approx(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (&a, &e) in actual.iter().zip(expected) {
        assert_approx(a, e);
    }
}

/// root, `left` at (10, 0) and `up` at (0, 10) rotated 90 degrees.
fn posed() -> Skeleton {
    let mut left = BoneData::new("left", Some(0));
    left.x = 10.0;
    let mut up = BoneData::new("up", Some(0));
    up.y = 10.0;
    up.rotation = 90.0;
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), left, up],
        ..Default::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn region_offsets_center_the_quad() {
    let region = RegionAttachment::new("box", 4.0, 2.0);
    assert_all_approx(
        &region.offsets,
        &[-2.0, -1.0, -2.0, 1.0, 2.0, 1.0, 2.0, -1.0],
    );
}

#[test]
fn region_placement_moves_rotates_and_scales_corners() {
    let mut region = RegionAttachment::new("box", 4.0, 2.0);
    region.x = 1.0;
    region.rotation = 90.0;
    region.scale_x = 0.5;
    region.update_offsets();
    assert_all_approx(
        &region.offsets,
        &[2.0, -1.0, 0.0, -1.0, 0.0, 1.0, 2.0, 1.0],
    );
}

#[test]
fn region_world_vertices_follow_the_bone() {
    let skeleton = posed();
    let region = RegionAttachment::new("box", 4.0, 2.0);
    let mut out = [0.0f32; 8];
    region.compute_world_vertices(&skeleton.bones[2], &mut out, 0, 2);
    assert_all_approx(&out, &[1.0, 8.0, -1.0, 8.0, -1.0, 12.0, 1.0, 12.0]);
}

#[test]
fn unweighted_vertices_use_the_slot_bone() {
    let skeleton = posed();
    let vertex = VertexData::unweighted(vec![1.0, 0.0, 0.0, 1.0]);
    let mut out = vec![0.0; 4];
    vertex.compute_world_vertices(&skeleton.bones, &skeleton.bones[1], &[], 0, 4, &mut out, 0, 2);
    assert_all_approx(&out, &[11.0, 0.0, 10.0, 1.0]);
}

#[test]
fn deform_replaces_unweighted_positions() {
    let skeleton = posed();
    let vertex = VertexData::unweighted(vec![1.0, 0.0, 0.0, 1.0]);
    let mut out = vec![0.0; 4];
    vertex.compute_world_vertices(
        &skeleton.bones,
        &skeleton.bones[1],
        &[2.0, 0.0, 0.0, 2.0],
        0,
        4,
        &mut out,
        0,
        2,
    );
    assert_all_approx(&out, &[12.0, 0.0, 10.0, 2.0]);
}

#[test]
fn weighted_vertices_blend_bone_influences() {
    let skeleton = posed();
    // One vertex pulled half by `left`, half by `up`; a second bound only to `up`.
    let vertex = VertexData::weighted(
        vec![2, 1, 2, 1, 2],
        vec![0.0, 0.0, 0.5, 0.0, 0.0, 0.5, 1.0, 0.0, 1.0],
        2,
    );
    assert_eq!(vertex.world_vertices_length, 4);
    assert_eq!(vertex.bone_indices().collect::<Vec<_>>(), [1, 2, 2]);

    let mut out = vec![0.0; 4];
    vertex.compute_world_vertices(&skeleton.bones, &skeleton.bones[0], &[], 0, 4, &mut out, 0, 2);
    assert_all_approx(&out, &[5.0, 5.0, 0.0, 11.0]);

    let mut tail = vec![0.0; 2];
    vertex.compute_world_vertices(&skeleton.bones, &skeleton.bones[0], &[], 2, 2, &mut tail, 0, 2);
    assert_all_approx(&tail, &[0.0, 11.0]);
}

#[test]
fn weighted_deform_offsets_each_influence() {
    let skeleton = posed();
    let vertex = VertexData::weighted(vec![1, 1], vec![0.0, 0.0, 1.0], 1);
    let mut out = vec![0.0; 2];
    vertex.compute_world_vertices(
        &skeleton.bones,
        &skeleton.bones[0],
        &[3.0, 4.0],
        0,
        2,
        &mut out,
        0,
        2,
    );
    assert_all_approx(&out, &[13.0, 4.0]);
}

#[test]
fn short_output_buffers_are_not_overrun() {
    let skeleton = posed();
    let vertex = VertexData::unweighted(vec![1.0, 0.0, 0.0, 1.0]);
    let mut out = vec![0.0; 2];
    vertex.compute_world_vertices(&skeleton.bones, &skeleton.bones[1], &[], 0, 4, &mut out, 0, 2);
    assert_all_approx(&out, &[11.0, 0.0]);
}

#[test]
fn point_attachment_reports_world_position_and_rotation() {
    let skeleton = posed();
    let point = PointAttachment {
        name: "muzzle".to_string(),
        color: [1.0; 4],
        x: 2.0,
        y: 0.0,
        rotation: 45.0,
    };
    let [x, y] = point.compute_world_position(&skeleton.bones[2]);
    assert_approx(x, 0.0);
    assert_approx(y, 12.0);
    assert_approx(point.compute_world_rotation(&skeleton.bones[2]), 135.0);
}

#[test]
fn only_vertex_attachments_expose_deform_targets() {
    let region = Attachment::Region(RegionAttachment::new("plain", 1.0, 1.0));
    assert_eq!(region.name(), "plain");
    assert!(region.vertex_data().is_none());
    assert!(region.deform_attachment().is_none());

    let hitbox = Attachment::BoundingBox(BoundingBoxAttachment {
        name: "hitbox".to_string(),
        color: [1.0; 4],
        vertex: VertexData::unweighted(vec![0.0; 6]),
    });
    assert_eq!(hitbox.deform_attachment(), Some("hitbox"));
    assert_eq!(hitbox.vertex_data().map(|v| v.world_vertices_length), Some(6));
}
