use crate::{BoneData, IkConstraintData, Skeleton, SkeletonData};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// root, a 10-unit `upper` bone at the origin, a 10-unit `lower` bone at its tip and a
/// `target` bone placed at `target`.
fn arm(target: (f32, f32), configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut upper = BoneData::new("upper", Some(0));
    upper.length = 10.0;
    let mut lower = BoneData::new("lower", Some(1));
    lower.x = 10.0;
    lower.length = 10.0;
    let mut target_bone = BoneData::new("target", Some(0));
    target_bone.x = target.0;
    target_bone.y = target.1;

    let mut ik = IkConstraintData::new("reach", 0, vec![1, 2], 3);
    configure(&mut ik);

    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), upper, lower, target_bone],
        ik_constraints: vec![ik],
        ..Default::default()
    };
    Skeleton::new(Arc::new(data)).unwrap()
}

fn tip(skeleton: &Skeleton) -> [f32; 2] {
    skeleton.bones[2].local_to_world(10.0, 0.0)
}

#[test]
fn two_bone_chain_reaches_a_reachable_target() {
    let mut skeleton = arm((10.0, 10.0), |_| {});
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 10.0);
    assert_approx(y, 10.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 0.0);
    assert_approx(skeleton.bones[2].world_rotation_x(), 90.0);
}

#[test]
fn tiny_skeleton_scale_still_solves() {
    let mut skeleton = arm((10.0, 10.0), |_| {});
    skeleton.scale_x = 0.005;
    skeleton.scale_y = 0.005;
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x / 0.005, 10.0);
    assert_approx(y / 0.005, 10.0);
    assert_approx(skeleton.bones[2].world_rotation_x(), 90.0);

    let [lx, ly] = skeleton.bones[0].world_to_local(0.05, 0.05);
    assert_approx(lx, 10.0);
    assert_approx(ly, 10.0);
}

#[test]
fn bend_direction_picks_the_mirrored_solution() {
    let mut skeleton = arm((10.0, 10.0), |ik| ik.bend_direction = -1);
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 10.0);
    assert_approx(y, 10.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 90.0);
    assert_approx(skeleton.bones[2].world_rotation_x(), 0.0);
}

#[test]
fn unreachable_target_straightens_the_chain_towards_it() {
    let mut skeleton = arm((0.0, 30.0), |_| {});
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 0.0);
    assert_approx(y, 20.0);
}

#[test]
fn stretch_scales_the_parent_to_reach() {
    let mut skeleton = arm((0.0, 30.0), |ik| ik.stretch = true);
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 0.0);
    assert_approx(y, 30.0);
    assert_approx(skeleton.bones[1].applied.scale_x, 1.5);
}

#[test]
fn zero_mix_still_places_the_child() {
    let mut skeleton = arm((10.0, 10.0), |ik| ik.mix = 0.0);
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 20.0);
    assert_approx(y, 0.0);
    assert_approx(skeleton.bones[2].world_x(), 10.0);
}

#[test]
fn partial_mix_blends_from_the_local_pose() {
    let mut skeleton = arm((10.0, 10.0), |ik| ik.mix = 0.5);
    skeleton.update_world_transform();

    assert_approx(skeleton.bones[2].applied.rotation, 45.0);
    // The authored pose is untouched.
    assert_approx(skeleton.bones[2].local.rotation, 0.0);
}

fn pointer(target: (f32, f32), configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut bone = BoneData::new("pointer", Some(0));
    bone.length = 10.0;
    let mut target_bone = BoneData::new("target", Some(0));
    target_bone.x = target.0;
    target_bone.y = target.1;
    let mut ik = IkConstraintData::new("aim", 0, vec![1], 2);
    configure(&mut ik);
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), bone, target_bone],
        ik_constraints: vec![ik],
        ..Default::default()
    };
    Skeleton::new(Arc::new(data)).unwrap()
}

#[test]
fn one_bone_ik_points_at_the_target() {
    let mut skeleton = pointer((0.0, 5.0), |_| {});
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_rotation_x(), 90.0);

    let mut skeleton = pointer((0.0, 5.0), |ik| ik.mix = 0.5);
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_rotation_x(), 45.0);
}

#[test]
fn one_bone_stretch_and_compress_scale_to_the_target_distance() {
    let mut skeleton = pointer((20.0, 0.0), |ik| ik.stretch = true);
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_scale_x(), 2.0);
    assert_approx(skeleton.bones[1].world_scale_y(), 1.0);

    let mut skeleton = pointer((5.0, 0.0), |ik| {
        ik.compress = true;
        ik.uniform = true;
    });
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_scale_x(), 0.5);
    assert_approx(skeleton.bones[1].world_scale_y(), 0.5);
}

#[test]
fn softness_keeps_the_chain_short_of_full_extension() {
    let mut skeleton = arm((0.0, 19.0), |ik| ik.softness = 5.0);
    skeleton.update_world_transform();

    let [x, y] = tip(&skeleton);
    assert_approx(x, 0.0);
    assert!(y < 19.0 - 1.0e-3, "softened tip should fall short, got {y}");
}
