use crate::{
    Affine, BoneData, LocalTransform, Skeleton, SkeletonData, SkeletonFrame, TransformMode,
    compose_world_transform, decompose_world_transform,
};
use std::sync::Arc;

const ALL_MODES: [TransformMode; 5] = [
    TransformMode::Normal,
    TransformMode::OnlyTranslation,
    TransformMode::NoRotationOrReflection,
    TransformMode::NoScale,
    TransformMode::NoScaleOrReflection,
];

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_affine(actual: &Affine, expected: &Affine) {
    assert_approx(actual.a, expected.a);
    assert_approx(actual.b, expected.b);
    assert_approx(actual.c, expected.c);
    assert_approx(actual.d, expected.d);
    assert_approx(actual.x, expected.x);
    assert_approx(actual.y, expected.y);
}

fn sample_local() -> LocalTransform {
    LocalTransform {
        x: 3.0,
        y: -2.0,
        rotation: 30.0,
        scale_x: 2.0,
        scale_y: 0.5,
        shear_x: 10.0,
        shear_y: -5.0,
    }
}

#[test]
fn root_bone_world_matches_local_for_every_mode() {
    let local = sample_local();
    for mode in ALL_MODES {
        let world = compose_world_transform(
            &local,
            mode,
            None,
            &Affine::IDENTITY,
            &SkeletonFrame::IDENTITY,
        );
        assert_affine(&world, &local.to_affine());
    }
}

#[test]
fn identity_parent_is_transparent_for_every_mode() {
    let local = sample_local();
    for mode in ALL_MODES {
        let world = compose_world_transform(
            &local,
            mode,
            Some(&Affine::IDENTITY),
            &Affine::IDENTITY,
            &SkeletonFrame::IDENTITY,
        );
        assert_affine(&world, &local.to_affine());
    }
}

fn round_trip_local() -> LocalTransform {
    LocalTransform {
        x: 2.0,
        y: 3.0,
        rotation: 40.0,
        scale_x: 1.2,
        scale_y: 0.7,
        shear_x: 0.0,
        shear_y: 15.0,
    }
}

#[test]
fn every_mode_decomposes_back_to_local() {
    let parent = LocalTransform {
        x: 4.0,
        y: 1.0,
        rotation: 25.0,
        scale_x: 1.5,
        scale_y: 0.8,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    let local = round_trip_local();

    for mode in ALL_MODES {
        let world = compose_world_transform(
            &local,
            mode,
            Some(&parent),
            &Affine::IDENTITY,
            &SkeletonFrame::IDENTITY,
        );
        let recovered = decompose_world_transform(
            &world,
            mode,
            Some(&parent),
            &Affine::IDENTITY,
            &SkeletonFrame::IDENTITY,
            &local,
        );
        assert!(
            recovered.approx_eq(&local, 1.0e-4),
            "{mode:?}: expected {local:?}, got {recovered:?}"
        );
    }
}

#[test]
fn applied_transform_round_trips_under_a_flipped_skeleton() {
    let mut root = BoneData::new("root", None);
    root.x = 4.0;
    root.y = 1.0;
    root.rotation = 25.0;
    root.scale_x = 1.5;
    root.scale_y = 0.8;
    let local = round_trip_local();
    let mut bones = vec![root];
    for (i, mode) in ALL_MODES.into_iter().enumerate() {
        let mut bone = BoneData::new(format!("child{i}"), Some(0));
        bone.x = local.x;
        bone.y = local.y;
        bone.rotation = local.rotation;
        bone.scale_x = local.scale_x;
        bone.scale_y = local.scale_y;
        bone.shear_y = local.shear_y;
        bone.transform_mode = mode;
        bones.push(bone);
    }
    let data = SkeletonData {
        bones,
        ..Default::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.scale_x = -2.0;
    skeleton.scale_y = 1.5;
    skeleton.update_world_transform();

    for index in 0..skeleton.bones.len() {
        let expected = skeleton.bones[index].local;
        skeleton.update_applied_transform(index);
        let recovered = skeleton.bones[index].applied;
        assert!(
            recovered.approx_eq(&expected, 1.0e-3),
            "bone {index}: expected {expected:?}, got {recovered:?}"
        );
    }
}

#[test]
fn only_translation_ignores_parent_rotation_and_scale() {
    let parent = LocalTransform {
        x: 10.0,
        y: 0.0,
        rotation: 90.0,
        scale_x: 3.0,
        scale_y: 3.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    let local = LocalTransform {
        x: 1.0,
        rotation: 15.0,
        ..LocalTransform::IDENTITY
    };

    let world = compose_world_transform(
        &local,
        TransformMode::OnlyTranslation,
        Some(&parent),
        &Affine::IDENTITY,
        &SkeletonFrame::IDENTITY,
    );

    // Translation still follows the parent: (1, 0) scaled by 3 and rotated 90 degrees.
    assert_approx(world.x, 10.0);
    assert_approx(world.y, 3.0);
    assert_approx(world.rotation_x(), 15.0);
    assert_approx(world.scale_x(), 1.0);
}

#[test]
fn no_scale_keeps_unit_scale_under_scaled_parent() {
    let parent = LocalTransform {
        rotation: 30.0,
        scale_x: 2.0,
        scale_y: 2.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    let local = LocalTransform {
        rotation: 20.0,
        ..LocalTransform::IDENTITY
    };

    let world = compose_world_transform(
        &local,
        TransformMode::NoScale,
        Some(&parent),
        &Affine::IDENTITY,
        &SkeletonFrame::IDENTITY,
    );

    assert_approx(world.scale_x(), 1.0);
    assert_approx(world.scale_y(), 1.0);
    assert_approx(world.rotation_x(), 50.0);
}

#[test]
fn no_rotation_keeps_parent_scale_but_not_its_rotation() {
    let parent = LocalTransform {
        rotation: 45.0,
        scale_x: 2.0,
        scale_y: 2.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    let local = LocalTransform {
        rotation: 10.0,
        ..LocalTransform::IDENTITY
    };

    let world = compose_world_transform(
        &local,
        TransformMode::NoRotationOrReflection,
        Some(&parent),
        &Affine::IDENTITY,
        &SkeletonFrame::IDENTITY,
    );

    assert_approx(world.rotation_x(), 10.0);
    assert_approx(world.scale_x(), 2.0);
}

#[test]
fn skeleton_frame_places_root_bones() {
    let frame = SkeletonFrame {
        x: 5.0,
        y: 6.0,
        scale_x: 2.0,
        scale_y: -1.0,
    };
    let local = LocalTransform {
        x: 1.0,
        y: 1.0,
        ..LocalTransform::IDENTITY
    };

    let world = compose_world_transform(
        &local,
        TransformMode::Normal,
        None,
        &frame.root_parent(),
        &frame,
    );

    assert_approx(world.x, 7.0);
    assert_approx(world.y, 5.0);
    assert!(world.determinant() < 0.0);
}

fn two_bone_skeleton() -> Skeleton {
    let mut child = BoneData::new("child", Some(0));
    child.x = 10.0;
    child.rotation = 90.0;
    let mut root = BoneData::new("root", None);
    root.rotation = 90.0;
    let data = SkeletonData {
        bones: vec![root, child],
        ..Default::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn local_and_world_coordinates_convert_both_ways() {
    let skeleton = two_bone_skeleton();
    let child = &skeleton.bones[1];
    assert_approx(child.world_x(), 0.0);
    assert_approx(child.world_y(), 10.0);

    let [wx, wy] = child.local_to_world(2.0, 0.0);
    assert_approx(wx, -2.0);
    assert_approx(wy, 10.0);

    let [lx, ly] = child.world_to_local(wx, wy);
    assert_approx(lx, 2.0);
    assert_approx(ly, 0.0);
}

#[test]
fn rotation_conversions_invert_each_other() {
    let skeleton = two_bone_skeleton();
    let child = &skeleton.bones[1];
    let world = child.local_to_world_rotation(30.0);
    assert_approx(child.world_to_local_rotation(world), 30.0);
}

#[test]
fn rotate_world_marks_applied_stale() {
    let mut skeleton = two_bone_skeleton();
    let bone = &mut skeleton.bones[0];
    assert!(bone.applied_valid());
    bone.rotate_world(-90.0);
    assert!(!bone.applied_valid());
    assert_approx(bone.world_rotation_x(), 0.0);

    skeleton.update_applied_transform(0);
    assert!(skeleton.bones[0].applied_valid());
    assert_approx(skeleton.bones[0].applied.rotation, 0.0);
}
