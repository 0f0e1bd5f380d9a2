use crate::{
    Affine, Attachment, BoneData, Error, RegionAttachment, Skeleton, SkeletonData, SkinData,
    SlotData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn region(name: &str, width: f32, height: f32) -> Attachment {
    Attachment::Region(RegionAttachment::new(name, width, height))
}

/// A root bone rotated 90 degrees with a child 10 units along it, one slot on the child.
fn arm_data() -> SkeletonData {
    let mut root = BoneData::new("root", None);
    root.rotation = 90.0;
    let mut hand = BoneData::new("hand", Some(0));
    hand.x = 10.0;

    let mut slot = SlotData::new("hand", 1);
    slot.attachment = Some("glove".to_string());

    let mut default_skin = SkinData::new("default");
    default_skin.set_attachment(0, "glove", region("glove", 4.0, 2.0));
    default_skin.set_attachment(0, "fist", region("fist", 2.0, 2.0));

    SkeletonData {
        bones: vec![root, hand],
        slots: vec![slot],
        skins: vec![default_skin],
        ..Default::default()
    }
}

fn arm() -> Skeleton {
    Skeleton::new(Arc::new(arm_data())).unwrap()
}

#[test]
fn setup_pose_places_children_along_rotated_parents() {
    let mut skeleton = arm();
    skeleton.update_world_transform();

    let hand = skeleton.find_bone("hand").unwrap();
    assert_approx(hand.world_x(), 0.0);
    assert_approx(hand.world_y(), 10.0);
    assert_approx(hand.world_rotation_x(), 90.0);
}

#[test]
fn skeleton_placement_moves_every_root() {
    let mut skeleton = arm();
    skeleton.x = 5.0;
    skeleton.y = -3.0;
    skeleton.update_world_transform();

    let hand = skeleton.find_bone("hand").unwrap();
    assert_approx(hand.world_x(), 5.0);
    assert_approx(hand.world_y(), 7.0);
}

#[test]
fn y_down_flips_world_positions() {
    let mut skeleton = arm();
    skeleton.y_down = true;
    skeleton.update_world_transform();

    let hand = skeleton.find_bone("hand").unwrap();
    assert_approx(hand.world_x(), 0.0);
    assert_approx(hand.world_y(), -10.0);
}

#[test]
fn external_parent_transform_wraps_the_skeleton() {
    let mut skeleton = arm();
    skeleton.update_world_transform_with(&Affine::from_scale_translation(2.0, 2.0, 100.0, 0.0));

    let hand = skeleton.find_bone("hand").unwrap();
    assert_approx(hand.world_x(), 100.0);
    assert_approx(hand.world_y(), 20.0);
    assert_approx(hand.world_scale_x(), 2.0);
}

#[test]
fn world_update_overwrites_applied_with_local() {
    let mut skeleton = arm();
    skeleton.find_bone_mut("hand").unwrap().local.rotation = 45.0;
    skeleton.update_world_transform();

    let hand = skeleton.find_bone("hand").unwrap();
    assert_approx(hand.applied.rotation, 45.0);
    assert_approx(hand.world_rotation_x(), 135.0);
}

#[test]
fn setup_pose_restores_bones_slots_and_draw_order() {
    let mut skeleton = arm();
    skeleton.bones[1].local.x = 99.0;
    skeleton.slots[0].color = [0.0; 4];
    skeleton.set_attachment("hand", None).unwrap();
    skeleton.draw_order.reverse();

    skeleton.set_to_setup_pose();

    assert_approx(skeleton.bones[1].local.x, 10.0);
    assert_eq!(skeleton.slots[0].color, [1.0; 4]);
    assert_eq!(skeleton.slots[0].attachment_name(), Some("glove"));
    assert_eq!(skeleton.draw_order, vec![0]);
}

#[test]
fn set_attachment_looks_up_the_default_skin() {
    let mut skeleton = arm();
    skeleton.set_time(2.0);
    skeleton.set_attachment("hand", Some("fist")).unwrap();

    assert_eq!(skeleton.slots[0].attachment_name(), Some("fist"));
    assert_eq!(skeleton.slot_attachment(0).map(Attachment::name), Some("fist"));
    skeleton.update(0.5);
    assert_approx(skeleton.slot_attachment_time(0), 0.5);

    skeleton.set_attachment("hand", None).unwrap();
    assert!(skeleton.slot_attachment(0).is_none());
}

#[test]
fn set_attachment_reports_unknown_names() {
    let mut skeleton = arm();
    assert!(matches!(
        skeleton.set_attachment("foot", Some("glove")),
        Err(Error::UnknownSlot { .. })
    ));
    assert!(matches!(
        skeleton.set_attachment("hand", Some("sock")),
        Err(Error::UnknownAttachment { .. })
    ));
    assert_eq!(skeleton.slots[0].attachment_name(), Some("glove"));
}

fn skinned_data() -> SkeletonData {
    let mut data = arm_data();
    data.slots[0].attachment = Some("hat".to_string());
    let mut red = SkinData::new("red");
    red.set_attachment(0, "hat", region("red-hat", 2.0, 2.0));
    let mut blue = SkinData::new("blue");
    blue.set_attachment(0, "cap", region("blue-cap", 2.0, 2.0));
    data.skins.push(red);
    data.skins.push(blue);
    data
}

#[test]
fn first_skin_shows_setup_attachments_it_contains() {
    let mut skeleton = Skeleton::new(Arc::new(skinned_data())).unwrap();
    assert!(skeleton.slot_attachment(0).is_none());

    skeleton.set_skin(Some("red")).unwrap();
    assert_eq!(skeleton.slot_attachment(0).map(Attachment::name), Some("red-hat"));
    assert_eq!(skeleton.skin().map(|s| s.name.as_str()), Some("red"));
}

#[test]
fn swapping_skins_clears_attachments_missing_from_the_new_skin() {
    let mut skeleton = Skeleton::new(Arc::new(skinned_data())).unwrap();
    skeleton.set_skin(Some("red")).unwrap();

    skeleton.set_skin(Some("blue")).unwrap();
    assert!(skeleton.slot_attachment(0).is_none());
    assert_eq!(skeleton.skin_index(), Some(2));
}

#[test]
fn swapping_skins_keeps_default_skin_attachments() {
    let mut skeleton = Skeleton::new(Arc::new(skinned_data())).unwrap();
    skeleton.set_skin(Some("red")).unwrap();
    skeleton.set_attachment("hand", Some("glove")).unwrap();

    skeleton.set_skin(Some("blue")).unwrap();
    assert_eq!(skeleton.slot_attachment(0).map(Attachment::name), Some("glove"));
}

#[test]
fn unknown_skin_is_an_error() {
    let mut skeleton = arm();
    assert!(matches!(
        skeleton.set_skin(Some("missing")),
        Err(Error::UnknownSkin { .. })
    ));
    assert_eq!(skeleton.skin_index(), None);
}

#[test]
fn bounds_cover_visible_regions() {
    let mut skeleton = arm();
    skeleton.update_world_transform();

    let bounds = skeleton.bounds().unwrap();
    // The 4x2 glove is rotated 90 degrees around (0, 10).
    assert_approx(bounds.x, -1.0);
    assert_approx(bounds.y, 8.0);
    assert_approx(bounds.width, 2.0);
    assert_approx(bounds.height, 4.0);

    skeleton.set_attachment("hand", None).unwrap();
    assert!(skeleton.bounds().is_none());
}

#[test]
fn malformed_data_is_rejected() {
    let mut data = arm_data();
    data.bones[0].parent = Some(1);
    assert!(matches!(
        Skeleton::new(Arc::new(data)),
        Err(Error::InvalidBoneParent { .. })
    ));
}

#[test]
fn find_helpers_resolve_names() {
    let skeleton = arm();
    assert_eq!(skeleton.find_bone("hand").map(|b| b.data_index()), Some(1));
    assert!(skeleton.find_bone("missing").is_none());
    assert_eq!(skeleton.find_slot("hand").map(|s| s.bone), Some(1));
    assert!(skeleton.find_ik_constraint("none").is_none());
}
