use crate::{
    Attachment, BlendMode, CurveKind, Error, MixBlend, MixDirection, PositionMode, RotateMode,
    Skeleton, SkeletonData, SpacingMode, Timeline, TransformMode,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

const RIG: &str = r#"{
  "skeleton": { "hash": "abc", "spine": "3.8.99", "width": 100, "height": 200 },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "y": 10, "length": 5 },
    { "name": "arm", "parent": "hip", "x": 2, "rotation": 30, "scaleX": 2, "transform": "noScale" },
    { "name": "hand", "parent": "arm", "x": 4, "skin": true }
  ],
  "slots": [
    { "name": "body", "bone": "hip", "attachment": "torso", "color": "ff000080", "dark": "00ff00" },
    { "name": "arm", "bone": "arm", "attachment": "sleeve", "blend": "additive" },
    { "name": "fx", "bone": "root", "attachment": "trail" }
  ],
  "ik": [
    { "name": "reach", "order": 1, "bones": ["hip", "arm"], "target": "hand", "bendPositive": false, "softness": 2 }
  ],
  "transform": [
    { "name": "follow", "order": 0, "bones": ["hand"], "target": "root", "x": 3, "rotateMix": 0.5 }
  ],
  "path": [
    { "name": "trail", "order": 2, "bones": ["arm"], "target": "fx", "spacingMode": "fixed", "spacing": 4, "rotateMode": "chainScale" }
  ],
  "skins": [
    {
      "name": "default",
      "attachments": {
        "body": { "torso": { "width": 10, "height": 20 } },
        "arm": {
          "sleeve": {
            "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1], "triangles": [0, 1, 2],
            "vertices": [0, 0, 4, 0, 4, 4], "hull": 3, "width": 4, "height": 4
          }
        },
        "fx": {
          "trail": {
            "type": "path", "vertexCount": 6, "lengths": [10],
            "vertices": [-1, 0, 0, 0, 3, 0, 7, 0, 10, 0, 11, 0]
          }
        }
      }
    },
    {
      "name": "armored",
      "bones": ["hand"],
      "ik": ["reach"],
      "attachments": {
        "arm": { "sleeve": { "type": "linkedmesh", "parent": "sleeve", "skin": "default", "width": 4, "height": 4 } }
      }
    }
  ],
  "events": { "step": { "int": 3, "string": "left" } },
  "animations": {
    "walk": {
      "bones": {
        "arm": {
          "rotate": [ { "time": 0, "angle": 0, "curve": "stepped" }, { "time": 1, "angle": 90 } ],
          "translate": [ { "time": 0, "curve": 0.25, "c3": 0.75 }, { "time": 0.5, "x": 4 } ]
        }
      },
      "slots": {
        "body": {
          "attachment": [ { "time": 0.5, "name": null } ],
          "color": [
            { "time": 0, "color": "ffffffff", "curve": [0.25, 0, 0.75, 1] },
            { "time": 1, "color": "00000000" }
          ]
        }
      },
      "deform": {
        "default": { "arm": { "sleeve": [ { "time": 0 }, { "time": 1, "offset": 2, "vertices": [1, 1] } ] } }
      },
      "drawOrder": [
        { "time": 0.25, "offsets": [ { "slot": "fx", "offset": -2 } ] },
        { "time": 0.75 }
      ],
      "events": [ { "time": 0.5, "name": "step" }, { "time": 0.75, "name": "step", "int": 7 } ]
    }
  }
}"#;

fn timeline<'a>(data: &'a SkeletonData, animation: &str, kind: &str) -> &'a Timeline {
    data.animation(animation)
        .unwrap()
        .timelines
        .iter()
        .find(|t| t.kind_name() == kind)
        .unwrap_or_else(|| panic!("no {kind} timeline in {animation}"))
}

#[test]
fn reads_header_bones_and_slots() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    assert_eq!(data.hash.as_deref(), Some("abc"));
    assert_eq!(data.version.as_deref(), Some("3.8.99"));
    assert_eq!(data.height, 200.0);
    assert_eq!(data.fps, 30.0);

    let arm = &data.bones[data.find_bone("arm").unwrap()];
    assert_eq!(arm.parent, Some(1));
    assert_eq!(arm.rotation, 30.0);
    assert_eq!(arm.scale_x, 2.0);
    assert_eq!(arm.scale_y, 1.0);
    assert_eq!(arm.transform_mode, TransformMode::NoScale);
    assert!(data.bones[3].skin_required);

    let body = &data.slots[0];
    assert_eq!(body.bone, 1);
    assert_eq!(body.attachment.as_deref(), Some("torso"));
    assert_approx(body.color[0], 1.0);
    assert_approx(body.color[3], 128.0 / 255.0);
    assert!(body.has_dark);
    assert_eq!(body.dark_color, [0.0, 1.0, 0.0]);
    assert_eq!(data.slots[1].blend, BlendMode::Additive);
}

#[test]
fn reads_constraints() {
    let data = SkeletonData::from_json_str(RIG).unwrap();

    let ik = &data.ik_constraints[0];
    assert_eq!(ik.order, 1);
    assert_eq!(ik.bones, [1, 2]);
    assert_eq!(ik.target, 3);
    assert_eq!(ik.bend_direction, -1);
    assert_eq!(ik.mix, 1.0);
    assert_eq!(ik.softness, 2.0);

    let follow = &data.transform_constraints[0];
    assert_eq!(follow.offset_x, 3.0);
    assert_eq!(follow.rotate_mix, 0.5);
    assert_eq!(follow.translate_mix, 1.0);
    assert_eq!(follow.offset_scale_x, 0.0);

    let trail = &data.path_constraints[0];
    assert_eq!(trail.target, 2);
    assert_eq!(trail.position_mode, PositionMode::Percent);
    assert_eq!(trail.spacing_mode, SpacingMode::Fixed);
    assert_eq!(trail.rotate_mode, RotateMode::ChainScale);
    assert_eq!(trail.spacing, 4.0);
}

#[test]
fn reads_skins_and_attachments() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    let default = &data.skins[data.default_skin().unwrap()];

    let Some(Attachment::Region(torso)) = default.attachment(0, "torso") else {
        panic!("torso should be a region");
    };
    assert_eq!((torso.width, torso.height), (10.0, 20.0));
    assert_approx(torso.offsets[0], -5.0);

    let Some(Attachment::Mesh(sleeve)) = default.attachment(1, "sleeve") else {
        panic!("sleeve should be a mesh");
    };
    assert!(!sleeve.vertex.is_weighted());
    assert_eq!(sleeve.vertex.vertices, [0.0, 0.0, 4.0, 0.0, 4.0, 4.0]);
    assert_eq!(sleeve.hull_length, 6);
    assert_eq!(sleeve.triangles, [0, 1, 2]);

    let Some(Attachment::Path(trail)) = default.attachment(2, "trail") else {
        panic!("trail should be a path");
    };
    assert_eq!(trail.lengths, [10.0]);
    assert_eq!(trail.vertex.world_vertices_length, 12);
    assert!(trail.constant_speed);
    assert!(!trail.closed);

    let armored = data.skin("armored").unwrap();
    assert_eq!(armored.bones, [3]);
    assert_eq!(armored.ik_constraints, [0]);
}

#[test]
fn linked_meshes_share_parent_geometry_and_deform() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    let armored = data.skin("armored").unwrap();
    let linked = armored.attachment(1, "sleeve").unwrap();
    let Attachment::Mesh(mesh) = linked else {
        panic!("linked sleeve should resolve to a mesh");
    };
    assert_eq!(mesh.vertex.vertices, [0.0, 0.0, 4.0, 0.0, 4.0, 4.0]);
    assert_eq!(mesh.region_uvs.len(), 6);
    assert_eq!(linked.deform_attachment(), Some("sleeve"));
    assert_eq!(mesh.deform_attachment.as_deref(), Some("sleeve"));
}

#[test]
fn reads_events_with_key_overrides() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    assert_eq!(data.events[0].name, "step");
    assert_eq!(data.events[0].volume, 1.0);

    let Timeline::Event(events) = timeline(&data, "walk", "event") else {
        unreachable!();
    };
    assert_eq!(events.frames, [0.5, 0.75]);
    assert_eq!(events.events[0].int_value, 3);
    assert_eq!(events.events[0].string, "left");
    assert_eq!(events.events[1].int_value, 7);
}

#[test]
fn reads_curve_kinds() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    assert_eq!(data.animation("walk").unwrap().duration, 1.0);

    let Timeline::Rotate(rotate) = timeline(&data, "walk", "rotate") else {
        unreachable!();
    };
    assert_eq!(rotate.curve.curves().kind(0, 0), CurveKind::Stepped);
    assert_eq!(rotate.sample(0.99), 0.0);

    let Timeline::Translate(translate) = timeline(&data, "walk", "translate") else {
        unreachable!();
    };
    let curves = translate.curve.curves();
    assert_eq!(curves.kind(0, 0), CurveKind::Bezier(0));
    assert_eq!(curves.kind(0, 1), CurveKind::Bezier(1));
    assert_eq!(curves.bezier_count(), 2);
    assert_eq!(translate.sample(0.5), [4.0, 0.0]);

    let Timeline::Color(color) = timeline(&data, "walk", "color") else {
        unreachable!();
    };
    assert_eq!(color.curve.curves().bezier_count(), 4);
    assert_eq!(color.curve.curves().kind(1, 0), CurveKind::Linear);
}

#[test]
fn deform_keys_become_absolute_vertices() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    let Timeline::Deform(deform) = timeline(&data, "walk", "deform") else {
        unreachable!();
    };
    assert_eq!(deform.slot, 1);
    assert_eq!(deform.attachment, "sleeve");
    assert_eq!(deform.vertices[0], [0.0, 0.0, 4.0, 0.0, 4.0, 4.0]);
    assert_eq!(deform.vertices[1], [0.0, 0.0, 5.0, 1.0, 4.0, 4.0]);
}

#[test]
fn draw_order_offsets_expand_to_full_orders() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    let Timeline::DrawOrder(draw_order) = timeline(&data, "walk", "drawOrder") else {
        unreachable!();
    };
    assert_eq!(draw_order.frames, [0.25, 0.75]);
    assert_eq!(draw_order.draw_orders, [Some(vec![2, 0, 1]), None]);
}

#[test]
fn loaded_rig_poses_and_animates() {
    let data = SkeletonData::from_json_str(RIG).unwrap();
    let mut skeleton = Skeleton::new(Arc::clone(&data)).unwrap();
    skeleton.set_skin(Some("armored")).unwrap();
    skeleton.update_world_transform();
    assert!(skeleton.bones.iter().all(|bone| bone.world.is_finite()));

    let mut events = Vec::new();
    let walk = data.animation("walk").unwrap();
    walk.apply(
        &mut skeleton,
        0.0,
        0.6,
        false,
        &mut events,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    skeleton.update_world_transform();

    assert_eq!(skeleton.draw_order, [2, 0, 1]);
    assert_eq!(skeleton.slots[0].attachment_name(), None);
    assert_eq!(skeleton.slots[1].deform.len(), 6);
    assert_eq!(events.len(), 1);
    assert!(skeleton.bones.iter().all(|bone| bone.world.is_finite()));
}

#[test]
fn scale_applies_to_lengths_and_positions() {
    let data = SkeletonData::from_json_str_with_scale(RIG, 2.0).unwrap();
    assert_eq!(data.bones[1].y, 20.0);
    assert_eq!(data.bones[1].length, 10.0);
    assert_eq!(data.bones[2].scale_x, 2.0);
    assert_eq!(data.transform_constraints[0].offset_x, 6.0);
    assert_eq!(data.path_constraints[0].spacing, 8.0);
    assert_eq!(data.ik_constraints[0].softness, 4.0);

    let Some(Attachment::Region(torso)) = data.skins[0].attachment(0, "torso") else {
        panic!("torso should be a region");
    };
    assert_eq!(torso.width, 20.0);

    let Timeline::Translate(translate) = timeline(&data, "walk", "translate") else {
        unreachable!();
    };
    assert_eq!(translate.sample(0.5), [8.0, 0.0]);

    let Timeline::Deform(deform) = timeline(&data, "walk", "deform") else {
        unreachable!();
    };
    assert_eq!(deform.vertices[1], [0.0, 0.0, 10.0, 2.0, 8.0, 8.0]);
}

#[test]
fn skins_may_be_a_map_of_slots() {
    let json = r#"{
      "bones": [ { "name": "root" } ],
      "slots": [ { "name": "a", "bone": "root", "attachment": "box" } ],
      "skins": { "default": { "a": { "box": { "width": 2, "height": 2 } } } }
    }"#;
    let data = SkeletonData::from_json_str(json).unwrap();
    assert_eq!(data.skins.len(), 1);
    assert_eq!(data.skins[0].name, "default");
    assert!(data.skins[0].attachment(0, "box").is_some());
    assert!(data.version.is_none());
}

#[test]
fn weighted_vertices_are_split_into_bones_and_weights() {
    let json = r#"{
      "bones": [ { "name": "root" }, { "name": "a", "parent": "root" } ],
      "slots": [ { "name": "s", "bone": "root" } ],
      "skins": [ { "name": "default", "attachments": { "s": { "m": {
        "type": "mesh", "uvs": [0, 0, 1, 1], "triangles": [],
        "vertices": [1, 1, 2, 3, 1, 2, 0, 0, 0, 0.5, 1, 1, 1, 0.5]
      } } } } ]
    }"#;
    let data = SkeletonData::from_json_str(json).unwrap();
    let Some(Attachment::Mesh(mesh)) = data.skins[0].attachment(0, "m") else {
        panic!("m should be a mesh");
    };
    assert_eq!(mesh.vertex.bones.as_deref(), Some(&[1, 1, 2, 0, 1][..]));
    assert_eq!(
        mesh.vertex.vertices,
        [2.0, 3.0, 1.0, 0.0, 0.0, 0.5, 1.0, 1.0, 0.5]
    );
    assert_eq!(mesh.vertex.world_vertices_length, 4);
}

#[test]
fn rejects_other_major_versions() {
    for version in ["4.0.1", "2.1.27", "beta"] {
        let json = format!(r#"{{ "skeleton": {{ "spine": "{version}" }} }}"#);
        assert!(
            matches!(
                SkeletonData::from_json_str(&json),
                Err(Error::JsonVersion { ref value }) if value == version
            ),
            "{version} should be rejected"
        );
    }
    let newer = r#"{ "skeleton": { "spine": "3.9.1" } }"#;
    assert!(SkeletonData::from_json_str(newer).is_ok());
}

#[test]
fn reports_unknown_references() {
    let json = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "ghost" } ] }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonUnknownBone { ref bone, .. }) if bone == "ghost"
    ));

    let json = r#"{
      "bones": [ { "name": "root" } ],
      "animations": { "a": { "events": [ { "time": 0, "name": "boom" } ] } }
    }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonUnknownEvent { ref event, .. }) if event == "boom"
    ));

    let json = r#"{
      "bones": [ { "name": "root" } ],
      "ik": [ { "name": "ik", "bones": ["root"], "target": "nowhere" } ]
    }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonUnknownBone { .. })
    ));
}

#[test]
fn rejects_malformed_values() {
    assert!(matches!(
        SkeletonData::from_json_str("{ not json"),
        Err(Error::JsonParse { .. })
    ));

    let json = r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root", "color": "zz0000" } ] }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonInvalidColor { .. })
    ));

    let json = r#"{ "bones": [ { "name": "root", "transform": "sideways" } ] }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonUnsupportedValue { kind: "transform mode", .. })
    ));

    let json = r#"{
      "bones": [ { "name": "root" } ],
      "animations": { "a": { "bones": { "root": { "rotate": [
        { "time": 0, "angle": 0, "curve": [0.25, 0, 0.75] }, { "time": 1, "angle": 10 }
      ] } } } }
    }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonInvalidCurve { .. })
    ));

    let json = r#"{
      "bones": [ { "name": "root" } ],
      "slots": [ { "name": "s", "bone": "root" } ],
      "skins": [ { "name": "default", "attachments": { "s": { "x": { "type": "sprite" } } } } ]
    }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::JsonUnsupportedValue { kind: "attachment type", .. })
    ));
}

#[test]
fn validation_runs_after_loading() {
    let json = r#"{
      "bones": [ { "name": "root" }, { "name": "a", "parent": "root" } ],
      "ik": [ { "name": "x", "order": 0, "bones": ["a"], "target": "root" } ],
      "transform": [ { "name": "y", "order": 0, "bones": ["a"], "target": "root" } ]
    }"#;
    assert!(matches!(
        SkeletonData::from_json_str(json),
        Err(Error::DuplicateConstraintOrder { order: 0, .. })
    ));
}
