//! Loader for the 3.x JSON skeleton export.

use crate::{
    Animation, Attachment, AttachmentTimeline, BlendMode, BoneData, BoundingBoxAttachment,
    ClippingAttachment, ColorTimeline, CurveTable, CurveTimeline, DeformTimeline,
    DrawOrderTimeline, EXPORT_MAJOR, EXPORT_MINOR, Error, Event, EventData, EventTimeline,
    IkConstraintData, IkConstraintTimeline, MeshAttachment, PathAttachment, PathConstraintData,
    PathConstraintMixTimeline, PathConstraintPositionTimeline, PathConstraintSpacingTimeline,
    PointAttachment, PositionMode, RegionAttachment, RotateMode, RotateTimeline, ScaleTimeline,
    ShearTimeline, SkeletonData, SkinData, SlotData, SpacingMode, Timeline,
    TransformConstraintData, TransformConstraintTimeline, TransformMode, TranslateTimeline,
    TwoColorTimeline, VertexData, parse_export_version,
};
use log::warn;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    #[serde(default)]
    bones: Vec<BoneDef>,
    #[serde(default)]
    slots: Vec<SlotDef>,
    #[serde(default)]
    ik: Vec<IkConstraintDef>,
    #[serde(default)]
    transform: Vec<TransformConstraintDef>,
    #[serde(default)]
    path: Vec<PathConstraintDef>,
    skins: Option<SkinsDef>,
    #[serde(default)]
    events: BTreeMap<String, EventDef>,
    #[serde(default)]
    animations: BTreeMap<String, AnimationDef>,
}

#[derive(Debug, Default, Deserialize)]
struct SkeletonHeader {
    hash: Option<String>,
    spine: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    fps: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    transform: Option<String>,
    #[serde(default, rename = "skin")]
    skin_required: bool,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    color: Option<String>,
    dark: Option<String>,
    attachment: Option<String>,
    blend: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IkConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    #[serde(default)]
    bones: Vec<String>,
    target: String,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default)]
    softness: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    bend_positive: bool,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    stretch: bool,
    #[serde(default)]
    uniform: bool,
}

#[derive(Debug, Deserialize)]
struct TransformConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    #[serde(default)]
    bones: Vec<String>,
    target: String,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default, rename = "scaleX")]
    scale_x: f32,
    #[serde(default, rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    translate_mix: f32,
    #[serde(default = "default_one", rename = "scaleMix")]
    scale_mix: f32,
    #[serde(default = "default_one", rename = "shearMix")]
    shear_mix: f32,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    relative: bool,
}

#[derive(Debug, Deserialize)]
struct PathConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    #[serde(default)]
    bones: Vec<String>,
    target: String,
    #[serde(rename = "positionMode")]
    position_mode: Option<String>,
    #[serde(rename = "spacingMode")]
    spacing_mode: Option<String>,
    #[serde(rename = "rotateMode")]
    rotate_mode: Option<String>,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    position: f32,
    #[serde(default)]
    spacing: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    translate_mix: f32,
}

type SlotAttachmentsDef = BTreeMap<String, BTreeMap<String, AttachmentDef>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Array(Vec<SkinDef>),
    Map(BTreeMap<String, SlotAttachmentsDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: SlotAttachmentsDef,
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    ik: Vec<String>,
    #[serde(default)]
    transform: Vec<String>,
    #[serde(default)]
    path: Vec<String>,
}

/// Every attachment type shares one flat shape; `type` selects which fields matter.
#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    path: Option<String>,
    color: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    uvs: Vec<f32>,
    #[serde(default)]
    triangles: Vec<u16>,
    #[serde(default)]
    vertices: Vec<f32>,
    #[serde(default)]
    hull: usize,
    #[serde(default)]
    edges: Vec<u16>,
    #[serde(rename = "vertexCount")]
    vertex_count: Option<usize>,
    #[serde(default)]
    lengths: Vec<f32>,
    #[serde(default)]
    closed: bool,
    #[serde(default = "default_true", rename = "constantSpeed")]
    constant_speed: bool,
    skin: Option<String>,
    parent: Option<String>,
    #[serde(default = "default_true")]
    deform: bool,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDef {
    #[serde(default, rename = "int")]
    int_value: i32,
    #[serde(default, rename = "float")]
    float_value: f32,
    #[serde(default)]
    string: String,
    #[serde(default)]
    audio: String,
    #[serde(default = "default_one")]
    volume: f32,
    #[serde(default)]
    balance: f32,
}

type PropertyKeysDef = BTreeMap<String, BTreeMap<String, Vec<serde_json::Value>>>;

#[derive(Debug, Default, Deserialize)]
struct AnimationDef {
    #[serde(default)]
    bones: PropertyKeysDef,
    #[serde(default)]
    slots: PropertyKeysDef,
    #[serde(default)]
    ik: BTreeMap<String, Vec<IkKey>>,
    #[serde(default)]
    transform: BTreeMap<String, Vec<TransformKey>>,
    #[serde(default, alias = "paths")]
    path: PropertyKeysDef,
    #[serde(default, alias = "ffd")]
    deform: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<DeformKey>>>>,
    #[serde(default, rename = "drawOrder", alias = "draworder")]
    draw_order: Vec<DrawOrderKey>,
    #[serde(default)]
    events: Vec<EventKey>,
}

/// Interpolation to the next keyframe: absent (linear), `"stepped"`, a number `cx1` with sibling
/// `c2`..`c4`, or a `[cx1, cy1, cx2, cy2]` array.
#[derive(Debug, Default, Deserialize)]
struct CurveDef {
    curve: Option<serde_json::Value>,
    c2: Option<f32>,
    c3: Option<f32>,
    c4: Option<f32>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Curve {
    Linear,
    Stepped,
    Bezier([f32; 4]),
}

impl CurveDef {
    fn parse(&self, context: &str) -> Result<Curve, Error> {
        let invalid = |message: String| Error::JsonInvalidCurve {
            context: context.to_string(),
            message,
        };
        let number = |value: &serde_json::Value, index: usize| {
            value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| invalid(format!("curve[{index}] must be a number")))
        };

        match &self.curve {
            None => Ok(Curve::Linear),
            Some(serde_json::Value::String(kind)) if kind == "stepped" => Ok(Curve::Stepped),
            Some(serde_json::Value::String(kind)) => {
                warn!("{context}: unknown curve '{kind}', using linear");
                Ok(Curve::Linear)
            }
            Some(value @ serde_json::Value::Number(_)) => Ok(Curve::Bezier([
                number(value, 0)?,
                self.c2.unwrap_or(0.0),
                self.c3.unwrap_or(1.0),
                self.c4.unwrap_or(1.0),
            ])),
            Some(serde_json::Value::Array(items)) => {
                if items.len() != 4 {
                    return Err(invalid(format!("expected 4 numbers, got {}", items.len())));
                }
                Ok(Curve::Bezier([
                    number(&items[0], 0)?,
                    number(&items[1], 1)?,
                    number(&items[2], 2)?,
                    number(&items[3], 3)?,
                ]))
            }
            Some(other) => Err(invalid(format!("unexpected value {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RotateKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    angle: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct VectorKey {
    #[serde(default)]
    time: f32,
    x: Option<f32>,
    y: Option<f32>,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct ColorKey {
    #[serde(default)]
    time: f32,
    color: String,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct TwoColorKey {
    #[serde(default)]
    time: f32,
    light: String,
    dark: String,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct AttachmentKey {
    #[serde(default)]
    time: f32,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IkKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default)]
    softness: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    bend_positive: bool,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    stretch: bool,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct TransformKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    translate_mix: f32,
    #[serde(default = "default_one", rename = "scaleMix")]
    scale_mix: f32,
    #[serde(default = "default_one", rename = "shearMix")]
    shear_mix: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct PathValueKey {
    #[serde(default)]
    time: f32,
    position: Option<f32>,
    spacing: Option<f32>,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct PathMixKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    translate_mix: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct DeformKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    offset: usize,
    vertices: Option<Vec<f32>>,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct DrawOrderKey {
    #[serde(default)]
    time: f32,
    offsets: Option<Vec<DrawOrderOffset>>,
}

#[derive(Debug, Deserialize)]
struct DrawOrderOffset {
    slot: String,
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct EventKey {
    #[serde(default)]
    time: f32,
    name: String,
    #[serde(rename = "int")]
    int_value: Option<i32>,
    #[serde(rename = "float")]
    float_value: Option<f32>,
    string: Option<String>,
    volume: Option<f32>,
    balance: Option<f32>,
}

/// A mesh whose geometry comes from another mesh, resolved once every skin is read.
struct LinkedMesh {
    mesh: MeshAttachment,
    skin: usize,
    slot: usize,
    key: String,
    parent_skin: String,
    parent: String,
    inherit_deform: bool,
}

/// Name to index lookups shared by the constraint, skin and animation readers.
#[derive(Default)]
struct Names {
    bones: HashMap<String, usize>,
    slots: HashMap<String, usize>,
    ik: HashMap<String, usize>,
    transform: HashMap<String, usize>,
    path: HashMap<String, usize>,
    skins: HashMap<String, usize>,
    events: HashMap<String, usize>,
}

impl Names {
    fn bone(&self, name: &str, context: impl FnOnce() -> String) -> Result<usize, Error> {
        self.bones
            .get(name)
            .copied()
            .ok_or_else(|| Error::JsonUnknownBone {
                context: context(),
                bone: name.to_string(),
            })
    }

    fn slot(&self, name: &str, context: impl FnOnce() -> String) -> Result<usize, Error> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| Error::JsonUnknownSlot {
                context: context(),
                slot: name.to_string(),
            })
    }

    fn constraint(
        &self,
        kind: &'static str,
        name: &str,
        context: impl FnOnce() -> String,
    ) -> Result<usize, Error> {
        let map = match kind {
            "ik" => &self.ik,
            "transform" => &self.transform,
            _ => &self.path,
        };
        map.get(name)
            .copied()
            .ok_or_else(|| Error::JsonUnknownConstraint {
                context: context(),
                kind,
                constraint: name.to_string(),
            })
    }

    fn skin(&self, name: &str, context: impl FnOnce() -> String) -> Result<usize, Error> {
        self.skins
            .get(name)
            .copied()
            .ok_or_else(|| Error::JsonUnknownSkin {
                context: context(),
                skin: name.to_string(),
            })
    }
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        Self::from_json_str_with_scale(input, 1.0)
    }

    /// Reads a skeleton, multiplying every authored length and position by `scale`.
    pub fn from_json_str_with_scale(input: &str, scale: f32) -> Result<Arc<Self>, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
        let scale = if scale.is_finite() { scale } else { 1.0 };

        let header = root.skeleton.unwrap_or_default();
        if let Some(version) = header.spine.as_deref() {
            check_version(version)?;
        }

        let mut names = Names::default();
        let mut data = SkeletonData {
            name: None,
            version: header.spine,
            hash: header.hash,
            x: header.x,
            y: header.y,
            width: header.width,
            height: header.height,
            fps: header.fps.unwrap_or(30.0),
            ..SkeletonData::default()
        };

        for bone in root.bones {
            let parent = bone
                .parent
                .as_deref()
                .map(|parent| names.bone(parent, || format!("bone '{}'", bone.name)))
                .transpose()?;
            let context = || format!("bone '{}'", bone.name);
            names.bones.insert(bone.name.clone(), data.bones.len());
            data.bones.push(BoneData {
                transform_mode: parse_transform_mode(bone.transform.as_deref(), context)?,
                name: bone.name,
                parent,
                length: bone.length * scale,
                x: bone.x * scale,
                y: bone.y * scale,
                rotation: bone.rotation,
                scale_x: bone.scale_x,
                scale_y: bone.scale_y,
                shear_x: bone.shear_x,
                shear_y: bone.shear_y,
                skin_required: bone.skin_required,
            });
        }

        for slot in root.slots {
            let context = format!("slot '{}'", slot.name);
            let bone = names.bone(&slot.bone, || context.clone())?;
            let mut slot_data = SlotData::new(slot.name.clone(), bone);
            if let Some(color) = slot.color.as_deref() {
                slot_data.color = parse_color(color, &context)?;
            }
            if let Some(dark) = slot.dark.as_deref() {
                let [r, g, b, _] = parse_color(dark, &context)?;
                slot_data.has_dark = true;
                slot_data.dark_color = [r, g, b];
            }
            slot_data.attachment = slot.attachment;
            slot_data.blend = parse_blend_mode(slot.blend.as_deref(), &context)?;
            names.slots.insert(slot.name, data.slots.len());
            data.slots.push(slot_data);
        }

        for ik in root.ik {
            let context = || format!("ik constraint '{}'", ik.name);
            let bones = ik
                .bones
                .iter()
                .map(|bone| names.bone(bone, context))
                .collect::<Result<Vec<_>, _>>()?;
            let target = names.bone(&ik.target, context)?;
            names.ik.insert(ik.name.clone(), data.ik_constraints.len());
            data.ik_constraints.push(IkConstraintData {
                name: ik.name,
                order: ik.order,
                skin_required: ik.skin_required,
                bones,
                target,
                mix: ik.mix,
                softness: ik.softness * scale,
                compress: ik.compress,
                stretch: ik.stretch,
                uniform: ik.uniform,
                bend_direction: if ik.bend_positive { 1 } else { -1 },
            });
        }

        for c in root.transform {
            let context = || format!("transform constraint '{}'", c.name);
            let bones = c
                .bones
                .iter()
                .map(|bone| names.bone(bone, context))
                .collect::<Result<Vec<_>, _>>()?;
            let target = names.bone(&c.target, context)?;
            names
                .transform
                .insert(c.name.clone(), data.transform_constraints.len());
            data.transform_constraints.push(TransformConstraintData {
                name: c.name,
                order: c.order,
                skin_required: c.skin_required,
                bones,
                target,
                local: c.local,
                relative: c.relative,
                offset_rotation: c.rotation,
                offset_x: c.x * scale,
                offset_y: c.y * scale,
                offset_scale_x: c.scale_x,
                offset_scale_y: c.scale_y,
                offset_shear_y: c.shear_y,
                rotate_mix: c.rotate_mix,
                translate_mix: c.translate_mix,
                scale_mix: c.scale_mix,
                shear_mix: c.shear_mix,
            });
        }

        for c in root.path {
            let context = || format!("path constraint '{}'", c.name);
            let bones = c
                .bones
                .iter()
                .map(|bone| names.bone(bone, context))
                .collect::<Result<Vec<_>, _>>()?;
            let target = names.slot(&c.target, context)?;
            let position_mode = parse_position_mode(c.position_mode.as_deref(), context)?;
            let spacing_mode = parse_spacing_mode(c.spacing_mode.as_deref(), context)?;
            let rotate_mode = parse_rotate_mode(c.rotate_mode.as_deref(), context)?;
            names.path.insert(c.name.clone(), data.path_constraints.len());
            data.path_constraints.push(PathConstraintData {
                name: c.name,
                order: c.order,
                skin_required: c.skin_required,
                bones,
                target,
                position_mode,
                spacing_mode,
                rotate_mode,
                offset_rotation: c.rotation,
                position: if position_mode == PositionMode::Fixed {
                    c.position * scale
                } else {
                    c.position
                },
                spacing: if spacing_mode == SpacingMode::Percent {
                    c.spacing
                } else {
                    c.spacing * scale
                },
                rotate_mix: c.rotate_mix,
                translate_mix: c.translate_mix,
            });
        }

        let skin_defs: Vec<SkinDef> = match root.skins {
            None => Vec::new(),
            Some(SkinsDef::Array(skins)) => skins,
            Some(SkinsDef::Map(skins)) => skins
                .into_iter()
                .map(|(name, attachments)| SkinDef {
                    name,
                    attachments,
                    bones: Vec::new(),
                    ik: Vec::new(),
                    transform: Vec::new(),
                    path: Vec::new(),
                })
                .collect(),
        };
        let mut linked_meshes = Vec::new();
        for skin_def in skin_defs {
            let skin_index = data.skins.len();
            let skin = read_skin(skin_def, skin_index, &names, &data, scale, &mut linked_meshes)?;
            names.skins.insert(skin.name.clone(), skin_index);
            data.skins.push(skin);
        }
        resolve_linked_meshes(&mut data.skins, &names, linked_meshes)?;

        for (name, event) in root.events {
            names.events.insert(name.clone(), data.events.len());
            data.events.push(EventData {
                name,
                int_value: event.int_value,
                float_value: event.float_value,
                string: event.string,
                audio_path: event.audio,
                volume: event.volume,
                balance: event.balance,
            });
        }

        for (name, animation) in root.animations {
            let timelines = read_animation(&name, animation, &names, &data, scale)?;
            data.animations
                .push(Animation::with_computed_duration(name, timelines)?);
        }

        data.validate()?;
        Ok(Arc::new(data))
    }
}

fn check_version(value: &str) -> Result<(), Error> {
    match parse_export_version(value) {
        Some((major, minor)) if major == EXPORT_MAJOR => {
            if minor > EXPORT_MINOR {
                warn!(
                    "skeleton exported by version {value}, newer than {EXPORT_MAJOR}.{EXPORT_MINOR}"
                );
            }
            Ok(())
        }
        _ => Err(Error::JsonVersion {
            value: value.to_string(),
        }),
    }
}

fn unsupported(kind: &'static str, value: &str, context: impl FnOnce() -> String) -> Error {
    Error::JsonUnsupportedValue {
        context: context(),
        kind,
        value: value.to_string(),
    }
}

fn parse_transform_mode(
    raw: Option<&str>,
    context: impl FnOnce() -> String,
) -> Result<TransformMode, Error> {
    Ok(match raw.unwrap_or("normal") {
        "normal" => TransformMode::Normal,
        "onlyTranslation" => TransformMode::OnlyTranslation,
        "noRotationOrReflection" => TransformMode::NoRotationOrReflection,
        "noScale" => TransformMode::NoScale,
        "noScaleOrReflection" => TransformMode::NoScaleOrReflection,
        other => return Err(unsupported("transform mode", other, context)),
    })
}

fn parse_blend_mode(raw: Option<&str>, context: &str) -> Result<BlendMode, Error> {
    Ok(match raw.unwrap_or("normal") {
        "normal" => BlendMode::Normal,
        "additive" => BlendMode::Additive,
        "multiply" => BlendMode::Multiply,
        "screen" => BlendMode::Screen,
        other => return Err(unsupported("blend mode", other, || context.to_string())),
    })
}

fn parse_position_mode(
    raw: Option<&str>,
    context: impl FnOnce() -> String,
) -> Result<PositionMode, Error> {
    Ok(match raw.unwrap_or("percent") {
        "fixed" => PositionMode::Fixed,
        "percent" => PositionMode::Percent,
        other => return Err(unsupported("position mode", other, context)),
    })
}

fn parse_spacing_mode(
    raw: Option<&str>,
    context: impl FnOnce() -> String,
) -> Result<SpacingMode, Error> {
    Ok(match raw.unwrap_or("length") {
        "length" => SpacingMode::Length,
        "fixed" => SpacingMode::Fixed,
        "percent" => SpacingMode::Percent,
        other => return Err(unsupported("spacing mode", other, context)),
    })
}

fn parse_rotate_mode(
    raw: Option<&str>,
    context: impl FnOnce() -> String,
) -> Result<RotateMode, Error> {
    Ok(match raw.unwrap_or("tangent") {
        "tangent" => RotateMode::Tangent,
        "chain" => RotateMode::Chain,
        "chainScale" => RotateMode::ChainScale,
        other => return Err(unsupported("rotate mode", other, context)),
    })
}

/// Parses `RRGGBB` or `RRGGBBAA` hex into normalized RGBA.
fn parse_color(value: &str, context: &str) -> Result<[f32; 4], Error> {
    let invalid = || Error::JsonInvalidColor {
        context: context.to_string(),
        value: value.to_string(),
    };
    if !value.is_ascii() || !(value.len() == 6 || value.len() == 8) {
        return Err(invalid());
    }
    let channel = |index: usize| {
        u8::from_str_radix(&value[index * 2..index * 2 + 2], 16)
            .map(|v| f32::from(v) / 255.0)
            .map_err(|_| invalid())
    };
    let alpha = if value.len() == 8 { channel(3)? } else { 1.0 };
    Ok([channel(0)?, channel(1)?, channel(2)?, alpha])
}

fn read_skin(
    def: SkinDef,
    skin_index: usize,
    names: &Names,
    data: &SkeletonData,
    scale: f32,
    linked_meshes: &mut Vec<LinkedMesh>,
) -> Result<SkinData, Error> {
    let mut skin = SkinData::new(def.name);
    let context = || format!("skin '{}'", skin.name);

    skin.bones = def
        .bones
        .iter()
        .map(|bone| names.bone(bone, context))
        .collect::<Result<_, _>>()?;
    skin.ik_constraints = def
        .ik
        .iter()
        .map(|c| names.constraint("ik", c, context))
        .collect::<Result<_, _>>()?;
    skin.transform_constraints = def
        .transform
        .iter()
        .map(|c| names.constraint("transform", c, context))
        .collect::<Result<_, _>>()?;
    skin.path_constraints = def
        .path
        .iter()
        .map(|c| names.constraint("path", c, context))
        .collect::<Result<_, _>>()?;

    for (slot_name, attachments) in def.attachments {
        let slot = names.slot(&slot_name, || format!("skin '{}'", skin.name))?;
        for (key, attachment) in attachments {
            let context = format!("attachment '{key}' in skin '{}' slot '{slot_name}'", skin.name);
            match read_attachment(&key, attachment, names, data, scale, &context)? {
                ReadAttachment::Ready(attachment) => skin.set_attachment(slot, key, attachment),
                ReadAttachment::Linked {
                    mesh,
                    parent_skin,
                    parent,
                    inherit_deform,
                } => linked_meshes.push(LinkedMesh {
                    mesh,
                    skin: skin_index,
                    slot,
                    key,
                    parent_skin,
                    parent,
                    inherit_deform,
                }),
            }
        }
    }
    Ok(skin)
}

enum ReadAttachment {
    Ready(Attachment),
    Linked {
        mesh: MeshAttachment,
        parent_skin: String,
        parent: String,
        inherit_deform: bool,
    },
}

fn read_attachment(
    key: &str,
    def: AttachmentDef,
    names: &Names,
    data: &SkeletonData,
    scale: f32,
    context: &str,
) -> Result<ReadAttachment, Error> {
    let name = def.name.clone().unwrap_or_else(|| key.to_string());
    let path = def.path.clone().unwrap_or_else(|| name.clone());
    let color = def
        .color
        .as_deref()
        .map(|c| parse_color(c, context))
        .transpose()?
        .unwrap_or([1.0, 1.0, 1.0, 1.0]);
    let bone_count = data.bones.len();
    let vertices_of = |def: &AttachmentDef| {
        let length = def.vertex_count.unwrap_or(0) * 2;
        read_vertices(&def.vertices, length, bone_count, scale, context)
    };

    let attachment = match def.kind.as_deref().unwrap_or("region") {
        "region" => {
            let mut region = RegionAttachment::new(name, def.width * scale, def.height * scale);
            region.path = path;
            region.color = color;
            region.x = def.x * scale;
            region.y = def.y * scale;
            region.rotation = def.rotation;
            region.scale_x = def.scale_x;
            region.scale_y = def.scale_y;
            region.update_offsets();
            Attachment::Region(region)
        }
        kind @ ("mesh" | "linkedmesh") => {
            let mut mesh = MeshAttachment {
                name,
                path,
                color,
                vertex: VertexData::default(),
                region_uvs: Vec::new(),
                triangles: Vec::new(),
                hull_length: 0,
                edges: Vec::new(),
                width: def.width * scale,
                height: def.height * scale,
                deform_attachment: None,
            };
            if kind == "linkedmesh" {
                let Some(parent) = def.parent else {
                    return Err(Error::JsonInvalidVertices {
                        context: context.to_string(),
                        message: "linked mesh without a parent".to_string(),
                    });
                };
                return Ok(ReadAttachment::Linked {
                    mesh,
                    parent_skin: def.skin.unwrap_or_else(|| "default".to_string()),
                    parent,
                    inherit_deform: def.deform,
                });
            }
            mesh.vertex = read_vertices(&def.vertices, def.uvs.len(), bone_count, scale, context)?;
            mesh.hull_length = def.hull * 2;
            mesh.region_uvs = def.uvs;
            mesh.triangles = def.triangles;
            mesh.edges = def.edges;
            Attachment::Mesh(mesh)
        }
        "boundingbox" => Attachment::BoundingBox(BoundingBoxAttachment {
            vertex: vertices_of(&def)?,
            name,
            color,
        }),
        "path" => Attachment::Path(PathAttachment {
            vertex: vertices_of(&def)?,
            name,
            color,
            lengths: def.lengths.iter().map(|l| l * scale).collect(),
            closed: def.closed,
            constant_speed: def.constant_speed,
        }),
        "point" => Attachment::Point(PointAttachment {
            name,
            color,
            x: def.x * scale,
            y: def.y * scale,
            rotation: def.rotation,
        }),
        "clipping" => {
            let end_slot = def
                .end
                .as_deref()
                .map(|end| names.slot(end, || context.to_string()))
                .transpose()?;
            Attachment::Clipping(ClippingAttachment {
                vertex: vertices_of(&def)?,
                name,
                color,
                end_slot,
            })
        }
        other => return Err(unsupported("attachment type", other, || context.to_string())),
    };
    Ok(ReadAttachment::Ready(attachment))
}

/// Unweighted when `raw` holds exactly `vertices_length` floats; otherwise the weighted layout
/// `count, (bone, x, y, weight) * count` repeated per vertex.
fn read_vertices(
    raw: &[f32],
    vertices_length: usize,
    bone_count: usize,
    scale: f32,
    context: &str,
) -> Result<VertexData, Error> {
    if raw.len() == vertices_length {
        return Ok(VertexData::unweighted(raw.iter().map(|v| v * scale).collect()));
    }

    let invalid = |message: &str| Error::JsonInvalidVertices {
        context: context.to_string(),
        message: message.to_string(),
    };
    let as_index = |value: f32| {
        (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as usize)
    };

    let vertex_count = vertices_length / 2;
    let mut bones = Vec::new();
    let mut weights = Vec::new();
    let mut cursor = 0usize;
    for _ in 0..vertex_count {
        let count = raw
            .get(cursor)
            .copied()
            .and_then(as_index)
            .ok_or_else(|| invalid("invalid or missing influence count"))?;
        cursor += 1;
        bones.push(count);
        for _ in 0..count {
            let influence = raw
                .get(cursor..cursor + 4)
                .ok_or_else(|| invalid("unexpected end of weighted vertices"))?;
            cursor += 4;
            let bone = as_index(influence[0])
                .filter(|&bone| bone < bone_count)
                .ok_or_else(|| invalid("bone index out of range"))?;
            bones.push(bone);
            weights.extend([influence[1] * scale, influence[2] * scale, influence[3]]);
        }
    }
    if cursor != raw.len() {
        return Err(invalid("unexpected extra data in weighted vertices"));
    }
    Ok(VertexData::weighted(bones, weights, vertex_count))
}

fn resolve_linked_meshes(
    skins: &mut [SkinData],
    names: &Names,
    linked_meshes: Vec<LinkedMesh>,
) -> Result<(), Error> {
    for linked in linked_meshes {
        let context = || format!("linked mesh '{}'", linked.key);
        let parent_skin = names.skin(&linked.parent_skin, context)?;
        let Some(Attachment::Mesh(parent)) =
            skins[parent_skin].attachment(linked.slot, &linked.parent)
        else {
            return Err(Error::JsonUnknownAttachment {
                context: context(),
                attachment: linked.parent.clone(),
            });
        };

        let mut mesh = linked.mesh;
        mesh.vertex = parent.vertex.clone();
        mesh.region_uvs = parent.region_uvs.clone();
        mesh.triangles = parent.triangles.clone();
        mesh.hull_length = parent.hull_length;
        mesh.edges = parent.edges.clone();
        if linked.inherit_deform {
            let target = parent.deform_attachment.as_deref().unwrap_or(&parent.name);
            mesh.deform_attachment = Some(target.to_string());
        }
        skins[linked.skin].set_attachment(linked.slot, linked.key, Attachment::Mesh(mesh));
    }
    Ok(())
}

fn parse_keys<T: DeserializeOwned>(
    values: Vec<serde_json::Value>,
    context: &str,
) -> Result<Vec<T>, Error> {
    values
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|e| Error::JsonParse {
                message: format!("{context}: {e}"),
            })
        })
        .collect()
}

fn set_curve(table: &mut CurveTable, bezier: &mut usize, frame: usize, curve: Curve) {
    for component in 0..table.components() {
        match curve {
            Curve::Linear => {}
            Curve::Stepped => table.set_stepped(frame, component),
            Curve::Bezier(points) => {
                if table.set_bezier(*bezier, frame, component, points) {
                    *bezier += 1;
                }
            }
        }
    }
}

/// Builds interleaved keyframes. Bezier storage starts at its worst case (every segment of every
/// component curved) and is shrunk to what the keys use.
fn curve_timeline<const N: usize>(keys: &[(f32, [f32; N], Curve)]) -> CurveTimeline {
    let frame_count = keys.len();
    let mut timeline = CurveTimeline::new(frame_count, N, frame_count.saturating_sub(1) * N);
    let mut bezier = 0;
    for (frame, (time, values, curve)) in keys.iter().enumerate() {
        timeline.set_frame(frame, *time, values);
        if frame + 1 < frame_count {
            set_curve(timeline.curves_mut(), &mut bezier, frame, *curve);
        }
    }
    timeline.curves_mut().shrink(bezier);
    timeline
}

fn read_animation(
    animation: &str,
    def: AnimationDef,
    names: &Names,
    data: &SkeletonData,
    scale: f32,
) -> Result<Vec<Timeline>, Error> {
    let mut timelines = Vec::new();

    for (bone_name, properties) in def.bones {
        let bone = names.bone(&bone_name, || format!("animation '{animation}'"))?;
        for (property, values) in properties {
            let context = format!("animation '{animation}' bone '{bone_name}' {property}");
            let vector = |values, default: f32, scale: f32| -> Result<_, Error> {
                parse_keys::<VectorKey>(values, &context)?
                    .iter()
                    .map(|k| {
                        Ok((
                            k.time,
                            [
                                k.x.unwrap_or(default) * scale,
                                k.y.unwrap_or(default) * scale,
                            ],
                            k.curve.parse(&context)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, Error>>()
            };
            match property.as_str() {
                "rotate" => {
                    let keys = parse_keys::<RotateKey>(values, &context)?
                        .iter()
                        .map(|k| Ok((k.time, [k.angle], k.curve.parse(&context)?)))
                        .collect::<Result<Vec<_>, Error>>()?;
                    timelines.push(Timeline::Rotate(RotateTimeline {
                        bone,
                        curve: curve_timeline(&keys),
                    }));
                }
                "translate" => timelines.push(Timeline::Translate(TranslateTimeline {
                    bone,
                    curve: curve_timeline(&vector(values, 0.0, scale)?),
                })),
                "scale" => timelines.push(Timeline::Scale(ScaleTimeline {
                    bone,
                    curve: curve_timeline(&vector(values, 1.0, 1.0)?),
                })),
                "shear" => timelines.push(Timeline::Shear(ShearTimeline {
                    bone,
                    curve: curve_timeline(&vector(values, 0.0, 1.0)?),
                })),
                other => warn!("{context}: skipping unknown bone timeline '{other}'"),
            }
        }
    }

    for (slot_name, properties) in def.slots {
        let slot = names.slot(&slot_name, || format!("animation '{animation}'"))?;
        for (property, values) in properties {
            let context = format!("animation '{animation}' slot '{slot_name}' {property}");
            match property.as_str() {
                "attachment" => {
                    let keys = parse_keys::<AttachmentKey>(values, &context)?;
                    timelines.push(Timeline::Attachment(AttachmentTimeline {
                        slot,
                        frames: keys.iter().map(|k| k.time).collect(),
                        names: keys.into_iter().map(|k| k.name).collect(),
                    }));
                }
                "color" => {
                    let keys = parse_keys::<ColorKey>(values, &context)?
                        .iter()
                        .map(|k| {
                            Ok((
                                k.time,
                                parse_color(&k.color, &context)?,
                                k.curve.parse(&context)?,
                            ))
                        })
                        .collect::<Result<Vec<_>, Error>>()?;
                    timelines.push(Timeline::Color(ColorTimeline {
                        slot,
                        curve: curve_timeline(&keys),
                    }));
                }
                "twoColor" => {
                    let keys = parse_keys::<TwoColorKey>(values, &context)?
                        .iter()
                        .map(|k| {
                            let [r, g, b, a] = parse_color(&k.light, &context)?;
                            let [dr, dg, db, _] = parse_color(&k.dark, &context)?;
                            Ok((k.time, [r, g, b, a, dr, dg, db], k.curve.parse(&context)?))
                        })
                        .collect::<Result<Vec<_>, Error>>()?;
                    timelines.push(Timeline::TwoColor(TwoColorTimeline {
                        slot,
                        curve: curve_timeline(&keys),
                    }));
                }
                other => warn!("{context}: skipping unknown slot timeline '{other}'"),
            }
        }
    }

    for (name, keys) in def.ik {
        let context = format!("animation '{animation}' ik '{name}'");
        let constraint = names.constraint("ik", &name, || context.clone())?;
        let values = keys
            .iter()
            .map(|k| {
                Ok((
                    k.time,
                    [k.mix, k.softness * scale],
                    k.curve.parse(&context)?,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        timelines.push(Timeline::IkConstraint(IkConstraintTimeline {
            constraint,
            curve: curve_timeline(&values),
            bend_directions: keys
                .iter()
                .map(|k| if k.bend_positive { 1 } else { -1 })
                .collect(),
            compress: keys.iter().map(|k| k.compress).collect(),
            stretch: keys.iter().map(|k| k.stretch).collect(),
        }));
    }

    for (name, keys) in def.transform {
        let context = format!("animation '{animation}' transform '{name}'");
        let constraint = names.constraint("transform", &name, || context.clone())?;
        let values = keys
            .iter()
            .map(|k| {
                Ok((
                    k.time,
                    [k.rotate_mix, k.translate_mix, k.scale_mix, k.shear_mix],
                    k.curve.parse(&context)?,
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        timelines.push(Timeline::TransformConstraint(
            TransformConstraintTimeline {
                constraint,
                curve: curve_timeline(&values),
            },
        ));
    }

    for (name, properties) in def.path {
        let constraint = names.constraint("path", &name, || format!("animation '{animation}'"))?;
        let setup = &data.path_constraints[constraint];
        for (property, values) in properties {
            let context = format!("animation '{animation}' path '{name}' {property}");
            match property.as_str() {
                "position" | "spacing" => {
                    let value_scale = match property.as_str() {
                        "position" if setup.position_mode == PositionMode::Fixed => scale,
                        "spacing" if setup.spacing_mode != SpacingMode::Percent => scale,
                        _ => 1.0,
                    };
                    let keys = parse_keys::<PathValueKey>(values, &context)?
                        .iter()
                        .map(|k| {
                            let value = if property == "position" {
                                k.position
                            } else {
                                k.spacing
                            };
                            Ok((
                                k.time,
                                [value.unwrap_or(0.0) * value_scale],
                                k.curve.parse(&context)?,
                            ))
                        })
                        .collect::<Result<Vec<_>, Error>>()?;
                    let curve = curve_timeline(&keys);
                    timelines.push(if property == "position" {
                        Timeline::PathConstraintPosition(PathConstraintPositionTimeline {
                            constraint,
                            curve,
                        })
                    } else {
                        Timeline::PathConstraintSpacing(PathConstraintSpacingTimeline {
                            constraint,
                            curve,
                        })
                    });
                }
                "mix" => {
                    let keys = parse_keys::<PathMixKey>(values, &context)?
                        .iter()
                        .map(|k| {
                            Ok((
                                k.time,
                                [k.rotate_mix, k.translate_mix],
                                k.curve.parse(&context)?,
                            ))
                        })
                        .collect::<Result<Vec<_>, Error>>()?;
                    timelines.push(Timeline::PathConstraintMix(PathConstraintMixTimeline {
                        constraint,
                        curve: curve_timeline(&keys),
                    }));
                }
                other => warn!("{context}: skipping unknown path timeline '{other}'"),
            }
        }
    }

    for (skin_name, slots) in def.deform {
        let skin = names.skin(&skin_name, || format!("animation '{animation}' deform"))?;
        for (slot_name, attachments) in slots {
            let slot = names.slot(&slot_name, || format!("animation '{animation}' deform"))?;
            for (attachment_name, keys) in attachments {
                let context = format!(
                    "animation '{animation}' deform '{skin_name}/{slot_name}/{attachment_name}'"
                );
                let attachment = data.skins[skin]
                    .attachment(slot, &attachment_name)
                    .filter(|a| a.vertex_data().is_some())
                    .ok_or_else(|| Error::JsonUnknownAttachment {
                        context: context.clone(),
                        attachment: attachment_name.clone(),
                    })?;
                timelines.push(Timeline::Deform(read_deform(
                    slot, attachment, &keys, scale, &context,
                )?));
            }
        }
    }

    if !def.draw_order.is_empty() {
        timelines.push(Timeline::DrawOrder(read_draw_order(
            animation,
            &def.draw_order,
            names,
            data.slots.len(),
        )?));
    }

    if !def.events.is_empty() {
        let mut timeline = EventTimeline::default();
        for key in def.events {
            let data_index =
                names
                    .events
                    .get(&key.name)
                    .copied()
                    .ok_or_else(|| Error::JsonUnknownEvent {
                        animation: animation.to_string(),
                        event: key.name.clone(),
                    })?;
            let event_data = &data.events[data_index];
            timeline.frames.push(key.time);
            timeline.events.push(Event {
                time: key.time,
                data: data_index,
                name: key.name,
                int_value: key.int_value.unwrap_or(event_data.int_value),
                float_value: key.float_value.unwrap_or(event_data.float_value),
                string: key.string.unwrap_or_else(|| event_data.string.clone()),
                audio_path: event_data.audio_path.clone(),
                volume: key.volume.unwrap_or(event_data.volume),
                balance: key.balance.unwrap_or(event_data.balance),
            });
        }
        timelines.push(Timeline::Event(timeline));
    }

    Ok(timelines)
}

/// Deform keys store vertices relative to `offset`. Unweighted keys become absolute positions;
/// weighted keys stay offsets.
fn read_deform(
    slot: usize,
    attachment: &Attachment,
    keys: &[DeformKey],
    scale: f32,
    context: &str,
) -> Result<DeformTimeline, Error> {
    let Some(vertex) = attachment.vertex_data() else {
        return Err(Error::JsonUnknownAttachment {
            context: context.to_string(),
            attachment: attachment.name().to_string(),
        });
    };
    let weighted = vertex.is_weighted();
    let deform_length = if weighted {
        vertex.vertices.len() / 3 * 2
    } else {
        vertex.vertices.len()
    };

    let frame_count = keys.len();
    let mut timeline = DeformTimeline::new(
        slot,
        attachment.name(),
        frame_count,
        frame_count.saturating_sub(1),
    );
    let mut bezier = 0;
    for (frame, key) in keys.iter().enumerate() {
        let deform = match key.vertices.as_deref() {
            None if weighted => vec![0.0; deform_length],
            None => vertex.vertices.clone(),
            Some(values) => {
                let end = key.offset + values.len();
                if end > deform_length {
                    return Err(Error::JsonInvalidVertices {
                        context: context.to_string(),
                        message: format!(
                            "deform keyframe {frame} writes {end} floats, attachment has {deform_length}"
                        ),
                    });
                }
                let mut deform = vec![0.0; deform_length];
                for (dst, value) in deform[key.offset..end].iter_mut().zip(values) {
                    *dst = value * scale;
                }
                if !weighted {
                    for (dst, setup) in deform.iter_mut().zip(&vertex.vertices) {
                        *dst += setup;
                    }
                }
                deform
            }
        };
        timeline.frames[frame] = key.time;
        timeline.vertices[frame] = deform;
        if frame + 1 < frame_count {
            set_curve(&mut timeline.curves, &mut bezier, frame, key.curve.parse(context)?);
        }
    }
    timeline.curves.shrink(bezier);
    Ok(timeline)
}

/// Expands per-slot offsets into a full draw order: moved slots land at `index + offset`, the
/// rest keep their relative order in the remaining positions.
fn read_draw_order(
    animation: &str,
    keys: &[DrawOrderKey],
    names: &Names,
    slot_count: usize,
) -> Result<DrawOrderTimeline, Error> {
    let mut timeline = DrawOrderTimeline::default();
    for key in keys {
        timeline.frames.push(key.time);
        let Some(offsets) = key.offsets.as_deref() else {
            timeline.draw_orders.push(None);
            continue;
        };
        let invalid = |message: String| Error::InvalidValue {
            message: format!("animation '{animation}' draw order at {}: {message}", key.time),
        };

        let mut order: Vec<Option<usize>> = vec![None; slot_count];
        let mut unchanged = Vec::with_capacity(slot_count.saturating_sub(offsets.len()));
        let mut original = 0usize;
        for entry in offsets {
            let slot = names.slot(&entry.slot, || format!("animation '{animation}' draw order"))?;
            if slot < original {
                return Err(invalid(format!("slot '{}' listed out of order", entry.slot)));
            }
            while original != slot {
                unchanged.push(original);
                original += 1;
            }
            let target = usize::try_from(original as i64 + entry.offset)
                .ok()
                .filter(|&target| target < slot_count)
                .ok_or_else(|| invalid(format!("offset {} out of range", entry.offset)))?;
            if order[target].replace(original).is_some() {
                return Err(invalid(format!("two slots moved to index {target}")));
            }
            original += 1;
        }
        unchanged.extend(original..slot_count);

        let mut draw_order = vec![0; slot_count];
        for (dst, entry) in draw_order.iter_mut().zip(&order).rev() {
            *dst = match entry {
                Some(slot) => *slot,
                None => unchanged
                    .pop()
                    .ok_or_else(|| invalid("not enough unchanged slots".to_string()))?,
            };
        }
        timeline.draw_orders.push(Some(draw_order));
    }
    Ok(timeline)
}
