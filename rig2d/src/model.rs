use crate::{Animation, Attachment, Error, LocalTransform};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    pub skin_required: bool,
}

impl BoneData {
    /// A bone with an identity setup pose.
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            skin_required: false,
        }
    }

    pub fn setup_transform(&self) -> LocalTransform {
        LocalTransform {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            shear_x: self.shear_x,
            shear_y: self.shear_y,
        }
    }
}

/// How a bone inherits rotation, scale and reflection from its parent.
///
/// Translation is always inherited.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub has_dark: bool,
    pub dark_color: [f32; 3],
    pub blend: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment: None,
            color: [1.0, 1.0, 1.0, 1.0],
            has_dark: false,
            dark_color: [0.0, 0.0, 0.0],
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub bend_direction: i32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, order: i32, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order,
            skin_required: false,
            bones,
            target,
            mix: 1.0,
            softness: 0.0,
            compress: false,
            stretch: false,
            uniform: false,
            bend_direction: 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    /// Mix parent-relative (applied) values instead of world values.
    pub local: bool,
    /// Add the target's values instead of replacing the constrained values.
    pub relative: bool,

    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,

    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>, order: i32, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order,
            skin_required: false,
            bones,
            target,
            local: false,
            relative: false,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            rotate_mix: 1.0,
            translate_mix: 1.0,
            scale_mix: 1.0,
            shear_mix: 1.0,
        }
    }
}

/// Whether a path constraint's position is an absolute distance or a fraction of the path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PositionMode {
    Fixed,
    #[default]
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SpacingMode {
    /// Bone length plus spacing.
    #[default]
    Length,
    /// Fixed gap between bones.
    Fixed,
    /// Fraction of the path length.
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot index holding the path attachment.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub rotate_mix: f32,
    pub translate_mix: f32,
}

impl PathConstraintData {
    pub fn new(name: impl Into<String>, order: i32, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order,
            skin_required: false,
            bones,
            target,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            rotate_mix: 1.0,
            translate_mix: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkinData {
    pub name: String,
    /// Attachments keyed by name, indexed by slot.
    pub attachments: Vec<HashMap<String, Attachment>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attachment(&self, slot_index: usize, attachment_name: &str) -> Option<&Attachment> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(attachment_name))
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        attachment_name: impl Into<String>,
        attachment: Attachment,
    ) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(attachment_name.into(), attachment);
    }

    pub fn slot_attachments(&self, slot_index: usize) -> impl Iterator<Item = (&str, &Attachment)> {
        self.attachments
            .get(slot_index)
            .into_iter()
            .flat_map(|slot_map| slot_map.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

/// An event fired by an event timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    /// Index into `SkeletonData::events`.
    pub data: usize,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub version: Option<String>,
    pub hash: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fps: f32,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub events: Vec<EventData>,
    pub animations: Vec<Animation>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|a| a.name == name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.ik_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.path_constraints.iter().position(|c| c.name == name)
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.iter().find(|s| s.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Index of the skin named `default`, which backs attachment lookups for every other skin.
    pub fn default_skin(&self) -> Option<usize> {
        self.find_skin("default")
    }

    pub fn constraint_count(&self) -> usize {
        self.ik_constraints.len() + self.transform_constraints.len() + self.path_constraints.len()
    }

    /// Checks every index reference, the bone tree shape, constraint ordering and animations.
    pub fn validate(&self) -> Result<(), Error> {
        let bone_count = self.bones.len();
        let slot_count = self.slots.len();

        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(Error::InvalidBoneParent {
                        bone: bone.name.clone(),
                        parent,
                    });
                }
            }
        }

        for slot in &self.slots {
            check_bone(bone_count, slot.bone, || format!("slot '{}'", slot.name))?;
        }

        for c in &self.ik_constraints {
            let context = || format!("ik constraint '{}'", c.name);
            if c.bones.len() != 1 && c.bones.len() != 2 {
                return Err(Error::InvalidIkBoneCount {
                    constraint: c.name.clone(),
                    count: c.bones.len(),
                });
            }
            for &bone in &c.bones {
                check_bone(bone_count, bone, context)?;
            }
            check_bone(bone_count, c.target, context)?;
        }
        for c in &self.transform_constraints {
            let context = || format!("transform constraint '{}'", c.name);
            if c.bones.is_empty() {
                return Err(Error::EmptyConstraintBones {
                    kind: "transform",
                    constraint: c.name.clone(),
                });
            }
            for &bone in &c.bones {
                check_bone(bone_count, bone, context)?;
            }
            check_bone(bone_count, c.target, context)?;
        }
        for c in &self.path_constraints {
            let context = || format!("path constraint '{}'", c.name);
            if c.bones.is_empty() {
                return Err(Error::EmptyConstraintBones {
                    kind: "path",
                    constraint: c.name.clone(),
                });
            }
            for &bone in &c.bones {
                check_bone(bone_count, bone, context)?;
            }
            if c.target >= slot_count {
                return Err(Error::UnknownSlotIndex {
                    context: context(),
                    index: c.target,
                });
            }
        }

        self.validate_constraint_order()?;

        for skin in &self.skins {
            self.validate_skin(skin)?;
        }

        for animation in &self.animations {
            animation.validate(self)?;
        }

        Ok(())
    }

    fn validate_constraint_order(&self) -> Result<(), Error> {
        let constraint_count = self.constraint_count();
        let orders = self
            .ik_constraints
            .iter()
            .map(|c| (c.name.as_str(), c.order))
            .chain(
                self.transform_constraints
                    .iter()
                    .map(|c| (c.name.as_str(), c.order)),
            )
            .chain(self.path_constraints.iter().map(|c| (c.name.as_str(), c.order)));

        let mut seen = HashMap::<i32, &str>::new();
        for (name, order) in orders {
            if order < 0 || order as usize >= constraint_count {
                return Err(Error::ConstraintOrderOutOfRange {
                    constraint: name.to_string(),
                    order,
                    count: constraint_count,
                });
            }
            if let Some(first) = seen.insert(order, name) {
                return Err(Error::DuplicateConstraintOrder {
                    order,
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_skin(&self, skin: &SkinData) -> Result<(), Error> {
        let bone_count = self.bones.len();
        let context = || format!("skin '{}'", skin.name);
        for &bone in &skin.bones {
            check_bone(bone_count, bone, context)?;
        }
        let constraint_lists: [(&'static str, &[usize], usize); 3] = [
            ("ik", &skin.ik_constraints, self.ik_constraints.len()),
            (
                "transform",
                &skin.transform_constraints,
                self.transform_constraints.len(),
            ),
            ("path", &skin.path_constraints, self.path_constraints.len()),
        ];
        for (kind, list, count) in constraint_lists {
            if let Some(&index) = list.iter().find(|&&i| i >= count) {
                return Err(Error::UnknownConstraintIndex {
                    context: context(),
                    kind,
                    index,
                });
            }
        }
        if skin.attachments.len() > self.slots.len() {
            return Err(Error::UnknownSlotIndex {
                context: context(),
                index: skin.attachments.len() - 1,
            });
        }
        for (slot_index, slot_map) in skin.attachments.iter().enumerate() {
            for (name, attachment) in slot_map {
                let attachment_context =
                    || format!("attachment '{name}' in skin '{}' slot {slot_index}", skin.name);
                if let Some(vertex) = attachment.vertex_data() {
                    if let Some(bone) = vertex.bone_indices().find(|&b| b >= bone_count) {
                        return Err(Error::UnknownBoneIndex {
                            context: attachment_context(),
                            index: bone,
                        });
                    }
                }
                if let Attachment::Clipping(clip) = attachment {
                    if let Some(end) = clip.end_slot.filter(|&s| s >= self.slots.len()) {
                        return Err(Error::UnknownSlotIndex {
                            context: attachment_context(),
                            index: end,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_bone(bone_count: usize, index: usize, context: impl FnOnce() -> String) -> Result<(), Error> {
    if index >= bone_count {
        return Err(Error::UnknownBoneIndex {
            context: context(),
            index,
        });
    }
    Ok(())
}
