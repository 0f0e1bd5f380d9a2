use crate::{
    Affine, Attachment, Bone, Error, LocalTransform, SkeletonData, SkeletonFrame, SkinData,
    compose_world_transform, decompose_world_transform,
};
use std::sync::Arc;

/// Identifies an attachment by the skin that supplied it and its name within that skin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachmentKey {
    pub skin: usize,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub color: [f32; 4],
    pub has_dark: bool,
    pub dark_color: [f32; 3],
    pub blend: crate::BlendMode,
    /// Vertex offsets (weighted) or positions (unweighted) written by deform timelines.
    pub deform: Vec<f32>,
    pub(crate) attachment: Option<AttachmentKey>,
    pub(crate) attachment_time: f32,
}

impl Slot {
    fn new(data_index: usize, data: &crate::SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            color: data.color,
            has_dark: data.has_dark,
            dark_color: data.dark_color,
            blend: data.blend,
            deform: Vec::new(),
            attachment: None,
            attachment_time: 0.0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn attachment_key(&self) -> Option<&AttachmentKey> {
        self.attachment.as_ref()
    }

    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_ref().map(|key| key.name.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub active: bool,
}

impl IkConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot index.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub active: bool,
}

impl PathConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

/// One step of the per-frame evaluation order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateItem {
    Bone(usize),
    IkConstraint(usize),
    TransformConstraint(usize),
    PathConstraint(usize),
}

/// Axis-aligned bounds of the skeleton's visible geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub(crate) bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    /// Slot indices in draw order.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    pub(crate) skin: Option<usize>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Inverts the Y axis, for hosts whose Y grows downward.
    pub y_down: bool,
    time: f32,
    pub(crate) root_parent: Affine,
    pub(crate) update_cache: Vec<UpdateItem>,
    pub(crate) update_cache_reset: Vec<usize>,
    pub(crate) path_scratch: crate::runtime::path_constraint::PathScratch,
}

impl Skeleton {
    /// Creates a pose instance in the setup pose. Fails if `data` is malformed.
    pub fn new(data: Arc<SkeletonData>) -> Result<Self, Error> {
        data.validate()?;

        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(index, bone)| Bone::new(index, bone))
            .collect();
        let bone_children = build_bone_children_indices(&bones);
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| Slot::new(index, slot))
            .collect();

        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| IkConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                mix: c.mix,
                softness: c.softness,
                bend_direction: c.bend_direction,
                compress: c.compress,
                stretch: c.stretch,
                active: false,
            })
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| TransformConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                rotate_mix: c.rotate_mix,
                translate_mix: c.translate_mix,
                scale_mix: c.scale_mix,
                shear_mix: c.shear_mix,
                active: false,
            })
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| PathConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                position: c.position,
                spacing: c.spacing,
                rotate_mix: c.rotate_mix,
                translate_mix: c.translate_mix,
                active: false,
            })
            .collect();

        let draw_order = (0..data.slots.len()).collect();
        let mut skeleton = Self {
            data,
            bones,
            bone_children,
            slots,
            draw_order,
            ik_constraints,
            transform_constraints,
            path_constraints,
            skin: None,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            y_down: false,
            time: 0.0,
            root_parent: Affine::IDENTITY,
            update_cache: Vec::new(),
            update_cache_reset: Vec::new(),
            path_scratch: Default::default(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        Ok(skeleton)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Advances the skeleton clock used for attachment timing.
    pub fn update(&mut self, delta: f32) {
        self.time += delta;
    }

    /// Origin and global scale, with the Y axis flipped in y-down mode.
    pub fn frame(&self) -> SkeletonFrame {
        SkeletonFrame {
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: if self.y_down {
                -self.scale_y
            } else {
                self.scale_y
            },
        }
    }

    /// The bone and constraint evaluation order computed by [`Skeleton::update_cache`].
    pub fn update_order(&self) -> &[UpdateItem] {
        &self.update_cache
    }

    /// Bones whose applied transform is reset from the local transform before each frame.
    pub fn update_reset_bones(&self) -> &[usize] {
        &self.update_cache_reset
    }

    pub fn skin_index(&self) -> Option<usize> {
        self.skin
    }

    pub fn skin(&self) -> Option<&SkinData> {
        self.skin.and_then(|index| self.data.skins.get(index))
    }

    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.data.find_bone(name).and_then(|i| self.bones.get(i))
    }

    pub fn find_bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        let index = self.data.find_bone(name)?;
        self.bones.get_mut(index)
    }

    pub fn find_slot(&self, name: &str) -> Option<&Slot> {
        self.data.find_slot(name).and_then(|i| self.slots.get(i))
    }

    pub fn find_slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        let index = self.data.find_slot(name)?;
        self.slots.get_mut(index)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<&IkConstraint> {
        self.data
            .find_ik_constraint(name)
            .and_then(|i| self.ik_constraints.get(i))
    }

    pub fn find_ik_constraint_mut(&mut self, name: &str) -> Option<&mut IkConstraint> {
        let index = self.data.find_ik_constraint(name)?;
        self.ik_constraints.get_mut(index)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<&TransformConstraint> {
        self.data
            .find_transform_constraint(name)
            .and_then(|i| self.transform_constraints.get(i))
    }

    pub fn find_transform_constraint_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut TransformConstraint> {
        let index = self.data.find_transform_constraint(name)?;
        self.transform_constraints.get_mut(index)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<&PathConstraint> {
        self.data
            .find_path_constraint(name)
            .and_then(|i| self.path_constraints.get(i))
    }

    pub fn find_path_constraint_mut(&mut self, name: &str) -> Option<&mut PathConstraint> {
        let index = self.data.find_path_constraint(name)?;
        self.path_constraints.get_mut(index)
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Resets bone local transforms and constraint mixes to the setup pose.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.local = bone_data.setup_transform();
            bone.transform_mode = bone_data.transform_mode;
        }
        for c in &mut self.ik_constraints {
            let d = &data.ik_constraints[c.data_index];
            c.mix = d.mix;
            c.softness = d.softness;
            c.bend_direction = d.bend_direction;
            c.compress = d.compress;
            c.stretch = d.stretch;
        }
        for c in &mut self.transform_constraints {
            let d = &data.transform_constraints[c.data_index];
            c.rotate_mix = d.rotate_mix;
            c.translate_mix = d.translate_mix;
            c.scale_mix = d.scale_mix;
            c.shear_mix = d.shear_mix;
        }
        for c in &mut self.path_constraints {
            let d = &data.path_constraints[c.data_index];
            c.position = d.position;
            c.spacing = d.spacing;
            c.rotate_mix = d.rotate_mix;
            c.translate_mix = d.translate_mix;
        }
    }

    /// Resets slot colors, attachments and the draw order to the setup pose.
    pub fn set_slots_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for (index, slot_data) in data.slots.iter().enumerate() {
            let slot = &mut self.slots[index];
            slot.color = slot_data.color;
            slot.has_dark = slot_data.has_dark;
            slot.dark_color = slot_data.dark_color;
            slot.blend = slot_data.blend;
            slot.attachment = None;
            slot.deform.clear();
            let key = slot_data
                .attachment
                .as_deref()
                .and_then(|name| self.resolve_attachment(index, name));
            self.set_slot_attachment(index, key);
        }
    }

    /// Selects a skin by name, or clears it with `None`. Rebuilds the update order.
    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        let index = match skin_name {
            Some(name) => Some(
                self.data
                    .find_skin(name)
                    .ok_or_else(|| Error::UnknownSkin {
                        name: name.to_string(),
                    })?,
            ),
            None => None,
        };
        self.set_skin_index(index);
        Ok(())
    }

    /// Selects a skin by index.
    ///
    /// From no skin, each slot's setup attachment is taken from the new skin when it has one.
    /// Otherwise slots showing an attachment from the previous skin look the same name up in
    /// the new skin, then the default skin, and are emptied when neither has it.
    pub fn set_skin_index(&mut self, skin: Option<usize>) {
        if skin == self.skin {
            return;
        }
        let data = Arc::clone(&self.data);
        let old_skin = self.skin;
        self.skin = skin;

        match (old_skin, skin) {
            (None, Some(new_skin)) => {
                let Some(skin_data) = data.skins.get(new_skin) else {
                    return;
                };
                for (index, slot_data) in data.slots.iter().enumerate() {
                    let Some(name) = slot_data.attachment.as_deref() else {
                        continue;
                    };
                    if skin_data.attachment(index, name).is_some() {
                        self.set_slot_attachment(
                            index,
                            Some(AttachmentKey {
                                skin: new_skin,
                                name: name.to_string(),
                            }),
                        );
                    }
                }
            }
            (Some(old_skin), _) => {
                for index in 0..self.slots.len() {
                    let Some(key) = self.slots[index].attachment.as_ref() else {
                        continue;
                    };
                    if key.skin != old_skin {
                        continue;
                    }
                    let name = key.name.clone();
                    let key = self.resolve_attachment(index, &name);
                    self.set_slot_attachment(index, key);
                }
            }
            (None, None) => {}
        }

        self.update_cache();
    }

    /// Finds an attachment by slot and name in the active skin, then the default skin.
    pub fn attachment(&self, slot_index: usize, attachment_name: &str) -> Option<&Attachment> {
        let key = self.resolve_attachment(slot_index, attachment_name)?;
        self.data.skins[key.skin].attachment(slot_index, &key.name)
    }

    pub fn resolve_attachment(
        &self,
        slot_index: usize,
        attachment_name: &str,
    ) -> Option<AttachmentKey> {
        let default_skin = self.data.default_skin();
        [self.skin, default_skin]
            .into_iter()
            .flatten()
            .find(|&skin| {
                self.data
                    .skins
                    .get(skin)
                    .is_some_and(|s| s.attachment(slot_index, attachment_name).is_some())
            })
            .map(|skin| AttachmentKey {
                skin,
                name: attachment_name.to_string(),
            })
    }

    /// The attachment currently shown by a slot.
    pub fn slot_attachment(&self, slot_index: usize) -> Option<&Attachment> {
        let key = self.slots.get(slot_index)?.attachment.as_ref()?;
        self.data.skins.get(key.skin)?.attachment(slot_index, &key.name)
    }

    /// Seconds since the slot's attachment last changed.
    pub fn slot_attachment_time(&self, slot_index: usize) -> f32 {
        self.slots
            .get(slot_index)
            .map_or(0.0, |slot| self.time - slot.attachment_time)
    }

    /// Shows the named attachment (or nothing) in the named slot.
    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot_index = self
            .data
            .find_slot(slot_name)
            .ok_or_else(|| Error::UnknownSlot {
                name: slot_name.to_string(),
            })?;
        let key = match attachment_name {
            Some(name) => Some(self.resolve_attachment(slot_index, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    attachment: name.to_string(),
                }
            })?),
            None => None,
        };
        self.set_slot_attachment(slot_index, key);
        Ok(())
    }

    /// Deform offsets survive only when the new attachment shares the old one's deform target.
    pub(crate) fn set_slot_attachment(&mut self, slot_index: usize, key: Option<AttachmentKey>) {
        let Some(slot) = self.slots.get(slot_index) else {
            return;
        };
        if slot.attachment == key {
            return;
        }
        let keeps_deform = {
            let old = self.slot_attachment(slot_index);
            let new = key
                .as_ref()
                .and_then(|k| self.data.skins.get(k.skin)?.attachment(slot_index, &k.name));
            match (old, new) {
                (Some(old), Some(new)) => {
                    new.deform_attachment().is_some()
                        && new.deform_attachment() == old.deform_attachment()
                }
                _ => false,
            }
        };
        let time = self.time;
        let slot = &mut self.slots[slot_index];
        if !keeps_deform {
            slot.deform.clear();
        }
        slot.attachment = key;
        slot.attachment_time = time;
    }

    /// Evaluates the update order: bone world transforms and constraints.
    pub fn update_world_transform(&mut self) {
        let root_parent = self.frame().root_parent();
        self.run_update_cache(root_parent);
    }

    /// Like [`Skeleton::update_world_transform`], with the whole skeleton placed under `parent`.
    pub fn update_world_transform_with(&mut self, parent: &Affine) {
        let root_parent = parent.mul(&self.frame().root_parent());
        self.run_update_cache(root_parent);
    }

    fn run_update_cache(&mut self, root_parent: Affine) {
        self.root_parent = root_parent;
        for &index in &self.update_cache_reset {
            let Some(bone) = self.bones.get_mut(index) else {
                continue;
            };
            bone.applied = bone.local;
            bone.applied_valid = true;
        }

        let cache = std::mem::take(&mut self.update_cache);
        for item in &cache {
            match *item {
                UpdateItem::Bone(index) => self.update_bone_world_transform(index),
                UpdateItem::IkConstraint(index) => self.apply_ik_constraint(index),
                UpdateItem::TransformConstraint(index) => self.apply_transform_constraint(index),
                UpdateItem::PathConstraint(index) => self.apply_path_constraint(index),
            }
        }
        self.update_cache = cache;
    }

    /// Computes a bone's world transform from its local transform.
    pub fn update_bone_world_transform(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let local = bone.local;
        self.update_bone_world_transform_with(bone_index, &local);
    }

    /// Recomputes a bone's world transform from its applied transform.
    pub fn update_bone_applied(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let applied = bone.applied;
        self.update_bone_world_transform_with(bone_index, &applied);
    }

    /// Computes a bone's world transform from the given local parameters, which become its
    /// applied transform. The parent's world transform must already be current.
    pub fn update_bone_world_transform_with(&mut self, bone_index: usize, local: &LocalTransform) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let parent = bone
            .parent_index()
            .and_then(|p| self.bones.get(p))
            .map(|p| p.world);
        let world = compose_world_transform(
            local,
            bone.transform_mode,
            parent.as_ref(),
            &self.root_parent,
            &self.frame(),
        );
        let bone = &mut self.bones[bone_index];
        bone.applied = *local;
        bone.applied_valid = true;
        bone.world = world;
    }

    /// Recomputes a bone's applied transform from its world transform and its parent's.
    pub fn update_applied_transform(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let parent = bone
            .parent_index()
            .and_then(|p| self.bones.get(p))
            .map(|p| p.world);
        let applied = decompose_world_transform(
            &bone.world,
            bone.transform_mode,
            parent.as_ref(),
            &self.root_parent,
            &self.frame(),
            &bone.applied,
        );
        let bone = &mut self.bones[bone_index];
        bone.applied = applied;
        bone.applied_valid = true;
    }

    pub(crate) fn ensure_applied(&mut self, bone_index: usize) {
        if self
            .bones
            .get(bone_index)
            .is_some_and(|bone| !bone.applied_valid)
        {
            self.update_applied_transform(bone_index);
        }
    }

    /// World transform of a bone's parent, or the root placement for a root bone.
    pub(crate) fn parent_world(&self, bone_index: usize) -> Affine {
        self.bones
            .get(bone_index)
            .and_then(|bone| bone.parent_index())
            .and_then(|parent| self.bones.get(parent))
            .map_or(self.root_parent, |parent| parent.world)
    }

    /// World-space vertices of the slot's current region or vertex attachment.
    pub fn slot_world_vertices(&self, slot_index: usize) -> Option<Vec<f32>> {
        let slot = self.slots.get(slot_index)?;
        let bone = self.bones.get(slot.bone)?;
        match self.slot_attachment(slot_index)? {
            Attachment::Region(region) => {
                let mut out = vec![0.0; 8];
                region.compute_world_vertices(bone, &mut out, 0, 2);
                Some(out)
            }
            attachment => {
                let vertex = attachment.vertex_data()?;
                let len = vertex.world_vertices_length;
                let mut out = vec![0.0; len];
                vertex.compute_world_vertices(
                    &self.bones,
                    bone,
                    &slot.deform,
                    0,
                    len,
                    &mut out,
                    0,
                    2,
                );
                Some(out)
            }
        }
    }

    /// Bounds of all region and mesh attachments on active bones, or `None` when nothing is
    /// visible.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut min = [f32::MAX, f32::MAX];
        let mut max = [f32::MIN, f32::MIN];
        let mut any = false;
        for &slot_index in &self.draw_order {
            let Some(slot) = self.slots.get(slot_index) else {
                continue;
            };
            if !self.bones.get(slot.bone).is_some_and(|b| b.active) {
                continue;
            }
            if !matches!(
                self.slot_attachment(slot_index),
                Some(Attachment::Region(_) | Attachment::Mesh(_))
            ) {
                continue;
            }
            let Some(vertices) = self.slot_world_vertices(slot_index) else {
                continue;
            };
            for point in vertices.chunks_exact(2) {
                min[0] = min[0].min(point[0]);
                min[1] = min[1].min(point[1]);
                max[0] = max[0].max(point[0]);
                max[1] = max[1].max(point[1]);
                any = true;
            }
        }
        any.then(|| Bounds {
            x: min[0],
            y: min[1],
            width: max[0] - min[0],
            height: max[1] - min[1],
        })
    }
}

fn build_bone_children_indices(bones: &[Bone]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::<usize>::new(); bones.len()];
    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent_index() {
            if parent < children.len() {
                children[parent].push(index);
            }
        }
    }
    children
}
