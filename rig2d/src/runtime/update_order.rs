use crate::{Attachment, Bone, Skeleton, SkinData, UpdateItem};
use log::{debug, trace};
use std::sync::Arc;

/// Sort state for one rebuild of the update order. `sorted` is only meaningful during the pass.
struct UpdateOrderBuilder<'a> {
    bones: &'a [Bone],
    children: &'a [Vec<usize>],
    sorted: Vec<bool>,
    cache: Vec<UpdateItem>,
    reset: Vec<usize>,
    stack: Vec<usize>,
}

impl<'a> UpdateOrderBuilder<'a> {
    fn new(bones: &'a [Bone], children: &'a [Vec<usize>], sorted: Vec<bool>) -> Self {
        Self {
            bones,
            children,
            sorted,
            cache: Vec::with_capacity(bones.len()),
            reset: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Pushes `bone` after every unsorted ancestor.
    fn sort_bone(&mut self, bone: usize) {
        self.stack.clear();
        let mut cursor = Some(bone);
        while let Some(index) = cursor {
            if self.sorted.get(index).copied().unwrap_or(true) {
                break;
            }
            self.stack.push(index);
            cursor = self.bones[index].parent_index();
        }
        while let Some(index) = self.stack.pop() {
            self.sorted[index] = true;
            self.cache.push(UpdateItem::Bone(index));
        }
    }

    /// Clears the sort flag on the subtrees below `bone`, skipping inactive bones. Descent stops
    /// at bones that were already unsorted.
    fn sort_reset_children(&mut self, bone: usize) {
        self.stack.clear();
        self.stack
            .extend(self.children.get(bone).into_iter().flatten().rev());
        while let Some(index) = self.stack.pop() {
            if !self.bones[index].active {
                continue;
            }
            if self.sorted[index] {
                self.stack.extend(self.children[index].iter().rev());
            }
            self.sorted[index] = false;
        }
    }

    fn mark_sorted(&mut self, bone: usize) {
        if let Some(sorted) = self.sorted.get_mut(bone) {
            *sorted = true;
        }
    }

    fn in_cache(&self, bone: usize) -> bool {
        self.cache.contains(&UpdateItem::Bone(bone))
    }

    fn sort_path_attachment(&mut self, attachment: &Attachment, slot_bone: usize) {
        let Attachment::Path(path) = attachment else {
            return;
        };
        if path.vertex.is_weighted() {
            for bone in path.vertex.bone_indices() {
                self.sort_bone(bone);
            }
        } else {
            self.sort_bone(slot_bone);
        }
    }

    fn sort_path_skin(&mut self, skin: &SkinData, slot: usize, slot_bone: usize) {
        for (_, attachment) in skin.slot_attachments(slot) {
            self.sort_path_attachment(attachment, slot_bone);
        }
    }
}

impl Skeleton {
    /// Recomputes which bones and constraints are active and the order they are evaluated in.
    ///
    /// Called automatically on construction and skin changes; call it after editing constraint
    /// membership or bone activity by hand.
    pub fn update_cache(&mut self) {
        let data = Arc::clone(&self.data);
        let skin = self.skin.and_then(|index| data.skins.get(index));

        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.active = !bone_data.skin_required;
        }
        let mut sorted: Vec<bool> = data.bones.iter().map(|b| b.skin_required).collect();
        if let Some(skin) = skin {
            for &required in &skin.bones {
                let mut cursor = Some(required);
                while let Some(index) = cursor {
                    let Some(bone) = self.bones.get_mut(index) else {
                        break;
                    };
                    sorted[index] = false;
                    bone.active = true;
                    cursor = bone.parent_index();
                }
            }
        }

        for c in &mut self.ik_constraints {
            let required = data.ik_constraints[c.data_index()].skin_required;
            c.active = self.bones[c.target].active
                && skin_allows(required, skin.map(|s| s.ik_constraints.as_slice()), c.data_index());
        }
        for c in &mut self.transform_constraints {
            let required = data.transform_constraints[c.data_index()].skin_required;
            c.active = self.bones[c.target].active
                && skin_allows(
                    required,
                    skin.map(|s| s.transform_constraints.as_slice()),
                    c.data_index(),
                );
        }
        for c in &mut self.path_constraints {
            let required = data.path_constraints[c.data_index()].skin_required;
            let slot_bone = self.slots[c.target].bone;
            c.active = self.bones[slot_bone].active
                && skin_allows(
                    required,
                    skin.map(|s| s.path_constraints.as_slice()),
                    c.data_index(),
                );
        }

        let mut builder = UpdateOrderBuilder::new(&self.bones, &self.bone_children, sorted);
        for order in 0..data.constraint_count() {
            let order = order as i32;
            if let Some(index) = data.ik_constraints.iter().position(|c| c.order == order) {
                self.sort_ik_constraint(&mut builder, index);
            } else if let Some(index) = data
                .transform_constraints
                .iter()
                .position(|c| c.order == order)
            {
                self.sort_transform_constraint(&mut builder, index);
            } else if let Some(index) = data.path_constraints.iter().position(|c| c.order == order)
            {
                self.sort_path_constraint(&mut builder, index);
            }
        }
        for bone in 0..self.bones.len() {
            builder.sort_bone(bone);
        }

        let UpdateOrderBuilder { cache, reset, .. } = builder;
        debug!(
            "update order rebuilt: {} items, {} reset bones, {} of {} bones active",
            cache.len(),
            reset.len(),
            self.bones.iter().filter(|b| b.active).count(),
            self.bones.len()
        );
        self.update_cache = cache;
        self.update_cache_reset = reset;
    }

    fn sort_ik_constraint(&self, builder: &mut UpdateOrderBuilder<'_>, index: usize) {
        let constraint = &self.ik_constraints[index];
        if !constraint.active {
            return;
        }
        trace!("scheduling ik constraint {index}");

        builder.sort_bone(constraint.target);
        let Some(&parent) = constraint.bones.first() else {
            return;
        };
        builder.sort_bone(parent);

        if constraint.bones.len() > 1 {
            let child = constraint.bones[constraint.bones.len() - 1];
            if !builder.in_cache(child) {
                builder.reset.push(child);
            }
        }

        builder.cache.push(UpdateItem::IkConstraint(index));
        builder.sort_reset_children(parent);
        if let Some(&last) = constraint.bones.last() {
            builder.mark_sorted(last);
        }
    }

    fn sort_transform_constraint(&self, builder: &mut UpdateOrderBuilder<'_>, index: usize) {
        let constraint = &self.transform_constraints[index];
        if !constraint.active {
            return;
        }
        trace!("scheduling transform constraint {index}");

        builder.sort_bone(constraint.target);
        let local = self.data.transform_constraints[constraint.data_index()].local;
        if local {
            for &bone in &constraint.bones {
                if let Some(parent) = self.bones[bone].parent_index() {
                    builder.sort_bone(parent);
                }
                if !builder.in_cache(bone) {
                    builder.reset.push(bone);
                }
            }
        } else {
            for &bone in &constraint.bones {
                builder.sort_bone(bone);
            }
        }

        builder.cache.push(UpdateItem::TransformConstraint(index));
        for &bone in &constraint.bones {
            builder.sort_reset_children(bone);
        }
        for &bone in &constraint.bones {
            builder.mark_sorted(bone);
        }
    }

    fn sort_path_constraint(&self, builder: &mut UpdateOrderBuilder<'_>, index: usize) {
        let constraint = &self.path_constraints[index];
        if !constraint.active {
            return;
        }
        trace!("scheduling path constraint {index}");

        let slot = constraint.target;
        let slot_bone = self.slots[slot].bone;
        if let Some(skin) = self.skin() {
            builder.sort_path_skin(skin, slot, slot_bone);
        }
        if let Some(default_skin) = self.data.default_skin() {
            if Some(default_skin) != self.skin {
                builder.sort_path_skin(&self.data.skins[default_skin], slot, slot_bone);
            }
        }
        for skin in &self.data.skins {
            builder.sort_path_skin(skin, slot, slot_bone);
        }
        if let Some(attachment) = self.slot_attachment(slot) {
            builder.sort_path_attachment(attachment, slot_bone);
        }

        for &bone in &constraint.bones {
            builder.sort_bone(bone);
        }
        builder.cache.push(UpdateItem::PathConstraint(index));
        for &bone in &constraint.bones {
            builder.sort_reset_children(bone);
        }
        for &bone in &constraint.bones {
            builder.mark_sorted(bone);
        }
    }
}

/// Skin-required constraints are only active when the current skin lists them.
fn skin_allows(skin_required: bool, skin_list: Option<&[usize]>, index: usize) -> bool {
    !skin_required || skin_list.is_some_and(|list| list.contains(&index))
}
