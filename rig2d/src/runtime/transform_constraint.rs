use crate::math::{DEG_RAD, wrap_degrees, wrap_radians};
use crate::{Affine, LocalTransform, Skeleton, TransformConstraintData};
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

#[derive(Copy, Clone, Debug)]
struct Mixes {
    rotate: f32,
    translate: f32,
    scale: f32,
    shear: f32,
}

impl Skeleton {
    pub(crate) fn apply_transform_constraint(&mut self, constraint_index: usize) {
        let Some(constraint) = self.transform_constraints.get(constraint_index) else {
            return;
        };
        let mixes = Mixes {
            rotate: constraint.rotate_mix,
            translate: constraint.translate_mix,
            scale: constraint.scale_mix,
            shear: constraint.shear_mix,
        };
        let target = constraint.target;
        let bones = constraint.bones.clone();
        let data = Arc::clone(&self.data);
        let Some(tc) = data.transform_constraints.get(constraint.data_index()) else {
            return;
        };
        if target >= self.bones.len() {
            return;
        }

        match (tc.local, tc.relative) {
            (false, false) => self.transform_absolute_world(tc, target, &bones, mixes),
            (false, true) => self.transform_relative_world(tc, target, &bones, mixes),
            (true, false) => self.transform_absolute_local(tc, target, &bones, mixes),
            (true, true) => self.transform_relative_local(tc, target, &bones, mixes),
        }
    }

    fn transform_absolute_world(
        &mut self,
        tc: &TransformConstraintData,
        target_index: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let target = self.bones[target_index].world;
        let deg_rad_reflect = reflect_factor(&target);
        let offset_rotation = tc.offset_rotation * deg_rad_reflect;
        let offset_shear_y = tc.offset_shear_y * deg_rad_reflect;
        let [offset_x, offset_y] = target.transform_point(tc.offset_x, tc.offset_y);

        for &bone_index in bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            let m = &mut bone.world;
            let mut modified = false;

            if mix.rotate != 0.0 {
                let r = target.c.atan2(target.a) - m.c.atan2(m.a) + offset_rotation;
                rotate_basis(m, wrap_radians(r) * mix.rotate);
                modified = true;
            }
            if mix.translate != 0.0 {
                m.x += (offset_x - m.x) * mix.translate;
                m.y += (offset_y - m.y) * mix.translate;
                modified = true;
            }
            if mix.scale > 0.0 {
                let s = (m.a * m.a + m.c * m.c).sqrt();
                if s > 1.0e-5 {
                    let ts = (target.a * target.a + target.c * target.c).sqrt();
                    let s = (s + (ts - s + tc.offset_scale_x) * mix.scale) / s;
                    m.a *= s;
                    m.c *= s;
                }
                let s = (m.b * m.b + m.d * m.d).sqrt();
                if s > 1.0e-5 {
                    let ts = (target.b * target.b + target.d * target.d).sqrt();
                    let s = (s + (ts - s + tc.offset_scale_y) * mix.scale) / s;
                    m.b *= s;
                    m.d *= s;
                }
                modified = true;
            }
            if mix.shear > 0.0 {
                let by = m.d.atan2(m.b);
                let r = target.d.atan2(target.b)
                    - target.c.atan2(target.a)
                    - (by - m.c.atan2(m.a));
                let r = by + (wrap_radians(r) + offset_shear_y) * mix.shear;
                let s = (m.b * m.b + m.d * m.d).sqrt();
                m.b = r.cos() * s;
                m.d = r.sin() * s;
                modified = true;
            }

            if modified {
                bone.applied_valid = false;
            }
        }
    }

    fn transform_relative_world(
        &mut self,
        tc: &TransformConstraintData,
        target_index: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let target = self.bones[target_index].world;
        let deg_rad_reflect = reflect_factor(&target);
        let offset_rotation = tc.offset_rotation * deg_rad_reflect;
        let offset_shear_y = tc.offset_shear_y * deg_rad_reflect;
        let [offset_x, offset_y] = target.transform_point(tc.offset_x, tc.offset_y);

        for &bone_index in bones {
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            let m = &mut bone.world;

            if mix.rotate != 0.0 {
                let r = target.c.atan2(target.a) + offset_rotation;
                rotate_basis(m, wrap_radians(r) * mix.rotate);
            }
            if mix.translate != 0.0 {
                m.x += offset_x * mix.translate;
                m.y += offset_y * mix.translate;
            }
            if mix.scale > 0.0 {
                let s = ((target.a * target.a + target.c * target.c).sqrt() - 1.0
                    + tc.offset_scale_x)
                    * mix.scale
                    + 1.0;
                m.a *= s;
                m.c *= s;
                let s = ((target.b * target.b + target.d * target.d).sqrt() - 1.0
                    + tc.offset_scale_y)
                    * mix.scale
                    + 1.0;
                m.b *= s;
                m.d *= s;
            }
            if mix.shear > 0.0 {
                let r = wrap_radians(target.d.atan2(target.b) - target.c.atan2(target.a));
                let r = m.d.atan2(m.b) + (r - FRAC_PI_2 + offset_shear_y) * mix.shear;
                let s = (m.b * m.b + m.d * m.d).sqrt();
                m.b = r.cos() * s;
                m.d = r.sin() * s;
            }

            bone.applied_valid = false;
        }
    }

    fn transform_absolute_local(
        &mut self,
        tc: &TransformConstraintData,
        target_index: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        self.ensure_applied(target_index);
        let target = self.bones[target_index].applied;

        for &bone_index in bones {
            if bone_index >= self.bones.len() {
                continue;
            }
            self.ensure_applied(bone_index);
            let applied = self.bones[bone_index].applied;
            let mut local = applied;

            if mix.rotate != 0.0 {
                let r = wrap_degrees(target.rotation - local.rotation + tc.offset_rotation);
                local.rotation += r * mix.rotate;
            }
            if mix.translate != 0.0 {
                local.x += (target.x - local.x + tc.offset_x) * mix.translate;
                local.y += (target.y - local.y + tc.offset_y) * mix.translate;
            }
            if mix.scale != 0.0 {
                local.scale_x +=
                    (target.scale_x - local.scale_x + tc.offset_scale_x) * mix.scale;
                local.scale_y +=
                    (target.scale_y - local.scale_y + tc.offset_scale_y) * mix.scale;
            }
            if mix.shear != 0.0 {
                let r = wrap_degrees(target.shear_y - local.shear_y + tc.offset_shear_y);
                local.shear_y += r * mix.shear;
            }

            self.update_bone_world_transform_with(bone_index, &local);
        }
    }

    fn transform_relative_local(
        &mut self,
        tc: &TransformConstraintData,
        target_index: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        self.ensure_applied(target_index);
        let target = self.bones[target_index].applied;

        for &bone_index in bones {
            if bone_index >= self.bones.len() {
                continue;
            }
            self.ensure_applied(bone_index);
            let applied = self.bones[bone_index].applied;
            let local = LocalTransform {
                x: applied.x + (target.x + tc.offset_x) * mix.translate,
                y: applied.y + (target.y + tc.offset_y) * mix.translate,
                rotation: applied.rotation
                    + (target.rotation + tc.offset_rotation) * mix.rotate,
                scale_x: applied.scale_x
                    * ((target.scale_x - 1.0 + tc.offset_scale_x) * mix.scale + 1.0),
                scale_y: applied.scale_y
                    * ((target.scale_y - 1.0 + tc.offset_scale_y) * mix.scale + 1.0),
                shear_x: applied.shear_x,
                shear_y: applied.shear_y + (target.shear_y + tc.offset_shear_y) * mix.shear,
            };
            self.update_bone_world_transform_with(bone_index, &local);
        }
    }
}

/// Offsets are mirrored when the target's basis is reflected.
fn reflect_factor(target: &Affine) -> f32 {
    if target.determinant() > 0.0 {
        DEG_RAD
    } else {
        -DEG_RAD
    }
}

fn rotate_basis(m: &mut Affine, radians: f32) {
    let (sin, cos) = radians.sin_cos();
    let Affine { a, b, c, d, .. } = *m;
    m.a = cos * a - sin * c;
    m.b = cos * b - sin * d;
    m.c = sin * a + cos * c;
    m.d = sin * b + cos * d;
}
