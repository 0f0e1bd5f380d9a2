use crate::math::{RAD_DEG, SINGULAR_EPSILON, is_degenerate, signum, wrap_degrees};
use crate::{LocalTransform, Skeleton, TransformMode};
use std::f32::consts::PI;

impl Skeleton {
    pub(crate) fn apply_ik_constraint(&mut self, constraint_index: usize) {
        let Some(ik) = self.ik_constraints.get(constraint_index) else {
            return;
        };
        let Some(target) = self.bones.get(ik.target) else {
            return;
        };
        let (target_x, target_y) = (target.world.x, target.world.y);
        let uniform = self.data.ik_constraints[ik.data_index()].uniform;
        let (mix, softness, bend_direction) = (ik.mix, ik.softness, ik.bend_direction);
        let (compress, stretch) = (ik.compress, ik.stretch);
        let bones = (ik.bones.len(), ik.bones.first().copied(), ik.bones.get(1).copied());

        match bones {
            (1, Some(bone), _) => {
                self.apply_ik_one(bone, target_x, target_y, compress, stretch, uniform, mix)
            }
            (2, Some(parent), Some(child)) => self.apply_ik_two(
                parent,
                child,
                target_x,
                target_y,
                bend_direction,
                stretch,
                softness,
                mix,
            ),
            _ => {}
        }
    }

    /// Rotates one bone to point at the target, optionally scaling it to reach.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_ik_one(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        if bone_index >= self.bones.len() {
            return;
        }
        self.ensure_applied(bone_index);
        let parent = self.parent_world(bone_index);
        let frame = self.frame();
        let bone = &self.bones[bone_index];
        let applied = bone.applied;
        let mode = bone.transform_mode;
        let length = self.data.bones[bone.data_index()].length;

        let (pa, mut pb, pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);
        let mut rotation_ik = -applied.shear_x - applied.rotation;
        let (mut tx, mut ty) = match mode {
            TransformMode::OnlyTranslation => (
                (target_x - bone.world.x) * signum(frame.scale_x),
                (target_y - bone.world.y) * signum(frame.scale_y),
            ),
            _ => {
                if mode == TransformMode::NoRotationOrReflection {
                    let len2 = pa * pa + pc * pc;
                    let s = if len2 > 0.0 {
                        (pa * pd - pb * pc).abs() / len2
                    } else {
                        0.0
                    };
                    let sa = pa / frame.scale_x;
                    let sc = pc / frame.scale_y;
                    pb = -sc * s * frame.scale_x;
                    pd = sa * s * frame.scale_y;
                    rotation_ik += sc.atan2(sa) * RAD_DEG;
                }
                let det = pa * pd - pb * pc;
                if is_degenerate(det) {
                    return;
                }
                let x = target_x - parent.x;
                let y = target_y - parent.y;
                (
                    (x * pd - y * pb) / det - applied.x,
                    (y * pa - x * pc) / det - applied.y,
                )
            }
        };

        rotation_ik += ty.atan2(tx) * RAD_DEG;
        if applied.scale_x < 0.0 {
            rotation_ik += 180.0;
        }
        let rotation_ik = wrap_degrees(rotation_ik);

        let mut scale_x = applied.scale_x;
        let mut scale_y = applied.scale_y;
        if compress || stretch {
            if matches!(
                mode,
                TransformMode::NoScale | TransformMode::NoScaleOrReflection
            ) {
                tx = target_x - bone.world.x;
                ty = target_y - bone.world.y;
            }
            let b = length * scale_x;
            let dd = (tx * tx + ty * ty).sqrt();
            if b > SINGULAR_EPSILON && ((compress && dd < b) || (stretch && dd > b)) {
                let s = (dd / b - 1.0) * alpha + 1.0;
                scale_x *= s;
                if uniform {
                    scale_y *= s;
                }
            }
        }

        self.update_bone_world_transform_with(
            bone_index,
            &LocalTransform {
                rotation: applied.rotation + rotation_ik * alpha,
                scale_x,
                scale_y,
                ..applied
            },
        );
    }

    /// Solves a parent/child chain so the child's tip reaches the target.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_ik_two(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        bend_direction: i32,
        stretch: bool,
        softness: f32,
        alpha: f32,
    ) {
        if parent_index >= self.bones.len() || child_index >= self.bones.len() {
            return;
        }
        if alpha == 0.0 {
            self.update_bone_world_transform(child_index);
            return;
        }
        self.ensure_applied(parent_index);
        self.ensure_applied(child_index);

        let parent = self.bones[parent_index].applied;
        let child = self.bones[child_index].applied;
        let parent_world = self.bones[parent_index].world;
        let pp = self.parent_world(parent_index);
        let child_length = self.data.bones[self.bones[child_index].data_index()].length;
        let bend = if bend_direction < 0 { -1.0 } else { 1.0 };

        let (px, py) = (parent.x, parent.y);
        let mut psx = parent.scale_x;
        let mut psy = parent.scale_y;
        let mut csx = child.scale_x;
        let mut sx = psx;
        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = child.x;
        let uniform_scale = (psx - psy).abs() <= SINGULAR_EPSILON;
        let (cy, cwx, cwy) = if uniform_scale {
            let cy = child.y;
            let [wx, wy] = parent_world.transform_point(cx, cy);
            (cy, wx, wy)
        } else {
            (
                0.0,
                parent_world.a * cx + parent_world.x,
                parent_world.c * cx + parent_world.y,
            )
        };

        let det = pp.determinant();
        if is_degenerate(det) {
            self.update_bone_applied(child_index);
            return;
        }
        let id = 1.0 / det;
        let to_parent_space = |wx: f32, wy: f32| {
            let x = wx - pp.x;
            let y = wy - pp.y;
            (
                (x * pp.d - y * pp.b) * id - px,
                (y * pp.a - x * pp.c) * id - py,
            )
        };

        let (dx, dy) = to_parent_space(cwx, cwy);
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = child_length * csx;
        if l1 < SINGULAR_EPSILON {
            self.apply_ik_one(parent_index, target_x, target_y, false, stretch, false, alpha);
            self.update_bone_world_transform_with(
                child_index,
                &LocalTransform {
                    x: cx,
                    y: cy,
                    rotation: 0.0,
                    ..child
                },
            );
            return;
        }

        let (mut tx, mut ty) = to_parent_space(target_x, target_y);
        let mut dd = tx * tx + ty * ty;
        if softness != 0.0 {
            let softness = softness * psx * (csx + 1.0) / 2.0;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 && td > SINGULAR_EPSILON {
                let p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                let p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let (a1, a2) = if uniform_scale {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            if cos < -1.0 || !cos.is_finite() {
                cos = -1.0;
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    sx *= (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                }
            }
            let a2 = cos.acos() * bend;
            let a = l1 + l2 * cos;
            let b = l2 * a2.sin();
            ((ty * a - tx * b).atan2(tx * a + ty * b), a2)
        } else {
            solve_ellipse(l1, l2, psx, psy, tx, ty, dd, bend)
        };

        let os = cy.atan2(cx) * s2;
        let a1 = wrap_degrees((a1 - os) * RAD_DEG + os1 - parent.rotation);
        self.update_bone_world_transform_with(
            parent_index,
            &LocalTransform {
                x: px,
                y: py,
                rotation: parent.rotation + a1 * alpha,
                scale_x: sx,
                scale_y: parent.scale_y,
                shear_x: 0.0,
                shear_y: 0.0,
            },
        );

        let a2 = wrap_degrees(((a2 + os) * RAD_DEG - child.shear_x) * s2 + os2 - child.rotation);
        self.update_bone_world_transform_with(
            child_index,
            &LocalTransform {
                x: cx,
                y: cy,
                rotation: child.rotation + a2 * alpha,
                ..child
            },
        );
    }
}

/// Two-bone solve when the parent is non-uniformly scaled: the child sweeps an ellipse. Returns
/// the parent and child angles in radians. Unreachable targets pick the nearest or farthest
/// point of the ellipse.
#[allow(clippy::too_many_arguments)]
fn solve_ellipse(
    l1: f32,
    l2: f32,
    psx: f32,
    psy: f32,
    tx: f32,
    ty: f32,
    dd: f32,
    bend: f32,
) -> (f32, f32) {
    let a = psx * l2;
    let b = psy * l2;
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let disc = c1 * c1 - 4.0 * c2 * c;
    if disc >= 0.0 {
        let mut q = disc.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) / 2.0;
        let r0 = q / c2;
        let r1 = c / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        if r * r <= dd {
            let y = (dd - r * r).sqrt() * bend;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let mut min_angle = PI;
    let mut min_x = l1 - a;
    let mut min_dist = min_x * min_x;
    let mut min_y = 0.0f32;
    let mut max_angle = 0.0f32;
    let mut max_x = l1 + a;
    let mut max_dist = max_x * max_x;
    let mut max_y = 0.0f32;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let c = c.acos();
        let x = a * c.cos() + l1;
        let y = b * c.sin();
        let d = x * x + y * y;
        if d < min_dist {
            min_angle = c;
            min_dist = d;
            min_x = x;
            min_y = y;
        }
        if d > max_dist {
            max_angle = c;
            max_dist = d;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) / 2.0 {
        (ta - (min_y * bend).atan2(min_x), min_angle * bend)
    } else {
        (ta - (max_y * bend).atan2(max_x), max_angle * bend)
    }
}
