use crate::math::{RAD_DEG, SINGULAR_EPSILON, cos_deg, is_degenerate, sin_deg, wrap_degrees};
use crate::{Affine, LocalTransform, TransformMode};

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub transform_mode: TransformMode,
    pub active: bool,

    /// Authored (animated) local pose.
    pub local: LocalTransform,
    /// Local pose that produced `world`; diverges from `local` after a solver writes `world`.
    pub applied: LocalTransform,
    pub world: Affine,

    pub(crate) applied_valid: bool,
}

impl Bone {
    pub(crate) fn new(data_index: usize, data: &crate::BoneData) -> Self {
        let setup = data.setup_transform();
        Self {
            data_index,
            parent: data.parent,
            transform_mode: data.transform_mode,
            active: !data.skin_required,
            local: setup,
            applied: setup,
            world: Affine::IDENTITY,
            applied_valid: true,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// False once a solver has written `world` without updating `applied`.
    pub fn applied_valid(&self) -> bool {
        self.applied_valid
    }

    pub fn world_x(&self) -> f32 {
        self.world.x
    }

    pub fn world_y(&self) -> f32 {
        self.world.y
    }

    pub fn world_rotation_x(&self) -> f32 {
        self.world.rotation_x()
    }

    pub fn world_rotation_y(&self) -> f32 {
        self.world.rotation_y()
    }

    pub fn world_scale_x(&self) -> f32 {
        self.world.scale_x()
    }

    pub fn world_scale_y(&self) -> f32 {
        self.world.scale_y()
    }

    /// Converts a world position into this bone's coordinate space.
    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        self.world.inverse_transform_point(world_x, world_y)
    }

    /// Converts a position in this bone's coordinate space into world space.
    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        self.world.transform_point(local_x, local_y)
    }

    /// Converts a world rotation into a local rotation for this bone.
    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let sin = sin_deg(world_rotation);
        let cos = cos_deg(world_rotation);
        let m = &self.world;
        (m.a * sin - m.c * cos).atan2(m.d * cos - m.b * sin) * RAD_DEG + self.local.rotation
            - self.local.shear_x
    }

    /// Converts a local rotation for this bone into a world rotation.
    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let local_rotation = local_rotation - (self.local.rotation - self.local.shear_x);
        let sin = sin_deg(local_rotation);
        let cos = cos_deg(local_rotation);
        let m = &self.world;
        (cos * m.c + sin * m.d).atan2(cos * m.a + sin * m.b) * RAD_DEG
    }

    /// Rotates the world transform in place. `applied` is stale afterwards.
    pub fn rotate_world(&mut self, degrees: f32) {
        let cos = cos_deg(degrees);
        let sin = sin_deg(degrees);
        let Affine { a, b, c, d, .. } = self.world;
        self.world.a = cos * a - sin * c;
        self.world.b = cos * b - sin * d;
        self.world.c = sin * a + cos * c;
        self.world.d = sin * b + cos * d;
        self.applied_valid = false;
    }
}

/// Skeleton-wide placement applied to every bone: origin plus global scale (with the Y axis
/// already flipped when the skeleton is in y-down mode).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SkeletonFrame {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl SkeletonFrame {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// The transform a root bone is composed under.
    pub fn root_parent(&self) -> Affine {
        Affine::from_scale_translation(self.scale_x, self.scale_y, self.x, self.y)
    }

    fn scale(&self, [a, b, c, d]: [f32; 4]) -> [f32; 4] {
        [a * self.scale_x, b * self.scale_x, c * self.scale_y, d * self.scale_y]
    }
}

/// Composes a bone's world transform from local parameters.
///
/// `parent` is the parent bone's world transform, or `None` for a root bone, which is placed
/// under `root_parent` regardless of its mode.
pub fn compose_world_transform(
    local: &LocalTransform,
    mode: TransformMode,
    parent: Option<&Affine>,
    root_parent: &Affine,
    frame: &SkeletonFrame,
) -> Affine {
    let Some(parent) = parent else {
        return root_parent.mul(&local.to_affine());
    };

    let [x, y] = parent.transform_point(local.x, local.y);
    let linear = match mode {
        TransformMode::Normal => {
            let [la, lb, lc, ld] = local.linear();
            [
                parent.a * la + parent.b * lc,
                parent.a * lb + parent.b * ld,
                parent.c * la + parent.d * lc,
                parent.c * lb + parent.d * ld,
            ]
        }
        TransformMode::OnlyTranslation => frame.scale(local.linear()),
        TransformMode::NoRotationOrReflection => {
            let (basis, parent_rotation) = no_rotation_basis(parent, frame);
            let [pa, pb, pc, pd] = basis;
            let [la, lb, lc, ld] = LocalTransform {
                rotation: local.rotation - parent_rotation,
                ..*local
            }
            .linear();
            frame.scale([
                pa * la + pb * lc,
                pa * lb + pb * ld,
                pc * la + pd * lc,
                pc * lb + pd * ld,
            ])
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
            let [za, zb, zc, zd] = no_scale_basis(parent, mode, local.rotation, frame);
            let [la, lb, lc, ld] = LocalTransform {
                rotation: 0.0,
                ..*local
            }
            .linear();
            frame.scale([
                za * la + zb * lc,
                za * lb + zb * ld,
                zc * la + zd * lc,
                zc * lb + zd * ld,
            ])
        }
    };

    let [a, b, c, d] = linear;
    Affine { a, b, c, d, x, y }
}

/// Parent basis with rotation and reflection removed, as a 2x2 `[a, b, c, d]`, plus the parent
/// rotation (degrees) that local rotation is measured against.
fn no_rotation_basis(parent: &Affine, frame: &SkeletonFrame) -> ([f32; 4], f32) {
    let inv_sx = inverse_or_zero(frame.scale_x);
    let inv_sy = inverse_or_zero(frame.scale_y);
    let pa = parent.a * inv_sx;
    let pc = parent.c * inv_sy;
    let s = pa * pa + pc * pc;
    if s > SINGULAR_EPSILON {
        let s = (pa * parent.d * inv_sy - parent.b * inv_sx * pc).abs() / s;
        let pb = pc * s;
        let pd = pa * s;
        ([pa, -pb, pc, pd], pc.atan2(pa) * RAD_DEG)
    } else {
        let prx = 90.0 - parent.d.atan2(parent.b) * RAD_DEG;
        ([0.0, -parent.b, 0.0, parent.d], prx)
    }
}

/// Unit-scale parent basis rotated by the bone's rotation, as a 2x2 `[a, b, c, d]`.
fn no_scale_basis(
    parent: &Affine,
    mode: TransformMode,
    rotation: f32,
    frame: &SkeletonFrame,
) -> [f32; 4] {
    let cos = cos_deg(rotation);
    let sin = sin_deg(rotation);
    let mut za = (parent.a * cos + parent.b * sin) * inverse_or_zero(frame.scale_x);
    let mut zc = (parent.c * cos + parent.d * sin) * inverse_or_zero(frame.scale_y);
    let mut s = (za * za + zc * zc).sqrt();
    if s > 1.0e-5 {
        s = 1.0 / s;
    }
    za *= s;
    zc *= s;
    s = (za * za + zc * zc).sqrt();
    if mode == TransformMode::NoScale {
        let parent_reflected = parent.determinant() < 0.0;
        let skeleton_reflected = (frame.scale_x < 0.0) != (frame.scale_y < 0.0);
        if parent_reflected != skeleton_reflected {
            s = -s;
        }
    }
    let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
    [za, r.cos() * s, zc, r.sin() * s]
}

fn inverse_or_zero(v: f32) -> f32 {
    if v.abs() > 1.0e-12 { 1.0 / v } else { 0.0 }
}

/// Recovers local parameters that reproduce `world` under `parent`.
///
/// Shear X is folded into rotation, except for the no-scale modes where rotation builds the
/// parent basis and is kept from `current`.
pub fn decompose_world_transform(
    world: &Affine,
    mode: TransformMode,
    parent: Option<&Affine>,
    root_parent: &Affine,
    frame: &SkeletonFrame,
    current: &LocalTransform,
) -> LocalTransform {
    let (parent, mode) = match parent {
        Some(parent) => (parent, mode),
        None => (root_parent, TransformMode::Normal),
    };

    let [x, y] = parent.inverse_transform_point(world.x, world.y);

    let (basis, rotation_offset) = match mode {
        TransformMode::Normal => ([parent.a, parent.b, parent.c, parent.d], 0.0),
        TransformMode::OnlyTranslation => ([frame.scale_x, 0.0, 0.0, frame.scale_y], 0.0),
        TransformMode::NoRotationOrReflection => {
            let (basis, parent_rotation) = no_rotation_basis(parent, frame);
            (frame.scale(basis), parent_rotation)
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => (
            frame.scale(no_scale_basis(parent, mode, current.rotation, frame)),
            0.0,
        ),
    };

    let [ia, ib, ic, id] = inverse_basis(basis);
    let ra = ia * world.a + ib * world.c;
    let rb = ia * world.b + ib * world.d;
    let rc = ic * world.a + id * world.c;
    let rd = ic * world.b + id * world.d;

    let mut scale_x = (ra * ra + rc * rc).sqrt();
    let (rotation, scale_y, shear_y) = if scale_x > SINGULAR_EPSILON {
        let det = ra * rd - rb * rc;
        let sign = if det < 0.0 { -1.0 } else { 1.0 };
        let rotation = rc.atan2(ra) * RAD_DEG;
        let scale_y = (rb * rb + rd * rd).sqrt() * sign;
        let shear_y = if scale_y.abs() > SINGULAR_EPSILON {
            wrap_degrees((rd * sign).atan2(rb * sign) * RAD_DEG - 90.0 - rotation)
        } else {
            0.0
        };
        (rotation, scale_y, shear_y)
    } else {
        scale_x = 0.0;
        let rotation = rd.atan2(rb) * RAD_DEG - 90.0;
        (rotation, (rb * rb + rd * rd).sqrt(), 0.0)
    };

    match mode {
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => LocalTransform {
            x,
            y,
            rotation: current.rotation,
            scale_x,
            scale_y,
            shear_x: rotation,
            shear_y: wrap_degrees(rotation + shear_y),
        },
        _ => LocalTransform {
            x,
            y,
            rotation: wrap_degrees(rotation + rotation_offset),
            scale_x,
            scale_y,
            shear_x: 0.0,
            shear_y,
        },
    }
}

/// Inverse of a 2x2 basis. A singular basis is replaced by the rotation of its first
/// non-degenerate column, whose inverse is its transpose.
fn inverse_basis([a, b, c, d]: [f32; 4]) -> [f32; 4] {
    let det = a * d - b * c;
    if !is_degenerate(det) {
        let inv = 1.0 / det;
        return [d * inv, -b * inv, -c * inv, a * inv];
    }
    let (cos, sin) = {
        let len = (a * a + c * c).sqrt();
        if len > SINGULAR_EPSILON {
            (a / len, c / len)
        } else {
            let len = (b * b + d * d).sqrt();
            if len > SINGULAR_EPSILON {
                (d / len, -b / len)
            } else {
                (1.0, 0.0)
            }
        }
    };
    [cos, sin, -sin, cos]
}
