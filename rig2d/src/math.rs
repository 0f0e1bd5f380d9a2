//! Small 2D math primitives shared by the pose engine and the attachment geometry.

pub const DEG_RAD: f32 = std::f32::consts::PI / 180.0;
pub const RAD_DEG: f32 = 180.0 / std::f32::consts::PI;

/// Threshold for near-degenerate scale-free quantities: normalized parent bases, local scales
/// and bone lengths.
pub const SINGULAR_EPSILON: f32 = 1.0e-4;

/// A determinant that cannot be inverted. Tiny but finite values are still invertible, so rigs
/// scaled far down keep solving.
pub fn is_degenerate(det: f32) -> bool {
    det == 0.0 || !det.is_finite()
}

pub fn cos_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).cos()
}

pub fn sin_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).sin()
}

/// Wraps an angle in degrees into `[-180, 180]`.
pub fn wrap_degrees(mut degrees: f32) -> f32 {
    degrees = degrees.rem_euclid(360.0);
    if degrees > 180.0 {
        degrees -= 360.0;
    }
    degrees
}

/// Wraps an angle in radians that is at most one turn away from `[-PI, PI]`.
pub fn wrap_radians(mut radians: f32) -> f32 {
    const PI: f32 = std::f32::consts::PI;
    const PI2: f32 = 2.0 * std::f32::consts::PI;
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}

pub(crate) fn signum(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// A 2x3 affine transform.
///
/// The linear part is `[a b; c d]` (columns are the transformed X and Y axes) and `(x, y)` is
/// the translation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub x: f32,
    pub y: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        x: 0.0,
        y: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, x: f32, y: f32) -> Self {
        Self { a, b, c, d, x, y }
    }

    pub fn from_scale_translation(scale_x: f32, scale_y: f32, x: f32, y: f32) -> Self {
        Self::new(scale_x, 0.0, 0.0, scale_y, x, y)
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn is_singular(&self) -> bool {
        is_degenerate(self.determinant())
    }

    pub fn transform_point(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.x,
            self.c * x + self.d * y + self.y,
        ]
    }

    pub fn transform_vector(&self, x: f32, y: f32) -> [f32; 2] {
        [self.a * x + self.b * y, self.c * x + self.d * y]
    }

    /// Maps a point from the space this transform maps into back to its source space.
    ///
    /// A singular linear part yields the translation-relative offset unchanged instead of dividing
    /// by zero.
    pub fn inverse_transform_point(&self, x: f32, y: f32) -> [f32; 2] {
        let dx = x - self.x;
        let dy = y - self.y;
        let det = self.determinant();
        if is_degenerate(det) {
            return [dx, dy];
        }
        let inv = 1.0 / det;
        [
            (dx * self.d - dy * self.b) * inv,
            (dy * self.a - dx * self.c) * inv,
        ]
    }

    /// Full inverse, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if is_degenerate(det) {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Self {
            a,
            b,
            c,
            d,
            x: -(a * self.x + b * self.y),
            y: -(c * self.x + d * self.y),
        })
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn mul(&self, other: &Affine) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            x: self.a * other.x + self.b * other.y + self.x,
            y: self.c * other.x + self.d * other.y + self.y,
        }
    }

    /// World rotation of the X axis, in degrees.
    pub fn rotation_x(&self) -> f32 {
        self.c.atan2(self.a) * RAD_DEG
    }

    /// World rotation of the Y axis, in degrees.
    pub fn rotation_y(&self) -> f32 {
        self.d.atan2(self.b) * RAD_DEG
    }

    pub fn scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite()
            && self.b.is_finite()
            && self.c.is_finite()
            && self.d.is_finite()
            && self.x.is_finite()
            && self.y.is_finite()
    }
}

/// Local pose parameters of a bone. Angles are in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        shear_x: 0.0,
        shear_y: 0.0,
    };

    /// Linear part of the local transform: rotation, shear and scale composed as
    /// `[cos(r+shx)*sx, cos(r+90+shy)*sy; sin(r+shx)*sx, sin(r+90+shy)*sy]`.
    pub fn linear(&self) -> [f32; 4] {
        let rotation_x = self.rotation + self.shear_x;
        let rotation_y = self.rotation + 90.0 + self.shear_y;
        [
            cos_deg(rotation_x) * self.scale_x,
            cos_deg(rotation_y) * self.scale_y,
            sin_deg(rotation_x) * self.scale_x,
            sin_deg(rotation_y) * self.scale_y,
        ]
    }

    pub fn to_affine(&self) -> Affine {
        let [a, b, c, d] = self.linear();
        Affine::new(a, b, c, d, self.x, self.y)
    }

    pub fn approx_eq(&self, other: &LocalTransform, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && wrap_degrees(self.rotation - other.rotation).abs() <= tolerance
            && (self.scale_x - other.scale_x).abs() <= tolerance
            && (self.scale_y - other.scale_y).abs() <= tolerance
            && wrap_degrees(self.shear_x - other.shear_x).abs() <= tolerance
            && wrap_degrees(self.shear_y - other.shear_y).abs() <= tolerance
    }
}

#[cfg(feature = "glam")]
impl From<Affine> for glam::Affine2 {
    fn from(value: Affine) -> Self {
        glam::Affine2::from_cols_array(&[value.a, value.c, value.b, value.d, value.x, value.y])
    }
}

#[cfg(feature = "glam")]
impl From<glam::Affine2> for Affine {
    fn from(value: glam::Affine2) -> Self {
        let [a, c, b, d, x, y] = value.to_cols_array();
        Affine { a, b, c, d, x, y }
    }
}
