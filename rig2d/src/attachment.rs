//! Attachment geometry. Rendering concerns (textures, UVs, triangulation) are carried as plain
//! data only; the runtime just needs positions in bone space and how to map them to world space.

use crate::math::{cos_deg, sin_deg, RAD_DEG};
use crate::Bone;

#[derive(Clone, Debug)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => a.name.as_str(),
            Attachment::Mesh(a) => a.name.as_str(),
            Attachment::BoundingBox(a) => a.name.as_str(),
            Attachment::Path(a) => a.name.as_str(),
            Attachment::Point(a) => a.name.as_str(),
            Attachment::Clipping(a) => a.name.as_str(),
        }
    }

    /// Vertex data for attachments whose shape is a list of (optionally weighted) vertices.
    pub fn vertex_data(&self) -> Option<&VertexData> {
        match self {
            Attachment::Mesh(a) => Some(&a.vertex),
            Attachment::BoundingBox(a) => Some(&a.vertex),
            Attachment::Path(a) => Some(&a.vertex),
            Attachment::Clipping(a) => Some(&a.vertex),
            Attachment::Region(_) | Attachment::Point(_) => None,
        }
    }

    /// Name deform timelines use to address this attachment's vertices.
    ///
    /// Linked meshes that share their parent's deform report the parent's name.
    pub fn deform_attachment(&self) -> Option<&str> {
        match self {
            Attachment::Mesh(a) => Some(a.deform_attachment.as_deref().unwrap_or(&a.name)),
            Attachment::BoundingBox(a) => Some(a.name.as_str()),
            Attachment::Path(a) => Some(a.name.as_str()),
            Attachment::Clipping(a) => Some(a.name.as_str()),
            Attachment::Region(_) | Attachment::Point(_) => None,
        }
    }
}

/// Bone-space vertices shared by mesh, path, bounding box and clipping attachments.
///
/// Unweighted: `bones` is `None` and `vertices` holds `x, y` pairs in the slot bone's space.
/// Weighted: `bones` is a run-length list (`count, index..., count, index..., ...`) with one run
/// per vertex and `vertices` holds one `x, y, weight` triple per bone influence.
#[derive(Clone, Debug, Default)]
pub struct VertexData {
    pub bones: Option<Vec<usize>>,
    pub vertices: Vec<f32>,
    /// Number of floats produced when all vertices are mapped to world space.
    pub world_vertices_length: usize,
}

impl VertexData {
    pub fn unweighted(vertices: Vec<f32>) -> Self {
        let world_vertices_length = vertices.len();
        Self {
            bones: None,
            vertices,
            world_vertices_length,
        }
    }

    pub fn weighted(bones: Vec<usize>, vertices: Vec<f32>, vertex_count: usize) -> Self {
        Self {
            bones: Some(bones),
            vertices,
            world_vertices_length: vertex_count * 2,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.bones.is_some()
    }

    /// Every bone index referenced by the run-length weight list.
    pub fn bone_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let runs = self.bones.as_deref().unwrap_or(&[]);
        let mut i = 0usize;
        std::iter::from_fn(move || {
            let count = *runs.get(i)?;
            let indices = runs.get(i + 1..i + 1 + count)?;
            i += count + 1;
            Some(indices.iter().copied())
        })
        .flatten()
    }

    /// Maps `count` floats of local vertices starting at float `start` to world space.
    ///
    /// `slot_bone` positions unweighted vertices. `deform`, when non-empty, replaces unweighted
    /// positions and offsets weighted ones. Results are written to `out` starting at `offset`,
    /// `stride` floats apart. Output that does not fit in `out` is dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        bones: &[Bone],
        slot_bone: &Bone,
        deform: &[f32],
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        let end = offset + (count >> 1) * stride;

        let Some(runs) = self.bones.as_deref() else {
            let vertices = if deform.is_empty() {
                self.vertices.as_slice()
            } else {
                deform
            };
            let m = &slot_bone.world;
            let mut v = start;
            let mut w = offset;
            while w < end {
                let (Some(&vx), Some(&vy)) = (vertices.get(v), vertices.get(v + 1)) else {
                    break;
                };
                let Some(dst) = out.get_mut(w..w + 2) else {
                    break;
                };
                dst[0] = vx * m.a + vy * m.b + m.x;
                dst[1] = vx * m.c + vy * m.d + m.y;
                v += 2;
                w += stride;
            }
            return;
        };

        let mut v = 0usize;
        let mut skip = 0usize;
        let mut i = 0usize;
        while i < start {
            let n = runs.get(v).copied().unwrap_or(0);
            v += n + 1;
            skip += n;
            i += 2;
        }

        let mut b = skip * 3;
        let mut f = skip * 2;
        let mut w = offset;
        while w < end {
            let Some(&n) = runs.get(v) else {
                break;
            };
            v += 1;
            let mut wx = 0.0f32;
            let mut wy = 0.0f32;
            for &bone_index in runs.get(v..v + n).unwrap_or(&[]) {
                let (Some(bone), Some(&lx), Some(&ly), Some(&weight)) = (
                    bones.get(bone_index),
                    self.vertices.get(b),
                    self.vertices.get(b + 1),
                    self.vertices.get(b + 2),
                ) else {
                    break;
                };
                let (dx, dy) = if deform.is_empty() {
                    (0.0, 0.0)
                } else {
                    (
                        deform.get(f).copied().unwrap_or(0.0),
                        deform.get(f + 1).copied().unwrap_or(0.0),
                    )
                };
                let [x, y] = bone.world.transform_point(lx + dx, ly + dy);
                wx += x * weight;
                wy += y * weight;
                b += 3;
                f += 2;
            }
            v += n;
            let Some(dst) = out.get_mut(w..w + 2) else {
                break;
            };
            dst[0] = wx;
            dst[1] = wy;
            w += stride;
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    /// Bone-space corners: bottom-left, upper-left, upper-right, bottom-right.
    pub offsets: [f32; 8],
}

impl RegionAttachment {
    pub fn new(name: impl Into<String>, width: f32, height: f32) -> Self {
        let name = name.into();
        let mut region = Self {
            path: name.clone(),
            name,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
            offsets: [0.0; 8],
        };
        region.update_offsets();
        region
    }

    /// Recomputes `offsets` after the placement fields change.
    pub fn update_offsets(&mut self) {
        let local_x = -self.width / 2.0 * self.scale_x;
        let local_y = -self.height / 2.0 * self.scale_y;
        let local_x2 = local_x + self.width * self.scale_x;
        let local_y2 = local_y + self.height * self.scale_y;
        let cos = cos_deg(self.rotation);
        let sin = sin_deg(self.rotation);
        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;

        self.offsets = [
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
        ];
    }

    /// Writes the four world corners (bottom-left, upper-left, upper-right, bottom-right).
    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32], offset: usize, stride: usize) {
        let mut w = offset;
        for corner in self.offsets.chunks_exact(2) {
            let Some(dst) = out.get_mut(w..w + 2) else {
                return;
            };
            let [x, y] = bone.world.transform_point(corner[0], corner[1]);
            dst[0] = x;
            dst[1] = y;
            w += stride;
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub vertex: VertexData,
    pub region_uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub edges: Vec<u16>,
    pub width: f32,
    pub height: f32,
    /// For linked meshes that inherit deform timelines: the attachment the timelines target.
    pub deform_attachment: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub color: [f32; 4],
    pub vertex: VertexData,
}

#[derive(Clone, Debug)]
pub struct PathAttachment {
    pub name: String,
    pub color: [f32; 4],
    pub vertex: VertexData,
    /// Cumulative length at the end of each curve.
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
pub struct PointAttachment {
    pub name: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl PointAttachment {
    pub fn compute_world_position(&self, bone: &Bone) -> [f32; 2] {
        bone.world.transform_point(self.x, self.y)
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        let cos = cos_deg(self.rotation);
        let sin = sin_deg(self.rotation);
        let [x, y] = bone.world.transform_vector(cos, sin);
        y.atan2(x) * RAD_DEG
    }
}

#[derive(Clone, Debug)]
pub struct ClippingAttachment {
    pub name: String,
    pub color: [f32; 4],
    pub vertex: VertexData,
    /// Slot after which clipping stops.
    pub end_slot: Option<usize>,
}
