use crate::math::{DEG_RAD, wrap_radians};
use crate::{
    Attachment, Bone, PathAttachment, PositionMode, RotateMode, Skeleton, SpacingMode,
};
use std::sync::Arc;

const EPSILON: f32 = 1.0e-5;
const NONE: i32 = -1;
const BEFORE: i32 = -2;
const AFTER: i32 = -3;

/// Per-skeleton buffers reused by every path constraint evaluation.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
}

/// Where sampled positions came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum PathSample {
    Curve,
    /// The path has no length; every position is its first point and carries no direction.
    Degenerate,
}

/// Geometry needed to map the path's control points to world space.
struct PathSource<'a> {
    bones: &'a [Bone],
    slot_bone: &'a Bone,
    deform: &'a [f32],
    path: &'a PathAttachment,
}

impl PathSource<'_> {
    fn world_vertices(&self, start: usize, count: usize, out: &mut [f32], offset: usize) {
        self.path.vertex.compute_world_vertices(
            self.bones,
            self.slot_bone,
            self.deform,
            start,
            count,
            out,
            offset,
            2,
        );
    }
}

impl Skeleton {
    pub(crate) fn apply_path_constraint(&mut self, constraint_index: usize) {
        let Some(constraint) = self.path_constraints.get(constraint_index) else {
            return;
        };
        let rotate_mix = constraint.rotate_mix;
        let translate_mix = constraint.translate_mix;
        let translate = translate_mix > 0.0;
        let rotate = rotate_mix > 0.0;
        if !translate && !rotate {
            return;
        }

        let data = Arc::clone(&self.data);
        let Some(pc) = data.path_constraints.get(constraint.data_index()) else {
            return;
        };
        let slot_index = constraint.target;
        let position = constraint.position;
        let spacing = constraint.spacing;
        let bones = std::mem::take(&mut self.path_constraints[constraint_index].bones);

        let Some(key) = self.slots.get(slot_index).and_then(|s| s.attachment.clone()) else {
            self.path_constraints[constraint_index].bones = bones;
            return;
        };
        let Some(Attachment::Path(path)) = data
            .skins
            .get(key.skin)
            .and_then(|skin| skin.attachment(slot_index, &key.name))
        else {
            self.path_constraints[constraint_index].bones = bones;
            return;
        };

        let mut scratch = std::mem::take(&mut self.path_scratch);
        let percent_spacing = pc.spacing_mode == SpacingMode::Percent;
        let tangents = pc.rotate_mode == RotateMode::Tangent;
        let scale = pc.rotate_mode == RotateMode::ChainScale;
        let bone_count = bones.len();
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };

        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);
        scratch.lengths.clear();
        if scale {
            scratch.lengths.resize(bone_count, 0.0);
        }
        if scale || !percent_spacing {
            let length_spacing = pc.spacing_mode == SpacingMode::Length;
            for i in 0..spaces_count.saturating_sub(1) {
                let bone = &self.bones[bones[i]];
                let setup_length = data.bones[bone.data_index()].length;
                if setup_length < EPSILON {
                    if scale {
                        scratch.lengths[i] = 0.0;
                    }
                    scratch.spaces[i + 1] = 0.0;
                    continue;
                }
                let x = setup_length * bone.world.a;
                let y = setup_length * bone.world.c;
                let length = (x * x + y * y).sqrt();
                if scale {
                    scratch.lengths[i] = length;
                }
                scratch.spaces[i + 1] = if percent_spacing {
                    spacing
                } else if length_spacing {
                    (setup_length + spacing) * length / setup_length
                } else {
                    spacing * length / setup_length
                };
            }
        } else {
            scratch.spaces.iter_mut().skip(1).for_each(|s| *s = spacing);
        }

        let slot = &self.slots[slot_index];
        let source = PathSource {
            bones: &self.bones,
            slot_bone: &self.bones[slot.bone],
            deform: &slot.deform,
            path,
        };
        let sample = compute_world_positions(
            &source,
            &mut scratch,
            spaces_count,
            tangents,
            pc.position_mode == PositionMode::Percent,
            percent_spacing,
            position,
        );
        let slot_bone_world = self.bones[slot.bone].world;

        if let Some(sample) = sample {
            let positions = &scratch.positions;
            let mut bone_x = positions[0];
            let mut bone_y = positions[1];
            let mut offset_rotation = pc.offset_rotation;
            let tip = if offset_rotation == 0.0 {
                pc.rotate_mode == RotateMode::Chain
            } else {
                offset_rotation *= if slot_bone_world.determinant() > 0.0 {
                    DEG_RAD
                } else {
                    -DEG_RAD
                };
                false
            };

            let mut p = 3;
            for (i, &bone_index) in bones.iter().enumerate() {
                let length = data.bones[self.bones[bone_index].data_index()].length;
                let bone = &mut self.bones[bone_index];
                let m = &mut bone.world;
                m.x += (bone_x - m.x) * translate_mix;
                m.y += (bone_y - m.y) * translate_mix;

                let x = positions[p];
                let y = positions[p + 1];
                let dx = x - bone_x;
                let dy = y - bone_y;
                if scale && sample == PathSample::Curve {
                    let chain_length = scratch.lengths[i];
                    if chain_length != 0.0 {
                        let s = ((dx * dx + dy * dy).sqrt() / chain_length - 1.0) * rotate_mix
                            + 1.0;
                        m.a *= s;
                        m.c *= s;
                    }
                }
                bone_x = x;
                bone_y = y;

                if rotate && sample == PathSample::Curve {
                    let (a, b, c, d) = (m.a, m.b, m.c, m.d);
                    let mut r = if tangents {
                        positions[p - 1]
                    } else if scratch.spaces[i + 1] == 0.0 {
                        positions[p + 2]
                    } else {
                        dy.atan2(dx)
                    };
                    r -= c.atan2(a);
                    if tip {
                        let (sin, cos) = r.sin_cos();
                        bone_x += (length * (cos * a - sin * c) - dx) * rotate_mix;
                        bone_y += (length * (sin * a + cos * c) - dy) * rotate_mix;
                    } else {
                        r += offset_rotation;
                    }
                    let (sin, cos) = (wrap_radians(r) * rotate_mix).sin_cos();
                    m.a = cos * a - sin * c;
                    m.b = cos * b - sin * d;
                    m.c = sin * a + cos * c;
                    m.d = sin * b + cos * d;
                }
                bone.applied_valid = false;
                p += 3;
            }
        }

        self.path_scratch = scratch;
        self.path_constraints[constraint_index].bones = bones;
    }
}

/// Samples `spaces_count` positions along the path into `scratch.positions` as
/// `x, y, rotation` triples (plus two trailing floats). Returns `None` when the path cannot be
/// sampled.
#[allow(clippy::too_many_arguments)]
fn compute_world_positions(
    source: &PathSource<'_>,
    scratch: &mut PathScratch,
    spaces_count: usize,
    tangents: bool,
    percent_position: bool,
    percent_spacing: bool,
    mut position: f32,
) -> Option<PathSample> {
    let PathScratch {
        spaces,
        positions,
        world,
        curves,
        ..
    } = scratch;
    let path = source.path;
    let closed = path.closed;
    let mut vertices_length = path.vertex.world_vertices_length;
    let mut curve_count = vertices_length / 6;
    if curve_count == 0 || spaces_count == 0 {
        return None;
    }

    positions.clear();
    positions.resize(spaces_count * 3 + 2, 0.0);
    let out = positions.as_mut_slice();
    let mut prev_curve = NONE;

    if !path.constant_speed {
        let lengths = path.lengths.as_slice();
        let curve_count = curve_count.checked_sub(if closed { 1 } else { 2 })?;
        let path_length = *lengths.get(curve_count)?;
        if path_length < EPSILON {
            return Some(fill_first_point(source, world, out));
        }
        if percent_position {
            position *= path_length;
        }
        if percent_spacing {
            spaces.iter_mut().skip(1).for_each(|s| *s *= path_length);
        }

        world.clear();
        world.resize(8, 0.0);
        let mut curve = 0usize;
        for i in 0..spaces_count {
            let o = i * 3;
            let space = spaces[i];
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                if prev_curve != BEFORE {
                    prev_curve = BEFORE;
                    source.world_vertices(2, 4, world, 0);
                }
                add_before_position(p, world, 0, out, o);
                continue;
            } else if p > path_length {
                if prev_curve != AFTER {
                    prev_curve = AFTER;
                    source.world_vertices(vertices_length - 6, 4, world, 0);
                }
                add_after_position(p - path_length, world, 0, out, o);
                continue;
            }

            while curve + 1 < lengths.len() && p > lengths[curve] {
                curve += 1;
            }
            let length = lengths[curve];
            p = if curve == 0 {
                p / length.max(EPSILON)
            } else {
                let prev = lengths[curve - 1];
                (p - prev) / (length - prev).max(EPSILON)
            };

            if curve as i32 != prev_curve {
                prev_curve = curve as i32;
                if closed && curve == curve_count {
                    source.world_vertices(vertices_length - 4, 4, world, 0);
                    source.world_vertices(0, 4, world, 4);
                } else {
                    source.world_vertices(curve * 6 + 2, 8, world, 0);
                }
            }
            add_curve_position(
                p,
                [
                    world[0], world[1], world[2], world[3], world[4], world[5], world[6], world[7],
                ],
                out,
                o,
                tangents || (i > 0 && space == 0.0),
            );
        }
        return Some(PathSample::Curve);
    }

    // Constant speed: measure every curve in world space.
    world.clear();
    if closed {
        vertices_length += 2;
        world.resize(vertices_length, 0.0);
        source.world_vertices(2, vertices_length - 4, world, 0);
        source.world_vertices(0, 2, world, vertices_length - 4);
        world[vertices_length - 2] = world[0];
        world[vertices_length - 1] = world[1];
    } else {
        curve_count -= 1;
        vertices_length -= 4;
        world.resize(vertices_length, 0.0);
        source.world_vertices(2, vertices_length, world, 0);
    }
    if curve_count == 0 {
        return None;
    }

    curves.clear();
    curves.resize(curve_count, 0.0);
    let mut path_length = 0.0f32;
    let mut w = 0usize;
    for curve in curves.iter_mut() {
        let points = curve_points(world, w);
        let mut stepper = ForwardDifference::new(&points, 0.1875, 0.09375, 0.75);
        path_length += stepper.length();
        stepper.step();
        path_length += stepper.length();
        stepper.step_second_order();
        path_length += stepper.length();
        stepper.step_final();
        path_length += stepper.length();
        *curve = path_length;
        w += 6;
    }
    if path_length < EPSILON {
        return Some(fill_first_point(source, world, out));
    }

    if percent_position {
        position *= path_length;
    } else if let Some(&authored) = curve_count
        .checked_sub(1)
        .and_then(|last| path.lengths.get(last))
        .filter(|&&l| l > EPSILON)
    {
        position *= path_length / authored;
    }
    if percent_spacing {
        spaces.iter_mut().skip(1).for_each(|s| *s *= path_length);
    }

    let mut segments = [0.0f32; 10];
    let mut curve_length = 0.0f32;
    let mut points = [0.0f32; 8];
    let mut curve = 0usize;
    let mut segment = 0usize;
    for i in 0..spaces_count {
        let o = i * 3;
        let space = spaces[i];
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            add_before_position(p, world, 0, out, o);
            continue;
        } else if p > path_length {
            add_after_position(p - path_length, world, vertices_length - 4, out, o);
            continue;
        }

        while curve + 1 < curves.len() && p > curves[curve] {
            curve += 1;
        }
        let length = curves[curve];
        p = if curve == 0 {
            p / length.max(EPSILON)
        } else {
            let prev = curves[curve - 1];
            (p - prev) / (length - prev).max(EPSILON)
        };

        if curve as i32 != prev_curve {
            prev_curve = curve as i32;
            points = curve_points(world, curve * 6);
            let mut stepper = ForwardDifference::new(&points, 0.03, 0.006, 0.3);
            curve_length = stepper.length();
            segments[0] = curve_length;
            for seg in segments.iter_mut().take(8).skip(1) {
                stepper.step();
                curve_length += stepper.length();
                *seg = curve_length;
            }
            stepper.step_second_order();
            curve_length += stepper.length();
            segments[8] = curve_length;
            stepper.step_final();
            curve_length += stepper.length();
            segments[9] = curve_length;
            segment = 0;
        }

        p *= curve_length;
        while segment + 1 < segments.len() && p > segments[segment] {
            segment += 1;
        }
        let length = segments[segment];
        p = if segment == 0 {
            p / length.max(EPSILON)
        } else {
            let prev = segments[segment - 1];
            segment as f32 + (p - prev) / (length - prev).max(EPSILON)
        };
        add_curve_position(
            p * 0.1,
            points,
            out,
            o,
            tangents || (i > 0 && space == 0.0),
        );
    }
    Some(PathSample::Curve)
}

fn fill_first_point(source: &PathSource<'_>, world: &mut Vec<f32>, out: &mut [f32]) -> PathSample {
    world.clear();
    world.resize(2, 0.0);
    source.world_vertices(2, 2, world, 0);
    for triple in out.chunks_exact_mut(3) {
        triple[0] = world[0];
        triple[1] = world[1];
        triple[2] = 0.0;
    }
    let len = out.len();
    out[len - 2] = world[0];
    out[len - 1] = world[1];
    PathSample::Degenerate
}

fn curve_points(world: &[f32], at: usize) -> [f32; 8] {
    let mut points = [0.0f32; 8];
    for (k, point) in points.iter_mut().enumerate() {
        *point = world.get(at + k).copied().unwrap_or(0.0);
    }
    points
}

/// Forward differencing over a cubic Bezier, used to approximate arc length.
struct ForwardDifference {
    dfx: f32,
    dfy: f32,
    ddfx: f32,
    ddfy: f32,
    dddfx: f32,
    dddfy: f32,
}

impl ForwardDifference {
    fn new(points: &[f32; 8], tmp_scale: f32, ddd_scale: f32, df_scale: f32) -> Self {
        let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = *points;
        let tmpx = (x1 - cx1 * 2.0 + cx2) * tmp_scale;
        let tmpy = (y1 - cy1 * 2.0 + cy2) * tmp_scale;
        let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * ddd_scale;
        let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * ddd_scale;
        Self {
            dfx: (cx1 - x1) * df_scale + tmpx + dddfx * 0.166_666_67,
            dfy: (cy1 - y1) * df_scale + tmpy + dddfy * 0.166_666_67,
            ddfx: tmpx * 2.0 + dddfx,
            ddfy: tmpy * 2.0 + dddfy,
            dddfx,
            dddfy,
        }
    }

    fn length(&self) -> f32 {
        (self.dfx * self.dfx + self.dfy * self.dfy).sqrt()
    }

    fn step(&mut self) {
        self.dfx += self.ddfx;
        self.dfy += self.ddfy;
        self.ddfx += self.dddfx;
        self.ddfy += self.dddfy;
    }

    fn step_second_order(&mut self) {
        self.dfx += self.ddfx;
        self.dfy += self.ddfy;
    }

    fn step_final(&mut self) {
        self.dfx += self.ddfx + self.dddfx;
        self.dfy += self.ddfy + self.dddfy;
    }
}

fn add_before_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i];
    let y1 = temp[i + 1];
    let r = (temp[i + 3] - y1).atan2(temp[i + 2] - x1);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i + 2];
    let y1 = temp[i + 3];
    let r = (y1 - temp[i + 1]).atan2(x1 - temp[i]);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_curve_position(p: f32, points: [f32; 8], output: &mut [f32], o: usize, tangents: bool) {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
    if p < EPSILON || p.is_nan() {
        output[o] = x1;
        output[o + 1] = y1;
        output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    output[o] = x;
    output[o + 1] = y;
    if tangents {
        output[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt))
                .atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}
