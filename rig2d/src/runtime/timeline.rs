use super::curve::{CurveTable, CurveTimeline, search_times, validate_times};
use crate::math::{signum, wrap_degrees};
use crate::{Event, MixBlend, MixDirection, Skeleton, SkeletonData};
use std::sync::Arc;

/// Rotation offset from the setup pose, in degrees.
#[derive(Clone, Debug)]
pub struct RotateTimeline {
    pub bone: usize,
    pub curve: CurveTimeline,
}

impl RotateTimeline {
    pub fn new(bone: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone,
            curve: CurveTimeline::new(frame_count, 1, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> f32 {
        self.curve.sample_component(time, 0)
    }
}

/// Translation offset from the setup pose.
#[derive(Clone, Debug)]
pub struct TranslateTimeline {
    pub bone: usize,
    pub curve: CurveTimeline,
}

/// Scale multipliers of the setup pose.
#[derive(Clone, Debug)]
pub struct ScaleTimeline {
    pub bone: usize,
    pub curve: CurveTimeline,
}

/// Shear offset from the setup pose, in degrees.
#[derive(Clone, Debug)]
pub struct ShearTimeline {
    pub bone: usize,
    pub curve: CurveTimeline,
}

impl TranslateTimeline {
    pub fn new(bone: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone,
            curve: CurveTimeline::new(frame_count, 2, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 2] {
        sample2(&self.curve, time)
    }
}

impl ScaleTimeline {
    pub fn new(bone: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone,
            curve: CurveTimeline::new(frame_count, 2, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 2] {
        sample2(&self.curve, time)
    }
}

impl ShearTimeline {
    pub fn new(bone: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone,
            curve: CurveTimeline::new(frame_count, 2, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 2] {
        sample2(&self.curve, time)
    }
}

fn sample2(curve: &CurveTimeline, time: f32) -> [f32; 2] {
    let mut out = [0.0; 2];
    curve.sample(time, &mut out);
    out
}

/// Slot tint as RGBA.
#[derive(Clone, Debug)]
pub struct ColorTimeline {
    pub slot: usize,
    pub curve: CurveTimeline,
}

impl ColorTimeline {
    pub fn new(slot: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            slot,
            curve: CurveTimeline::new(frame_count, 4, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 4] {
        let mut out = [0.0; 4];
        self.curve.sample(time, &mut out);
        out
    }
}

/// Slot light RGBA plus dark RGB, as seven components.
#[derive(Clone, Debug)]
pub struct TwoColorTimeline {
    pub slot: usize,
    pub curve: CurveTimeline,
}

impl TwoColorTimeline {
    pub fn new(slot: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            slot,
            curve: CurveTimeline::new(frame_count, 7, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> ([f32; 4], [f32; 3]) {
        let mut out = [0.0; 7];
        self.curve.sample(time, &mut out);
        (
            [out[0], out[1], out[2], out[3]],
            [out[4], out[5], out[6]],
        )
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot: usize,
    pub frames: Vec<f32>,
    /// Attachment shown from each keyframe on; `None` hides the slot's attachment.
    pub names: Vec<Option<String>>,
}

impl AttachmentTimeline {
    pub fn sample(&self, time: f32) -> Option<Option<&str>> {
        let frame = search_times(&self.frames, time)?;
        self.names.get(frame).map(|name| name.as_deref())
    }
}

/// Per-keyframe vertex data for the vertex attachment whose deform target is `attachment`.
///
/// Unweighted attachments key absolute bone-space positions; weighted attachments key offsets.
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot: usize,
    pub attachment: String,
    pub frames: Vec<f32>,
    pub vertices: Vec<Vec<f32>>,
    pub curves: CurveTable,
}

impl DeformTimeline {
    pub fn new(slot: usize, attachment: impl Into<String>, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            slot,
            attachment: attachment.into(),
            frames: vec![0.0; frame_count],
            vertices: vec![Vec::new(); frame_count],
            curves: CurveTable::new(frame_count, 1, bezier_count),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.first().map_or(0, Vec::len)
    }

    /// Interpolated vertices at `time`, or `None` before the first keyframe.
    pub fn sample(&self, time: f32, out: &mut Vec<f32>) -> Option<()> {
        let frame = search_times(&self.frames, time)?;
        let (prev, next, percent) = self.bracket(frame, time);
        out.clear();
        out.extend(
            prev.iter()
                .zip(next)
                .map(|(&p, &n)| p + (n - p) * percent),
        );
        Some(())
    }

    fn bracket(&self, frame: usize, time: f32) -> (&[f32], &[f32], f32) {
        let prev = self.vertices[frame].as_slice();
        let Some(next) = self.vertices.get(frame + 1).map(Vec::as_slice) else {
            return (prev, prev, 0.0);
        };
        let time1 = self.frames[frame];
        let time2 = self.frames[frame + 1];
        let fraction = if time2 > time1 {
            (time - time1) / (time2 - time1)
        } else {
            0.0
        };
        (prev, next, self.curves.percent(frame, 0, fraction))
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    pub frames: Vec<f32>,
    pub events: Vec<Event>,
}

impl EventTimeline {
    /// Appends the events keyed in `(last_time, time]` to `fired`. When `last_time > time` the
    /// animation looped: events after `last_time` fire, then those from the start up to `time`.
    pub fn fire(&self, last_time: f32, time: f32, fired: &mut Vec<Event>) {
        let Some(&last_frame) = self.frames.last() else {
            return;
        };
        let mut last_time = last_time;
        if last_time > time {
            self.fire(last_time, f32::MAX, fired);
            last_time = -1.0;
        } else if last_time >= last_frame {
            return;
        }
        if time < self.frames[0] {
            return;
        }

        let mut frame = if last_time < self.frames[0] {
            0
        } else {
            self.frames.partition_point(|&t| t <= last_time)
        };
        while frame < self.frames.len() && time >= self.frames[frame] {
            fired.push(self.events[frame].clone());
            frame += 1;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DrawOrderTimeline {
    pub frames: Vec<f32>,
    /// For each keyframe, slot indices in draw order, or `None` for the setup order.
    pub draw_orders: Vec<Option<Vec<usize>>>,
}

impl DrawOrderTimeline {
    pub fn sample(&self, time: f32) -> Option<Option<&[usize]>> {
        let frame = search_times(&self.frames, time)?;
        self.draw_orders.get(frame).map(|order| order.as_deref())
    }
}

/// IK mix and softness (curves) plus stepped bend direction, compress and stretch.
#[derive(Clone, Debug)]
pub struct IkConstraintTimeline {
    pub constraint: usize,
    pub curve: CurveTimeline,
    pub bend_directions: Vec<i32>,
    pub compress: Vec<bool>,
    pub stretch: Vec<bool>,
}

impl IkConstraintTimeline {
    pub fn new(constraint: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint,
            curve: CurveTimeline::new(frame_count, 2, bezier_count),
            bend_directions: vec![1; frame_count],
            compress: vec![false; frame_count],
            stretch: vec![false; frame_count],
        }
    }

    /// `(mix, softness)` at `time`.
    pub fn sample(&self, time: f32) -> (f32, f32) {
        (
            self.curve.sample_component(time, 0),
            self.curve.sample_component(time, 1),
        )
    }
}

/// Rotate, translate, scale and shear mixes.
#[derive(Clone, Debug)]
pub struct TransformConstraintTimeline {
    pub constraint: usize,
    pub curve: CurveTimeline,
}

impl TransformConstraintTimeline {
    pub fn new(constraint: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint,
            curve: CurveTimeline::new(frame_count, 4, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 4] {
        let mut out = [0.0; 4];
        self.curve.sample(time, &mut out);
        out
    }
}

#[derive(Clone, Debug)]
pub struct PathConstraintPositionTimeline {
    pub constraint: usize,
    pub curve: CurveTimeline,
}

#[derive(Clone, Debug)]
pub struct PathConstraintSpacingTimeline {
    pub constraint: usize,
    pub curve: CurveTimeline,
}

/// Rotate and translate mixes.
#[derive(Clone, Debug)]
pub struct PathConstraintMixTimeline {
    pub constraint: usize,
    pub curve: CurveTimeline,
}

impl PathConstraintPositionTimeline {
    pub fn new(constraint: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint,
            curve: CurveTimeline::new(frame_count, 1, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> f32 {
        self.curve.sample_component(time, 0)
    }
}

impl PathConstraintSpacingTimeline {
    pub fn new(constraint: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint,
            curve: CurveTimeline::new(frame_count, 1, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> f32 {
        self.curve.sample_component(time, 0)
    }
}

impl PathConstraintMixTimeline {
    pub fn new(constraint: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint,
            curve: CurveTimeline::new(frame_count, 2, bezier_count),
        }
    }

    pub fn sample(&self, time: f32) -> [f32; 2] {
        sample2(&self.curve, time)
    }
}

#[derive(Clone, Debug)]
pub enum Timeline {
    Rotate(RotateTimeline),
    Translate(TranslateTimeline),
    Scale(ScaleTimeline),
    Shear(ShearTimeline),
    Color(ColorTimeline),
    TwoColor(TwoColorTimeline),
    Attachment(AttachmentTimeline),
    Deform(DeformTimeline),
    Event(EventTimeline),
    DrawOrder(DrawOrderTimeline),
    IkConstraint(IkConstraintTimeline),
    TransformConstraint(TransformConstraintTimeline),
    PathConstraintPosition(PathConstraintPositionTimeline),
    PathConstraintSpacing(PathConstraintSpacingTimeline),
    PathConstraintMix(PathConstraintMixTimeline),
}

impl Timeline {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Timeline::Rotate(_) => "rotate",
            Timeline::Translate(_) => "translate",
            Timeline::Scale(_) => "scale",
            Timeline::Shear(_) => "shear",
            Timeline::Color(_) => "color",
            Timeline::TwoColor(_) => "twoColor",
            Timeline::Attachment(_) => "attachment",
            Timeline::Deform(_) => "deform",
            Timeline::Event(_) => "event",
            Timeline::DrawOrder(_) => "drawOrder",
            Timeline::IkConstraint(_) => "ik",
            Timeline::TransformConstraint(_) => "transform",
            Timeline::PathConstraintPosition(_) => "position",
            Timeline::PathConstraintSpacing(_) => "spacing",
            Timeline::PathConstraintMix(_) => "mix",
        }
    }

    /// Time of the last keyframe, or 0 for an empty timeline.
    pub fn last_time(&self) -> f32 {
        let last = match self {
            Timeline::Rotate(t) => t.curve.last_time(),
            Timeline::Translate(t) => t.curve.last_time(),
            Timeline::Scale(t) => t.curve.last_time(),
            Timeline::Shear(t) => t.curve.last_time(),
            Timeline::Color(t) => t.curve.last_time(),
            Timeline::TwoColor(t) => t.curve.last_time(),
            Timeline::Attachment(t) => t.frames.last().copied(),
            Timeline::Deform(t) => t.frames.last().copied(),
            Timeline::Event(t) => t.frames.last().copied(),
            Timeline::DrawOrder(t) => t.frames.last().copied(),
            Timeline::IkConstraint(t) => t.curve.last_time(),
            Timeline::TransformConstraint(t) => t.curve.last_time(),
            Timeline::PathConstraintPosition(t) => t.curve.last_time(),
            Timeline::PathConstraintSpacing(t) => t.curve.last_time(),
            Timeline::PathConstraintMix(t) => t.curve.last_time(),
        };
        last.unwrap_or(0.0)
    }

    /// Checks target indices, per-keyframe array lengths and keyframe ordering.
    pub(crate) fn validate(&self, data: &SkeletonData) -> Result<(), String> {
        let bones = data.bones.len();
        let slots = data.slots.len();
        let check = |kind: &str, index: usize, count: usize| {
            if index < count {
                Ok(())
            } else {
                Err(format!("{kind} index {index} out of range (count {count})"))
            }
        };
        let check_len = |what: &str, len: usize, frames: usize| {
            if len == frames {
                Ok(())
            } else {
                Err(format!("{what} has {len} entries for {frames} keyframes"))
            }
        };

        match self {
            Timeline::Rotate(t) => {
                check("bone", t.bone, bones)?;
                t.curve.validate()
            }
            Timeline::Translate(t) => {
                check("bone", t.bone, bones)?;
                t.curve.validate()
            }
            Timeline::Scale(t) => {
                check("bone", t.bone, bones)?;
                t.curve.validate()
            }
            Timeline::Shear(t) => {
                check("bone", t.bone, bones)?;
                t.curve.validate()
            }
            Timeline::Color(t) => {
                check("slot", t.slot, slots)?;
                t.curve.validate()
            }
            Timeline::TwoColor(t) => {
                check("slot", t.slot, slots)?;
                t.curve.validate()
            }
            Timeline::Attachment(t) => {
                check("slot", t.slot, slots)?;
                check_len("attachment names", t.names.len(), t.frames.len())?;
                validate_times(t.frames.iter().copied())
            }
            Timeline::Deform(t) => {
                check("slot", t.slot, slots)?;
                check_len("deform vertices", t.vertices.len(), t.frames.len())?;
                let count = t.vertex_count();
                if let Some(frame) = t.vertices.iter().position(|v| v.len() != count) {
                    return Err(format!(
                        "deform keyframe {frame} has {} floats, expected {count}",
                        t.vertices[frame].len()
                    ));
                }
                validate_times(t.frames.iter().copied())
            }
            Timeline::Event(t) => {
                check_len("events", t.events.len(), t.frames.len())?;
                for event in &t.events {
                    check("event", event.data, data.events.len())?;
                }
                validate_times(t.frames.iter().copied())
            }
            Timeline::DrawOrder(t) => {
                check_len("draw orders", t.draw_orders.len(), t.frames.len())?;
                for order in t.draw_orders.iter().flatten() {
                    check_len("draw order", order.len(), slots)?;
                    let mut seen = vec![false; slots];
                    for &slot in order {
                        check("slot", slot, slots)?;
                        if std::mem::replace(&mut seen[slot], true) {
                            return Err(format!("draw order lists slot {slot} twice"));
                        }
                    }
                }
                validate_times(t.frames.iter().copied())
            }
            Timeline::IkConstraint(t) => {
                check("ik constraint", t.constraint, data.ik_constraints.len())?;
                let frames = t.curve.frame_count();
                check_len("bend directions", t.bend_directions.len(), frames)?;
                check_len("compress flags", t.compress.len(), frames)?;
                check_len("stretch flags", t.stretch.len(), frames)?;
                t.curve.validate()
            }
            Timeline::TransformConstraint(t) => {
                check(
                    "transform constraint",
                    t.constraint,
                    data.transform_constraints.len(),
                )?;
                t.curve.validate()
            }
            Timeline::PathConstraintPosition(t) => {
                check("path constraint", t.constraint, data.path_constraints.len())?;
                t.curve.validate()
            }
            Timeline::PathConstraintSpacing(t) => {
                check("path constraint", t.constraint, data.path_constraints.len())?;
                t.curve.validate()
            }
            Timeline::PathConstraintMix(t) => {
                check("path constraint", t.constraint, data.path_constraints.len())?;
                t.curve.validate()
            }
        }
    }

    /// Writes this timeline's value at `time` into the pose.
    ///
    /// `alpha` weighs the timeline value against the current (or setup) value. Events keyed in
    /// `(last_time, time]` are appended to `events`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: &mut Vec<Event>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Timeline::Rotate(t) => apply_rotate(t, skeleton, time, alpha, blend),
            Timeline::Translate(t) => apply_translate(t, skeleton, time, alpha, blend),
            Timeline::Scale(t) => apply_scale(t, skeleton, time, alpha, blend, direction),
            Timeline::Shear(t) => apply_shear(t, skeleton, time, alpha, blend),
            Timeline::Color(t) => apply_color(t, skeleton, time, alpha, blend),
            Timeline::TwoColor(t) => apply_two_color(t, skeleton, time, alpha, blend),
            Timeline::Attachment(t) => apply_attachment(t, skeleton, time, blend, direction),
            Timeline::Deform(t) => apply_deform(t, skeleton, time, alpha, blend),
            Timeline::Event(t) => t.fire(last_time, time, events),
            Timeline::DrawOrder(t) => apply_draw_order(t, skeleton, time, blend, direction),
            Timeline::IkConstraint(t) => {
                apply_ik_constraint(t, skeleton, time, alpha, blend, direction)
            }
            Timeline::TransformConstraint(t) => {
                apply_transform_constraint(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintPosition(t) => {
                apply_path_position(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintSpacing(t) => {
                apply_path_spacing(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintMix(t) => apply_path_mix(t, skeleton, time, alpha, blend),
        }
    }
}

fn before_first(curve: &CurveTimeline, time: f32) -> bool {
    curve.first_time().is_none_or(|first| time < first)
}

pub(crate) fn apply_rotate(
    timeline: &RotateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone) else {
        return;
    };
    if !bone.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = skeleton.data.bones[timeline.bone].rotation;
    let local = &mut bone.local;

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => local.rotation = setup,
            MixBlend::First => {
                local.rotation += wrap_degrees(setup - local.rotation) * alpha;
            }
            _ => {}
        }
        return;
    }

    let r = timeline.sample(time);
    match blend {
        MixBlend::Setup => local.rotation = setup + r * alpha,
        MixBlend::First | MixBlend::Replace => {
            local.rotation += wrap_degrees(r + setup - local.rotation) * alpha;
        }
        MixBlend::Add => local.rotation += r * alpha,
    }
}

pub(crate) fn apply_translate(
    timeline: &TranslateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone) else {
        return;
    };
    if !bone.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.bones[timeline.bone];
    let local = &mut bone.local;

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => {
                local.x = setup.x;
                local.y = setup.y;
            }
            MixBlend::First => {
                local.x += (setup.x - local.x) * alpha;
                local.y += (setup.y - local.y) * alpha;
            }
            _ => {}
        }
        return;
    }

    let [x, y] = timeline.sample(time);
    match blend {
        MixBlend::Setup => {
            local.x = setup.x + x * alpha;
            local.y = setup.y + y * alpha;
        }
        MixBlend::First | MixBlend::Replace => {
            local.x += (setup.x + x - local.x) * alpha;
            local.y += (setup.y + y - local.y) * alpha;
        }
        MixBlend::Add => {
            local.x += x * alpha;
            local.y += y * alpha;
        }
    }
}

pub(crate) fn apply_scale(
    timeline: &ScaleTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone) else {
        return;
    };
    if !bone.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.bones[timeline.bone];
    let (setup_x, setup_y) = (setup.scale_x, setup.scale_y);
    let local = &mut bone.local;

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => {
                local.scale_x = setup_x;
                local.scale_y = setup_y;
            }
            MixBlend::First => {
                local.scale_x += (setup_x - local.scale_x) * alpha;
                local.scale_y += (setup_y - local.scale_y) * alpha;
            }
            _ => {}
        }
        return;
    }

    let [mx, my] = timeline.sample(time);
    let x = mx * setup_x;
    let y = my * setup_y;

    if alpha == 1.0 {
        if blend == MixBlend::Add {
            local.scale_x += x - setup_x;
            local.scale_y += y - setup_y;
        } else {
            local.scale_x = x;
            local.scale_y = y;
        }
        return;
    }

    // Mixing out keeps the current sign; mixing in takes the timeline's sign.
    match (direction, blend) {
        (MixDirection::Out, MixBlend::Setup) => {
            local.scale_x = setup_x + (x.abs() * signum(setup_x) - setup_x) * alpha;
            local.scale_y = setup_y + (y.abs() * signum(setup_y) - setup_y) * alpha;
        }
        (MixDirection::Out, MixBlend::First | MixBlend::Replace) => {
            let (bx, by) = (local.scale_x, local.scale_y);
            local.scale_x = bx + (x.abs() * signum(bx) - bx) * alpha;
            local.scale_y = by + (y.abs() * signum(by) - by) * alpha;
        }
        (MixDirection::Out, MixBlend::Add) => {
            let (bx, by) = (local.scale_x, local.scale_y);
            local.scale_x = bx + (x.abs() * signum(bx) - setup_x) * alpha;
            local.scale_y = by + (y.abs() * signum(by) - setup_y) * alpha;
        }
        (MixDirection::In, MixBlend::Setup) => {
            let bx = setup_x.abs() * signum(x);
            let by = setup_y.abs() * signum(y);
            local.scale_x = bx + (x - bx) * alpha;
            local.scale_y = by + (y - by) * alpha;
        }
        (MixDirection::In, MixBlend::First | MixBlend::Replace) => {
            let bx = local.scale_x.abs() * signum(x);
            let by = local.scale_y.abs() * signum(y);
            local.scale_x = bx + (x - bx) * alpha;
            local.scale_y = by + (y - by) * alpha;
        }
        (MixDirection::In, MixBlend::Add) => {
            let bx = signum(x);
            let by = signum(y);
            local.scale_x = local.scale_x.abs() * bx + (x - setup_x.abs() * bx) * alpha;
            local.scale_y = local.scale_y.abs() * by + (y - setup_y.abs() * by) * alpha;
        }
    }
}

pub(crate) fn apply_shear(
    timeline: &ShearTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone) else {
        return;
    };
    if !bone.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.bones[timeline.bone];
    let local = &mut bone.local;

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => {
                local.shear_x = setup.shear_x;
                local.shear_y = setup.shear_y;
            }
            MixBlend::First => {
                local.shear_x += (setup.shear_x - local.shear_x) * alpha;
                local.shear_y += (setup.shear_y - local.shear_y) * alpha;
            }
            _ => {}
        }
        return;
    }

    let [x, y] = timeline.sample(time);
    match blend {
        MixBlend::Setup => {
            local.shear_x = setup.shear_x + x * alpha;
            local.shear_y = setup.shear_y + y * alpha;
        }
        MixBlend::First | MixBlend::Replace => {
            local.shear_x += (setup.shear_x + x - local.shear_x) * alpha;
            local.shear_y += (setup.shear_y + y - local.shear_y) * alpha;
        }
        MixBlend::Add => {
            local.shear_x += x * alpha;
            local.shear_y += y * alpha;
        }
    }
}

fn slot_bone_active(skeleton: &Skeleton, slot: usize) -> bool {
    skeleton
        .slots
        .get(slot)
        .and_then(|slot| skeleton.bones.get(slot.bone))
        .is_some_and(|bone| bone.active)
}

fn mix_into<const N: usize>(current: &mut [f32; N], target: &[f32], alpha: f32) {
    for (c, &t) in current.iter_mut().zip(target) {
        *c += (t - *c) * alpha;
    }
}

pub(crate) fn apply_color(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot) || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = skeleton.data.slots[timeline.slot].color;
    let slot = &mut skeleton.slots[timeline.slot];

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => slot.color = setup,
            MixBlend::First => mix_into(&mut slot.color, &setup, alpha),
            _ => {}
        }
        return;
    }

    let color = timeline.sample(time);
    if alpha == 1.0 {
        slot.color = color;
    } else {
        if blend == MixBlend::Setup {
            slot.color = setup;
        }
        mix_into(&mut slot.color, &color, alpha);
    }
}

pub(crate) fn apply_two_color(
    timeline: &TwoColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot) || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.slots[timeline.slot];
    let (setup_light, setup_dark) = (setup.color, setup.dark_color);
    let slot = &mut skeleton.slots[timeline.slot];

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => {
                slot.color = setup_light;
                slot.dark_color = setup_dark;
            }
            MixBlend::First => {
                mix_into(&mut slot.color, &setup_light, alpha);
                mix_into(&mut slot.dark_color, &setup_dark, alpha);
            }
            _ => {}
        }
        return;
    }

    let (light, dark) = timeline.sample(time);
    if alpha == 1.0 {
        slot.color = light;
        slot.dark_color = dark;
    } else {
        if blend == MixBlend::Setup {
            slot.color = setup_light;
            slot.dark_color = setup_dark;
        }
        mix_into(&mut slot.color, &light, alpha);
        mix_into(&mut slot.dark_color, &dark, alpha);
    }
}

fn set_attachment_by_name(skeleton: &mut Skeleton, slot: usize, name: Option<&str>) {
    let key = name.and_then(|name| skeleton.resolve_attachment(slot, name));
    skeleton.set_slot_attachment(slot, key);
}

fn set_setup_attachment(skeleton: &mut Skeleton, slot: usize) {
    let data = Arc::clone(&skeleton.data);
    set_attachment_by_name(skeleton, slot, data.slots[slot].attachment.as_deref());
}

pub(crate) fn apply_attachment(
    timeline: &AttachmentTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    if !slot_bone_active(skeleton, timeline.slot) {
        return;
    }
    if direction == MixDirection::Out && blend == MixBlend::Setup {
        set_setup_attachment(skeleton, timeline.slot);
        return;
    }

    match timeline.sample(time) {
        Some(name) => set_attachment_by_name(skeleton, timeline.slot, name),
        None => {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                set_setup_attachment(skeleton, timeline.slot);
            }
        }
    }
}

pub(crate) fn apply_deform(
    timeline: &DeformTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    mut blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot) || timeline.frames.is_empty() {
        return;
    }
    let data = Arc::clone(&skeleton.data);
    let Some(key) = skeleton.slots[timeline.slot].attachment.as_ref() else {
        return;
    };
    let Some(attachment) = data
        .skins
        .get(key.skin)
        .and_then(|skin| skin.attachment(timeline.slot, &key.name))
    else {
        return;
    };
    if attachment.deform_attachment() != Some(timeline.attachment.as_str()) {
        return;
    }
    let Some(vertex) = attachment.vertex_data() else {
        return;
    };
    // Unweighted deforms are absolute positions and blend against the setup vertices.
    let setup = (!vertex.is_weighted()).then_some(vertex.vertices.as_slice());

    let vertex_count = timeline.vertex_count();
    let deform = &mut skeleton.slots[timeline.slot].deform;
    if deform.is_empty() {
        blend = MixBlend::Setup;
    }

    let Some(frame) = search_times(&timeline.frames, time) else {
        match blend {
            MixBlend::Setup => deform.clear(),
            MixBlend::First => {
                if alpha == 1.0 {
                    deform.clear();
                    return;
                }
                deform.resize(vertex_count, 0.0);
                match setup {
                    Some(setup) => {
                        for (d, &s) in deform.iter_mut().zip(setup) {
                            *d += (s - *d) * alpha;
                        }
                    }
                    None => deform.iter_mut().for_each(|d| *d *= 1.0 - alpha),
                }
            }
            _ => {}
        }
        return;
    };

    let (prev, next, percent) = timeline.bracket(frame, time);
    deform.resize(vertex_count, 0.0);
    let keyed = |i: usize| prev[i] + (next[i] - prev[i]) * percent;
    let setup_at = |i: usize| setup.and_then(|s| s.get(i).copied()).unwrap_or(0.0);
    let count = vertex_count.min(prev.len()).min(next.len());

    if alpha == 1.0 {
        for (i, d) in deform.iter_mut().enumerate().take(count) {
            *d = match blend {
                MixBlend::Add => *d + keyed(i) - setup_at(i),
                _ => keyed(i),
            };
        }
        return;
    }
    for (i, d) in deform.iter_mut().enumerate().take(count) {
        *d = match blend {
            MixBlend::Setup => {
                let s = setup_at(i);
                s + (keyed(i) - s) * alpha
            }
            MixBlend::First | MixBlend::Replace => *d + (keyed(i) - *d) * alpha,
            MixBlend::Add => *d + (keyed(i) - setup_at(i)) * alpha,
        };
    }
}

pub(crate) fn apply_draw_order(
    timeline: &DrawOrderTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let slot_count = skeleton.slots.len();
    let reset = |skeleton: &mut Skeleton| {
        skeleton.draw_order.clear();
        skeleton.draw_order.extend(0..slot_count);
    };
    if direction == MixDirection::Out && blend == MixBlend::Setup {
        reset(skeleton);
        return;
    }

    match timeline.sample(time) {
        None => {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                reset(skeleton);
            }
        }
        Some(Some(order)) if order.len() == slot_count => {
            skeleton.draw_order.clear();
            skeleton.draw_order.extend_from_slice(order);
        }
        Some(_) => reset(skeleton),
    }
}

pub(crate) fn apply_ik_constraint(
    timeline: &IkConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(constraint) = skeleton.ik_constraints.get_mut(timeline.constraint) else {
        return;
    };
    if !constraint.active {
        return;
    }
    let setup = &skeleton.data.ik_constraints[timeline.constraint];

    let Some(frame) = timeline.curve.search(time) else {
        match blend {
            MixBlend::Setup => {
                constraint.mix = setup.mix;
                constraint.softness = setup.softness;
            }
            MixBlend::First => {
                constraint.mix += (setup.mix - constraint.mix) * alpha;
                constraint.softness += (setup.softness - constraint.softness) * alpha;
            }
            _ => return,
        }
        constraint.bend_direction = setup.bend_direction;
        constraint.compress = setup.compress;
        constraint.stretch = setup.stretch;
        return;
    };

    let (mix, softness) = timeline.sample(time);
    let stepped = (
        timeline.bend_directions.get(frame).copied().unwrap_or(1),
        timeline.compress.get(frame).copied().unwrap_or(false),
        timeline.stretch.get(frame).copied().unwrap_or(false),
    );
    if blend == MixBlend::Setup {
        constraint.mix = setup.mix + (mix - setup.mix) * alpha;
        constraint.softness = setup.softness + (softness - setup.softness) * alpha;
        let (bend, compress, stretch) = match direction {
            MixDirection::Out => (setup.bend_direction, setup.compress, setup.stretch),
            MixDirection::In => stepped,
        };
        constraint.bend_direction = bend;
        constraint.compress = compress;
        constraint.stretch = stretch;
    } else {
        constraint.mix += (mix - constraint.mix) * alpha;
        constraint.softness += (softness - constraint.softness) * alpha;
        if direction == MixDirection::In {
            (
                constraint.bend_direction,
                constraint.compress,
                constraint.stretch,
            ) = stepped;
        }
    }
}

pub(crate) fn apply_transform_constraint(
    timeline: &TransformConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.transform_constraints.get_mut(timeline.constraint) else {
        return;
    };
    if !constraint.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.transform_constraints[timeline.constraint];
    let setup_mixes = [
        setup.rotate_mix,
        setup.translate_mix,
        setup.scale_mix,
        setup.shear_mix,
    ];
    let mut current = [
        constraint.rotate_mix,
        constraint.translate_mix,
        constraint.scale_mix,
        constraint.shear_mix,
    ];

    if before_first(&timeline.curve, time) {
        match blend {
            MixBlend::Setup => current = setup_mixes,
            MixBlend::First => mix_into(&mut current, &setup_mixes, alpha),
            _ => return,
        }
    } else {
        let sampled = timeline.sample(time);
        if blend == MixBlend::Setup {
            current = setup_mixes;
        }
        mix_into(&mut current, &sampled, alpha);
    }

    [
        constraint.rotate_mix,
        constraint.translate_mix,
        constraint.scale_mix,
        constraint.shear_mix,
    ] = current;
}

/// Shared blend rule for scalar constraint properties keyed as absolute values.
fn mix_scalar(current: f32, setup: f32, value: Option<f32>, alpha: f32, blend: MixBlend) -> f32 {
    match value {
        None => match blend {
            MixBlend::Setup => setup,
            MixBlend::First => current + (setup - current) * alpha,
            _ => current,
        },
        Some(value) => match blend {
            MixBlend::Setup => setup + (value - setup) * alpha,
            _ => current + (value - current) * alpha,
        },
    }
}

pub(crate) fn apply_path_position(
    timeline: &PathConstraintPositionTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(timeline.constraint) else {
        return;
    };
    if !constraint.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = skeleton.data.path_constraints[timeline.constraint].position;
    let value = (!before_first(&timeline.curve, time)).then(|| timeline.sample(time));
    constraint.position = mix_scalar(constraint.position, setup, value, alpha, blend);
}

pub(crate) fn apply_path_spacing(
    timeline: &PathConstraintSpacingTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(timeline.constraint) else {
        return;
    };
    if !constraint.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = skeleton.data.path_constraints[timeline.constraint].spacing;
    let value = (!before_first(&timeline.curve, time)).then(|| timeline.sample(time));
    constraint.spacing = mix_scalar(constraint.spacing, setup, value, alpha, blend);
}

pub(crate) fn apply_path_mix(
    timeline: &PathConstraintMixTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(timeline.constraint) else {
        return;
    };
    if !constraint.active || timeline.curve.frame_count() == 0 {
        return;
    }
    let setup = &skeleton.data.path_constraints[timeline.constraint];
    let sampled = (!before_first(&timeline.curve, time)).then(|| timeline.sample(time));
    constraint.rotate_mix = mix_scalar(
        constraint.rotate_mix,
        setup.rotate_mix,
        sampled.map(|[rotate, _]| rotate),
        alpha,
        blend,
    );
    constraint.translate_mix = mix_scalar(
        constraint.translate_mix,
        setup.translate_mix,
        sampled.map(|[_, translate]| translate),
        alpha,
        blend,
    );
}
