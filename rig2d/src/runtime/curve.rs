//! Keyframe interpolation: per-segment, per-component curves and interleaved keyframe storage.

/// Floats stored per Bezier curve: nine `(x, y)` samples of the normalized curve.
pub const BEZIER_SIZE: usize = 18;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum CurveKind {
    #[default]
    Linear,
    Stepped,
    /// Index of the curve's samples in the Bezier table.
    Bezier(usize),
}

/// Interpolation for every (segment, component) pair of a timeline.
///
/// A segment is the span from one keyframe to the next and is addressed by its left keyframe.
/// Bezier storage is allocated up front for the largest number of curves the authoring data
/// could need, then [`CurveTable::shrink`] drops the unused tail.
#[derive(Clone, Debug, Default)]
pub struct CurveTable {
    components: usize,
    kinds: Vec<CurveKind>,
    beziers: Vec<f32>,
}

impl CurveTable {
    pub fn new(frame_count: usize, components: usize, bezier_count: usize) -> Self {
        Self {
            components,
            kinds: vec![CurveKind::Linear; frame_count * components],
            beziers: vec![0.0; bezier_count * BEZIER_SIZE],
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn bezier_count(&self) -> usize {
        self.beziers.len() / BEZIER_SIZE
    }

    pub fn kind(&self, frame: usize, component: usize) -> CurveKind {
        self.kinds
            .get(frame * self.components + component)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_linear(&mut self, frame: usize, component: usize) {
        self.set_kind(frame, component, CurveKind::Linear);
    }

    pub fn set_stepped(&mut self, frame: usize, component: usize) {
        self.set_kind(frame, component, CurveKind::Stepped);
    }

    fn set_kind(&mut self, frame: usize, component: usize, kind: CurveKind) {
        if let Some(slot) = self.kinds.get_mut(frame * self.components + component) {
            *slot = kind;
        }
    }

    /// Stores Bezier curve number `bezier` for one segment component. Control points are
    /// normalized: `x` is the fraction of the segment's duration and `y` the fraction of its value
    /// change (which may overshoot `[0, 1]`).
    ///
    /// Returns `false` when `bezier` is past the allocated storage.
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        component: usize,
        [cx1, cy1, cx2, cy2]: [f32; 4],
    ) -> bool {
        let start = bezier * BEZIER_SIZE;
        let Some(samples) = self.beziers.get_mut(start..start + BEZIER_SIZE) else {
            return false;
        };

        let cx1 = cx1.clamp(0.0, 1.0);
        let cx2 = cx2.clamp(0.0, 1.0);
        let tmpx = (-cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (-cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 + 1.0) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 + 1.0) * 0.006;
        let mut ddx = tmpx * 2.0 + dddx;
        let mut ddy = tmpy * 2.0 + dddy;
        let mut dx = cx1 * 0.3 + tmpx + dddx * 0.166_666_67;
        let mut dy = cy1 * 0.3 + tmpy + dddy * 0.166_666_67;
        let mut x = dx;
        let mut y = dy;
        for sample in samples.chunks_exact_mut(2) {
            sample[0] = x;
            sample[1] = y;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }

        self.set_kind(frame, component, CurveKind::Bezier(bezier));
        true
    }

    /// Drops Bezier storage beyond the first `bezier_count` curves.
    pub fn shrink(&mut self, bezier_count: usize) {
        self.beziers.truncate(bezier_count * BEZIER_SIZE);
        self.beziers.shrink_to_fit();
        let limit = bezier_count;
        for kind in &mut self.kinds {
            if matches!(kind, CurveKind::Bezier(index) if *index >= limit) {
                *kind = CurveKind::Linear;
            }
        }
    }

    /// Eases `fraction` (the normalized time within a segment, clamped to `[0, 1]`) into the
    /// fraction of the segment's value change to apply.
    pub fn percent(&self, frame: usize, component: usize, fraction: f32) -> f32 {
        let x = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        match self.kind(frame, component) {
            CurveKind::Linear => x,
            CurveKind::Stepped => 0.0,
            CurveKind::Bezier(index) => {
                let start = index * BEZIER_SIZE;
                let Some(samples) = self.beziers.get(start..start + BEZIER_SIZE) else {
                    return x;
                };
                bezier_percent(samples, x)
            }
        }
    }
}

/// Piecewise-linear lookup over a curve's samples, anchored at `(0, 0)` and `(1, 1)`.
fn bezier_percent(samples: &[f32], x: f32) -> f32 {
    let mut prev_x = 0.0f32;
    let mut prev_y = 0.0f32;
    for sample in samples.chunks_exact(2) {
        if sample[0] >= x {
            return lerp_segment(prev_x, prev_y, sample[0], sample[1], x);
        }
        prev_x = sample[0];
        prev_y = sample[1];
    }
    lerp_segment(prev_x, prev_y, 1.0, 1.0, x)
}

fn lerp_segment(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    let span = x2 - x1;
    if span <= f32::EPSILON {
        return y2;
    }
    y1 + (x - x1) / span * (y2 - y1)
}

/// Index of the last keyframe whose time is at or before `time`, or `None` before the first.
pub(crate) fn search_times(times: &[f32], time: f32) -> Option<usize> {
    times.partition_point(|&t| t <= time).checked_sub(1)
}

/// Keyframes for one property group, stored interleaved as `[time, v0, v1, ...]` per frame.
#[derive(Clone, Debug, Default)]
pub struct CurveTimeline {
    entries: usize,
    frames: Vec<f32>,
    curves: CurveTable,
}

impl CurveTimeline {
    pub fn new(frame_count: usize, components: usize, bezier_count: usize) -> Self {
        Self {
            entries: components + 1,
            frames: vec![0.0; frame_count * (components + 1)],
            curves: CurveTable::new(frame_count, components, bezier_count),
        }
    }

    pub fn components(&self) -> usize {
        self.entries - 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.entries
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn curves(&self) -> &CurveTable {
        &self.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveTable {
        &mut self.curves
    }

    /// Sets a keyframe's time and component values. Missing values are left unchanged.
    pub fn set_frame(&mut self, frame: usize, time: f32, values: &[f32]) {
        let start = frame * self.entries;
        let Some(entry) = self.frames.get_mut(start..start + self.entries) else {
            return;
        };
        entry[0] = time;
        for (dst, &value) in entry[1..].iter_mut().zip(values) {
            *dst = value;
        }
    }

    pub fn time(&self, frame: usize) -> f32 {
        self.frames
            .get(frame * self.entries)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn value(&self, frame: usize, component: usize) -> f32 {
        self.frames
            .get(frame * self.entries + 1 + component)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn first_time(&self) -> Option<f32> {
        self.frames.first().copied()
    }

    pub fn last_time(&self) -> Option<f32> {
        let count = self.frame_count();
        (count > 0).then(|| self.time(count - 1))
    }

    /// Index of the last keyframe at or before `time`, or `None` before the first keyframe.
    pub fn search(&self, time: f32) -> Option<usize> {
        let (mut low, mut high) = (0usize, self.frame_count());
        while low < high {
            let mid = (low + high) / 2;
            if self.time(mid) <= time {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low.checked_sub(1)
    }

    /// Interpolated value of one component. Before the first keyframe this is the first value;
    /// at or after the last it is the last value.
    pub fn sample_component(&self, time: f32, component: usize) -> f32 {
        let Some(frame) = self.search(time) else {
            return self.value(0, component);
        };
        let next = frame + 1;
        if next >= self.frame_count() {
            return self.value(frame, component);
        }
        let time1 = self.time(frame);
        let time2 = self.time(next);
        let fraction = if time2 > time1 {
            (time - time1) / (time2 - time1)
        } else {
            0.0
        };
        let value1 = self.value(frame, component);
        let value2 = self.value(next, component);
        value1 + (value2 - value1) * self.curves.percent(frame, component, fraction)
    }

    /// Samples every component into `out`.
    pub fn sample(&self, time: f32, out: &mut [f32]) {
        for (component, dst) in out.iter_mut().enumerate().take(self.components()) {
            *dst = self.sample_component(time, component);
        }
    }

    /// Checks that keyframe times never decrease.
    pub fn validate(&self) -> Result<(), String> {
        validate_times((0..self.frame_count()).map(|frame| self.time(frame)))
    }
}

pub(crate) fn validate_times(times: impl IntoIterator<Item = f32>) -> Result<(), String> {
    let mut previous = f32::NEG_INFINITY;
    for (frame, time) in times.into_iter().enumerate() {
        if !time.is_finite() {
            return Err(format!("keyframe {frame} has non-finite time {time}"));
        }
        if time < previous {
            return Err(format!(
                "keyframe {frame} at {time} is earlier than the previous keyframe at {previous}"
            ));
        }
        previous = time;
    }
    Ok(())
}
