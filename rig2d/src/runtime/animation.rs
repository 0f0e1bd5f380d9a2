use crate::{Error, Event, SkeletonData, Skeleton, Timeline};

/// How a timeline value combines with the pose it is applied to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    /// Blend between the setup pose and the timeline value. Before the first keyframe the setup
    /// pose is restored.
    Setup,
    /// Blend between the current pose and the timeline value. Before the first keyframe the pose
    /// eases back towards the setup pose.
    First,
    /// Blend between the current pose and the timeline value. Before the first keyframe the pose is
    /// left alone.
    Replace,
    /// Add the weighted timeline offset to the current pose.
    Add,
}

/// Whether the animation is being mixed in or out. Mixing out with [`MixBlend::Setup`] restores
/// setup attachments and draw order; IK bend direction, compress and stretch only key when mixing
/// in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

/// A named clip: a set of timelines sharing one duration.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    pub timelines: Vec<Timeline>,
}

impl Animation {
    pub fn new(
        name: impl Into<String>,
        timelines: Vec<Timeline>,
        duration: f32,
    ) -> Result<Self, Error> {
        let name = name.into();
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidAnimationDuration {
                animation: name,
                duration,
            });
        }
        Ok(Self {
            name,
            duration,
            timelines,
        })
    }

    /// Builds an animation whose duration is the latest keyframe time of any timeline.
    pub fn with_computed_duration(
        name: impl Into<String>,
        timelines: Vec<Timeline>,
    ) -> Result<Self, Error> {
        let duration = timelines
            .iter()
            .map(Timeline::last_time)
            .fold(0.0f32, f32::max);
        Self::new(name, timelines, duration)
    }

    pub(crate) fn validate(&self, data: &SkeletonData) -> Result<(), Error> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::InvalidAnimationDuration {
                animation: self.name.clone(),
                duration: self.duration,
            });
        }
        for timeline in &self.timelines {
            timeline
                .validate(data)
                .map_err(|message| Error::InvalidTimeline {
                    animation: self.name.clone(),
                    timeline: timeline.kind_name(),
                    message,
                })?;
        }
        Ok(())
    }

    /// Applies every timeline at `time`.
    ///
    /// When `looped` and the duration is positive, both times wrap into `[0, duration)`; events
    /// keyed in `(last_time, time]` are appended to `events`, including those crossed by the wrap.
    /// Pass a negative `last_time` to also fire events keyed exactly at the start.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        looped: bool,
        events: &mut Vec<Event>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let (mut last_time, mut time) = (last_time, time);
        if looped && self.duration > 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }

        for timeline in &self.timelines {
            timeline.apply(skeleton, last_time, time, events, alpha, blend, direction);
        }
    }
}
