use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{attachment}' for slot '{slot}'")]
    UnknownAttachment { slot: String, attachment: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("bone '{bone}' has parent index {parent}, which does not precede it")]
    InvalidBoneParent { bone: String, parent: usize },

    #[error("unknown bone index {index} referenced by {context}")]
    UnknownBoneIndex { context: String, index: usize },

    #[error("unknown slot index {index} referenced by {context}")]
    UnknownSlotIndex { context: String, index: usize },

    #[error("unknown {kind} constraint index {index} referenced by {context}")]
    UnknownConstraintIndex {
        context: String,
        kind: &'static str,
        index: usize,
    },

    #[error("{kind} constraint '{constraint}' has no constrained bones")]
    EmptyConstraintBones {
        kind: &'static str,
        constraint: String,
    },

    #[error("ik constraint '{constraint}' constrains {count} bones (expected 1 or 2)")]
    InvalidIkBoneCount { constraint: String, count: usize },

    #[error("constraint order {order} is shared by '{first}' and '{second}'")]
    DuplicateConstraintOrder {
        order: i32,
        first: String,
        second: String,
    },

    #[error("constraint '{constraint}' has order {order}, outside 0..{count}")]
    ConstraintOrderOutOfRange {
        constraint: String,
        order: i32,
        count: usize,
    },

    #[error("animation '{animation}' has invalid duration {duration}")]
    InvalidAnimationDuration { animation: String, duration: f32 },

    #[error("invalid {timeline} timeline in animation '{animation}': {message}")]
    InvalidTimeline {
        animation: String,
        timeline: &'static str,
        message: String,
    },

    #[cfg(feature = "json")]
    #[error("failed to parse skeleton JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("unsupported or invalid skeleton version string: {value}")]
    JsonVersion { value: String },

    #[cfg(feature = "json")]
    #[error("invalid color '{value}' for {context}")]
    JsonInvalidColor { context: String, value: String },

    #[cfg(feature = "json")]
    #[error("invalid curve for {context}: {message}")]
    JsonInvalidCurve { context: String, message: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by {context}")]
    JsonUnknownBone { context: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown slot '{slot}' referenced by {context}")]
    JsonUnknownSlot { context: String, slot: String },

    #[cfg(feature = "json")]
    #[error("unknown {kind} constraint '{constraint}' referenced by {context}")]
    JsonUnknownConstraint {
        context: String,
        kind: &'static str,
        constraint: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown skin '{skin}' referenced by {context}")]
    JsonUnknownSkin { context: String, skin: String },

    #[cfg(feature = "json")]
    #[error("unknown event '{event}' referenced by animation '{animation}'")]
    JsonUnknownEvent { animation: String, event: String },

    #[cfg(feature = "json")]
    #[error("unknown attachment '{attachment}' referenced by {context}")]
    JsonUnknownAttachment { context: String, attachment: String },

    #[cfg(feature = "json")]
    #[error("unsupported {kind} '{value}' for {context}")]
    JsonUnsupportedValue {
        context: String,
        kind: &'static str,
        value: String,
    },

    #[cfg(feature = "json")]
    #[error("invalid vertex data for {context}: {message}")]
    JsonInvalidVertices { context: String, message: String },
}
