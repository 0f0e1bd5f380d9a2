//! Pure Rust pose evaluation for 2D skeletal rigs exported in the 3.x JSON format.
//!
//! Given immutable rig data ([`SkeletonData`]) and a playback time, a [`Skeleton`] computes bone
//! world transforms, slot attachment and color state, and draw order. IK, transform and path
//! constraints are solved in a dependency-respecting order rebuilt by [`Skeleton::update_cache`].
//!
//! The crate is renderer-agnostic: attachments carry geometry only.

#![forbid(unsafe_code)]

mod attachment;
mod error;
pub mod math;
mod model;
mod runtime;
mod version;

#[cfg(feature = "json")]
pub mod json;

pub use attachment::*;
pub use error::*;
pub use math::{Affine, LocalTransform};
pub use model::*;
pub use runtime::*;
pub use version::*;

#[cfg(test)]
mod math_tests;

#[cfg(test)]
mod attachment_tests;


#[cfg(all(test, feature = "json"))]
mod json_tests;
