mod animation;
mod bone;
mod curve;
mod ik;
pub(crate) mod path_constraint;
mod skeleton;
mod timeline;
mod transform_constraint;
mod update_order;

pub use animation::*;
pub use bone::*;
pub use curve::*;
pub use skeleton::*;
pub use timeline::*;

#[cfg(test)]
mod bone_tests;

#[cfg(test)]
mod curve_tests;


#[cfg(test)]
mod skeleton_tests;

#[cfg(test)]
mod ik_tests;
