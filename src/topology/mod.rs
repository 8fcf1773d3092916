//! Network topology synthesis.
//!
//! - [`synthesizer`] - partition a VPC block into public/private pairs per zone
//! - [`validate`] - invariant checks over a computed plan

mod synthesizer;
mod validate;

pub use synthesizer::{compute_subnet_plan, compute_subnet_plan_for_block};
pub use validate::{check_plan, check_zone_rotation};
