//! Mathematical utilities: the least squares line fit used by every stage and
//! the group fan-out helper.

pub mod ols;
pub mod parallel;

pub use ols::*;
pub use parallel::map_groups;
