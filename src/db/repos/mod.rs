mod activity;
mod purge;

pub use activity::*;
pub use purge::*;
