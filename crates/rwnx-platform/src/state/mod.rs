//! State machine module.

pub mod machine;

pub use machine::{LifecycleContext, PlatformState, TransitionRejected};
