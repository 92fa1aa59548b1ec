//! Printer watching subsystem - lifecycle tracking, notification policy and the poll loop

mod lifecycle;
mod policy;
mod scheduler;

pub use lifecycle::{CooldownPolicy, LifecycleTracker, TrackedDeviceRecord, Transition, TransitionKind};
pub use policy::{NotificationPolicy, NotifyDecision};
pub use scheduler::{Device, DeviceOutcome, Pipeline, Scheduler};
