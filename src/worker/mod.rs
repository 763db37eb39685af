pub mod scheduler;

pub use scheduler::{next_fire_time, Scheduler, SchedulerState, SweepSummary};
