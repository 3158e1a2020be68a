pub mod lifecycle;
pub mod store;
pub mod timers;

pub use lifecycle::{spawn_sweeper, SweepPolicy};
pub use store::{SessionHandle, SessionStore};
pub use timers::{InactivityTimers, TimerExpired};
