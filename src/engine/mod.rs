//! Core engine: the paced step loop and the session lifecycle around it.

pub mod lifecycle;
pub mod pacer;
pub mod stepper;
pub mod supervisor;

pub use lifecycle::{SessionController, SessionReport};
pub use supervisor::Supervisor;
