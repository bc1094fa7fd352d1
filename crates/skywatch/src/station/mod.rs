//! Station controller and the frames it produces.

pub mod controller;
pub mod frame;
pub mod session;

pub use controller::{Station, Surface};
pub use frame::{ConnectionState, DisplayFrame, Notice};
pub use session::{SessionState, SessionTrigger};
