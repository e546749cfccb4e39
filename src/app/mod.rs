pub mod controller;
pub mod readiness;
pub mod timer;

pub use controller::{AppController, AppOptions};
pub use readiness::wait_for_host;
pub use timer::{PeerOutcome, TimerController, TimerPorts};
