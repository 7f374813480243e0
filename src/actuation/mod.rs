mod command;
mod serial;
mod state;

pub use command::ServoCommand;
pub use serial::{discover_port, ServoChannel, BAUD_RATE, RESET_DELAY, SETTLE_DELAY};
pub use state::Actuator;

use crate::error::LinkError;

/// Trait for links to the servo controller
pub trait ActuatorLink {
    /// Transmit a command and wait for the controller to act on it
    ///
    /// # Returns
    /// * The controller's acknowledgement line, if one arrived
    fn send(&mut self, command: ServoCommand) -> Result<Option<String>, LinkError>;

    /// Whether the link is currently usable
    fn is_open(&self) -> bool;
}
