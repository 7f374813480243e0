use super::command::ServoCommand;
use crate::classify::SizeClass;

/// Edge-triggered actuation state
///
/// Remembers the last class sent to the servos. A command is produced only
/// when a frame's dominant class is present and differs from that class;
/// frames without a dominant class leave the state untouched.
#[derive(Debug, Clone, Default)]
pub struct Actuator {
    state: Option<SizeClass>,
    last_command: Option<ServoCommand>,
}

impl Actuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last class actuated, `None` until the first transition
    pub fn state(&self) -> Option<SizeClass> {
        self.state
    }

    pub fn last_command(&self) -> Option<ServoCommand> {
        self.last_command
    }

    /// Feed one frame's dominant class, returning the command to send if any
    pub fn update(&mut self, dominant: Option<SizeClass>) -> Option<ServoCommand> {
        let class = dominant?;
        if self.state == Some(class) {
            return None;
        }

        let command = ServoCommand::from(class);
        tracing::info!(
            "State changed: {} -> {} (servos {})",
            self.state.map_or("NONE", SizeClass::label),
            class,
            command
        );
        self.state = Some(class);
        self.last_command = Some(command);
        Some(command)
    }
}
