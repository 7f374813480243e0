use crate::classify::SizeClass;
use crate::error::CommandError;
use std::fmt;

/// Largest angle a servo accepts, in degrees
pub const MAX_ANGLE: u16 = 180;

/// Target angles for the two sorting servos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    servo_a: u8,
    servo_b: u8,
}

impl ServoCommand {
    pub fn new(servo_a: u16, servo_b: u16) -> Result<Self, CommandError> {
        Ok(Self {
            servo_a: checked_angle(servo_a)?,
            servo_b: checked_angle(servo_b)?,
        })
    }

    /// Gate positions for a size class
    pub const fn for_class(class: SizeClass) -> Self {
        let (servo_a, servo_b) = match class {
            SizeClass::Small => (180, 180),
            SizeClass::Medium => (180, 90),
            SizeClass::Large => (90, 180),
        };
        Self { servo_a, servo_b }
    }

    pub fn servo_a(&self) -> u8 {
        self.servo_a
    }

    pub fn servo_b(&self) -> u8 {
        self.servo_b
    }

    /// Wire form: `"<a>,<b>\n"`
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl From<SizeClass> for ServoCommand {
    fn from(class: SizeClass) -> Self {
        Self::for_class(class)
    }
}

impl fmt::Display for ServoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.servo_a, self.servo_b)
    }
}

fn checked_angle(angle: u16) -> Result<u8, CommandError> {
    if angle > MAX_ANGLE {
        return Err(CommandError::AngleOutOfRange {
            angle,
            max: MAX_ANGLE,
        });
    }
    Ok(angle as u8)
}
