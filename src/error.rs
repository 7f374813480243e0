use std::io;
use thiserror::Error;

/// Failures of the serial link to the servo controller
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("no serial port found (looked for USB/ACM devices)")]
    NoPortFound,

    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to write command to controller: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read acknowledgement: {0}")]
    Read(#[source] io::Error),

    #[error("serial link is closed")]
    Closed,

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("servo angle {angle} outside 0..={max}")]
    AngleOutOfRange { angle: u16, max: u16 },
}
