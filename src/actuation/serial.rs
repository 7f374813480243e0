use super::command::ServoCommand;
use super::ActuatorLink;
use crate::error::LinkError;
use serialport::{DataBits, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Controller line speed
pub const BAUD_RATE: u32 = 9600;
/// Timeout for reading the acknowledgement line
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause after each command so the controller can act on it
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Pause after opening the port while the controller resets
pub const RESET_DELAY: Duration = Duration::from_secs(2);

/// Byte stream to the controller that can report buffered input
pub trait Port: Read + Write {
    /// Number of inbound bytes ready to read without blocking
    fn pending(&self) -> io::Result<u32>;
}

impl Port for Box<dyn SerialPort> {
    fn pending(&self) -> io::Result<u32> {
        SerialPort::bytes_to_read(&**self).map_err(io::Error::from)
    }
}

/// Line-oriented command channel to the servo controller
///
/// Owns the port exclusively; the port is released on `close` or drop.
pub struct ServoChannel<P: Port> {
    port: Option<P>,
    name: String,
    settle: Duration,
}

impl ServoChannel<Box<dyn SerialPort>> {
    /// Open a serial device at `baud`, 8N1, and wait for the controller reset
    pub fn open(path: &str, baud: u32, reset_delay: Duration) -> Result<Self, LinkError> {
        tracing::info!("Opening serial port {} at {} baud", path, baud);

        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| LinkError::Open {
                port: path.to_string(),
                source,
            })?;

        std::thread::sleep(reset_delay);
        tracing::info!("Serial link to {} ready", path);

        Ok(Self::with_port(port, path))
    }
}

impl<P: Port> ServoChannel<P> {
    pub fn with_port(port: P, name: impl Into<String>) -> Self {
        Self {
            port: Some(port),
            name: name.into(),
            settle: SETTLE_DELAY,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a raw angle pair
    pub fn send_angles(&mut self, servo_a: u16, servo_b: u16) -> Result<Option<String>, LinkError> {
        let command = ServoCommand::new(servo_a, servo_b)?;
        self.send(command)
    }

    /// Release the port; later sends fail with `LinkError::Closed`
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.name);
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;
        let written = port
            .write_all(line.as_bytes())
            .and_then(|()| port.flush());

        if let Err(e) = written {
            tracing::error!("Write to {} failed: {}", self.name, e);
            self.port = None;
            return Err(LinkError::Write(e));
        }
        Ok(())
    }

    /// Read one acknowledgement line if the controller has sent anything
    ///
    /// A timeout before the newline means no acknowledgement. Any other read
    /// failure releases the port.
    fn read_ack(&mut self) -> Result<Option<String>, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;
        match read_line(port) {
            Ok(ack) => Ok(ack),
            Err(e) => {
                tracing::error!("Read from {} failed: {}", self.name, e);
                self.port = None;
                Err(LinkError::Read(e))
            }
        }
    }
}

fn read_line<P: Port>(port: &mut P) -> io::Result<Option<String>> {
    if port.pending()? == 0 {
        return Ok(None);
    }

    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => line.push(byte[0]),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                tracing::debug!("Acknowledgement read timed out");
                return Ok(None);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    let ack = String::from_utf8_lossy(&line).trim().to_string();
    Ok((!ack.is_empty()).then_some(ack))
}

impl<P: Port> ActuatorLink for ServoChannel<P> {
    fn send(&mut self, command: ServoCommand) -> Result<Option<String>, LinkError> {
        self.write_line(&command.to_line())?;
        std::thread::sleep(self.settle);

        let ack = self.read_ack()?;
        if let Some(ack) = &ack {
            tracing::info!("Controller: {}", ack);
        }
        Ok(ack)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl<P: Port> Drop for ServoChannel<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Find the serial device the controller is most likely attached to
pub fn discover_port() -> Result<String, LinkError> {
    let ports = serialport::available_ports().unwrap_or_else(|e| {
        tracing::warn!("Failed to enumerate serial ports: {}", e);
        Vec::new()
    });
    tracing::debug!("Serial ports: {:?}", ports);
    pick_port(&ports).ok_or(LinkError::NoPortFound)
}

/// USB adapters first, then anything named like an ACM/USB tty
fn pick_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .or_else(|| {
            ports
                .iter()
                .find(|p| p.port_name.contains("ACM") || p.port_name.contains("USB"))
        })
        .map(|p| p.port_name.clone())
}
