//! # Driver Channel
//!
//! The point-to-point link between the authoritative worker and the external
//! driver. Transports implement [`DriverChannel`]; the engine never looks past it.
//!
//! - [`StreamChannel`] speaks the fixed-width [`wire`] format over any byte stream,
//!   with [`TcpChannel`] as the network transport.
//! - [`MemoryChannel`] exchanges typed frames in-process, for embedding and tests.

mod memory;
mod stream;
pub mod wire;

pub use memory::{MemoryChannel, memory_pair};
pub use stream::{StreamChannel, TcpChannel};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("I/O error on driver channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("Driver channel closed by peer")]
    Closed,

    #[error("Command '{command}' exceeds the {max}-byte command width")]
    CommandTooLong { command: String, max: usize },

    #[error("Malformed command token '{0}'")]
    MalformedCommand(String),

    #[error("Expected a {expected} frame but received a {found} frame")]
    UnexpectedFrame {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Expected {expected} values but received {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Command and payload exchange with the peer on the other end of the link.
///
/// The trait is symmetric: the engine receives commands and the driver sends
/// them, over the same operations.
pub trait DriverChannel {
    fn recv_command(&mut self) -> Result<String, ChannelError>;

    fn send_command(&mut self, command: &str) -> Result<(), ChannelError>;

    fn send_i32s(&mut self, values: &[i32]) -> Result<(), ChannelError>;

    fn recv_i32s(&mut self, count: usize) -> Result<Vec<i32>, ChannelError>;

    fn send_f64s(&mut self, values: &[f64]) -> Result<(), ChannelError>;

    fn recv_f64s(&mut self, count: usize) -> Result<Vec<f64>, ChannelError>;
}

impl<T: DriverChannel + ?Sized> DriverChannel for &mut T {
    fn recv_command(&mut self) -> Result<String, ChannelError> {
        (**self).recv_command()
    }

    fn send_command(&mut self, command: &str) -> Result<(), ChannelError> {
        (**self).send_command(command)
    }

    fn send_i32s(&mut self, values: &[i32]) -> Result<(), ChannelError> {
        (**self).send_i32s(values)
    }

    fn recv_i32s(&mut self, count: usize) -> Result<Vec<i32>, ChannelError> {
        (**self).recv_i32s(count)
    }

    fn send_f64s(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        (**self).send_f64s(values)
    }

    fn recv_f64s(&mut self, count: usize) -> Result<Vec<f64>, ChannelError> {
        (**self).recv_f64s(count)
    }
}
