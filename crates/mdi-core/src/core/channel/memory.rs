use super::{ChannelError, DriverChannel};
use crossbeam_channel::{Receiver, Sender, unbounded};

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Command(String),
    I32(Vec<i32>),
    F64(Vec<f64>),
}

impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Command(_) => "command",
            Frame::I32(_) => "i32",
            Frame::F64(_) => "f64",
        }
    }
}

/// One end of an in-process link. Sends never block, so a driver script can be
/// queued in full before the engine starts reading it.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Creates a connected `(engine, driver)` pair.
pub fn memory_pair() -> (MemoryChannel, MemoryChannel) {
    let (to_driver, from_engine) = unbounded();
    let (to_engine, from_driver) = unbounded();
    (
        MemoryChannel {
            tx: to_driver,
            rx: from_driver,
        },
        MemoryChannel {
            tx: to_engine,
            rx: from_engine,
        },
    )
}

impl MemoryChannel {
    fn send(&self, frame: Frame) -> Result<(), ChannelError> {
        self.tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn recv(&self) -> Result<Frame, ChannelError> {
        self.rx.recv().map_err(|_| ChannelError::Closed)
    }

    /// Number of frames waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), ChannelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ChannelError::LengthMismatch { expected, actual })
    }
}

impl DriverChannel for MemoryChannel {
    fn recv_command(&mut self) -> Result<String, ChannelError> {
        match self.recv()? {
            Frame::Command(command) => Ok(command),
            other => Err(ChannelError::UnexpectedFrame {
                expected: "command",
                found: other.kind(),
            }),
        }
    }

    fn send_command(&mut self, command: &str) -> Result<(), ChannelError> {
        super::wire::encode_command(command)?;
        self.send(Frame::Command(command.to_string()))
    }

    fn send_i32s(&mut self, values: &[i32]) -> Result<(), ChannelError> {
        self.send(Frame::I32(values.to_vec()))
    }

    fn recv_i32s(&mut self, count: usize) -> Result<Vec<i32>, ChannelError> {
        match self.recv()? {
            Frame::I32(values) => {
                check_len(count, values.len())?;
                Ok(values)
            }
            other => Err(ChannelError::UnexpectedFrame {
                expected: "i32",
                found: other.kind(),
            }),
        }
    }

    fn send_f64s(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        self.send(Frame::F64(values.to_vec()))
    }

    fn recv_f64s(&mut self, count: usize) -> Result<Vec<f64>, ChannelError> {
        match self.recv()? {
            Frame::F64(values) => {
                check_len(count, values.len())?;
                Ok(values)
            }
            other => Err(ChannelError::UnexpectedFrame {
                expected: "f64",
                found: other.kind(),
            }),
        }
    }
}
