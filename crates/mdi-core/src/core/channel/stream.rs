use super::wire::{self, COMMAND_LENGTH};
use super::{ChannelError, DriverChannel};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use tracing::{debug, trace};

/// A [`DriverChannel`] over any blocking byte stream.
#[derive(Debug)]
pub struct StreamChannel<S> {
    stream: S,
}

pub type TcpChannel = StreamChannel<TcpStream>;

impl<S: Read + Write> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ChannelError> {
        let mut buffer = vec![0u8; len];
        self.stream.read_exact(&mut buffer).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                ChannelError::Closed
            } else {
                ChannelError::Io(e)
            }
        })?;
        Ok(buffer)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}

impl TcpChannel {
    /// Connects to a driver listening on `hostname:port`.
    pub fn connect(hostname: &str, port: u16) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect((hostname, port))?;
        stream.set_nodelay(true)?;
        debug!(hostname, port, "Connected to driver");
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> DriverChannel for StreamChannel<S> {
    fn recv_command(&mut self) -> Result<String, ChannelError> {
        let frame = self.read_exact(COMMAND_LENGTH)?;
        wire::decode_command(&frame)
    }

    fn send_command(&mut self, command: &str) -> Result<(), ChannelError> {
        let frame = wire::encode_command(command)?;
        self.write_all(&frame)
    }

    fn send_i32s(&mut self, values: &[i32]) -> Result<(), ChannelError> {
        trace!(count = values.len(), "Sending integers");
        self.write_all(&wire::encode_i32s(values))
    }

    fn recv_i32s(&mut self, count: usize) -> Result<Vec<i32>, ChannelError> {
        trace!(count, "Receiving integers");
        let bytes = self.read_exact(count * 4)?;
        Ok(wire::decode_i32s(&bytes))
    }

    fn send_f64s(&mut self, values: &[f64]) -> Result<(), ChannelError> {
        trace!(count = values.len(), "Sending doubles");
        self.write_all(&wire::encode_f64s(values))
    }

    fn recv_f64s(&mut self, count: usize) -> Result<Vec<f64>, ChannelError> {
        trace!(count, "Receiving doubles");
        let bytes = self.read_exact(count * 8)?;
        Ok(wire::decode_f64s(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn tcp_channel_exchanges_commands_and_payloads() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let driver = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut driver = StreamChannel::new(stream);
            driver.send_command("<NATOMS").unwrap();
            let natoms = driver.recv_i32s(1).unwrap();
            driver.send_command(">COORDS").unwrap();
            driver.send_f64s(&[0.5, -1.5, 2.25]).unwrap();
            natoms
        });

        let mut engine = TcpChannel::connect("127.0.0.1", port).unwrap();
        assert_eq!(engine.recv_command().unwrap(), "<NATOMS");
        engine.send_i32s(&[42]).unwrap();
        assert_eq!(engine.recv_command().unwrap(), ">COORDS");
        assert_eq!(engine.recv_f64s(3).unwrap(), vec![0.5, -1.5, 2.25]);

        assert_eq!(driver.join().unwrap(), vec![42]);
    }

    #[test]
    fn truncated_stream_reports_closed_channel() {
        let mut channel = StreamChannel::new(Cursor::new(b"EXIT".to_vec()));
        assert!(matches!(channel.recv_command(), Err(ChannelError::Closed)));
    }

    #[test]
    fn frames_written_to_a_stream_are_fixed_width() {
        let mut channel = StreamChannel::new(Cursor::new(Vec::new()));
        channel.send_command("STATUS").unwrap();
        channel.send_i32s(&[3]).unwrap();
        let bytes = channel.into_inner().into_inner();
        assert_eq!(bytes.len(), COMMAND_LENGTH + 4);
        assert_eq!(&bytes[..COMMAND_LENGTH], b"STATUS      ");
    }
}
