use super::{CommError, Communicator, ROOT};
use crossbeam_channel::{Receiver, Sender, unbounded};

#[derive(Debug)]
enum Packet {
    Bytes(Vec<u8>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::Bytes(_) => "byte",
            Packet::F64(_) => "f64",
            Packet::I32(_) => "i32",
        }
    }
}

/// One member of an in-process world of worker threads.
///
/// Each ordered pair of workers shares a dedicated FIFO channel, so collectives
/// issued in the same order on every worker pair up deterministically.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    outboxes: Vec<Option<Sender<Packet>>>,
    inboxes: Vec<Option<Receiver<Packet>>>,
}

impl ThreadComm {
    /// Creates a fully connected world; element `r` is the handle for rank `r`.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let mut outboxes: Vec<Vec<Option<Sender<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = unbounded();
                outboxes[src][dst] = Some(tx);
                inboxes[dst][src] = Some(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| ThreadComm {
                rank,
                size,
                outboxes,
                inboxes,
            })
            .collect()
    }

    fn send(&self, dst: usize, packet: Packet) -> Result<(), CommError> {
        self.outboxes[dst]
            .as_ref()
            .ok_or(CommError::Disconnected { peer: dst })?
            .send(packet)
            .map_err(|_| CommError::Disconnected { peer: dst })
    }

    fn recv(&self, src: usize) -> Result<Packet, CommError> {
        self.inboxes[src]
            .as_ref()
            .ok_or(CommError::Disconnected { peer: src })?
            .recv()
            .map_err(|_| CommError::Disconnected { peer: src })
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |&r| r != self.rank)
    }

    fn recv_f64(&self, src: usize) -> Result<Vec<f64>, CommError> {
        match self.recv(src)? {
            Packet::F64(data) => Ok(data),
            other => Err(unexpected(src, "f64", &other)),
        }
    }

    fn recv_i32(&self, src: usize) -> Result<Vec<i32>, CommError> {
        match self.recv(src)? {
            Packet::I32(data) => Ok(data),
            other => Err(unexpected(src, "i32", &other)),
        }
    }

    fn recv_bytes(&self, src: usize) -> Result<Vec<u8>, CommError> {
        match self.recv(src)? {
            Packet::Bytes(data) => Ok(data),
            other => Err(unexpected(src, "byte", &other)),
        }
    }
}

fn unexpected(peer: usize, expected: &'static str, found: &Packet) -> CommError {
    CommError::UnexpectedPayload {
        peer,
        expected,
        found: found.kind(),
    }
}

fn accumulate<T>(acc: &mut [T], contribution: &[T], peer: usize) -> Result<(), CommError>
where
    T: Copy + std::ops::AddAssign,
{
    if contribution.len() != acc.len() {
        return Err(CommError::LengthMismatch {
            peer,
            expected: acc.len(),
            actual: contribution.len(),
        });
    }
    for (a, &c) in acc.iter_mut().zip(contribution) {
        *a += c;
    }
    Ok(())
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_bytes(&self, data: &mut Vec<u8>) -> Result<(), CommError> {
        if self.is_root() {
            for dst in self.peers() {
                self.send(dst, Packet::Bytes(data.clone()))?;
            }
        } else {
            *data = self.recv_bytes(ROOT)?;
        }
        Ok(())
    }

    fn broadcast_f64(&self, data: &mut Vec<f64>) -> Result<(), CommError> {
        if self.is_root() {
            for dst in self.peers() {
                self.send(dst, Packet::F64(data.clone()))?;
            }
        } else {
            *data = self.recv_f64(ROOT)?;
        }
        Ok(())
    }

    fn broadcast_i32(&self, data: &mut Vec<i32>) -> Result<(), CommError> {
        if self.is_root() {
            for dst in self.peers() {
                self.send(dst, Packet::I32(data.clone()))?;
            }
        } else {
            *data = self.recv_i32(ROOT)?;
        }
        Ok(())
    }

    fn reduce_sum_f64(&self, local: &[f64]) -> Result<Option<Vec<f64>>, CommError> {
        if !self.is_root() {
            self.send(ROOT, Packet::F64(local.to_vec()))?;
            return Ok(None);
        }
        let mut acc = local.to_vec();
        for src in self.peers() {
            accumulate(&mut acc, &self.recv_f64(src)?, src)?;
        }
        Ok(Some(acc))
    }

    fn reduce_sum_i32(&self, local: &[i32]) -> Result<Option<Vec<i32>>, CommError> {
        if !self.is_root() {
            self.send(ROOT, Packet::I32(local.to_vec()))?;
            return Ok(None);
        }
        let mut acc = local.to_vec();
        for src in self.peers() {
            accumulate(&mut acc, &self.recv_i32(src)?, src)?;
        }
        Ok(Some(acc))
    }

    fn all_gather_f64(&self, local: &[f64]) -> Result<Vec<Vec<f64>>, CommError> {
        for dst in self.peers() {
            self.send(dst, Packet::F64(local.to_vec()))?;
        }
        (0..self.size)
            .map(|src| {
                if src == self.rank {
                    Ok(local.to_vec())
                } else {
                    self.recv_f64(src)
                }
            })
            .collect()
    }
}
