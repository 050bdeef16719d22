//! Moving data between the driver and the distributed atom store.
//!
//! Only the authoritative worker talks to the driver. Everything it receives is
//! relayed to the other workers in a status-prefixed frame, so a failed channel
//! operation on the authoritative worker still completes the collective the others
//! are blocked in, and they unwind with [`EngineError::PeerAborted`].
//!
//! Per-atom arrays travel as flat buffers ordered by atom tag. Gathers sum
//! zero-filled contributions across workers, which reconstructs the global array
//! because every tag is owned by exactly one worker.

use super::error::{EngineError, UsageError};
use crate::core::channel::{ChannelError, DriverChannel, wire};
use crate::core::comm::Communicator;
use crate::core::models::atom::{AtomTag, LocalAtoms};
use crate::core::units::UnitConversion;
use tracing::{trace, warn};

const STATUS_OK: u8 = 1;
const STATUS_ABORT: u8 = 0;

/// Physical dimension of a value, selecting its unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Dimensionless,
    Length,
    Force,
}

impl Quantity {
    #[inline]
    pub fn to_driver(self, conversion: &UnitConversion, value: f64) -> f64 {
        match self {
            Quantity::Dimensionless => value,
            Quantity::Length => conversion.length_to_driver(value),
            Quantity::Force => conversion.force_to_driver(value),
        }
    }

    #[inline]
    pub fn from_driver(self, conversion: &UnitConversion, value: f64) -> f64 {
        match self {
            Quantity::Dimensionless => value,
            Quantity::Length => conversion.length_from_driver(value),
            Quantity::Force => conversion.force_from_driver(value),
        }
    }
}

/// A per-atom floating-point array exchanged with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerAtomField {
    Positions,
    Forces,
    Charges,
}

impl PerAtomField {
    pub fn components(self) -> usize {
        match self {
            PerAtomField::Positions | PerAtomField::Forces => 3,
            PerAtomField::Charges => 1,
        }
    }

    pub fn quantity(self) -> Quantity {
        match self {
            PerAtomField::Positions => Quantity::Length,
            PerAtomField::Forces => Quantity::Force,
            PerAtomField::Charges => Quantity::Dimensionless,
        }
    }

    fn read(self, atoms: &LocalAtoms, i: usize, out: &mut [f64]) {
        match self {
            PerAtomField::Positions => out.copy_from_slice(atoms.positions[i].as_slice()),
            PerAtomField::Forces => out.copy_from_slice(atoms.forces[i].as_slice()),
            PerAtomField::Charges => out[0] = atoms.charges[i],
        }
    }

    fn write(self, atoms: &mut LocalAtoms, i: usize, values: &[f64]) {
        match self {
            PerAtomField::Positions => atoms.positions[i].copy_from_slice(values),
            PerAtomField::Forces => atoms.forces[i].copy_from_slice(values),
            PerAtomField::Charges => atoms.charges[i] = values[0],
        }
    }
}

/// The driver channel of the authoritative worker, paired with the worker world.
#[derive(Debug)]
pub struct DriverLink<C, W> {
    channel: Option<C>,
    world: W,
}

impl<C: DriverChannel, W: Communicator> DriverLink<C, W> {
    /// Only the authoritative worker keeps a channel; it must have one.
    pub fn new(channel: Option<C>, world: W) -> Result<Self, UsageError> {
        if !world.is_root() {
            return Ok(Self {
                channel: None,
                world,
            });
        }
        match channel {
            Some(channel) => Ok(Self {
                channel: Some(channel),
                world,
            }),
            None => Err(UsageError::MissingDriverChannel),
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    fn abort_peers(&self) {
        if let Err(e) = self.world.broadcast_bytes(&mut vec![STATUS_ABORT]) {
            warn!(error = %e, "Failed to relay abort to workers");
        }
    }

    /// Receives on the authoritative worker and hands the bytes to every worker.
    fn relay<F>(&mut self, receive: F) -> Result<Vec<u8>, EngineError>
    where
        F: FnOnce(&mut C) -> Result<Vec<u8>, ChannelError>,
    {
        let Some(channel) = self.channel.as_mut() else {
            let mut frame = Vec::new();
            self.world.broadcast_bytes(&mut frame)?;
            return match frame.split_first() {
                Some((&STATUS_OK, payload)) => Ok(payload.to_vec()),
                _ => Err(EngineError::PeerAborted),
            };
        };

        match receive(channel) {
            Ok(payload) => {
                let mut frame = Vec::with_capacity(payload.len() + 1);
                frame.push(STATUS_OK);
                frame.extend_from_slice(&payload);
                self.world.broadcast_bytes(&mut frame)?;
                Ok(payload)
            }
            Err(e) => {
                self.abort_peers();
                Err(e.into())
            }
        }
    }

    fn send<F>(&mut self, send: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut C) -> Result<(), ChannelError>,
    {
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = send(channel) {
                self.abort_peers();
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub fn recv_command(&mut self) -> Result<String, EngineError> {
        let bytes = self.relay(|c| c.recv_command().map(String::into_bytes))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn send_command(&mut self, token: &str) -> Result<(), EngineError> {
        self.send(|c| c.send_command(token))
    }

    pub fn send_i32s(&mut self, values: &[i32]) -> Result<(), EngineError> {
        self.send(|c| c.send_i32s(values))
    }

    pub fn send_f64s(&mut self, values: &[f64]) -> Result<(), EngineError> {
        self.send(|c| c.send_f64s(values))
    }

    pub fn recv_i32s(&mut self, count: usize) -> Result<Vec<i32>, EngineError> {
        let bytes = self.relay(|c| c.recv_i32s(count).map(|v| wire::encode_i32s(&v)))?;
        Ok(wire::decode_i32s(&bytes))
    }

    pub fn recv_f64s(&mut self, count: usize) -> Result<Vec<f64>, EngineError> {
        let bytes = self.relay(|c| c.recv_f64s(count).map(|v| wire::encode_f64s(&v)))?;
        Ok(wire::decode_f64s(&bytes))
    }

    /// Sends a value every worker already agrees on.
    pub fn send_scalar_to_driver(&mut self, value: f64) -> Result<(), EngineError> {
        self.send_f64s(&[value])
    }

    /// Receives one integer and delivers it to every worker.
    pub fn recv_scalar_from_driver(&mut self) -> Result<i32, EngineError> {
        Ok(self.recv_i32s(1)?.first().copied().unwrap_or_default())
    }
}

/// Checks that every tag in `1..=natoms` is owned by exactly one worker.
///
/// Collective; every worker reaches the same verdict.
pub fn verify_ownership<W: Communicator + ?Sized>(
    world: &W,
    atoms: &LocalAtoms,
    natoms: usize,
) -> Result<(), EngineError> {
    // The extra slot counts tags outside the valid range.
    let mut counts = vec![0i32; natoms + 1];
    for tag in &atoms.tags {
        if tag.0 == 0 || tag.0 as usize > natoms {
            counts[natoms] += 1;
        } else {
            counts[tag.index()] += 1;
        }
    }
    let counts = world.all_reduce_sum_i32(&counts)?;

    if counts[natoms] > 0 || counts[..natoms].iter().any(|&c| c > 1) {
        return Err(UsageError::NonConsecutiveTags { natoms }.into());
    }
    if let Some(missing) = counts[..natoms].iter().position(|&c| c == 0) {
        return Err(UsageError::MissingAtomTag(AtomTag::from_index(missing)).into());
    }
    Ok(())
}

/// Builds the global `components * natoms` buffer of `field`, in driver units.
///
/// Collective. The result is complete on the authoritative worker and empty elsewhere.
pub fn gather_per_atom<W: Communicator + ?Sized>(
    world: &W,
    atoms: &LocalAtoms,
    natoms: usize,
    field: PerAtomField,
    conversion: &UnitConversion,
) -> Result<Vec<f64>, EngineError> {
    if cfg!(debug_assertions) {
        verify_ownership(world, atoms, natoms)?;
    }

    let width = field.components();
    let quantity = field.quantity();
    let mut buffer = vec![0.0; width * natoms];
    for i in 0..atoms.len() {
        let offset = width * atoms.tags[i].index();
        if let Some(slot) = buffer.get_mut(offset..offset + width) {
            field.read(atoms, i, slot);
            for value in slot.iter_mut() {
                *value = quantity.to_driver(conversion, *value);
            }
        }
    }
    trace!(?field, len = buffer.len(), "Gathering per-atom buffer");
    Ok(world.reduce_sum_f64(&buffer)?.unwrap_or_default())
}

/// Builds the global atom type array. Collective, complete on the authoritative worker.
pub fn gather_types<W: Communicator + ?Sized>(
    world: &W,
    atoms: &LocalAtoms,
    natoms: usize,
) -> Result<Vec<i32>, EngineError> {
    let mut buffer = vec![0i32; natoms];
    for (tag, &atom_type) in atoms.tags.iter().zip(&atoms.types) {
        if let Some(slot) = buffer.get_mut(tag.index()) {
            *slot = atom_type as i32;
        }
    }
    Ok(world.reduce_sum_i32(&buffer)?.unwrap_or_default())
}

/// Copies the owned slots of a global driver buffer into `field`, in engine units.
pub fn scatter_per_atom(
    buffer: &[f64],
    atoms: &mut LocalAtoms,
    field: PerAtomField,
    conversion: &UnitConversion,
) {
    let width = field.components();
    let quantity = field.quantity();
    let mut values = [0.0; 3];
    for i in 0..atoms.len() {
        let offset = width * atoms.tags[i].index();
        let Some(slot) = buffer.get(offset..offset + width) else {
            continue;
        };
        for (value, &raw) in values.iter_mut().zip(slot) {
            *value = quantity.from_driver(conversion, raw);
        }
        field.write(atoms, i, &values[..width]);
    }
}
