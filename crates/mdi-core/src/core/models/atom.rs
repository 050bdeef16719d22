use nalgebra::Vector3;
use serde::Deserialize;
use std::fmt;

/// Stable, process-wide atom identifier in `[1, N]`.
///
/// Tags are assigned once when the system is built and never reused. They key
/// every distributed exchange, independent of which worker currently owns the atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct AtomTag(pub u32);

impl AtomTag {
    /// Zero-based slot of this tag in a flat per-atom buffer.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        AtomTag(index as u32 + 1)
    }
}

impl fmt::Display for AtomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single atom record, used when atoms are created or moved between workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub tag: AtomTag,
    /// One-based atom type, indexing the per-type mass table.
    pub atom_type: u32,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub force: Vector3<f64>,
    /// Partial charge in elementary charge units.
    pub charge: f64,
}

impl Atom {
    pub fn new(tag: AtomTag, atom_type: u32, position: Vector3<f64>) -> Self {
        Self {
            tag,
            atom_type,
            position,
            velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            charge: 0.0,
        }
    }

    /// Number of doubles in the packed representation used for migration.
    pub const PACKED_LEN: usize = 12;

    pub fn pack_into(&self, buffer: &mut Vec<f64>) {
        buffer.push(self.tag.0 as f64);
        buffer.push(self.atom_type as f64);
        buffer.extend_from_slice(self.position.as_slice());
        buffer.extend_from_slice(self.velocity.as_slice());
        buffer.extend_from_slice(self.force.as_slice());
        buffer.push(self.charge);
    }

    pub fn unpack(chunk: &[f64]) -> Option<Self> {
        if chunk.len() != Self::PACKED_LEN {
            return None;
        }
        Some(Self {
            tag: AtomTag(chunk[0] as u32),
            atom_type: chunk[1] as u32,
            position: Vector3::new(chunk[2], chunk[3], chunk[4]),
            velocity: Vector3::new(chunk[5], chunk[6], chunk[7]),
            force: Vector3::new(chunk[8], chunk[9], chunk[10]),
            charge: chunk[11],
        })
    }
}

/// The atoms currently owned by one worker, stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalAtoms {
    pub tags: Vec<AtomTag>,
    pub types: Vec<u32>,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub forces: Vec<Vector3<f64>>,
    pub charges: Vec<f64>,
}

impl LocalAtoms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn push(&mut self, atom: Atom) {
        self.tags.push(atom.tag);
        self.types.push(atom.atom_type);
        self.positions.push(atom.position);
        self.velocities.push(atom.velocity);
        self.forces.push(atom.force);
        self.charges.push(atom.charge);
    }

    pub fn get(&self, i: usize) -> Option<Atom> {
        (i < self.len()).then(|| Atom {
            tag: self.tags[i],
            atom_type: self.types[i],
            position: self.positions[i],
            velocity: self.velocities[i],
            force: self.forces[i],
            charge: self.charges[i],
        })
    }

    /// Removes and returns the atom at `i`; the last atom takes its slot.
    pub fn swap_remove(&mut self, i: usize) -> Atom {
        Atom {
            tag: self.tags.swap_remove(i),
            atom_type: self.types.swap_remove(i),
            position: self.positions.swap_remove(i),
            velocity: self.velocities.swap_remove(i),
            force: self.forces.swap_remove(i),
            charge: self.charges.swap_remove(i),
        }
    }

    pub fn index_of(&self, tag: AtomTag) -> Option<usize> {
        self.tags.iter().position(|&t| t == tag)
    }

    pub fn clear_forces(&mut self) {
        self.forces.iter_mut().for_each(|f| *f = Vector3::zeros());
    }

    /// Removes every atom for which `leaves` returns true, returning them in
    /// ascending tag order.
    pub fn drain_where<F>(&mut self, mut leaves: F) -> Vec<Atom>
    where
        F: FnMut(&Vector3<f64>) -> bool,
    {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.len() {
            if leaves(&self.positions[i]) {
                out.push(self.swap_remove(i));
            } else {
                i += 1;
            }
        }
        out.sort_by_key(|atom| atom.tag);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(tag: u32, x: f64) -> Atom {
        Atom::new(AtomTag(tag), 1, Vector3::new(x, 0.0, 0.0))
    }

    #[test]
    fn tag_index_is_zero_based() {
        assert_eq!(AtomTag(1).index(), 0);
        assert_eq!(AtomTag(10).index(), 9);
        assert_eq!(AtomTag::from_index(4), AtomTag(5));
    }

    #[test]
    fn packed_atom_survives_unpacking() {
        let mut original = atom(7, 1.5);
        original.velocity = Vector3::new(0.1, 0.2, 0.3);
        original.force = Vector3::new(-1.0, 2.0, -3.0);
        original.charge = -0.834;
        original.atom_type = 2;

        let mut buffer = Vec::new();
        original.pack_into(&mut buffer);
        assert_eq!(buffer.len(), Atom::PACKED_LEN);
        assert_eq!(Atom::unpack(&buffer), Some(original));
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        assert_eq!(Atom::unpack(&[1.0, 2.0]), None);
    }

    #[test]
    fn drain_where_removes_matching_atoms_in_tag_order() {
        let mut atoms = LocalAtoms::new();
        for (tag, x) in [(3, 5.0), (1, -1.0), (2, 7.0), (4, 0.5)] {
            atoms.push(atom(tag, x));
        }

        let moved = atoms.drain_where(|p| p.x > 1.0);

        assert_eq!(
            moved.iter().map(|a| a.tag).collect::<Vec<_>>(),
            vec![AtomTag(2), AtomTag(3)]
        );
        assert_eq!(atoms.len(), 2);
        assert!(atoms.index_of(AtomTag(1)).is_some());
        assert!(atoms.index_of(AtomTag(4)).is_some());
        assert!(atoms.index_of(AtomTag(3)).is_none());
    }

    #[test]
    fn clear_forces_zeroes_every_force() {
        let mut atoms = LocalAtoms::new();
        let mut a = atom(1, 0.0);
        a.force = Vector3::new(1.0, 1.0, 1.0);
        atoms.push(a);
        atoms.clear_forces();
        assert_eq!(atoms.forces[0], Vector3::zeros());
    }
}
