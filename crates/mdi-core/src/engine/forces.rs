use crate::core::models::atom::LocalAtoms;
use crate::core::models::group::AtomGroup;
use crate::core::units::UnitConversion;
use nalgebra::Vector3;

/// Driver-supplied forces added after every force evaluation.
///
/// Holds `3N` values in engine force units, indexed by `3 * (tag - 1)`. The buffer
/// stays in effect until the driver overwrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalForceBuffer {
    forces: Vec<f64>,
}

impl ExternalForceBuffer {
    pub fn new(natoms: usize) -> Self {
        Self {
            forces: vec![0.0; 3 * natoms],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.forces
    }

    pub fn is_zero(&self) -> bool {
        self.forces.iter().all(|&f| f == 0.0)
    }

    /// Replaces the buffer with driver values, converted to engine units.
    pub fn set_from_driver(&mut self, values: &[f64], conversion: &UnitConversion) {
        for (slot, &value) in self.forces.iter_mut().zip(values) {
            *slot = conversion.force_from_driver(value);
        }
    }

    /// Adds the buffered forces to the owned atoms in `group`.
    pub fn apply(&self, atoms: &mut LocalAtoms, group: &AtomGroup) {
        if self.is_zero() {
            return;
        }
        for (tag, force) in atoms.tags.iter().zip(atoms.forces.iter_mut()) {
            if !group.contains(*tag) {
                continue;
            }
            let offset = 3 * tag.index();
            if let Some(extra) = self.forces.get(offset..offset + 3) {
                *force += Vector3::new(extra[0], extra[1], extra[2]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, AtomTag};

    fn atoms(tags: &[u32]) -> LocalAtoms {
        let mut atoms = LocalAtoms::new();
        for &tag in tags {
            atoms.push(Atom::new(AtomTag(tag), 1, Vector3::zeros()));
        }
        atoms
    }

    #[test]
    fn new_buffer_is_zero_and_applies_nothing() {
        let buffer = ExternalForceBuffer::new(2);
        let mut local = atoms(&[1, 2]);
        buffer.apply(&mut local, &AtomGroup::All);
        assert!(buffer.is_zero());
        assert!(local.forces.iter().all(|f| *f == Vector3::zeros()));
    }

    #[test]
    fn forces_are_added_by_tag_to_group_members_only() {
        let mut buffer = ExternalForceBuffer::new(3);
        buffer.set_from_driver(
            &[1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0],
            &UnitConversion::identity(),
        );
        let mut local = atoms(&[3, 1]);
        buffer.apply(&mut local, &AtomGroup::from_tags([3]));
        assert_eq!(local.forces[0], Vector3::new(0.0, 0.0, 3.0));
        assert_eq!(local.forces[1], Vector3::zeros());
    }

    #[test]
    fn driver_values_are_converted_to_engine_units() {
        let conversion = UnitConversion {
            position: 1.0,
            energy: 4.0,
            force: 4.0,
        };
        let mut buffer = ExternalForceBuffer::new(1);
        buffer.set_from_driver(&[8.0, -4.0, 2.0], &conversion);
        assert_eq!(buffer.as_slice(), &[2.0, -1.0, 0.5]);
    }

    #[test]
    fn applying_twice_adds_twice() {
        let mut buffer = ExternalForceBuffer::new(1);
        buffer.set_from_driver(&[1.0, 1.0, 1.0], &UnitConversion::identity());
        let mut local = atoms(&[1]);
        buffer.apply(&mut local, &AtomGroup::All);
        buffer.apply(&mut local, &AtomGroup::All);
        assert_eq!(local.forces[0], Vector3::new(2.0, 2.0, 2.0));
    }
}
