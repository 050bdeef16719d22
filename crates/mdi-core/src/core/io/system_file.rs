use crate::core::models::atom::{Atom, AtomTag};
use crate::core::models::cell::SimulationCell;
use crate::core::units::UnitStyle;
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("System defines no atoms")]
    Empty,
    #[error("Either every atom or no atom must carry a tag")]
    MixedTags,
    #[error("Atom tag 0 is reserved")]
    ZeroTag,
    #[error("Atom tag {0} appears more than once")]
    DuplicateTag(AtomTag),
    #[error("Atom type {atom_type} is outside 1..={ntypes}")]
    TypeOutOfRange { atom_type: u32, ntypes: usize },
    #[error("Mass of atom type {atom_type} must be positive")]
    NonPositiveMass { atom_type: usize },
    #[error("Invalid cell: {0}")]
    InvalidCell(String),
    #[error("Pair coefficients for types {0}-{1} are invalid")]
    InvalidPair(u32, u32),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSystem {
    #[serde(default)]
    units: UnitStyle,
    timestep: Option<f64>,
    cutoff: f64,
    cell: RawCell,
    masses: Vec<f64>,
    #[serde(default, rename = "pair")]
    pairs: Vec<PairEntry>,
    #[serde(default, rename = "atom")]
    atoms: Vec<RawAtom>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCell {
    lo: [f64; 3],
    hi: [f64; 3],
    #[serde(default)]
    tilt: [f64; 3],
    #[serde(default = "all_periodic")]
    periodic: [bool; 3],
}

fn all_periodic() -> [bool; 3] {
    [true; 3]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAtom {
    tag: Option<AtomTag>,
    #[serde(rename = "type")]
    atom_type: u32,
    position: [f64; 3],
    #[serde(default)]
    velocity: [f64; 3],
    #[serde(default)]
    charge: f64,
}

/// Lennard-Jones coefficients for one pair of atom types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairEntry {
    pub types: [u32; 2],
    pub epsilon: f64,
    pub sigma: f64,
}

/// A complete system as read from a TOML system file.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemDefinition {
    pub units: UnitStyle,
    pub timestep: Option<f64>,
    pub cutoff: f64,
    pub cell: SimulationCell,
    /// `ntypes + 1` entries; index 0 is unused.
    pub masses: Vec<f64>,
    pub pairs: Vec<PairEntry>,
    /// Atoms in ascending tag order.
    pub atoms: Vec<Atom>,
}

impl SystemDefinition {
    pub fn load(path: &Path) -> Result<Self, SystemFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| SystemFileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SystemFileError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, SystemFileError> {
        let raw: RawSystem = toml::from_str(content).map_err(|e| SystemFileError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        raw.validate()
    }

    pub fn ntypes(&self) -> usize {
        self.masses.len().saturating_sub(1)
    }

    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    /// The configured timestep, or the default of the unit style.
    pub fn timestep(&self) -> f64 {
        self.timestep
            .unwrap_or_else(|| self.units.default_timestep())
    }
}

impl RawSystem {
    fn validate(self) -> Result<SystemDefinition, SystemFileError> {
        if self.atoms.is_empty() {
            return Err(SystemFileError::Empty);
        }

        let ntypes = self.masses.len();
        if let Some(i) = self.masses.iter().position(|&m| !(m > 0.0)) {
            return Err(SystemFileError::NonPositiveMass { atom_type: i + 1 });
        }
        let mut masses = Vec::with_capacity(ntypes + 1);
        masses.push(0.0);
        masses.extend_from_slice(&self.masses);

        let cell = build_cell(&self.cell)?;
        if !(self.cutoff > 0.0) {
            return Err(SystemFileError::InvalidCell(format!(
                "cutoff must be positive, got {}",
                self.cutoff
            )));
        }

        for pair in &self.pairs {
            let [i, j] = pair.types;
            let in_range = |t: u32| t >= 1 && t as usize <= ntypes;
            if !in_range(i) || !in_range(j) || pair.epsilon < 0.0 || !(pair.sigma > 0.0) {
                return Err(SystemFileError::InvalidPair(i, j));
            }
        }

        let atoms = assign_tags(self.atoms, ntypes)?;

        Ok(SystemDefinition {
            units: self.units,
            timestep: self.timestep,
            cutoff: self.cutoff,
            cell,
            masses,
            pairs: self.pairs,
            atoms,
        })
    }
}

fn build_cell(raw: &RawCell) -> Result<SimulationCell, SystemFileError> {
    let lo = Vector3::from(raw.lo);
    let hi = Vector3::from(raw.hi);
    if (0..3).any(|d| !(hi[d] > lo[d])) {
        return Err(SystemFileError::InvalidCell(
            "every upper bound must exceed its lower bound".to_string(),
        ));
    }
    let mut cell = SimulationCell::orthogonal(lo, hi);
    [cell.xy, cell.xz, cell.yz] = raw.tilt;
    cell.periodic = raw.periodic;
    Ok(cell)
}

fn assign_tags(raw: Vec<RawAtom>, ntypes: usize) -> Result<Vec<Atom>, SystemFileError> {
    let tagged = raw.iter().filter(|a| a.tag.is_some()).count();
    if tagged != 0 && tagged != raw.len() {
        return Err(SystemFileError::MixedTags);
    }

    let mut seen = HashSet::with_capacity(raw.len());
    let mut atoms = Vec::with_capacity(raw.len());
    for (i, a) in raw.into_iter().enumerate() {
        if a.atom_type == 0 || a.atom_type as usize > ntypes {
            return Err(SystemFileError::TypeOutOfRange {
                atom_type: a.atom_type,
                ntypes,
            });
        }
        let tag = a.tag.unwrap_or_else(|| AtomTag::from_index(i));
        if tag.0 == 0 {
            return Err(SystemFileError::ZeroTag);
        }
        if !seen.insert(tag) {
            return Err(SystemFileError::DuplicateTag(tag));
        }
        let mut atom = Atom::new(tag, a.atom_type, Vector3::from(a.position));
        atom.velocity = Vector3::from(a.velocity);
        atom.charge = a.charge;
        atoms.push(atom);
    }
    atoms.sort_by_key(|atom| atom.tag);
    Ok(atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const ARGON_PAIR: &str = r#"
        units = "real"
        cutoff = 8.0
        masses = [39.948]

        [cell]
        lo = [0.0, 0.0, 0.0]
        hi = [20.0, 20.0, 20.0]

        [[pair]]
        types = [1, 1]
        epsilon = 0.238
        sigma = 3.405

        [[atom]]
        type = 1
        position = [1.0, 1.0, 1.0]

        [[atom]]
        type = 1
        position = [5.0, 1.0, 1.0]
        charge = 0.5
    "#;

    #[test]
    fn load_succeeds_with_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("argon.toml");
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", ARGON_PAIR).unwrap();

        let system = SystemDefinition::load(&path).unwrap();

        assert_eq!(system.units, UnitStyle::Real);
        assert_eq!(system.natoms(), 2);
        assert_eq!(system.ntypes(), 1);
        assert_eq!(system.masses, vec![0.0, 39.948]);
        assert_eq!(system.atoms[1].tag, AtomTag(2));
        assert_eq!(system.atoms[1].charge, 0.5);
        assert_eq!(system.cell.periodic, [true; 3]);
        assert_eq!(system.timestep(), 1.0);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let result = SystemDefinition::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(SystemFileError::Io { .. })));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let content = format!("thermostat = \"nose\"\n{}", ARGON_PAIR);
        let result = SystemDefinition::from_toml_str(&content);
        assert!(matches!(result, Err(SystemFileError::Toml { .. })));
    }

    #[test]
    fn explicit_tags_are_sorted() {
        let content = ARGON_PAIR
            .replacen("type = 1\n        position = [1.0", "tag = 2\n        type = 1\n        position = [1.0", 1)
            .replacen("type = 1\n        position = [5.0", "tag = 1\n        type = 1\n        position = [5.0", 1);
        let system = SystemDefinition::from_toml_str(&content).unwrap();
        assert_eq!(system.atoms[0].tag, AtomTag(1));
        assert_eq!(system.atoms[0].position.x, 5.0);
    }

    #[test]
    fn mixed_tagging_is_rejected() {
        let content = ARGON_PAIR.replacen(
            "type = 1\n        position = [1.0",
            "tag = 1\n        type = 1\n        position = [1.0",
            1,
        );
        assert!(matches!(
            SystemDefinition::from_toml_str(&content),
            Err(SystemFileError::MixedTags)
        ));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let content = ARGON_PAIR
            .replacen("type = 1\n        position = [1.0", "tag = 3\n        type = 1\n        position = [1.0", 1)
            .replacen("type = 1\n        position = [5.0", "tag = 3\n        type = 1\n        position = [5.0", 1);
        assert!(matches!(
            SystemDefinition::from_toml_str(&content),
            Err(SystemFileError::DuplicateTag(AtomTag(3)))
        ));
    }

    #[test]
    fn atom_types_must_have_masses() {
        let content = ARGON_PAIR.replacen("type = 1\n        position = [5.0", "type = 2\n        position = [5.0", 1);
        assert!(matches!(
            SystemDefinition::from_toml_str(&content),
            Err(SystemFileError::TypeOutOfRange { atom_type: 2, ntypes: 1 })
        ));
    }

    #[test]
    fn inverted_cell_bounds_are_rejected() {
        let content = ARGON_PAIR.replace("hi = [20.0, 20.0, 20.0]", "hi = [20.0, -1.0, 20.0]");
        assert!(matches!(
            SystemDefinition::from_toml_str(&content),
            Err(SystemFileError::InvalidCell(_))
        ));
    }

    #[test]
    fn timestep_defaults_follow_unit_style() {
        let content = ARGON_PAIR.replace("units = \"real\"", "units = \"metal\"");
        let system = SystemDefinition::from_toml_str(&content).unwrap();
        assert_eq!(system.timestep(), 0.001);
    }
}
