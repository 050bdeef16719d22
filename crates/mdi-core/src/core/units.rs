use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Conversion factor from angstroms to the driver's atomic length unit (bohr).
pub const ANGSTROM_TO_BOHR: f64 = 1.8897261246257702;

/// Conversion factor from kelvin to the driver's atomic energy unit (hartree).
pub const KELVIN_TO_HARTREE: f64 = 3.1668115634556e-6;

/// The internal unit system of the simulation engine.
///
/// Each style fixes the constants the engine needs to talk to a driver in atomic
/// units: the length of one angstrom in engine units, the Boltzmann constant in
/// engine energy per kelvin, and the two integrator constants used by the
/// reference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStyle {
    /// Reduced Lennard-Jones units.
    Lj,
    /// Angstrom, kcal/mol, femtosecond.
    #[default]
    Real,
    /// Angstrom, eV, picosecond.
    Metal,
    /// Meter, joule, second.
    Si,
    /// Centimeter, erg, second.
    Cgs,
    /// Bohr, hartree, femtosecond.
    Electron,
    /// Micrometer, picogram-micrometer^2/microsecond^2, microsecond.
    Micro,
    /// Nanometer, attogram-nanometer^2/nanosecond^2, nanosecond.
    Nano,
}

impl UnitStyle {
    pub const ALL: [UnitStyle; 8] = [
        UnitStyle::Lj,
        UnitStyle::Real,
        UnitStyle::Metal,
        UnitStyle::Si,
        UnitStyle::Cgs,
        UnitStyle::Electron,
        UnitStyle::Micro,
        UnitStyle::Nano,
    ];

    /// Length of one angstrom expressed in engine length units.
    pub fn angstrom(self) -> f64 {
        match self {
            UnitStyle::Lj | UnitStyle::Real | UnitStyle::Metal => 1.0,
            UnitStyle::Si => 1.0e-10,
            UnitStyle::Cgs => 1.0e-8,
            UnitStyle::Electron => 1.88972612,
            UnitStyle::Micro => 1.0e-4,
            UnitStyle::Nano => 1.0e-1,
        }
    }

    /// Boltzmann constant in engine energy units per kelvin.
    pub fn boltz(self) -> f64 {
        match self {
            UnitStyle::Lj => 1.0,
            UnitStyle::Real => 0.0019872067,
            UnitStyle::Metal => 8.617343e-5,
            UnitStyle::Si => 1.3806504e-23,
            UnitStyle::Cgs => 1.3806504e-16,
            UnitStyle::Electron => 3.16681534e-6,
            UnitStyle::Micro => 1.3806504e-8,
            UnitStyle::Nano => 0.013806504,
        }
    }

    /// Converts force/mass into velocity/time.
    pub fn ftm2v(self) -> f64 {
        match self {
            UnitStyle::Real => 1.0 / 48.88821291 / 48.88821291,
            UnitStyle::Metal => 1.0 / 1.0364269e-4,
            UnitStyle::Electron => 0.937582899,
            _ => 1.0,
        }
    }

    /// Converts mass*velocity^2 into energy.
    pub fn mvv2e(self) -> f64 {
        match self {
            UnitStyle::Real => 48.88821291 * 48.88821291,
            UnitStyle::Metal => 1.0364269e-4,
            UnitStyle::Electron => 1.06657236,
            _ => 1.0,
        }
    }

    /// Integration timestep used when a system does not set one.
    pub fn default_timestep(self) -> f64 {
        match self {
            UnitStyle::Lj => 0.005,
            UnitStyle::Real => 1.0,
            UnitStyle::Metal | UnitStyle::Electron => 0.001,
            UnitStyle::Si | UnitStyle::Cgs => 1.0e-8,
            UnitStyle::Micro => 2.0,
            UnitStyle::Nano => 0.00045,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnitStyle::Lj => "lj",
            UnitStyle::Real => "real",
            UnitStyle::Metal => "metal",
            UnitStyle::Si => "si",
            UnitStyle::Cgs => "cgs",
            UnitStyle::Electron => "electron",
            UnitStyle::Micro => "micro",
            UnitStyle::Nano => "nano",
        }
    }
}

impl fmt::Display for UnitStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitStyle::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown unit style '{}'", s))
    }
}

/// Multiplicative factors between engine units and the driver's atomic units.
///
/// Values leaving the engine are divided by `position` (lengths) or multiplied by
/// `energy`/`force`; values arriving from the driver get the inverse operation, so
/// a write followed by a read returns the original buffer up to rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConversion {
    /// Engine length per driver length.
    pub position: f64,
    /// Driver energy per engine energy.
    pub energy: f64,
    /// Driver force per engine force.
    pub force: f64,
}

impl UnitConversion {
    pub fn for_style(style: UnitStyle) -> Self {
        let position = style.angstrom() / ANGSTROM_TO_BOHR;
        let energy = KELVIN_TO_HARTREE / style.boltz();
        Self {
            position,
            energy,
            force: energy * position,
        }
    }

    /// The identity conversion, used when engine and driver share units.
    pub fn identity() -> Self {
        Self {
            position: 1.0,
            energy: 1.0,
            force: 1.0,
        }
    }

    #[inline]
    pub fn length_to_driver(&self, value: f64) -> f64 {
        value / self.position
    }

    #[inline]
    pub fn length_from_driver(&self, value: f64) -> f64 {
        value * self.position
    }

    #[inline]
    pub fn energy_to_driver(&self, value: f64) -> f64 {
        value * self.energy
    }

    #[inline]
    pub fn force_to_driver(&self, value: f64) -> f64 {
        value * self.force
    }

    #[inline]
    pub fn force_from_driver(&self, value: f64) -> f64 {
        value / self.force
    }
}
