/// Distance below which two atoms are treated as coincident.
const COINCIDENT_DISTANCE: f64 = 1e-6;

/// Energy returned for coincident atoms.
const OVERLAP_ENERGY: f64 = 1e10;

/// Ratio of the potential minimum to the zero crossing, `2^(1/6)`.
pub const R_MIN_OVER_SIGMA: f64 = 1.122_462_048_309_373;

#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return OVERLAP_ENERGY;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// Pair force divided by distance, `-(dE/dr) / r`.
///
/// Multiplying by the separation vector `x_i - x_j` yields the force on atom `i`.
#[inline]
pub fn lennard_jones_12_6_fpair(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < COINCIDENT_DISTANCE {
        return 0.0;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    12.0 * well_depth * (rho12 - rho6) / (dist * dist)
}

/// Geometric mixing of per-type `(epsilon, sigma)` pairs.
#[inline]
pub fn mix_geometric(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 * b.0).sqrt(), (a.1 * b.1).sqrt())
}
