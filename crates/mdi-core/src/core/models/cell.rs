use nalgebra::{Matrix3, Vector3};

/// The simulation box: lower/upper bounds, triclinic tilt factors, and the
/// periodicity of each dimension.
///
/// Non-periodic dimensions are shrink-wrapped: their bounds follow the extent of
/// the atoms whenever the box is reset.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCell {
    pub lo: Vector3<f64>,
    pub hi: Vector3<f64>,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
    pub periodic: [bool; 3],
}

impl SimulationCell {
    pub fn orthogonal(lo: Vector3<f64>, hi: Vector3<f64>) -> Self {
        Self {
            lo,
            hi,
            xy: 0.0,
            xz: 0.0,
            yz: 0.0,
            periodic: [true; 3],
        }
    }

    pub fn is_triclinic(&self) -> bool {
        self.xy != 0.0 || self.xz != 0.0 || self.yz != 0.0
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    /// Edge vectors as matrix columns.
    pub fn h_matrix(&self) -> Matrix3<f64> {
        let l = self.lengths();
        Matrix3::new(
            l.x, self.xy, self.xz, //
            0.0, l.y, self.yz, //
            0.0, 0.0, l.z,
        )
    }

    fn h_inverse(&self) -> Matrix3<f64> {
        // Upper triangular with a positive diagonal for any valid box.
        self.h_matrix()
            .try_inverse()
            .unwrap_or_else(Matrix3::identity)
    }

    /// Fractional coordinates of a Cartesian position.
    pub fn to_fractional(&self, x: &Vector3<f64>) -> Vector3<f64> {
        self.h_inverse() * (x - self.lo)
    }

    pub fn from_fractional(&self, lamda: &Vector3<f64>) -> Vector3<f64> {
        self.lo + self.h_matrix() * lamda
    }

    /// Maps a position back into the primary image along periodic dimensions.
    pub fn wrap(&self, x: &Vector3<f64>) -> Vector3<f64> {
        let mut lamda = self.to_fractional(x);
        for dim in 0..3 {
            if self.periodic[dim] {
                lamda[dim] -= lamda[dim].floor();
                if lamda[dim] >= 1.0 {
                    lamda[dim] = 0.0;
                }
            }
        }
        self.from_fractional(&lamda)
    }

    /// Applies the minimum image convention to a separation vector.
    pub fn minimum_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        let mut lamda = self.h_inverse() * delta;
        for dim in 0..3 {
            if self.periodic[dim] {
                lamda[dim] -= lamda[dim].round();
            }
        }
        self.h_matrix() * lamda
    }

    /// Shrink-wraps the non-periodic dimensions to the given global extent.
    ///
    /// Returns true if any bound changed.
    pub fn reset_bounds(&mut self, extent_lo: &Vector3<f64>, extent_hi: &Vector3<f64>) -> bool {
        let mut changed = false;
        for dim in 0..3 {
            if self.periodic[dim] || extent_lo[dim] > extent_hi[dim] {
                continue;
            }
            if self.lo[dim] != extent_lo[dim] || self.hi[dim] != extent_hi[dim] {
                self.lo[dim] = extent_lo[dim];
                self.hi[dim] = extent_hi[dim];
                changed = true;
            }
        }
        changed
    }

    /// The nine values reported to a driver: lo, hi, then xy, xz, yz.
    pub fn to_array(&self) -> [f64; 9] {
        [
            self.lo.x, self.lo.y, self.lo.z, self.hi.x, self.hi.y, self.hi.z, self.xy, self.xz,
            self.yz,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn cube(len: f64) -> SimulationCell {
        SimulationCell::orthogonal(Vector3::zeros(), Vector3::new(len, len, len))
    }

    fn approx_eq(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < TOLERANCE
    }

    #[test]
    fn wrap_maps_positions_into_primary_image() {
        let cell = cube(10.0);
        let wrapped = cell.wrap(&Vector3::new(12.0, -3.0, 5.0));
        assert!(approx_eq(&wrapped, &Vector3::new(2.0, 7.0, 5.0)));
    }

    #[test]
    fn wrap_leaves_non_periodic_dimensions_alone() {
        let mut cell = cube(10.0);
        cell.periodic = [true, true, false];
        let wrapped = cell.wrap(&Vector3::new(1.0, 1.0, 14.0));
        assert!(approx_eq(&wrapped, &Vector3::new(1.0, 1.0, 14.0)));
    }

    #[test]
    fn wrap_handles_tilted_cells() {
        let mut cell = cube(10.0);
        cell.xy = 2.0;
        let inside = Vector3::new(3.0, 4.0, 5.0);
        let shifted = inside + Vector3::new(2.0, 10.0, 0.0);
        assert!(approx_eq(&cell.wrap(&shifted), &inside));
        assert!(cell.is_triclinic());
    }

    #[test]
    fn minimum_image_picks_nearest_periodic_copy() {
        let cell = cube(10.0);
        let image = cell.minimum_image(&Vector3::new(9.0, -6.0, 0.5));
        assert!(approx_eq(&image, &Vector3::new(-1.0, 4.0, 0.5)));
    }

    #[test]
    fn reset_bounds_only_touches_shrink_wrapped_dimensions() {
        let mut cell = cube(10.0);
        cell.periodic = [true, false, true];
        let changed = cell.reset_bounds(&Vector3::new(-1.0, -2.0, -3.0), &Vector3::new(1.0, 2.0, 3.0));
        assert!(changed);
        assert_eq!(cell.lo, Vector3::new(0.0, -2.0, 0.0));
        assert_eq!(cell.hi, Vector3::new(10.0, 2.0, 10.0));
    }

    #[test]
    fn to_array_orders_bounds_then_tilts() {
        let mut cell = cube(4.0);
        cell.xz = 0.5;
        assert_eq!(
            cell.to_array(),
            [0.0, 0.0, 0.0, 4.0, 4.0, 4.0, 0.0, 0.5, 0.0]
        );
    }
}
