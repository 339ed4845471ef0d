//! Orientation utilities: Bunge Euler angle conversions to rotation
//! matrix / quaternion / axis-angle, Laue-group symmetry operator tables
//! for cubic-m3m and hexagonal-6/mmm bin indexing, and axis-ODF sampling
//! used by [`crate::generator`].

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use rand::Rng;

use crate::phase::LaueGroup;

/// A Bunge (phi1, Phi, phi2) Euler angle triple, in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EulerAngles {
    pub phi1: f64,
    pub phi_cap: f64,
    pub phi2: f64,
}

impl EulerAngles {
    pub fn new(phi1: f64, phi_cap: f64, phi2: f64) -> Self {
        Self { phi1, phi_cap, phi2 }
    }

    /// Builds the Bunge g-matrix (crystal-to-sample rotation) for these
    /// angles.
    pub fn to_matrix(self) -> Matrix3<f64> {
        let (s1, c1) = self.phi1.sin_cos();
        let (sp, cp) = self.phi_cap.sin_cos();
        let (s2, c2) = self.phi2.sin_cos();

        Matrix3::new(
            c1 * c2 - s1 * s2 * cp,
            s1 * c2 + c1 * s2 * cp,
            s2 * sp,
            -c1 * s2 - s1 * c2 * cp,
            -s1 * s2 + c1 * c2 * cp,
            c2 * sp,
            s1 * sp,
            -c1 * sp,
            cp,
        )
    }

    /// Recovers Euler angles from a rotation matrix built by
    /// [`Self::to_matrix`]. Falls back to the degenerate (`Phi == 0`)
    /// branch when the matrix is (numerically) a rotation about the
    /// sample z-axis only.
    pub fn from_matrix(g: &Matrix3<f64>) -> Self {
        let phi_cap = g[(2, 2)].clamp(-1.0, 1.0).acos();
        if phi_cap.abs() < 1e-9 {
            let phi1 = g[(1, 0)].atan2(g[(0, 0)]);
            EulerAngles::new(phi1, 0.0, 0.0)
        } else {
            let phi1 = g[(2, 0)].atan2(-g[(2, 1)]);
            let phi2 = g[(0, 2)].atan2(g[(1, 2)]);
            EulerAngles::new(phi1, phi_cap, phi2)
        }
    }

    pub fn to_quaternion(self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.to_matrix()))
    }

    pub fn from_quaternion(q: &UnitQuaternion<f64>) -> Self {
        Self::from_matrix(q.to_rotation_matrix().matrix())
    }

    /// Axis-angle representation as `(unit axis, angle in radians)`.
    pub fn to_axis_angle(self) -> (Vector3<f64>, f64) {
        let q = self.to_quaternion();
        match q.axis_angle() {
            Some((axis, angle)) => (axis.into_inner(), angle),
            None => (Vector3::z(), 0.0),
        }
    }

    pub fn from_axis_angle(axis: Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(axis);
        let q = UnitQuaternion::from_axis_angle(&unit_axis, angle);
        Self::from_quaternion(&q)
    }
}

fn rot_x(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

fn rot_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// The 4 proper rotations of point group 222, used as the sample symmetry
/// when perturbing a sampled axis-ODF orientation back into its bin.
pub fn orthorhombic_sample_operators() -> Vec<Matrix3<f64>> {
    vec![
        Matrix3::identity(),
        rot_x(std::f64::consts::PI),
        Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0), // 180 deg about y
        rot_z(std::f64::consts::PI),
    ]
}

/// Returns the proper-rotation symmetry operators for a Laue group,
/// sufficient for folding an arbitrary orientation into the fundamental
/// zone when indexing ODF bins.
pub fn laue_symmetry_operators(group: LaueGroup) -> Vec<Matrix3<f64>> {
    match group {
        LaueGroup::CubicM3m => cubic_m3m_operators(),
        LaueGroup::HexagonalMmm => hexagonal_mmm_operators(),
    }
}

/// 24 proper rotations of the cube: every signed permutation matrix with
/// determinant +1.
fn cubic_m3m_operators() -> Vec<Matrix3<f64>> {
    let perms = [
        [0usize, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let signs = [1.0, -1.0];
    let mut ops = Vec::with_capacity(24);
    for perm in perms {
        for sx in signs {
            for sy in signs {
                for sz in signs {
                    let mut m = Matrix3::zeros();
                    m[(0, perm[0])] = sx;
                    m[(1, perm[1])] = sy;
                    m[(2, perm[2])] = sz;
                    if (m.determinant() - 1.0f64).abs() < 1e-9 {
                        ops.push(m);
                    }
                }
            }
        }
    }
    debug_assert_eq!(ops.len(), 24);
    ops
}

/// 12 proper rotations of the hexagonal holohedry (point group 622): six
/// rotations about the c-axis combined with the identity and a
/// perpendicular 2-fold axis.
fn hexagonal_mmm_operators() -> Vec<Matrix3<f64>> {
    let mut ops = Vec::with_capacity(12);
    let two_fold = rot_x(std::f64::consts::PI);
    for k in 0..6 {
        let angle = std::f64::consts::PI / 3.0 * k as f64;
        let rz = rot_z(angle);
        ops.push(rz);
        ops.push(rz * two_fold);
    }
    debug_assert_eq!(ops.len(), 12);
    ops
}

/// A discretised orientation distribution function: probability mass over
/// a regular grid of Bunge-space bins, used for axis-ODF sampling (spec
/// §3, §4.3).
#[derive(Clone, Debug)]
pub struct OdfTable {
    /// Number of bins along (phi1, Phi, phi2).
    pub bin_counts: [usize; 3],
    /// Flattened probability mass, row-major over (phi1, Phi, phi2),
    /// summing to 1.
    pub density: Vec<f64>,
}

impl OdfTable {
    /// Builds a uniform ODF over the given bin grid, mainly useful for
    /// tests and as a sane default before real statistics are supplied.
    pub fn uniform(bin_counts: [usize; 3]) -> Self {
        let total_bins = bin_counts[0] * bin_counts[1] * bin_counts[2];
        let density = vec![1.0 / total_bins as f64; total_bins];
        Self { bin_counts, density }
    }

    fn bin_extent(&self) -> [f64; 3] {
        [
            std::f64::consts::TAU / self.bin_counts[0] as f64,
            std::f64::consts::PI / self.bin_counts[1] as f64,
            std::f64::consts::TAU / self.bin_counts[2] as f64,
        ]
    }

    fn bin_origin(&self, flat_index: usize) -> [f64; 3] {
        let n2 = self.bin_counts[2];
        let n1n2 = self.bin_counts[1] * n2;
        let i0 = flat_index / n1n2;
        let rem = flat_index % n1n2;
        let i1 = rem / n2;
        let i2 = rem % n2;
        let extent = self.bin_extent();
        [
            i0 as f64 * extent[0],
            i1 as f64 * extent[1],
            i2 as f64 * extent[2],
        ]
    }

    /// Draws an Euler triple: inverse-CDF selects a bin by cumulative
    /// mass, a uniform perturbation places the orientation inside that
    /// bin, and a randomly chosen orthorhombic sample-symmetry operator
    /// folds it back into the bin.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (EulerAngles, usize) {
        let target: f64 = rng.random::<f64>();
        let mut cumulative = 0.0;
        let mut bin = self.density.len().saturating_sub(1);
        for (i, mass) in self.density.iter().enumerate() {
            let previous = cumulative;
            cumulative += mass;
            if target < cumulative && target >= previous {
                bin = i;
                break;
            }
        }

        let origin = self.bin_origin(bin);
        let extent = self.bin_extent();
        let raw = EulerAngles::new(
            origin[0] + rng.random::<f64>() * extent[0],
            origin[1] + rng.random::<f64>() * extent[1],
            origin[2] + rng.random::<f64>() * extent[2],
        );

        let ops = orthorhombic_sample_operators();
        let op = &ops[rng.random_range(0..ops.len())];
        let folded = op * raw.to_matrix();
        (EulerAngles::from_matrix(&folded), bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_matrix_round_trip() {
        let original = EulerAngles::new(0.4, 1.1, 2.3);
        let matrix = original.to_matrix();
        let recovered = EulerAngles::from_matrix(&matrix);
        assert!((original.phi1 - recovered.phi1).abs() < 1e-9);
        assert!((original.phi_cap - recovered.phi_cap).abs() < 1e-9);
        assert!((original.phi2 - recovered.phi2).abs() < 1e-9);
    }

    #[test]
    fn euler_quaternion_round_trip() {
        let original = EulerAngles::new(0.2, 0.9, 1.7);
        let q = original.to_quaternion();
        let recovered = EulerAngles::from_quaternion(&q);
        let m1 = original.to_matrix();
        let m2 = recovered.to_matrix();
        assert!((m1 - m2).norm() < 1e-9);
    }

    #[test]
    fn identity_euler_is_identity_matrix() {
        let identity = EulerAngles::new(0.0, 0.0, 0.0).to_matrix();
        assert!((identity - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn cubic_group_has_24_operators_all_orthogonal() {
        let ops = cubic_m3m_operators();
        assert_eq!(ops.len(), 24);
        for op in &ops {
            let should_be_identity = op.transpose() * op;
            assert!((should_be_identity - Matrix3::identity()).norm() < 1e-9);
        }
    }

    #[test]
    fn hexagonal_group_has_12_operators() {
        assert_eq!(hexagonal_mmm_operators().len(), 12);
    }

    #[test]
    fn odf_sample_returns_valid_bin() {
        let table = OdfTable::uniform([4, 3, 4]);
        let mut rng = rand_pcg::Pcg64::new(42, 54);
        for _ in 0..50 {
            let (_angles, bin) = table.sample(&mut rng);
            assert!(bin < table.density.len());
        }
    }
}
