//! Shape operators: given a shape-class tag, a volume, and aspect ratios
//! plus an irregularity parameter, compute the principal semi-axis and
//! answer inside-tests. Modelled as a capability trait with one
//! implementation per shape class, dispatched through a closed sum type
//! so lookup from a [`crate::phase::ShapeClass`] tag stays O(1).
//!
//! `omega3` is supplied once per feature through [`ShapeOps::radius_from`]
//! and cached on the operator instance so that the subsequent, much more
//! frequent, [`ShapeOps::inside`] calls during rasterisation see the same
//! irregularity the radius was derived from. [`ShapeOps::init`] clears
//! that cache before a fresh feature reuses the same operator instance:
//! one `init()` per feature, followed by a single radius call and many
//! `inside()` calls.

use crate::error::PackingError;
use crate::phase::ShapeClass;
use std::f64::consts::PI;

/// Capability set every concrete shape operator implements.
pub trait ShapeOps {
    /// Returns principal semi-axis `a` such that the shape's volume
    /// equals `volume` given the aspect ratios and irregularity. Caches
    /// `omega3` for subsequent [`Self::inside`] calls.
    fn radius_from(&mut self, volume: f64, omega3: f64, b_over_a: f64, c_over_a: f64) -> f64;

    /// Non-negative when the normalised point `(x/a, y/b, z/c)` is
    /// strictly inside the shape, zero on the surface, negative outside;
    /// magnitude is monotone in depth. Uses the `omega3` cached by the
    /// most recent [`Self::radius_from`] call.
    fn inside(&self, x: f64, y: f64, z: f64) -> f64;

    /// Resets any per-instance cached fields. No observable side effects
    /// across calls other than clearing the cache.
    fn init(&mut self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ellipsoid;

impl ShapeOps for Ellipsoid {
    fn radius_from(&mut self, volume: f64, _omega3: f64, b_over_a: f64, c_over_a: f64) -> f64 {
        (3.0 * volume / (4.0 * PI * b_over_a * c_over_a)).cbrt()
    }

    fn inside(&self, x: f64, y: f64, z: f64) -> f64 {
        1.0 - x * x - y * y - z * z
    }

    fn init(&mut self) {}
}

/// Superellipsoid with a single roundness exponent derived from `omega3`
/// (0 = ellipsoid-like, 1 = box-like). Volume uses the closed-form volume
/// of an L^p ball in 3 dimensions, `(2*Gamma(1/p+1))^3 / Gamma(3/p+1)`,
/// scaled by the semi-axis product.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuperEllipsoid {
    exponent: f64,
}

impl SuperEllipsoid {
    fn exponent_from_omega3(omega3: f64) -> f64 {
        2.0 + 8.0 * omega3.clamp(0.0, 1.0)
    }

    fn unit_lp_ball_volume(p: f64) -> f64 {
        let g = gamma(1.0 / p + 1.0);
        (2.0 * g).powi(3) / gamma(3.0 / p + 1.0)
    }
}

impl ShapeOps for SuperEllipsoid {
    fn radius_from(&mut self, volume: f64, omega3: f64, b_over_a: f64, c_over_a: f64) -> f64 {
        self.exponent = Self::exponent_from_omega3(omega3);
        let unit_volume = Self::unit_lp_ball_volume(self.exponent);
        (volume / (b_over_a * c_over_a * unit_volume)).cbrt()
    }

    fn inside(&self, x: f64, y: f64, z: f64) -> f64 {
        let p = self.exponent;
        1.0 - x.abs().powf(p) - y.abs().powf(p) - z.abs().powf(p)
    }

    fn init(&mut self) {
        self.exponent = 2.0;
    }
}

/// Interpolates between an octahedron (`omega3 = 0`, L1 ball) and a cube
/// (`omega3 = 1`, L-infinity ball).
#[derive(Clone, Copy, Debug, Default)]
pub struct CubeOctahedron {
    blend: f64,
}

impl ShapeOps for CubeOctahedron {
    fn radius_from(&mut self, volume: f64, omega3: f64, b_over_a: f64, c_over_a: f64) -> f64 {
        self.blend = omega3.clamp(0.0, 1.0);
        let coeff = (4.0 / 3.0) * (1.0 - self.blend) + 8.0 * self.blend;
        (volume / (b_over_a * c_over_a * coeff)).cbrt()
    }

    fn inside(&self, x: f64, y: f64, z: f64) -> f64 {
        let t = self.blend;
        let l1 = x.abs() + y.abs() + z.abs();
        let linf = x.abs().max(y.abs()).max(z.abs());
        1.0 - ((1.0 - t) * l1 + t * linf)
    }

    fn init(&mut self) {
        self.blend = 0.0;
    }
}

/// Right elliptical cylinder: `a`/`b` are cross-section radii, `c` is the
/// half-height.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cylinder;

impl ShapeOps for Cylinder {
    fn radius_from(&mut self, volume: f64, _omega3: f64, b_over_a: f64, c_over_a: f64) -> f64 {
        (volume / (2.0 * PI * b_over_a * c_over_a)).cbrt()
    }

    fn inside(&self, x: f64, y: f64, z: f64) -> f64 {
        (1.0 - x * x - y * y).min(1.0 - z * z)
    }

    fn init(&mut self) {}
}

/// Lanczos approximation of the gamma function, accurate to within
/// `1e-10` relative error for the positive arguments this module uses
/// (exponents in `[1, 2]` after `1/p + 1`).
fn gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        PI / ((PI * x).sin() * gamma(1.0 - x))
    } else {
        let x = x - 1.0;
        let mut a = COEFFICIENTS[0];
        let t = x + G + 0.5;
        for (i, coeff) in COEFFICIENTS.iter().enumerate().skip(1) {
            a += coeff / (x + i as f64);
        }
        (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

/// Dispatches to a concrete [`ShapeOps`] implementation by shape class.
pub fn shape_ops_for(shape_class: ShapeClass) -> Result<Box<dyn ShapeOps + Send + Sync>, PackingError> {
    match shape_class {
        ShapeClass::Ellipsoid => Ok(Box::new(Ellipsoid)),
        ShapeClass::SuperEllipsoid => Ok(Box::new(SuperEllipsoid::default())),
        ShapeClass::CubeOctahedron => Ok(Box::new(CubeOctahedron::default())),
        ShapeClass::Cylinder => Ok(Box::new(Cylinder)),
        ShapeClass::Unknown => Err(PackingError::InvalidShapeClass(
            "shape class tag Unknown is not a concrete shape".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsoid_radius_matches_closed_form() {
        let mut shape = Ellipsoid;
        let volume = 10.0;
        let r = shape.radius_from(volume, 1.0, 1.0, 1.0);
        // Sphere: V = 4/3 pi r^3
        let expected = (3.0 * volume / (4.0 * PI)).cbrt();
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn ellipsoid_inside_surface_and_outside() {
        let shape = Ellipsoid;
        assert!(shape.inside(0.0, 0.0, 0.0) > 0.0);
        assert!((shape.inside(1.0, 0.0, 0.0)).abs() < 1e-12);
        assert!(shape.inside(1.1, 0.0, 0.0) < 0.0);
    }

    #[test]
    fn cylinder_radius_from_volume_round_trips() {
        let mut shape = Cylinder;
        let volume = 5.0;
        let r = shape.radius_from(volume, 0.0, 1.0, 1.0);
        let recomputed_volume = 2.0 * PI * r * r * r;
        assert!((recomputed_volume - volume).abs() < 1e-9);
    }

    #[test]
    fn super_ellipsoid_inside_is_consistent_with_cached_omega3() {
        let mut shape = SuperEllipsoid::default();
        shape.init();
        let _ = shape.radius_from(10.0, 1.0, 1.0, 1.0);
        assert!((shape.exponent - 10.0).abs() < 1e-9);
        assert!(shape.inside(0.0, 0.0, 0.0) > 0.0);
        assert!((shape.inside(1.0, 0.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn gamma_matches_known_values() {
        assert!((gamma(1.0) - 1.0).abs() < 1e-9);
        assert!((gamma(2.0) - 1.0).abs() < 1e-9);
        assert!((gamma(0.5) - PI.sqrt()).abs() < 1e-8);
        assert!((gamma(5.0) - 24.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_shape_class_is_rejected() {
        assert!(shape_ops_for(ShapeClass::Unknown).is_err());
    }
}
