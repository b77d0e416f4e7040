//! Conservative habitable-zone bounds (Kopparapu et al. 2013).
//!
//! The effective stellar flux at each edge is a quartic polynomial in
//! `T_eff - 5778 K`; the orbital distance of that edge is `sqrt(L / S_eff)`.

use serde::{Deserialize, Serialize};

/// Solar effective temperature (K).
pub const T_SUN: f64 = 5778.0;

/// Polynomial coefficients for one HZ edge.
#[derive(Debug, Clone, Copy)]
struct FluxEdge {
    s_eff_sun: f64,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl FluxEdge {
    fn flux(&self, dt: f64) -> f64 {
        self.s_eff_sun
            + self.a * dt
            + self.b * dt.powi(2)
            + self.c * dt.powi(3)
            + self.d * dt.powi(4)
    }
}

/// Runaway greenhouse.
const INNER_EDGE: FluxEdge = FluxEdge {
    s_eff_sun: 1.0140,
    a: 1.2456e-4,
    b: 1.4612e-8,
    c: -7.6345e-12,
    d: -1.7511e-15,
};

/// Maximum greenhouse.
const OUTER_EDGE: FluxEdge = FluxEdge {
    s_eff_sun: 0.3438,
    a: 5.8942e-5,
    b: 1.6558e-9,
    c: -3.0045e-12,
    d: -5.2983e-16,
};

/// Orbital distance bounds in AU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HabitableZone {
    pub inner_au: f64,
    pub outer_au: f64,
}

impl HabitableZone {
    /// `inner <= a <= outer`.
    pub fn contains(&self, semi_major_axis: f64) -> bool {
        self.inner_au <= semi_major_axis && semi_major_axis <= self.outer_au
    }

    /// Outside the zone but within the scaled margins on either side.
    pub fn in_margin(&self, semi_major_axis: f64, inner_factor: f64, outer_factor: f64) -> bool {
        let a = semi_major_axis;
        (inner_factor * self.inner_au <= a && a < self.inner_au)
            || (self.outer_au < a && a <= outer_factor * self.outer_au)
    }

    /// Data-quality flag: the polynomial can invert the bounds for stars far
    /// outside its calibrated temperature range.
    pub fn is_consistent(&self) -> bool {
        self.inner_au < self.outer_au
    }
}

/// Luminosity (solar units) approximated from temperature alone, assuming a
/// solar radius.
pub fn approx_luminosity(teff: f64) -> f64 {
    (teff / T_SUN).powi(4)
}

/// Compute the conservative HZ for a star.
///
/// Returns `None` when the temperature is missing, non-finite or non-positive, or
/// when either bound comes out non-finite. A missing or non-positive luminosity
/// falls back to [`approx_luminosity`].
pub fn habitable_zone(teff: Option<f64>, luminosity: Option<f64>) -> Option<HabitableZone> {
    let teff = teff.filter(|t| t.is_finite() && *t > 0.0)?;
    let lum = luminosity
        .filter(|l| l.is_finite() && *l > 0.0)
        .unwrap_or_else(|| approx_luminosity(teff));

    let dt = teff - T_SUN;
    let inner_au = (lum / INNER_EDGE.flux(dt)).sqrt();
    let outer_au = (lum / OUTER_EDGE.flux(dt)).sqrt();

    if !(inner_au.is_finite() && outer_au.is_finite()) {
        return None;
    }
    Some(HabitableZone { inner_au, outer_au })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solar_twin_matches_reference_bounds() {
        let hz = habitable_zone(Some(5778.0), Some(1.0)).unwrap();
        assert!((hz.inner_au - (1.0f64 / 1.0140).sqrt()).abs() < 1e-12);
        assert!((hz.outer_au - (1.0f64 / 0.3438).sqrt()).abs() < 1e-12);
        assert!(hz.contains(1.0));
        assert!(hz.is_consistent());
    }

    #[test]
    fn missing_luminosity_uses_temperature_scaling() {
        let with = habitable_zone(Some(5778.0), Some(1.0)).unwrap();
        let without = habitable_zone(Some(5778.0), None).unwrap();
        assert_eq!(with, without);

        let cool = habitable_zone(Some(3500.0), None).unwrap();
        assert!(cool.outer_au < with.inner_au);
    }

    #[test]
    fn inner_below_outer_across_main_sequence() {
        for teff in (2600..=7200).step_by(100) {
            for lum in [None, Some(0.01), Some(1.0), Some(5.0)] {
                let hz = habitable_zone(Some(teff as f64), lum).unwrap();
                assert!(hz.inner_au < hz.outer_au, "teff={teff} lum={lum:?}");
            }
        }
    }

    #[test]
    fn undefined_without_temperature() {
        assert_eq!(habitable_zone(None, Some(1.0)), None);
        assert_eq!(habitable_zone(Some(f64::NAN), Some(1.0)), None);
        assert_eq!(habitable_zone(Some(-10.0), Some(1.0)), None);
    }

    #[test]
    fn margin_excludes_zone_interior() {
        let hz = HabitableZone {
            inner_au: 1.0,
            outer_au: 2.0,
        };
        assert!(hz.in_margin(0.8, 0.75, 1.25));
        assert!(hz.in_margin(2.4, 0.75, 1.25));
        assert!(!hz.in_margin(1.5, 0.75, 1.25));
        assert!(!hz.in_margin(0.7, 0.75, 1.25));
        assert!(!hz.in_margin(2.6, 0.75, 1.25));
    }
}
