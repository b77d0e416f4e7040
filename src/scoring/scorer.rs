//! Composite habitability / biosignature scorer.
//!
//! Each category is a sum of additive factors, clipped to its fixed range; the
//! total is the clipped sum of the four categories. A factor whose input is
//! unknown contributes nothing. The scorer is pure: same record, same config,
//! same breakdown.

use crate::domain::{PlanetRecord, ScoreBreakdown};
use crate::math::{HabitableZone, habitable_zone};
use crate::scoring::weights::{
    ActivityRules, BiosignatureRules, DetectabilityRules, HabitabilityRules, ScoringConfig,
};

pub const HABITABILITY_RANGE: (f64, f64) = (0.0, 35.0);
pub const DETECTABILITY_RANGE: (f64, f64) = (-30.0, 30.0);
pub const BIOSIGNATURE_RANGE: (f64, f64) = (0.0, 25.0);
pub const ACTIVITY_RANGE: (f64, f64) = (-10.0, 10.0);
pub const TOTAL_RANGE: (f64, f64) = (0.0, 100.0);

/// Score one planet.
pub fn score_planet(record: &PlanetRecord, config: &ScoringConfig) -> ScoreBreakdown {
    let zone = habitable_zone(record.star_teff, record.star_lum);

    let habitability = clip(
        habitability_score(record, zone.as_ref(), &config.habitability),
        HABITABILITY_RANGE,
    );
    let detectability = clip(
        detectability_score(record, &config.detectability),
        DETECTABILITY_RANGE,
    );
    let biosignature = clip(
        biosignature_score(record, &config.biosignature),
        BIOSIGNATURE_RANGE,
    );
    let stellar_activity = clip(
        activity_score(record, &config.activity),
        ACTIVITY_RANGE,
    );

    let total = clip(
        habitability + detectability + biosignature + stellar_activity,
        TOTAL_RANGE,
    );

    ScoreBreakdown {
        habitability,
        detectability,
        biosignature,
        stellar_activity,
        total,
        zone,
    }
}

/// Score every planet, preserving input order.
pub fn score_catalog(records: &[PlanetRecord], config: &ScoringConfig) -> Vec<ScoreBreakdown> {
    records.iter().map(|r| score_planet(r, config)).collect()
}

/// Rocky-density proxy `M / R^3` (Earth units), when both are known and `R > 0`.
pub fn density_proxy(mass: Option<f64>, radius: Option<f64>) -> Option<f64> {
    let m = known(mass)?;
    let r = known(radius).filter(|r| *r > 0.0)?;
    let rho = m / r.powi(3);
    rho.is_finite().then_some(rho)
}

fn habitability_score(
    record: &PlanetRecord,
    zone: Option<&HabitableZone>,
    rules: &HabitabilityRules,
) -> f64 {
    let mut score = 0.0;

    if let (Some(hz), Some(a)) = (zone, known(record.semi_major_axis)) {
        if hz.contains(a) {
            score += rules.hz_bonus;
        } else if hz.in_margin(a, rules.hz_inner_margin, rules.hz_outer_margin) {
            score += rules.hz_margin_bonus;
        }
    }

    if let Some(r) = known(record.radius).filter(|r| *r > 0.0) {
        let [lo, hi] = rules.earth_size_range;
        if (lo..=hi).contains(&r) {
            score += rules.earth_size_bonus;
        } else if r > hi && r <= rules.super_earth_max {
            score += rules.super_earth_bonus;
        } else if r > rules.giant_min {
            score += rules.giant_penalty;
        }
    }

    if let Some(t) = known(record.eq_temp).filter(|t| *t > 0.0) {
        if in_range(t, rules.temperate_range) {
            score += rules.temperate_bonus;
        } else if in_range(t, rules.mild_range) {
            score += rules.mild_bonus;
        } else {
            score += rules.hostile_penalty;
        }
    }

    score
}

fn detectability_score(record: &PlanetRecord, rules: &DetectabilityRules) -> f64 {
    let mut score = 0.0;

    if let Some(j) = known(record.j_mag) {
        score += if j < rules.saturation_jmag {
            rules.saturation_penalty
        } else {
            rules
                .jmag_tiers
                .iter()
                .find(|tier| j < tier.below)
                .map(|tier| tier.bonus)
                .unwrap_or(rules.faint_bonus)
        };
    }

    if let Some(p) = known(record.orbital_period).filter(|p| *p > 0.0) {
        if in_range(p, rules.period_range) {
            score += rules.period_bonus;
        } else if p > rules.long_period_min {
            score += rules.long_period_penalty;
        }
    }

    if let Some(depth) = known(record.transit_depth).filter(|d| *d > 0.0) {
        if depth >= rules.deep_transit_ppm {
            score += rules.deep_transit_bonus;
        } else if depth >= rules.moderate_transit_ppm {
            score += rules.moderate_transit_bonus;
        }
    }

    if let Some(spectral) = record.spectral_type.as_deref() {
        let spectral = spectral.to_uppercase();
        if spectral.contains('M') {
            score += rules.m_dwarf_bonus;
        } else if ['F', 'G', 'K'].iter().any(|c| spectral.contains(*c)) {
            score += rules.fgk_bonus;
        }
    }

    score
}

fn biosignature_score(record: &PlanetRecord, rules: &BiosignatureRules) -> f64 {
    let rocky = density_proxy(record.mass, record.radius)
        .is_some_and(|rho| in_range(rho, rules.rocky_density_range));
    if rocky {
        rules.base + rules.rocky_bonus
    } else {
        rules.base
    }
}

fn activity_score(record: &PlanetRecord, rules: &ActivityRules) -> f64 {
    match known(record.star_age) {
        Some(age) if age > rules.old_age_gyr => rules.old_bonus,
        Some(age) if age < rules.young_age_gyr => rules.young_penalty,
        _ => 0.0,
    }
}

fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn in_range(value: f64, [lo, hi]: [f64; 2]) -> bool {
    lo <= value && value <= hi
}

fn clip(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solar_twin() -> PlanetRecord {
        PlanetRecord {
            planet_name: Some("Twin b".to_string()),
            star_teff: Some(5778.0),
            star_lum: Some(1.0),
            semi_major_axis: Some(1.0),
            radius: Some(1.0),
            eq_temp: Some(288.0),
            ..PlanetRecord::default()
        }
    }

    #[test]
    fn solar_twin_habitability_is_clipped_to_cap() {
        let config = ScoringConfig::default();
        let s = score_planet(&solar_twin(), &config);
        // 25 + 20 + 20 = 65 before clipping.
        assert_eq!(s.habitability, 35.0);
        assert!(s.zone.is_some());
    }

    #[test]
    fn missing_teff_drops_hz_term_only() {
        let config = ScoringConfig::default();
        let mut record = solar_twin();
        record.star_teff = None;
        record.eq_temp = None;
        let s = score_planet(&record, &config);
        assert!(s.zone.is_none());
        assert_eq!(s.habitability, 20.0);
    }

    #[test]
    fn margin_band_earns_partial_credit() {
        let config = ScoringConfig::default();
        let record = PlanetRecord {
            star_teff: Some(5778.0),
            star_lum: Some(1.0),
            semi_major_axis: Some(0.9),
            ..PlanetRecord::default()
        };
        let s = score_planet(&record, &config);
        assert_eq!(s.habitability, 12.0);
    }

    #[test]
    fn detectability_factors_add_up() {
        let config = ScoringConfig::default();
        let record = PlanetRecord {
            j_mag: Some(9.0),
            orbital_period: Some(12.0),
            transit_depth: Some(1500.0),
            spectral_type: Some("m3 v".to_string()),
            ..PlanetRecord::default()
        };
        let s = score_planet(&record, &config);
        // 20 (J tier) + 10 (period) + 5 (depth) + 15 (M dwarf) = 50 -> 30.
        assert_eq!(s.detectability, 30.0);

        let bright = PlanetRecord {
            j_mag: Some(5.0),
            orbital_period: Some(200.0),
            ..PlanetRecord::default()
        };
        assert_eq!(score_planet(&bright, &config).detectability, -15.0);
    }

    #[test]
    fn faint_host_gets_floor_bonus() {
        let config = ScoringConfig::default();
        let record = PlanetRecord {
            j_mag: Some(13.5),
            spectral_type: Some("G2V".to_string()),
            ..PlanetRecord::default()
        };
        assert_eq!(score_planet(&record, &config).detectability, 10.0);
    }

    #[test]
    fn biosignature_rewards_rocky_density() {
        let config = ScoringConfig::default();
        let rocky = PlanetRecord {
            mass: Some(5.0),
            radius: Some(1.0),
            ..PlanetRecord::default()
        };
        assert_eq!(score_planet(&rocky, &config).biosignature, 25.0);

        let puffy = PlanetRecord {
            mass: Some(1.0),
            radius: Some(2.0),
            ..PlanetRecord::default()
        };
        assert_eq!(score_planet(&puffy, &config).biosignature, 20.0);
    }

    #[test]
    fn activity_follows_age() {
        let config = ScoringConfig::default();
        let age = |a: f64| PlanetRecord {
            star_age: Some(a),
            ..PlanetRecord::default()
        };
        assert_eq!(score_planet(&age(8.0), &config).stellar_activity, 5.0);
        assert_eq!(score_planet(&age(0.5), &config).stellar_activity, -5.0);
        assert_eq!(score_planet(&age(3.0), &config).stellar_activity, 0.0);
    }

    #[test]
    fn adversarial_inputs_stay_in_range() {
        let config = ScoringConfig::default();
        let values = [
            None,
            Some(f64::NAN),
            Some(f64::INFINITY),
            Some(f64::NEG_INFINITY),
            Some(-1e300),
            Some(0.0),
            Some(1e-300),
            Some(1e300),
        ];
        for &v in &values {
            for &w in &values {
                let record = PlanetRecord {
                    orbital_period: v,
                    semi_major_axis: w,
                    radius: v,
                    mass: w,
                    eq_temp: v,
                    star_teff: w,
                    star_lum: v,
                    star_age: w,
                    j_mag: v,
                    transit_depth: w,
                    spectral_type: Some("MFGK".to_string()),
                    ..PlanetRecord::default()
                };
                let s = score_planet(&record, &config);
                assert!((0.0..=35.0).contains(&s.habitability));
                assert!((-30.0..=30.0).contains(&s.detectability));
                assert!((0.0..=25.0).contains(&s.biosignature));
                assert!((-10.0..=10.0).contains(&s.stellar_activity));
                assert!((0.0..=100.0).contains(&s.total));
            }
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let config = ScoringConfig::default();
        let records = crate::data::sample::generate_catalog(50, 7);
        let a = score_catalog(&records, &config);
        let b = score_catalog(&records, &config);
        assert_eq!(a, b);
    }
}
