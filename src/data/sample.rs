//! Synthetic exoplanet catalog for offline runs, demos and tests.
//!
//! Stars are drawn per spectral class, planets from a log-normal radius
//! distribution on log-uniform orbits; derived quantities (period, equilibrium
//! temperature, transit depth) follow from the drawn values so the catalog is
//! physically self-consistent. A fraction of cells is blanked to mimic the
//! archive's missing data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};

use crate::domain::PlanetRecord;

/// Probability that any optional numeric cell is left empty.
const MISSING_PROB: f64 = 0.08;

/// Earth radii per solar radius.
const EARTH_PER_SUN_RADIUS: f64 = 109.1;

struct StellarClass {
    letter: char,
    weight: f64,
    teff: (f64, f64),
    radius: (f64, f64),
    mass: (f64, f64),
}

const CLASSES: [StellarClass; 4] = [
    StellarClass {
        letter: 'M',
        weight: 0.40,
        teff: (2600.0, 3900.0),
        radius: (0.12, 0.6),
        mass: (0.1, 0.6),
    },
    StellarClass {
        letter: 'K',
        weight: 0.25,
        teff: (3900.0, 5300.0),
        radius: (0.6, 0.9),
        mass: (0.6, 0.9),
    },
    StellarClass {
        letter: 'G',
        weight: 0.25,
        teff: (5300.0, 6000.0),
        radius: (0.85, 1.2),
        mass: (0.85, 1.15),
    },
    StellarClass {
        letter: 'F',
        weight: 0.10,
        teff: (6000.0, 7200.0),
        radius: (1.15, 1.7),
        mass: (1.1, 1.6),
    },
];

/// Generate `n` planets deterministically from `seed`.
pub fn generate_catalog(n: usize, seed: u64) -> Vec<PlanetRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    // ln-space mean and std.
    let radius_dist = LogNormal::<f64>::new(0.4, 0.75).ok();

    let mut out = Vec::with_capacity(n);
    let mut host = 0usize;
    let mut planets_left = 0usize;
    let mut star = draw_star(&mut rng);
    let mut letter = b'b';

    for _ in 0..n {
        if planets_left == 0 {
            host += 1;
            planets_left = rng.gen_range(1..=3);
            star = draw_star(&mut rng);
            letter = b'b';
        }
        planets_left -= 1;

        let radius: f64 = radius_dist
            .as_ref()
            .map(|d| d.sample(&mut rng))
            .unwrap_or(1.5)
            .clamp(0.4, 20.0);
        let mass = mass_from_radius(radius) * rng.gen_range(0.7..1.3);
        let a: f64 = 10f64.powf(rng.gen_range(-2.0..0.5));
        let period = 365.25 * (a.powi(3) / star.mass).sqrt();
        let eq_temp = 278.6 * star.lum.powf(0.25) / a.sqrt() * 0.7f64.powf(0.25);
        let transit_depth = (radius / (star.radius * EARTH_PER_SUN_RADIUS)).powi(2) * 1e6;

        let host_name = format!("SYN-{host:04}");
        let planet_name = format!("{host_name} {}", letter as char);
        letter = letter.saturating_add(1);

        let mut maybe = |v: f64| (!rng.gen_bool(MISSING_PROB)).then_some(v);
        out.push(PlanetRecord {
            planet_name: Some(planet_name),
            host_name: Some(host_name),
            orbital_period: maybe(period),
            semi_major_axis: maybe(a),
            radius: maybe(radius),
            mass: maybe(mass),
            eq_temp: maybe(eq_temp),
            star_teff: maybe(star.teff),
            star_lum: maybe(star.lum),
            star_radius: maybe(star.radius),
            star_mass: maybe(star.mass),
            star_age: maybe(star.age),
            spectral_type: Some(star.spectral_type.clone()),
            j_mag: maybe(star.j_mag),
            k_mag: maybe(star.k_mag),
            transit_depth: maybe(transit_depth),
            disc_year: maybe(star.disc_year),
        });
    }

    out
}

#[derive(Debug, Clone)]
struct SyntheticStar {
    teff: f64,
    lum: f64,
    radius: f64,
    mass: f64,
    age: f64,
    spectral_type: String,
    j_mag: f64,
    k_mag: f64,
    disc_year: f64,
}

fn draw_star(rng: &mut StdRng) -> SyntheticStar {
    let mut u = rng.gen_range(0.0..1.0);
    let mut class = &CLASSES[0];
    for c in &CLASSES {
        class = c;
        if u < c.weight {
            break;
        }
        u -= c.weight;
    }

    // Position within the class drives temperature, size and mass together.
    let t: f64 = rng.gen_range(0.0..1.0);
    let lerp = |(lo, hi): (f64, f64)| lo + t * (hi - lo);
    let teff = lerp(class.teff);
    let radius = lerp(class.radius);
    let mass = lerp(class.mass);
    let lum = radius * radius * (teff / 5778.0).powi(4);
    let subclass = ((1.0 - t) * 9.0).round() as u8;
    let j_mag = rng.gen_range(5.0..16.0);

    SyntheticStar {
        teff,
        lum,
        radius,
        mass,
        age: rng.gen_range(0.1..12.0),
        spectral_type: format!("{}{} V", class.letter, subclass),
        j_mag,
        k_mag: j_mag - rng.gen_range(0.2..0.9),
        disc_year: rng.gen_range(1995..=2025) as f64,
    }
}

/// Piecewise mass-radius relation (Earth units).
fn mass_from_radius(radius: f64) -> f64 {
    if radius < 1.5 {
        radius.powf(3.7)
    } else if radius < 4.0 {
        2.7 * radius.powf(1.3)
    } else {
        (radius / 4.0).powf(1.5) * 17.0
    }
}
