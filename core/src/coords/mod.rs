//! Coordinate systems that convert to and from Earth-centred, Earth-fixed
//! (ECEF) Cartesian coordinates in metres.

pub mod geographic;
pub mod projection;
pub mod tangent;

pub use geographic::GeographicSystem;
pub use projection::MapProjection;
pub use tangent::TangentPlaneCartesianSystem;

use crate::prelude::{LmaError, LmaResult};

/// Columns of three coordinates, e.g. (lon, lat, alt) or (x, y, z).
pub type Triplets = (Vec<f64>, Vec<f64>, Vec<f64>);

pub trait CoordinateSystem {
    fn to_ecef(&self, a: f64, b: f64, c: f64) -> (f64, f64, f64);
    fn from_ecef(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64);

    fn to_ecef_many(&self, a: &[f64], b: &[f64], c: &[f64]) -> LmaResult<Triplets> {
        apply_many(a, b, c, |a, b, c| self.to_ecef(a, b, c))
    }

    fn from_ecef_many(&self, x: &[f64], y: &[f64], z: &[f64]) -> LmaResult<Triplets> {
        apply_many(x, y, z, |x, y, z| self.from_ecef(x, y, z))
    }
}

fn apply_many(
    a: &[f64],
    b: &[f64],
    c: &[f64],
    convert: impl Fn(f64, f64, f64) -> (f64, f64, f64),
) -> LmaResult<Triplets> {
    if a.len() != b.len() || a.len() != c.len() {
        return Err(LmaError::InvalidInput(format!(
            "coordinate columns differ in length: {}, {}, {}",
            a.len(),
            b.len(),
            c.len()
        )));
    }
    let mut out = (
        Vec::with_capacity(a.len()),
        Vec::with_capacity(a.len()),
        Vec::with_capacity(a.len()),
    );
    for ((&a, &b), &c) in a.iter().zip(b).zip(c) {
        let (p, q, r) = convert(a, b, c);
        out.0.push(p);
        out.1.push(q);
        out.2.push(r);
    }
    Ok(out)
}
