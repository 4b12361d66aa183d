use super::CoordinateSystem;
use crate::prelude::{LmaError, LmaResult};
use serde::{Deserialize, Serialize};

pub const WGS84_EQUATORIAL_RADIUS: f64 = 6_378_137.0;
pub const WGS84_POLAR_RADIUS: f64 = 6_356_752.314_245_179;

const MAX_BISECTIONS: usize = 256;

/// Geodetic longitude (deg), latitude (deg) and height above the ellipsoid
/// (m) on an ellipsoid of revolution.
///
/// Either radius may be overridden. The inverse conversion projects onto the
/// meridian ellipse, so it also works for prolate radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicSystem {
    r_equator: f64,
    r_pole: f64,
}

impl Default for GeographicSystem {
    fn default() -> Self {
        Self {
            r_equator: WGS84_EQUATORIAL_RADIUS,
            r_pole: WGS84_POLAR_RADIUS,
        }
    }
}

impl GeographicSystem {
    pub fn new(r_equator: Option<f64>, r_pole: Option<f64>) -> LmaResult<Self> {
        let system = Self {
            r_equator: r_equator.unwrap_or(WGS84_EQUATORIAL_RADIUS),
            r_pole: r_pole.unwrap_or(WGS84_POLAR_RADIUS),
        };
        for (label, radius) in [("equatorial", system.r_equator), ("polar", system.r_pole)] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(LmaError::InvalidInput(format!(
                    "{} radius must be positive, got {}",
                    label, radius
                )));
            }
        }
        Ok(system)
    }

    pub fn r_equator(&self) -> f64 {
        self.r_equator
    }

    pub fn r_pole(&self) -> f64 {
        self.r_pole
    }

    fn eccentricity_sq(&self) -> f64 {
        1.0 - (self.r_pole / self.r_equator).powi(2)
    }

    /// Latitude (rad) and signed height of a meridian-plane point
    /// `(p, z)` with `p >= 0`.
    fn meridian_position(&self, p: f64, z: f64) -> (f64, f64) {
        let a = self.r_equator;
        let b = self.r_pole;

        if p == 0.0 && z == 0.0 {
            return if a <= b {
                (0.0, -a)
            } else {
                (std::f64::consts::FRAC_PI_2, -b)
            };
        }
        if p == 0.0 {
            return (std::f64::consts::FRAC_PI_2.copysign(z), z.abs() - b);
        }
        if z == 0.0 {
            return (0.0, p - a);
        }

        let y0 = p;
        let y1 = z.abs();
        let a2 = a * a;
        let b2 = b * b;
        let residual = |t: f64| (a * y0 / (t + a2)).powi(2) + (b * y1 / (t + b2)).powi(2) - 1.0;

        let outside = residual(0.0) >= 0.0;
        let (mut lo, mut hi) = if outside {
            (0.0, (a * y0).hypot(b * y1))
        } else {
            let (minor, coord) = if a < b {
                (a, y0)
            } else if b < a {
                (b, y1)
            } else {
                (a, y0.hypot(y1))
            };
            (-minor * minor + minor * coord, 0.0)
        };

        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if mid == lo || mid == hi {
                break;
            }
            if residual(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let t = 0.5 * (lo + hi);

        // Foot point on the ellipse; the offset to it runs along the normal.
        let x0 = a2 * y0 / (t + a2);
        let x1 = b2 * y1 / (t + b2);
        let normal = (x0 / a2).hypot(x1 / b2);
        let lat = (x1 * a2).atan2(x0 * b2);
        (lat.copysign(z), t * normal)
    }
}

impl CoordinateSystem for GeographicSystem {
    /// `(lon, lat, alt)` to ECEF.
    fn to_ecef(&self, lon: f64, lat: f64, alt: f64) -> (f64, f64, f64) {
        let lat = lat.to_radians();
        let lon = lon.to_radians();
        let e2 = self.eccentricity_sq();
        let n = self.r_equator / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let x = (n + alt) * lat.cos() * lon.cos();
        let y = (n + alt) * lat.cos() * lon.sin();
        let z = (n * (1.0 - e2) + alt) * lat.sin();
        (x, y, z)
    }

    /// ECEF to `(lon, lat, alt)`.
    fn from_ecef(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let lon = y.atan2(x);
        let (lat, alt) = self.meridian_position(x.hypot(y), z);
        (lon.to_degrees(), lat.to_degrees(), alt)
    }
}
