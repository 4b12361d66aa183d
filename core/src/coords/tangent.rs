use super::{CoordinateSystem, GeographicSystem};
use crate::math::MatrixHelper;
use nalgebra::{Matrix3, Vector3};

/// Local east/north/up Cartesian frame (metres) tangent to the ellipsoid at
/// a reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentPlaneCartesianSystem {
    ctr_lat: f64,
    ctr_lon: f64,
    ctr_alt: f64,
    center: Vector3<f64>,
    rotation: Matrix3<f64>,
}

impl TangentPlaneCartesianSystem {
    pub fn new(ctr_lat: f64, ctr_lon: f64, ctr_alt: f64) -> Self {
        Self::with_system(&GeographicSystem::default(), ctr_lat, ctr_lon, ctr_alt)
    }

    pub fn with_system(geo: &GeographicSystem, ctr_lat: f64, ctr_lon: f64, ctr_alt: f64) -> Self {
        let (x, y, z) = geo.to_ecef(ctr_lon, ctr_lat, ctr_alt);
        Self {
            ctr_lat,
            ctr_lon,
            ctr_alt,
            center: Vector3::new(x, y, z),
            rotation: MatrixHelper::enu_rotation(ctr_lat, ctr_lon),
        }
    }

    pub fn center(&self) -> (f64, f64, f64) {
        (self.ctr_lat, self.ctr_lon, self.ctr_alt)
    }
}

impl CoordinateSystem for TangentPlaneCartesianSystem {
    fn to_ecef(&self, east: f64, north: f64, up: f64) -> (f64, f64, f64) {
        let ecef = self.rotation.transpose() * Vector3::new(east, north, up) + self.center;
        (ecef.x, ecef.y, ecef.z)
    }

    fn from_ecef(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let local = self.rotation * (Vector3::new(x, y, z) - self.center);
        (local.x, local.y, local.z)
    }
}
