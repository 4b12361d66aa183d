use super::{CoordinateSystem, GeographicSystem};
use serde::{Deserialize, Serialize};

/// Equidistant cylindrical (plate carrée) map projection centred on a
/// reference point.
///
/// Projected x/y are metres on a sphere of the equatorial radius, scaled in
/// x by the cosine of the true-scale latitude; z is height above the
/// ellipsoid. All three are offset so the reference point maps to (0, 0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapProjection {
    geo: GeographicSystem,
    ctr_lat: f64,
    ctr_lon: f64,
    ctr_alt: f64,
    lat_ts: f64,
    offset: (f64, f64, f64),
}

impl MapProjection {
    pub fn new(ctr_lat: f64, ctr_lon: f64) -> Self {
        Self::with_system(GeographicSystem::default(), ctr_lat, ctr_lon, 0.0)
    }

    pub fn with_system(geo: GeographicSystem, ctr_lat: f64, ctr_lon: f64, lat_ts: f64) -> Self {
        let mut projection = Self {
            geo,
            ctr_lat,
            ctr_lon,
            ctr_alt: 0.0,
            lat_ts,
            offset: (0.0, 0.0, 0.0),
        };
        let (ex, ey, ez) = geo.to_ecef(ctr_lon, ctr_lat, projection.ctr_alt);
        projection.offset = projection.from_ecef(ex, ey, ez);
        projection
    }

    pub fn center(&self) -> (f64, f64, f64) {
        (self.ctr_lat, self.ctr_lon, self.ctr_alt)
    }

    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let radius = self.geo.r_equator();
        (
            radius * lon.to_radians() * self.lat_ts.to_radians().cos(),
            radius * lat.to_radians(),
        )
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let radius = self.geo.r_equator();
        (
            (x / (radius * self.lat_ts.to_radians().cos())).to_degrees(),
            (y / radius).to_degrees(),
        )
    }
}

impl CoordinateSystem for MapProjection {
    fn to_ecef(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (lon, lat) = self.inverse(x + self.offset.0, y + self.offset.1);
        self.geo.to_ecef(lon, lat, z + self.offset.2)
    }

    fn from_ecef(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (lon, lat, alt) = self.geo.from_ecef(x, y, z);
        let (px, py) = self.forward(lon, lat);
        (px - self.offset.0, py - self.offset.1, alt - self.offset.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_maps_to_origin() {
        let projection = MapProjection::new(33.606968, -101.822625);
        let (ex, ey, ez) = projection.to_ecef(0.0, 0.0, 0.0);
        let (x, y, z) = projection.from_ecef(ex, ey, ez);
        assert!(x.abs() < 1e-6, "x = {}", x);
        assert!(y.abs() < 1e-6, "y = {}", y);
        assert!(z.abs() < 1e-6, "z = {}", z);
    }

    #[test]
    fn one_degree_north_is_one_degree_of_arc() {
        let projection = MapProjection::new(33.0, -101.0);
        let geo = GeographicSystem::default();
        let (ex, ey, ez) = geo.to_ecef(-101.0, 34.0, 0.0);
        let (x, y, _) = projection.from_ecef(ex, ey, ez);
        assert!(x.abs() < 1e-6);
        assert!((y - 6_378_137.0 * 1f64.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn true_scale_latitude_shrinks_x() {
        let geo = GeographicSystem::default();
        let equator = MapProjection::with_system(geo, 0.0, 0.0, 0.0);
        let scaled = MapProjection::with_system(geo, 0.0, 0.0, 60.0);
        let (ex, ey, ez) = geo.to_ecef(1.0, 0.0, 0.0);
        let (x_eq, _, _) = equator.from_ecef(ex, ey, ez);
        let (x_ts, _, _) = scaled.from_ecef(ex, ey, ez);
        assert!((x_ts - 0.5 * x_eq).abs() < 1e-6);
    }
}
