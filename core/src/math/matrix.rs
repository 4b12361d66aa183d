use nalgebra::Matrix3;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Rotation taking ECEF offsets into local east/north/up axes at a
    /// geodetic latitude/longitude (degrees). Rows are the unit east, north
    /// and up vectors.
    #[rustfmt::skip]
    pub fn enu_rotation(lat_deg: f64, lon_deg: f64) -> Matrix3<f64> {
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
        Matrix3::new(
            -sin_lon, cos_lon, 0.0,
            -sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat,
            cos_lat * cos_lon, cos_lat * sin_lon, sin_lat,
        )
    }
}
