//! Geographic tile indexing and the terrain elevation seam.
//!
//! Output scenery is bucketed by tile. A tile index packs the quantized
//! position as `((baseX+180) << 14) + ((baseY+90) << 6) + (y << 3) + x`,
//! where the tile width in degrees varies by latitude band (finer tiles near
//! the poles). The packing is lossy: decoding recovers the tile's south-west
//! corner, not the original coordinate.

use tracing::warn;

/// Latitude band table: `(minimum |latitude|, tile width in degrees)`,
/// checked top-down.
const LATITUDE_BANDS: [(f64, f64); 7] = [
    (89.0, 12.0),
    (86.0, 4.0),
    (83.0, 2.0),
    (76.0, 1.0),
    (62.0, 0.5),
    (22.0, 0.25),
    (0.0, 0.125),
];

fn band_width(lat_abs: f64) -> f64 {
    for (min, width) in LATITUDE_BANDS {
        if lat_abs >= min {
            return width;
        }
    }
    0.125
}

/// Pack a coordinate into its tile index, or `None` when out of range.
pub fn tile_index(lat: f64, lon: f64) -> Option<i32> {
    if lat.abs() > 90.0 || lon.abs() > 180.0 {
        warn!(lat, lon, "latitude or longitude out of range");
        return None;
    }
    let width = band_width(lat.abs());
    let base_x = ((lon / width).floor() * width).floor() as i32;
    let x = ((lon - base_x as f64) / width).floor() as i32;
    let base_y = lat.floor() as i32;
    let y = ((lat - base_y as f64) * 8.0).trunc() as i32;
    Some(((base_x + 180) << 14) + ((base_y + 90) << 6) + (y << 3) + x)
}

/// Recover the (south-west corner) coordinate of a tile index.
pub fn tile_lat_lon(index: i32) -> (f64, f64) {
    let x = index & 0b111;
    let y = (index >> 3) & 0b111;
    let base_y = ((index >> 6) & 0xFF) - 90;
    let base_x = (index >> 14) - 180;
    let width = band_width((base_y as f64).abs());
    (base_y as f64 + y as f64 / 8.0, base_x as f64 + x as f64 * width)
}

/// The two-level scenery directory for a coordinate, e.g. `w130n30/w123n37`.
pub fn tile_directory(lat: f64, lon: f64) -> String {
    let lon_hemi = if lon >= 0.0 { 'e' } else { 'w' };
    let lat_hemi = if lat >= 0.0 { 'n' } else { 's' };
    let lon10 = ((lon / 10.0).floor() * 10.0).abs() as i32;
    let lat10 = ((lat / 10.0).floor() * 10.0).abs() as i32;
    let lon1 = lon.floor().abs() as i32;
    let lat1 = lat.floor().abs() as i32;
    format!("{lon_hemi}{lon10:03}{lat_hemi}{lat10:02}/{lon_hemi}{lon1:03}{lat_hemi}{lat1:02}")
}

/// Terrain elevation lookup used to adjust ground-relative placement
/// altitudes. Implementations may fetch real terrain meshes; the pipeline
/// itself only depends on this seam.
pub trait ElevationSource {
    /// Elevation in meters at a coordinate.
    fn elevation(&self, latitude: f64, longitude: f64) -> f64;
}

/// Elevation source that reports sea level everywhere.
pub struct NullElevation;

impl ElevationSource for NullElevation {
    fn elevation(&self, _latitude: f64, _longitude: f64) -> f64 {
        0.0
    }
}

/// Adapter wrapping a closure as an [`ElevationSource`].
pub struct ElevationWithCallback<F> {
    callback: F,
}

impl<F> ElevationWithCallback<F>
where
    F: Fn(f64, f64) -> f64,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ElevationSource for ElevationWithCallback<F>
where
    F: Fn(f64, f64) -> f64,
{
    fn elevation(&self, latitude: f64, longitude: f64) -> f64 {
        (self.callback)(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_widths() {
        assert_eq!(band_width(0.0), 0.125);
        assert_eq!(band_width(21.9), 0.125);
        assert_eq!(band_width(22.0), 0.25);
        assert_eq!(band_width(63.0), 0.5);
        assert_eq!(band_width(89.5), 12.0);
    }

    #[test]
    fn tile_round_trip_within_quantization() {
        let samples = [
            (0.05, 0.05),
            (37.62, -122.38),
            (51.47, -0.45),
            (-33.95, 151.18),
            (64.15, -21.94),
            (78.25, 15.49),
            (89.5, 10.0),
            (-89.5, -170.0),
        ];
        for (lat, lon) in samples {
            let index = tile_index(lat, lon).unwrap();
            let (lat2, lon2) = tile_lat_lon(index);
            let width = band_width(lat2.abs().max(lat.abs()));
            assert!(
                (lat - lat2).abs() <= 0.125 + 1e-9,
                "lat {lat} decoded as {lat2}"
            );
            assert!(
                (lon - lon2).abs() <= width + 1e-9,
                "lon {lon} decoded as {lon2} (width {width})"
            );
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(tile_index(90.5, 0.0).is_none());
        assert!(tile_index(0.0, -180.5).is_none());
        assert!(tile_index(90.0, 180.0).is_some());
    }

    #[test]
    fn directory_layout() {
        assert_eq!(tile_directory(37.62, -122.38), "w130n30/w123n37");
        assert_eq!(tile_directory(-33.95, 151.18), "e150s40/e151s34");
        assert_eq!(tile_directory(0.5, 0.5), "e000n00/e000n00");
    }

    #[test]
    fn callback_elevation() {
        let source = ElevationWithCallback::new(|lat, _lon| lat * 2.0);
        assert_eq!(source.elevation(10.0, 0.0), 20.0);
        assert_eq!(NullElevation.elevation(45.0, 45.0), 0.0);
    }
}
