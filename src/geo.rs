//! Great-circle distance and heading arithmetic on WGS84.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two lat/lon points, in metres.
///
/// Uses the haversine formula (WGS84 mean radius, same approximation the
/// teacher crate uses for aircraft-proximity checks).
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Smallest absolute angular difference between two headings, in degrees, in `[0, 180]`.
pub fn heading_error(reference: f64, sample: f64) -> f64 {
    let diff = (reference - sample).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Circular mean of a set of headings in degrees, 0-360.
///
/// Returns `None` for an empty slice. The result is normalised to `(0, 360]`
/// (a computed 0 is remapped to 360, per the "0 means unknown" convention
/// used for `departureHeading`/`arrivalHeading`).
pub fn mean_heading(headings: &[f64]) -> Option<f64> {
    if headings.is_empty() {
        return None;
    }

    let (sin_sum, cos_sum) = headings.iter().fold((0.0, 0.0), |(s, c), h| {
        let rad = h.to_radians();
        (s + rad.sin(), c + rad.cos())
    });

    let mean_rad = sin_sum.atan2(cos_sum);
    let mut mean_deg = mean_rad.to_degrees();
    if mean_deg < 0.0 {
        mean_deg += 360.0;
    }
    if mean_deg == 0.0 {
        mean_deg = 360.0;
    }
    Some(mean_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_same_point_is_zero() {
        assert_eq!(distance(52.0, 5.0, 52.0, 5.0), 0.0);
    }

    #[test]
    fn distance_one_degree_latitude_is_about_111km() {
        let d = distance(52.0, 5.0, 53.0, 5.0);
        assert!((d - 111_195.0).abs() < 1000.0, "got {d}");
    }

    #[test]
    fn heading_error_wraps_around_north() {
        assert!((heading_error(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((heading_error(10.0, 350.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn heading_error_is_bounded_by_180() {
        assert!((heading_error(0.0, 180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn mean_heading_around_zero_does_not_cancel() {
        // Naive arithmetic mean of 350 and 10 is 180 (wrong); circular mean is ~0/360.
        let mean = mean_heading(&[350.0, 10.0]).unwrap();
        assert!(mean > 355.0 || mean < 5.0, "got {mean}");
    }

    #[test]
    fn mean_heading_remaps_zero_to_360() {
        let mean = mean_heading(&[180.0, 180.0]).unwrap();
        assert!((mean - 180.0).abs() < 1e-9);
        let mean = mean_heading(&[0.0]).unwrap();
        assert_eq!(mean, 360.0);
    }

    #[test]
    fn mean_heading_empty_is_none() {
        assert_eq!(mean_heading(&[]), None);
    }
}
