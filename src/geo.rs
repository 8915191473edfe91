/*!
 * Geographic calculations.
 *
 * Simple spherical-Earth geometry for connection locations plus a packed Hilbert R-tree for
 * finding everything near a point without comparing every pair of points.
 */
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use hilbert_rtree::HilbertRTree;

mod hilbert_rtree;

/// Mean radius of the Earth in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl Coord {
    /// Are these coordinates within `eps` degrees of each other in both lat and lon?
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() <= eps && (self.lon - other.lon).abs() <= eps
    }

    /// Convert to (lat, lon) in radians.
    pub fn to_radians(self) -> (f64, f64) {
        (self.lat * DEG2RAD, self.lon * DEG2RAD)
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A latitude-longitude aligned box described by its lower left and upper right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// The lower left (southwest) corner.
    pub ll: Coord,
    /// The upper right (northeast) corner.
    pub ur: Coord,
}

impl BoundingBox {
    /// A box that is inside out so that expanding it with anything gives that thing's box.
    pub(crate) fn empty() -> Self {
        BoundingBox {
            ll: Coord {
                lat: f64::INFINITY,
                lon: f64::INFINITY,
            },
            ur: Coord {
                lat: -f64::INFINITY,
                lon: -f64::INFINITY,
            },
        }
    }

    /// Grow this box so it also covers `other`.
    pub(crate) fn expand(&mut self, other: &BoundingBox) {
        self.ll.lat = self.ll.lat.min(other.ll.lat);
        self.ll.lon = self.ll.lon.min(other.ll.lon);
        self.ur.lat = self.ur.lat.max(other.ur.lat);
        self.ur.lon = self.ur.lon.max(other.ur.lon);
    }

    /// Do these boxes overlap?
    ///
    /// Boxes that only share an edge count as overlapping, and `eps` is added to that tolerance.
    pub fn overlap(&self, other: &BoundingBox, eps: f64) -> bool {
        let lat_overlap = self.ll.lat <= other.ur.lat + eps && other.ll.lat <= self.ur.lat + eps;
        let lon_overlap = self.ll.lon <= other.ur.lon + eps && other.ll.lon <= self.ur.lon + eps;

        lat_overlap && lon_overlap
    }

    /// Is the coordinate inside or on the edge of this box?
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }

    /**
     * Build a box that contains every point within `radius_m` meters (great circle) of `center`.
     *
     * The box is conservative, it may contain points farther away than `radius_m`, so candidates
     * found with it still need an exact distance check. Near the poles, or when the box would
     * wrap across the antimeridian, the box covers the full range of longitudes.
     */
    pub fn around(center: Coord, radius_m: f64) -> Self {
        let dlat = (radius_m / EARTH_RADIUS_M) / DEG2RAD;

        let min_lat = center.lat - dlat;
        let max_lat = center.lat + dlat;

        let (min_lon, max_lon) = if min_lat <= -90.0 || max_lat >= 90.0 {
            (-180.0, 180.0)
        } else {
            // Use the latitude closest to the pole, that is where a degree of longitude is
            // shortest.
            let widest_lat = min_lat.abs().max(max_lat.abs()) * DEG2RAD;
            let dlon = dlat / widest_lat.cos();

            let min_lon = center.lon - dlon;
            let max_lon = center.lon + dlon;

            if min_lon < -180.0 || max_lon > 180.0 || dlon >= 180.0 {
                (-180.0, 180.0)
            } else {
                (min_lon, max_lon)
            }
        };

        BoundingBox {
            ll: Coord {
                lat: min_lat.max(-90.0),
                lon: min_lon,
            },
            ur: Coord {
                lat: max_lat.min(90.0),
                lon: max_lon,
            },
        }
    }
}

impl Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <---> {}", self.ll, self.ur)
    }
}

/// Anything that has a location and extent that can be stored in the spatial index.
pub trait Geo {
    /// The representative point of the item.
    fn centroid(&self) -> Coord;

    /// The smallest box that contains the item.
    fn bounding_box(&self) -> BoundingBox;
}

impl Geo for Coord {
    fn centroid(&self) -> Coord {
        *self
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            ll: *self,
            ur: *self,
        }
    }
}

/**
 * The haversine distance between two points given in radians.
 *
 * #Arguments
 * * lat1, lon1 - the first point in radians.
 * * lat2, lon2 - the second point in radians.
 *
 * #Returns
 * The central angle between the points in radians. Multiply by a radius to get a distance.
 */
pub fn haversine_radians(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let sin_dlat = f64::sin((lat2 - lat1) / 2.0);
    let sin_dlon = f64::sin((lon2 - lon1) / 2.0);

    let a = sin_dlat * sin_dlat + sin_dlon * sin_dlon * f64::cos(lat1) * f64::cos(lat2);

    // Rounding can push `a` a hair past 1.0 for antipodal points.
    2.0 * f64::asin(f64::sqrt(a.min(1.0)))
}

/**
 * The simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in meters.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_radians(
        lat1 * DEG2RAD,
        lon1 * DEG2RAD,
        lat2 * DEG2RAD,
        lon2 * DEG2RAD,
    ) * EARTH_RADIUS_M
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude is about 111.2 km everywhere.
        let d = great_circle_distance(10.0, 20.0, 11.0, 20.0);
        assert!((d - 111_194.9).abs() < 1.0, "{}", d);

        assert_eq!(great_circle_distance(45.0, -120.0, 45.0, -120.0), 0.0);

        // Symmetric
        let a = great_circle_distance(28.0, 77.0, 28.5, 77.5);
        let b = great_circle_distance(28.5, 77.5, 28.0, 77.0);
        assert!((a - b).abs() < 1.0e-6);

        // Antipodal points are half way around the globe.
        let d = great_circle_distance(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0e-3);
    }

    #[test]
    fn test_around_contains_the_circle() {
        let center = Coord {
            lat: 60.0,
            lon: 10.0,
        };
        let radius = 5_000.0;
        let mut bbox = BoundingBox::around(center, radius);

        // Round off at the north and south extremes shouldn't fail the test.
        bbox.ll.lat -= 1.0e-9;
        bbox.ur.lat += 1.0e-9;

        // Walk around the circle and make sure every point on it is in the box.
        for step in 0..360 {
            let bearing = (step as f64) * DEG2RAD;
            let (lat1, lon1) = center.to_radians();
            let delta = radius / EARTH_RADIUS_M;

            let lat2 = f64::asin(
                lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos(),
            );
            let lon2 = lon1
                + f64::atan2(
                    bearing.sin() * delta.sin() * lat1.cos(),
                    delta.cos() - lat1.sin() * lat2.sin(),
                );

            let pnt = Coord {
                lat: lat2 / DEG2RAD,
                lon: lon2 / DEG2RAD,
            };
            assert!(bbox.contains(pnt), "{} not in {}", pnt, bbox);
        }
    }

    #[test]
    fn test_around_wraps() {
        let near_pole = BoundingBox::around(Coord { lat: 89.999, lon: 0.0 }, 500.0);
        assert_eq!(near_pole.ll.lon, -180.0);
        assert_eq!(near_pole.ur.lon, 180.0);
        assert!(near_pole.ur.lat <= 90.0);

        let dateline = BoundingBox::around(
            Coord {
                lat: 0.0,
                lon: 179.999,
            },
            500.0,
        );
        assert_eq!(dateline.ll.lon, -180.0);
        assert_eq!(dateline.ur.lon, 180.0);
    }

    #[test]
    fn test_overlap() {
        let a = BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: 1.0, lon: 1.0 },
        };
        let b = BoundingBox {
            ll: Coord { lat: 1.0, lon: 1.0 },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };
        let c = BoundingBox {
            ll: Coord { lat: 1.5, lon: 1.5 },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };

        assert!(a.overlap(&b, 0.0));
        assert!(!a.overlap(&c, 0.0));
        assert!(a.overlap(&c, 0.6));
    }
}
