use crate::{
    error::{SolarMapError, SolarMapResult},
    geo::{haversine_radians, BoundingBox, Coord, HilbertRTree, EARTH_RADIUS_M},
};
use crossbeam_channel::{bounded, unbounded};
use log::{debug, warn};
use std::{ops::ControlFlow, ops::Range, thread};

const CHANNEL_SIZE: usize = 100;
const POINTS_PER_CHUNK: usize = 2_048;

/// The two knobs of the density clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// The neighborhood radius in meters.
    pub eps_meters: f64,
    /// The number of points (including itself) that must be inside a point's neighborhood for
    /// it to be a core point of a cluster.
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            eps_meters: 500.0,
            min_samples: 10,
        }
    }
}

impl ClusterParams {
    /// The neighborhood radius as an angle on the unit sphere.
    pub fn eps_radians(&self) -> f64 {
        self.eps_meters / EARTH_RADIUS_M
    }

    pub fn validate(&self) -> SolarMapResult<()> {
        if !(self.eps_meters.is_finite() && self.eps_meters > 0.0) {
            return Err(SolarMapError::InvalidParameter(format!(
                "eps_meters must be a positive number, got {}",
                self.eps_meters
            )));
        }

        if self.min_samples == 0 {
            return Err(SolarMapError::InvalidParameter(
                "min_samples must be at least 1".to_owned(),
            ));
        }

        Ok(())
    }
}

/// The cluster a record was assigned to, or -1 for noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterLabel(pub i32);

impl ClusterLabel {
    /// Not a member of any cluster.
    pub const NOISE: ClusterLabel = ClusterLabel(-1);

    pub fn is_noise(self) -> bool {
        self.0 < 0
    }

    /// The cluster id, `None` for noise.
    pub fn cluster_id(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

/**
 * Label points with DBSCAN using the great circle distance between them.
 *
 * Points are compared using the haversine distance in radians with the radius converted with
 * `eps_meters / 6_371_000`. A point's neighborhood includes the point itself, and anything at
 * exactly `eps` is a neighbor.
 *
 * Clusters are numbered from zero in the order their first core point appears in `coords`. Each
 * cluster is grown from that point before the scan moves on, so a border point within reach of
 * two clusters goes to the one seeded first. Reordering the input can therefore move border
 * points between clusters, and renumber clusters, but never changes which points are core points
 * or noise.
 *
 * Because border points are taken first come first served, a core point whose other neighbors
 * are all border points already claimed by earlier clusters still starts a cluster of its own.
 * Such a cluster has fewer than `min_samples` members, at least the core point itself.
 *
 * #Returns
 * One label per input point, in the same order.
 */
pub fn dbscan_haversine(
    coords: &[Coord],
    params: &ClusterParams,
) -> SolarMapResult<Vec<ClusterLabel>> {
    params.validate()?;

    let neighborhoods = find_neighborhoods(coords, params.eps_meters)?;

    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|hood| hood.len() >= params.min_samples)
        .collect();

    let mut labels = vec![ClusterLabel::NOISE; coords.len()];
    let mut stack: Vec<usize> = vec![];
    let mut next_label = ClusterLabel(0);

    for seed in 0..coords.len() {
        if !labels[seed].is_noise() || !is_core[seed] {
            continue;
        }

        let mut current = seed;
        loop {
            if labels[current].is_noise() {
                labels[current] = next_label;

                // Only core points extend the cluster, border points are just members.
                if is_core[current] {
                    stack.extend(
                        neighborhoods[current]
                            .iter()
                            .copied()
                            .filter(|&nb| labels[nb].is_noise()),
                    );
                }
            }

            match stack.pop() {
                Some(nb) => current = nb,
                None => break,
            }
        }

        next_label = ClusterLabel(next_label.0 + 1);
    }

    debug!(
        "dbscan: {} points, {} core, {} clusters",
        coords.len(),
        is_core.iter().filter(|&&c| c).count(),
        next_label.0
    );

    Ok(labels)
}

/// Find the indexes of every point within `eps_meters` of each point, sorted by index.
///
/// The queries are spread across a pool of worker threads that share the spatial index. Results
/// are stored by point index, so the output does not depend on how the work was scheduled.
fn find_neighborhoods(coords: &[Coord], eps_meters: f64) -> SolarMapResult<Vec<Vec<usize>>> {
    let tree = match HilbertRTree::build_for(coords) {
        Some(tree) => tree,
        None => return Ok(vec![]),
    };

    let radians: Vec<(f64, f64)> = coords.iter().map(|c| c.to_radians()).collect();
    let eps_radians = eps_meters / EARTH_RADIUS_M;

    let num_chunks = (coords.len() + POINTS_PER_CHUNK - 1) / POINTS_PER_CHUNK;
    let num_workers = num_cpus::get().clamp(1, num_chunks);

    let (to_workers, from_main) = unbounded::<Range<usize>>();
    for start in (0..coords.len()).step_by(POINTS_PER_CHUNK) {
        // Can't fail, the receiver is still alive.
        let _ = to_workers.send(start..(start + POINTS_PER_CHUNK).min(coords.len()));
    }
    drop(to_workers);

    let query = |idx: usize| -> Vec<usize> {
        neighborhood(idx, coords, &radians, &tree, eps_meters, eps_radians)
    };

    if num_workers == 1 {
        return Ok((0..coords.len()).map(query).collect());
    }

    debug!("neighbor search with {} worker threads", num_workers);

    thread::scope(|s| {
        let (to_main, from_workers) = bounded::<(usize, Vec<Vec<usize>>)>(CHANNEL_SIZE);

        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let from_main = from_main.clone();
            let to_main = to_main.clone();
            let query = &query;

            let spawned = thread::Builder::new()
                .name("dbscan-neighbors".to_owned())
                .spawn_scoped(s, move || {
                    for chunk in from_main {
                        let start = chunk.start;
                        let hoods: Vec<Vec<usize>> = chunk.map(query).collect();
                        if to_main.send((start, hoods)).is_err() {
                            break;
                        }
                    }
                });

            match spawned {
                Ok(jh) => handles.push(jh),
                Err(err) if !handles.is_empty() => {
                    warn!("continuing with {} neighbor workers: {}", handles.len(), err);
                    break;
                }
                Err(err) => return Err(SolarMapError::from(err)),
            }
        }
        drop(to_main);

        let mut neighborhoods = vec![Vec::new(); coords.len()];
        for (start, hoods) in from_workers {
            for (offset, hood) in hoods.into_iter().enumerate() {
                neighborhoods[start + offset] = hood;
            }
        }

        for jh in handles {
            if let Err(panic) = jh.join() {
                std::panic::resume_unwind(panic);
            }
        }

        Ok(neighborhoods)
    })
}

fn neighborhood(
    idx: usize,
    coords: &[Coord],
    radians: &[(f64, f64)],
    tree: &HilbertRTree,
    eps_meters: f64,
    eps_radians: f64,
) -> Vec<usize> {
    // Pad the search box a hair so points sitting right on the radius aren't lost to round off.
    let region = BoundingBox::around(coords[idx], eps_meters * (1.0 + 1.0e-9));
    let (lat1, lon1) = radians[idx];

    let mut hood = tree.foreach(region, Vec::new(), |other, mut hood| {
        let (lat2, lon2) = radians[other];
        if haversine_radians(lat1, lon1, lat2, lon2) <= eps_radians {
            hood.push(other);
        }
        ControlFlow::Continue(hood)
    });

    hood.sort_unstable();
    hood
}

#[cfg(test)]
mod test {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coord {
        Coord { lat, lon }
    }

    /// Points spread out on a small grid around a center with ~11 meter spacing.
    fn blob(lat: f64, lon: f64, n: usize) -> Vec<Coord> {
        (0..n)
            .map(|i| coord(lat + (i / 5) as f64 * 1.0e-4, lon + (i % 5) as f64 * 1.0e-4))
            .collect()
    }

    fn brute_force_neighborhoods(coords: &[Coord], eps_meters: f64) -> Vec<Vec<usize>> {
        let eps = eps_meters / EARTH_RADIUS_M;
        coords
            .iter()
            .map(|a| {
                let (lat1, lon1) = a.to_radians();
                coords
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| {
                        let (lat2, lon2) = b.to_radians();
                        haversine_radians(lat1, lon1, lat2, lon2) <= eps
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_two_points_and_noise() {
        let coords = [coord(28.0, 77.0), coord(28.0001, 77.0001), coord(28.5, 77.5)];
        let params = ClusterParams {
            eps_meters: 500.0,
            min_samples: 2,
        };

        let labels = dbscan_haversine(&coords, &params).unwrap();
        assert_eq!(labels, vec![ClusterLabel(0), ClusterLabel(0), ClusterLabel::NOISE]);
    }

    #[test]
    fn test_separate_blobs() {
        let mut coords = blob(28.0, 77.0, 15);
        coords.extend(blob(28.2, 77.3, 12));
        coords.push(coord(10.0, 10.0));
        coords.extend(blob(-33.9, 151.2, 3));

        let labels = dbscan_haversine(&coords, &ClusterParams::default()).unwrap();

        assert!(labels[..15].iter().all(|&l| l == ClusterLabel(0)));
        assert!(labels[15..27].iter().all(|&l| l == ClusterLabel(1)));
        // Too few points to be dense.
        assert!(labels[27..].iter().all(|l| l.is_noise()));
    }

    #[test]
    fn test_border_point() {
        // Four core points ~111 m apart in a line and one more ~400 m north of the last one. The
        // extra point only has itself and one other point in range, so it is not core, but a core
        // point can reach it.
        let mut coords: Vec<Coord> = (0..4).map(|i| coord(-0.001 * f64::from(i), 0.0)).collect();
        coords.push(coord(0.0036, 0.0));
        let params = ClusterParams {
            eps_meters: 500.0,
            min_samples: 4,
        };

        let labels = dbscan_haversine(&coords, &params).unwrap();
        assert!(labels.iter().all(|&l| l == ClusterLabel(0)), "{:?}", labels);

        // Move it out of range and it becomes noise.
        coords[4] = coord(0.0050, 0.0);
        let labels = dbscan_haversine(&coords, &params).unwrap();
        assert!(labels[..4].iter().all(|&l| l == ClusterLabel(0)));
        assert_eq!(labels[4], ClusterLabel::NOISE);
    }

    #[test]
    fn test_border_points_claimed_first() {
        const M_PER_DEG: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        let at = |east: f64, north: f64| coord(north / M_PER_DEG, east / M_PER_DEG);

        // Three arms around a center point, 120 degrees apart. Each arm has a border point 90 m
        // out and a line of core points from 180 m out spaced 45 m apart. With eps = 100 m the
        // center sees only the three border points, enough to be core with min_samples = 4.
        let dirs = [(0.0, 1.0), (-0.866_025, -0.5), (0.866_025, -0.5)];

        let mut arms = Vec::new();
        let mut borders = Vec::new();
        for &(e, n) in &dirs {
            for i in 0..5 {
                let r = 180.0 + 45.0 * f64::from(i);
                arms.push(at(e * r, n * r));
            }
            borders.push(at(e * 90.0, n * 90.0));
        }
        let center = at(0.0, 0.0);

        let params = ClusterParams {
            eps_meters: 100.0,
            min_samples: 4,
        };

        // Arms first: they claim the border points, leaving the center a cluster of one.
        let mut coords = arms.clone();
        coords.extend(borders.iter().copied());
        coords.push(center);

        let labels = dbscan_haversine(&coords, &params).unwrap();
        let center_label = labels[coords.len() - 1];
        assert_eq!(center_label, ClusterLabel(3));
        assert_eq!(labels.iter().filter(|&&l| l == center_label).count(), 1);
        for arm in 0..3 {
            assert_eq!(labels[15 + arm], ClusterLabel(arm as i32));
        }

        // Center first: it claims all three border points.
        let mut coords = vec![center];
        coords.extend(borders.iter().copied());
        coords.extend(arms.iter().copied());

        let labels = dbscan_haversine(&coords, &params).unwrap();
        assert!(labels[..4].iter().all(|&l| l == ClusterLabel(0)), "{:?}", labels);
        assert!(labels.iter().all(|l| !l.is_noise()));
        assert_eq!(labels.iter().filter(|&&l| l == ClusterLabel(0)).count(), 4);
    }

    #[test]
    fn test_chain_connects() {
        // A line of points 300 m apart, each one only reaches its neighbors.
        let step = 300.0 / EARTH_RADIUS_M * 180.0 / std::f64::consts::PI;
        let coords: Vec<Coord> = (0..30).map(|i| coord(f64::from(i) * step, 45.0)).collect();
        let params = ClusterParams {
            eps_meters: 350.0,
            min_samples: 3,
        };

        let labels = dbscan_haversine(&coords, &params).unwrap();

        // The ends only have 2 points in range so they are border points, but still members.
        assert!(labels.iter().all(|&l| l == ClusterLabel(0)), "{:?}", labels);
    }

    #[test]
    fn test_neighborhoods_match_brute_force() {
        // Enough points to use several chunks of work.
        let mut coords = Vec::new();
        for i in 0..3_000 {
            let i = f64::from(i);
            coords.push(coord(
                12.9 + (i * 0.618_034).fract() * 0.05,
                77.5 + (i * 0.414_214).fract() * 0.05,
            ));
        }

        let fast = find_neighborhoods(&coords, 400.0).unwrap();
        let slow = brute_force_neighborhoods(&coords, 400.0);
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_empty_input() {
        let labels = dbscan_haversine(&[], &ClusterParams::default()).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_bad_params() {
        let coords = [coord(0.0, 0.0)];

        for eps_meters in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let params = ClusterParams {
                eps_meters,
                min_samples: 2,
            };
            assert!(matches!(
                dbscan_haversine(&coords, &params),
                Err(SolarMapError::InvalidParameter(_))
            ));
        }

        let params = ClusterParams {
            eps_meters: 500.0,
            min_samples: 0,
        };
        assert!(dbscan_haversine(&coords, &params).is_err());
    }

    #[test]
    fn test_labels() {
        assert!(ClusterLabel::NOISE.is_noise());
        assert_eq!(ClusterLabel::NOISE.cluster_id(), None);
        assert_eq!(ClusterLabel(3).cluster_id(), Some(3));
    }
}
