use super::*;
use std::ops::ControlFlow;

const RTREE_CHILDREN_PER_NODE: usize = 8;
const HILBERT_ITERATIONS: u32 = 16;

#[derive(Debug)]
enum RTreeNode {
    Node {
        bbox: BoundingBox,
        children: Vec<RTreeNode>,
    },
    Leaf {
        bbox: BoundingBox,
        hilbert_num: u64,
        index: usize,
    },
}

impl RTreeNode {
    fn bounding_box(&self) -> BoundingBox {
        match self {
            Self::Node { bbox, .. } => *bbox,
            Self::Leaf { bbox, .. } => *bbox,
        }
    }

    fn hilbert_num(&self) -> u64 {
        match self {
            Self::Leaf { hilbert_num, .. } => *hilbert_num,
            Self::Node { children, .. } => children
                .iter()
                .map(|node| node.hilbert_num())
                .max()
                .unwrap_or(0),
        }
    }

    fn new_node(children: Vec<Self>) -> Self {
        let mut bbox = BoundingBox::empty();
        for child in &children {
            bbox.expand(&child.bounding_box());
        }

        Self::Node { bbox, children }
    }

    /// Recursively visit the indexes of every leaf whose bounding box overlaps `region`.
    ///
    /// `visit` gets the index of the item in the slice the tree was built from along with the
    /// accumulated value. Returning `Break(..)` stops the search.
    fn foreach<V, F>(&self, region: &BoundingBox, visit: &mut F, acc: V) -> ControlFlow<V, V>
    where
        F: FnMut(usize, V) -> ControlFlow<V, V>,
    {
        if !self.bounding_box().overlap(region, 0.0) {
            return ControlFlow::Continue(acc);
        }

        match self {
            Self::Leaf { index, .. } => visit(*index, acc),
            Self::Node { children, .. } => {
                let mut acc = acc;
                for child in children {
                    match child.foreach(region, visit, acc) {
                        ControlFlow::Continue(value) => acc = value,
                        brk @ ControlFlow::Break(_) => return brk,
                    }
                }

                ControlFlow::Continue(acc)
            }
        }
    }
}

/**
 * A packed, read only R-tree ordered along a Hilbert curve.
 *
 * The tree only stores the indexes and boxes of the items it was built from, so it can be shared
 * between threads while the caller keeps ownership of the data.
 */
#[derive(Debug)]
pub struct HilbertRTree {
    root: RTreeNode,
    len: usize,
}

impl HilbertRTree {
    /// Build a tree over the provided items. Returns `None` if there are no items.
    pub fn build_for<T: Geo>(data: &[T]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let mut domain = BoundingBox::empty();
        for item in data {
            domain.expand(&item.bounding_box());
        }

        let hc = HilbertCurve::new(HILBERT_ITERATIONS, domain);

        // Build the leaf nodes - level 0
        let mut level_nodes: Vec<RTreeNode> = data
            .iter()
            .enumerate()
            .map(|(index, item)| RTreeNode::Leaf {
                bbox: item.bounding_box(),
                hilbert_num: hc.translate_to_curve_distance(item.centroid()),
                index,
            })
            .collect();

        // Sorting by Hilbert number is what gives the parent nodes their locality. A stable sort
        // keeps the tree layout independent of anything but the input order.
        level_nodes.sort_by_key(RTreeNode::hilbert_num);

        while level_nodes.len() > 1 {
            let mut parents =
                Vec::with_capacity(level_nodes.len() / RTREE_CHILDREN_PER_NODE + 1);

            let mut children = Vec::with_capacity(RTREE_CHILDREN_PER_NODE);
            for child in level_nodes {
                children.push(child);

                if children.len() == RTREE_CHILDREN_PER_NODE {
                    parents.push(RTreeNode::new_node(children));
                    children = Vec::with_capacity(RTREE_CHILDREN_PER_NODE);
                }
            }

            if !children.is_empty() {
                parents.push(RTreeNode::new_node(children));
            }

            level_nodes = parents;
        }

        let root = level_nodes.pop()?;

        Some(HilbertRTree {
            root,
            len: data.len(),
        })
    }

    /// The number of items indexed by this tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false, an empty tree is never built.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Apply a function to the index of every item with a bounding box overlapping `region`.
    ///
    /// `acc` is passed from call to call like the accumulator of `Iterator::fold`. If `visit`
    /// returns `Break(..)` the iteration stops early. The final accumulated value is returned.
    pub fn foreach<V, F>(&self, region: BoundingBox, acc: V, mut visit: F) -> V
    where
        F: FnMut(usize, V) -> ControlFlow<V, V>,
    {
        match self.root.foreach(&region, &mut visit, acc) {
            ControlFlow::Break(value) => value,
            ControlFlow::Continue(value) => value,
        }
    }

    /// Get the indexes of all the items whose bounding boxes overlap `region`.
    pub fn indexes_within(&self, region: BoundingBox) -> Vec<usize> {
        self.foreach(region, Vec::new(), |index, mut found| {
            found.push(index);
            ControlFlow::Continue(found)
        })
    }
}

#[derive(Debug)]
struct HilbertCurve {
    // The number of iterations to use for this curve, 1 to 31. Any more and there are not enough
    // bits in a u64 for the curve distance.
    iterations: u32,

    // This is the domain that the curve will cover.
    domain: BoundingBox,

    // These are needed for fast transformations from the "domain" space into the "Hilbert" space.
    max_dim: u32,
    width: f64,
    height: f64,
}

impl HilbertCurve {
    fn new(iterations: u32, domain: BoundingBox) -> Self {
        let iterations = iterations.clamp(1, 31);
        let max_dim = (1u32 << iterations) - 1;

        // A domain with no width or height happens when all the points line up, give it some room
        // so everything maps to a valid cell.
        let width = domain.ur.lon - domain.ll.lon;
        let height = domain.ur.lat - domain.ll.lat;
        let width = if width > 0.0 { width } else { 1.0 };
        let height = if height > 0.0 { height } else { 1.0 };

        Self {
            iterations,
            domain,
            max_dim,
            width,
            height,
        }
    }

    fn coords_to_integer(&self, HilbertCoord { x, y }: HilbertCoord) -> u64 {
        debug_assert!(x <= self.max_dim && y <= self.max_dim);

        let mut axes = [x, y];
        let m = 1u32 << (self.iterations - 1);

        // Inverse undo excess work
        let mut q = m;
        while q > 1 {
            let p = q - 1;
            for i in 0..axes.len() {
                if axes[i] & q != 0 {
                    axes[0] ^= p;
                } else {
                    let t = (axes[0] ^ axes[i]) & p;
                    axes[0] ^= t;
                    axes[i] ^= t;
                }
            }
            q >>= 1;
        }

        // Gray encode
        axes[1] ^= axes[0];
        let mut t = 0u32;
        q = m;
        while q > 1 {
            if axes[1] & q != 0 {
                t ^= q - 1;
            }
            q >>= 1;
        }
        axes[0] ^= t;
        axes[1] ^= t;

        // Interleave the transposed bits, x is the more significant of each pair.
        let [x, y] = axes.map(u64::from);
        (0..u64::from(self.iterations)).fold(0u64, |hilbert_int, b| {
            hilbert_int | (((x >> b) & 1) << (2 * b + 1)) | (((y >> b) & 1) << (2 * b))
        })
    }

    fn translate_to_hilbert_coords(&self, coord: Coord) -> HilbertCoord {
        let edge_len = f64::from(self.max_dim) + 1.0;

        let x = ((coord.lon - self.domain.ll.lon) / self.width * edge_len).max(0.0) as u32;
        let y = ((coord.lat - self.domain.ll.lat) / self.height * edge_len).max(0.0) as u32;

        HilbertCoord {
            x: x.min(self.max_dim),
            y: y.min(self.max_dim),
        }
    }

    fn translate_to_curve_distance(&self, coord: Coord) -> u64 {
        self.coords_to_integer(self.translate_to_hilbert_coords(coord))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HilbertCoord {
    x: u32,
    y: u32,
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit_square() -> BoundingBox {
        BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: 1.0, lon: 1.0 },
        }
    }

    #[test]
    #[rustfmt::skip]
    fn test_coords_to_integer() {
        let order_i1 = [(0, 0), (0, 1), (1, 1), (1, 0)];

        let order_i2 = [
            (0, 0), (1, 0), (1, 1), (0, 1),
            (0, 2), (0, 3), (1, 3), (1, 2),
            (2, 2), (2, 3), (3, 3), (3, 2),
            (3, 1), (2, 1), (2, 0), (3, 0),
        ];

        let hc = HilbertCurve::new(1, unit_square());
        for (dist, &(x, y)) in order_i1.iter().enumerate() {
            assert_eq!(hc.coords_to_integer(HilbertCoord { x, y }), dist as u64);
        }

        let hc = HilbertCurve::new(2, unit_square());
        for (dist, &(x, y)) in order_i2.iter().enumerate() {
            assert_eq!(hc.coords_to_integer(HilbertCoord { x, y }), dist as u64);
        }
    }

    #[test]
    #[rustfmt::skip]
    fn test_domain_mapping() {
        let domain = BoundingBox { ll: Coord { lon: -2.0, lat: 5.0 }, ur: Coord { lon: 10.0, lat: 17.0 } };

        let n2_pairs = [
            (Coord { lon: -0.5, lat:  5.5 },  0u64),
            (Coord { lon:  2.5, lat:  5.5 },  1),
            (Coord { lon:  2.5, lat:  9.5 },  2),
            (Coord { lon: -0.5, lat:  9.5 },  3),
            (Coord { lon: -0.5, lat: 12.5 },  4),
            (Coord { lon:  8.5, lat:  5.5 }, 15),

            // Corners, including ones outside the domain that get clamped.
            (Coord { lon: -2.0, lat:  5.0 },  0),
            (Coord { lon: -2.0, lat: 17.0 },  5),
            (Coord { lon: 10.0, lat: 17.0 }, 10),
            (Coord { lon: 99.0, lat: -9.0 }, 15),
        ];

        let hc = HilbertCurve::new(2, domain);
        for (coord, dist) in n2_pairs {
            assert_eq!(hc.translate_to_curve_distance(coord), dist, "{}", coord);
        }
    }

    #[test]
    fn test_degenerate_domain() {
        // All on one meridian, the domain has no width.
        let points: Vec<Coord> = (0..20)
            .map(|i| Coord {
                lat: 28.0 + f64::from(i) * 0.001,
                lon: 77.0,
            })
            .collect();

        let tree = HilbertRTree::build_for(&points).unwrap();
        assert_eq!(tree.len(), 20);

        let region = BoundingBox::around(points[10], 250.0);
        let mut found = tree.indexes_within(region);
        found.sort_unstable();
        assert_eq!(found, vec![8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_empty() {
        let points: Vec<Coord> = vec![];
        assert!(HilbertRTree::build_for(&points).is_none());
    }

    #[test]
    fn rtree_query_matches_brute_force() {
        // A lopsided grid with more points than fit in a couple levels of the tree.
        let mut points = Vec::with_capacity(40 * 25);
        for i in 0..40 {
            for j in 0..25 {
                points.push(Coord {
                    lat: 20.0 + f64::from(j) * 0.37,
                    lon: 70.0 + f64::from(i) * 0.21 + f64::from(j % 3) * 0.05,
                });
            }
        }

        let tree = HilbertRTree::build_for(&points).unwrap();

        let regions = [
            BoundingBox {
                ll: Coord { lat: 0.0, lon: 0.0 },
                ur: Coord {
                    lat: 90.0,
                    lon: 180.0,
                },
            },
            BoundingBox {
                ll: Coord {
                    lat: 22.1,
                    lon: 72.0,
                },
                ur: Coord {
                    lat: 25.3,
                    lon: 74.4,
                },
            },
            BoundingBox {
                ll: Coord {
                    lat: 20.0,
                    lon: 70.0,
                },
                ur: Coord {
                    lat: 20.0,
                    lon: 70.0,
                },
            },
            // Hit nothing!
            BoundingBox {
                ll: Coord {
                    lat: -10.0,
                    lon: -10.0,
                },
                ur: Coord {
                    lat: -5.0,
                    lon: -5.0,
                },
            },
        ];

        for region in regions {
            let mut found = tree.indexes_within(region);
            found.sort_unstable();

            let expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|(_, pnt)| region.contains(**pnt))
                .map(|(i, _)| i)
                .collect();

            assert_eq!(found, expected, "region {}", region);
        }
    }

    #[test]
    fn rtree_foreach_stops_early() {
        let points: Vec<Coord> = (0..100)
            .map(|i| Coord {
                lat: f64::from(i) * 0.01,
                lon: f64::from(i) * 0.01,
            })
            .collect();

        let tree = HilbertRTree::build_for(&points).unwrap();
        let whole = BoundingBox {
            ll: Coord {
                lat: -1.0,
                lon: -1.0,
            },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };

        let hits = tree.foreach(whole, 0, |_idx, hits| {
            if hits == 9 {
                ControlFlow::Break(hits + 1)
            } else {
                ControlFlow::Continue(hits + 1)
            }
        });

        assert_eq!(hits, 10);
    }
}
