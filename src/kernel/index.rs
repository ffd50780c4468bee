use geo::{Coord, LineString};
use rstar::primitives::{GeomWithData, Line as RLine};
use rstar::{PointDistance, RTree};

type IndexedSegment = GeomWithData<RLine<[f64; 2]>, usize>;

/// R-tree over the segments of a set of curves, each tagged with an owner id.
///
/// Built once per stage invocation and read-only afterwards.
pub struct SegmentIndex {
    tree: RTree<IndexedSegment>,
}

impl SegmentIndex {
    pub fn build<'a>(curves: impl IntoIterator<Item = (usize, &'a LineString)>) -> Self {
        let mut items = Vec::new();
        for (owner, curve) in curves {
            items.extend(curve.lines().map(|segment| {
                GeomWithData::new(
                    RLine::new(
                        [segment.start.x, segment.start.y],
                        [segment.end.x, segment.end.y],
                    ),
                    owner,
                )
            }));
        }
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Owners with any segment within `max_distance` of `point`, paired with their
    /// minimum distance, sorted by ascending distance and then owner id.
    pub fn owners_within(&self, point: Coord, max_distance: f64) -> Vec<(usize, f64)> {
        let mut best: Vec<(usize, f64)> = Vec::new();
        let query = [point.x, point.y];
        for hit in self
            .tree
            .locate_within_distance(query, max_distance * max_distance)
        {
            let d = hit.geom().distance_2(&query).sqrt();
            if d > max_distance {
                continue;
            }
            match best.iter_mut().find(|(owner, _)| *owner == hit.data) {
                Some(entry) => entry.1 = entry.1.min(d),
                None => best.push((hit.data, d)),
            }
        }
        best.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_owners_sorted_by_distance() {
        let far = line_string![(x: 0.0, y: 3.0), (x: 10.0, y: 3.0)];
        let near = line_string![(x: 0.0, y: 1.0), (x: 10.0, y: 1.0)];
        let out_of_range = line_string![(x: 0.0, y: 30.0), (x: 10.0, y: 30.0)];
        let index = SegmentIndex::build([(7, &far), (2, &near), (9, &out_of_range)]);

        let hits = index.owners_within(Coord { x: 5.0, y: 0.0 }, 5.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 2);
        assert!((hits[0].1 - 1.0).abs() < 1e-12);
        assert_eq!(hits[1].0, 7);
    }
}
