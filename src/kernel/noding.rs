// ===========================================================================
// Linework noding: split lines at every pairwise intersection, dissolve overlaps
// ===========================================================================
use super::{CoordKey, coord_key};
use ahash::{AHashMap, AHashSet};
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Line, LineString};
use rstar::{AABB, RTree, RTreeObject};

/// A single-part line produced by noding, remembering which input line it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct NodedPiece {
    pub geometry: LineString,
    pub source: usize,
}

struct Segment {
    owner: usize,
    index: usize,
    line: Line<f64>,
    cutter: bool,
}

impl RTreeObject for Segment {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        let (p1, p2) = self.line.points();
        AABB::from_corners([p1.x(), p1.y()], [p2.x(), p2.y()])
    }
}

struct Owner {
    segment_count: usize,
    closed: bool,
}

impl Owner {
    /// Consecutive segments (and the wrap-around pair of a ring) share a vertex by construction.
    fn are_neighbours(&self, a: usize, b: usize) -> bool {
        let (lo, hi) = (a.min(b), a.max(b));
        hi - lo == 1 || (self.closed && lo == 0 && hi + 1 == self.segment_count)
    }
}

fn segment_key(a: Coord, b: Coord) -> (CoordKey, CoordKey) {
    let (ka, kb) = (coord_key(a), coord_key(b));
    if ka <= kb { (ka, kb) } else { (kb, ka) }
}

fn dist2(a: Coord, b: Coord) -> f64 {
    (b.x - a.x).powi(2) + (b.y - a.y).powi(2)
}

/// Crossings closer than this to a known node reuse that node's coordinate.
pub const NODE_SNAP: f64 = 1e-9;

/// Grid-bucketed node coordinates.
///
/// Concurrent lines yield one computed crossing per pair, each off by a few
/// ulps; snapping keeps them a single node. The cell size grows with the
/// coordinate magnitude so those ulps always fit inside one tolerance.
struct NodeGrid {
    tolerance: f64,
    cells: AHashMap<(i64, i64), Vec<Coord>>,
}

impl NodeGrid {
    fn new(extent: f64) -> Self {
        Self {
            tolerance: NODE_SNAP.max(extent * 64.0 * f64::EPSILON),
            cells: AHashMap::new(),
        }
    }

    fn cell(&self, c: Coord) -> (i64, i64) {
        (
            (c.x / self.tolerance).floor() as i64,
            (c.y / self.tolerance).floor() as i64,
        )
    }

    /// Registers an input vertex as-is.
    fn seed(&mut self, c: Coord) {
        let cell = self.cell(c);
        let bucket = self.cells.entry(cell).or_default();
        if !bucket.contains(&c) {
            bucket.push(c);
        }
    }

    /// The known node within tolerance of `c`, or `c` itself as a new node.
    fn snap(&mut self, c: Coord) -> Coord {
        let (cx, cy) = self.cell(c);
        let tolerance2 = self.tolerance * self.tolerance;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let found = self
                    .cells
                    .get(&(cx + dx, cy + dy))
                    .and_then(|bucket| bucket.iter().find(|n| dist2(**n, c) <= tolerance2));
                if let Some(&node) = found {
                    return node;
                }
            }
        }
        self.cells.entry((cx, cy)).or_default().push(c);
        c
    }
}

/// Nodes `lines` against each other and against `cutters`.
///
/// Every crossing, touch and collinear overlap becomes a split point on all
/// segments involved; a line is broken wherever it passes through such a
/// node. Sub-segments that were already emitted by an earlier line are
/// skipped, so overlapping linework is dissolved in favour of the lowest
/// input index. Cutters only contribute split points and are never emitted.
pub fn node_linework(lines: &[LineString], cutters: &[LineString]) -> Vec<NodedPiece> {
    let all: Vec<&LineString> = lines.iter().chain(cutters.iter()).collect();
    let owners: Vec<Owner> = all
        .iter()
        .map(|ls| Owner {
            segment_count: ls.0.len().saturating_sub(1),
            closed: ls.0.len() > 3 && ls.is_closed(),
        })
        .collect();

    let mut segments = Vec::new();
    for (owner, ls) in all.iter().enumerate() {
        for (index, line) in ls.lines().enumerate() {
            if line.start == line.end {
                continue;
            }
            segments.push(Segment {
                owner,
                index,
                line,
                cutter: owner >= lines.len(),
            });
        }
    }

    let extent = all
        .iter()
        .flat_map(|ls| ls.0.iter())
        .fold(0.0f64, |acc, c| acc.max(c.x.abs()).max(c.y.abs()));
    let mut grid = NodeGrid::new(extent);
    for c in all.iter().flat_map(|ls| ls.0.iter()) {
        grid.seed(*c);
    }

    let tree = RTree::bulk_load(segments);
    let mut splits: AHashMap<(usize, usize), Vec<Coord>> = AHashMap::new();
    let mut nodes: AHashSet<CoordKey> = AHashSet::new();

    for segment in tree.iter() {
        let envelope = segment.envelope();
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            // each unordered pair once
            if (candidate.owner, candidate.index) <= (segment.owner, segment.index) {
                continue;
            }
            if segment.cutter && candidate.cutter {
                continue;
            }
            if candidate.owner == segment.owner
                && owners[segment.owner].are_neighbours(segment.index, candidate.index)
            {
                continue;
            }

            let crossings = match line_intersection(segment.line, candidate.line) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => vec![intersection],
                Some(LineIntersection::Collinear { intersection }) => {
                    vec![intersection.start, intersection.end]
                }
                None => continue,
            };

            for crossing in crossings {
                let crossing = grid.snap(crossing);
                nodes.insert(coord_key(crossing));
                splits
                    .entry((segment.owner, segment.index))
                    .or_default()
                    .push(crossing);
                splits
                    .entry((candidate.owner, candidate.index))
                    .or_default()
                    .push(crossing);
            }
        }
    }

    let mut emitted: AHashSet<(CoordKey, CoordKey)> = AHashSet::new();
    let mut pieces = Vec::new();

    for (owner, ls) in lines.iter().enumerate() {
        let mut current: Vec<Coord> = Vec::new();

        for (index, line) in ls.lines().enumerate() {
            if line.start == line.end {
                continue;
            }
            let mut stops = splits.remove(&(owner, index)).unwrap_or_default();
            stops.sort_by(|a, b| dist2(line.start, *a).total_cmp(&dist2(line.start, *b)));
            stops.push(line.end);

            let mut from = line.start;
            for to in stops {
                if to == from {
                    continue;
                }
                if emitted.insert(segment_key(from, to)) {
                    if current.is_empty() {
                        current.push(from);
                    }
                    current.push(to);
                } else {
                    // already covered by an earlier line
                    flush(&mut current, owner, &mut pieces);
                }
                from = to;
                if nodes.contains(&coord_key(to)) {
                    flush(&mut current, owner, &mut pieces);
                }
            }
        }
        flush(&mut current, owner, &mut pieces);
    }

    pieces
}

fn flush(current: &mut Vec<Coord>, source: usize, pieces: &mut Vec<NodedPiece>) {
    if current.len() >= 2 {
        pieces.push(NodedPiece {
            geometry: LineString::new(std::mem::take(current)),
            source,
        });
    } else {
        current.clear();
    }
}

/// True when two non-adjacent segments of `ring` touch or cross.
pub fn has_self_intersection(ring: &LineString) -> bool {
    let owner = Owner {
        segment_count: ring.0.len().saturating_sub(1),
        closed: ring.0.len() > 3 && ring.is_closed(),
    };
    let segments: Vec<Segment> = ring
        .lines()
        .enumerate()
        .filter(|(_, line)| line.start != line.end)
        .map(|(index, line)| Segment {
            owner: 0,
            index,
            line,
            cutter: false,
        })
        .collect();
    let tree = RTree::bulk_load(segments);

    tree.iter().any(|segment| {
        tree.locate_in_envelope_intersecting(&segment.envelope())
            .filter(|candidate| candidate.index > segment.index)
            .filter(|candidate| !owner.are_neighbours(segment.index, candidate.index))
            .any(|candidate| line_intersection(segment.line, candidate.line).is_some())
    })
}
