use crate::kernel::{CoordKey, coord_key};
use ahash::AHashMap;
use geo::{LineString, MultiLineString};

/// Lines whose start and end coordinates each occur exactly once among all
/// endpoints of `multiline`. Exact coordinate equality, no tolerance.
pub fn find_orphan_lines(multiline: &MultiLineString) -> Vec<LineString> {
    orphan_mask(&multiline.0)
        .into_iter()
        .zip(&multiline.0)
        .filter_map(|(orphaned, line)| orphaned.then(|| line.clone()))
        .collect()
}

/// Per-line orphan flags, aligned with `lines`.
pub fn orphan_mask(lines: &[LineString]) -> Vec<bool> {
    let endpoints = |line: &LineString| -> Option<(CoordKey, CoordKey)> {
        Some((coord_key(*line.0.first()?), coord_key(*line.0.last()?)))
    };

    let mut counts: AHashMap<CoordKey, usize> = AHashMap::new();
    for (start, end) in lines.iter().filter_map(endpoints) {
        *counts.entry(start).or_default() += 1;
        *counts.entry(end).or_default() += 1;
    }

    lines
        .iter()
        .map(|line| match endpoints(line) {
            Some((start, end)) => counts[&start] == 1 && counts[&end] == 1,
            None => false,
        })
        .collect()
}
