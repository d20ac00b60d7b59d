use geo_types::{Coord, LineString, MultiLineString};
use std::collections::HashMap;

use crate::load::source::SourceLine;

/// How close two segment endpoints must be (in source units, US survey feet
/// for EPSG:2229) to be treated as the same junction.
pub const STITCH_TOLERANCE_FEET: f64 = 1.0;

/// The agency breaks some lines into many segment features. Consolidate the
/// segments into one record per line name, each holding a single
/// MultiLineString, with touching segments stitched end-to-end.
///
/// First-seen name order is preserved so reruns produce identical output.
pub fn consolidate(
    segments: Vec<SourceLine>,
    tolerance: f64,
) -> Vec<(String, MultiLineString<f64>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<LineString<f64>>> = HashMap::new();
    for segment in segments {
        if !groups.contains_key(&segment.name) {
            order.push(segment.name.clone());
        }
        groups
            .entry(segment.name)
            .or_default()
            .push(segment.geometry);
    }

    order
        .into_iter()
        .map(|name| {
            let parts = groups.remove(&name).unwrap_or_default();
            let merged = stitch_segments(parts, tolerance);
            (name, merged)
        })
        .collect()
}

/// Chain segments that share an endpoint into contiguous linestrings.
/// Parts that stay disjoint remain separate members of the result.
pub fn stitch_segments(segments: Vec<LineString<f64>>, tolerance: f64) -> MultiLineString<f64> {
    // Zero-length and single-point segments carry no path information.
    let mut remaining: Vec<Vec<Coord<f64>>> = segments
        .into_iter()
        .map(|ls| ls.0)
        .filter(|coords| coords.len() >= 2 && coords.iter().any(|c| !close(*c, coords[0], 0.0)))
        .collect();

    let mut parts: Vec<LineString<f64>> = Vec::new();
    while !remaining.is_empty() {
        let mut chain = remaining.remove(0);
        loop {
            let mut attached = false;
            let mut index = 0;
            while index < remaining.len() {
                let segment = &remaining[index];
                let head = *chain.first().unwrap();
                let tail = *chain.last().unwrap();
                let seg_head = *segment.first().unwrap();
                let seg_tail = *segment.last().unwrap();

                if close(seg_head, tail, tolerance) {
                    let segment = remaining.remove(index);
                    chain.extend(segment.into_iter().skip(1));
                } else if close(seg_tail, tail, tolerance) {
                    let segment = remaining.remove(index);
                    chain.extend(segment.into_iter().rev().skip(1));
                } else if close(seg_tail, head, tolerance) {
                    let mut segment = remaining.remove(index);
                    segment.extend(chain.into_iter().skip(1));
                    chain = segment;
                } else if close(seg_head, head, tolerance) {
                    let segment = remaining.remove(index);
                    let mut reversed: Vec<Coord<f64>> = segment.into_iter().rev().collect();
                    reversed.extend(chain.into_iter().skip(1));
                    chain = reversed;
                } else {
                    index += 1;
                    continue;
                }
                attached = true;
                break;
            }
            if !attached {
                break;
            }
        }
        parts.push(LineString::from(chain));
    }
    MultiLineString::new(parts)
}

fn close(a: Coord<f64>, b: Coord<f64>, tolerance: f64) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(name: &str, coords: Vec<(f64, f64)>) -> SourceLine {
        SourceLine {
            name: name.to_string(),
            geometry: LineString::from(coords),
        }
    }

    #[test]
    fn touching_segments_become_one_part() {
        let merged = consolidate(
            vec![
                seg("Blue", vec![(0.0, 0.0), (10.0, 0.0)]),
                seg("Blue", vec![(10.0, 0.0), (20.0, 0.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(merged.len(), 1);
        let (name, mls) = &merged[0];
        assert_eq!(name, "Blue");
        assert_eq!(mls.0.len(), 1);
        assert_eq!(mls.0[0].0.len(), 3);
        assert_eq!(mls.0[0].0[2], Coord { x: 20.0, y: 0.0 });
    }

    #[test]
    fn reversed_segments_are_flipped_into_the_chain() {
        let mls = stitch_segments(
            vec![
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
                // Same junction at (10, 0) but drawn the other way round.
                LineString::from(vec![(20.0, 0.0), (10.0, 0.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(mls.0.len(), 1);
        assert_eq!(mls.0[0].0.len(), 3);
        assert_eq!(mls.0[0].0[2], Coord { x: 20.0, y: 0.0 });
    }

    #[test]
    fn segment_attaching_at_the_chain_head_is_prepended() {
        let mls = stitch_segments(
            vec![
                LineString::from(vec![(10.0, 0.0), (20.0, 0.0)]),
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(mls.0.len(), 1);
        assert_eq!(mls.0[0].0[0], Coord { x: 0.0, y: 0.0 });
        assert_eq!(mls.0[0].0[2], Coord { x: 20.0, y: 0.0 });
    }

    #[test]
    fn disjoint_segments_stay_separate_parts() {
        let mls = stitch_segments(
            vec![
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
                LineString::from(vec![(100.0, 100.0), (110.0, 100.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(mls.0.len(), 2);
    }

    #[test]
    fn degenerate_segments_are_dropped() {
        let mls = stitch_segments(
            vec![
                LineString::from(vec![(5.0, 5.0), (5.0, 5.0)]),
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(mls.0.len(), 1);
        assert_eq!(mls.0[0].0.len(), 2);
    }

    #[test]
    fn names_group_independently_and_keep_first_seen_order() {
        let merged = consolidate(
            vec![
                seg("Red", vec![(0.0, 0.0), (1.0, 0.0)]),
                seg("Blue", vec![(0.0, 10.0), (1.0, 10.0)]),
                seg("Red", vec![(1.0, 0.0), (2.0, 0.0)]),
            ],
            STITCH_TOLERANCE_FEET,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, "Red");
        assert_eq!(merged[0].1 .0.len(), 1);
        assert_eq!(merged[1].0, "Blue");
    }

    #[test]
    fn near_miss_endpoints_within_tolerance_still_join() {
        let mls = stitch_segments(
            vec![
                LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
                LineString::from(vec![(10.5, 0.2), (20.0, 0.0)]),
            ],
            1.0,
        );
        assert_eq!(mls.0.len(), 1);
    }
}
