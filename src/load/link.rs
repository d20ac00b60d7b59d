use geo::EuclideanDistance;
use geo_types::Point;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

use crate::load::error::Error;
use crate::load::source::CrosswalkRow;
use crate::models::structs::{slugify, Line, Station, Stop};
use crate::proj::SRID_WEB_MERCATOR;

/// Envelope half-width used to pre-filter nearest-line candidates, in Web
/// Mercator meters. Wide enough to always catch something in a network the
/// size of L.A.'s; the exact distance decides.
const NEAREST_LINE_RADIUS: f64 = 5000.0;

/// Roll the stops up into stations and link everything to its lines.
///
/// Each stop takes its clean name and slug from the crosswalk, and its lines
/// from the crosswalk's `Line1`/`Line2` columns. A crosswalk row that names
/// no line falls back to the nearest line by point-to-line distance. A
/// station is get-or-created per clean name and accumulates the lines of its
/// stops.
///
/// Returns the stations plus, for each stop (in input order), the index of
/// its station. Station ids are assigned when the rows are written.
pub fn link_stops(
    stops: &mut [Stop],
    lines: &[Line],
    crosswalk: &[CrosswalkRow],
) -> Result<(Vec<Station>, Vec<usize>), Error> {
    let crosswalk_by_id: HashMap<i64, &CrosswalkRow> =
        crosswalk.iter().map(|row| (row.stop_id, row)).collect();
    let line_ids_by_name: HashMap<&str, i64> = lines
        .iter()
        .filter_map(|line| line.id.map(|id| (line.name.as_str(), id)))
        .collect();
    let index = LineIndex::build(lines);

    let mut stations: Vec<Station> = Vec::new();
    let mut station_by_name: HashMap<String, usize> = HashMap::new();
    let mut station_index = Vec::with_capacity(stops.len());

    for stop in stops.iter_mut() {
        let stop_id = stop.stop_id.unwrap_or_default();
        let row = crosswalk_by_id
            .get(&stop_id)
            .ok_or(Error::MissingCrosswalk(stop_id))?;

        stop.name = row.clean_station_name.clone();
        stop.slug = Some(format!("{}-{}", slugify(&stop.name), stop_id));

        let mut line_ids = Vec::new();
        for name in [&row.line1, &row.line2].into_iter().flatten() {
            let id = line_ids_by_name
                .get(name.as_str())
                .copied()
                .ok_or_else(|| Error::UnknownLine(name.clone()))?;
            if !line_ids.contains(&id) {
                line_ids.push(id);
            }
        }
        if line_ids.is_empty() {
            let point = stop
                .point(SRID_WEB_MERCATOR)?
                .copied()
                .ok_or(Error::NoLines(stop_id))?;
            line_ids.push(index.nearest(point, lines).ok_or(Error::NoLines(stop_id))?);
        }
        stop.line_ids = line_ids.clone();

        let station_idx = match station_by_name.get(&row.clean_station_name) {
            Some(&idx) => idx,
            None => {
                let idx = stations.len();
                stations.push(Station {
                    id: None,
                    name: row.clean_station_name.clone(),
                    slug: Some(slugify(&row.clean_station_name)),
                    line_ids: Vec::new(),
                });
                station_by_name.insert(row.clean_station_name.clone(), idx);
                idx
            }
        };
        for id in line_ids {
            if !stations[station_idx].line_ids.contains(&id) {
                stations[station_idx].line_ids.push(id);
            }
        }
        station_index.push(station_idx);
    }

    Ok((stations, station_index))
}

struct LineRef {
    envelope: AABB<[f64; 2]>,
    position: usize,
}

impl RTreeObject for LineRef {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over the lines' Web Mercator geometry.
struct LineIndex {
    rtree: RTree<LineRef>,
}

impl LineIndex {
    fn build(lines: &[Line]) -> LineIndex {
        let mut rtree = RTree::new();
        for (position, line) in lines.iter().enumerate() {
            if let Some(envelope) = line
                .linestring_900913
                .as_ref()
                .and_then(compute_envelope)
            {
                rtree.insert(LineRef { envelope, position });
            }
        }
        LineIndex { rtree }
    }

    /// The id of the line nearest to `point` (Web Mercator). The R-tree
    /// narrows the field; exact point-to-segment distance decides.
    fn nearest(&self, point: Point<f64>, lines: &[Line]) -> Option<i64> {
        let probe = AABB::from_corners(
            [point.x() - NEAREST_LINE_RADIUS, point.y() - NEAREST_LINE_RADIUS],
            [point.x() + NEAREST_LINE_RADIUS, point.y() + NEAREST_LINE_RADIUS],
        );
        let mut candidates: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&probe)
            .map(|r| r.position)
            .collect();
        if candidates.is_empty() {
            candidates = (0..lines.len()).collect();
        }

        let mut best: Option<(f64, i64)> = None;
        for position in candidates {
            let line = &lines[position];
            let (id, geom) = match (line.id, line.linestring_900913.as_ref()) {
                (Some(id), Some(geom)) => (id, geom),
                _ => continue,
            };
            let distance = geom
                .iter()
                .map(|ls| point.euclidean_distance(ls))
                .fold(f64::INFINITY, f64::min);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, id));
            }
        }
        best.map(|(_, id)| id)
    }
}

fn compute_envelope(mls: &geo_types::MultiLineString<f64>) -> Option<AABB<[f64; 2]>> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;
    for ls in mls.iter() {
        for coord in ls.coords() {
            any = true;
            min_x = min_x.min(coord.x);
            min_y = min_y.min(coord.y);
            max_x = max_x.max(coord.x);
            max_y = max_y.max(coord.y);
        }
    }
    if any {
        Some(AABB::from_corners([min_x, min_y], [max_x, max_y]))
    } else {
        None
    }
}
