use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

use crate::load::error::Error;
use crate::load::link;
use crate::load::merge::{self, STITCH_TOLERANCE_FEET};
use crate::load::source::RailSource;
use crate::models::db;
use crate::models::structs::{slugify, Line, Stop};
use crate::proj::{SRID_NAD83, SRID_STATE_PLANE};

/// Knobs for the import. The defaults match the published dataset.
pub struct LoadOptions {
    /// Ramer-Douglas-Peucker tolerance for the `simple_` columns, in Web
    /// Mercator meters.
    pub simplify_tolerance: f64,
    /// Endpoint snapping distance for segment stitching, in source units
    /// (US survey feet).
    pub stitch_tolerance: f64,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions {
            simplify_tolerance: 500.0,
            stitch_tolerance: STITCH_TOLERANCE_FEET,
        }
    }
}

/// What the import wrote.
pub struct LoadSummary {
    pub lines: usize,
    pub stations: usize,
    pub stops: usize,
}

impl LoadSummary {
    pub fn print_stats(&self) {
        println!("Loaded rail data:");
        println!("  Lines: {}", self.lines);
        println!("  Stations: {}", self.stations);
        println!("  Stops: {}", self.stops);
    }
}

/// Wrap it all together and load everything: read the source layers, then
/// run the rerun-and-replace import against the database at `db_path`.
pub fn load_all<P>(source_path: P, db_path: &str, options: &LoadOptions) -> Result<LoadSummary, Error>
where
    P: AsRef<Path>,
{
    let start = Instant::now();
    let source = RailSource::from_path(source_path)?;
    log::debug!("Source layers read in {}ms", start.elapsed().as_millis());

    let conn = Connection::open(db_path)?;
    load_source(&conn, source, options)
}

/// The import itself, separated from file and connection handling so it can
/// run against any open connection.
pub fn load_source(
    conn: &Connection,
    source: RailSource,
    options: &LoadOptions,
) -> Result<LoadSummary, Error> {
    let start = Instant::now();
    db::init_schema(conn)?;
    db::wipe(conn)?;
    log::debug!("Existing rows wiped in {}ms", start.elapsed().as_millis());

    // The agency splits some lines into many segment features; fold each
    // name down to one record before anything else sees them.
    let merge_start = Instant::now();
    let segment_count = source.lines.len();
    let consolidated = merge::consolidate(source.lines, options.stitch_tolerance);
    log::debug!(
        "{} segments consolidated into {} lines in {}ms",
        segment_count,
        consolidated.len(),
        merge_start.elapsed().as_millis()
    );

    let lines_start = Instant::now();
    let mut lines = Vec::with_capacity(consolidated.len());
    for (name, geometry) in consolidated {
        let mut line = Line {
            name: name.clone(),
            slug: Some(slugify(&name)),
            linestring_2229: Some(geometry),
            ..Default::default()
        };
        line.set_linestrings(SRID_STATE_PLANE)?;
        line.set_simple_linestrings(options.simplify_tolerance)?;
        line.id = Some(db::insert_line(conn, &line)?);
        lines.push(line);
    }
    log::debug!(
        "{} lines reprojected and written in {}ms",
        lines.len(),
        lines_start.elapsed().as_millis()
    );

    let stops_start = Instant::now();
    let mut stops = Vec::with_capacity(source.stops.len());
    for source_stop in &source.stops {
        let mut stop = Stop {
            name: source_stop.name.clone(),
            stop_id: Some(source_stop.stop_id),
            point_4269: Some(source_stop.point),
            ..Default::default()
        };
        stop.set_points(SRID_NAD83)?;
        stops.push(stop);
    }
    log::debug!(
        "{} stops reprojected in {}ms",
        stops.len(),
        stops_start.elapsed().as_millis()
    );

    let link_start = Instant::now();
    let (stations, station_index) = link::link_stops(&mut stops, &lines, &source.crosswalk)?;
    log::debug!(
        "{} stops rolled up into {} stations in {}ms",
        stops.len(),
        stations.len(),
        link_start.elapsed().as_millis()
    );

    let write_start = Instant::now();
    let mut station_ids = Vec::with_capacity(stations.len());
    for station in &stations {
        station_ids.push(db::insert_station(conn, station)?);
    }
    for (stop, station_idx) in stops.iter_mut().zip(station_index) {
        stop.station_id = Some(station_ids[station_idx]);
        db::insert_stop(conn, stop)?;
    }
    log::debug!(
        "Stations and stops written in {}ms",
        write_start.elapsed().as_millis()
    );

    log::debug!("Import finished in {}ms", start.elapsed().as_millis());
    Ok(LoadSummary {
        lines: lines.len(),
        stations: stations.len(),
        stops: stops.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::source::{parse_crosswalk, parse_lines, parse_stops};
    use crate::models::db::{get_line_by_slug, list_lines, list_stations, list_stops};

    // A two-segment Blue line near the EPSG:2229 projection origin, one stop
    // on it, and a second disconnected Red line.
    const LINES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"Name": "Blue"},
                "geometry": {"type": "LineString", "coordinates": [[6480000.0, 1820000.0], [6500000.0, 1840000.0]]}
            },
            {
                "type": "Feature",
                "properties": {"Name": "Blue"},
                "geometry": {"type": "LineString", "coordinates": [[6500000.0, 1840000.0], [6520000.0, 1860000.0]]}
            },
            {
                "type": "Feature",
                "properties": {"Name": "Red"},
                "geometry": {"type": "LineString", "coordinates": [[6400000.0, 1900000.0], [6420000.0, 1920000.0]]}
            }
        ]
    }"#;

    const STOPS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"STOP_ID": 80101, "STOP_NAME": "PICO STATION"},
                "geometry": {"type": "Point", "coordinates": [-118.2663, 34.0407]}
            },
            {
                "type": "Feature",
                "properties": {"STOP_ID": 80102, "STOP_NAME": "GRAND STATION"},
                "geometry": {"type": "Point", "coordinates": [-118.2700, 34.0335]}
            }
        ]
    }"#;

    const CROSSWALK: &str = "stop_id,clean_station_name,Line1,Line2\n\
                             80101,Pico,Blue,\n\
                             80102,Grand,Blue,Red\n";

    fn fixture_source() -> RailSource {
        RailSource {
            lines: parse_lines(LINES, "rail_lines.geojson").unwrap(),
            stops: parse_stops(STOPS, "rail_stops.geojson").unwrap(),
            crosswalk: parse_crosswalk(CROSSWALK).unwrap(),
        }
    }

    #[test]
    fn full_import_produces_browsable_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let summary = load_source(&conn, fixture_source(), &LoadOptions::default()).unwrap();
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.stations, 2);
        assert_eq!(summary.stops, 2);

        let lines = list_lines(&conn).unwrap();
        assert_eq!(lines[0].name, "Blue");
        assert_eq!(lines[0].stop_count, 2);
        assert_eq!(lines[1].name, "Red");
        assert_eq!(lines[1].stop_count, 1);

        // The two Blue segments were stitched into a single part and every
        // geometry column was filled.
        let blue = get_line_by_slug(&conn, "blue").unwrap().unwrap();
        let canonical = blue.linestring_2229.as_ref().unwrap();
        assert_eq!(canonical.0.len(), 1);
        assert_eq!(canonical.0[0].0.len(), 3);
        assert!(blue.linestring_4326.is_some());
        assert!(blue.simple_linestring_900913.is_some());

        let stations = list_stations(&conn).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Grand");
        assert_eq!(stations[0].lines, vec!["Blue".to_string(), "Red".to_string()]);
        assert_eq!(stations[0].line_display, "Blue and Red");

        let stops = list_stops(&conn).unwrap();
        assert_eq!(stops[0].stop_id, Some(80101));
        assert_eq!(stops[0].name, "Pico");
        assert_eq!(stops[0].station.as_deref(), Some("Pico"));
        assert_eq!(stops[0].lines, vec!["Blue".to_string()]);
        assert_eq!(stops[0].line_display, "Blue");
    }

    #[test]
    fn rerun_replaces_instead_of_accumulating() {
        let conn = Connection::open_in_memory().unwrap();
        load_source(&conn, fixture_source(), &LoadOptions::default()).unwrap();
        let summary = load_source(&conn, fixture_source(), &LoadOptions::default()).unwrap();
        assert_eq!(summary.lines, 2);
        assert_eq!(list_lines(&conn).unwrap().len(), 2);
        assert_eq!(list_stops(&conn).unwrap().len(), 2);
    }

    #[test]
    fn crosswalk_must_cover_every_stop() {
        let conn = Connection::open_in_memory().unwrap();
        let mut source = fixture_source();
        source.crosswalk.retain(|row| row.stop_id != 80102);
        match load_source(&conn, source, &LoadOptions::default()) {
            Err(Error::MissingCrosswalk(80102)) => {}
            other => panic!("expected MissingCrosswalk, got {:?}", other.is_ok()),
        }
    }
}
