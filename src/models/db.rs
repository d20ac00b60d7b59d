use geo_types::{MultiLineString, Point};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wkt::{ToWkt, Wkt};

use crate::models::error::Error;
use crate::models::structs::{line_display, Line, Station, Stop};

/// Geometry columns on `line`, in schema order. List queries exclude these;
/// they get bulky fast.
pub const LINE_GEOM_COLUMNS: [&str; 8] = [
    "linestring_2229",
    "linestring_4269",
    "linestring_4326",
    "linestring_900913",
    "simple_linestring_2229",
    "simple_linestring_4269",
    "simple_linestring_4326",
    "simple_linestring_900913",
];

/// Geometry columns on `stop`.
pub const STOP_GEOM_COLUMNS: [&str; 3] = ["point_4269", "point_4326", "point_900913"];

/// Create the schema if it is not already there.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "
CREATE TABLE IF NOT EXISTS line (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT,
    linestring_2229 TEXT,
    linestring_4269 TEXT,
    linestring_4326 TEXT,
    linestring_900913 TEXT,
    simple_linestring_2229 TEXT,
    simple_linestring_4269 TEXT,
    simple_linestring_4326 TEXT,
    simple_linestring_900913 TEXT
);
CREATE TABLE IF NOT EXISTS station (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT
);
CREATE TABLE IF NOT EXISTS stop (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT,
    stop_id INTEGER,
    station_id INTEGER REFERENCES station(id),
    point_4269 TEXT,
    point_4326 TEXT,
    point_900913 TEXT
);
CREATE TABLE IF NOT EXISTS line_stop (
    line_id INTEGER NOT NULL REFERENCES line(id),
    stop_id INTEGER NOT NULL REFERENCES stop(id),
    UNIQUE (line_id, stop_id)
);
CREATE TABLE IF NOT EXISTS line_station (
    line_id INTEGER NOT NULL REFERENCES line(id),
    station_id INTEGER NOT NULL REFERENCES station(id),
    UNIQUE (line_id, station_id)
);
",
    )?;
    Ok(())
}

/// Delete every loaded row. The import is rerun-and-replace.
pub fn wipe(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "
DELETE FROM line_stop;
DELETE FROM line_station;
DELETE FROM stop;
DELETE FROM station;
DELETE FROM line;
",
    )?;
    Ok(())
}

pub fn insert_line(conn: &Connection, line: &Line) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO line (
            name, slug,
            linestring_2229, linestring_4269, linestring_4326, linestring_900913,
            simple_linestring_2229, simple_linestring_4269,
            simple_linestring_4326, simple_linestring_900913
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            line.name,
            line.slug,
            mls_to_wkt(&line.linestring_2229),
            mls_to_wkt(&line.linestring_4269),
            mls_to_wkt(&line.linestring_4326),
            mls_to_wkt(&line.linestring_900913),
            mls_to_wkt(&line.simple_linestring_2229),
            mls_to_wkt(&line.simple_linestring_4269),
            mls_to_wkt(&line.simple_linestring_4326),
            mls_to_wkt(&line.simple_linestring_900913),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_station(conn: &Connection, station: &Station) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO station (name, slug) VALUES (?1, ?2)",
        params![station.name, station.slug],
    )?;
    let id = conn.last_insert_rowid();
    for line_id in &station.line_ids {
        conn.execute(
            "INSERT OR IGNORE INTO line_station (line_id, station_id) VALUES (?1, ?2)",
            params![line_id, id],
        )?;
    }
    Ok(id)
}

pub fn insert_stop(conn: &Connection, stop: &Stop) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO stop (name, slug, stop_id, station_id, point_4269, point_4326, point_900913)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stop.name,
            stop.slug,
            stop.stop_id,
            stop.station_id,
            point_to_wkt(&stop.point_4269),
            point_to_wkt(&stop.point_4326),
            point_to_wkt(&stop.point_900913),
        ],
    )?;
    let id = conn.last_insert_rowid();
    for line_id in &stop.line_ids {
        conn.execute(
            "INSERT OR IGNORE INTO line_stop (line_id, stop_id) VALUES (?1, ?2)",
            params![line_id, id],
        )?;
    }
    Ok(id)
}

/// Line row for list views: no geometry columns.
#[derive(Debug, Serialize, Deserialize)]
pub struct LineSummary {
    pub name: String,
    pub slug: Option<String>,
    pub stop_count: i64,
}

/// Station row for list views.
#[derive(Debug, Serialize, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub slug: Option<String>,
    pub lines: Vec<String>,
    pub line_display: String,
    pub stop_count: i64,
}

/// Stop row for list views: no geometry columns.
#[derive(Debug, Serialize, Deserialize)]
pub struct StopSummary {
    pub stop_id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub station: Option<String>,
    pub lines: Vec<String>,
    pub line_display: String,
}

pub fn list_lines(conn: &Connection) -> Result<Vec<LineSummary>, Error> {
    let mut stmt = conn.prepare(
        "SELECT name, slug,
            (SELECT COUNT(*) FROM line_stop WHERE line_stop.line_id = line.id)
         FROM line ORDER BY name",
    )?;
    let rows = stmt.query_map(params![], |row| {
        Ok(LineSummary {
            name: row.get(0)?,
            slug: row.get(1)?,
            stop_count: row.get(2)?,
        })
    })?;
    collect_rows(rows)
}

pub fn get_line_by_slug(conn: &Connection, slug: &str) -> Result<Option<Line>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug,
            linestring_2229, linestring_4269, linestring_4326, linestring_900913,
            simple_linestring_2229, simple_linestring_4269,
            simple_linestring_4326, simple_linestring_900913
         FROM line WHERE slug = ?1",
    )?;
    let mut rows = stmt.query(params![slug])?;
    match rows.next()? {
        Some(row) => {
            let mut line = Line {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                slug: row.get(2)?,
                ..Default::default()
            };
            line.linestring_2229 = mls_from_row(row.get(3)?, LINE_GEOM_COLUMNS[0])?;
            line.linestring_4269 = mls_from_row(row.get(4)?, LINE_GEOM_COLUMNS[1])?;
            line.linestring_4326 = mls_from_row(row.get(5)?, LINE_GEOM_COLUMNS[2])?;
            line.linestring_900913 = mls_from_row(row.get(6)?, LINE_GEOM_COLUMNS[3])?;
            line.simple_linestring_2229 = mls_from_row(row.get(7)?, LINE_GEOM_COLUMNS[4])?;
            line.simple_linestring_4269 = mls_from_row(row.get(8)?, LINE_GEOM_COLUMNS[5])?;
            line.simple_linestring_4326 = mls_from_row(row.get(9)?, LINE_GEOM_COLUMNS[6])?;
            line.simple_linestring_900913 = mls_from_row(row.get(10)?, LINE_GEOM_COLUMNS[7])?;
            Ok(Some(line))
        }
        None => Ok(None),
    }
}

pub fn line_stop_count(conn: &Connection, line_id: i64) -> Result<i64, Error> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM line_stop WHERE line_id = ?1",
        params![line_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_stations(conn: &Connection) -> Result<Vec<StationSummary>, Error> {
    let mut stmt = conn.prepare("SELECT id, name, slug FROM station ORDER BY name")?;
    let rows = stmt.query_map(params![], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
    })?;
    let mut stations = Vec::new();
    for row in rows {
        let (id, name, slug) = row?;
        let lines = station_line_names(conn, id)?;
        stations.push(StationSummary {
            name,
            slug,
            line_display: line_display(&lines),
            lines,
            stop_count: conn.query_row(
                "SELECT COUNT(*) FROM stop WHERE station_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
        });
    }
    Ok(stations)
}

pub fn get_station_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<StationSummary>, Error> {
    let mut stmt = conn.prepare("SELECT id, name, slug FROM station WHERE slug = ?1")?;
    let mut rows = stmt.query(params![slug])?;
    match rows.next()? {
        Some(row) => {
            let id: i64 = row.get(0)?;
            let lines = station_line_names(conn, id)?;
            Ok(Some(StationSummary {
                name: row.get(1)?,
                slug: row.get(2)?,
                line_display: line_display(&lines),
                lines,
                stop_count: conn.query_row(
                    "SELECT COUNT(*) FROM stop WHERE station_id = ?1",
                    params![id],
                    |row| row.get(0),
                )?,
            }))
        }
        None => Ok(None),
    }
}

pub fn list_stops(conn: &Connection) -> Result<Vec<StopSummary>, Error> {
    let mut stmt = conn.prepare(
        "SELECT stop.id, stop.stop_id, stop.name, stop.slug, station.name
         FROM stop LEFT JOIN station ON stop.station_id = station.id
         ORDER BY stop.stop_id",
    )?;
    let rows = stmt.query_map(params![], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            StopSummary {
                stop_id: row.get(1)?,
                name: row.get(2)?,
                slug: row.get(3)?,
                station: row.get(4)?,
                lines: Vec::new(),
                line_display: String::new(),
            },
        ))
    })?;
    let mut stops = Vec::new();
    for row in rows {
        let (id, mut summary) = row?;
        summary.lines = stop_line_names(conn, id)?;
        summary.line_display = line_display(&summary.lines);
        stops.push(summary);
    }
    Ok(stops)
}

/// A stop with its display fields and geometry, for the detail view.
#[derive(Debug, Serialize)]
pub struct StopDetail {
    pub summary: StopSummary,
    pub point_4326: Option<Point<f64>>,
}

pub fn get_stop_by_slug(conn: &Connection, slug: &str) -> Result<Option<StopDetail>, Error> {
    let mut stmt = conn.prepare(
        "SELECT stop.id, stop.stop_id, stop.name, stop.slug, station.name, stop.point_4326
         FROM stop LEFT JOIN station ON stop.station_id = station.id
         WHERE stop.slug = ?1",
    )?;
    let mut rows = stmt.query(params![slug])?;
    match rows.next()? {
        Some(row) => {
            let id: i64 = row.get(0)?;
            let lines = stop_line_names(conn, id)?;
            let summary = StopSummary {
                stop_id: row.get(1)?,
                name: row.get(2)?,
                slug: row.get(3)?,
                station: row.get(4)?,
                line_display: line_display(&lines),
                lines,
            };
            let point_4326 = point_from_row(row.get(5)?, "point_4326")?;
            Ok(Some(StopDetail {
                summary,
                point_4326,
            }))
        }
        None => Ok(None),
    }
}

/// Every line with full geometry, for map assembly.
pub fn all_lines(conn: &Connection) -> Result<Vec<Line>, Error> {
    let mut stmt = conn.prepare("SELECT slug FROM line ORDER BY name")?;
    let slugs = stmt.query_map(params![], |row| row.get::<_, Option<String>>(0))?;
    let mut lines = Vec::new();
    for slug in slugs {
        if let Some(slug) = slug? {
            if let Some(line) = get_line_by_slug(conn, &slug)? {
                lines.push(line);
            }
        }
    }
    Ok(lines)
}

/// Every stop with geometry, for map assembly.
pub fn all_stops(conn: &Connection) -> Result<Vec<Stop>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, stop_id, station_id, point_4269, point_4326, point_900913
         FROM stop ORDER BY stop_id",
    )?;
    let rows = stmt.query_map(params![], |row| {
        Ok((
            Stop {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                slug: row.get(2)?,
                stop_id: row.get(3)?,
                station_id: row.get(4)?,
                line_ids: Vec::new(),
                point_4269: None,
                point_4326: None,
                point_900913: None,
            },
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;
    let mut stops = Vec::new();
    for row in rows {
        let (mut stop, p4269, p4326, p900913) = row?;
        stop.point_4269 = point_from_row(p4269, "point_4269")?;
        stop.point_4326 = point_from_row(p4326, "point_4326")?;
        stop.point_900913 = point_from_row(p900913, "point_900913")?;
        stops.push(stop);
    }
    Ok(stops)
}

fn station_line_names(conn: &Connection, station_id: i64) -> Result<Vec<String>, Error> {
    let mut stmt = conn.prepare(
        "SELECT line.name FROM line
         JOIN line_station ON line_station.line_id = line.id
         WHERE line_station.station_id = ?1 ORDER BY line.name",
    )?;
    let rows = stmt.query_map(params![station_id], |row| row.get(0))?;
    collect_rows(rows)
}

fn stop_line_names(conn: &Connection, stop_row_id: i64) -> Result<Vec<String>, Error> {
    let mut stmt = conn.prepare(
        "SELECT line.name FROM line
         JOIN line_stop ON line_stop.line_id = line.id
         WHERE line_stop.stop_id = ?1 ORDER BY line.name",
    )?;
    let rows = stmt.query_map(params![stop_row_id], |row| row.get(0))?;
    collect_rows(rows)
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, Error> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn mls_to_wkt(geom: &Option<MultiLineString<f64>>) -> Option<String> {
    geom.as_ref().map(|g| g.wkt_string())
}

fn point_to_wkt(geom: &Option<Point<f64>>) -> Option<String> {
    geom.as_ref().map(|g| g.wkt_string())
}

fn mls_from_row(
    value: Option<String>,
    column: &str,
) -> Result<Option<MultiLineString<f64>>, Error> {
    match value {
        Some(text) => {
            let wkt = Wkt::<f64>::from_str(&text).map_err(|_| Error::Wkt(column.to_string()))?;
            let geom: MultiLineString<f64> =
                wkt.try_into().map_err(|_| Error::Wkt(column.to_string()))?;
            Ok(Some(geom))
        }
        None => Ok(None),
    }
}

fn point_from_row(value: Option<String>, column: &str) -> Result<Option<Point<f64>>, Error> {
    match value {
        Some(text) => {
            let wkt = Wkt::<f64>::from_str(&text).map_err(|_| Error::Wkt(column.to_string()))?;
            let geom: Point<f64> = wkt.try_into().map_err(|_| Error::Wkt(column.to_string()))?;
            Ok(Some(geom))
        }
        None => Ok(None),
    }
}
