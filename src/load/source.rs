use geo_types::{LineString, MultiLineString, Point};
use geojson::GeoJson;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::load::error::Error;

/// Agency-published line segments, LineString features in EPSG:2229.
pub const LINES_FILE: &str = "rail_lines.geojson";
/// Agency-published stop points, Point features in EPSG:4269.
pub const STOPS_FILE: &str = "rail_stops.geojson";
/// Hand-curated mapping from stop ids to clean station names and lines.
pub const CROSSWALK_FILE: &str = "crosswalk.csv";

/// Helper function to deserialize optional fields that might fail to parse
pub fn deserialize_opt<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => match T::from_str(&s) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Ok(None),
        },
        None => Ok(None),
    }
}

/// One segment from the lines layer, in source (2229) coordinates.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub name: String,
    pub geometry: LineString<f64>,
}

/// One point from the stops layer, in source (4269) coordinates.
#[derive(Debug, Clone)]
pub struct SourceStop {
    pub stop_id: i64,
    pub name: String,
    pub point: Point<f64>,
}

/// One row of the crosswalk csv.
#[derive(Debug, Clone, Deserialize)]
pub struct CrosswalkRow {
    pub stop_id: i64,
    pub clean_station_name: String,
    #[serde(rename = "Line1", default, deserialize_with = "deserialize_opt")]
    pub line1: Option<String>,
    #[serde(rename = "Line2", default, deserialize_with = "deserialize_opt")]
    pub line2: Option<String>,
}

/// Everything the import reads before it starts writing rows.
pub struct RailSource {
    pub lines: Vec<SourceLine>,
    pub stops: Vec<SourceStop>,
    pub crosswalk: Vec<CrosswalkRow>,
}

impl RailSource {
    /// Read the source layers from a directory, or from a `.zip` archive of
    /// the same files.
    pub fn from_path<P>(path: P) -> Result<RailSource, Error>
    where
        P: AsRef<Path>,
    {
        let files = read_source_files(path.as_ref())?;
        Ok(RailSource {
            lines: parse_lines(&files.lines, LINES_FILE)?,
            stops: parse_stops(&files.stops, STOPS_FILE)?,
            crosswalk: parse_crosswalk(&files.crosswalk)?,
        })
    }
}

struct SourceFiles {
    lines: String,
    stops: String,
    crosswalk: String,
}

fn read_source_files(path: &Path) -> Result<SourceFiles, Error> {
    if path.is_dir() {
        Ok(SourceFiles {
            lines: read_from_dir(path, LINES_FILE)?,
            stops: read_from_dir(path, STOPS_FILE)?,
            crosswalk: read_from_dir(path, CROSSWALK_FILE)?,
        })
    } else if path.is_file() {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        Ok(SourceFiles {
            lines: read_from_zip(&mut archive, LINES_FILE)?,
            stops: read_from_zip(&mut archive, STOPS_FILE)?,
            crosswalk: read_from_zip(&mut archive, CROSSWALK_FILE)?,
        })
    } else {
        Err(Error::NotFileNorDirectory(format!("{}", path.display())))
    }
}

fn read_from_dir(path: &Path, file_name: &str) -> Result<String, Error> {
    let p = path.join(file_name);
    if p.exists() {
        Ok(std::fs::read_to_string(p)?)
    } else {
        Err(Error::MissingFile(file_name.to_owned()))
    }
}

fn read_from_zip(
    archive: &mut zip::ZipArchive<File>,
    file_name: &str,
) -> Result<String, Error> {
    let mut entry = archive
        .by_name(file_name)
        .map_err(|_| Error::MissingFile(file_name.to_owned()))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

pub fn parse_lines(content: &str, file_name: &str) -> Result<Vec<SourceLine>, Error> {
    let mut lines = Vec::new();
    for feature in features(content, file_name)? {
        let name = string_property(&feature, "Name", file_name)?;
        let geometry = feature.geometry.as_ref().ok_or(Error::MissingGeometry {
            file: file_name.to_owned(),
        })?;
        match &geometry.value {
            geojson::Value::LineString(_) => {
                let ls = LineString::<f64>::try_from(geometry.value.clone())?;
                lines.push(SourceLine { name, geometry: ls });
            }
            // Some agency exports pre-group the segments; flatten them so the
            // consolidation pass sees the same thing either way.
            geojson::Value::MultiLineString(_) => {
                let mls = MultiLineString::<f64>::try_from(geometry.value.clone())?;
                for ls in mls {
                    lines.push(SourceLine {
                        name: name.clone(),
                        geometry: ls,
                    });
                }
            }
            other => {
                return Err(Error::UnexpectedGeometry {
                    file: file_name.to_owned(),
                    found: geometry_type_name(other).to_owned(),
                    expected: "LineString".to_owned(),
                })
            }
        }
    }
    Ok(lines)
}

fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

pub fn parse_stops(content: &str, file_name: &str) -> Result<Vec<SourceStop>, Error> {
    let mut stops = Vec::new();
    let mut seen = HashSet::new();
    for feature in features(content, file_name)? {
        let stop_id = int_property(&feature, "STOP_ID", file_name)?;
        let name = string_property(&feature, "STOP_NAME", file_name)?;
        let geometry = feature.geometry.as_ref().ok_or(Error::MissingGeometry {
            file: file_name.to_owned(),
        })?;
        let point = match &geometry.value {
            geojson::Value::Point(_) => Point::<f64>::try_from(geometry.value.clone())?,
            other => {
                return Err(Error::UnexpectedGeometry {
                    file: file_name.to_owned(),
                    found: geometry_type_name(other).to_owned(),
                    expected: "Point".to_owned(),
                })
            }
        };
        if !seen.insert(stop_id) {
            return Err(Error::DuplicateStopId(stop_id));
        }
        stops.push(SourceStop {
            stop_id,
            name,
            point,
        });
    }
    Ok(stops)
}

pub fn parse_crosswalk(content: &str) -> Result<Vec<CrosswalkRow>, Error> {
    // Government csv exports often lead with a BOM.
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn features(content: &str, file_name: &str) -> Result<Vec<geojson::Feature>, Error> {
    let geojson = content.parse::<GeoJson>()?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(feature) => geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(Error::UnexpectedGeometry {
                file: file_name.to_owned(),
                found: "bare geometry".to_owned(),
                expected: "FeatureCollection".to_owned(),
            })
        }
    };
    if collection.features.is_empty() {
        return Err(Error::EmptySource(file_name.to_owned()));
    }
    Ok(collection.features)
}

fn string_property(
    feature: &geojson::Feature,
    property: &str,
    file_name: &str,
) -> Result<String, Error> {
    feature
        .property(property)
        .and_then(|v| v.as_str())
        .map(|s| s.to_owned())
        .ok_or_else(|| Error::MissingProperty {
            file: file_name.to_owned(),
            property: property.to_owned(),
        })
}

fn int_property(
    feature: &geojson::Feature,
    property: &str,
    file_name: &str,
) -> Result<i64, Error> {
    let value = feature.property(property).ok_or_else(|| Error::MissingProperty {
        file: file_name.to_owned(),
        property: property.to_owned(),
    })?;
    // Shapefile-to-geojson converters disagree on whether ids are numbers.
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| Error::MissingProperty {
            file: file_name.to_owned(),
            property: property.to_owned(),
        })
}

/// Basic facts about a source layer, for drafting schema changes.
#[derive(Debug)]
pub struct LayerDescription {
    pub file: String,
    pub features: usize,
    pub geometry_type: String,
    pub properties: Vec<String>,
}

/// Examine the geographic source layers and report what they hold.
pub fn describe_source<P>(path: P) -> Result<Vec<LayerDescription>, Error>
where
    P: AsRef<Path>,
{
    let files = read_source_files(path.as_ref())?;
    Ok(vec![
        describe_layer(&files.lines, LINES_FILE)?,
        describe_layer(&files.stops, STOPS_FILE)?,
    ])
}

fn describe_layer(content: &str, file_name: &str) -> Result<LayerDescription, Error> {
    let features = features(content, file_name)?;
    let geometry_type = features[0]
        .geometry
        .as_ref()
        .map(|g| geometry_type_name(&g.value).to_owned())
        .unwrap_or_else(|| "None".to_owned());
    let mut properties: Vec<String> = features
        .iter()
        .filter_map(|f| f.properties.as_ref())
        .flat_map(|p| p.keys().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    properties.sort();
    Ok(LayerDescription {
        file: file_name.to_owned(),
        features: features.len(),
        geometry_type,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const LINES_FIXTURE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"Name": "Blue", "PATH_ID": 1, "Miles": 2.1},
                "geometry": {"type": "LineString", "coordinates": [[6480000.0, 1820000.0], [6500000.0, 1840000.0]]}
            },
            {
                "type": "Feature",
                "properties": {"Name": "Blue", "PATH_ID": 2, "Miles": 1.4},
                "geometry": {"type": "LineString", "coordinates": [[6500000.0, 1840000.0], [6520000.0, 1860000.0]]}
            }
        ]
    }"#;

    const STOPS_FIXTURE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"STOP_ID": 80101, "STOP_NAME": "PICO STATION"},
                "geometry": {"type": "Point", "coordinates": [-118.2663, 34.0407]}
            },
            {
                "type": "Feature",
                "properties": {"STOP_ID": "80102", "STOP_NAME": "GRAND STATION"},
                "geometry": {"type": "Point", "coordinates": [-118.2700, 34.0335]}
            }
        ]
    }"#;

    #[test]
    fn parses_line_features() {
        let lines = parse_lines(LINES_FIXTURE, LINES_FILE).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Blue");
        assert_eq!(lines[0].geometry.0.len(), 2);
    }

    #[test]
    fn parses_stop_features_with_string_or_numeric_ids() {
        let stops = parse_stops(STOPS_FIXTURE, STOPS_FILE).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].stop_id, 80101);
        assert_eq!(stops[1].stop_id, 80102);
        assert_eq!(stops[0].name, "PICO STATION");
    }

    #[test]
    fn duplicate_stop_ids_are_rejected() {
        let dupe = STOPS_FIXTURE.replace("80102", "80101");
        match parse_stops(&dupe, STOPS_FILE) {
            Err(Error::DuplicateStopId(80101)) => {}
            other => panic!("expected DuplicateStopId, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn empty_layer_is_an_error() {
        let empty = r#"{"type": "FeatureCollection", "features": []}"#;
        match parse_lines(empty, LINES_FILE) {
            Err(Error::EmptySource(file)) => assert_eq!(file, LINES_FILE),
            other => panic!("expected EmptySource, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn missing_name_property_is_an_error() {
        let nameless = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}
            }]
        }"#;
        match parse_lines(nameless, LINES_FILE) {
            Err(Error::MissingProperty { property, .. }) => assert_eq!(property, "Name"),
            other => panic!("expected MissingProperty, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn multi_line_string_features_are_flattened() {
        let grouped = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"Name": "Gold"},
                "geometry": {"type": "MultiLineString", "coordinates": [
                    [[0.0, 0.0], [1.0, 1.0]],
                    [[2.0, 2.0], [3.0, 3.0]]
                ]}
            }]
        }"#;
        let lines = parse_lines(grouped, LINES_FILE).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.name == "Gold"));
    }

    #[test]
    fn crosswalk_treats_blank_lines_as_none() {
        let csv = "\u{feff}stop_id,clean_station_name,Line1,Line2\n\
                   80101,Pico,Blue,Expo\n\
                   80102,Grand,Blue,\n\
                   80103,Mystery,,\n";
        let rows = parse_crosswalk(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line2.as_deref(), Some("Expo"));
        assert_eq!(rows[1].line2, None);
        assert_eq!(rows[2].line1, None);
        assert_eq!(rows[2].clean_station_name, "Mystery");
    }

    #[test]
    fn describe_reports_fields_and_counts() {
        let description = describe_layer(STOPS_FIXTURE, STOPS_FILE).unwrap();
        assert_eq!(description.features, 2);
        assert_eq!(description.geometry_type, "Point");
        assert_eq!(
            description.properties,
            vec!["STOP_ID".to_string(), "STOP_NAME".to_string()]
        );
    }
}
