use geo_types::{MultiLineString, Point};
use serde_json::{json, Value};

use crate::models::structs::{Line, Stop};

pub fn convert_to_geojson(features: &Vec<Value>) -> Value {
    let output = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    return output;
}

pub fn multi_line_string_coords(mls: &MultiLineString<f64>) -> Vec<Vec<[f64; 2]>> {
    mls.iter()
        .map(|ls| ls.coords().map(|c| [c.x, c.y]).collect())
        .collect()
}

pub fn multi_line_string_geometry(mls: &MultiLineString<f64>) -> Value {
    json!({
        "type": "MultiLineString",
        "coordinates": multi_line_string_coords(mls),
    })
}

pub fn point_geometry(point: &Point<f64>) -> Value {
    json!({
        "type": "Point",
        "coordinates": [point.x(), point.y()],
    })
}

// Build line features from the simplified WGS84 geometry
pub fn get_line_features(lines: &[Line]) -> Vec<Value> {
    let features = lines
        .iter()
        .filter_map(|line| {
            line.simple_linestring_4326.as_ref().map(|geom| {
                json!({
                    "type": "Feature",
                    "geometry": multi_line_string_geometry(geom),
                    "properties": {
                        "name": &line.name,
                        "slug": &line.slug,
                    }
                })
            })
        })
        .collect::<Vec<Value>>();

    return features;
}

// Build stop features from the WGS84 points
pub fn get_stop_features(stops: &[Stop]) -> Vec<Value> {
    let features = stops
        .iter()
        .filter_map(|stop| {
            stop.point_4326.as_ref().map(|point| {
                json!({
                    "type": "Feature",
                    "geometry": point_geometry(point),
                    "properties": {
                        "stop_id": &stop.stop_id,
                        "name": &stop.name,
                        "slug": &stop.slug,
                    }
                })
            })
        })
        .collect::<Vec<Value>>();

    return features;
}
