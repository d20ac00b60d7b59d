use geo::Simplify;
use geo_types::{MultiLineString, Point};
use serde::{Deserialize, Serialize};

use crate::proj::{self, ProjError, SRID_NAD83, SRID_STATE_PLANE, SRID_WEB_MERCATOR, SRID_WGS84};

/// A line in the L.A. Metro Rail system (Blue, Red, Gold, ...).
///
/// The geometry is published in four fixed reference systems, plus a
/// simplified display variant of each. EPSG:2229 is the canonical column for
/// lines; the rest are derived from it.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub linestring_2229: Option<MultiLineString<f64>>,
    pub linestring_4269: Option<MultiLineString<f64>>,
    pub linestring_4326: Option<MultiLineString<f64>>,
    pub linestring_900913: Option<MultiLineString<f64>>,
    pub simple_linestring_2229: Option<MultiLineString<f64>>,
    pub simple_linestring_4269: Option<MultiLineString<f64>>,
    pub simple_linestring_4326: Option<MultiLineString<f64>>,
    pub simple_linestring_900913: Option<MultiLineString<f64>>,
}

impl Line {
    /// The SRIDs of the linestring column set, in column order.
    pub fn srid_list() -> Vec<i32> {
        vec![SRID_STATE_PLANE, SRID_NAD83, SRID_WGS84, SRID_WEB_MERCATOR]
    }

    pub fn linestring(&self, srid: i32) -> Result<Option<&MultiLineString<f64>>, ProjError> {
        match srid {
            SRID_STATE_PLANE => Ok(self.linestring_2229.as_ref()),
            SRID_NAD83 => Ok(self.linestring_4269.as_ref()),
            SRID_WGS84 => Ok(self.linestring_4326.as_ref()),
            SRID_WEB_MERCATOR => Ok(self.linestring_900913.as_ref()),
            other => Err(ProjError::UnknownSrid(other)),
        }
    }

    fn set_linestring(
        &mut self,
        srid: i32,
        geom: Option<MultiLineString<f64>>,
    ) -> Result<(), ProjError> {
        match srid {
            SRID_STATE_PLANE => self.linestring_2229 = geom,
            SRID_NAD83 => self.linestring_4269 = geom,
            SRID_WGS84 => self.linestring_4326 = geom,
            SRID_WEB_MERCATOR => self.linestring_900913 = geom,
            other => return Err(ProjError::UnknownSrid(other)),
        }
        Ok(())
    }

    fn set_simple_linestring(
        &mut self,
        srid: i32,
        geom: Option<MultiLineString<f64>>,
    ) -> Result<(), ProjError> {
        match srid {
            SRID_STATE_PLANE => self.simple_linestring_2229 = geom,
            SRID_NAD83 => self.simple_linestring_4269 = geom,
            SRID_WGS84 => self.simple_linestring_4326 = geom,
            SRID_WEB_MERCATOR => self.simple_linestring_900913 = geom,
            other => return Err(ProjError::UnknownSrid(other)),
        }
        Ok(())
    }

    /// Sync every linestring column from the one true column, defined by
    /// `canonical_srid`. An empty canonical column clears the others; a
    /// MultiLineString with no members counts as empty.
    pub fn set_linestrings(&mut self, canonical_srid: i32) -> Result<(), ProjError> {
        let canonical = self
            .linestring(canonical_srid)?
            .filter(|geom| !geom.0.is_empty())
            .cloned();
        for srid in Line::srid_list() {
            if srid == canonical_srid {
                continue;
            }
            let derived = match &canonical {
                Some(geom) => Some(proj::transform_multi_line_string(geom, canonical_srid, srid)?),
                None => None,
            };
            self.set_linestring(srid, derived)?;
        }
        Ok(())
    }

    /// Redraw each linestring column with fewer points and store the result
    /// in the matching `simple_` column.
    ///
    /// The source geometry is taken to Web Mercator first so `tolerance` is
    /// in meters, Ramer-Douglas-Peucker simplified, then taken back.
    pub fn set_simple_linestrings(&mut self, tolerance: f64) -> Result<(), ProjError> {
        for srid in Line::srid_list() {
            let source = self
                .linestring(srid)?
                .filter(|geom| !geom.0.is_empty())
                .cloned();
            let source = match source {
                Some(geom) => geom,
                None => {
                    self.set_simple_linestring(srid, None)?;
                    continue;
                }
            };
            let mercator = if srid == SRID_WEB_MERCATOR {
                source
            } else {
                proj::transform_multi_line_string(&source, srid, SRID_WEB_MERCATOR)?
            };
            let simple = mercator.simplify(&tolerance);
            let simple = if srid == SRID_WEB_MERCATOR {
                simple
            } else {
                proj::transform_multi_line_string(&simple, SRID_WEB_MERCATOR, srid)?
            };
            self.set_simple_linestring(srid, Some(simple))?;
        }
        Ok(())
    }
}

/// A portal on the Metro Rail system where riders can access a stop.
///
/// A station can host multiple stops, like 7th Street / Metro Center holds
/// separate stops for the Blue and Red lines.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub line_ids: Vec<i64>,
}

/// A platform where a train stops.
///
/// A stop can host trains from multiple lines, like Civic Center has one
/// stop that runs both Purple and Red line trains. Each stop belongs to a
/// station.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub stop_id: Option<i64>,
    pub station_id: Option<i64>,
    pub line_ids: Vec<i64>,
    pub point_4269: Option<Point<f64>>,
    pub point_4326: Option<Point<f64>>,
    pub point_900913: Option<Point<f64>>,
}

impl Stop {
    /// The SRIDs of the point column set, in column order.
    pub fn srid_list() -> Vec<i32> {
        vec![SRID_NAD83, SRID_WGS84, SRID_WEB_MERCATOR]
    }

    pub fn point(&self, srid: i32) -> Result<Option<&Point<f64>>, ProjError> {
        match srid {
            SRID_NAD83 => Ok(self.point_4269.as_ref()),
            SRID_WGS84 => Ok(self.point_4326.as_ref()),
            SRID_WEB_MERCATOR => Ok(self.point_900913.as_ref()),
            other => Err(ProjError::UnknownSrid(other)),
        }
    }

    fn set_point(&mut self, srid: i32, geom: Option<Point<f64>>) -> Result<(), ProjError> {
        match srid {
            SRID_NAD83 => self.point_4269 = geom,
            SRID_WGS84 => self.point_4326 = geom,
            SRID_WEB_MERCATOR => self.point_900913 = geom,
            other => return Err(ProjError::UnknownSrid(other)),
        }
        Ok(())
    }

    /// Sync every point column from the one true column, defined by
    /// `canonical_srid`.
    pub fn set_points(&mut self, canonical_srid: i32) -> Result<(), ProjError> {
        let canonical = self.point(canonical_srid)?.cloned();
        for srid in Stop::srid_list() {
            if srid == canonical_srid {
                continue;
            }
            let derived = match canonical {
                Some(p) => Some(proj::transform_point(p, canonical_srid, srid)?),
                None => None,
            };
            self.set_point(srid, derived)?;
        }
        Ok(())
    }
}

/// Reduce a name to a URL-safe slug: lowercase, with runs of anything that
/// is not alphanumeric collapsed into single dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Render line names as an English list: "Blue", "Blue and Red",
/// "Blue, Gold and Red".
pub fn line_display(names: &[String]) -> String {
    match names.len() {
        0 => String::new(),
        1 => names[0].clone(),
        n => format!("{} and {}", names[..n - 1].join(", "), names[n - 1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Coord, LineString};

    fn zigzag_2229() -> MultiLineString<f64> {
        // A west-to-east run near the projection origin with small (~100 ft)
        // wobbles that a 500 m tolerance should flatten out.
        let coords: Vec<Coord<f64>> = (0..20)
            .map(|i| Coord {
                x: 6561666.0 + 2000.0 * i as f64,
                y: 1640416.0 + if i % 2 == 0 { 0.0 } else { 100.0 },
            })
            .collect();
        MultiLineString::new(vec![LineString::from(coords)])
    }

    #[test]
    fn set_linestrings_fills_every_srid() {
        let mut line = Line {
            name: "Blue".to_string(),
            linestring_2229: Some(zigzag_2229()),
            ..Default::default()
        };
        line.set_linestrings(SRID_STATE_PLANE).unwrap();
        assert!(line.linestring_4269.is_some());
        assert!(line.linestring_4326.is_some());
        assert!(line.linestring_900913.is_some());
        // 4269 and 4326 carry the same numbers.
        assert_eq!(line.linestring_4269, line.linestring_4326);
        // Coordinates actually left state plane range.
        let wgs = line.linestring_4326.as_ref().unwrap();
        let first = wgs.0[0].0[0];
        assert!(first.x < -117.0 && first.x > -119.0);
        assert!(first.y > 33.0 && first.y < 35.0);
    }

    #[test]
    fn set_linestrings_rejects_unknown_srid() {
        let mut line = Line::default();
        assert!(line.set_linestrings(3310).is_err());
    }

    #[test]
    fn empty_canonical_clears_derived_columns() {
        let mut line = Line {
            linestring_4326: Some(zigzag_2229()),
            ..Default::default()
        };
        line.set_linestrings(SRID_STATE_PLANE).unwrap();
        assert!(line.linestring_4326.is_none());
        assert!(line.linestring_900913.is_none());
    }

    #[test]
    fn simple_linestrings_drop_points() {
        let mut line = Line {
            name: "Blue".to_string(),
            linestring_2229: Some(zigzag_2229()),
            ..Default::default()
        };
        line.set_linestrings(SRID_STATE_PLANE).unwrap();
        line.set_simple_linestrings(500.0).unwrap();

        let full = line.linestring_4326.as_ref().unwrap().0[0].0.len();
        let simple = line.simple_linestring_4326.as_ref().unwrap().0[0].0.len();
        assert!(simple < full, "expected {} < {}", simple, full);
        assert!(line.simple_linestring_2229.is_some());
        assert!(line.simple_linestring_900913.is_some());
    }

    #[test]
    fn simple_linestrings_skip_empty_columns() {
        let mut line = Line::default();
        line.set_simple_linestrings(500.0).unwrap();
        assert!(line.simple_linestring_2229.is_none());
        assert!(line.simple_linestring_4326.is_none());
    }

    #[test]
    fn memberless_geometry_counts_as_empty() {
        // Every segment of a line can be degenerate and dropped, leaving a
        // MultiLineString with no members in the canonical column.
        let mut line = Line {
            name: "Ghost".to_string(),
            linestring_2229: Some(MultiLineString::new(Vec::new())),
            ..Default::default()
        };
        line.set_linestrings(SRID_STATE_PLANE).unwrap();
        assert!(line.linestring_4326.is_none());
        assert!(line.linestring_900913.is_none());

        line.set_simple_linestrings(500.0).unwrap();
        assert!(line.simple_linestring_2229.is_none());
        assert!(line.simple_linestring_4326.is_none());
    }

    #[test]
    fn set_points_fills_every_srid() {
        let mut stop = Stop {
            name: "Pico".to_string(),
            stop_id: Some(80101),
            point_4269: Some(Point::new(-118.2663, 34.0407)),
            ..Default::default()
        };
        stop.set_points(SRID_NAD83).unwrap();
        assert_eq!(stop.point_4326, Some(Point::new(-118.2663, 34.0407)));
        let merc = stop.point_900913.unwrap();
        assert!(merc.x() < -13_000_000.0);
        assert!(merc.y() > 4_000_000.0);
    }

    #[test]
    fn slugify_matches_expected_forms() {
        assert_eq!(slugify("Blue"), "blue");
        assert_eq!(slugify("7th Street / Metro Center"), "7th-street-metro-center");
        assert_eq!(slugify("  Willow  "), "willow");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn line_display_uses_english_list() {
        assert_eq!(line_display(&[]), "");
        assert_eq!(line_display(&["Blue".to_string()]), "Blue");
        assert_eq!(
            line_display(&["Blue".to_string(), "Red".to_string()]),
            "Blue and Red"
        );
        assert_eq!(
            line_display(&["Blue".to_string(), "Gold".to_string(), "Red".to_string()]),
            "Blue, Gold and Red"
        );
    }
}
