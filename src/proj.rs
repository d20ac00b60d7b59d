use geo_types::{Coord, LineString, MultiLineString, Point};
use thiserror::Error;

/// The fixed spatial reference systems the schema publishes. There is no
/// general CRS machinery here; each system gets a hard-coded conversion,
/// always routed through lon/lat degrees.
///
/// - 2229: NAD83 / California State Plane zone V (US survey feet)
/// - 4269: NAD83 geographic lon/lat
/// - 4326: WGS84 geographic lon/lat
/// - 900913: spherical Web Mercator (alias of 3857)
pub const SRID_STATE_PLANE: i32 = 2229;
pub const SRID_NAD83: i32 = 4269;
pub const SRID_WGS84: i32 = 4326;
pub const SRID_WEB_MERCATOR: i32 = 900913;

#[derive(Error, Debug, PartialEq)]
pub enum ProjError {
    #[error("SRID {0} is not one of the supported reference systems")]
    UnknownSrid(i32),
}

// GRS80 ellipsoid
const A: f64 = 6378137.0;
const INV_F: f64 = 298.257222101;

// Web Mercator sphere radius
const R: f64 = 6378137.0;

// EPSG:2229 Lambert Conformal Conic (2SP) parameters
const LAT_1: f64 = 34.03333333333333; // standard parallel 1
const LAT_2: f64 = 35.46666666666667; // standard parallel 2
const LAT_0: f64 = 33.5; // latitude of origin
const LON_0: f64 = -118.0; // central meridian
const FALSE_EASTING_FT: f64 = 6561666.666666666;
const FALSE_NORTHING_FT: f64 = 1640416.666666667;
const US_FOOT: f64 = 1200.0 / 3937.0; // meters per US survey foot

/// Convert a coordinate between any two of the supported SRIDs.
///
/// NAD83 and WGS84 are treated as numerically identical; the datum shift is
/// below the precision of the source data.
pub fn transform_coord(c: Coord<f64>, from: i32, to: i32) -> Result<Coord<f64>, ProjError> {
    check_srid(from)?;
    check_srid(to)?;
    if from == to {
        return Ok(c);
    }
    let lonlat = match from {
        SRID_STATE_PLANE => state_plane_to_lonlat(c),
        SRID_WEB_MERCATOR => web_mercator_to_lonlat(c),
        _ => c,
    };
    Ok(match to {
        SRID_STATE_PLANE => lonlat_to_state_plane(lonlat),
        SRID_WEB_MERCATOR => lonlat_to_web_mercator(lonlat),
        _ => lonlat,
    })
}

pub fn transform_point(p: Point<f64>, from: i32, to: i32) -> Result<Point<f64>, ProjError> {
    Ok(Point(transform_coord(p.0, from, to)?))
}

pub fn transform_line_string(
    ls: &LineString<f64>,
    from: i32,
    to: i32,
) -> Result<LineString<f64>, ProjError> {
    let coords = ls
        .coords()
        .map(|c| transform_coord(*c, from, to))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LineString::from(coords))
}

pub fn transform_multi_line_string(
    mls: &MultiLineString<f64>,
    from: i32,
    to: i32,
) -> Result<MultiLineString<f64>, ProjError> {
    let lines = mls
        .iter()
        .map(|ls| transform_line_string(ls, from, to))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MultiLineString::new(lines))
}

fn check_srid(srid: i32) -> Result<(), ProjError> {
    match srid {
        SRID_STATE_PLANE | SRID_NAD83 | SRID_WGS84 | SRID_WEB_MERCATOR => Ok(()),
        other => Err(ProjError::UnknownSrid(other)),
    }
}

/// Lon/lat degrees to spherical Web Mercator meters.
pub fn lonlat_to_web_mercator(c: Coord<f64>) -> Coord<f64> {
    let x = R * c.x.to_radians();
    let y = R * (std::f64::consts::FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln();
    Coord { x, y }
}

/// Spherical Web Mercator meters to lon/lat degrees.
pub fn web_mercator_to_lonlat(c: Coord<f64>) -> Coord<f64> {
    let lon = (c.x / R).to_degrees();
    let lat = (2.0 * (c.y / R).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    Coord { x: lon, y: lat }
}

struct Lcc {
    e: f64,
    n: f64,
    big_f: f64,
    rho_0: f64,
}

// Snyder, "Map Projections: A Working Manual", eqs. 15-1..15-11.
fn lcc() -> Lcc {
    let f = 1.0 / INV_F;
    let e2 = 2.0 * f - f * f;
    let e = e2.sqrt();

    let phi_1 = LAT_1.to_radians();
    let phi_2 = LAT_2.to_radians();
    let phi_0 = LAT_0.to_radians();

    let m1 = lcc_m(phi_1, e);
    let m2 = lcc_m(phi_2, e);
    let t0 = lcc_t(phi_0, e);
    let t1 = lcc_t(phi_1, e);
    let t2 = lcc_t(phi_2, e);

    let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
    let big_f = m1 / (n * t1.powf(n));
    let rho_0 = A * big_f * t0.powf(n);

    Lcc { e, n, big_f, rho_0 }
}

fn lcc_m(phi: f64, e: f64) -> f64 {
    phi.cos() / (1.0 - e * e * phi.sin() * phi.sin()).sqrt()
}

fn lcc_t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Lon/lat degrees to EPSG:2229 easting/northing in US survey feet.
pub fn lonlat_to_state_plane(c: Coord<f64>) -> Coord<f64> {
    let p = lcc();
    let phi = c.y.to_radians();
    let lambda = c.x.to_radians();

    let rho = A * p.big_f * lcc_t(phi, p.e).powf(p.n);
    let theta = p.n * (lambda - LON_0.to_radians());

    let x_m = rho * theta.sin();
    let y_m = p.rho_0 - rho * theta.cos();

    Coord {
        x: x_m / US_FOOT + FALSE_EASTING_FT,
        y: y_m / US_FOOT + FALSE_NORTHING_FT,
    }
}

/// EPSG:2229 easting/northing in US survey feet to lon/lat degrees.
pub fn state_plane_to_lonlat(c: Coord<f64>) -> Coord<f64> {
    let p = lcc();
    let x_m = (c.x - FALSE_EASTING_FT) * US_FOOT;
    let y_m = (c.y - FALSE_NORTHING_FT) * US_FOOT;

    let rho = (x_m * x_m + (p.rho_0 - y_m) * (p.rho_0 - y_m)).sqrt();
    let t = (rho / (A * p.big_f)).powf(1.0 / p.n);
    let theta = x_m.atan2(p.rho_0 - y_m);

    let lambda = theta / p.n + LON_0.to_radians();

    // Iterate eq. 7-9 for the latitude; converges in a handful of rounds.
    let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
    for _ in 0..10 {
        let es = p.e * phi.sin();
        let next = std::f64::consts::FRAC_PI_2
            - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(p.e / 2.0)).atan();
        if (next - phi).abs() < 1e-12 {
            phi = next;
            break;
        }
        phi = next;
    }

    Coord {
        x: lambda.to_degrees(),
        y: phi.to_degrees(),
    }
}
