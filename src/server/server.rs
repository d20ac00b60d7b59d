use crate::models::db;
use crate::models::geojson;
use crate::server::cors::cors_middleware;

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use rusqlite::Connection;
use serde_json::Value;
use std::sync::Mutex;

// Read-only browsing over an already-loaded database. There are no mutation
// endpoints; reloading data is the loader binary's job.
struct AppState {
    conn: Mutex<Connection>,
}

fn internal_error(err: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("{}", err)
    }))
}

fn not_found(what: &str, slug: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": format!("{} '{}' not found", what, slug)
    }))
}

#[get("/lines")]
async fn lines(data: web::Data<AppState>) -> impl Responder {
    let conn = data.conn.lock().unwrap();
    match db::list_lines(&conn) {
        Ok(lines) => HttpResponse::Ok().json(lines),
        Err(e) => internal_error(e),
    }
}

#[get("/lines/{slug}")]
async fn line_detail(slug: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let slug = slug.into_inner();
    let conn = data.conn.lock().unwrap();
    let line = match db::get_line_by_slug(&conn, &slug) {
        Ok(Some(line)) => line,
        Ok(None) => return not_found("Line", &slug),
        Err(e) => return internal_error(e),
    };
    let stop_count = match line.id.map(|id| db::line_stop_count(&conn, id)) {
        Some(Ok(count)) => count,
        Some(Err(e)) => return internal_error(e),
        None => 0,
    };
    let geometry: Option<Value> = line
        .simple_linestring_4326
        .as_ref()
        .map(geojson::multi_line_string_geometry);
    HttpResponse::Ok().json(serde_json::json!({
        "name": line.name,
        "slug": line.slug,
        "stop_count": stop_count,
        "geometry": geometry,
    }))
}

#[get("/stations")]
async fn stations(data: web::Data<AppState>) -> impl Responder {
    let conn = data.conn.lock().unwrap();
    match db::list_stations(&conn) {
        Ok(stations) => HttpResponse::Ok().json(stations),
        Err(e) => internal_error(e),
    }
}

#[get("/stations/{slug}")]
async fn station_detail(slug: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let slug = slug.into_inner();
    let conn = data.conn.lock().unwrap();
    match db::get_station_by_slug(&conn, &slug) {
        Ok(Some(station)) => HttpResponse::Ok().json(serde_json::json!({
            "name": station.name,
            "slug": station.slug,
            "lines": station.lines,
            "line_display": station.line_display,
            "stop_count": station.stop_count,
        })),
        Ok(None) => not_found("Station", &slug),
        Err(e) => internal_error(e),
    }
}

#[get("/stops")]
async fn stops(data: web::Data<AppState>) -> impl Responder {
    let conn = data.conn.lock().unwrap();
    match db::list_stops(&conn) {
        Ok(stops) => HttpResponse::Ok().json(stops),
        Err(e) => internal_error(e),
    }
}

#[get("/stops/{slug}")]
async fn stop_detail(slug: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let slug = slug.into_inner();
    let conn = data.conn.lock().unwrap();
    match db::get_stop_by_slug(&conn, &slug) {
        Ok(Some(stop)) => HttpResponse::Ok().json(serde_json::json!({
            "stop_id": stop.summary.stop_id,
            "name": stop.summary.name,
            "slug": stop.summary.slug,
            "station": stop.summary.station,
            "lines": stop.summary.lines,
            "line_display": stop.summary.line_display,
            "geometry": stop.point_4326.as_ref().map(geojson::point_geometry),
        })),
        Ok(None) => not_found("Stop", &slug),
        Err(e) => internal_error(e),
    }
}

#[get("/map.geojson")]
async fn map_geojson(data: web::Data<AppState>) -> impl Responder {
    let conn = data.conn.lock().unwrap();
    // The `lines`/`stops` handler fns above occupy those names in this scope.
    let line_rows = match db::all_lines(&conn) {
        Ok(rows) => rows,
        Err(e) => return internal_error(e),
    };
    let stop_rows = match db::all_stops(&conn) {
        Ok(rows) => rows,
        Err(e) => return internal_error(e),
    };
    let mut features = geojson::get_line_features(&line_rows);
    features.extend(geojson::get_stop_features(&stop_rows));
    HttpResponse::Ok().json(geojson::convert_to_geojson(&features))
}

/// Serve the browse API for the database at `db_path`.
pub async fn run(db_path: String, addr: &str) -> std::io::Result<()> {
    let conn = Connection::open(&db_path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let data = web::Data::new(AppState {
        conn: Mutex::new(conn),
    });
    log::info!("Serving rail browse API for {} on {}", db_path, addr);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(cors_middleware())
            .service(lines)
            .service(line_detail)
            .service(stations)
            .service(station_detail)
            .service(stops)
            .service(stop_detail)
            .service(map_geojson)
    })
    .bind(addr)?
    .run()
    .await
}
