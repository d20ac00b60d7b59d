pub mod db;
pub mod error;
pub mod geojson;
pub mod structs;
