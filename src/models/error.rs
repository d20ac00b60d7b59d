use thiserror::Error;

/// An error that can occur when reading or writing model rows.
#[derive(Error, Debug)]
pub enum Error {
    /// A geometry column held text that could not be parsed as WKT
    #[error("invalid WKT in column '{0}'")]
    Wkt(String),
    /// A geometry could not be reprojected
    #[error(transparent)]
    Proj(#[from] crate::proj::ProjError),
    /// Error when querying sqlite
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
