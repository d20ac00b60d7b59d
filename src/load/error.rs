use thiserror::Error;

/// An error that can occur during the one-shot import.
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory file is not present in the source directory or archive
    #[error("Could not find file {0}")]
    MissingFile(String),
    /// The given source path is neither a file nor a directory
    #[error("Could not read source: {0} is neither a file nor a directory")]
    NotFileNorDirectory(String),
    /// A source layer parsed but contained no features
    #[error("No features in {0}")]
    EmptySource(String),
    /// A feature is missing a property the import needs
    #[error("A feature in '{file}' is missing property '{property}'")]
    MissingProperty { file: String, property: String },
    /// A feature has no geometry at all
    #[error("A feature in '{file}' has no geometry")]
    MissingGeometry { file: String },
    /// A feature carried a geometry type the layer should not contain
    #[error("'{file}' contains a {found} feature, expected {expected}")]
    UnexpectedGeometry {
        file: String,
        found: String,
        expected: String,
    },
    /// The same stop id appeared twice in the stops layer
    #[error("Duplicate stop id {0} in the stops layer")]
    DuplicateStopId(i64),
    /// A stop has no row in the crosswalk; the dataset is small and curated,
    /// so this is a data bug rather than something to paper over
    #[error("No crosswalk row for stop id {0}")]
    MissingCrosswalk(i64),
    /// The crosswalk names a line that was not in the lines layer
    #[error("Crosswalk references unknown line '{0}'")]
    UnknownLine(String),
    /// A stop needed nearest-line association but no lines were loaded
    #[error("No lines loaded, cannot associate stop id {0}")]
    NoLines(i64),
    /// Generic Input/Output error while reading a file
    #[error("impossible to read file")]
    IO(#[from] std::io::Error),
    /// Impossible to read a CSV file
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Impossible to parse a GeoJSON layer
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
    /// Error when trying to unzip the source archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Error when querying sqlite
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Error when reading or writing model rows
    #[error(transparent)]
    Model(#[from] crate::models::error::Error),
    /// Error when reprojecting a geometry
    #[error(transparent)]
    Proj(#[from] crate::proj::ProjError),
}
