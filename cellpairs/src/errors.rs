#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Got an invalid parameter value in a function
    InvalidParameter(String),
    /// The cutoff and box combination can not produce a usable neighbor list
    DegenerateGeometry(String),
    /// A launch was configured with a group width different from the number
    /// of slots in a cell
    GroupWidth {
        /// number of slots in a cell
        expected: usize,
        /// group width requested by the launch
        got: usize,
    },
    /// Some particles did not find an empty slot in their destination cell
    /// during redistribution
    CellOverflow {
        /// number of particles dropped during the launch
        dropped: usize,
    },
    /// Error while serializing/deserializing data
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Error::DegenerateGeometry(e) => write!(f, "degenerate geometry: {}", e),
            Error::GroupWidth { expected, got } => write!(
                f, "group width mismatch: cells have {} slots, but the launch uses groups of {} lanes",
                expected, got
            ),
            Error::CellOverflow { dropped } => write!(
                f, "cell overflow: {} particle(s) were dropped during redistribution", dropped
            ),
            Error::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidParameter(_) |
            Error::DegenerateGeometry(_) |
            Error::GroupWidth { .. } |
            Error::CellOverflow { .. } => None,
            Error::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}
