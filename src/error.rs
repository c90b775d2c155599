use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("regression matrix is singular or not invertible")]
    SingularMatrix,

    #[error("sample has {found} features, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("no training samples")]
    EmptyTrainingSet,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
