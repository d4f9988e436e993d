use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipcarError {
    /// Key does not decode to a CID, or the CID has no string form in its scheme
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container could not be decoded at open or encoded at close
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ZipcarError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ZipcarError::NotFound(_))
    }

    pub fn is_invalid_key(&self) -> bool {
        matches!(self, ZipcarError::InvalidKey(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ZipcarError::Unsupported(_))
    }
}

impl From<cid::Error> for ZipcarError {
    fn from(e: cid::Error) -> Self {
        ZipcarError::InvalidKey(e.to_string())
    }
}

impl From<toml::de::Error> for ZipcarError {
    fn from(e: toml::de::Error) -> Self {
        ZipcarError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZipcarError>;
