use thiserror::Error;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("BGL structure error: {0}")]
    Bgl(#[from] crate::bgl::BglError),
    #[error("asset transcode error: {0}")]
    Glb(#[from] crate::glb::GlbError),
    #[error("model metadata error: {0}")]
    Gxml(#[from] crate::bgl::gxml::GxmlError),
    #[error("error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<crate::bgl::BglError> for Error {
    fn from(x: crate::bgl::BglError) -> Error {
        Error { kind: x.into() }
    }
}

impl From<crate::glb::GlbError> for Error {
    fn from(x: crate::glb::GlbError) -> Error {
        Error { kind: x.into() }
    }
}

impl From<crate::bgl::gxml::GxmlError> for Error {
    fn from(x: crate::bgl::gxml::GxmlError) -> Error {
        Error { kind: x.into() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error { kind: x.into() }
    }
}

pub type IResult<T> = Result<T, Error>;
