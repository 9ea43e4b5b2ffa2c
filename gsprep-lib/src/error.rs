use std::{fmt, io};

use crate::structures::Attribute;

#[derive(Debug)]
pub enum GsprepError {
    MalformedHeader(String),
    UnknownScalarType(String),
    MissingAttribute(Attribute),
    ParseCameras(String),
    PackLayout(String),
    Render(String),
    IoError(io::Error),
}

impl fmt::Display for GsprepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GsprepError::MalformedHeader(e) => {
                write!(f, "Failed to parse the point-cloud header: {}", e)
            }
            GsprepError::UnknownScalarType(e) => {
                write!(f, "Unrecognized property type keyword: {}", e)
            }
            GsprepError::MissingAttribute(attr) => {
                write!(f, "Missing required attribute: {}", attr)
            }
            GsprepError::ParseCameras(e) => {
                write!(f, "Failed to parse the camera configuration: {}", e)
            }
            GsprepError::PackLayout(e) => {
                write!(f, "Point buffer layout is unusable: {}", e)
            }
            GsprepError::Render(e) => {
                write!(f, "The renderer rejected the dispatch: {}", e)
            }
            GsprepError::IoError(e) => {
                write!(f, "An I/O error occurred: {}", e)
            }
        }
    }
}

impl std::error::Error for GsprepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GsprepError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
