//! Request target decoding.
//!
//! # Responsibilities
//! - Turn the request path into either the root listing or one entity name
//! - Percent-decode entity names (UTF-8 only)
//!
//! # Design Decisions
//! - The query string is never part of an entity name
//! - Only the leading slash is stripped; the rest of the path is the name

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// What a client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// `GET /`: every known entity.
    Root,
    /// `GET /<name>`: one entity, as typed by the client (canonical or alias).
    Entity(String),
}

/// The path could not be decoded into a name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("path '{path}' is not valid percent-encoded UTF-8")]
pub struct TargetError {
    pub path: String,
}

impl RequestTarget {
    /// Decode a URI path (without query) into a target.
    pub fn from_path(path: &str) -> Result<Self, TargetError> {
        let raw = path.strip_prefix('/').unwrap_or(path);
        if raw.is_empty() {
            return Ok(Self::Root);
        }

        let name: Cow<'_, str> = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| TargetError {
                path: path.to_string(),
            })?;

        Ok(Self::Entity(name.into_owned()))
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Entity(name) => write!(f, "/{}", name),
        }
    }
}
