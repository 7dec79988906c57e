//! Heightmap Sources
//!
//! The heightmap is produced upstream; the lab only consumes it. A
//! [`HeightmapSource`] yields a validated [`HeightField`] or a
//! [`HeightmapError`] and never panics on bad data.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::height_field::HeightField;
use crate::error::HeightmapError;

/// Anything that can hand the lab a heightmap.
pub trait HeightmapSource {
    /// Short name for logs.
    fn describe(&self) -> String;

    /// Fetch and validate the heightmap.
    fn fetch(&self) -> Result<HeightField, HeightmapError>;

    /// Whether a heightmap can currently be fetched.
    fn is_available(&self) -> bool {
        self.fetch().is_ok()
    }
}

/// Reads a JSON payload from disk.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HeightmapSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch(&self) -> Result<HeightField, HeightmapError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| HeightmapError::Fetch(format!("{}: {e}", self.path.display())))?;
        HeightField::from_json_str(&text)
    }
}

/// In-memory payload (tests, scripted sessions, embedding hosts).
#[derive(Clone, Debug)]
pub struct StaticSource {
    payload: Option<Value>,
}

impl StaticSource {
    pub fn new(payload: Value) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// Source that never has data.
    pub fn empty() -> Self {
        Self { payload: None }
    }

    /// Source wrapping an already-built field.
    pub fn from_field(field: &HeightField) -> Self {
        Self::new(serde_json::json!({
            "width": field.width(),
            "height": field.height(),
            "z": field.samples(),
        }))
    }
}

impl HeightmapSource for StaticSource {
    fn describe(&self) -> String {
        "static payload".to_string()
    }

    fn fetch(&self) -> Result<HeightField, HeightmapError> {
        match &self.payload {
            Some(payload) => HeightField::from_json(payload),
            None => Err(HeightmapError::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_file_source_reads_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"width": 2, "height": 2, "z": [0, 1, 2, 3]}}"#).unwrap();
        let source = JsonFileSource::new(file.path());
        let field = source.fetch().unwrap();
        assert_eq!(field.at(1, 1), 3.0);
        assert!(source.is_available());
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let source = JsonFileSource::new("/definitely/not/here.json");
        assert!(matches!(source.fetch(), Err(HeightmapError::Fetch(_))));
        assert!(!source.is_available());
    }

    #[test]
    fn test_static_source_round_trips_field() {
        let field = HeightField::from_fn(4, 3, |x, z| (x * z) as f32).unwrap();
        assert_eq!(StaticSource::from_field(&field).fetch().unwrap(), field);
        assert_eq!(StaticSource::empty().fetch(), Err(HeightmapError::Missing));
        assert_eq!(
            StaticSource::new(json!({ "z": [] })).fetch(),
            Err(HeightmapError::Empty)
        );
    }
}
