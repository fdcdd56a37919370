use std::io;

/// All error types for the atlas baker.
///
/// Only conditions that must abort a build live here. Recoverable problems
/// (missing materials, unavailable textures, stale cache entries) are
/// collected in [`crate::report::BuildReport`] instead.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Tile offset {value} for face {face} is outside the supported range {min}..={max}")]
    TileOffsetOutOfRange {
        face: usize,
        value: f32,
        min: i8,
        max: i8,
    },
    #[error("Invalid group pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_strings() {
        let e = AtlasError::Input("bad file".into());
        assert_eq!(e.to_string(), "Input error: bad file");

        let e = AtlasError::Output("disk full".into());
        assert_eq!(e.to_string(), "Output error: disk full");

        let e = AtlasError::TileOffsetOutOfRange {
            face: 7,
            value: 300.0,
            min: i8::MIN,
            max: i8::MAX,
        };
        assert_eq!(
            e.to_string(),
            "Tile offset 300 for face 7 is outside the supported range -128..=127"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let e: AtlasError = io_err.into();
        assert!(matches!(e, AtlasError::Io(_)));
        assert!(e.to_string().contains("file missing"));
    }

    #[test]
    fn invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let e = AtlasError::InvalidPattern {
            pattern: "(".into(),
            source,
        };
        assert!(e.to_string().starts_with("Invalid group pattern \"(\""));
        assert!(std::error::Error::source(&e).is_some());
    }
}
