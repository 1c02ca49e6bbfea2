// vega-preprocess/src/source.rs
use image::{ImageReader, RgbImage};
use std::io::{BufRead, Cursor, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where an image comes from. Callers pick the variant; bytes are never
/// reinterpreted as a path or vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Bytes(bytes.into())
    }

    /// Short human-readable description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Source::Path(path) => path.display().to_string(),
            Source::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to detect image format of {0}")]
    Format(String),
    #[error("Failed to decode image {what}: {source}")]
    Image {
        what: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Image {0} has zero area")]
    Empty(String),
}

/// Decode `source` into an 8-bit RGB raster (alpha and extra channels dropped).
pub fn decode(source: &Source) -> Result<RgbImage, DecodeError> {
    let what = source.describe();
    let image = match source {
        Source::Path(path) => {
            let reader = ImageReader::open(path).map_err(|e| DecodeError::Open {
                path: path.clone(),
                source: e,
            })?;
            decode_reader(reader, &what)?
        }
        Source::Bytes(bytes) => decode_reader(ImageReader::new(Cursor::new(bytes.as_slice())), &what)?,
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Empty(what));
    }
    debug!(source = %what, width = image.width(), height = image.height(), "decoded image");
    Ok(image)
}

fn decode_reader<R: BufRead + Seek>(reader: ImageReader<R>, what: &str) -> Result<RgbImage, DecodeError> {
    let reader = reader
        .with_guessed_format()
        .map_err(|_| DecodeError::Format(what.to_string()))?;
    let image = reader.decode().map_err(|e| DecodeError::Image {
        what: what.to_string(),
        source: e,
    })?;
    Ok(image.to_rgb8())
}
