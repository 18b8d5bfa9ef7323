use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no image frames found")]
    EmptySequence,
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unexpected frame layout ({width}x{height}, {bytes} bytes)")]
    FrameLayout {
        width: u32,
        height: u32,
        bytes: usize,
    },
    #[cfg(feature = "opencv")]
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

/// Blocking source of color frames.
///
/// `Ok(None)` is the end of the stream. An error means the device can no
/// longer be read; callers treat both as the end of a run.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        (**self).next_frame()
    }
}

/// Frames decoded one by one from image files.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    repeat: bool,
}

impl ImageSequenceSource {
    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self, CaptureError> {
        if paths.is_empty() {
            return Err(CaptureError::EmptySequence);
        }
        Ok(Self {
            paths,
            next: 0,
            repeat: false,
        })
    }

    /// Expand directories to their image files (sorted by name) and keep
    /// plain files as given. Every input must exist.
    pub fn open(inputs: &[PathBuf]) -> Result<Self, CaptureError> {
        let mut paths = Vec::new();
        for input in inputs {
            let meta = fs::metadata(input).map_err(|source| CaptureError::Io {
                path: input.clone(),
                source,
            })?;
            if meta.is_dir() {
                paths.extend(list_images(input)?);
            } else {
                paths.push(input.clone());
            }
        }
        Self::from_paths(paths)
    }

    /// Start over after the last frame instead of ending the stream.
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        if self.next >= self.paths.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        log::debug!("reading frame {}", path.display());
        let reader = ImageReader::open(path).map_err(|source| CaptureError::Io {
            path: path.clone(),
            source,
        })?;
        let img = reader.decode().map_err(|source| CaptureError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(img.to_rgb8()))
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let io_err = |source| CaptureError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_image {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// In-memory frames, handed out in order.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn empty_sequence_is_an_error() {
        assert!(matches!(
            ImageSequenceSource::from_paths(Vec::new()),
            Err(CaptureError::EmptySequence)
        ));
    }

    #[test]
    fn directory_frames_are_sorted_and_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, v) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(4, 3, Rgb([v, v, v]))
                .save(dir.path().join(name))
                .expect("save");
        }
        fs::write(dir.path().join("notes.txt"), "not a frame").expect("write");

        let mut src = ImageSequenceSource::open(&[dir.path().to_path_buf()]).expect("open");
        assert_eq!(src.len(), 3);
        let firsts: Vec<u8> = std::iter::from_fn(|| src.next_frame().expect("frame"))
            .map(|f| f.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(firsts, vec![10, 20, 30]);
        assert!(src.next_frame().expect("eos").is_none());
    }

    #[test]
    fn repeat_wraps_around() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("only.png");
        RgbImage::new(2, 2).save(&path).expect("save");
        let mut src = ImageSequenceSource::from_paths(vec![path])
            .expect("source")
            .with_repeat(true);
        for _ in 0..3 {
            assert!(src.next_frame().expect("frame").is_some());
        }
    }

    #[test]
    fn missing_input_is_rejected_up_front() {
        let err = ImageSequenceSource::open(&[PathBuf::from("/nonexistent/frames")]).unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
    }

    #[test]
    fn unreadable_file_is_an_acquisition_error() {
        let mut src =
            ImageSequenceSource::from_paths(vec![PathBuf::from("/nonexistent/frame.png")])
                .expect("source");
        assert!(matches!(src.next_frame(), Err(CaptureError::Io { .. })));
    }

    #[test]
    fn memory_source_drains() {
        let mut src = MemorySource::new([RgbImage::new(1, 1), RgbImage::new(2, 2)]);
        assert_eq!(src.next_frame().expect("frame").map(|f| f.width()), Some(1));
        assert_eq!(src.next_frame().expect("frame").map(|f| f.width()), Some(2));
        assert!(src.next_frame().expect("eos").is_none());
    }
}
