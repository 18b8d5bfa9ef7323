use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to save frame {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[cfg(feature = "opencv")]
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

/// Receives one annotated frame per loop iteration and reports the
/// operator's quit request.
pub trait DisplaySink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Polled once per iteration after `show`.
    fn quit_requested(&mut self) -> Result<bool, DisplayError>;
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(frame)
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        (**self).quit_requested()
    }
}

/// Display without a window: optionally writes annotated frames as PNG and
/// quits when a shared flag is raised (e.g. by Ctrl+C).
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    save_dir: Option<PathBuf>,
    dir_ready: bool,
    frame_index: usize,
    quit: Arc<AtomicBool>,
}

impl HeadlessDisplay {
    pub fn new(save_dir: Option<PathBuf>) -> Self {
        Self {
            save_dir,
            ..Self::default()
        }
    }

    pub fn with_quit_flag(mut self, quit: Arc<AtomicBool>) -> Self {
        self.quit = quit;
        self
    }

    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// Raise the quit flag on Ctrl+C. Only one handler per process.
    pub fn install_ctrlc(&self) -> Result<(), DisplayError> {
        let flag = self.quit_flag();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })?;
        Ok(())
    }

    pub fn frames_shown(&self) -> usize {
        self.frame_index
    }
}

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if let Some(dir) = &self.save_dir {
            if !self.dir_ready {
                fs::create_dir_all(dir).map_err(|source| DisplayError::Io {
                    path: dir.clone(),
                    source,
                })?;
                self.dir_ready = true;
            }
            let path = dir.join(format!("frame_{:06}.png", self.frame_index));
            frame
                .save(&path)
                .map_err(|source| DisplayError::Save { path, source })?;
        }
        self.frame_index += 1;
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, DisplayError> {
        Ok(self.quit.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_numbered_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("annotated");
        let mut display = HeadlessDisplay::new(Some(out.clone()));
        display.show(&RgbImage::new(3, 3)).expect("show");
        display.show(&RgbImage::new(3, 3)).expect("show");
        assert!(out.join("frame_000000.png").is_file());
        assert!(out.join("frame_000001.png").is_file());
        assert_eq!(display.frames_shown(), 2);
    }

    #[test]
    fn quit_flag_is_shared() {
        let mut display = HeadlessDisplay::new(None);
        assert!(!display.quit_requested().expect("poll"));
        display.quit_flag().store(true, Ordering::SeqCst);
        assert!(display.quit_requested().expect("poll"));
    }
}
