//! Sequential frame sources.

use crate::image::GrayImage;

/// Sequential access to images by increasing frame id. A `None` image means
/// the frame is unavailable and should be skipped.
pub trait FrameSource {
    fn has_more(&self, next_id: usize) -> bool;
    fn image(&mut self, id: usize) -> Option<GrayImage>;
}

/// In-memory source; `None` slots model dropped frames.
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: Vec<Option<GrayImage>>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Option<GrayImage>>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for VecFrameSource {
    fn has_more(&self, next_id: usize) -> bool {
        next_id < self.frames.len()
    }

    fn image(&mut self, id: usize) -> Option<GrayImage> {
        self.frames.get(id).cloned().flatten()
    }
}
