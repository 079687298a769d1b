//! Decode cache for embedded images, keyed by `src` payload.
//!
//! DESIGN
//! ======
//! Decoding is asynchronous and owned by the host. The cache only records
//! what state each source is in; an image item stays in the mirror the whole
//! time and is simply skipped by the renderer until its slot is ready. A
//! failed decode is final for this client.

#[cfg(test)]
#[path = "images_test.rs"]
mod images_test;

use std::collections::HashMap;

use crate::consts::IMAGE_DROP_MAX;

/// Decode state of one image source.
#[derive(Debug)]
pub enum Slot<I> {
    Pending,
    Ready(I),
    Failed,
}

/// Per-client image cache. `I` is the decoded handle the surface draws.
#[derive(Debug)]
pub struct ImageCache<I> {
    slots: HashMap<String, Slot<I>>,
}

impl<I> Default for ImageCache<I> {
    fn default() -> Self {
        Self { slots: HashMap::new() }
    }
}

impl<I> ImageCache<I> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `src` pending if it has never been seen.
    ///
    /// Returns `true` exactly when the caller should start a decode.
    pub fn request(&mut self, src: &str) -> bool {
        if self.slots.contains_key(src) {
            return false;
        }
        self.slots.insert(src.to_owned(), Slot::Pending);
        true
    }

    /// Store a decoded image. Returns `true` if this changed what can be drawn.
    pub fn resolve(&mut self, src: &str, image: I) -> bool {
        match self.slots.get(src) {
            Some(Slot::Ready(_) | Slot::Failed) => false,
            _ => {
                self.slots.insert(src.to_owned(), Slot::Ready(image));
                true
            }
        }
    }

    /// Record a failed decode. Failed sources are never retried.
    pub fn fail(&mut self, src: &str) {
        if !matches!(self.slots.get(src), Some(Slot::Ready(_))) {
            self.slots.insert(src.to_owned(), Slot::Failed);
        }
    }

    /// Decoded image for `src`, if ready.
    #[must_use]
    pub fn get(&self, src: &str) -> Option<&I> {
        match self.slots.get(src) {
            Some(Slot::Ready(image)) => Some(image),
            _ => None,
        }
    }

    #[must_use]
    pub fn slot(&self, src: &str) -> Option<&Slot<I>> {
        self.slots.get(src)
    }
}

/// Scale natural image dimensions down to fit the drop box, keeping the
/// aspect ratio. Images already inside the box keep their size.
#[must_use]
pub fn fit_to_drop_box(width: f64, height: f64) -> (f64, f64) {
    if width <= IMAGE_DROP_MAX && height <= IMAGE_DROP_MAX {
        return (width, height);
    }
    let ratio = width / height;
    if width > height {
        (IMAGE_DROP_MAX, IMAGE_DROP_MAX / ratio)
    } else {
        (IMAGE_DROP_MAX * ratio, IMAGE_DROP_MAX)
    }
}
