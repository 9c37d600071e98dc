// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::Pixmap;

/// The caller-owned render target.
///
/// Created unsized; the engine renders into a staging pixmap sized
/// from the root viewport and installs it here only when the whole
/// render succeeds, so a fatal error never commits a partial image.
/// Once set, the size never changes for the lifetime of the buffer.
#[derive(Default)]
pub struct ImageBuffer {
    pixmap: Option<Pixmap>,
}

impl ImageBuffer {
    pub fn new() -> Self {
        ImageBuffer::default()
    }

    pub fn is_size_set(&self) -> bool {
        self.pixmap.is_some()
    }

    pub(crate) fn install(&mut self, pixmap: Pixmap) {
        debug_assert!(self.pixmap.is_none());
        self.pixmap = Some(pixmap);
    }

    pub fn width(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, |p| p.width())
    }

    pub fn height(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, |p| p.height())
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Takes the rendered pixels out of the buffer.
    pub fn take(&mut self) -> Option<Pixmap> {
        self.pixmap.take()
    }
}
