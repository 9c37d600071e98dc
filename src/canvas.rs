// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::clip::ClipBuffer;
use crate::document::Document;
use crate::error::Error;
use crate::geom::LengthCtx;
use crate::style::Style;

/// One level of the render tree.
///
/// Bundles the inherited style, the current transform, the length
/// context and the shared clip coverage. Drawing targets are managed
/// separately through [`Layer`], so a canvas itself is cheap to clone
/// into children.
#[derive(Clone)]
pub struct Canvas {
    pub style: Style,
    pub transform: Transform,
    pub lengths: LengthCtx,
    pub clip: Rc<ClipBuffer>,
}

impl Canvas {
    /// The canvas for the topmost `svg` element. The half-pixel
    /// translation makes integer coordinates sample pixel centers.
    /// The clip placeholder is replaced once the root viewport is known.
    pub fn root() -> Result<Self, Error> {
        Ok(Canvas {
            style: Style::default(),
            transform: Transform::from_translate(0.5, 0.5),
            lengths: LengthCtx::default(),
            clip: Rc::new(ClipBuffer::new(1, 1)?),
        })
    }

    /// A child context inheriting style, transform and clip coverage.
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// A child context that starts from the default style
    /// (marker contents do not inherit the referencing path's style).
    pub fn child_unstyled(&self) -> Self {
        Canvas {
            style: Style::default(),
            ..self.clone()
        }
    }

    /// Whether this canvas must render into its own offscreen buffer.
    /// This is the single place the offscreen decision is made.
    pub fn needs_layer(&self) -> bool {
        self.style.opacity < 0.999
            || self.style.mask.is_some()
            || self.style.clip_path.is_some()
            || self.style.filter.is_some()
    }
}

/// Anything a layer can composite into.
pub trait Target {
    fn buffer(&mut self) -> Result<&mut Pixmap, Error>;
}

impl Target for Pixmap {
    fn buffer(&mut self) -> Result<&mut Pixmap, Error> {
        Ok(self)
    }
}

/// A deferred drawing target for one canvas.
///
/// When the canvas does not need an offscreen buffer, draws fall
/// through to the parent target. Otherwise the backing pixmap is
/// allocated on the first draw that actually reaches this layer, so a
/// canvas whose subtree draws nothing composites nothing - not even a
/// filter output.
pub struct Layer<'p> {
    parent: &'p mut dyn Target,
    own: Option<Pixmap>,
    layered: bool,
    size: (u32, u32),
}

impl<'p> Layer<'p> {
    pub fn new(parent: &'p mut dyn Target, layered: bool, size: (u32, u32)) -> Self {
        Layer {
            parent,
            own: None,
            layered,
            size,
        }
    }

    /// Composites the layer into its parent target.
    ///
    /// No-op when no offscreen buffer was materialized. Otherwise:
    /// filter, clip-path intersection (copy-on-write), clip coverage
    /// multiply, mask multiply, then an alpha-weighted blend at the
    /// canvas opacity.
    pub fn finish(mut self, canvas: &mut Canvas, doc: &Document) -> Result<(), Error> {
        let mut own = match self.own.take() {
            Some(v) => v,
            None => return Ok(()),
        };

        let parent = self.parent.buffer()?;

        if let Some(filter_id) = canvas.style.filter.clone() {
            crate::filter::apply_referenced(doc, &filter_id, canvas, &mut own, parent)?;
        }

        if let Some(clip_id) = canvas.style.clip_path.clone() {
            let clip = Rc::make_mut(&mut canvas.clip);
            clip.intersect_clip_path(doc, &clip_id, canvas.transform)?;
        }

        own.apply_mask(&canvas.clip.to_mask());

        if let Some(mask_id) = canvas.style.mask.clone() {
            crate::mask::apply_referenced(doc, &mask_id, canvas, &mut own)?;
        }

        let paint = PixmapPaint {
            opacity: canvas.style.opacity,
            blend_mode: tiny_skia::BlendMode::SourceOver,
            quality: tiny_skia::FilterQuality::Nearest,
        };

        parent.draw_pixmap(0, 0, own.as_ref(), &paint, Transform::identity(), None);

        Ok(())
    }
}

impl Target for Layer<'_> {
    fn buffer(&mut self) -> Result<&mut Pixmap, Error> {
        if !self.layered {
            return self.parent.buffer();
        }

        let own = match self.own.take() {
            Some(v) => v,
            None => Pixmap::new(self.size.0.max(1), self.size.1.max(1))
                .ok_or(Error::LayerAllocationFailed)?,
        };

        Ok(self.own.insert(own))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_layer_draws_into_parent() {
        let mut parent = Pixmap::new(4, 4).unwrap();
        let mut layer = Layer::new(&mut parent, false, (4, 4));
        layer.buffer().unwrap().fill(tiny_skia::Color::BLACK);
        assert!(layer.own.is_none());
        assert_eq!(parent.pixel(0, 0).unwrap().alpha(), 255);
    }

    #[test]
    fn layered_target_stays_lazy() {
        let mut parent = Pixmap::new(4, 4).unwrap();
        let layer = Layer::new(&mut parent, true, (4, 4));
        assert!(layer.own.is_none());
    }

    #[test]
    fn layered_target_materializes_on_draw() {
        let mut parent = Pixmap::new(4, 4).unwrap();
        let mut layer = Layer::new(&mut parent, true, (4, 4));
        layer.buffer().unwrap().fill(tiny_skia::Color::BLACK);
        assert!(layer.own.is_some());
        assert_eq!(parent.pixel(0, 0).unwrap().alpha(), 0);
    }
}
