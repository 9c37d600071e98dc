// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::{FillRule, Mask, MaskType, PathBuilder, Pixmap, Transform};

use crate::document::Document;
use crate::error::Error;
use crate::geom::LengthCtx;
use crate::xmlext::SvgNodeExt;

/// A shared coverage plane that masks everything composited through it.
///
/// Starts fully opaque and only ever narrows. Parent and child canvases
/// share one buffer by reference; a canvas clones it before narrowing
/// when the handle is shared (copy-on-write through `Rc::make_mut`).
#[derive(Clone)]
pub struct ClipBuffer {
    coverage: Pixmap,
}

impl ClipBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        let mut coverage = Pixmap::new(width.max(1), height.max(1))
            .ok_or(Error::LayerAllocationFailed)?;
        coverage.fill(tiny_skia::Color::WHITE);
        Ok(ClipBuffer { coverage })
    }

    pub fn to_mask(&self) -> Mask {
        Mask::from_pixmap(self.coverage.as_ref(), MaskType::Alpha)
    }

    /// Narrows the coverage to its intersection with a transformed rectangle.
    pub fn intersect_rect(
        &mut self,
        ts: Transform,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    ) -> Result<(), Error> {
        let rect = match tiny_skia::Rect::from_xywh(x, y, w, h) {
            Some(v) => v,
            None => {
                log::warn!("Invalid clip rectangle: {} {} {} {}.", x, y, w, h);
                return Ok(());
            }
        };

        let path = PathBuilder::from_rect(rect);
        let mut cover = Mask::new(self.coverage.width(), self.coverage.height())
            .ok_or(Error::LayerAllocationFailed)?;
        cover.fill_path(&path, FillRule::Winding, true, ts);
        self.coverage.apply_mask(&cover);
        Ok(())
    }

    /// Narrows the coverage to its intersection with the silhouette of a
    /// `clipPath` element evaluated under `ts`.
    ///
    /// A missing or non-`clipPath` target leaves the coverage unchanged.
    pub fn intersect_clip_path(
        &mut self,
        doc: &Document,
        fragment: &str,
        ts: Transform,
    ) -> Result<(), Error> {
        let element = match doc.element_by_id(fragment) {
            Some(v) => v,
            None => {
                log::warn!("Element referenced by 'clip-path' not found: '#{}'.", fragment);
                return Ok(());
            }
        };

        if !element.is_svg_element("clipPath") {
            log::warn!("'clip-path' must reference a 'clipPath' element.");
            return Ok(());
        }

        let _guard = doc.follow(element)?;

        let mut silhouette = Pixmap::new(self.coverage.width(), self.coverage.height())
            .ok_or(Error::LayerAllocationFailed)?;

        let base_ts = match element.transform_attr() {
            Some(v) => ts.pre_concat(v),
            None => ts,
        };

        let lengths = LengthCtx::default();
        for child in element.children().filter(|n| n.is_element()) {
            let path = match crate::path::shape_to_path(child, &lengths) {
                Some(v) => v,
                None => continue,
            };

            let child_ts = match child.transform_attr() {
                Some(v) => base_ts.pre_concat(v),
                None => base_ts,
            };

            let rule = match child.attribute("clip-rule").or(child.attribute("fill-rule")) {
                Some("evenodd") => FillRule::EvenOdd,
                _ => FillRule::Winding,
            };

            let mut paint = tiny_skia::Paint::default();
            paint.set_color(tiny_skia::Color::WHITE);
            paint.anti_alias = true;

            silhouette
                .as_mut()
                .fill_path(&path, &paint, rule, child_ts, None);
        }

        let mask = Mask::from_pixmap(silhouette.as_ref(), MaskType::Alpha);
        self.coverage.apply_mask(&mask);
        Ok(())
    }

    #[cfg(test)]
    fn coverage_at(&self, x: u32, y: u32) -> u8 {
        self.coverage.pixel(x, y).map_or(0, |p| p.alpha())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fully_opaque() {
        let clip = ClipBuffer::new(4, 4).unwrap();
        assert_eq!(clip.coverage_at(0, 0), 255);
        assert_eq!(clip.coverage_at(3, 3), 255);
    }

    #[test]
    fn rect_intersection_narrows() {
        let mut clip = ClipBuffer::new(10, 10).unwrap();
        clip.intersect_rect(Transform::identity(), 0.0, 0.0, 5.0, 10.0)
            .unwrap();
        assert_eq!(clip.coverage_at(2, 2), 255);
        assert_eq!(clip.coverage_at(8, 2), 0);

        // A second intersection never widens.
        clip.intersect_rect(Transform::identity(), 0.0, 0.0, 10.0, 5.0)
            .unwrap();
        assert_eq!(clip.coverage_at(2, 2), 255);
        assert_eq!(clip.coverage_at(2, 8), 0);
    }

    #[test]
    fn degenerate_rect_is_ignored() {
        let mut clip = ClipBuffer::new(4, 4).unwrap();
        clip.intersect_rect(Transform::identity(), 0.0, 0.0, -1.0, 4.0)
            .unwrap();
        assert_eq!(clip.coverage_at(2, 2), 255);
    }
}
