// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use tiny_skia::{Mask, MaskType, Pixmap};

use crate::canvas::{Canvas, Layer};
use crate::clip::ClipBuffer;
use crate::document::Document;
use crate::error::Error;
use crate::geom::LengthCtx;
use crate::style::Style;
use crate::xmlext::SvgNodeExt;

/// Rasterizes the referenced `mask` element and multiplies the layer by
/// its luminance.
///
/// The mask content renders into a fresh buffer of the layer's size,
/// under a canvas whose transform is seeded from the referencing
/// element but whose style starts from the defaults. A missing target
/// is fatal, unlike a missing `use` target.
pub(crate) fn apply_referenced(
    doc: &Document,
    fragment: &str,
    referencing: &Canvas,
    layer: &mut Pixmap,
) -> Result<(), Error> {
    let element = doc
        .element_by_id(fragment)
        .filter(|n| n.is_svg_element("mask"))
        .ok_or_else(|| Error::MissingMask(fragment.to_string()))?;

    let _guard = doc.follow(element)?;

    if element.attribute("maskContentUnits") == Some("objectBoundingBox") {
        log::warn!("'maskContentUnits=objectBoundingBox' is not supported.");
    }

    let (w, h) = (layer.width(), layer.height());
    let mut content = Pixmap::new(w, h).ok_or(Error::LayerAllocationFailed)?;

    let mut canvas = Canvas {
        style: Style::default(),
        transform: referencing.transform,
        lengths: LengthCtx::default(),
        clip: Rc::new(ClipBuffer::new(w, h)?),
    };

    crate::traverse::apply_common_attributes(&mut canvas, element);

    {
        let mut out = Layer::new(&mut content, false, (w, h));
        if canvas.style.display {
            crate::traverse::render_children(element, &canvas, &mut out, doc)?;
        }
    }

    let luminance = Mask::from_pixmap(content.as_ref(), MaskType::Luminance);
    layer.apply_mask(&luminance);
    Ok(())
}
