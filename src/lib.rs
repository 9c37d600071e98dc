// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
svgray is a streaming SVG rasterizer.

It walks a parsed SVG document tree and rasterizes it into an RGBA
pixel buffer: cascading presentation attributes, nested coordinate
systems and viewports, filled/stroked/dashed paths with markers,
gradient paint servers, group opacity, clipping, masking, filters and
cycle-safe `use` indirection.

```no_run
let text = std::fs::read_to_string("image.svg").unwrap();
let xml = svgray::roxmltree::Document::parse(&text).unwrap();
let mut image = svgray::ImageBuffer::new();
svgray::render(&xml, &mut image).unwrap();
image.take().unwrap().save_png("image.png").unwrap();
```
*/

#![forbid(unsafe_code)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::uninlined_format_args)]

pub use roxmltree;
pub use tiny_skia;

mod buffer;
mod canvas;
mod clip;
mod document;
mod error;
mod filter;
mod geom;
mod marker;
mod mask;
mod paint_server;
mod path;
mod style;
mod traverse;
mod xmlext;

pub use buffer::ImageBuffer;
pub use error::Error;

/// Renders a parsed SVG document into the image buffer.
///
/// The buffer must be freshly created; it is sized from the root
/// viewport during rendering. The produced content is in the sRGB
/// color space, non-premultiplied when encoded to PNG.
pub fn render(xml: &roxmltree::Document, image: &mut ImageBuffer) -> Result<(), Error> {
    traverse::render_document(xml, image)
}
