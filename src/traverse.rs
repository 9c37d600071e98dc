// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use svgtypes::{AspectRatio, Length, LengthUnit, ViewBox};

use crate::buffer::ImageBuffer;
use crate::canvas::{Canvas, Layer, Target};
use crate::clip::ClipBuffer;
use crate::document::Document;
use crate::error::Error;
use crate::geom::{self, LengthAxis, LengthCtx};
use crate::xmlext::SvgNodeExt;

/// The context variant created for a renderable element.
#[derive(Clone, Copy, PartialEq, Debug)]
enum ContextKind {
    Svg,
    Group,
    Switch,
    Use,
    Shape,
}

fn context_kind(node: roxmltree::Node) -> Option<ContextKind> {
    let tag = node.tag_name();
    if !matches!(tag.namespace(), None | Some(crate::xmlext::SVG_NS)) {
        return None;
    }

    match tag.name() {
        "svg" => Some(ContextKind::Svg),
        "g" | "a" => Some(ContextKind::Group),
        "switch" => Some(ContextKind::Switch),
        "use" => Some(ContextKind::Use),
        "path" | "rect" | "line" | "circle" | "ellipse" | "polyline" | "polygon" => {
            Some(ContextKind::Shape)
        }
        _ => None,
    }
}

/// Renders a parsed SVG document into the image buffer.
///
/// The buffer is sized from the root viewport: one pixel is added on
/// each axis and the origin is shifted by half a pixel, so integer
/// coordinates sample pixel centers and edge anti-aliasing survives.
///
/// Rendering happens in a staging pixmap that is installed into the
/// caller's buffer only on success; a fatal error mid-render commits
/// no pixels at all.
pub fn render_document(
    xml: &roxmltree::Document,
    image: &mut ImageBuffer,
) -> Result<(), Error> {
    let root = xml.root_element();
    if !root.is_svg_element("svg") {
        return Err(Error::NotAnSvg);
    }

    let doc = Document::new(xml);
    let mut canvas = Canvas::root()?;
    apply_common_attributes(&mut canvas, root);

    let view_box = root.parse_attr::<ViewBox>("viewBox");
    let w = root_viewport_len(
        root,
        "width",
        view_box.map(|vb| vb.w as f32),
        LengthAxis::Horizontal,
    );
    let h = root_viewport_len(
        root,
        "height",
        view_box.map(|vb| vb.h as f32),
        LengthAxis::Vertical,
    );
    if w <= 0.0 || h <= 0.0 {
        return Err(Error::InvalidSize);
    }

    let width = (w + 1.0).ceil() as u32;
    let height = (h + 1.0).ceil() as u32;
    let mut pixmap = tiny_skia::Pixmap::new(width.max(1), height.max(1))
        .ok_or(Error::LayerAllocationFailed)?;
    pixmap.fill(tiny_skia::Color::TRANSPARENT);

    doc.set_canvas_size(pixmap.width(), pixmap.height());
    canvas.clip = Rc::new(ClipBuffer::new(pixmap.width(), pixmap.height())?);

    match view_box {
        Some(vb) if vb.w > 0.0 && vb.h > 0.0 => {
            let aspect = root
                .parse_attr::<AspectRatio>("preserveAspectRatio")
                .unwrap_or_default();
            canvas.transform = canvas
                .transform
                .pre_concat(geom::view_box_to_transform(vb, aspect, w, h));
            canvas.lengths.set_viewport(vb.w as f32, vb.h as f32);
        }
        // A zero-sized viewBox disables rendering of the element.
        Some(_) => {
            image.install(pixmap);
            return Ok(());
        }
        None => canvas.lengths.set_viewport(w, h),
    }

    {
        let mut layer = Layer::new(&mut pixmap, canvas.needs_layer(), doc.canvas_size());
        if canvas.style.display {
            render_children(root, &canvas, &mut layer, &doc)?;
        }
        layer.finish(&mut canvas, &doc)?;
    }

    image.install(pixmap);
    Ok(())
}

/// The outermost viewport has no parent to resolve percentages against;
/// they fall back to the viewBox size, then to the 100x100 default.
fn root_viewport_len(
    node: roxmltree::Node,
    name: &str,
    vb_size: Option<f32>,
    axis: LengthAxis,
) -> f32 {
    match node.parse_attr::<Length>(name) {
        None => vb_size.unwrap_or(100.0),
        Some(len) if len.unit == LengthUnit::Percent => {
            vb_size.unwrap_or(100.0) * len.number as f32 / 100.0
        }
        Some(len) => LengthCtx::default().resolve(len, axis),
    }
}

/// Renders the element children of `parent` in document order.
pub(crate) fn render_children(
    parent: roxmltree::Node,
    canvas: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    for child in parent.children().filter(|n| n.is_element()) {
        render_element(child, canvas, out, doc)?;
    }
    Ok(())
}

fn render_element(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    match context_kind(node) {
        Some(ContextKind::Svg) => render_svg(node, parent, out, doc, None),
        Some(ContextKind::Group) => render_group(node, parent, out, doc),
        Some(ContextKind::Switch) => render_switch(node, parent, out, doc),
        Some(ContextKind::Use) => render_use(node, parent, out, doc),
        Some(ContextKind::Shape) => render_shape(node, parent, out, doc),
        // Reference-only and unknown elements do not render in
        // document order.
        None => Ok(()),
    }
}

fn render_group(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let mut canvas = parent.child();
    apply_common_attributes(&mut canvas, node);

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    if canvas.style.display {
        render_children(node, &canvas, &mut layer, doc)?;
    }
    layer.finish(&mut canvas, doc)
}

/// A nested viewport: `svg` in document order, or `svg`/`symbol`
/// referenced through `use` (which may override the viewport size).
fn render_svg(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
    size_override: Option<(Option<f32>, Option<f32>)>,
) -> Result<(), Error> {
    let mut canvas = parent.child();
    apply_common_attributes(&mut canvas, node);

    let x = node
        .length_attr("x", &canvas.lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let y = node
        .length_attr("y", &canvas.lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);

    // Width and height default to 100% of the parent viewport.
    let mut w = node
        .length_attr("width", &canvas.lengths, LengthAxis::Horizontal)
        .unwrap_or(canvas.lengths.viewport().0);
    let mut h = node
        .length_attr("height", &canvas.lengths, LengthAxis::Vertical)
        .unwrap_or(canvas.lengths.viewport().1);
    if let Some((ow, oh)) = size_override {
        if let Some(ow) = ow {
            w = ow;
        }
        if let Some(oh) = oh {
            h = oh;
        }
    }
    if w <= 0.0 || h <= 0.0 {
        return Ok(());
    }

    canvas.transform = canvas.transform.pre_translate(x, y);
    if canvas.style.overflow_clip {
        Rc::make_mut(&mut canvas.clip).intersect_rect(canvas.transform, 0.0, 0.0, w, h)?;
    }

    match node.parse_attr::<ViewBox>("viewBox") {
        Some(vb) if vb.w > 0.0 && vb.h > 0.0 => {
            let aspect = node
                .parse_attr::<AspectRatio>("preserveAspectRatio")
                .unwrap_or_default();
            canvas.transform = canvas
                .transform
                .pre_concat(geom::view_box_to_transform(vb, aspect, w, h));
            canvas.lengths.set_viewport(vb.w as f32, vb.h as f32);
        }
        Some(_) => return Ok(()),
        None => canvas.lengths.set_viewport(w, h),
    }

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    if canvas.style.display {
        render_children(node, &canvas, &mut layer, doc)?;
    }
    layer.finish(&mut canvas, doc)
}

/// `switch` renders only its first viable child.
fn render_switch(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let mut canvas = parent.child();
    apply_common_attributes(&mut canvas, node);

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    if canvas.style.display {
        let viable = node
            .children()
            .find(|n| n.is_element() && context_kind(*n).is_some() && switch_viable(*n));
        if let Some(child) = viable {
            render_element(child, &canvas, &mut layer, doc)?;
        }
    }
    layer.finish(&mut canvas, doc)
}

fn switch_viable(node: roxmltree::Node) -> bool {
    if node
        .attribute("requiredExtensions")
        .map_or(false, |v| !v.trim().is_empty())
    {
        return false;
    }

    if let Some(langs) = node.attribute("systemLanguage") {
        return langs.split(',').any(|lang| lang.trim().starts_with("en"));
    }

    true
}

fn render_shape(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let mut canvas = parent.child();
    apply_common_attributes(&mut canvas, node);

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    crate::path::draw(node, &canvas, &mut layer, doc)?;
    layer.finish(&mut canvas, doc)
}

/// `use` locates the referenced reusable subtree, guards against
/// cycles, shifts by `x`/`y` and re-drives the traversal over it.
fn render_use(
    node: roxmltree::Node,
    parent: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let mut canvas = parent.child();
    apply_common_attributes(&mut canvas, node);
    if !canvas.style.display {
        return Ok(());
    }

    let x = node
        .length_attr("x", &canvas.lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let y = node
        .length_attr("y", &canvas.lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);
    let w = node
        .length_attr("width", &canvas.lengths, LengthAxis::Horizontal)
        .filter(|n| *n > 0.0);
    let h = node
        .length_attr("height", &canvas.lengths, LengthAxis::Vertical)
        .filter(|n| *n > 0.0);

    let href = match node.href() {
        Some(v) => v,
        None => {
            log::warn!("Element referenced by 'use' not found.");
            return Ok(());
        }
    };
    let fragment = match href.strip_prefix('#') {
        Some(v) => v,
        None => {
            log::warn!("External references aren't supported.");
            return Ok(());
        }
    };
    let element = match doc.element_by_id(fragment) {
        Some(v) => v,
        None => {
            log::warn!("Element referenced by 'use' not found.");
            return Ok(());
        }
    };

    let _guard = doc.follow(element)?;
    canvas.transform = canvas.transform.pre_translate(x, y);

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    if element.is_svg_element("svg") || element.is_svg_element("symbol") {
        render_svg(element, &canvas, &mut layer, doc, Some((w, h)))?;
    } else if context_kind(element).is_some() {
        render_element(element, &canvas, &mut layer, doc)?;
    } else {
        log::warn!(
            "'use' can't reference a '{}' element.",
            element.tag_name().name()
        );
    }
    layer.finish(&mut canvas, doc)
}

/// Applies the `transform` attribute and every presentation attribute
/// of an element to its canvas.
pub(crate) fn apply_common_attributes(canvas: &mut Canvas, node: roxmltree::Node) {
    if let Some(ts) = node.transform_attr() {
        canvas.transform = canvas.transform.pre_concat(ts);
    }

    for attr in node.attributes() {
        if attr.namespace().is_none() {
            canvas.style.apply(attr.name(), attr.value(), &canvas.lengths);
        }
    }
}
