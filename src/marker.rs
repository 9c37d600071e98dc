// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;
use std::str::FromStr;

use svgtypes::{AspectRatio, ViewBox};
use tiny_skia::Transform;

use crate::canvas::{Canvas, Layer, Target};
use crate::document::Document;
use crate::error::Error;
use crate::geom::{self, LengthAxis, LengthCtx};
use crate::path::MarkerPos;
use crate::xmlext::SvgNodeExt;

/// Which path vertex a marker decorates.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MarkerVertex {
    Start,
    Mid,
    End,
}

/// Draws one marker instance at a recorded path vertex.
///
/// The marker context does not inherit the path's style. `markerUnits`
/// and `orient` are consumed before anything else so the transform and
/// length context are final when the viewport attributes arrive.
pub(crate) fn draw(
    doc: &Document,
    path_canvas: &Canvas,
    stroke_width: f32,
    fragment: &str,
    pos: &MarkerPos,
    out: &mut dyn Target,
) -> Result<(), Error> {
    let element = match doc.element_by_id(fragment) {
        Some(v) => v,
        None => {
            log::warn!("Element referenced by a marker property not found: '#{}'.", fragment);
            return Ok(());
        }
    };

    if !element.is_svg_element("marker") {
        log::warn!("A marker property must reference a 'marker' element.");
        return Ok(());
    }

    let _guard = doc.follow(element)?;

    let mut canvas = path_canvas.child_unstyled();
    canvas.transform = canvas.transform.pre_translate(pos.x, pos.y);

    // Priority attributes.
    let stroke_width_units =
        element.attribute("markerUnits").map_or(true, |v| v != "userSpaceOnUse");
    let orient_deg = match element.attribute("orient") {
        Some("auto") | Some("auto-start-reverse") => pos.direction.to_degrees(),
        Some(value) => svgtypes::Angle::from_str(value)
            .map(|a| a.to_degrees() as f32)
            .unwrap_or(0.0),
        None => 0.0,
    };

    if stroke_width_units {
        canvas.lengths = LengthCtx::default();
        canvas.transform = canvas.transform.pre_scale(stroke_width, stroke_width);
    }
    canvas.transform = canvas.transform.pre_concat(Transform::from_rotate(orient_deg));

    for attr in element.attributes() {
        if attr.namespace().is_none() {
            canvas.style.apply(attr.name(), attr.value(), &canvas.lengths);
        }
    }

    // The marker viewport.
    let mw = element
        .length_attr("markerWidth", &canvas.lengths, LengthAxis::Horizontal)
        .unwrap_or(3.0);
    let mh = element
        .length_attr("markerHeight", &canvas.lengths, LengthAxis::Vertical)
        .unwrap_or(3.0);
    if mw <= 0.0 || mh <= 0.0 {
        return Ok(());
    }

    let ref_x = element
        .length_attr("refX", &canvas.lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let ref_y = element
        .length_attr("refY", &canvas.lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);

    match element.parse_attr::<ViewBox>("viewBox") {
        Some(vb) => {
            let aspect = element
                .parse_attr::<AspectRatio>("preserveAspectRatio")
                .unwrap_or_default();
            let vb_ts = geom::view_box_to_transform(vb, aspect, mw, mh);
            let (rx, ry) = geom::map_point(vb_ts, ref_x, ref_y);
            canvas.transform = canvas.transform.pre_translate(-rx, -ry);
            if canvas.style.overflow_clip {
                Rc::make_mut(&mut canvas.clip).intersect_rect(
                    canvas.transform,
                    0.0,
                    0.0,
                    mw,
                    mh,
                )?;
            }
            canvas.transform = canvas.transform.pre_concat(vb_ts);
            canvas.lengths.set_viewport(vb.w as f32, vb.h as f32);
        }
        None => {
            canvas.transform = canvas.transform.pre_translate(-ref_x, -ref_y);
            if canvas.style.overflow_clip {
                Rc::make_mut(&mut canvas.clip).intersect_rect(
                    canvas.transform,
                    0.0,
                    0.0,
                    mw,
                    mh,
                )?;
            }
            canvas.lengths.set_viewport(mw, mh);
        }
    }

    let mut layer = Layer::new(out, canvas.needs_layer(), doc.canvas_size());
    if canvas.style.display {
        crate::traverse::render_children(element, &canvas, &mut layer, doc)?;
    }
    layer.finish(&mut canvas, doc)
}
