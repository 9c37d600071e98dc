// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::str::FromStr;

use svgtypes::{Color, Length, LengthUnit};
use tiny_skia::{GradientStop, Shader, SpreadMode, Transform};

use crate::document::Document;
use crate::error::Error;
use crate::geom::{self, LengthAxis, LengthCtx};
use crate::style::{Paint, Style};
use crate::xmlext::SvgNodeExt;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SpreadMethod {
    Pad,
    Reflect,
    Repeat,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Stop {
    pub offset: f32,
    pub color: Color,
    pub opacity: f32,
}

#[derive(Clone, Debug)]
pub struct BaseGradient {
    pub object_bbox_units: bool,
    pub transform: Option<Transform>,
    pub spread: SpreadMethod,
    pub stops: Vec<Stop>,
}

#[derive(Clone, Debug)]
pub struct LinearGradient {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub base: BaseGradient,
}

#[derive(Clone, Debug)]
pub struct RadialGradient {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    pub fx: f32,
    pub fy: f32,
    pub base: BaseGradient,
}

#[derive(Clone, Debug)]
pub enum Gradient {
    Linear(LinearGradient),
    Radial(RadialGradient),
}

impl Gradient {
    pub fn base(&self) -> &BaseGradient {
        match self {
            Gradient::Linear(ref g) => &g.base,
            Gradient::Radial(ref g) => &g.base,
        }
    }
}

/// A paint after IRI resolution.
pub enum EffectivePaint {
    None,
    Color(Color),
    Gradient(Gradient),
}

/// Resolves a `<paint>` value against the gradient registry.
///
/// An IRI that does not resolve falls back to its fallback paint, or
/// fails the render when there is none.
pub fn resolve(
    paint: &Paint,
    style: &Style,
    doc: &Document,
    lengths: &LengthCtx,
) -> Result<EffectivePaint, Error> {
    let solid = match paint {
        Paint::None => return Ok(EffectivePaint::None),
        Paint::CurrentColor => return Ok(EffectivePaint::Color(style.color)),
        Paint::Color(c) => return Ok(EffectivePaint::Color(*c)),
        Paint::Iri { fragment, fallback } => {
            if let Some(gradient) = doc.gradient(fragment, lengths) {
                return Ok(simplify_gradient(gradient));
            }

            match fallback {
                Some(fallback) => fallback.as_ref().clone(),
                None => return Err(Error::MissingPaintServer(fragment.clone())),
            }
        }
    };

    match solid {
        Paint::None => Ok(EffectivePaint::None),
        Paint::CurrentColor => Ok(EffectivePaint::Color(style.color)),
        Paint::Color(c) => Ok(EffectivePaint::Color(c)),
        // A fallback is always a solid paint.
        Paint::Iri { .. } => Ok(EffectivePaint::None),
    }
}

/// Degenerate gradients collapse into simpler paints.
fn simplify_gradient(gradient: Gradient) -> EffectivePaint {
    {
        let base = gradient.base();
        if base.stops.is_empty() {
            return EffectivePaint::None;
        }
        if base.stops.len() == 1 {
            return EffectivePaint::Color(base.stops[0].color);
        }
    }

    if let Gradient::Linear(ref g) = gradient {
        if g.x1 == g.x2 && g.y1 == g.y2 {
            // A zero-length gradient vector paints the last stop color.
            let last = g.base.stops.last().unwrap();
            return EffectivePaint::Color(last.color);
        }
    }

    EffectivePaint::Gradient(gradient)
}

/// Builds the backend shader for a gradient paint.
///
/// `opacity` is folded into every stop; `bbox` is the untransformed
/// bounding rectangle of the painted path, required for
/// `objectBoundingBox` units. Returns `None` when the paint degenerates
/// (zero-area bounding box) and nothing should be drawn.
pub fn to_shader(
    gradient: &Gradient,
    opacity: f32,
    bbox: Option<tiny_skia::Rect>,
) -> Option<Shader<'static>> {
    let base = gradient.base();

    let mut ts = if base.object_bbox_units {
        let bbox = bbox?;
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            log::warn!("Gradient on zero-sized shapes is not allowed.");
            return None;
        }
        Transform::from_row(bbox.width(), 0.0, 0.0, bbox.height(), bbox.x(), bbox.y())
    } else {
        Transform::identity()
    };

    if let Some(gradient_ts) = base.transform {
        ts = ts.pre_concat(gradient_ts);
    }

    let mode = match base.spread {
        SpreadMethod::Pad => SpreadMode::Pad,
        SpreadMethod::Reflect => SpreadMode::Reflect,
        SpreadMethod::Repeat => SpreadMode::Repeat,
    };

    let mut stops = Vec::with_capacity(base.stops.len());
    for stop in &base.stops {
        let alpha = (stop.opacity * opacity).clamp(0.0, 1.0);
        let color = tiny_skia::Color::from_rgba8(
            stop.color.red,
            stop.color.green,
            stop.color.blue,
            (alpha * 255.0 + 0.5) as u8,
        );
        stops.push(GradientStop::new(stop.offset, color));
    }

    match gradient {
        Gradient::Linear(ref g) => tiny_skia::LinearGradient::new(
            (g.x1, g.y1).into(),
            (g.x2, g.y2).into(),
            stops,
            mode,
            ts,
        ),
        Gradient::Radial(ref g) => tiny_skia::RadialGradient::new(
            (g.fx, g.fy).into(),
            (g.cx, g.cy).into(),
            g.r,
            stops,
            mode,
            ts,
        ),
    }
}

/// Captures a gradient definition by re-traversing the referenced
/// element, following `href` chains for attributes and stops.
pub(crate) fn parse_gradient(
    doc: &Document,
    node: roxmltree::Node,
    lengths: &LengthCtx,
) -> Option<Gradient> {
    let linear = if node.is_svg_element("linearGradient") {
        true
    } else if node.is_svg_element("radialGradient") {
        false
    } else {
        log::warn!("Paint servers other than gradients are not supported.");
        return None;
    };

    let object_bbox_units =
        find_attr(doc, node, "gradientUnits").map_or(true, |v| v != "userSpaceOnUse");

    let transform = find_attr(doc, node, "gradientTransform")
        .and_then(|v| svgtypes::Transform::from_str(v).ok())
        .map(geom::conv_transform);

    let spread = match find_attr(doc, node, "spreadMethod") {
        Some("reflect") => SpreadMethod::Reflect,
        Some("repeat") => SpreadMethod::Repeat,
        _ => SpreadMethod::Pad,
    };

    let stops = collect_stops(doc, node);

    let base = BaseGradient {
        object_bbox_units,
        transform,
        spread,
        stops,
    };

    let coord = |name: &str, def: &str, axis: LengthAxis| {
        resolve_coord(
            find_attr(doc, node, name).unwrap_or(def),
            object_bbox_units,
            lengths,
            axis,
        )
    };

    if linear {
        Some(Gradient::Linear(LinearGradient {
            x1: coord("x1", "0%", LengthAxis::Horizontal),
            y1: coord("y1", "0%", LengthAxis::Vertical),
            x2: coord("x2", "100%", LengthAxis::Horizontal),
            y2: coord("y2", "0%", LengthAxis::Vertical),
            base,
        }))
    } else {
        let cx = coord("cx", "50%", LengthAxis::Horizontal);
        let cy = coord("cy", "50%", LengthAxis::Vertical);
        let r = coord("r", "50%", LengthAxis::Diagonal);
        if r <= 0.0 {
            // A zero radius paints the last stop only; reuse the
            // degenerate-linear collapse by emitting a point gradient.
            let stops = base.stops.last().copied().into_iter().collect();
            return Some(Gradient::Linear(LinearGradient {
                x1: 0.0,
                y1: 0.0,
                x2: 0.0,
                y2: 0.0,
                base: BaseGradient { stops, ..base },
            }));
        }

        let fx = find_attr(doc, node, "fx")
            .map(|v| resolve_coord(v, object_bbox_units, lengths, LengthAxis::Horizontal))
            .unwrap_or(cx);
        let fy = find_attr(doc, node, "fy")
            .map(|v| resolve_coord(v, object_bbox_units, lengths, LengthAxis::Vertical))
            .unwrap_or(cy);

        Some(Gradient::Radial(RadialGradient {
            cx,
            cy,
            r,
            fx,
            fy,
            base,
        }))
    }
}

/// In `objectBoundingBox` units percentages are fractions of the unit
/// square; in user space they resolve against the viewport.
fn resolve_coord(value: &str, object_bbox_units: bool, lengths: &LengthCtx, axis: LengthAxis) -> f32 {
    let len = match Length::from_str(value) {
        Ok(v) => v,
        Err(_) => {
            log::warn!("Failed to parse a gradient coordinate: '{}'.", value);
            return 0.0;
        }
    };

    if object_bbox_units {
        match len.unit {
            LengthUnit::Percent => len.number as f32 / 100.0,
            _ => len.number as f32,
        }
    } else {
        lengths.resolve(len, axis)
    }
}

/// Looks an attribute up on the gradient itself, then along its `href`
/// chain. The chain is cycle-guarded locally.
fn find_attr<'a, 'input>(
    doc: &Document<'a, 'input>,
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<&'a str> {
    let mut visited = HashSet::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if !visited.insert(n.id()) {
            log::warn!("A cyclic gradient 'href' chain detected.");
            return None;
        }

        if let Some(value) = n.attribute(name) {
            return Some(value);
        }

        current = linked_gradient(doc, n);
    }

    None
}

fn linked_gradient<'a, 'input>(
    doc: &Document<'a, 'input>,
    node: roxmltree::Node<'a, 'input>,
) -> Option<roxmltree::Node<'a, 'input>> {
    let fragment = node.href()?.strip_prefix('#')?;
    let linked = doc.element_by_id(fragment)?;
    if linked.is_svg_element("linearGradient") || linked.is_svg_element("radialGradient") {
        Some(linked)
    } else {
        None
    }
}

/// Stops come from the first element along the `href` chain that has
/// any; offsets are clamped into `[0, 1]` and made monotonic.
fn collect_stops(doc: &Document, node: roxmltree::Node) -> Vec<Stop> {
    let mut visited = HashSet::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if !visited.insert(n.id()) {
            return Vec::new();
        }

        let stops = parse_stops(n);
        if !stops.is_empty() {
            return stops;
        }

        current = linked_gradient(doc, n);
    }

    Vec::new()
}

fn parse_stops(node: roxmltree::Node) -> Vec<Stop> {
    let mut stops: Vec<Stop> = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        if !child.is_svg_element("stop") {
            continue;
        }

        let offset = match child.parse_attr::<Length>("offset") {
            Some(len) => match len.unit {
                LengthUnit::Percent => len.number as f32 / 100.0,
                _ => len.number as f32,
            },
            None => 0.0,
        };
        let prev = stops.last().map_or(0.0, |s: &Stop| s.offset);
        let offset = offset.clamp(0.0, 1.0).max(prev);

        let mut color = match child.attribute("stop-color") {
            Some("currentColor") => {
                // `currentColor` on stops would need the referencing
                // element's color; fall back to the initial value.
                Color::black()
            }
            Some(value) => Color::from_str(value).unwrap_or_else(|_| {
                log::warn!("Failed to parse stop-color value: '{}'.", value);
                Color::black()
            }),
            None => Color::black(),
        };

        let stop_opacity = child
            .attribute("stop-opacity")
            .and_then(|v| v.parse::<f32>().ok())
            .map_or(1.0, |n| n.clamp(0.0, 1.0));

        let opacity = stop_opacity * color.alpha as f32 / 255.0;
        color.alpha = 255;

        stops.push(Stop {
            offset,
            color,
            opacity,
        });
    }

    stops
}
