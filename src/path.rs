// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use svgtypes::{PointsParser, SimplePathSegment, SimplifyingPathParser};
use tiny_skia::{FillRule, PathBuilder, Stroke, StrokeDash};

use crate::canvas::{Canvas, Target};
use crate::document::Document;
use crate::error::Error;
use crate::geom::{LengthAxis, LengthCtx};
use crate::marker::MarkerVertex;
use crate::paint_server::{self, EffectivePaint};
use crate::style::Style;
use crate::xmlext::SvgNodeExt;

/// A recorded marker position: vertex kind, anchor and tangent
/// direction in radians, in path vertex order.
#[derive(Clone, Copy, Debug)]
pub struct MarkerPos {
    pub vertex: MarkerVertex,
    pub x: f32,
    pub y: f32,
    pub direction: f32,
}

#[derive(Clone, Copy, Debug)]
struct Vertex {
    x: f32,
    y: f32,
    dir_in: Option<f32>,
    dir_out: Option<f32>,
}

/// Accumulates absolute path segments into backend geometry while
/// tracking per-vertex tangents for marker placement.
///
/// Shorthand segments arrive pre-expanded and arcs as cubic Beziers,
/// so only five event kinds exist.
pub(crate) struct PathSink {
    builder: PathBuilder,
    verts: Vec<Vertex>,
    subpath_start: usize,
    last: (f32, f32),
}

impl PathSink {
    pub fn new() -> Self {
        PathSink {
            builder: PathBuilder::new(),
            verts: Vec::new(),
            subpath_start: 0,
            last: (0.0, 0.0),
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
        self.subpath_start = self.verts.len();
        self.push_vertex(x, y, None);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
        let dir = direction(self.last, (x, y));
        self.leave_along(dir);
        self.push_vertex(x, y, dir);
    }

    pub fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
        let out = direction(self.last, (x1, y1)).or_else(|| direction(self.last, (x, y)));
        let inn = direction((x1, y1), (x, y)).or_else(|| direction(self.last, (x, y)));
        self.leave_along(out);
        self.push_vertex(x, y, inn);
    }

    pub fn cubic_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
        let out = direction(self.last, (x1, y1))
            .or_else(|| direction(self.last, (x2, y2)))
            .or_else(|| direction(self.last, (x, y)));
        let inn = direction((x2, y2), (x, y))
            .or_else(|| direction((x1, y1), (x, y)))
            .or_else(|| direction(self.last, (x, y)));
        self.leave_along(out);
        self.push_vertex(x, y, inn);
    }

    pub fn close(&mut self) {
        self.builder.close();
        if let Some(start) = self.verts.get(self.subpath_start).copied() {
            let dir = direction(self.last, (start.x, start.y));
            self.leave_along(dir);
            // The closing edge arrives back at the subpath start.
            if let Some(v) = self.verts.get_mut(self.subpath_start) {
                v.dir_in = dir.or(v.dir_in);
            }
            self.last = (start.x, start.y);
        }
    }

    /// An elliptical arc re-expressed as cubic Beziers
    /// (used by shape synthesis; path data arcs are pre-expanded).
    pub fn arc_to(&mut self, rx: f32, ry: f32, sweep: bool, x: f32, y: f32) {
        let svg_arc = kurbo::SvgArc {
            from: kurbo::Point::new(self.last.0 as f64, self.last.1 as f64),
            to: kurbo::Point::new(x as f64, y as f64),
            radii: kurbo::Vec2::new(rx as f64, ry as f64),
            x_rotation: 0.0,
            large_arc: false,
            sweep,
        };

        match kurbo::Arc::from_svg_arc(&svg_arc) {
            Some(arc) => {
                arc.to_cubic_beziers(0.1, |p1, p2, p| {
                    self.cubic_to(
                        p1.x as f32,
                        p1.y as f32,
                        p2.x as f32,
                        p2.y as f32,
                        p.x as f32,
                        p.y as f32,
                    );
                });
            }
            None => {
                self.line_to(x, y);
            }
        }
    }

    fn push_vertex(&mut self, x: f32, y: f32, dir_in: Option<f32>) {
        self.verts.push(Vertex {
            x,
            y,
            dir_in,
            dir_out: None,
        });
        self.last = (x, y);
    }

    fn leave_along(&mut self, dir: Option<f32>) {
        if let Some(v) = self.verts.last_mut() {
            if v.dir_out.is_none() {
                v.dir_out = dir;
            }
        }
    }

    pub fn finish(self) -> (Option<tiny_skia::Path>, Vec<MarkerPos>) {
        let count = self.verts.len();
        let markers = self
            .verts
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let vertex = if i == 0 {
                    MarkerVertex::Start
                } else if i + 1 == count {
                    MarkerVertex::End
                } else {
                    MarkerVertex::Mid
                };

                let direction = match (v.dir_in, v.dir_out) {
                    (Some(a), Some(b)) => bisect(a, b),
                    (Some(a), None) => a,
                    (None, Some(b)) => b,
                    (None, None) => 0.0,
                };

                MarkerPos {
                    vertex,
                    x: v.x,
                    y: v.y,
                    direction,
                }
            })
            .collect();

        (self.builder.finish(), markers)
    }
}

fn direction(from: (f32, f32), to: (f32, f32)) -> Option<f32> {
    if from == to {
        None
    } else {
        Some((to.1 - from.1).atan2(to.0 - from.0))
    }
}

fn bisect(a: f32, b: f32) -> f32 {
    (a.sin() + b.sin()).atan2(a.cos() + b.cos())
}

/// Whether markers apply to this element kind.
fn has_marker_vertices(tag: &str) -> bool {
    matches!(tag, "path" | "line" | "polyline" | "polygon")
}

/// Converts a shape element into path geometry. Invalid geometry
/// (negative sizes, too few points) yields nothing, with a warning.
pub(crate) fn shape_to_sink(node: roxmltree::Node, lengths: &LengthCtx) -> Option<PathSink> {
    let tag = node.tag_name().name();
    match tag {
        "path" => convert_path(node),
        "rect" => convert_rect(node, lengths),
        "circle" => convert_circle(node, lengths),
        "ellipse" => convert_ellipse(node, lengths),
        "line" => convert_line(node, lengths),
        "polyline" => convert_poly(node, false),
        "polygon" => convert_poly(node, true),
        _ => None,
    }
}

/// The silhouette of a shape, for clip-path evaluation.
pub(crate) fn shape_to_path(node: roxmltree::Node, lengths: &LengthCtx) -> Option<tiny_skia::Path> {
    shape_to_sink(node, lengths).and_then(|sink| sink.finish().0)
}

fn convert_path(node: roxmltree::Node) -> Option<PathSink> {
    let data = node.attribute("d")?;
    let mut sink = PathSink::new();
    for segment in SimplifyingPathParser::from(data) {
        let segment = match segment {
            Ok(v) => v,
            Err(_) => break,
        };

        match segment {
            SimplePathSegment::MoveTo { x, y } => sink.move_to(x as f32, y as f32),
            SimplePathSegment::LineTo { x, y } => sink.line_to(x as f32, y as f32),
            SimplePathSegment::Quadratic { x1, y1, x, y } => {
                sink.quad_to(x1 as f32, y1 as f32, x as f32, y as f32)
            }
            SimplePathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => sink.cubic_to(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
            ),
            SimplePathSegment::ClosePath => sink.close(),
        }
    }

    Some(sink)
}

fn convert_rect(node: roxmltree::Node, lengths: &LengthCtx) -> Option<PathSink> {
    let width = node
        .length_attr("width", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let height = node
        .length_attr("height", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);
    if width <= 0.0 || height <= 0.0 {
        log::warn!("Rect has an invalid size. Skipped.");
        return None;
    }

    let x = node
        .length_attr("x", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let y = node
        .length_attr("y", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);

    let (mut rx, mut ry) = resolve_rx_ry(node, lengths);
    rx = rx.min(width / 2.0);
    ry = ry.min(height / 2.0);

    let mut sink = PathSink::new();
    if rx <= 0.0 {
        sink.move_to(x, y);
        sink.line_to(x + width, y);
        sink.line_to(x + width, y + height);
        sink.line_to(x, y + height);
        sink.close();
    } else {
        sink.move_to(x + rx, y);
        sink.line_to(x + width - rx, y);
        sink.arc_to(rx, ry, true, x + width, y + ry);
        sink.line_to(x + width, y + height - ry);
        sink.arc_to(rx, ry, true, x + width - rx, y + height);
        sink.line_to(x + rx, y + height);
        sink.arc_to(rx, ry, true, x, y + height - ry);
        sink.line_to(x, y + ry);
        sink.arc_to(rx, ry, true, x + rx, y);
        sink.close();
    }

    Some(sink)
}

fn resolve_rx_ry(node: roxmltree::Node, lengths: &LengthCtx) -> (f32, f32) {
    let rx = node
        .length_attr("rx", lengths, LengthAxis::Horizontal)
        .filter(|n| *n >= 0.0);
    let ry = node
        .length_attr("ry", lengths, LengthAxis::Vertical)
        .filter(|n| *n >= 0.0);

    match (rx, ry) {
        (None, None) => (0.0, 0.0),
        (Some(rx), None) => (rx, rx),
        (None, Some(ry)) => (ry, ry),
        (Some(rx), Some(ry)) => (rx, ry),
    }
}

fn convert_circle(node: roxmltree::Node, lengths: &LengthCtx) -> Option<PathSink> {
    let cx = node
        .length_attr("cx", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let cy = node
        .length_attr("cy", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);
    let r = node
        .length_attr("r", lengths, LengthAxis::Diagonal)
        .unwrap_or(0.0);

    if r <= 0.0 {
        log::warn!("Circle has an invalid radius. Skipped.");
        return None;
    }

    Some(ellipse_sink(cx, cy, r, r))
}

fn convert_ellipse(node: roxmltree::Node, lengths: &LengthCtx) -> Option<PathSink> {
    let cx = node
        .length_attr("cx", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let cy = node
        .length_attr("cy", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);
    let (rx, ry) = resolve_rx_ry(node, lengths);

    if rx <= 0.0 || ry <= 0.0 {
        log::warn!("Ellipse has an invalid radius. Skipped.");
        return None;
    }

    Some(ellipse_sink(cx, cy, rx, ry))
}

fn ellipse_sink(cx: f32, cy: f32, rx: f32, ry: f32) -> PathSink {
    let mut sink = PathSink::new();
    sink.move_to(cx + rx, cy);
    sink.arc_to(rx, ry, true, cx, cy + ry);
    sink.arc_to(rx, ry, true, cx - rx, cy);
    sink.arc_to(rx, ry, true, cx, cy - ry);
    sink.arc_to(rx, ry, true, cx + rx, cy);
    sink.close();
    sink
}

fn convert_line(node: roxmltree::Node, lengths: &LengthCtx) -> Option<PathSink> {
    let x1 = node
        .length_attr("x1", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let y1 = node
        .length_attr("y1", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);
    let x2 = node
        .length_attr("x2", lengths, LengthAxis::Horizontal)
        .unwrap_or(0.0);
    let y2 = node
        .length_attr("y2", lengths, LengthAxis::Vertical)
        .unwrap_or(0.0);

    let mut sink = PathSink::new();
    sink.move_to(x1, y1);
    sink.line_to(x2, y2);
    Some(sink)
}

fn convert_poly(node: roxmltree::Node, close: bool) -> Option<PathSink> {
    let points = node.attribute("points")?;
    let mut sink = PathSink::new();
    let mut count = 0;
    for (x, y) in PointsParser::from(points) {
        if count == 0 {
            sink.move_to(x as f32, y as f32);
        } else {
            sink.line_to(x as f32, y as f32);
        }
        count += 1;
    }

    // At least two points are required.
    if count < 2 {
        log::warn!("A polyline/polygon has less than 2 points. Skipped.");
        return None;
    }

    if close {
        sink.close();
    }

    Some(sink)
}

/// Draws a shape element: fill, then stroke, then markers.
pub(crate) fn draw(
    node: roxmltree::Node,
    canvas: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    if !canvas.style.display {
        return Ok(());
    }

    let sink = match shape_to_sink(node, &canvas.lengths) {
        Some(v) => v,
        None => return Ok(()),
    };
    let (path, markers) = sink.finish();
    let path = match path {
        Some(v) => v,
        None => return Ok(()),
    };

    fill(&path, canvas, out, doc)?;
    stroke(&path, canvas, out, doc)?;

    if canvas.style.has_markers() && has_marker_vertices(node.tag_name().name()) {
        for pos in &markers {
            if let Some(fragment) = canvas.style.marker_ref(pos.vertex) {
                crate::marker::draw(doc, canvas, canvas.style.stroke_width, fragment, pos, out)?;
            }
        }
    }

    Ok(())
}

fn fill(
    path: &tiny_skia::Path,
    canvas: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let effective = paint_server::resolve(
        &canvas.style.fill_paint,
        &canvas.style,
        doc,
        &canvas.lengths,
    )?;

    let paint = match make_paint(effective, canvas.style.fill_opacity, path) {
        Some(v) => v,
        None => return Ok(()),
    };

    let rule = if canvas.style.nonzero_fill_rule {
        FillRule::Winding
    } else {
        FillRule::EvenOdd
    };

    out.buffer()?
        .as_mut()
        .fill_path(path, &paint, rule, canvas.transform, None);
    Ok(())
}

fn stroke(
    path: &tiny_skia::Path,
    canvas: &Canvas,
    out: &mut dyn Target,
    doc: &Document,
) -> Result<(), Error> {
    let effective = paint_server::resolve(
        &canvas.style.stroke_paint,
        &canvas.style,
        doc,
        &canvas.lengths,
    )?;

    let paint = match make_paint(effective, canvas.style.stroke_opacity, path) {
        Some(v) => v,
        None => return Ok(()),
    };

    let stroke = Stroke {
        width: canvas.style.stroke_width,
        miter_limit: canvas.style.miterlimit,
        line_cap: canvas.style.line_cap,
        line_join: canvas.style.line_join,
        dash: stroke_dash(&canvas.style),
    };

    out.buffer()?
        .as_mut()
        .stroke_path(path, &paint, &stroke, canvas.transform, None);
    Ok(())
}

/// A dash converter is inserted only when the dash pattern sums to a
/// positive length; an odd-length dash array is duplicated, per SVG.
fn stroke_dash(style: &Style) -> Option<StrokeDash> {
    let array = &style.stroke_dasharray;
    if array.is_empty() || array.iter().sum::<f32>() <= 0.0 {
        return None;
    }

    let mut dashes = array.clone();
    if dashes.len() % 2 == 1 {
        dashes.extend_from_slice(array);
    }

    StrokeDash::new(dashes, style.stroke_dashoffset)
}

fn make_paint(
    effective: EffectivePaint,
    opacity: f32,
    path: &tiny_skia::Path,
) -> Option<tiny_skia::Paint<'static>> {
    let mut paint = tiny_skia::Paint::default();
    paint.anti_alias = true;

    match effective {
        EffectivePaint::None => return None,
        EffectivePaint::Color(c) => {
            let alpha = ((c.alpha as f32 / 255.0) * opacity).clamp(0.0, 1.0);
            let color = tiny_skia::Color::from_rgba(
                c.red as f32 / 255.0,
                c.green as f32 / 255.0,
                c.blue as f32 / 255.0,
                alpha,
            )?;
            paint.set_color(color);
        }
        EffectivePaint::Gradient(ref gradient) => {
            paint.shader = paint_server::to_shader(gradient, opacity, Some(path.bounds()))?;
        }
    }

    Some(paint)
}
