// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use svgtypes::{Color, Length, LengthListParser, PaintFallback};
use tiny_skia::{LineCap, LineJoin};

use crate::geom::{LengthAxis, LengthCtx};
use crate::marker::MarkerVertex;

/// An owned `<paint>` value.
#[derive(Clone, PartialEq, Debug)]
pub enum Paint {
    None,
    CurrentColor,
    Color(Color),
    Iri {
        fragment: String,
        fallback: Option<Box<Paint>>,
    },
}

impl Paint {
    fn from_svg(paint: svgtypes::Paint) -> Option<Self> {
        match paint {
            svgtypes::Paint::None => Some(Paint::None),
            svgtypes::Paint::CurrentColor => Some(Paint::CurrentColor),
            svgtypes::Paint::Color(c) => Some(Paint::Color(c)),
            svgtypes::Paint::FuncIRI(link, fallback) => {
                let fallback = fallback.map(|f| {
                    Box::new(match f {
                        PaintFallback::None => Paint::None,
                        PaintFallback::CurrentColor => Paint::CurrentColor,
                        PaintFallback::Color(c) => Paint::Color(c),
                    })
                });
                Some(Paint::Iri {
                    fragment: link.to_string(),
                    fallback,
                })
            }
            // `inherit` keeps the inherited value; context paints are
            // meaningless outside of markers resolved from `use`.
            svgtypes::Paint::Inherit
            | svgtypes::Paint::ContextFill
            | svgtypes::Paint::ContextStroke => None,
        }
    }
}

/// The computed style record inherited along the element tree.
///
/// Every field starts at its SVG default and is overwritten by
/// presentation attributes as the traversal encounters them.
#[derive(Clone, Debug)]
pub struct Style {
    pub display: bool,
    pub opacity: f32,
    pub color: Color,
    pub fill_paint: Paint,
    pub stroke_paint: Paint,
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
    pub nonzero_fill_rule: bool,
    pub stroke_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miterlimit: f32,
    pub stroke_dasharray: Vec<f32>,
    pub stroke_dashoffset: f32,
    pub clip_path: Option<String>,
    pub mask: Option<String>,
    pub filter: Option<String>,
    pub marker_start: Option<String>,
    pub marker_mid: Option<String>,
    pub marker_end: Option<String>,
    pub overflow_clip: bool,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            display: true,
            opacity: 1.0,
            color: Color::black(),
            fill_paint: Paint::Color(Color::black()),
            stroke_paint: Paint::None,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            nonzero_fill_rule: true,
            stroke_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miterlimit: 4.0,
            stroke_dasharray: Vec::new(),
            stroke_dashoffset: 0.0,
            clip_path: None,
            mask: None,
            filter: None,
            marker_start: None,
            marker_mid: None,
            marker_end: None,
            overflow_clip: true,
        }
    }
}

impl Style {
    /// Applies one presentation attribute. Unknown attributes and
    /// malformed values are ignored.
    pub fn apply(&mut self, name: &str, value: &str, lengths: &LengthCtx) {
        match name {
            "display" => self.display = value != "none",
            "opacity" => apply_opacity(&mut self.opacity, value),
            "color" => {
                if let Ok(c) = Color::from_str(value) {
                    self.color = c;
                }
            }
            "fill" => apply_paint(&mut self.fill_paint, value),
            "stroke" => apply_paint(&mut self.stroke_paint, value),
            "fill-opacity" => apply_opacity(&mut self.fill_opacity, value),
            "stroke-opacity" => apply_opacity(&mut self.stroke_opacity, value),
            "fill-rule" => match value {
                "nonzero" => self.nonzero_fill_rule = true,
                "evenodd" => self.nonzero_fill_rule = false,
                _ => {}
            },
            "stroke-width" => {
                if let Ok(len) = Length::from_str(value) {
                    self.stroke_width = lengths.resolve(len, LengthAxis::Diagonal);
                }
            }
            "stroke-linecap" => match value {
                "butt" => self.line_cap = LineCap::Butt,
                "round" => self.line_cap = LineCap::Round,
                "square" => self.line_cap = LineCap::Square,
                _ => {}
            },
            "stroke-linejoin" => match value {
                "miter" => self.line_join = LineJoin::Miter,
                "round" => self.line_join = LineJoin::Round,
                "bevel" => self.line_join = LineJoin::Bevel,
                _ => {}
            },
            "stroke-miterlimit" => {
                if let Ok(n) = value.parse::<f32>() {
                    if n >= 1.0 {
                        self.miterlimit = n;
                    }
                }
            }
            "stroke-dasharray" => {
                self.stroke_dasharray = parse_dasharray(value, lengths);
            }
            "stroke-dashoffset" => {
                if let Ok(len) = Length::from_str(value) {
                    self.stroke_dashoffset = lengths.resolve(len, LengthAxis::Diagonal);
                }
            }
            "clip-path" => self.clip_path = parse_func_iri(value),
            "mask" => self.mask = parse_func_iri(value),
            "filter" => self.filter = parse_func_iri(value),
            "marker" => {
                let m = parse_func_iri(value);
                self.marker_start = m.clone();
                self.marker_mid = m.clone();
                self.marker_end = m;
            }
            "marker-start" => self.marker_start = parse_func_iri(value),
            "marker-mid" => self.marker_mid = parse_func_iri(value),
            "marker-end" => self.marker_end = parse_func_iri(value),
            "overflow" => match value {
                "visible" | "auto" => self.overflow_clip = false,
                "hidden" | "scroll" => self.overflow_clip = true,
                _ => {}
            },
            _ => {}
        }
    }

    pub fn marker_ref(&self, vertex: MarkerVertex) -> Option<&str> {
        match vertex {
            MarkerVertex::Start => self.marker_start.as_deref(),
            MarkerVertex::Mid => self.marker_mid.as_deref(),
            MarkerVertex::End => self.marker_end.as_deref(),
        }
    }

    pub fn has_markers(&self) -> bool {
        self.marker_start.is_some() || self.marker_mid.is_some() || self.marker_end.is_some()
    }
}

fn apply_opacity(target: &mut f32, value: &str) {
    if let Ok(n) = value.parse::<f32>() {
        *target = n.clamp(0.0, 1.0);
    }
}

fn apply_paint(target: &mut Paint, value: &str) {
    match svgtypes::Paint::from_str(value) {
        Ok(paint) => {
            if let Some(paint) = Paint::from_svg(paint) {
                *target = paint;
            }
        }
        Err(_) => log::warn!("Failed to parse a paint value: '{}'.", value),
    }
}

fn parse_func_iri(value: &str) -> Option<String> {
    if value == "none" {
        return None;
    }

    match svgtypes::FuncIRI::from_str(value) {
        Ok(iri) => Some(iri.0.to_string()),
        Err(_) => {
            log::warn!("Failed to parse an IRI value: '{}'.", value);
            None
        }
    }
}

fn parse_dasharray(value: &str, lengths: &LengthCtx) -> Vec<f32> {
    if value == "none" {
        return Vec::new();
    }

    let mut list = Vec::new();
    for len in LengthListParser::from(value).flatten() {
        let n = lengths.resolve(len, LengthAxis::Diagonal);
        if n < 0.0 {
            // A negative value invalidates the whole list.
            return Vec::new();
        }
        list.push(n);
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let style = Style::default();
        assert!(style.display);
        assert_eq!(style.fill_paint, Paint::Color(Color::black()));
        assert_eq!(style.stroke_paint, Paint::None);
        assert_eq!(style.stroke_width, 1.0);
        assert!(style.nonzero_fill_rule);
        assert!(style.overflow_clip);
    }

    #[test]
    fn paint_with_fallback() {
        let mut style = Style::default();
        style.apply("fill", "url(#grad) red", &LengthCtx::default());
        assert_eq!(
            style.fill_paint,
            Paint::Iri {
                fragment: "grad".to_string(),
                fallback: Some(Box::new(Paint::Color(Color::red()))),
            }
        );
    }

    #[test]
    fn inherit_keeps_value() {
        let mut style = Style::default();
        style.apply("fill", "green", &LengthCtx::default());
        let green = style.fill_paint.clone();
        style.apply("fill", "inherit", &LengthCtx::default());
        assert_eq!(style.fill_paint, green);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut style = Style::default();
        style.apply("opacity", "2.5", &LengthCtx::default());
        assert_eq!(style.opacity, 1.0);
        style.apply("opacity", "-1", &LengthCtx::default());
        assert_eq!(style.opacity, 0.0);
    }

    #[test]
    fn dasharray_negative_invalidates() {
        let mut style = Style::default();
        style.apply("stroke-dasharray", "5 -1 2", &LengthCtx::default());
        assert!(style.stroke_dasharray.is_empty());

        style.apply("stroke-dasharray", "5 1 2", &LengthCtx::default());
        assert_eq!(style.stroke_dasharray, vec![5.0, 1.0, 2.0]);
    }

    #[test]
    fn marker_shorthand_sets_all() {
        let mut style = Style::default();
        style.apply("marker", "url(#m)", &LengthCtx::default());
        assert_eq!(style.marker_start.as_deref(), Some("m"));
        assert_eq!(style.marker_mid.as_deref(), Some("m"));
        assert_eq!(style.marker_end.as_deref(), Some("m"));
    }
}
