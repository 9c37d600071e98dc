// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use svgtypes::{Align, AspectRatio, Length, LengthUnit, ViewBox};
use tiny_skia::Transform;

const DPI: f32 = 96.0;
const FONT_SIZE: f32 = 12.0;

/// Axis against which a percentage length is resolved.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LengthAxis {
    Horizontal,
    Vertical,
    Diagonal,
}

/// Resolves absolute and viewport-relative lengths.
///
/// Carries the size of the current viewport so that percentages can be
/// converted into user units. A fresh context uses the 100x100 fallback
/// viewport, which also serves as the default document size.
#[derive(Clone, Copy, Debug)]
pub struct LengthCtx {
    vw: f32,
    vh: f32,
}

impl Default for LengthCtx {
    fn default() -> Self {
        LengthCtx {
            vw: 100.0,
            vh: 100.0,
        }
    }
}

impl LengthCtx {
    pub fn set_viewport(&mut self, w: f32, h: f32) {
        self.vw = w;
        self.vh = h;
    }

    pub fn viewport(&self) -> (f32, f32) {
        (self.vw, self.vh)
    }

    pub fn resolve(&self, length: Length, axis: LengthAxis) -> f32 {
        let n = length.number as f32;
        match length.unit {
            LengthUnit::None | LengthUnit::Px => n,
            LengthUnit::Em => n * FONT_SIZE,
            LengthUnit::Ex => n * FONT_SIZE / 2.0,
            LengthUnit::In => n * DPI,
            LengthUnit::Cm => n * DPI / 2.54,
            LengthUnit::Mm => n * DPI / 25.4,
            LengthUnit::Pt => n * DPI / 72.0,
            LengthUnit::Pc => n * DPI / 6.0,
            LengthUnit::Percent => {
                let base = match axis {
                    LengthAxis::Horizontal => self.vw,
                    LengthAxis::Vertical => self.vh,
                    LengthAxis::Diagonal => {
                        ((self.vw * self.vw + self.vh * self.vh) / 2.0).sqrt()
                    }
                };
                base * n / 100.0
            }
        }
    }
}

/// Converts a `viewBox` + `preserveAspectRatio` pair into the transform
/// that maps viewBox coordinates onto a `w`x`h` viewport.
pub fn view_box_to_transform(vb: ViewBox, aspect: AspectRatio, w: f32, h: f32) -> Transform {
    let vw = vb.w as f32;
    let vh = vb.h as f32;

    let sx = w / vw;
    let sy = h / vh;

    let (sx, sy) = if aspect.align == Align::None {
        (sx, sy)
    } else {
        let s = if aspect.slice {
            if sx < sy {
                sy
            } else {
                sx
            }
        } else {
            if sx > sy {
                sy
            } else {
                sx
            }
        };

        (s, s)
    };

    let x = -vb.x as f32 * sx;
    let y = -vb.y as f32 * sy;
    let dw = w - vw * sx;
    let dh = h - vh * sy;

    let (tx, ty) = aligned_pos(aspect.align, x, y, dw, dh);
    Transform::from_row(sx, 0.0, 0.0, sy, tx, ty)
}

fn aligned_pos(align: Align, x: f32, y: f32, w: f32, h: f32) -> (f32, f32) {
    match align {
        Align::None => (x, y),
        Align::XMinYMin => (x, y),
        Align::XMidYMin => (x + w / 2.0, y),
        Align::XMaxYMin => (x + w, y),
        Align::XMinYMid => (x, y + h / 2.0),
        Align::XMidYMid => (x + w / 2.0, y + h / 2.0),
        Align::XMaxYMid => (x + w, y + h / 2.0),
        Align::XMinYMax => (x, y + h),
        Align::XMidYMax => (x + w / 2.0, y + h),
        Align::XMaxYMax => (x + w, y + h),
    }
}

/// Converts a parsed SVG transform list into the backend representation.
pub fn conv_transform(ts: svgtypes::Transform) -> Transform {
    Transform::from_row(
        ts.a as f32,
        ts.b as f32,
        ts.c as f32,
        ts.d as f32,
        ts.e as f32,
        ts.f as f32,
    )
}

/// An area-preserving scale estimate of an affine transform.
pub fn transform_scale(ts: Transform) -> f32 {
    (ts.sx * ts.sy - ts.kx * ts.ky).abs().sqrt()
}

pub fn map_point(ts: Transform, x: f32, y: f32) -> (f32, f32) {
    (
        ts.sx * x + ts.kx * y + ts.tx,
        ts.ky * x + ts.sy * y + ts.ty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn absolute_units() {
        let ctx = LengthCtx::default();
        let resolve = |text| {
            ctx.resolve(Length::from_str(text).unwrap(), LengthAxis::Horizontal)
        };

        assert_eq!(resolve("10"), 10.0);
        assert_eq!(resolve("10px"), 10.0);
        assert_eq!(resolve("1in"), 96.0);
        assert_eq!(resolve("2.54cm"), 96.0);
        assert_eq!(resolve("72pt"), 96.0);
    }

    #[test]
    fn percent_axes() {
        let mut ctx = LengthCtx::default();
        ctx.set_viewport(200.0, 100.0);

        let len = Length::from_str("50%").unwrap();
        assert_eq!(ctx.resolve(len, LengthAxis::Horizontal), 100.0);
        assert_eq!(ctx.resolve(len, LengthAxis::Vertical), 50.0);

        let diag = ctx.resolve(len, LengthAxis::Diagonal);
        assert!((diag - 79.0569).abs() < 0.01);
    }

    #[test]
    fn view_box_stretch() {
        let vb = ViewBox::new(0.0, 0.0, 10.0, 10.0);
        let aspect = AspectRatio::from_str("none").unwrap();
        let ts = view_box_to_transform(vb, aspect, 100.0, 50.0);
        assert_eq!(ts.sx, 10.0);
        assert_eq!(ts.sy, 5.0);
    }

    #[test]
    fn view_box_meet_centers() {
        let vb = ViewBox::new(0.0, 0.0, 10.0, 10.0);
        let aspect = AspectRatio::default();
        let ts = view_box_to_transform(vb, aspect, 100.0, 50.0);
        // Uniform scale by the smaller factor, centered horizontally.
        assert_eq!(ts.sx, 5.0);
        assert_eq!(ts.sy, 5.0);
        assert_eq!(ts.tx, 25.0);
        assert_eq!(ts.ty, 0.0);
    }

    #[test]
    fn view_box_offset() {
        let vb = ViewBox::new(5.0, -5.0, 10.0, 10.0);
        let aspect = AspectRatio::from_str("none").unwrap();
        let ts = view_box_to_transform(vb, aspect, 10.0, 10.0);
        assert_eq!(ts.tx, -5.0);
        assert_eq!(ts.ty, 5.0);
    }
}
