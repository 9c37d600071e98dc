// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::rc::Rc;
use std::str::FromStr;

use svgtypes::Color;
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::canvas::Canvas;
use crate::document::Document;
use crate::error::Error;
use crate::geom::{self, LengthCtx};
use crate::xmlext::SvgNodeExt;

/// A captured `filter` definition.
///
/// Only a small set of primitives is supported; unknown primitives are
/// skipped with a warning. The filter region always spans the whole
/// canvas buffer.
pub struct Filter {
    pub primitives: Vec<Primitive>,
}

pub struct Primitive {
    /// `None` means the chain default: the source graphic for the first
    /// primitive, the previous result afterwards.
    pub input: Option<Input>,
    pub result: Option<String>,
    pub kind: Kind,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Input {
    SourceGraphic,
    SourceAlpha,
    BackgroundImage,
    Reference(String),
}

pub enum Kind {
    GaussianBlur { std_x: f32, std_y: f32 },
    Offset { dx: f32, dy: f32 },
    Flood { color: Color, opacity: f32 },
    Merge { inputs: Vec<Input> },
}

/// Runs the referenced filter over a layer.
///
/// `source` is the layer content (the filter's SourceGraphic),
/// `background` the parent buffer (BackgroundImage). The output is
/// written back into `source`. A missing or empty filter leaves the
/// layer unfiltered.
pub(crate) fn apply_referenced(
    doc: &Document,
    fragment: &str,
    canvas: &Canvas,
    source: &mut Pixmap,
    background: &Pixmap,
) -> Result<(), Error> {
    let filter = match doc.filter(fragment, &canvas.lengths) {
        Some(v) => v,
        None => {
            log::warn!("Element referenced by 'filter' not found: '#{}'.", fragment);
            return Ok(());
        }
    };

    // Primitive lengths are in user units; the buffers are in device
    // pixels.
    let scale = geom::transform_scale(canvas.transform);

    let mut results: Vec<(String, Rc<Pixmap>)> = Vec::new();
    let mut last: Option<Rc<Pixmap>> = None;

    for primitive in &filter.primitives {
        let image = match primitive.input {
            Some(ref input) => get_input(input, source, background, &results),
            // The chain default: the source graphic first, then the
            // previous primitive's result.
            None => match last.clone() {
                Some(prev) => prev,
                None => Rc::new(source.clone()),
            },
        };

        let output = apply_primitive(primitive, image, source, background, scale, &results)?;
        advance(&mut results, &mut last, primitive, output);
    }

    if let Some(output) = last {
        source.data_mut().copy_from_slice(output.data());
    }

    Ok(())
}

fn advance(
    results: &mut Vec<(String, Rc<Pixmap>)>,
    last: &mut Option<Rc<Pixmap>>,
    primitive: &Primitive,
    output: Pixmap,
) {
    let output = Rc::new(output);
    if let Some(ref name) = primitive.result {
        results.push((name.clone(), output.clone()));
    }
    *last = Some(output);
}

fn get_input(
    input: &Input,
    source: &Pixmap,
    background: &Pixmap,
    results: &[(String, Rc<Pixmap>)],
) -> Rc<Pixmap> {
    match input {
        Input::SourceGraphic => Rc::new(source.clone()),
        Input::SourceAlpha => {
            let mut image = source.clone();
            // Keep alpha, zero the color channels.
            for pixel in image.data_mut().chunks_exact_mut(4) {
                pixel[0] = 0;
                pixel[1] = 0;
                pixel[2] = 0;
            }
            Rc::new(image)
        }
        Input::BackgroundImage => Rc::new(background.clone()),
        Input::Reference(ref name) => {
            if let Some((_, image)) = results.iter().rev().find(|(n, _)| n == name) {
                image.clone()
            } else {
                log::warn!("Unknown filter primitive reference '{}'.", name);
                Rc::new(source.clone())
            }
        }
    }
}

fn apply_primitive(
    primitive: &Primitive,
    image: Rc<Pixmap>,
    source: &Pixmap,
    background: &Pixmap,
    scale: f32,
    results: &[(String, Rc<Pixmap>)],
) -> Result<Pixmap, Error> {
    let new_pixmap = |w: u32, h: u32| Pixmap::new(w, h).ok_or(Error::LayerAllocationFailed);

    match primitive.kind {
        Kind::GaussianBlur { std_x, std_y } => {
            let mut output = (*image).clone();
            box_blur(&mut output, std_x * scale, std_y * scale);
            Ok(output)
        }
        Kind::Offset { dx, dy } => {
            let mut output = new_pixmap(image.width(), image.height())?;
            output.draw_pixmap(
                (dx * scale).round() as i32,
                (dy * scale).round() as i32,
                image.as_ref().as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
            Ok(output)
        }
        Kind::Flood { color, opacity } => {
            let mut output = new_pixmap(image.width(), image.height())?;
            let alpha = ((color.alpha as f32 / 255.0) * opacity).clamp(0.0, 1.0);
            if let Some(fill) = tiny_skia::Color::from_rgba(
                color.red as f32 / 255.0,
                color.green as f32 / 255.0,
                color.blue as f32 / 255.0,
                alpha,
            ) {
                output.fill(fill);
            }
            Ok(output)
        }
        Kind::Merge { ref inputs } => {
            let mut output = new_pixmap(image.width(), image.height())?;
            for input in inputs {
                let layer = get_input(input, source, background, results);
                output.draw_pixmap(
                    0,
                    0,
                    layer.as_ref().as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
            Ok(output)
        }
    }
}

/// A three-pass box blur approximating a Gaussian, run separably over
/// the premultiplied channels.
fn box_blur(pixmap: &mut Pixmap, sigma_x: f32, sigma_y: f32) {
    let dx = box_size(sigma_x);
    let dy = box_size(sigma_y);
    if dx == 0 && dy == 0 {
        return;
    }

    let w = pixmap.width() as usize;
    let h = pixmap.height() as usize;
    let mut scratch = vec![0u8; w * h * 4];

    for _ in 0..3 {
        if dx > 0 {
            blur_pass(pixmap.data_mut(), &mut scratch, w, h, dx / 2, true);
        }
        if dy > 0 {
            blur_pass(pixmap.data_mut(), &mut scratch, w, h, dy / 2, false);
        }
    }
}

/// The box size for a given deviation, per the SVG filter specification.
fn box_size(sigma: f32) -> usize {
    if sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0 * (2.0 * std::f32::consts::PI).sqrt() / 4.0 + 0.5) as usize
}

fn blur_pass(data: &mut [u8], scratch: &mut [u8], w: usize, h: usize, r: usize, horizontal: bool) {
    if r == 0 {
        return;
    }

    let (outer, inner) = if horizontal { (h, w) } else { (w, h) };
    let index = |line: usize, i: usize| -> usize {
        if horizontal {
            (line * w + i) * 4
        } else {
            (i * w + line) * 4
        }
    };

    let window = (2 * r + 1) as u32;
    for line in 0..outer {
        for c in 0..4 {
            let mut sum: u32 = 0;
            // Pixels outside the buffer are transparent.
            for i in 0..=r.min(inner - 1) {
                sum += data[index(line, i) + c] as u32;
            }

            for i in 0..inner {
                scratch[index(line, i) + c] = (sum / window) as u8;
                if i + r + 1 < inner {
                    sum += data[index(line, i + r + 1) + c] as u32;
                }
                if i >= r {
                    sum -= data[index(line, i - r) + c] as u32;
                }
            }
        }
    }

    data.copy_from_slice(scratch);
}

/// Captures a `filter` element definition.
pub(crate) fn parse_filter(node: roxmltree::Node, _lengths: &LengthCtx) -> Option<Filter> {
    if !node.is_svg_element("filter") {
        log::warn!("'filter' must reference a 'filter' element.");
        return None;
    }

    let mut primitives = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        let kind = match child.tag_name().name() {
            "feGaussianBlur" => {
                let (std_x, std_y) = parse_std_deviation(child.attribute("stdDeviation"));
                if std_x < 0.0 || std_y < 0.0 {
                    log::warn!("Negative 'stdDeviation' disables the primitive.");
                    continue;
                }
                Kind::GaussianBlur { std_x, std_y }
            }
            "feOffset" => Kind::Offset {
                dx: child.parse_attr::<f32>("dx").unwrap_or(0.0),
                dy: child.parse_attr::<f32>("dy").unwrap_or(0.0),
            },
            "feFlood" => Kind::Flood {
                color: child
                    .attribute("flood-color")
                    .and_then(|v| Color::from_str(v).ok())
                    .unwrap_or_else(Color::black),
                opacity: child
                    .parse_attr::<f32>("flood-opacity")
                    .map_or(1.0, |n| n.clamp(0.0, 1.0)),
            },
            "feMerge" => {
                let inputs = child
                    .children()
                    .filter(|n| n.is_svg_element("feMergeNode"))
                    .map(|n| parse_input(n.attribute("in")).unwrap_or(Input::SourceGraphic))
                    .collect();
                Kind::Merge { inputs }
            }
            name => {
                log::warn!("Filter primitive '{}' is not supported. Skipped.", name);
                continue;
            }
        };

        primitives.push(Primitive {
            input: parse_input(child.attribute("in")),
            result: child.attribute("result").map(|v| v.to_string()),
            kind,
        });
    }

    Some(Filter { primitives })
}

fn parse_input(value: Option<&str>) -> Option<Input> {
    match value? {
        "SourceGraphic" => Some(Input::SourceGraphic),
        "SourceAlpha" => Some(Input::SourceAlpha),
        "BackgroundImage" => Some(Input::BackgroundImage),
        name => Some(Input::Reference(name.to_string())),
    }
}

fn parse_std_deviation(value: Option<&str>) -> (f32, f32) {
    let value = match value {
        Some(v) => v,
        None => return (0.0, 0.0),
    };

    let mut numbers = value
        .split(|c: char| c.is_ascii_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>().unwrap_or(0.0));

    let x = numbers.next().unwrap_or(0.0);
    let y = numbers.next().unwrap_or(x);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Filter {
        let xml = roxmltree::Document::parse(text).unwrap();
        parse_filter(xml.root_element(), &LengthCtx::default()).unwrap()
    }

    #[test]
    fn primitive_chain() {
        let filter = parse(
            "<filter id='f'>\
             <feGaussianBlur stdDeviation='2' result='b'/>\
             <feOffset in='b' dx='3' dy='4'/>\
             </filter>",
        );

        assert_eq!(filter.primitives.len(), 2);
        assert!(filter.primitives[0].input.is_none());
        assert_eq!(filter.primitives[0].result.as_deref(), Some("b"));
        assert_eq!(
            filter.primitives[1].input,
            Some(Input::Reference("b".to_string()))
        );
    }

    #[test]
    fn unknown_primitives_are_skipped() {
        let filter = parse(
            "<filter id='f'>\
             <feTurbulence baseFrequency='0.05'/>\
             <feFlood flood-color='red'/>\
             </filter>",
        );
        assert_eq!(filter.primitives.len(), 1);
    }

    #[test]
    fn std_deviation_pairs() {
        assert_eq!(parse_std_deviation(Some("2")), (2.0, 2.0));
        assert_eq!(parse_std_deviation(Some("2 3")), (2.0, 3.0));
        assert_eq!(parse_std_deviation(Some("2, 3")), (2.0, 3.0));
        assert_eq!(parse_std_deviation(None), (0.0, 0.0));
    }

    #[test]
    fn tiny_sigma_is_a_no_op() {
        assert_eq!(box_size(0.0), 0);
        assert!(box_size(2.0) > 0);
    }

    #[test]
    fn flood_fills_everything() {
        let mut source = Pixmap::new(4, 4).unwrap();
        let background = Pixmap::new(4, 4).unwrap();
        let filter = Filter {
            primitives: vec![Primitive {
                input: None,
                result: None,
                kind: Kind::Flood {
                    color: Color::new_rgb(0, 255, 0),
                    opacity: 1.0,
                },
            }],
        };

        let results = Vec::new();
        let image = get_input(&Input::SourceGraphic, &source, &background, &results);
        let output =
            apply_primitive(&filter.primitives[0], image, &source, &background, 1.0, &results)
                .unwrap();
        source.data_mut().copy_from_slice(output.data());

        let pixel = source.pixel(2, 2).unwrap();
        assert_eq!((pixel.green(), pixel.alpha()), (255, 255));
    }
}
