// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use svgtypes::Length;
use tiny_skia::Transform;

use crate::geom::{self, LengthAxis, LengthCtx};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Attribute and tag helpers over the XML tree.
///
/// Documents without an SVG namespace declaration are still accepted:
/// a tag matches when its namespace is the SVG one or absent.
pub trait SvgNodeExt {
    fn is_svg_element(&self, name: &str) -> bool;
    fn parse_attr<T: FromStr>(&self, name: &str) -> Option<T>;
    fn length_attr(&self, name: &str, ctx: &LengthCtx, axis: LengthAxis) -> Option<f32>;
    fn transform_attr(&self) -> Option<Transform>;
    fn href(&self) -> Option<&str>;
}

impl SvgNodeExt for roxmltree::Node<'_, '_> {
    fn is_svg_element(&self, name: &str) -> bool {
        let tag = self.tag_name();
        tag.name() == name && matches!(tag.namespace(), None | Some(SVG_NS))
    }

    fn parse_attr<T: FromStr>(&self, name: &str) -> Option<T> {
        let value = self.attribute(name)?;
        match T::from_str(value) {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Failed to parse the '{}' attribute value: '{}'.", name, value);
                None
            }
        }
    }

    fn length_attr(&self, name: &str, ctx: &LengthCtx, axis: LengthAxis) -> Option<f32> {
        self.parse_attr::<Length>(name).map(|len| ctx.resolve(len, axis))
    }

    fn transform_attr(&self) -> Option<Transform> {
        self.parse_attr::<svgtypes::Transform>("transform")
            .map(geom::conv_transform)
    }

    fn href(&self) -> Option<&str> {
        self.attribute((XLINK_NS, "href"))
            .or_else(|| self.attribute("href"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matching_without_namespace() {
        let doc = roxmltree::Document::parse("<svg><rect/></svg>").unwrap();
        let root = doc.root_element();
        assert!(root.is_svg_element("svg"));
        assert!(!root.is_svg_element("rect"));
    }

    #[test]
    fn tag_matching_with_namespace() {
        let doc = roxmltree::Document::parse(
            "<svg xmlns='http://www.w3.org/2000/svg'><g/></svg>",
        )
        .unwrap();
        assert!(doc.root_element().is_svg_element("svg"));
    }

    #[test]
    fn malformed_attribute_is_skipped() {
        let doc = roxmltree::Document::parse("<svg width='ten'/>").unwrap();
        let root = doc.root_element();
        assert!(root.parse_attr::<Length>("width").is_none());
    }

    #[test]
    fn href_prefers_xlink() {
        let text = "<use xmlns:xlink='http://www.w3.org/1999/xlink' \
                    xlink:href='#a' href='#b'/>";
        let doc = roxmltree::Document::parse(text).unwrap();
        assert_eq!(doc.root_element().href(), Some("#a"));
    }
}
