// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use roxmltree::NodeId;

use crate::error::Error;
use crate::filter::Filter;
use crate::geom::LengthCtx;
use crate::paint_server::Gradient;

/// Per-render shared state: the XML tree, the id index, the lazy
/// gradient/filter registries and the reference-visit set that keeps
/// `use`/`mask`/`marker`/`clip-path` chains cycle-safe.
pub struct Document<'a, 'input> {
    xml: &'a roxmltree::Document<'input>,
    links: HashMap<String, NodeId>,
    followed: RefCell<HashSet<NodeId>>,
    gradients: RefCell<HashMap<String, Option<Gradient>>>,
    filters: RefCell<HashMap<String, Option<Rc<Filter>>>>,
    canvas_size: Cell<(u32, u32)>,
}

impl<'a, 'input> Document<'a, 'input> {
    pub fn new(xml: &'a roxmltree::Document<'input>) -> Self {
        let mut links = HashMap::new();
        for node in xml.descendants().filter(|n| n.is_element()) {
            if let Some(id) = node.attribute("id") {
                links.entry(id.to_string()).or_insert_with(|| node.id());
            }
        }

        Document {
            xml,
            links,
            followed: RefCell::new(HashSet::new()),
            gradients: RefCell::new(HashMap::new()),
            filters: RefCell::new(HashMap::new()),
            canvas_size: Cell::new((0, 0)),
        }
    }

    pub fn element_by_id(&self, fragment: &str) -> Option<roxmltree::Node<'a, 'input>> {
        let id = self.links.get(fragment)?;
        self.xml.get_node(*id)
    }

    /// Starts following a reference. Fails when the element is already
    /// on the active reference chain.
    pub fn follow(&self, node: roxmltree::Node) -> Result<FollowRef<'_, 'a, 'input>, Error> {
        if !self.followed.borrow_mut().insert(node.id()) {
            return Err(Error::CyclicReference);
        }

        Ok(FollowRef {
            document: self,
            id: node.id(),
        })
    }

    /// Resolves a gradient by fragment id, caching the result.
    pub fn gradient(&self, fragment: &str, lengths: &LengthCtx) -> Option<Gradient> {
        if let Some(cached) = self.gradients.borrow().get(fragment) {
            return cached.clone();
        }

        let parsed = self
            .element_by_id(fragment)
            .and_then(|node| crate::paint_server::parse_gradient(self, node, lengths));
        self.gradients
            .borrow_mut()
            .insert(fragment.to_string(), parsed.clone());
        parsed
    }

    /// Resolves a filter by fragment id, caching the result.
    pub fn filter(&self, fragment: &str, lengths: &LengthCtx) -> Option<Rc<Filter>> {
        if let Some(cached) = self.filters.borrow().get(fragment) {
            return cached.clone();
        }

        let parsed = self
            .element_by_id(fragment)
            .and_then(|node| crate::filter::parse_filter(node, lengths))
            .map(Rc::new);
        self.filters
            .borrow_mut()
            .insert(fragment.to_string(), parsed.clone());
        parsed
    }

    pub(crate) fn set_canvas_size(&self, width: u32, height: u32) {
        self.canvas_size.set((width, height));
    }

    /// The dimensions shared by the root buffer and every offscreen layer.
    pub(crate) fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size.get()
    }
}

/// Scoped guard over the followed-refs set.
///
/// Construction inserts the element, drop removes it, so the entry is
/// released on every exit path including error unwinding.
pub struct FollowRef<'d, 'a, 'input> {
    document: &'d Document<'a, 'input>,
    id: NodeId,
}

impl Drop for FollowRef<'_, '_, '_> {
    fn drop(&mut self) {
        self.document.followed.borrow_mut().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lookup() {
        let xml = roxmltree::Document::parse(
            "<svg><g id='a'/><g id='b'><rect id='a'/></g></svg>",
        )
        .unwrap();
        let doc = Document::new(&xml);

        // The first occurrence of a duplicated id wins.
        assert_eq!(doc.element_by_id("a").unwrap().tag_name().name(), "g");
        assert!(doc.element_by_id("b").is_some());
        assert!(doc.element_by_id("c").is_none());
    }

    #[test]
    fn duplicate_follow_is_cyclic() {
        let xml = roxmltree::Document::parse("<svg><g id='a'/></svg>").unwrap();
        let doc = Document::new(&xml);
        let node = doc.element_by_id("a").unwrap();

        let guard = doc.follow(node).unwrap();
        assert!(matches!(doc.follow(node), Err(Error::CyclicReference)));

        // Dropping the guard releases the element again.
        drop(guard);
        assert!(doc.follow(node).is_ok());
    }
}
