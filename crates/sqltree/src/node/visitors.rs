//! Tree walking, cloning and replacement.
//!
//! [`iterate`] uses an explicit stack. The cloning walks recurse once per
//! nesting level and memoize by node identity, so shared subtrees are copied
//! once; nesting depth is bounded by the thread's stack.

use super::{Element, KindTag, NodeId};
use crate::annotation::NO_REPLACEMENT_TRAVERSE;
use std::collections::{HashMap, HashSet};

/// Pre-order iterator over `root` and everything below it.
///
/// Shared subtrees are yielded once per reference.
pub fn iterate(root: &Element) -> impl Iterator<Item = Element> {
    let mut stack = vec![root.clone()];
    std::iter::from_fn(move || {
        let next = stack.pop()?;
        for child in next.children().into_iter().rev() {
            stack.push(child.clone());
        }
        Some(next)
    })
}

/// Per-kind callback table used by [`traverse`] and [`cloned_traverse`].
pub struct Visitors<'a> {
    visit: HashMap<KindTag, Box<dyn FnMut(&Element) + 'a>>,
    replace: HashMap<KindTag, Box<dyn FnMut(Element) -> Element + 'a>>,
}

impl Default for Visitors<'_> {
    fn default() -> Self {
        Self {
            visit: HashMap::new(),
            replace: HashMap::new(),
        }
    }
}

impl<'a> Visitors<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a read-only callback for one kind.
    pub fn on(mut self, tag: KindTag, f: impl FnMut(&Element) + 'a) -> Self {
        self.visit.insert(tag, Box::new(f));
        self
    }

    /// Register a callback that may swap out freshly cloned nodes of one kind.
    pub fn on_clone(mut self, tag: KindTag, f: impl FnMut(Element) -> Element + 'a) -> Self {
        self.replace.insert(tag, Box::new(f));
        self
    }

    fn visit(&mut self, element: &Element) {
        if let Some(f) = self.visit.get_mut(&element.tag()) {
            f(element);
        }
    }

    fn visit_clone(&mut self, element: Element) -> Element {
        self.visit(&element);
        match self.replace.get_mut(&element.tag()) {
            Some(f) => f(element),
            None => element,
        }
    }
}

/// Visit every distinct node instance below `root`, pre-order.
pub fn traverse(root: &Element, visitors: &mut Visitors<'_>) {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id()) {
            continue;
        }
        visitors.visit(&node);
        for child in node.children().into_iter().rev() {
            stack.push(child.clone());
        }
    }
}

/// Deep clone `root`, leaving nodes equal to a member of `stop_on` shared.
///
/// Every fresh clone is handed to the callbacks registered for its kind after
/// its children were cloned.
pub fn cloned_traverse(root: &Element, stop_on: &[Element], visitors: &mut Visitors<'_>) -> Element {
    let stop: HashSet<Element> = stop_on.iter().cloned().collect();
    let mut cloned: HashMap<NodeId, Element> = HashMap::new();
    cloned_traverse_inner(root, &stop, visitors, &mut cloned)
}

fn cloned_traverse_inner(
    elem: &Element,
    stop: &HashSet<Element>,
    visitors: &mut Visitors<'_>,
    cloned: &mut HashMap<NodeId, Element>,
) -> Element {
    if stop.contains(elem) {
        return elem.clone();
    }
    if let Some(done) = cloned.get(&elem.id()) {
        return done.clone();
    }
    let fresh = if elem.tag().is_immutable() {
        elem.clone()
    } else {
        let kind = {
            let mut clone = |child: &Element| cloned_traverse_inner(child, stop, visitors, cloned);
            elem.kind().copy_internals(&mut clone)
        };
        elem.derive(kind)
    };
    let fresh = visitors.visit_clone(fresh);
    cloned.insert(elem.id(), fresh.clone());
    fresh
}

/// Fully independent copy of `root`; tables and columns stay shared.
pub fn deep_clone(root: &Element) -> Element {
    cloned_traverse(root, &[], &mut Visitors::new())
}

/// Copy `root`, substituting every node for which `replace` returns a value.
///
/// Substituted nodes are not descended into, and neither are nodes equal to
/// a member of `stop_on` or annotated with `no_replacement_traverse`.
pub fn replacement_traverse(
    root: &Element,
    stop_on: &[Element],
    mut replace: impl FnMut(&Element) -> Option<Element>,
) -> Element {
    let mut stop: HashSet<Element> = stop_on.iter().cloned().collect();
    let mut cloned: HashMap<Element, Element> = HashMap::new();
    replacement_inner(root, &mut stop, &mut replace, &mut cloned)
}

fn replacement_inner(
    elem: &Element,
    stop: &mut HashSet<Element>,
    replace: &mut dyn FnMut(&Element) -> Option<Element>,
    cloned: &mut HashMap<Element, Element>,
) -> Element {
    if stop.contains(elem) || elem.annotation(NO_REPLACEMENT_TRAVERSE).is_some() {
        return elem.clone();
    }
    if let Some(new) = replace(elem) {
        stop.insert(new.clone());
        return new;
    }
    if let Some(done) = cloned.get(elem) {
        return done.clone();
    }
    let fresh = if elem.tag().is_immutable() {
        elem.clone()
    } else {
        let kind = {
            let mut clone = |child: &Element| replacement_inner(child, stop, replace, cloned);
            elem.kind().copy_internals(&mut clone)
        };
        elem.derive(kind)
    };
    cloned.insert(elem.clone(), fresh.clone());
    fresh
}

/// Tables referenced as nodes below `root`, first occurrence first.
pub fn find_tables(root: &Element) -> Vec<Element> {
    collect_kind(root, KindTag::Table)
}

/// Columns referenced below `root`, first occurrence first.
pub fn find_columns(root: &Element) -> Vec<Element> {
    collect_kind(root, KindTag::Column)
}

fn collect_kind(root: &Element, tag: KindTag) -> Vec<Element> {
    let mut found: Vec<Element> = Vec::new();
    let mut seen: HashSet<Element> = HashSet::new();
    {
        let mut visitors = Visitors::new().on(tag, |e| {
            if seen.insert(e.clone()) {
                found.push(e.clone());
            }
        });
        traverse(root, &mut visitors);
    }
    found
}
