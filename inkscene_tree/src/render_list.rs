// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flattened, render-ordered snapshot of all paths in the tree.

use inkscene_path::PathId;
use kurbo::Affine;

use crate::types::NodeId;

/// One drawable entry: a path and the transform to draw it under.
#[derive(Clone, Copy, Debug)]
pub struct RenderEntry {
    /// The node the path belongs to.
    pub node: NodeId,
    /// Identity of the node's path.
    pub path: PathId,
    /// Per-path transform (the node's stored path transform).
    pub transform: Affine,
}

/// Render-order list of every path in the tree.
///
/// Produced by [`crate::Tree::render_list`]; rebuilt only when the tree has
/// structurally changed since the last request. Order is a pre-order walk of
/// the tree, parents before children, with relation edges before shape
/// siblings at each level, so edges draw beneath the shapes they connect and
/// later (topmost) content draws last.
#[derive(Clone, Debug, Default)]
pub struct RenderList {
    pub(crate) entries: Vec<RenderEntry>,
}

impl RenderList {
    /// The entries in draw order.
    pub fn entries(&self) -> &[RenderEntry] {
        &self.entries
    }

    /// Number of drawable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the entries in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a RenderList {
    type Item = &'a RenderEntry;
    type IntoIter = core::slice::Iter<'a, RenderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
