// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inkscene Tree: the retained-mode scene graph behind a sketch canvas.
//!
//! A [`Tree`] is an arena of scene nodes forming a composite hierarchy that
//! auto-organizes itself by geometric containment: dropping a new shape into
//! the tree re-parents it under the most specific composite whose bounds
//! contain it, and wraps existing siblings inside it when the new shape
//! encloses them. The tree simultaneously maintains a relationship graph
//! (subclass, instantiation, and property-relation edges) whose endpoints are
//! plain [`NodeId`] back-references into the same arena.
//!
//! Selected content is manipulated in a second, independent transform space:
//! toggling a node's highlight re-expresses its geometry between the
//! committed and the live canvas transform (see
//! [`Tree::update_path`] and `inkscene_path`'s space-switch primitive), so a
//! user can drag a selection without disturbing the rest of the sketch.
//!
//! ## API overview
//!
//! - [`Tree`]: arena container; owns every node and the root.
//! - [`NodeKind`]: closed set of node kinds, matched exhaustively.
//! - [`NodeId`]: generational handle of a node.
//! - [`NodeFlags`]: grouped/highlighted state.
//! - [`RenderList`]: flattened render-order snapshot of paths + transforms,
//!   rebuilt lazily when the tree structure changes.
//! - [`RelationError`]: surfaced failure when an edge endpoint is stale.
//!
//! Key operations:
//! - [`Tree::insert`] → [`NodeId`], then [`Tree::add_component`] for
//!   containment-based placement.
//! - [`Tree::remove_component`] (promotes children) and
//!   [`Tree::remove_composite_component`] (drops the subtree).
//! - [`Tree::update_path`] drives the dual-transform highlight protocol.
//! - [`Tree::add_relation`] / [`Tree::remove_references`] manage edges.
//! - [`Tree::render_list`] returns the cached render-order snapshot.
//!
//! The tree is single-threaded and synchronous: every mutation runs to
//! completion on the caller's thread, and no operation blocks or performs
//! I/O. Read-only scans (hit scoring) may run elsewhere only while the
//! caller guarantees no concurrent mutation.

mod relation;
mod render_list;
mod tree;
mod types;
mod util;

pub use relation::RelationError;
pub use render_list::{RenderEntry, RenderList};
pub use tree::Tree;
pub use types::{DisplayState, NodeFlags, NodeId, NodeKind, RelationEnds};
