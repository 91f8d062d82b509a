// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inkscene Path: Kurbo-native vector paths for sketch scenes.
//!
//! A [`VectorPath`] is an ordered polyline/curve that keeps three views of the
//! same geometry in sync at all times:
//!
//! - a vertex list (the coordinates gestures and hit scoring work with),
//! - an untouched copy of the originally drawn vertices,
//! - a [`kurbo::BezPath`] (what a renderer actually strokes).
//!
//! Every mutating operation updates all of them plus four running extrema
//! (`min_x`, `min_y`, `max_x`, `max_y`) that bound the current vertex list.
//!
//! Paths also carry the identity and classification state the scene layer
//! needs: a stable [`PathId`], an ontology [`ElementKind`], a recognizer
//! [`GestureKind`], highlight/visibility flags, a color, and the
//! [`PathSpace`] the geometry is currently expressed in.
//!
//! The one non-obvious primitive is [`VectorPath::apply_transformation`] (and
//! the pure [`reexpress`] it is built on): re-expressing geometry from one
//! canvas transform space into another. The surrounding scene tree uses it to
//! let selected content be panned and zoomed independently of everything
//! else; see the `inkscene_tree` crate.

mod kind;
mod path;

pub use kind::{ElementKind, GestureKind};
pub use path::{PathId, PathSpace, SingularTransform, VectorPath, reexpress};
