// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Rect;

/// Whether `outer` contains `inner` entirely, edges inclusive.
///
/// An empty `outer` contains nothing; an empty `inner` is contained by
/// nothing (a bound-less node falls through to the root, which performs no
/// bounds check at all).
pub(crate) fn rect_contains(outer: Rect, inner: Rect) -> bool {
    if outer.width() <= 0.0 || outer.height() <= 0.0 {
        return false;
    }
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Whether two rectangles overlap, edges inclusive.
pub(crate) fn rects_intersect(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Union of two optional rectangles.
pub(crate) fn union_opt(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
