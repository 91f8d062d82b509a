// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The vector path type and its two-space transform primitives.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use kurbo::{Affine, BezPath, Circle, Point, Rect, Shape};

use crate::kind::{ElementKind, GestureKind};

/// Stable identity of a [`VectorPath`], unique within the process.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PathId(u64);

static NEXT_PATH_ID: AtomicU64 = AtomicU64::new(1);

impl PathId {
    fn next() -> Self {
        Self(NEXT_PATH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which canvas transform space a path's geometry is currently expressed in.
///
/// The canvas keeps two independent transforms: the last-committed one (used
/// for everything not selected) and the live one (manipulated by the ongoing
/// gesture). A path is re-expressed between the two when its highlight state
/// toggles; see [`VectorPath::apply_transformation`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathSpace {
    /// Geometry is expressed relative to the committed (backup) transform.
    #[default]
    Committed,
    /// Geometry is expressed relative to the live (active) transform.
    Active,
}

/// Error returned when a space switch would require inverting a singular
/// transform.
///
/// The operation fails before any geometry is touched, so the path is left
/// exactly as it was; the caller should abandon the current frame's switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingularTransform;

impl fmt::Display for SingularTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transform matrix is singular and cannot be inverted")
    }
}

impl std::error::Error for SingularTransform {}

fn checked_inverse(affine: Affine) -> Result<Affine, SingularTransform> {
    let det = affine.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(SingularTransform);
    }
    Ok(affine.inverse())
}

/// Re-express vertices from one transform space into another.
///
/// `from` is the transform of the space the vertices are currently expressed
/// in, `to` the transform of the target space. Each vertex `v` maps to
/// `to⁻¹ · from · v`, so the on-screen position under the target transform
/// equals the old position under the source transform.
///
/// This is a pure function of its inputs; it does not depend on any prior
/// call having happened.
pub fn reexpress(
    vertices: &[Point],
    from: Affine,
    to: Affine,
) -> Result<Vec<Point>, SingularTransform> {
    let compose = checked_inverse(to)? * from;
    Ok(vertices.iter().map(|&v| compose * v).collect())
}

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box.
fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

/// Flattening tolerance used when appending circles to the Bézier path.
const CIRCLE_TOLERANCE: f64 = 0.1;

/// Default path color (opaque red, ARGB).
const DEFAULT_COLOR: u32 = 0xFF_FF_00_00;

/// An ordered polyline/curve with a synchronized vertex list and running
/// bounding-box extrema.
///
/// The vertex list and the Bézier representation always describe the same
/// geometry: every mutating method updates both. The extrema bound every
/// vertex of the *current* list; after [`VectorPath::transform`] they may be
/// loose (the old bounding box's corners are mapped instead of recomputing
/// from all vertices), but they are never unsound.
#[derive(Clone, Debug)]
pub struct VectorPath {
    uid: PathId,
    vertices: Vec<Point>,
    original_vertices: Vec<Point>,
    bez: BezPath,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    highlighted: bool,
    visible: bool,
    color: u32,
    kind: ElementKind,
    gesture: GestureKind,
    space: PathSpace,
}

impl Default for VectorPath {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorPath {
    /// Create an empty path with a fresh [`PathId`].
    pub fn new() -> Self {
        Self {
            uid: PathId::next(),
            vertices: Vec::new(),
            original_vertices: Vec::new(),
            bez: BezPath::new(),
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            highlighted: false,
            visible: true,
            color: DEFAULT_COLOR,
            kind: ElementKind::None,
            gesture: GestureKind::NoGesture,
            space: PathSpace::Committed,
        }
    }

    /// The stable identity of this path.
    pub fn uid(&self) -> PathId {
        self.uid
    }

    fn widen_extrema(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    fn recompute_extrema(&mut self) {
        self.min_x = f64::INFINITY;
        self.min_y = f64::INFINITY;
        self.max_x = f64::NEG_INFINITY;
        self.max_y = f64::NEG_INFINITY;
        let verts = core::mem::take(&mut self.vertices);
        for &v in &verts {
            self.widen_extrema(v);
        }
        self.vertices = verts;
    }

    /// Start a new subpath at `p`, appending the vertex to both vertex lists.
    pub fn move_to(&mut self, p: Point) {
        self.vertices.push(p);
        self.original_vertices.push(p);
        self.widen_extrema(p);
        self.bez.move_to(p);
    }

    /// Append a line segment to `p`, appending the vertex to both lists.
    pub fn line_to(&mut self, p: Point) {
        self.vertices.push(p);
        self.original_vertices.push(p);
        self.widen_extrema(p);
        self.bez.line_to(p);
    }

    /// Append a circle centered at `center`.
    ///
    /// Records the center and the west/south/south/east anchors as vertices
    /// (the anchor set hit scoring expects for bullet shapes) and widens the
    /// extrema by all four cardinal points.
    pub fn add_circle(&mut self, center: Point, radius: f64) {
        let anchors = [
            center,
            Point::new(center.x - radius, center.y),
            Point::new(center.x, center.y + radius),
            Point::new(center.x, center.y + radius),
            Point::new(center.x + radius, center.y),
        ];
        for a in anchors {
            self.vertices.push(a);
            self.original_vertices.push(a);
        }
        self.widen_extrema(center);
        self.widen_extrema(Point::new(center.x - radius, center.y));
        self.widen_extrema(Point::new(center.x + radius, center.y));
        self.widen_extrema(Point::new(center.x, center.y - radius));
        self.widen_extrema(Point::new(center.x, center.y + radius));
        self.bez
            .extend(Circle::new(center, radius).path_elements(CIRCLE_TOLERANCE));
    }

    /// Close the current subpath.
    pub fn close(&mut self) {
        self.bez.close_path();
    }

    /// Clear both vertex lists, the Bézier path, and the extrema.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.original_vertices.clear();
        self.bez = BezPath::new();
        self.min_x = f64::INFINITY;
        self.min_y = f64::INFINITY;
        self.max_x = f64::NEG_INFINITY;
        self.max_y = f64::NEG_INFINITY;
    }

    /// Apply an affine transform to the whole path.
    ///
    /// Vertices and the Bézier path are mapped exactly; the extrema are
    /// updated by mapping the old bounding box through the same transform,
    /// which keeps them sound but possibly loose under rotation or shear.
    pub fn transform(&mut self, affine: Affine) {
        if let Some(bounds) = self.bounds() {
            let mapped = transform_rect_bbox(affine, bounds);
            self.min_x = mapped.x0;
            self.min_y = mapped.y0;
            self.max_x = mapped.x1;
            self.max_y = mapped.y1;
        }
        for v in &mut self.vertices {
            *v = affine * *v;
        }
        self.bez.apply_affine(affine);
    }

    /// Map the current vertex list (only) by `affine` and recompute tight
    /// extrema.
    ///
    /// Used once when a path is attached to a scene node whose stored
    /// transform expresses the path in canvas space; the Bézier path stays in
    /// its local space and is rendered through the node's transform.
    pub fn map_vertices(&mut self, affine: Affine) {
        for v in &mut self.vertices {
            *v = affine * *v;
        }
        self.recompute_extrema();
    }

    /// Switch the path from one transform space into another.
    ///
    /// `from` is the transform of the space the geometry is currently
    /// expressed in, `to` the transform of the space it is entering. Both the
    /// vertex list and the Bézier path are re-expressed; extrema are
    /// recomputed tight from the new vertices.
    ///
    /// Fails without touching any state if `to` is singular.
    pub fn apply_transformation(
        &mut self,
        from: Affine,
        to: Affine,
    ) -> Result<(), SingularTransform> {
        let to_inverse = checked_inverse(to)?;
        self.vertices = reexpress(&self.vertices, from, to)?;
        self.bez.apply_affine(to_inverse * from);
        self.recompute_extrema();
        Ok(())
    }

    /// Rebuild the Bézier path from the stored vertex list as a polyline.
    ///
    /// The geometric representation does not survive serialization; callers
    /// run this over every path after deserializing a scene.
    pub fn rebuild_geometry(&mut self) {
        self.bez = BezPath::new();
        let mut first = true;
        for &v in &self.vertices {
            if first {
                self.bez.move_to(v);
                first = false;
            } else {
                self.bez.line_to(v);
            }
        }
    }

    /// Rebuild the Bézier path as a property-relation bullet: a circle at the
    /// first vertex plus a label tab extending to the right.
    ///
    /// Leaves the path untouched if there are no vertices.
    pub fn rebuild_bullet(&mut self, radius: f64) {
        let Some(&center) = self.vertices.first() else {
            return;
        };
        self.bez = BezPath::new();
        self.bez.move_to(center);
        self.bez
            .extend(Circle::new(center, radius).path_elements(CIRCLE_TOLERANCE));
        let tab_origin = Point::new(center.x, center.y - radius);
        self.bez
            .move_to(Point::new(tab_origin.x - 0.2 * radius, tab_origin.y));
        self.bez
            .line_to(Point::new(tab_origin.x + 7.0 * radius, tab_origin.y));
        self.bez.line_to(Point::new(
            tab_origin.x + 7.0 * radius,
            tab_origin.y + 2.0 * radius,
        ));
        self.bez.line_to(Point::new(
            tab_origin.x - 0.2 * radius,
            tab_origin.y + 2.0 * radius,
        ));
        self.bez.close_path();
    }

    /// The current vertex list.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// The unmodified vertex list as originally drawn.
    pub fn original_vertices(&self) -> &[Point] {
        &self.original_vertices
    }

    /// Replace the current vertex list; extrema are recomputed tight.
    pub fn set_vertices(&mut self, vertices: Vec<Point>) {
        self.vertices = vertices;
        self.recompute_extrema();
    }

    /// The geometric path a renderer strokes.
    pub fn bez_path(&self) -> &BezPath {
        &self.bez
    }

    /// Tight (or post-[`transform`](Self::transform) loose) bounds of the
    /// current vertex list, or `None` for an empty path.
    pub fn bounds(&self) -> Option<Rect> {
        if self.vertices.is_empty() {
            return None;
        }
        Some(Rect::new(self.min_x, self.min_y, self.max_x, self.max_y))
    }

    /// Center of the path bounds, or `None` for an empty path.
    pub fn center(&self) -> Option<Point> {
        self.bounds().map(|b| b.center())
    }

    /// Running extrema as `(min_x, min_y, max_x, max_y)`.
    pub fn extrema(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Whether the path is currently highlighted (selected).
    pub fn highlighted(&self) -> bool {
        self.highlighted
    }

    /// Set the highlight flag.
    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    /// Whether the path should be drawn.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Set the visibility flag.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Path color, ARGB.
    pub fn color(&self) -> u32 {
        self.color
    }

    /// Set the path color, ARGB.
    pub fn set_color(&mut self, color: u32) {
        self.color = color;
    }

    /// Ontology element kind of this path.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Set the ontology element kind.
    pub fn set_kind(&mut self, kind: ElementKind) {
        self.kind = kind;
    }

    /// Recognizer classification of this path.
    pub fn gesture(&self) -> GestureKind {
        self.gesture
    }

    /// Set the recognizer classification.
    pub fn set_gesture(&mut self, gesture: GestureKind) {
        self.gesture = gesture;
    }

    /// The transform space the geometry is currently expressed in.
    pub fn space(&self) -> PathSpace {
        self.space
    }

    /// Record the transform space the geometry is expressed in.
    pub fn set_space(&mut self, space: PathSpace) {
        self.space = space;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a - b).hypot() < 1e-9,
            "points differ: {a:?} vs {b:?}"
        );
    }

    fn sample_path() -> VectorPath {
        let mut p = VectorPath::new();
        p.move_to(Point::new(10.0, 10.0));
        p.line_to(Point::new(30.0, 15.0));
        p.line_to(Point::new(20.0, 40.0));
        p
    }

    #[test]
    fn extrema_track_vertices() {
        let p = sample_path();
        assert_eq!(p.bounds(), Some(Rect::new(10.0, 10.0, 30.0, 40.0)));
    }

    #[test]
    fn extrema_bound_vertices_after_transform() {
        let mut p = sample_path();
        p.transform(Affine::rotate(0.7) * Affine::scale(1.5));
        let b = p.bounds().unwrap();
        for &v in p.vertices() {
            assert!(v.x >= b.x0 - 1e-9 && v.x <= b.x1 + 1e-9);
            assert!(v.y >= b.y0 - 1e-9 && v.y <= b.y1 + 1e-9);
        }
    }

    #[test]
    fn original_vertices_untouched_by_transform() {
        let mut p = sample_path();
        let before: Vec<Point> = p.original_vertices().to_vec();
        p.transform(Affine::translate(Vec2::new(100.0, -50.0)));
        assert_eq!(p.original_vertices(), &before[..]);
        assert_close(p.vertices()[0], Point::new(110.0, -40.0));
    }

    #[test]
    fn add_circle_widens_extrema_by_cardinals() {
        let mut p = VectorPath::new();
        p.add_circle(Point::new(0.0, 0.0), 5.0);
        assert_eq!(p.bounds(), Some(Rect::new(-5.0, -5.0, 5.0, 5.0)));
        // center + 4 anchors
        assert_eq!(p.vertices().len(), 5);
    }

    #[test]
    fn reset_clears_everything() {
        let mut p = sample_path();
        p.reset();
        assert!(p.vertices().is_empty());
        assert!(p.original_vertices().is_empty());
        assert!(p.bounds().is_none());
        assert_eq!(p.bez_path().elements().len(), 0);
    }

    #[test]
    fn reexpress_round_trip_restores_vertices() {
        let active = Affine::translate(Vec2::new(40.0, 7.0)) * Affine::scale(2.0);
        let backup = Affine::translate(Vec2::new(-3.0, 12.0)) * Affine::scale(0.5);
        let mut p = sample_path();
        let before: Vec<Point> = p.vertices().to_vec();
        p.apply_transformation(backup, active).unwrap();
        p.apply_transformation(active, backup).unwrap();
        for (a, b) in p.vertices().iter().zip(&before) {
            assert_close(*a, *b);
        }
    }

    #[test]
    fn apply_transformation_preserves_screen_position() {
        // A vertex rendered through `backup` before the switch must land at
        // the same screen point rendered through `active` after it.
        let active = Affine::scale(3.0) * Affine::translate(Vec2::new(5.0, 5.0));
        let backup = Affine::translate(Vec2::new(10.0, 0.0));
        let mut p = sample_path();
        let screen_before: Vec<Point> = p.vertices().iter().map(|&v| backup * v).collect();
        p.apply_transformation(backup, active).unwrap();
        for (v, s) in p.vertices().iter().zip(&screen_before) {
            assert_close(active * *v, *s);
        }
    }

    #[test]
    fn singular_target_fails_without_mutation() {
        let mut p = sample_path();
        let before: Vec<Point> = p.vertices().to_vec();
        let singular = Affine::scale(0.0);
        assert_eq!(
            p.apply_transformation(Affine::IDENTITY, singular),
            Err(SingularTransform)
        );
        assert_eq!(p.vertices(), &before[..]);
    }

    #[test]
    fn rebuild_geometry_matches_vertex_polyline() {
        let mut p = sample_path();
        p.transform(Affine::scale(2.0));
        p.rebuild_geometry();
        let b = p.bez_path().bounding_box();
        let vb = p.bounds().unwrap();
        assert!((b.x0 - vb.x0).abs() < 1e-9 && (b.y1 - vb.y1).abs() < 1e-9);
    }

    #[test]
    fn path_ids_are_unique() {
        let a = VectorPath::new();
        let b = VectorPath::new();
        assert_ne!(a.uid(), b.uid());
    }
}
