// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Relation edges: creation, endpoint registration, bearings, and queries.
//!
//! An edge is an ordinary tree node of a relation [`NodeKind`] carrying
//! [`RelationEnds`]; both endpoints keep the edge's id in their incident
//! list, so either side can enumerate its edges without a graph scan.

use core::fmt;

use inkscene_path::VectorPath;
use kurbo::{Affine, Point};
use log::debug;

use crate::types::{NodeId, NodeKind, RelationEnds};
use crate::Tree;

/// Failure to create or update a relation edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationError {
    /// An endpoint id no longer resolves to a live node.
    StaleEndpoint(NodeId),
    /// The node is not a relation edge (or carries no endpoint data).
    NotARelation(NodeId),
}

impl fmt::Display for RelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleEndpoint(id) => write!(f, "relation endpoint {id:?} is not alive"),
            Self::NotARelation(id) => write!(f, "node {id:?} carries no relation endpoints"),
        }
    }
}

impl std::error::Error for RelationError {}

/// Bearing from `from` to `to` in degrees, `[0, 360)`.
///
/// `0` points straight up (negative y), `90` right, `180` down, `270` left.
fn bearing(from: Point, to: Point) -> f64 {
    let d = to - from;
    let degrees = d.x.atan2(-d.y).to_degrees();
    if degrees < 0.0 { degrees + 360.0 } else { degrees }
}

impl Tree {
    /// Create a relation edge between two live nodes.
    ///
    /// The edge's endpoint centers and bearing are captured from the current
    /// geometry, and the edge registers itself with both endpoints. The edge
    /// is detached; place it with [`Tree::add_component`] so it renders
    /// beneath the shapes it connects.
    pub fn add_relation(
        &mut self,
        kind: NodeKind,
        path: VectorPath,
        transform: Affine,
        start: NodeId,
        end: NodeId,
    ) -> Result<NodeId, RelationError> {
        if !self.is_alive(start) {
            return Err(RelationError::StaleEndpoint(start));
        }
        if !self.is_alive(end) {
            return Err(RelationError::StaleEndpoint(end));
        }
        let start_point = self.center_of(start).unwrap_or_default();
        let end_point = self.center_of(end).unwrap_or_default();
        let edge = self.insert(kind, Some(path), transform);
        self.node_mut(edge).ends = Some(RelationEnds {
            start,
            end,
            start_point,
            end_point,
            angle: bearing(start_point, end_point),
        });
        self.node_mut(start).relations.push(edge);
        if end != start {
            self.node_mut(end).relations.push(edge);
        }
        debug!("add_relation: edge registered with both endpoints");
        Ok(edge)
    }

    /// Create the tappable button edge belonging to a formalized property
    /// relation, inheriting the parent edge's endpoints and bearing.
    pub fn add_button_relation(
        &mut self,
        path: VectorPath,
        transform: Affine,
        parent_edge: NodeId,
    ) -> Result<NodeId, RelationError> {
        let Some(ends) = self
            .node_opt_mut(parent_edge)
            .and_then(|n| n.ends.clone())
        else {
            return Err(RelationError::NotARelation(parent_edge));
        };
        if !self.is_alive(ends.start) {
            return Err(RelationError::StaleEndpoint(ends.start));
        }
        if !self.is_alive(ends.end) {
            return Err(RelationError::StaleEndpoint(ends.end));
        }
        let edge = self.insert(NodeKind::FormalizedPropertyRelationButton, Some(path), transform);
        self.node_mut(edge).ends = Some(ends.clone());
        self.node_mut(ends.start).relations.push(edge);
        if ends.end != ends.start {
            self.node_mut(ends.end).relations.push(edge);
        }
        Ok(edge)
    }

    /// Remove every edge incident to `id` from the tree, deregistering each
    /// from its other endpoint as well.
    ///
    /// The node itself stays alive; this is the "strip relations" action, not
    /// a removal.
    pub fn remove_references(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let incident: Vec<NodeId> = self.node(id).relations.to_vec();
        for edge in incident {
            if self.is_alive(edge) {
                self.remove_component(edge);
            }
        }
        if let Some(n) = self.node_opt_mut(id) {
            n.relations.clear();
        }
        self.invalidate();
    }

    /// Edges incident to `id`, in registration order.
    pub fn relations_of(&self, id: NodeId) -> &[NodeId] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).relations
    }

    /// Whether any edge is registered with `id`.
    pub fn has_relations(&self, id: NodeId) -> bool {
        !self.relations_of(id).is_empty()
    }

    /// The endpoint data of a relation edge.
    pub fn relation_ends(&self, edge: NodeId) -> Option<&RelationEnds> {
        if !self.is_alive(edge) {
            return None;
        }
        self.node(edge).ends.as_ref()
    }

    /// Start and end node of a relation edge.
    pub fn endpoints_of(&self, edge: NodeId) -> Option<(NodeId, NodeId)> {
        self.relation_ends(edge).map(|e| (e.start, e.end))
    }

    /// Bearing of a relation edge in degrees, `[0, 360)`.
    pub fn angle_of(&self, edge: NodeId) -> Option<f64> {
        self.relation_ends(edge).map(|e| e.angle)
    }

    /// Update the cached start point of an edge; the bearing is recomputed
    /// from the stored points afterwards.
    pub fn set_start_point(&mut self, edge: NodeId, point: Point) -> Result<(), RelationError> {
        let Some(ends) = self.node_opt_mut(edge).and_then(|n| n.ends.as_mut()) else {
            return Err(RelationError::NotARelation(edge));
        };
        ends.start_point = point;
        ends.angle = bearing(ends.start_point, ends.end_point);
        self.invalidate();
        Ok(())
    }

    /// Update the cached end point of an edge; the bearing is recomputed
    /// from the stored points afterwards.
    pub fn set_end_point(&mut self, edge: NodeId, point: Point) -> Result<(), RelationError> {
        let Some(ends) = self.node_opt_mut(edge).and_then(|n| n.ends.as_mut()) else {
            return Err(RelationError::NotARelation(edge));
        };
        ends.end_point = point;
        ends.angle = bearing(ends.start_point, ends.end_point);
        self.invalidate();
        Ok(())
    }

    /// Number of edges connecting `a` and `b`, in either direction.
    pub fn pair_relation_count(&self, a: NodeId, b: NodeId) -> usize {
        self.relations_of(a)
            .iter()
            .filter(|&&edge| {
                self.relation_ends(edge).is_some_and(|e| {
                    (e.start == a && e.end == b) || (e.start == b && e.end == a)
                })
            })
            .count()
    }

    /// Number of edges connecting `id` to itself.
    pub fn self_relation_count(&self, id: NodeId) -> usize {
        self.relations_of(id)
            .iter()
            .filter(|&&edge| {
                self.relation_ends(edge)
                    .is_some_and(|e| e.is_self_relation() && e.start == id)
            })
            .count()
    }

    /// Whether `id` has an edge whose opposite endpoint carries the given
    /// ontology identity (ASCII case-insensitive).
    pub fn contains_relation(&self, id: NodeId, uri: &str) -> bool {
        self.relations_of(id).iter().any(|&edge| {
            let Some(ends) = self.relation_ends(edge) else {
                return false;
            };
            let other = if ends.start == id { ends.end } else { ends.start };
            self.uri(other)
                .is_some_and(|u| u.eq_ignore_ascii_case(uri))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    fn rect_path(r: Rect) -> VectorPath {
        let mut p = VectorPath::new();
        p.move_to(Point::new(r.x0, r.y0));
        p.line_to(Point::new(r.x1, r.y0));
        p.line_to(Point::new(r.x1, r.y1));
        p.line_to(Point::new(r.x0, r.y1));
        p
    }

    fn shape_at(tree: &mut Tree, center: Point) -> NodeId {
        let r = Rect::new(center.x - 1.0, center.y - 1.0, center.x + 1.0, center.y + 1.0);
        let id = tree.insert(NodeKind::Leaf, Some(rect_path(r)), Affine::IDENTITY);
        tree.add_component(id);
        id
    }

    fn edge_between(tree: &mut Tree, a: NodeId, b: NodeId) -> NodeId {
        let edge = tree
            .add_relation(
                NodeKind::SubclassRelation,
                rect_path(Rect::new(0.0, 0.0, 1.0, 1.0)),
                Affine::IDENTITY,
                a,
                b,
            )
            .unwrap();
        tree.add_component(edge);
        edge
    }

    #[test]
    fn bearing_resolves_quadrants() {
        let o = Point::ZERO;
        assert!((bearing(o, Point::new(0.0, -1.0)) - 0.0).abs() < 1e-12);
        assert!((bearing(o, Point::new(1.0, -1.0)) - 45.0).abs() < 1e-12);
        assert!((bearing(o, Point::new(1.0, 1.0)) - 135.0).abs() < 1e-12);
        assert!((bearing(o, Point::new(-1.0, 1.0)) - 225.0).abs() < 1e-12);
        assert!((bearing(o, Point::new(-1.0, -1.0)) - 315.0).abs() < 1e-12);
    }

    #[test]
    fn edge_registers_with_both_endpoints() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        let edge = edge_between(&mut tree, a, b);

        assert_eq!(tree.relations_of(a), &[edge]);
        assert_eq!(tree.relations_of(b), &[edge]);
        assert_eq!(tree.endpoints_of(edge), Some((a, b)));
        assert!((tree.angle_of(edge).unwrap() - 90.0).abs() < 1e-12);
    }

    #[test]
    fn stale_endpoint_is_rejected() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        tree.remove_component(b);
        let err = tree.add_relation(
            NodeKind::SubclassRelation,
            rect_path(Rect::new(0.0, 0.0, 1.0, 1.0)),
            Affine::IDENTITY,
            a,
            b,
        );
        assert_eq!(err.unwrap_err(), RelationError::StaleEndpoint(b));
        assert!(tree.relations_of(a).is_empty());
    }

    #[test]
    fn endpoint_removal_takes_edges_along() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        let edge = edge_between(&mut tree, a, b);

        tree.remove_component(a);
        assert!(!tree.is_alive(edge), "incident edges leave with the node");
        assert!(tree.relations_of(b).is_empty(), "survivor holds no stale ids");
    }

    #[test]
    fn pair_and_self_counts() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        let e1 = edge_between(&mut tree, a, b);
        edge_between(&mut tree, b, a);
        edge_between(&mut tree, a, a);

        assert_eq!(tree.pair_relation_count(a, b), 2);
        assert_eq!(tree.self_relation_count(a), 1);
        assert_eq!(tree.self_relation_count(b), 0);

        tree.remove_component(e1);
        assert_eq!(tree.pair_relation_count(a, b), 1);
    }

    #[test]
    fn remove_references_strips_but_keeps_node() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        let edge = edge_between(&mut tree, a, b);

        tree.remove_references(a);
        assert!(tree.is_alive(a));
        assert!(!tree.is_alive(edge));
        assert!(!tree.has_relations(a));
        assert!(!tree.has_relations(b));
    }

    #[test]
    fn endpoint_moves_recompute_bearing() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(0.0, -10.0));
        let edge = edge_between(&mut tree, a, b);
        assert!((tree.angle_of(edge).unwrap() - 0.0).abs() < 1e-12);

        tree.set_end_point(edge, Point::new(10.0, 0.0)).unwrap();
        assert!((tree.angle_of(edge).unwrap() - 90.0).abs() < 1e-12);
        tree.set_start_point(edge, Point::new(20.0, 0.0)).unwrap();
        assert!((tree.angle_of(edge).unwrap() - 270.0).abs() < 1e-12);
    }

    #[test]
    fn button_inherits_parent_geometry() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 10.0));
        let edge = tree
            .add_relation(
                NodeKind::FormalizedPropertyRelation,
                rect_path(Rect::new(0.0, 0.0, 1.0, 1.0)),
                Affine::IDENTITY,
                a,
                b,
            )
            .unwrap();
        tree.add_component(edge);

        let button = tree
            .add_button_relation(
                rect_path(Rect::new(4.0, 4.0, 6.0, 6.0)),
                Affine::IDENTITY,
                edge,
            )
            .unwrap();
        assert_eq!(tree.endpoints_of(button), Some((a, b)));
        assert_eq!(tree.angle_of(button), tree.angle_of(edge));
        assert_eq!(tree.relations_of(a).len(), 2);
    }

    #[test]
    fn contains_relation_matches_uri_case_insensitively() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        let b = shape_at(&mut tree, Point::new(10.0, 0.0));
        tree.set_uri(b, "http://example.org/Onto#Animal");
        edge_between(&mut tree, a, b);

        assert!(tree.contains_relation(a, "http://example.org/onto#animal"));
        assert!(!tree.contains_relation(a, "http://example.org/onto#plant"));
    }

    #[test]
    fn plain_node_is_not_a_relation() {
        let mut tree = Tree::new();
        let a = shape_at(&mut tree, Point::new(0.0, 0.0));
        assert_eq!(
            tree.set_start_point(a, Point::ZERO),
            Err(RelationError::NotARelation(a))
        );
        assert_eq!(tree.angle_of(a), None);
    }
}
