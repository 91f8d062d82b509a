// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: arena, containment insertion, removal, and the
//! dual-transform highlight protocol.

use hashbrown::HashMap;
use inkscene_path::{ElementKind, PathId, PathSpace, SingularTransform, VectorPath};
use kurbo::{Affine, Point, Rect};
use log::debug;
use smallvec::SmallVec;

use crate::render_list::{RenderEntry, RenderList};
use crate::types::{DisplayState, NodeFlags, NodeId, NodeKind, RelationEnds};
use crate::util::{rect_contains, rects_intersect, union_opt};

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Side queue for children a composite refused; drained by the nearest
    /// ancestor whose bounds do contain them.
    pub(crate) pending: Vec<NodeId>,
    pub(crate) path: Option<VectorPath>,
    pub(crate) path_transform: Affine,
    pub(crate) flags: NodeFlags,
    pub(crate) alpha: u8,
    pub(crate) display_state: DisplayState,
    pub(crate) uri: String,
    /// Edges that name this node as start or end.
    pub(crate) relations: SmallVec<[NodeId; 4]>,
    /// Endpoint data, present exactly on relation-edge nodes.
    pub(crate) ends: Option<RelationEnds>,
}

impl Node {
    fn new(generation: u32, kind: NodeKind, path: Option<VectorPath>, transform: Affine) -> Self {
        Self {
            generation,
            kind,
            parent: None,
            children: Vec::new(),
            pending: Vec::new(),
            path,
            path_transform: transform,
            flags: NodeFlags::empty(),
            alpha: 255,
            display_state: DisplayState::None,
            uri: String::new(),
            relations: SmallVec::new(),
            ends: None,
        }
    }
}

/// The retained-mode scene tree.
///
/// Nodes live in an arena of generational slots; `parent`, `children`, and
/// relation endpoints are [`NodeId`]s into the same arena, so back-references
/// never dangle into freed memory — a stale id simply stops resolving.
///
/// Structural mutations mark the tree changed; the flattened
/// [`RenderList`] is rebuilt on the next [`Tree::render_list`] call and
/// cached until the next mutation. Call sites cannot forget the dirty flag:
/// it is set inside the arena's own mutation paths.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    changed: bool,
    render_cache: RenderList,
    by_path: HashMap<PathId, NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree containing only the pathless root composite.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            changed: true,
            render_cache: RenderList::default(),
            by_path: HashMap::new(),
        };
        tree.root = tree.alloc(NodeKind::Root, None, Affine::IDENTITY);
        tree
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    // --- arena internals ---

    #[allow(
        clippy::cast_possible_truncation,
        reason = "NodeId uses 32-bit indices by design."
    )]
    fn alloc(&mut self, kind: NodeKind, path: Option<VectorPath>, transform: Affine) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind, path, transform));
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes
                .push(Some(Node::new(generation, kind, path, transform)));
            self.generations.push(generation);
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(uid) = self.nodes[id.idx()]
            .as_ref()
            .and_then(|n| n.path.as_ref())
            .map(VectorPath::uid)
        {
            self.by_path.insert(uid, id);
        }
        self.changed = true;
        id
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    pub(crate) fn invalidate(&mut self) {
        self.changed = true;
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "NodeId uses 32-bit indices by design."
    )]
    fn iter_alive(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .map(|n| NodeId::new(i as u32, n.generation))
        })
    }

    // --- node creation ---

    /// Create a detached node.
    ///
    /// If a path is supplied, its vertex list is mapped once by `transform`
    /// into canvas space (the Bézier form stays local and is rendered through
    /// the node's stored transform) and its highlight is cleared. The node is
    /// not part of the tree until [`Tree::add_component`] places it.
    pub fn insert(
        &mut self,
        kind: NodeKind,
        path: Option<VectorPath>,
        transform: Affine,
    ) -> NodeId {
        let path = path.map(|mut p| {
            p.map_vertices(transform);
            p.set_highlighted(false);
            p.set_space(PathSpace::Committed);
            p
        });
        self.alloc(kind, path, transform)
    }

    /// Create a group node owning `members`.
    ///
    /// Each member is re-parented under the group and marked grouped
    /// (composite words mark their letters too). The group itself still has
    /// to be placed with [`Tree::add_component`].
    pub fn make_group(
        &mut self,
        members: &[NodeId],
        path: Option<VectorPath>,
        transform: Affine,
    ) -> NodeId {
        let group = self.insert(NodeKind::Group, path, transform);
        for &m in members {
            if !self.is_alive(m) {
                continue;
            }
            self.set_grouped(m, true);
            self.attach(group, m);
        }
        group
    }

    // --- accessors ---

    /// Kind of a live node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).kind)
    }

    /// Parent of a live node, or `None` for the root, detached nodes, and
    /// stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        self.node(id).parent
    }

    /// Children of a node, or an empty slice for stale ids.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).children
    }

    /// The node's path, if it has one.
    pub fn path(&self, id: NodeId) -> Option<&VectorPath> {
        if !self.is_alive(id) {
            return None;
        }
        self.node(id).path.as_ref()
    }

    /// Mutable access to the node's path.
    pub fn path_mut(&mut self, id: NodeId) -> Option<&mut VectorPath> {
        if !self.is_alive(id) {
            return None;
        }
        self.node_mut(id).path.as_mut()
    }

    /// The per-path transform the renderer draws the node's path under.
    pub fn path_transform(&self, id: NodeId) -> Option<Affine> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).path_transform)
    }

    /// Replace the node's stored path transform.
    pub fn set_path_transform(&mut self, id: NodeId, transform: Affine) {
        if let Some(n) = self.node_opt_mut(id) {
            n.path_transform = transform;
            self.changed = true;
        }
    }

    /// Alpha value previously supplied by the caller's blend policy.
    pub fn alpha(&self, id: NodeId) -> Option<u8> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).alpha)
    }

    /// Store the alpha the caller's blend policy computed for this node.
    pub fn set_alpha(&mut self, id: NodeId, alpha: u8) {
        if let Some(n) = self.node_opt_mut(id) {
            n.alpha = alpha;
        }
    }

    /// Display classification of a live node.
    pub fn display_state(&self, id: NodeId) -> Option<DisplayState> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).display_state)
    }

    /// Set the display classification.
    pub fn set_display_state(&mut self, id: NodeId, state: DisplayState) {
        if let Some(n) = self.node_opt_mut(id) {
            n.display_state = state;
        }
    }

    /// Opaque ontology identity of a live node.
    pub fn uri(&self, id: NodeId) -> Option<&str> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).uri.as_str())
    }

    /// Set the opaque ontology identity.
    pub fn set_uri(&mut self, id: NodeId, uri: impl Into<String>) {
        let uri = uri.into();
        if let Some(n) = self.node_opt_mut(id) {
            n.uri = uri;
        }
    }

    /// Whether the node is highlighted (selected).
    pub fn is_highlighted(&self, id: NodeId) -> bool {
        self.is_alive(id) && self.node(id).flags.contains(NodeFlags::HIGHLIGHTED)
    }

    /// Whether the node is a group member.
    pub fn is_grouped(&self, id: NodeId) -> bool {
        self.is_alive(id) && self.node(id).flags.contains(NodeFlags::GROUPED)
    }

    /// Set or clear the grouped flag; composite words propagate to their
    /// letters.
    pub fn set_grouped(&mut self, id: NodeId, grouped: bool) {
        if !self.is_alive(id) {
            return;
        }
        self.node_mut(id).flags.set(NodeFlags::GROUPED, grouped);
        if self.node(id).kind == NodeKind::CompositeWord {
            for child in self.node(id).children.clone() {
                self.set_grouped(child, grouped);
            }
        }
    }

    /// Resolve the node owning the path with the given id.
    pub fn node_by_path(&self, path: PathId) -> Option<NodeId> {
        self.by_path.get(&path).copied().filter(|&id| self.is_alive(id))
    }

    // --- bounds ---

    /// Bounds of the node's own path, ignoring children.
    fn own_bounds(&self, id: NodeId) -> Option<Rect> {
        self.node(id).path.as_ref().and_then(VectorPath::bounds)
    }

    /// Bounds used for containment tests.
    ///
    /// Composite words and groups have no meaningful box of their own; their
    /// bounds are the union of their descendants' boxes. Everything else uses
    /// its path extrema, falling back to the child union for pathless nodes.
    pub fn bounds_of(&self, id: NodeId) -> Option<Rect> {
        if !self.is_alive(id) {
            return None;
        }
        let node = self.node(id);
        match node.kind {
            NodeKind::CompositeWord | NodeKind::Group => self.child_union_bounds(id),
            _ => self.own_bounds(id).or_else(|| self.child_union_bounds(id)),
        }
    }

    fn child_union_bounds(&self, id: NodeId) -> Option<Rect> {
        let mut acc = None;
        for &child in &self.node(id).children {
            acc = union_opt(acc, self.bounds_of(child));
        }
        acc
    }

    /// Center of the node's containment bounds.
    pub fn center_of(&self, id: NodeId) -> Option<Point> {
        self.bounds_of(id).map(|b| b.center())
    }

    // --- structural links ---

    /// Attach `comp` as a child of `host`, unlinking it from any previous
    /// parent. Relation edges are inserted at the boundary between the
    /// leading edge block and the first shape child so they draw beneath
    /// shapes.
    fn attach(&mut self, host: NodeId, comp: NodeId) {
        if let Some(old) = self.node(comp).parent {
            if let Some(n) = self.node_opt_mut(old) {
                n.children.retain(|c| *c != comp);
            }
        }
        let is_relation = self.node(comp).kind.is_relation();
        if is_relation {
            let at = self.first_shape_index(host);
            self.node_mut(host).children.insert(at, comp);
        } else {
            self.node_mut(host).children.push(comp);
        }
        self.node_mut(comp).parent = Some(host);
        self.changed = true;
    }

    /// Index of the first non-relation child of `host`.
    fn first_shape_index(&self, host: NodeId) -> usize {
        let children = &self.node(host).children;
        children
            .iter()
            .position(|&c| !self.node(c).kind.is_relation())
            .unwrap_or(children.len())
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            if let Some(n) = self.node_opt_mut(parent) {
                n.children.retain(|c| *c != id);
            }
            self.node_mut(id).parent = None;
            self.changed = true;
        }
    }

    /// Move the node to the end of its parent's child list so it draws above
    /// its siblings.
    pub fn bring_to_front(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            let n = self.node_mut(parent);
            n.children.retain(|c| *c != id);
            n.children.push(id);
            self.changed = true;
        }
    }

    // --- containment-based insertion ---

    /// Place a detached (or re-placed) node into the tree by bounding-box
    /// containment, starting at the root.
    ///
    /// A grouped node bypasses the containment search entirely and is
    /// appended to its already-known parent.
    pub fn add_component(&mut self, comp: NodeId) {
        if !self.is_alive(comp) || comp == self.root {
            return;
        }
        if self.node(comp).flags.contains(NodeFlags::GROUPED) {
            if let Some(parent) = self.node(comp).parent {
                debug!("add_component: grouped node re-attached to its parent");
                if !self.node(parent).children.contains(&comp) {
                    self.attach(parent, comp);
                }
                self.invalidate();
                return;
            }
        }
        let root = self.root;
        self.add_into(root, comp);
        self.drain_pending(root);
        self.invalidate();
    }

    fn add_into(&mut self, host: NodeId, comp: NodeId) {
        let host_kind = self.node(host).kind;

        // Word containers only ever accept their single word label; composite
        // words accept nothing by geometry. Everything else goes onto the
        // parent's side queue for re-insertion one level up.
        if host_kind == NodeKind::CompositeWord {
            self.defer_to_parent(host, comp);
            return;
        }
        if host_kind.is_word_container() {
            let is_word = self.node(comp).kind == NodeKind::CompositeWord;
            let has_word = self
                .node(host)
                .children
                .iter()
                .any(|&c| self.node(c).kind == NodeKind::CompositeWord);
            if !is_word || has_word {
                self.defer_to_parent(host, comp);
                return;
            }
        }

        let comp_bounds = self.bounds_of(comp);
        let fits = host == self.root
            || matches!(
                (self.own_bounds(host), comp_bounds),
                (Some(hb), Some(cb)) if rect_contains(hb, cb)
            );
        if !fits {
            self.defer_to_parent(host, comp);
            return;
        }

        if self.node(host).children.is_empty() {
            debug!("add_into: first child of host");
            self.attach(host, comp);
            return;
        }

        let comp_kind = self.node(comp).kind;
        let children = self.node(host).children.clone();
        for child in children {
            if child == comp || !self.is_alive(child) {
                continue;
            }
            let (Some(nb), Some(cb)) = (comp_bounds, self.bounds_of(child)) else {
                continue;
            };
            if rect_contains(cb, nb)
                && self.node(child).kind.is_composite()
                && self.node(child).kind != NodeKind::Group
            {
                // Grow downward: the new node belongs inside this child.
                debug!("add_into: descending into containing child");
                self.add_into(child, comp);
                self.drain_pending(host);
                return;
            }
            if rect_contains(nb, cb)
                && comp_kind.is_composite()
                && comp_kind != NodeKind::CompositeWord
                && comp_kind != NodeKind::Group
            {
                // Grow upward: the new composite wraps an existing sibling.
                debug!("add_into: wrapping existing child into new composite");
                if !self.node(comp).children.contains(&child) {
                    self.add_into(comp, child);
                }
            }
        }
        self.attach(host, comp);
        self.drain_pending(host);
    }

    fn defer_to_parent(&mut self, host: NodeId, comp: NodeId) {
        // The root performs no bounds check: whatever fits nowhere else is
        // attached here.
        if host == self.root {
            self.attach(host, comp);
            return;
        }
        if let Some(parent) = self.node(host).parent {
            debug!("add_into: deferring node to ancestor queue");
            self.node_mut(parent).pending.push(comp);
        }
        // A detached host has no ancestor queue; the node keeps its current
        // placement.
    }

    fn drain_pending(&mut self, host: NodeId) {
        while let Some(comp) = {
            let n = self.node_mut(host);
            n.pending.pop()
        } {
            if self.is_alive(comp) {
                self.attach(host, comp);
            }
        }
    }

    // --- removal ---

    /// Remove a node and promote its children to its former parent.
    ///
    /// A no-op if the node is stale, the root, or not reachable from the
    /// root. Relation edges incident to the node are removed from the tree
    /// and deregistered as part of the same pass.
    pub fn remove_component(&mut self, target: NodeId) {
        if !self.is_alive(target) || target == self.root {
            return;
        }
        let root = self.root;
        if self.remove_in(root, target) {
            self.invalidate();
        }
    }

    fn remove_in(&mut self, host: NodeId, target: NodeId) -> bool {
        if self.node(host).children.contains(&target) {
            debug!("remove_component: found target, promoting children");
            self.unlink(target);
            for kid in self.node(target).children.clone() {
                self.attach(host, kid);
            }
            self.node_mut(target).children.clear();
            self.dispose(target);
            return true;
        }
        for child in self.node(host).children.clone() {
            if self.is_alive(child)
                && self.node(child).kind.is_composite()
                && self.remove_in(child, target)
            {
                return true;
            }
        }
        false
    }

    /// Remove a composite node together with its entire subtree.
    ///
    /// Composite words are not descended into during the search, matching
    /// the insertion rules. A no-op when the target is absent.
    pub fn remove_composite_component(&mut self, target: NodeId) {
        if !self.is_alive(target) || target == self.root {
            return;
        }
        let root = self.root;
        if self.remove_composite_in(root, target) {
            self.invalidate();
        }
    }

    fn remove_composite_in(&mut self, host: NodeId, target: NodeId) -> bool {
        if self.node(host).children.contains(&target) {
            debug!("remove_composite_component: dropping subtree");
            self.unlink(target);
            self.dispose_subtree(target);
            return true;
        }
        for child in self.node(host).children.clone() {
            if self.is_alive(child)
                && self.node(child).kind.is_composite()
                && self.node(child).kind != NodeKind::CompositeWord
                && self.remove_composite_in(child, target)
            {
                return true;
            }
        }
        false
    }

    fn dispose_subtree(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        for child in self.node(id).children.clone() {
            self.dispose_subtree(child);
        }
        self.node_mut(id).children.clear();
        self.dispose(id);
    }

    /// Free a single node: deregister it as an edge, remove incident edges
    /// from the tree, drop its path id mapping, and recycle the slot.
    ///
    /// Edge deregistration is structural here; no removal path can skip it.
    fn dispose(&mut self, target: NodeId) {
        if !self.is_alive(target) {
            return;
        }
        if let Some(ends) = self.node(target).ends.clone() {
            for endpoint in [ends.start, ends.end] {
                if let Some(n) = self.node_opt_mut(endpoint) {
                    n.relations.retain(|r| *r != target);
                }
            }
        }
        let incident: Vec<NodeId> = self.node(target).relations.to_vec();
        for edge in incident {
            if self.is_alive(edge) {
                self.remove_component(edge);
            }
            if self.is_alive(edge) {
                // Edge was never placed in the tree; free it directly.
                self.unlink(edge);
                self.dispose(edge);
            }
        }
        if let Some(uid) = self.node(target).path.as_ref().map(VectorPath::uid) {
            self.by_path.remove(&uid);
        }
        self.nodes[target.idx()] = None;
        self.free_list.push(target.idx());
        self.changed = true;
    }

    /// Flattened list of the node's descendants in tree order, composite
    /// words kept intact (their letters are not listed separately).
    pub fn linear_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_alive(id) {
            self.linear_children_in(id, &mut out);
        }
        out
    }

    fn linear_children_in(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.node(id).children {
            if !self.is_alive(child) {
                continue;
            }
            out.push(child);
            let kind = self.node(child).kind;
            if kind.is_composite() && kind != NodeKind::CompositeWord {
                self.linear_children_in(child, out);
            }
        }
    }

    /// Dissolve a group: clear the members' grouped flags, re-insert them by
    /// containment, and delete the group node.
    pub fn ungroup(&mut self, group: NodeId) {
        if self.kind(group) != Some(NodeKind::Group) {
            return;
        }
        let members = self.node(group).children.clone();
        self.unlink(group);
        for m in members {
            self.set_grouped(m, false);
            self.node_mut(m).parent = None;
            self.add_component(m);
        }
        self.node_mut(group).children.clear();
        self.dispose(group);
        self.invalidate();
    }

    // --- highlight protocol ---

    /// Drive the dual-transform highlight protocol for one node.
    ///
    /// `active` is the live canvas transform, `backup` the last committed
    /// one. When `highlight` differs from the node's current state, the
    /// node's geometry is re-expressed into the corresponding space, the
    /// transition recurses into children, and (on activation) the node is
    /// brought to the front of its parent's render order. Grouped members
    /// forward the call to their group, which transitions atomically as one
    /// unit.
    ///
    /// A singular transform aborts the switch for the affected path without
    /// corrupting tree structure.
    pub fn update_path(
        &mut self,
        id: NodeId,
        active: Affine,
        backup: Affine,
        highlight: bool,
    ) -> Result<(), SingularTransform> {
        if !self.is_alive(id) {
            return Ok(());
        }
        self.invalidate();
        let kind = self.node(id).kind;
        if self.node(id).flags.contains(NodeFlags::GROUPED) && kind != NodeKind::Group {
            if let Some(parent) = self.node(id).parent {
                return self.update_path(parent, active, backup, highlight);
            }
            return Ok(());
        }
        match kind {
            NodeKind::Group => {
                if self.is_highlighted(id) != highlight {
                    debug!("update_path: group transition");
                    self.node_mut(id).flags.set(NodeFlags::HIGHLIGHTED, highlight);
                    for child in self.node(id).children.clone() {
                        if self.is_grouped(child) {
                            self.update_grouped_path(child, active, backup, highlight)?;
                        }
                    }
                    if highlight {
                        self.bring_to_front(id);
                    }
                }
                Ok(())
            }
            NodeKind::CompositeWord => self.switch_word_space(id, active, backup, highlight),
            _ => {
                let Some(currently) = self.node(id).path.as_ref().map(VectorPath::highlighted)
                else {
                    return Ok(());
                };
                if currently == highlight {
                    return Ok(());
                }
                {
                    let path = self.node_mut(id).path.as_mut().expect("checked above");
                    if highlight {
                        path.apply_transformation(backup, active)?;
                        path.set_highlighted(true);
                        path.set_space(PathSpace::Active);
                    } else {
                        path.apply_transformation(active, backup)?;
                        path.set_highlighted(false);
                        path.set_space(PathSpace::Committed);
                    }
                }
                self.node_mut(id).flags.set(NodeFlags::HIGHLIGHTED, highlight);
                for child in self.node(id).children.clone() {
                    self.update_path(child, active, backup, highlight)?;
                }
                // Relation edges must keep drawing beneath the shapes they
                // connect, so they never jump to the front.
                if highlight && !kind.is_relation() {
                    self.bring_to_front(id);
                }
                Ok(())
            }
        }
    }

    /// Transition the grouped members of a group, keeping members whose own
    /// grouped flag matches in lockstep with the group's state.
    pub fn update_grouped_path(
        &mut self,
        id: NodeId,
        active: Affine,
        backup: Affine,
        highlight: bool,
    ) -> Result<(), SingularTransform> {
        if !self.is_alive(id) {
            return Ok(());
        }
        self.invalidate();
        if self.node(id).kind == NodeKind::CompositeWord {
            return self.switch_word_space(id, active, backup, highlight);
        }
        if self.node(id).flags.contains(NodeFlags::GROUPED) && self.is_highlighted(id) != highlight
        {
            if let Some(path) = self.node_mut(id).path.as_mut() {
                if highlight {
                    path.apply_transformation(backup, active)?;
                    path.set_highlighted(true);
                    path.set_space(PathSpace::Active);
                } else {
                    path.apply_transformation(active, backup)?;
                    path.set_highlighted(false);
                    path.set_space(PathSpace::Committed);
                }
            }
            self.node_mut(id).flags.set(NodeFlags::HIGHLIGHTED, highlight);
        }
        for child in self.node(id).children.clone() {
            if self.is_grouped(child) {
                self.update_grouped_path(child, active, backup, highlight)?;
            }
        }
        Ok(())
    }

    /// A composite word has no path of its own; the space switch applies to
    /// every letter, and the word transitions as a unit.
    fn switch_word_space(
        &mut self,
        id: NodeId,
        active: Affine,
        backup: Affine,
        highlight: bool,
    ) -> Result<(), SingularTransform> {
        if self.is_highlighted(id) == highlight {
            return Ok(());
        }
        debug!("update_path: composite word transition");
        for child in self.node(id).children.clone() {
            if let Some(path) = self.node_opt_mut(child).and_then(|n| n.path.as_mut()) {
                if highlight {
                    path.apply_transformation(backup, active)?;
                    path.set_highlighted(true);
                    path.set_space(PathSpace::Active);
                } else {
                    path.apply_transformation(active, backup)?;
                    path.set_highlighted(false);
                    path.set_space(PathSpace::Committed);
                }
            }
            if let Some(n) = self.node_opt_mut(child) {
                n.flags.set(NodeFlags::HIGHLIGHTED, highlight);
            }
        }
        self.node_mut(id).flags.set(NodeFlags::HIGHLIGHTED, highlight);
        self.invalidate();
        Ok(())
    }

    /// Set the highlight flag without any space switch.
    ///
    /// Composites recurse into children; grouped members pull their parent
    /// along so the group stays consistent.
    pub fn set_highlighted(&mut self, id: NodeId, highlighted: bool) {
        if !self.is_alive(id) {
            return;
        }
        let kind = self.node(id).kind;
        let grouped = self.node(id).flags.contains(NodeFlags::GROUPED);
        self.node_mut(id).flags.set(NodeFlags::HIGHLIGHTED, highlighted);
        if let Some(path) = self.node_mut(id).path.as_mut() {
            path.set_highlighted(highlighted);
        }
        if grouped && kind != NodeKind::Group {
            if let Some(parent) = self.node(id).parent {
                if self.is_highlighted(parent) != highlighted {
                    self.set_highlighted(parent, highlighted);
                }
            }
            return;
        }
        if kind.is_composite() {
            for child in self.node(id).children.clone() {
                self.set_highlighted(child, highlighted);
            }
        }
        self.invalidate();
    }

    /// Whether any path in the tree is currently highlighted.
    ///
    /// The caller uses the edges of this predicate to commit and restore the
    /// canvas transforms: exactly one commit when the first node activates,
    /// exactly one restore when the last deactivates.
    pub fn has_highlighted(&self) -> bool {
        self.iter_alive().any(|id| {
            self.node(id)
                .path
                .as_ref()
                .is_some_and(|p| p.highlighted() && !p.vertices().is_empty())
        })
    }

    /// Collect the path ids of every highlighted component, in tree order.
    ///
    /// A highlighted composite word is represented by its first letter's
    /// path.
    pub fn highlighted_paths(&self) -> Vec<PathId> {
        let mut out = Vec::new();
        self.collect_highlighted(self.root, &mut out);
        out
    }

    fn collect_highlighted(&self, id: NodeId, out: &mut Vec<PathId>) {
        for &child in &self.node(id).children {
            if !self.is_alive(child) {
                continue;
            }
            let node = self.node(child);
            match node.kind {
                NodeKind::CompositeWord => {
                    if node.flags.contains(NodeFlags::HIGHLIGHTED) {
                        if let Some(first) = node.children.first() {
                            if let Some(p) = self.node(*first).path.as_ref() {
                                out.push(p.uid());
                            }
                        }
                    }
                }
                k if k.is_composite() => {
                    if node.flags.contains(NodeFlags::HIGHLIGHTED) {
                        if let Some(p) = node.path.as_ref() {
                            out.push(p.uid());
                        }
                    }
                    self.collect_highlighted(child, out);
                }
                _ => {
                    if node.flags.contains(NodeFlags::HIGHLIGHTED) {
                        if let Some(p) = node.path.as_ref() {
                            out.push(p.uid());
                        }
                    }
                }
            }
        }
    }

    // --- queries and maintenance ---

    /// Union of every path's extrema, for fitting the viewport around the
    /// whole sketch.
    pub fn drawn_extrema(&self) -> Option<Rect> {
        let mut acc = None;
        for id in self.iter_alive() {
            acc = union_opt(acc, self.node(id).path.as_ref().and_then(VectorPath::bounds));
        }
        acc
    }

    /// Number of leaf components in the tree.
    pub fn component_count(&self) -> usize {
        self.count_in(self.root)
    }

    fn count_in(&self, id: NodeId) -> usize {
        let node = self.node(id);
        if node.kind.is_composite() {
            node.children
                .iter()
                .filter(|c| self.is_alive(**c))
                .map(|&c| self.count_in(c))
                .sum()
        } else {
            1
        }
    }

    /// Rebuild every path's geometric representation from its stored vertex
    /// list.
    ///
    /// Run once after the external persistence layer deserializes a tree;
    /// the geometric form does not round-trip. Drawn property-relation paths
    /// are rebuilt as bullets of the given radius.
    pub fn rebuild_paths(&mut self, bullet_radius: f64) {
        for id in self.iter_alive().collect::<Vec<_>>() {
            if let Some(path) = self.node_mut(id).path.as_mut() {
                if path.kind() == ElementKind::DrawnPropertyRelation {
                    path.rebuild_bullet(bullet_radius);
                } else {
                    path.rebuild_geometry();
                }
            }
        }
        self.invalidate();
    }

    /// First composite word whose letter-union bounds intersect `probe`.
    pub fn retrieve_word_match(&self, probe: Rect) -> Option<NodeId> {
        self.word_match_in(self.root, probe)
    }

    fn word_match_in(&self, id: NodeId, probe: Rect) -> Option<NodeId> {
        for &child in &self.node(id).children {
            if !self.is_alive(child) {
                continue;
            }
            match self.node(child).kind {
                NodeKind::CompositeWord => {
                    if let Some(b) = self.bounds_of(child) {
                        if rects_intersect(probe, b) {
                            return Some(child);
                        }
                    }
                }
                k if k.is_composite() => {
                    if let Some(found) = self.word_match_in(child, probe) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// The flattened render-order snapshot.
    ///
    /// Rebuilt only when the tree has structurally changed since the last
    /// call; otherwise the cached list is returned.
    pub fn render_list(&mut self) -> &RenderList {
        if self.changed {
            let mut entries = Vec::new();
            self.collect_render(self.root, &mut entries);
            self.render_cache = RenderList { entries };
            self.changed = false;
        }
        &self.render_cache
    }

    fn collect_render(&self, id: NodeId, out: &mut Vec<RenderEntry>) {
        let node = self.node(id);
        if let Some(path) = node.path.as_ref() {
            out.push(RenderEntry {
                node: id,
                path: path.uid(),
                transform: node.path_transform,
            });
        }
        for &child in &node.children {
            if self.is_alive(child) {
                self.collect_render(child, out);
            }
        }
    }
}


#[cfg(test)]
impl Tree {
    /// Directly attach a child, bypassing containment; test scaffolding for
    /// building letters and group members the way the recognizer would.
    pub(crate) fn attach_for_test(&mut self, host: NodeId, comp: NodeId) {
        self.attach(host, comp);
    }
}
