// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: node identifiers, kinds, flags, and
//! relation endpoint data.

use kurbo::Point;

/// Identifier for a node in the tree (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of scene node kinds.
///
/// Matched exhaustively everywhere; adding a variant is a deliberate API
/// change, not an `instanceof` chain growing another link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The invisible tree root; the only node without a path.
    Root,
    /// A free stroke with no recognized meaning.
    Leaf,
    /// A single recognized letter inside a [`NodeKind::CompositeWord`].
    WordLetter,
    /// A sketched concept (rectangle); accepts one word child as its label.
    Concept,
    /// A sketched individual (ellipse); accepts one word child as its label.
    Individual,
    /// A user-created group; members carry the `GROUPED` flag.
    Group,
    /// A recognized word: a pathless container of [`NodeKind::WordLetter`]s.
    CompositeWord,
    /// Subclass relation edge between two concepts.
    SubclassRelation,
    /// Instantiation relation edge between an individual and a concept.
    InstantiationRelation,
    /// Property relation edge; rendered as a bullet, labeled by a word child.
    PropertyRelation,
    /// A concept placed from the imported ontology.
    FormalizedConcept,
    /// An individual placed from the imported ontology.
    FormalizedIndividual,
    /// A property relation edge taken from the imported ontology.
    FormalizedPropertyRelation,
    /// The tappable button attached to a formalized property relation.
    FormalizedPropertyRelationButton,
}

impl NodeKind {
    /// Whether nodes of this kind own a child list and take part in
    /// containment-based insertion.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::Concept
                | Self::Individual
                | Self::Group
                | Self::CompositeWord
                | Self::PropertyRelation
        )
    }

    /// Whether nodes of this kind are relation edges with start/end
    /// references.
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            Self::SubclassRelation
                | Self::InstantiationRelation
                | Self::PropertyRelation
                | Self::FormalizedPropertyRelation
                | Self::FormalizedPropertyRelationButton
        )
    }

    /// Whether nodes of this kind accept exactly one
    /// [`NodeKind::CompositeWord`] child (their label) and defer all other
    /// geometry-based insertion to their parent.
    pub fn is_word_container(self) -> bool {
        matches!(self, Self::Concept | Self::Individual | Self::PropertyRelation)
    }

    /// Whether nodes of this kind are letters, the leaves composite-word
    /// bounds are computed from.
    pub fn is_letter(self) -> bool {
        matches!(self, Self::WordLetter)
    }
}

bitflags::bitflags! {
    /// Per-node state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node is a member of a group; selection and space switching are
        /// forwarded to the group.
        const GROUPED     = 0b0000_0001;
        /// Node is selected; its geometry lives in the active transform
        /// space.
        const HIGHLIGHTED = 0b0000_0010;
    }
}

/// Display classification passed through to the caller's alpha-blend policy.
///
/// The core stores it and the alpha the policy returns; it never interprets
/// either.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayState {
    /// No classification.
    #[default]
    None,
    /// Concept shape.
    Concept,
    /// Relation attached to a concept.
    ConceptRelation,
    /// Subclass relation between concepts.
    ConceptSubclassRelation,
    /// Individual shape.
    Individual,
    /// Relation attached to an individual.
    IndividualRelation,
    /// Instantiation relation.
    Instantiation,
}

/// Endpoint data stored on relation-edge nodes.
#[derive(Clone, Debug)]
pub struct RelationEnds {
    /// Start node of the edge.
    pub start: NodeId,
    /// End node of the edge. Equal to `start` for a self-relation.
    pub end: NodeId,
    /// Cached center of the start node when the edge was last updated.
    pub start_point: Point,
    /// Cached center of the end node when the edge was last updated.
    pub end_point: Point,
    /// Bearing from start to end in degrees, `[0, 360)`; `0` points straight
    /// up, `90` right.
    pub angle: f64,
}

impl RelationEnds {
    /// Whether this edge connects a node to itself.
    pub fn is_self_relation(&self) -> bool {
        self.start == self.end
    }
}
