// Copyright 2025 the Inkscene Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Classification tags carried by a path.

/// Ontology element kind of a path.
///
/// Every element exists in a `Drawn` (sketched, not yet committed to the
/// ontology) and a `Formalized` (backed by an ontology resource) variant.
/// The scene core never interprets these beyond equality checks; the view
/// layer uses them to pick paints and icons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Unclassified stroke.
    #[default]
    None,
    /// Sketched concept.
    DrawnConcept,
    /// Concept backed by an ontology resource.
    FormalizedConcept,
    /// Sketched individual.
    DrawnIndividual,
    /// Individual backed by an ontology resource.
    FormalizedIndividual,
    /// Sketched subclass relation.
    DrawnSubclassRelation,
    /// Subclass relation backed by an ontology resource.
    FormalizedSubclassRelation,
    /// Sketched instantiation relation.
    DrawnInstantiation,
    /// Instantiation relation backed by an ontology resource.
    FormalizedInstantiation,
    /// Sketched property relation (rendered as a bullet with a label tab).
    DrawnPropertyRelation,
    /// Property relation backed by an ontology resource.
    FormalizedPropertyRelation,
}

impl ElementKind {
    /// Whether this kind is one of the relation kinds.
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            Self::DrawnSubclassRelation
                | Self::FormalizedSubclassRelation
                | Self::DrawnInstantiation
                | Self::FormalizedInstantiation
                | Self::DrawnPropertyRelation
                | Self::FormalizedPropertyRelation
        )
    }
}

/// Shape class reported by the gesture recognizer for a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureKind {
    /// No recognized gesture; a free stroke.
    #[default]
    NoGesture,
    /// Recognized concept shape (rectangle).
    Concept,
    /// Recognized individual shape (ellipse).
    Individual,
}
