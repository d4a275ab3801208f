//! Class model: root and derived classes plus resolved ancestor chains.
//!
//! # Responsibility
//! - Represent a class with an explicit lineage (root vs derived).
//! - Compute the full attribute set of a class from its ancestor chain.
//!
//! # Invariants
//! - Only root classes carry a `VisibilityMap`.
//! - A `ClassChain` starts at a root class, each element's superclass is the
//!   previous element, and no class id appears twice.
//! - Attribute ids are unique across the whole chain.

use crate::model::access::{AccessLevel, VisibilityMap, WorkspaceId};
use crate::model::attribute::AttributeDescriptor;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Class identifier.
pub type ClassId = String;

/// How a class relates to the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassLineage {
    /// Top of a hierarchy; owns workspace visibility for all descendants.
    Root { visibility: VisibilityMap },
    /// Inherits attributes and visibility from `superclass`.
    Derived { superclass: ClassId },
}

/// One knowledge-base class with its own (non-inherited) attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct KbClass {
    pub id: ClassId,
    pub name: String,
    pub notes: Option<String>,
    pub lineage: ClassLineage,
    /// Own attributes in declaration order.
    pub attributes: Vec<AttributeDescriptor>,
}

impl KbClass {
    pub fn new_root(
        id: impl Into<String>,
        name: impl Into<String>,
        visibility: VisibilityMap,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            notes: None,
            lineage: ClassLineage::Root { visibility },
            attributes: Vec::new(),
        }
    }

    pub fn new_derived(
        id: impl Into<String>,
        name: impl Into<String>,
        superclass: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            notes: None,
            lineage: ClassLineage::Derived {
                superclass: superclass.into(),
            },
            attributes: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.lineage, ClassLineage::Root { .. })
    }

    pub fn superclass_id(&self) -> Option<&str> {
        match &self.lineage {
            ClassLineage::Root { .. } => None,
            ClassLineage::Derived { superclass } => Some(superclass.as_str()),
        }
    }

    /// Visibility map, present only on root classes.
    pub fn visibility(&self) -> Option<&VisibilityMap> {
        match &self.lineage {
            ClassLineage::Root { visibility } => Some(visibility),
            ClassLineage::Derived { .. } => None,
        }
    }
}

/// Error raised when a sequence of classes is not a valid ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassChainError {
    Empty,
    /// First element is not a root class.
    NotRooted(ClassId),
    /// Element's superclass is not the preceding element.
    Broken { class_id: ClassId, expected: ClassId },
    /// Root class appearing below the top of the chain.
    MisplacedRoot(ClassId),
    Cycle(ClassId),
    DuplicateAttribute(String),
}

impl Display for ClassChainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "class chain is empty"),
            Self::NotRooted(id) => write!(f, "class chain does not start at a root: {id}"),
            Self::Broken { class_id, expected } => write!(
                f,
                "class {class_id} does not derive from preceding class {expected}"
            ),
            Self::MisplacedRoot(id) => write!(f, "root class {id} below the top of a chain"),
            Self::Cycle(id) => write!(f, "class {id} appears twice in its ancestor chain"),
            Self::DuplicateAttribute(id) => {
                write!(f, "attribute id {id} defined more than once in class chain")
            }
        }
    }
}

impl Error for ClassChainError {}

/// Ancestor chain of a class, ordered root first and ending with the class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassChain {
    classes: Vec<KbClass>,
}

impl ClassChain {
    /// Validates and wraps a root-first sequence of classes.
    pub fn new(classes: Vec<KbClass>) -> Result<Self, ClassChainError> {
        let first = classes.first().ok_or(ClassChainError::Empty)?;
        if !first.is_root() {
            return Err(ClassChainError::NotRooted(first.id.clone()));
        }

        let mut seen_classes = HashSet::new();
        let mut seen_attributes = HashSet::new();
        for (index, class) in classes.iter().enumerate() {
            if !seen_classes.insert(class.id.as_str()) {
                return Err(ClassChainError::Cycle(class.id.clone()));
            }
            if index > 0 {
                let expected = &classes[index - 1].id;
                match class.superclass_id() {
                    Some(superclass) if superclass == expected.as_str() => {}
                    Some(_) => {
                        return Err(ClassChainError::Broken {
                            class_id: class.id.clone(),
                            expected: expected.clone(),
                        })
                    }
                    None => return Err(ClassChainError::MisplacedRoot(class.id.clone())),
                }
            }
            for attribute in &class.attributes {
                if !seen_attributes.insert(attribute.id.as_str()) {
                    return Err(ClassChainError::DuplicateAttribute(attribute.id.clone()));
                }
            }
        }

        Ok(Self { classes })
    }

    /// The class this chain was resolved for.
    pub fn leaf(&self) -> &KbClass {
        // `new` guarantees at least one element.
        &self.classes[self.classes.len() - 1]
    }

    pub fn root(&self) -> &KbClass {
        &self.classes[0]
    }

    pub fn classes(&self) -> &[KbClass] {
        &self.classes
    }

    pub fn into_leaf(mut self) -> KbClass {
        let last = self.classes.len() - 1;
        self.classes.swap_remove(last)
    }

    /// Inherited plus own attributes, ancestors first.
    pub fn all_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> + '_ {
        self.classes.iter().flat_map(|class| class.attributes.iter())
    }

    pub fn attribute(&self, attribute_id: &str) -> Option<&AttributeDescriptor> {
        self.all_attributes()
            .find(|attribute| attribute.id == attribute_id)
    }

    /// Whether the leaf class is `class_id` or one of its descendants.
    pub fn is_subclass_of(&self, class_id: &str) -> bool {
        self.classes.iter().any(|class| class.id == class_id)
    }

    /// Visibility map of the root ancestor.
    pub fn visibility(&self) -> &VisibilityMap {
        match &self.root().lineage {
            ClassLineage::Root { visibility } => visibility,
            // Unreachable: `new` rejects chains not starting at a root.
            ClassLineage::Derived { .. } => &EMPTY_VISIBILITY,
        }
    }

    /// Access of `workspace` on the leaf class, resolved via the root.
    pub fn access_level(&self, workspace: WorkspaceId) -> Option<AccessLevel> {
        self.visibility().get(workspace)
    }
}

static EMPTY_VISIBILITY: VisibilityMap = VisibilityMap::empty();
