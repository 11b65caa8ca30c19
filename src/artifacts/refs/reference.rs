use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::{HEADS_PREFIX, REFS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};

/// A named pointer, either at an object or at another reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct {
        name: String,
        oid: ObjectId,
        /// Target of the annotated tag `oid` names, when recorded in `packed-refs`
        peeled: Option<ObjectId>,
        /// Read from `packed-refs` rather than a loose file
        packed: bool,
    },
    Symbolic {
        name: String,
        target: String,
    },
}

impl Reference {
    pub fn direct(name: impl Into<String>, oid: ObjectId) -> Self {
        Reference::Direct {
            name: name.into(),
            oid,
            peeled: None,
            packed: false,
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Reference::Symbolic {
            name: name.into(),
            target: target.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Reference::Direct { name, .. } | Reference::Symbolic { name, .. } => name,
        }
    }

    /// Object id of a direct reference
    pub fn target(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { oid, .. } => Some(*oid),
            Reference::Symbolic { .. } => None,
        }
    }

    /// Name a symbolic reference points at
    pub fn symbolic_target(&self) -> Option<&str> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }

    pub fn peeled(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { peeled, .. } => *peeled,
            Reference::Symbolic { .. } => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Reference::Symbolic { .. })
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, Reference::Direct { packed: true, .. })
    }

    pub fn is_branch(&self) -> bool {
        self.name().starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.name().starts_with(TAGS_PREFIX)
    }

    /// Name without its namespace prefix, as shown to users
    pub fn shorthand(&self) -> &str {
        shorthand(self.name())
    }
}

pub fn shorthand(name: &str) -> &str {
    [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX, REFS_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Direct { name, oid, .. } => write!(f, "{oid} {name}"),
            Reference::Symbolic { name, target } => write!(f, "ref: {target} {name}"),
        }
    }
}
