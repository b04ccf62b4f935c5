//! Migration Record: one immutable schema change.

use crate::action::Action;
use crate::revision::RevisionId;
use crate::script::Script;
use std::fmt;
use std::path::PathBuf;

/// Where a record was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOrigin {
    /// Loaded from a definition file
    File {
        path: PathBuf,
        /// SHA-256 of the file content
        checksum: String,
    },
    /// Registered in code
    Code,
}

/// An immutable description of one schema change.
pub struct MigrationRecord {
    /// Unique identifier
    pub revision: RevisionId,

    /// Predecessor; `None` only for the root
    pub down_revision: Option<RevisionId>,

    /// Extra revisions that must be applied first
    pub depends_on: Vec<RevisionId>,

    /// Human-readable description
    pub description: String,

    /// Forward action
    pub upgrade: Box<dyn Action>,

    /// Reverse action; `None` marks the record irreversible
    pub downgrade: Option<Box<dyn Action>>,

    /// Definition file or code
    pub origin: RecordOrigin,
}

impl MigrationRecord {
    /// Create a code-defined record with a forward action and no reverse.
    pub fn new(
        revision: RevisionId,
        down_revision: Option<RevisionId>,
        upgrade: impl Action + 'static,
    ) -> Self {
        Self {
            revision,
            down_revision,
            depends_on: Vec::new(),
            description: String::new(),
            upgrade: Box::new(upgrade),
            downgrade: None,
            origin: RecordOrigin::Code,
        }
    }

    /// Create a record from forward and reverse SQL scripts.
    pub fn from_scripts(
        revision: RevisionId,
        down_revision: Option<RevisionId>,
        upgrade: Script,
        downgrade: Option<Script>,
    ) -> Self {
        Self {
            revision,
            down_revision,
            depends_on: Vec::new(),
            description: String::new(),
            upgrade: Box::new(upgrade),
            downgrade: downgrade.map(|s| Box::new(s) as Box<dyn Action>),
            origin: RecordOrigin::Code,
        }
    }

    #[must_use]
    pub fn with_downgrade(mut self, downgrade: impl Action + 'static) -> Self {
        self.downgrade = Some(Box::new(downgrade));
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_depends_on(mut self, depends_on: Vec<RevisionId>) -> Self {
        self.depends_on = depends_on;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: RecordOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// True if the record has a reverse action.
    pub fn is_reversible(&self) -> bool {
        self.downgrade.is_some()
    }

    /// True if this record has no predecessor.
    pub fn is_root(&self) -> bool {
        self.down_revision.is_none()
    }

    /// Checksum of the definition file, if loaded from one.
    pub fn checksum(&self) -> Option<&str> {
        match &self.origin {
            RecordOrigin::File { checksum, .. } => Some(checksum),
            RecordOrigin::Code => None,
        }
    }

    /// Predecessor followed by extra dependencies.
    pub fn dependencies(&self) -> impl Iterator<Item = &RevisionId> {
        self.down_revision.iter().chain(self.depends_on.iter())
    }
}

impl fmt::Debug for MigrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRecord")
            .field("revision", &self.revision)
            .field("down_revision", &self.down_revision)
            .field("depends_on", &self.depends_on)
            .field("description", &self.description)
            .field("reversible", &self.is_reversible())
            .field("origin", &self.origin)
            .finish()
    }
}
