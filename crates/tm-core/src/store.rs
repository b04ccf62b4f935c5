//! Migration Store: revision → record mapping discovered from a directory.

use crate::error::{CoreError, CoreResult};
use crate::naming::leading_token;
use crate::record::{MigrationRecord, RecordOrigin};
use crate::revision::RevisionId;
use crate::script::Script;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// On-disk definition file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    #[serde(default)]
    revision: Option<RevisionId>,
    #[serde(default)]
    down_revision: Option<RevisionId>,
    #[serde(default)]
    depends_on: Vec<RevisionId>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    upgrade: Option<Script>,
    #[serde(default)]
    downgrade: Option<Script>,
}

/// All migration records known to a run, in discovery order.
///
/// Load-once and read-only afterwards; discovery order is the tie-breaker the
/// resolver uses between otherwise unordered records.
#[derive(Debug, Default)]
pub struct MigrationStore {
    records: Vec<MigrationRecord>,
    by_revision: HashMap<RevisionId, usize>,
}

impl MigrationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from code-defined records, in the given order.
    pub fn from_records(records: impl IntoIterator<Item = MigrationRecord>) -> CoreResult<Self> {
        let mut store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Load every `.yml`/`.yaml` definition under `dir` (recursively).
    ///
    /// Files are visited in sorted path order so discovery is deterministic.
    pub fn load(dir: &Path) -> CoreResult<Self> {
        if !dir.is_dir() {
            return Err(CoreError::MigrationsDirNotFound {
                path: dir.display().to_string(),
            });
        }

        let mut paths = Vec::new();
        collect_definition_paths(dir, &mut paths)?;
        paths.sort();

        let mut store = Self::new();
        for path in paths {
            let record = load_definition(&path)?;
            store.insert(record)?;
        }
        log::debug!(
            "Loaded {} migration(s) from {}",
            store.len(),
            dir.display()
        );
        Ok(store)
    }

    /// Add a record, rejecting duplicate revisions.
    pub fn insert(&mut self, record: MigrationRecord) -> CoreResult<()> {
        if let Some(&existing) = self.by_revision.get(&record.revision) {
            return Err(CoreError::DuplicateIdentifier {
                revision: record.revision.to_string(),
                path1: origin_label(&self.records[existing].origin),
                path2: origin_label(&record.origin),
            });
        }
        self.by_revision
            .insert(record.revision.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Look up a record by exact revision.
    pub fn get(&self, revision: &str) -> Option<&MigrationRecord> {
        self.by_revision.get(revision).map(|&i| &self.records[i])
    }

    /// Discovery index of a revision.
    pub fn index_of(&self, revision: &str) -> Option<usize> {
        self.by_revision.get(revision).copied()
    }

    /// Record at a discovery index.
    pub fn at(&self, index: usize) -> &MigrationRecord {
        &self.records[index]
    }

    /// Resolve an exact revision or a unique prefix of one.
    pub fn resolve(&self, token: &str) -> CoreResult<&RevisionId> {
        if let Some(record) = self.get(token) {
            return Ok(&record.revision);
        }
        let mut candidates: Vec<&RevisionId> = self
            .records
            .iter()
            .map(|r| &r.revision)
            .filter(|rev| !token.is_empty() && rev.starts_with(token))
            .collect();
        match candidates.len() {
            0 => Err(CoreError::UnknownRevision {
                revision: token.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => {
                let mut names: Vec<String> = candidates.iter().map(|r| r.to_string()).collect();
                names.sort();
                Err(CoreError::AmbiguousRevision {
                    prefix: token.to_string(),
                    candidates: names,
                })
            }
        }
    }

    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn origin_label(origin: &RecordOrigin) -> String {
    match origin {
        RecordOrigin::File { path, .. } => path.display().to_string(),
        RecordOrigin::Code => "<code>".to_string(),
    }
}

fn collect_definition_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> CoreResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::IoWithPath {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_definition_paths(&path, paths)?;
        } else if path.extension().is_some_and(|e| e == "yml" || e == "yaml") {
            paths.push(path);
        }
    }
    Ok(())
}

fn malformed(path: &Path, reason: impl Into<String>) -> CoreError {
    CoreError::MalformedRecord {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Parse one definition file into a record.
fn load_definition(path: &Path) -> CoreResult<MigrationRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    let def: DefinitionFile =
        serde_yaml::from_str(&content).map_err(|e| malformed(path, e.to_string()))?;

    let revision = def
        .revision
        .ok_or_else(|| malformed(path, "missing required field 'revision'"))?;
    let upgrade = def
        .upgrade
        .ok_or_else(|| malformed(path, "missing required field 'upgrade'"))?;

    match leading_token(path) {
        Some(token) if token == revision.as_str() => {}
        Some(token) => {
            return Err(malformed(
                path,
                format!(
                    "file name must start with its revision '{revision}', found '{token}'"
                ),
            ))
        }
        None => return Err(malformed(path, "file name is not valid UTF-8")),
    }

    let checksum = format!("{:x}", Sha256::digest(content.as_bytes()));

    Ok(
        MigrationRecord::from_scripts(revision, def.down_revision, upgrade, def.downgrade)
            .with_description(def.description)
            .with_depends_on(def.depends_on)
            .with_origin(RecordOrigin::File {
                path: path.to_path_buf(),
                checksum,
            }),
    )
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
