// SPDX-License-Identifier: GPL-3.0-only

//! Per-pool filesystem registry
//!
//! Filesystems are created by name and destroyed by identifier, so the
//! registry keeps two indices (name → identifier, identifier → filesystem)
//! that are only ever changed together.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use storage_types::{FilesystemInfo, FilesystemSpec, Identifier};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::names::validate_name;

/// A live filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filesystem {
    pub id: Identifier,
    pub uuid: Uuid,
    pub name: String,
    pub size: Option<u64>,
    pub created: DateTime<Utc>,
}

impl Filesystem {
    pub fn new(id: Identifier, spec: &FilesystemSpec) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: spec.name.clone(),
            size: spec.size,
            created: Utc::now(),
        }
    }

    pub fn info(&self, pool: &Identifier) -> FilesystemInfo {
        FilesystemInfo {
            id: self.id.clone(),
            uuid: self.uuid,
            name: self.name.clone(),
            pool: pool.clone(),
            size: self.size,
            created: self.created,
        }
    }
}

#[derive(Debug, Default)]
pub struct FilesystemRegistry {
    by_name: BTreeMap<String, Identifier>,
    entries: HashMap<Identifier, Filesystem>,
}

impl FilesystemRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &Identifier) -> Option<&Filesystem> {
        self.entries.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Filesystem> {
        self.by_name.get(name).and_then(|id| self.entries.get(id))
    }

    /// Live filesystems in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Filesystem> {
        self.by_name.values().filter_map(|id| self.entries.get(id))
    }

    /// Work out which filesystems a creation request would make.
    ///
    /// Later duplicates of a name are dropped. If any remaining name is
    /// already live the whole request is refused.
    pub fn plan_create(&self, specs: &[FilesystemSpec]) -> Result<Vec<FilesystemSpec>> {
        let planned = dedup_specs(specs);

        for spec in &planned {
            validate_name("filesystem", &spec.name)?;
        }

        let conflicts: Vec<String> = planned
            .iter()
            .filter(|spec| self.by_name.contains_key(&spec.name))
            .map(|spec| spec.name.clone())
            .collect();
        if !conflicts.is_empty() {
            return Err(EngineError::FilesystemsExist(conflicts));
        }

        Ok(planned)
    }

    /// Insert filesystems produced from a plan.
    ///
    /// All entries are checked before any is inserted.
    pub fn commit_create(&mut self, created: Vec<Filesystem>) -> Result<()> {
        let mut names = HashSet::with_capacity(created.len());
        let mut ids = HashSet::with_capacity(created.len());
        for fs in &created {
            if self.entries.contains_key(&fs.id) || !ids.insert(&fs.id) {
                return Err(EngineError::Internal(format!(
                    "identifier {} assigned twice",
                    fs.id
                )));
            }
            if self.by_name.contains_key(&fs.name) || !names.insert(fs.name.as_str()) {
                return Err(EngineError::Internal(format!(
                    "filesystem name {} committed twice",
                    fs.name
                )));
            }
        }

        for fs in created {
            self.by_name.insert(fs.name.clone(), fs.id.clone());
            self.entries.insert(fs.id.clone(), fs);
        }
        Ok(())
    }

    /// The targets that name live filesystems, in request order, each once.
    pub fn live_targets(&self, targets: &[Identifier]) -> Vec<&Filesystem> {
        let mut seen = HashSet::with_capacity(targets.len());
        targets
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn remove(&mut self, ids: &[Identifier]) -> Vec<Filesystem> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(fs) = self.entries.remove(id) {
                self.by_name.remove(&fs.name);
                removed.push(fs);
            }
        }
        removed
    }

    /// Rename a live filesystem. Returns `false` when the name is unchanged.
    pub fn rename(&mut self, id: &Identifier, new_name: &str) -> Result<bool> {
        validate_name("filesystem", new_name)?;

        let current = match self.entries.get(id) {
            Some(fs) => fs.name.clone(),
            None => return Err(EngineError::FilesystemNotFound(id.to_string())),
        };
        if current == new_name {
            return Ok(false);
        }
        if self.by_name.contains_key(new_name) {
            return Err(EngineError::FilesystemsExist(vec![new_name.to_string()]));
        }

        self.by_name.remove(&current);
        self.by_name.insert(new_name.to_string(), id.clone());
        if let Some(fs) = self.entries.get_mut(id) {
            fs.name = new_name.to_string();
        }
        Ok(true)
    }
}

/// Drop every spec whose name already appeared earlier in `specs`.
pub fn dedup_specs(specs: &[FilesystemSpec]) -> Vec<FilesystemSpec> {
    let mut seen = HashSet::with_capacity(specs.len());
    specs
        .iter()
        .filter(|spec| seen.insert(spec.name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(names: &[&str]) -> FilesystemRegistry {
        let mut registry = FilesystemRegistry::default();
        let created = names
            .iter()
            .enumerate()
            .map(|(n, name)| {
                Filesystem::new(
                    Identifier::new(format!("/fs/{n}")),
                    &FilesystemSpec::named(*name),
                )
            })
            .collect();
        registry.commit_create(created).expect("seed registry");
        registry
    }

    #[test]
    fn dedup_keeps_first_occurrence_options() {
        let specs = vec![
            FilesystemSpec::with_size("name", 1024),
            FilesystemSpec::named("other"),
            FilesystemSpec::with_size("name", 4096),
        ];
        let planned = dedup_specs(&specs);
        assert_eq!(
            planned,
            vec![
                FilesystemSpec::with_size("name", 1024),
                FilesystemSpec::named("other")
            ]
        );
    }

    #[test]
    fn plan_refuses_whole_request_on_any_conflict() {
        let registry = registry_with(&["thunk"]);
        let specs = vec![FilesystemSpec::named("thunk"), FilesystemSpec::named("newname")];
        let error = registry.plan_create(&specs).unwrap_err();
        assert_eq!(error, EngineError::FilesystemsExist(vec!["thunk".into()]));
    }

    #[test]
    fn plan_of_empty_request_is_empty() {
        let registry = registry_with(&["thunk"]);
        assert!(registry.plan_create(&[]).expect("empty plan").is_empty());
    }

    #[test]
    fn plan_validates_names() {
        let registry = FilesystemRegistry::default();
        let error = registry
            .plan_create(&[FilesystemSpec::named("a/b")])
            .unwrap_err();
        assert!(matches!(error, EngineError::InvalidName { .. }));
    }

    #[test]
    fn commit_rejects_reused_identifier() {
        let mut registry = registry_with(&["a"]);
        let clash = Filesystem::new(Identifier::from("/fs/0"), &FilesystemSpec::named("b"));
        let error = registry.commit_create(vec![clash]).unwrap_err();
        assert!(matches!(error, EngineError::Internal(_)));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("b").is_none());
    }

    #[test]
    fn live_targets_skip_unknown_and_repeated_ids() {
        let registry = registry_with(&["a", "b"]);
        let targets = vec![
            Identifier::from("/fs/1"),
            Identifier::from("/"),
            Identifier::from("/fs/1"),
            Identifier::from("/fs/0"),
        ];
        let live: Vec<&str> = registry
            .live_targets(&targets)
            .into_iter()
            .map(|fs| fs.name.as_str())
            .collect();
        assert_eq!(live, vec!["b", "a"]);
    }

    #[test]
    fn remove_clears_both_indices() {
        let mut registry = registry_with(&["a", "b"]);
        let removed = registry.remove(&[Identifier::from("/fs/0")]);
        assert_eq!(removed.len(), 1);
        assert!(registry.get_by_name("a").is_none());
        assert!(registry.get(&Identifier::from("/fs/0")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rename_keeps_indices_consistent() {
        let mut registry = registry_with(&["a", "b"]);
        let id = Identifier::from("/fs/0");

        assert_eq!(registry.rename(&id, "a"), Ok(false));
        assert_eq!(
            registry.rename(&id, "b"),
            Err(EngineError::FilesystemsExist(vec!["b".into()]))
        );
        assert_eq!(registry.rename(&id, "c"), Ok(true));
        assert_eq!(registry.get_by_name("c").map(|fs| &fs.id), Some(&id));
        assert!(registry.get_by_name("a").is_none());
        assert_eq!(
            registry.rename(&Identifier::from("/nope"), "d"),
            Err(EngineError::FilesystemNotFound("/nope".into()))
        );
    }

    #[test]
    fn iterates_in_name_order() {
        let registry = registry_with(&["zeta", "alpha", "mid"]);
        let names: Vec<&str> = registry.iter().map(|fs| fs.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
