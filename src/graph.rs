//! Dependency and containment graph between named entities
//!
//! Edges are kept in both directions so either side can be looked up
//! directly. The three indices have independent locks and no operation holds
//! more than one of them at a time.

use crate::alias::AliasIndex;
use ahash::RandomState;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

type NameSet = IndexSet<String, RandomState>;
type Adjacency = HashMap<String, NameSet, RandomState>;

fn adjacency() -> Mutex<Adjacency> {
    Mutex::new(HashMap::with_capacity_and_hasher(64, RandomState::new()))
}

/// Records "X is depended on by Y" and "X contains Y" edges.
///
/// # Examples
///
/// ```rust
/// use singleton_registry::{AliasIndex, DependencyGraph};
/// use std::sync::Arc;
///
/// let graph = DependencyGraph::new(Arc::new(AliasIndex::new()));
/// graph.add_dependency("database", "repository");
/// graph.add_dependency("repository", "service");
///
/// assert!(graph.is_transitively_dependent("database", "service"));
/// assert_eq!(graph.dependencies_of("service"), vec!["repository"]);
/// ```
pub struct DependencyGraph {
    aliases: Arc<AliasIndex>,
    /// container -> contained
    contained: Mutex<Adjacency>,
    /// depended on -> dependents
    dependents: Mutex<Adjacency>,
    /// dependent -> depended on
    dependencies: Mutex<Adjacency>,
}

impl DependencyGraph {
    /// Create an empty graph that canonicalizes names through `aliases`
    pub fn new(aliases: Arc<AliasIndex>) -> Self {
        Self {
            aliases,
            contained: adjacency(),
            dependents: adjacency(),
            dependencies: adjacency(),
        }
    }

    /// Record that `dependent` requires `depended_on`.
    ///
    /// `depended_on` is canonicalized through the alias index first.
    pub fn add_dependency(&self, depended_on: &str, dependent: &str) {
        let canonical = self.aliases.canonical_name(depended_on);

        {
            let mut dependents = self.dependents.lock();
            let set = dependents.entry(canonical.clone()).or_default();
            if !set.insert(dependent.to_owned()) {
                return;
            }
        }

        self.dependencies
            .lock()
            .entry(dependent.to_owned())
            .or_default()
            .insert(canonical.clone());

        #[cfg(feature = "logging")]
        trace!(
            target: "singleton_registry",
            depended_on = canonical.as_str(),
            dependent = dependent,
            "Registered dependency"
        );
    }

    /// Record that `container` owns `contained`.
    ///
    /// Also records `container` as a dependent of `contained`, so destroying
    /// the contained entity takes its container down first.
    pub fn add_containment(&self, container: &str, contained: &str) {
        {
            let mut map = self.contained.lock();
            let set = map.entry(container.to_owned()).or_default();
            if !set.insert(contained.to_owned()) {
                return;
            }
        }
        self.add_dependency(contained, container);
    }

    /// Whether `candidate` is reachable from `target` over dependent edges.
    ///
    /// Walks an explicit worklist with a visited set, so cyclic graphs and
    /// deep chains are both safe.
    pub fn is_transitively_dependent(&self, target: &str, candidate: &str) -> bool {
        let dependents = self.dependents.lock();
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending = vec![target.to_owned()];

        while let Some(current) = pending.pop() {
            let canonical = self.aliases.canonical_name(&current);
            if !seen.insert(canonical.clone()) {
                continue;
            }
            let Some(set) = dependents.get(&canonical) else {
                continue;
            };
            if set.contains(candidate) {
                return true;
            }
            pending.extend(set.iter().filter(|n| !seen.contains(*n)).cloned());
        }
        false
    }

    /// Direct dependents of `name`
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        snapshot(&self.dependents, name)
    }

    /// Direct dependencies of `name`
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        snapshot(&self.dependencies, name)
    }

    /// Entities owned by `container`
    pub fn contained_in(&self, container: &str) -> Vec<String> {
        snapshot(&self.contained, container)
    }

    /// Whether anything depends on `name`
    pub fn has_dependents(&self, name: &str) -> bool {
        self.dependents
            .lock()
            .get(name)
            .is_some_and(|set| !set.is_empty())
    }

    /// Remove `name` from every index, as a key and as a member of any set.
    ///
    /// Uses the opposite index to find the sets `name` is a member of rather
    /// than scanning every key.
    pub fn forget(&self, name: &str) {
        let dependents = self.dependents.lock().remove(name).unwrap_or_default();
        let dependencies = self.dependencies.lock().remove(name).unwrap_or_default();

        {
            let mut map = self.contained.lock();
            map.remove(name);
            // containers of `name` are among its dependents
            remove_member(&mut map, dependents.iter(), name);
        }
        remove_member(&mut self.dependents.lock(), dependencies.iter(), name);
        remove_member(&mut self.dependencies.lock(), dependents.iter(), name);
    }

    /// Remove and return the dependents of `name`
    pub(crate) fn take_dependents(&self, name: &str) -> Vec<String> {
        take(&self.dependents, name)
    }

    /// Remove and return the entities contained in `name`
    pub(crate) fn take_contained(&self, name: &str) -> Vec<String> {
        take(&self.contained, name)
    }

    /// Drop every edge
    pub fn clear(&self) {
        self.contained.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();
    }

    /// Whether the graph has no edges at all
    pub fn is_empty(&self) -> bool {
        self.contained.lock().is_empty()
            && self.dependents.lock().is_empty()
            && self.dependencies.lock().is_empty()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("containers", &self.contained.lock().len())
            .field("depended_on", &self.dependents.lock().len())
            .field("dependents", &self.dependencies.lock().len())
            .finish()
    }
}

fn snapshot(index: &Mutex<Adjacency>, name: &str) -> Vec<String> {
    index
        .lock()
        .get(name)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}

fn take(index: &Mutex<Adjacency>, name: &str) -> Vec<String> {
    index
        .lock()
        .remove(name)
        .map(|set| set.into_iter().collect())
        .unwrap_or_default()
}

fn remove_member<'a>(
    map: &mut Adjacency,
    keys: impl Iterator<Item = &'a String>,
    name: &str,
) {
    for key in keys {
        if let Some(set) = map.get_mut(key) {
            set.shift_remove(name);
            if set.is_empty() {
                map.remove(key);
            }
        }
    }
}
