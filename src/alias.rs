//! Alias index
//!
//! Maps alias names onto target names. Aliases may point at other aliases;
//! [`AliasIndex::canonical_name`] follows the chain to its end. Every mutation
//! checks for cycles under the same write lock, so the chain always
//! terminates.

use crate::error::{check_name, RegistryError, Result};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// Bidirectional name -> canonical-name resolution with cycle rejection.
///
/// # Examples
///
/// ```rust
/// use singleton_registry::AliasIndex;
///
/// let aliases = AliasIndex::new();
/// aliases.register_alias("dataSource", "ds").unwrap();
/// aliases.register_alias("ds", "db").unwrap();
///
/// assert_eq!(aliases.canonical_name("db"), "dataSource");
/// ```
pub struct AliasIndex {
    /// alias -> target
    map: RwLock<HashMap<String, String, RandomState>>,
    allow_overriding: bool,
}

impl AliasIndex {
    /// Create an empty index that allows alias overriding
    pub fn new() -> Self {
        Self::with_overriding(true)
    }

    /// Create an empty index with an explicit overriding policy
    pub fn with_overriding(allow_overriding: bool) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity_and_hasher(16, RandomState::new())),
            allow_overriding,
        }
    }

    /// Register `alias` for `name`.
    ///
    /// A self-alias removes any existing mapping for `alias`. Re-registering
    /// the same pair is a no-op.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        check_name(name)?;
        check_name(alias)?;

        let mut map = self.map.write();

        if alias == name {
            map.remove(alias);

            #[cfg(feature = "logging")]
            debug!(
                target: "singleton_registry",
                alias = alias,
                "Alias definition ignored since it points to same name"
            );
            return Ok(());
        }

        if let Some(registered) = map.get(alias) {
            if registered == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(RegistryError::DuplicateAlias {
                    alias: alias.to_owned(),
                    name: name.to_owned(),
                    registered: registered.clone(),
                });
            }

            #[cfg(feature = "logging")]
            info!(
                target: "singleton_registry",
                alias = alias,
                registered = registered.as_str(),
                name = name,
                "Overriding alias definition with new target name"
            );
        }

        check_for_alias_circle(&map, name, alias)?;
        map.insert(alias.to_owned(), name.to_owned());

        #[cfg(feature = "logging")]
        debug!(
            target: "singleton_registry",
            alias = alias,
            name = name,
            "Alias registered"
        );

        Ok(())
    }

    /// Remove an alias
    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        match self.map.write().remove(alias) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NoSuchAlias {
                alias: alias.to_owned(),
            }),
        }
    }

    /// Whether `name` is registered as an alias
    pub fn is_alias(&self, name: &str) -> bool {
        self.map.read().contains_key(name)
    }

    /// Whether `alias` resolves, directly or through a chain, to `name`
    pub fn has_alias(&self, name: &str, alias: &str) -> bool {
        has_alias(&self.map.read(), name, alias)
    }

    /// Every alias that resolves to `name`, directly or through a chain
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let map = self.map.read();
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_owned()];

        while let Some(current) = pending.pop() {
            for (alias, target) in map.iter() {
                if *target == current && seen.insert(alias.clone()) {
                    result.push(alias.clone());
                    pending.push(alias.clone());
                }
            }
        }
        result
    }

    /// Follow alias links until a name with no further mapping is reached
    pub fn canonical_name(&self, name: &str) -> String {
        let map = self.map.read();
        let mut canonical = name;
        while let Some(target) = map.get(canonical) {
            canonical = target.as_str();
        }
        canonical.to_owned()
    }

    /// Rewrite every alias and target through `resolver`.
    ///
    /// Entries whose alias or target resolves to `None`, or to the same
    /// string, are dropped. A resolved alias that collides with an existing
    /// alias for a different name fails with `DuplicateAlias`.
    pub fn resolve_aliases<F>(&self, resolver: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut map = self.map.write();
        let snapshot: Vec<(String, String)> =
            map.iter().map(|(a, n)| (a.clone(), n.clone())).collect();

        for (alias, registered) in snapshot {
            let (Some(resolved_alias), Some(resolved_name)) =
                (resolver(&alias), resolver(&registered))
            else {
                map.remove(&alias);
                continue;
            };

            if resolved_alias == resolved_name {
                map.remove(&alias);
            } else if resolved_alias != alias {
                if let Some(existing) = map.get(&resolved_alias) {
                    if *existing == resolved_name {
                        map.remove(&alias);
                        continue;
                    }
                    return Err(RegistryError::DuplicateAlias {
                        alias: resolved_alias,
                        name: resolved_name,
                        registered,
                    });
                }
                check_for_alias_circle(&map, &resolved_name, &resolved_alias)?;
                map.remove(&alias);
                map.insert(resolved_alias, resolved_name);
            } else if registered != resolved_name {
                map.insert(alias, resolved_name);
            }
        }
        Ok(())
    }

    /// Number of registered aliases
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether no aliases are registered
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for AliasIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AliasIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasIndex")
            .field("count", &self.len())
            .field("allow_overriding", &self.allow_overriding)
            .finish()
    }
}

/// Reverse walk from `name`: is `alias` reachable through alias -> target links?
fn has_alias(map: &HashMap<String, String, RandomState>, name: &str, alias: &str) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending = vec![name];

    while let Some(current) = pending.pop() {
        for (registered_alias, target) in map.iter() {
            if target != current {
                continue;
            }
            if registered_alias == alias {
                return true;
            }
            if seen.insert(registered_alias.as_str()) {
                pending.push(registered_alias.as_str());
            }
        }
    }
    false
}

fn check_for_alias_circle(
    map: &HashMap<String, String, RandomState>,
    name: &str,
    alias: &str,
) -> Result<()> {
    if has_alias(map, alias, name) {
        return Err(RegistryError::CircularAlias {
            alias: alias.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(())
}
