#![no_main]

//! Fuzz target for alias registration
//!
//! Drives random register/remove sequences over a small name space and checks
//! that alias chains never close into a cycle.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use singleton_registry::{AliasIndex, RegistryError};

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn name(index: u8) -> &'static str {
    NAMES[index as usize % NAMES.len()]
}

#[derive(Debug, Arbitrary)]
enum AliasOp {
    Register { name: u8, alias: u8 },
    Remove { alias: u8 },
    Canonical { name: u8 },
}

#[derive(Debug, Arbitrary)]
struct AliasScenario {
    allow_overriding: bool,
    ops: Vec<AliasOp>,
}

fuzz_target!(|scenario: AliasScenario| {
    let index = AliasIndex::with_overriding(scenario.allow_overriding);

    for op in scenario.ops.into_iter().take(200) {
        match op {
            AliasOp::Register { name: n, alias: a } => {
                let before = index.len();
                match index.register_alias(name(n), name(a)) {
                    Ok(()) => {}
                    Err(RegistryError::CircularAlias { .. })
                    | Err(RegistryError::DuplicateAlias { .. }) => {
                        assert_eq!(index.len(), before, "rejected alias changed the index");
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            AliasOp::Remove { alias } => {
                let was_alias = index.is_alias(name(alias));
                let removed = index.remove_alias(name(alias)).is_ok();
                assert_eq!(was_alias, removed);
            }
            AliasOp::Canonical { name: n } => {
                let canonical = index.canonical_name(name(n));
                assert!(!index.is_alias(&canonical));
            }
        }

        // Every alias of a name must resolve to the same canonical name
        for target in NAMES {
            let canonical = index.canonical_name(target);
            for alias in index.aliases_of(target) {
                assert_eq!(index.canonical_name(&alias), canonical);
                assert_ne!(alias, target, "alias cycle through {target}");
            }
        }
    }
});
