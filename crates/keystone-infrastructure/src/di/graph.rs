//! Declared dependency graph validation
//!
//! Runs before any factory is invoked: a depth-first walk with a visiting
//! stack over the dependency lists factories declared at registration.
//! Cached kinds are leaves since they never need construction.

use std::collections::HashSet;

use keystone_domain::error::{Error, Result};
use keystone_domain::key::TypeKey;

use crate::constants::MAX_RESOLUTION_DEPTH;

/// What the registry knows about a kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DependencyNode {
    /// An instance is cached
    Cached,
    /// A factory with these declared dependencies is registered
    Factory(Vec<TypeKey>),
    /// Neither cached nor constructible
    Missing,
}

/// Fail with [`Error::Cycle`] or [`Error::Construction`] if `root` cannot be built
pub(crate) fn check_dependencies<L>(root: TypeKey, lookup: L) -> Result<()>
where
    L: Fn(TypeKey) -> DependencyNode,
{
    let mut stack = Vec::new();
    let mut done = HashSet::new();
    visit(root, &lookup, &mut stack, &mut done)
}

fn visit<L>(
    key: TypeKey,
    lookup: &L,
    stack: &mut Vec<TypeKey>,
    done: &mut HashSet<TypeKey>,
) -> Result<()>
where
    L: Fn(TypeKey) -> DependencyNode,
{
    if done.contains(&key) {
        return Ok(());
    }
    if let Some(pos) = stack.iter().position(|visiting| *visiting == key) {
        let path = stack[pos..]
            .iter()
            .chain(std::iter::once(&key))
            .map(ToString::to_string);
        return Err(Error::cycle(path));
    }
    if stack.len() >= MAX_RESOLUTION_DEPTH {
        return Err(Error::construction(
            key.to_string(),
            format!("dependency chain deeper than {MAX_RESOLUTION_DEPTH}"),
        ));
    }

    match lookup(key) {
        DependencyNode::Cached => {}
        DependencyNode::Missing => {
            return Err(match stack.last() {
                Some(parent) => Error::construction(
                    parent.to_string(),
                    format!("unresolved dependency {key}: no factory registered"),
                ),
                None => Error::construction(key.to_string(), "no factory registered"),
            });
        }
        DependencyNode::Factory(dependencies) => {
            stack.push(key);
            for dependency in dependencies {
                visit(dependency, lookup, stack, done)?;
            }
            stack.pop();
        }
    }

    done.insert(key);
    Ok(())
}
