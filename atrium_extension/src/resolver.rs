//! Dependency resolution for extension loading.
//!
//! The resolver builds a dependency graph over the enabled manifests,
//! drops optional edges whose target is absent (or version-mismatched),
//! marks extensions with unsatisfied required dependencies unloadable
//! (transitively), and topologically sorts the rest. A cycle aborts
//! resolution with an error naming the cycle. Resolution is
//! deterministic: ties break by name.

use atrium_core::error::{ExtensionError, Result};
use atrium_core::utils::Version;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::manifest::ExtensionManifest;

/// One extension that cannot load, with the reasons why.
#[derive(Debug, Clone, PartialEq)]
pub struct Unloadable {
    /// Extension name.
    pub name: String,
    /// Human-readable reasons, one per failed dependency.
    pub reasons: Vec<String>,
}

/// The outcome of dependency resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Loadable extensions in initialization order.
    pub order: Vec<String>,
    /// Extensions that cannot load, with reasons. Reported, not fatal.
    pub unloadable: Vec<Unloadable>,
}

/// Resolve the load order for the given manifests.
pub fn resolve(manifests: &[ExtensionManifest]) -> Result<Resolution> {
    for manifest in manifests {
        manifest.validate()?;
    }

    // Sorted name -> manifest map makes every traversal deterministic.
    let by_name: BTreeMap<&str, &ExtensionManifest> =
        manifests.iter().map(|m| (m.name.as_str(), m)).collect();
    let versions: HashMap<&str, Version> = by_name
        .iter()
        .map(|(name, m)| Ok((*name, m.parsed_version()?)))
        .collect::<Result<_>>()?;

    // Pass 1: mark extensions with unsatisfied required dependencies,
    // cascading to their dependents.
    let mut unloadable: BTreeMap<String, Vec<String>> = BTreeMap::new();
    loop {
        let mut changed = false;
        for (name, manifest) in &by_name {
            if unloadable.contains_key(*name) {
                continue;
            }
            let mut reasons = Vec::new();
            for dependency in &manifest.dependencies {
                if dependency.optional {
                    continue;
                }
                let present = versions.get(dependency.name.as_str());
                if !dependency.is_satisfied_by(present)? {
                    reasons.push(match present {
                        None => format!("required dependency '{}' is not enabled", dependency.name),
                        Some(v) => format!(
                            "required dependency '{}' {} does not satisfy {}",
                            dependency.name,
                            v,
                            dependency.version.as_deref().unwrap_or("*")
                        ),
                    });
                } else if unloadable.contains_key(dependency.name.as_str()) {
                    reasons.push(format!(
                        "required dependency '{}' is unloadable",
                        dependency.name
                    ));
                }
            }
            if !reasons.is_empty() {
                warn!(extension = *name, ?reasons, "extension marked unloadable");
                unloadable.insert(name.to_string(), reasons);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Pass 2: topological sort over the loadable graph. Optional edges
    // count only when the target is present and satisfying.
    let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, manifest) in &by_name {
        if unloadable.contains_key(*name) {
            continue;
        }
        let mut deps = Vec::new();
        for dependency in &manifest.dependencies {
            if unloadable.contains_key(dependency.name.as_str()) {
                continue;
            }
            let present = versions.get(dependency.name.as_str());
            if present.is_some() && dependency.is_satisfied_by(present)? {
                deps.push(dependency.name.as_str());
            }
        }
        deps.sort_unstable();
        edges.insert(*name, deps);
    }

    let mut order = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();
    let mut in_progress: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        edges: &BTreeMap<&'a str, Vec<&'a str>>,
        done: &mut HashSet<&'a str>,
        in_progress: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains(node) {
            return Ok(());
        }
        if let Some(position) = in_progress.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> =
                in_progress[position..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Err(ExtensionError::Cycle { cycle }.into());
        }
        in_progress.push(node);
        if let Some(deps) = edges.get(node) {
            for dep in deps {
                visit(dep, edges, done, in_progress, order)?;
            }
        }
        in_progress.pop();
        done.insert(node);
        order.push(node.to_string());
        Ok(())
    }

    for node in edges.keys() {
        visit(node, &edges, &mut done, &mut in_progress, &mut order)?;
    }

    debug!(?order, unloadable = unloadable.len(), "extension resolution complete");

    Ok(Resolution {
        order,
        unloadable: unloadable
            .into_iter()
            .map(|(name, reasons)| Unloadable { name, reasons })
            .collect(),
    })
}
