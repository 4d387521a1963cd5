//! Transitive dependency expansion for a single root package.
//!
//! The walk is iterative: an explicit stack of expand/emit frames replaces
//! recursion so deep graphs never grow the call stack. Every package is emitted
//! after all of its dependencies, and each identity is emitted at most once.

use crate::{
    error::ItemFailure,
    index::PackageIndex,
    package::{DependencySpecifier, Package, PackageIdentity, PackageVersion},
    profile::Profile,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub package: Package,
    pub version: PackageVersion,
}

impl ResolvedPackage {
    pub fn new(package: Package, version: PackageVersion) -> Self {
        Self { package, version }
    }

    pub fn identity(&self) -> PackageIdentity {
        self.package.identity()
    }

    pub fn full_name(&self) -> &str {
        &self.version.full_name
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    /// Install order: dependencies first, the root last.
    pub packages: Vec<ResolvedPackage>,
    /// Specifiers the index did not know. Dropped with a warning.
    pub unknown: Vec<String>,
    /// Subtrees skipped because the index lookup failed.
    pub failures: Vec<ItemFailure>,
}

impl Resolution {
    pub fn dependencies(&self) -> &[ResolvedPackage] {
        let len = self.packages.len().saturating_sub(1);
        &self.packages[..len]
    }

    pub fn root(&self) -> Option<&ResolvedPackage> {
        self.packages.last()
    }
}

enum Frame {
    Expand(ResolvedPackage),
    Emit(ResolvedPackage),
}

pub struct DependencyResolver<'a> {
    index: &'a dyn PackageIndex,
    game_id: &'a str,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(index: &'a dyn PackageIndex, game_id: &'a str) -> Self {
        Self { index, game_id }
    }

    /// Everything that must be installed so `root` and its transitive dependencies
    /// are present in `profile`. Dependencies already in the profile under the same
    /// `namespace-name` count as satisfied whatever their version.
    pub fn resolve(&self, root: ResolvedPackage, profile: &Profile) -> Resolution {
        let mut resolution = Resolution::default();
        let mut expanded: HashSet<PackageIdentity> = HashSet::new();
        let mut known: HashMap<PackageIdentity, Package> = HashMap::new();
        let mut unknown: HashSet<PackageIdentity> = HashSet::new();
        let mut stack = vec![Frame::Expand(root)];

        while let Some(frame) = stack.pop() {
            let node = match frame {
                Frame::Emit(node) => {
                    resolution.packages.push(node);
                    continue;
                }
                Frame::Expand(node) => node,
            };
            if !expanded.insert(node.identity()) {
                continue;
            }

            let wanted: Vec<DependencySpecifier> = node
                .version
                .dependency_specifiers()
                .into_iter()
                .filter(|spec| !profile.is_installed(&spec.identity))
                .filter(|spec| !expanded.contains(&spec.identity))
                .collect();

            let children = self.fetch_children(&node, &wanted, &mut known, &mut unknown, &mut resolution);
            stack.push(Frame::Emit(node));
            // Reversed so the first declared dependency is expanded first.
            for child in children.into_iter().rev() {
                stack.push(Frame::Expand(child));
            }
        }

        resolution
    }

    fn fetch_children(
        &self,
        node: &ResolvedPackage,
        wanted: &[DependencySpecifier],
        known: &mut HashMap<PackageIdentity, Package>,
        unknown: &mut HashSet<PackageIdentity>,
        resolution: &mut Resolution,
    ) -> Vec<ResolvedPackage> {
        let mut missing: Vec<String> = Vec::new();
        for spec in wanted {
            if known.contains_key(&spec.identity) || unknown.contains(&spec.identity) {
                continue;
            }
            let name = spec.identity.full_name();
            if !missing.contains(&name) {
                missing.push(name);
            }
        }

        if !missing.is_empty() {
            match self.index.lookup_by_names(self.game_id, &missing) {
                Ok(found) => {
                    for name in found.unknown {
                        warn!(dependency = %name, required_by = node.full_name(), "dependency not in index");
                        if let Some(spec) = wanted.iter().find(|spec| spec.identity.full_name() == name) {
                            unknown.insert(spec.identity.clone());
                        }
                        resolution.unknown.push(name);
                    }
                    for package in found.found {
                        known.insert(package.identity(), package);
                    }
                }
                Err(err) => {
                    warn!(package = node.full_name(), error = %err, "dependency lookup failed, skipping subtree");
                    resolution
                        .failures
                        .push(ItemFailure::new(node.full_name(), &err));
                    return Vec::new();
                }
            }
        }

        let mut children = Vec::new();
        for spec in wanted {
            let Some(package) = known.get(&spec.identity) else {
                continue;
            };
            let Some(version) = package.version_or_latest(spec.version) else {
                warn!(dependency = %spec, "package has no versions");
                continue;
            };
            debug!(dependency = %version.full_name, required_by = node.full_name(), "resolved dependency");
            children.push(ResolvedPackage::new(package.clone(), version.clone()));
        }
        children
    }
}
