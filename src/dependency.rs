// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Dependency resolution: an opaque descriptor plus a trait for
//! whatever external resolver (Maven, Ivy, a local lockfile) a job
//! configures. §1 scopes real dependency-graph resolution out of this
//! crate's job — it only needs a stable seam to append resolved
//! classpath entries onto a [`crate::jvm::Jvm`], the way
//! `penchy/jobs/dependency.py`'s `Edge`/`Dependency` objects are
//! consumed by `JVM.add_to_cp` without the JVM knowing how they were
//! resolved.

use crate::error::PenchyResult;

/// One resolvable dependency: a coordinate the resolver understands
/// (`group:artifact:version`, a path, a URL — left to the resolver).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub coordinate: String,
}

impl Dependency {
    pub fn new(coordinate: impl Into<String>) -> Self {
        Self {
            coordinate: coordinate.into(),
        }
    }
}

/// Resolves a list of [`Dependency`] descriptors into classpath
/// entries (colon-joined paths, same shape `Jvm::add_to_cp` expects).
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, dependencies: &[Dependency]) -> PenchyResult<Vec<String>>;
}

/// A resolver that treats each coordinate as a literal filesystem path
/// already present on the target node — the trivial case when a job's
/// dependencies are just jars checked into the deployed bundle.
pub struct LiteralPathResolver;

impl DependencyResolver for LiteralPathResolver {
    fn resolve(&self, dependencies: &[Dependency]) -> PenchyResult<Vec<String>> {
        Ok(dependencies.iter().map(|d| d.coordinate.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_resolver_passes_coordinates_through() {
        let resolver = LiteralPathResolver;
        let deps = vec![Dependency::new("/opt/libs/a.jar"), Dependency::new("/opt/libs/b.jar")];
        let resolved = resolver.resolve(&deps).unwrap();
        assert_eq!(resolved, vec!["/opt/libs/a.jar", "/opt/libs/b.jar"]);
    }
}
