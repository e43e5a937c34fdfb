// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Manifest catalog: the bundled, versioned CoreDNS release templates.
//!
//! Each [`Release`] is embedded at compile time and never mutated at runtime.
//! Its [`PatchRules`] describe image substitutions applied during rendering
//! and which releases are withheld from selection.

use crate::errors::RenderError;
use crate::resource::Resource;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Image and release patch rules carried by a release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchRules {
    /// Image prefixes left untouched by registry rewriting
    pub ignored_images: Vec<String>,
    /// Ordered `(find, replace)` pairs applied to image references
    pub image_replacements: Vec<(String, String)>,
    /// Release versions withheld from listing and selection
    pub ignored_releases: BTreeSet<String>,
}

/// One versioned, immutable bundle of resource templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub manifest_path: String,
    pub patch_rules: PatchRules,
    source: String,
}

impl Release {
    #[must_use]
    pub fn new(version: &str, manifest_path: &str, source: &str, patch_rules: PatchRules) -> Self {
        Self {
            version: version.to_string(),
            manifest_path: manifest_path.to_string(),
            patch_rules,
            source: source.to_string(),
        }
    }

    /// Decode the multi-document template into typed resources, in document order.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Template` if a document is not valid YAML or is
    /// not a supported resource.
    pub fn resources(&self) -> Result<Vec<Resource>, RenderError> {
        let template_error = |reason: String| RenderError::Template {
            version: self.version.clone(),
            reason,
        };

        let mut resources = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&self.source) {
            let value = serde_json::Value::deserialize(document)
                .map_err(|e| template_error(e.to_string()))?;
            if value.is_null() {
                continue;
            }
            let resource =
                Resource::from_value(value).map_err(|e| template_error(e.to_string()))?;
            resources.push(resource);
        }
        Ok(resources)
    }
}

/// Parse `vMAJOR.MINOR.PATCH` (leading `v` optional) into a comparable tuple.
#[must_use]
pub fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let mut parts = trimmed.split('.').map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().unwrap_or(Ok(0)).ok()?;
    let patch = parts.next().unwrap_or(Ok(0)).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Semantic ordering of version strings; unparseable versions sort first, by text.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// The library of releases available to the renderer.
#[derive(Debug, Clone)]
pub struct Catalog {
    releases: Vec<Release>,
}

impl Catalog {
    /// Catalog over an explicit set of releases, kept in ascending version order.
    #[must_use]
    pub fn new(mut releases: Vec<Release>) -> Self {
        releases.sort_by(|a, b| compare_versions(&a.version, &b.version));
        Self { releases }
    }

    /// The releases compiled into this binary.
    #[must_use]
    pub fn bundled() -> Self {
        let legacy_registry = PatchRules {
            image_replacements: vec![("k8s.gcr.io/".to_string(), "registry.k8s.io/".to_string())],
            ..PatchRules::default()
        };

        Self::new(vec![
            Release::new(
                "v1.11.3",
                "templates/coredns/v1.11.3/coredns.yaml",
                include_str!("../templates/coredns/v1.11.3/coredns.yaml"),
                legacy_registry,
            ),
            Release::new(
                "v1.12.1",
                "templates/coredns/v1.12.1/coredns.yaml",
                include_str!("../templates/coredns/v1.12.1/coredns.yaml"),
                PatchRules::default(),
            ),
        ])
    }

    fn ignored(&self) -> BTreeSet<&str> {
        self.releases
            .iter()
            .flat_map(|r| r.patch_rules.ignored_releases.iter().map(String::as_str))
            .collect()
    }

    /// Selectable releases, ascending.
    pub fn available(&self) -> impl Iterator<Item = &Release> {
        let ignored = self.ignored();
        self.releases
            .iter()
            .filter(move |r| !ignored.contains(r.version.as_str()))
    }

    /// Selectable release versions, ascending.
    #[must_use]
    pub fn list_versions(&self) -> Vec<String> {
        self.available().map(|r| r.version.clone()).collect()
    }

    /// Resolve a release selector; `None` selects the newest release.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::UnknownRelease` if no selectable release matches.
    pub fn select(&self, selector: Option<&str>) -> Result<&Release, RenderError> {
        let found = match selector {
            None => self.available().last(),
            Some(wanted) => {
                let wanted_version = parse_version(wanted);
                self.available().find(|r| {
                    r.version == wanted
                        || (wanted_version.is_some() && parse_version(&r.version) == wanted_version)
                })
            }
        };
        found.ok_or_else(|| RenderError::UnknownRelease {
            release: selector.unwrap_or("latest").to_string(),
        })
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod catalog_tests;
