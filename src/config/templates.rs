//! Template discovery.
//!
//! Every `*.json` file in the template directory is one deployable unit. The
//! unit is named after the file name up to its first `.`, and its template
//! is expected under `stacks/` in the source bucket.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{ConfigError, Result, SyncError};

use super::hash::TemplateHasher;

/// Extension of template files.
pub const TEMPLATE_EXTENSION: &str = ".json";

/// Tag carrying the project name.
pub const PROJECT_TAG_KEY: &str = "project";

/// Tag carrying the deployed version.
pub const VERSION_TAG_KEY: &str = "version";

/// Project tag value when none is configured.
pub const DEFAULT_PROJECT_TAG: &str = "cf_demo";

/// A named template to be deployed as one stack set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployableUnit {
    /// Unit name.
    pub name: String,
    /// Template file name.
    pub file_name: String,
    /// Local path of the template.
    pub path: PathBuf,
    /// Public location of the published template.
    pub template_url: String,
    /// Tags applied to the unit.
    pub tags: BTreeMap<String, String>,
}

/// Returns the unit name of a template file: everything before the first `.`.
#[must_use]
pub fn unit_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Returns the public location of a template published to `bucket`.
#[must_use]
pub fn template_url(bucket: &str, file_name: &str) -> String {
    format!("https://s3.amazonaws.com/{bucket}/stacks/{file_name}")
}

/// Enumerates deployable units from a template directory.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// Directory holding the templates.
    dir: PathBuf,
    /// Bucket the templates are published to.
    bucket: String,
    /// Project tag value.
    project: String,
    /// Fixed version tag; derived from template content when unset.
    version: Option<String>,
    /// Hasher for derived version tags.
    hasher: TemplateHasher,
}

impl TemplateSource {
    /// Creates a source for `dir`, published to `bucket`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            bucket: bucket.into(),
            project: DEFAULT_PROJECT_TAG.to_string(),
            version: None,
            hasher: TemplateHasher::new(),
        }
    }

    /// Sets the project tag value.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Sets a fixed version tag for every unit.
    #[must_use]
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Discovers the deployable units, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or cannot be read,
    /// or if two templates resolve to the same unit name.
    pub fn discover(&self) -> Result<Vec<DeployableUnit>> {
        if !self.dir.is_dir() {
            return Err(SyncError::Config(ConfigError::TemplateDirNotFound {
                path: self.dir.clone(),
            }));
        }

        info!("Discovering templates in: {}", self.dir.display());

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(TEMPLATE_EXTENSION) {
                files.push(file_name);
            } else {
                debug!("Skipping non-template file: {file_name}");
            }
        }
        files.sort();

        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        let mut units = Vec::with_capacity(files.len());

        for file_name in files {
            let name = unit_name(&file_name).to_string();
            if let Some(first) = seen.get(&name) {
                return Err(SyncError::Config(ConfigError::DuplicateUnit {
                    name,
                    first: first.clone(),
                    second: file_name,
                }));
            }
            seen.insert(name.clone(), file_name.clone());

            units.push(self.load_unit(name, file_name)?);
        }

        info!("Found {} templates", units.len());
        Ok(units)
    }

    fn load_unit(&self, name: String, file_name: String) -> Result<DeployableUnit> {
        let path = self.dir.join(&file_name);

        let version = match &self.version {
            Some(version) => version.clone(),
            None => self.hasher.version_tag(&std::fs::read(&path)?),
        };
        debug!("Template {file_name} -> unit {name} at version {version}");

        let mut tags = BTreeMap::new();
        tags.insert(PROJECT_TAG_KEY.to_string(), self.project.clone());
        tags.insert(VERSION_TAG_KEY.to_string(), version);

        Ok(DeployableUnit {
            template_url: template_url(&self.bucket, &file_name),
            name,
            file_name,
            path,
            tags,
        })
    }
}
