//! Run settings resolved from flags, the environment and `.env`.
//!
//! clap reads the process environment before the account configuration is
//! located, so anything defined only in the `.env` beside it is picked up
//! here, after that file has been loaded.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{
    AccountConfig, ConfigParser, DEFAULT_PROJECT_TAG, TemplateSource, find_config_file,
};
use crate::error::{ConfigError, Result, SyncError};
use crate::provisioner::DEFAULT_CONTROL_REGION;

use super::commands::{Cli, Commands};

/// Environment variable naming the template directory.
pub const TEMPLATE_PATH_VAR: &str = "TEMPLATE_PATH";

/// Environment variable naming the source bucket.
pub const SOURCE_BUCKET_VAR: &str = "SOURCE_BUCKET";

/// Environment variable naming the control region.
pub const CONTROL_REGION_VAR: &str = "AWS_CONTROL_REGION";

/// Environment variable holding the project tag.
pub const PROJECT_TAG_VAR: &str = "PROJECT_TAG";

/// Environment variable holding the version tag.
pub const DEPLOY_VERSION_VAR: &str = "DEPLOY_VERSION";

/// Bucket name used by `validate` when none is configured. Validation never
/// forms a template URL.
pub const UNSET_BUCKET: &str = "unset-bucket";

/// Fully resolved settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Account configuration file.
    pub config_file: PathBuf,
    /// Template directory.
    pub template_path: PathBuf,
    /// Bucket the templates are published to.
    pub source_bucket: String,
    /// Stack set administration region.
    pub region: String,
    /// Project tag value.
    pub project_tag: String,
    /// Fixed version tag, if any.
    pub tag_version: Option<String>,
}

impl Settings {
    /// Resolves settings for `cli`, loading the `.env` beside the account
    /// configuration first.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be found, the
    /// `.env` file cannot be loaded, or a required setting is missing.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config_file = match &cli.config {
            Some(path) => path.clone(),
            None => find_config_file(".")?,
        };

        Self::parser_for(&config_file).load_dotenv()?;

        Self::from_sources(cli, &config_file, |name| std::env::var(name).ok())
    }

    /// Resolves settings from flags, falling back to `lookup` and then to
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the template path is missing, or if the source
    /// bucket is missing for a command that publishes template URLs.
    pub fn from_sources(
        cli: &Cli,
        config_file: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let pick = |flag: &Option<String>, var: &str| {
            flag.clone()
                .or_else(|| lookup(var))
                .filter(|v| !v.trim().is_empty())
        };

        let template_path = cli
            .template_path
            .clone()
            .or_else(|| lookup(TEMPLATE_PATH_VAR).map(PathBuf::from))
            .ok_or_else(|| SyncError::Config(ConfigError::missing(TEMPLATE_PATH_VAR)))?;

        let source_bucket = match pick(&cli.source_bucket, SOURCE_BUCKET_VAR) {
            Some(bucket) => bucket,
            None if matches!(cli.command, Commands::Validate { .. }) => {
                debug!("No source bucket configured, validating with {UNSET_BUCKET}");
                UNSET_BUCKET.to_string()
            }
            None => return Err(SyncError::Config(ConfigError::missing(SOURCE_BUCKET_VAR))),
        };

        let settings = Self {
            config_file: config_file.to_path_buf(),
            template_path,
            source_bucket,
            region: pick(&cli.region, CONTROL_REGION_VAR)
                .unwrap_or_else(|| DEFAULT_CONTROL_REGION.to_string()),
            project_tag: pick(&cli.project_tag, PROJECT_TAG_VAR)
                .unwrap_or_else(|| DEFAULT_PROJECT_TAG.to_string()),
            tag_version: pick(&cli.tag_version, DEPLOY_VERSION_VAR),
        };

        debug!("Resolved settings: {settings:?}");
        Ok(settings)
    }

    /// Loads the account configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_config(&self) -> Result<AccountConfig> {
        Self::parser_for(&self.config_file).load_file(&self.config_file)
    }

    /// Builds the template source for these settings.
    #[must_use]
    pub fn template_source(&self) -> TemplateSource {
        TemplateSource::new(&self.template_path, &self.source_bucket)
            .with_project(&self.project_tag)
            .with_version(self.tag_version.clone())
    }

    fn parser_for(config_file: &Path) -> ConfigParser {
        ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        cli_for("plan", args)
    }

    fn cli_for(command: &str, args: &[&str]) -> Cli {
        let mut argv = vec!["stackset-sync"];
        argv.extend_from_slice(args);
        argv.push(command);
        Cli::try_parse_from(argv).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_flags_win_over_environment() {
        let settings = Settings::from_sources(
            &cli(&["--template-path", "templates", "--source-bucket", "flag-bucket"]),
            Path::new("account_config.yml"),
            env(&[(SOURCE_BUCKET_VAR, "env-bucket")]),
        )
        .unwrap();

        assert_eq!(settings.source_bucket, "flag-bucket");
        assert_eq!(settings.template_path, PathBuf::from("templates"));
    }

    #[test]
    fn test_environment_and_defaults_fill_gaps() {
        let settings = Settings::from_sources(
            &cli(&[]),
            Path::new("account_config.yml"),
            env(&[
                (TEMPLATE_PATH_VAR, "stacks"),
                (SOURCE_BUCKET_VAR, "env-bucket"),
                (DEPLOY_VERSION_VAR, "3f2a9c1"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.template_path, PathBuf::from("stacks"));
        assert_eq!(settings.source_bucket, "env-bucket");
        assert_eq!(settings.region, DEFAULT_CONTROL_REGION);
        assert_eq!(settings.project_tag, DEFAULT_PROJECT_TAG);
        assert_eq!(settings.tag_version.as_deref(), Some("3f2a9c1"));
    }

    #[test]
    fn test_missing_bucket_is_reported() {
        let result = Settings::from_sources(
            &cli(&["--template-path", "templates"]),
            Path::new("account_config.yml"),
            env(&[]),
        );

        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::MissingSetting { ref name })) if name == SOURCE_BUCKET_VAR
        ));
    }

    #[test]
    fn test_validate_does_not_need_a_bucket() {
        let settings = Settings::from_sources(
            &cli_for("validate", &["--template-path", "templates"]),
            Path::new("account_config.yml"),
            env(&[]),
        )
        .unwrap();

        assert_eq!(settings.source_bucket, UNSET_BUCKET);
    }

    #[test]
    fn test_loads_config_and_templates() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(templates.join("network.json"), "{}").unwrap();
        let config_file = dir.path().join("account_config.yml");
        std::fs::write(
            &config_file,
            "all:\n  accounts: ['111111111111']\n  regions: [us-east-1]\n",
        )
        .unwrap();

        let settings = Settings::from_sources(
            &cli(&["--source-bucket", "artifacts", "--project-tag", "platform"]),
            &config_file,
            env(&[(TEMPLATE_PATH_VAR, templates.to_str().unwrap())]),
        )
        .unwrap();

        let config = settings.load_config().unwrap();
        let units = settings.template_source().discover().unwrap();

        assert!(config.default_group().is_some());
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].tags["project"], "platform");
    }
}
