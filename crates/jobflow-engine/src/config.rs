use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_JOB_NAME: &str = "job";

/// Which structural changes a job refuses while completed steps are pending
/// rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationGuard {
    /// Adding, removing, or replacing any step is refused while progress is
    /// non-empty.
    #[default]
    JobWide,
    /// Only changes naming a step that is itself pending rollback are
    /// refused.
    PerStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct JobConfig {
    name: String,
    mutation_guard: MutationGuard,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: String::from(DEFAULT_JOB_NAME),
            mutation_guard: MutationGuard::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    job: JobConfig,
}

impl JobConfig {
    /// Name used to identify the job in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mutation_guard(&self) -> MutationGuard {
        self.mutation_guard
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_mutation_guard(mut self, mutation_guard: MutationGuard) -> Self {
        self.mutation_guard = mutation_guard;
        self
    }

    /// Parse the `[job]` table of a TOML document. A document without the
    /// table yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the document is not valid TOML or the
    /// table contains unknown keys or values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(document.job)
    }

    /// Read and parse the `[job]` table of a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read and
    /// `ConfigError::ParseFile` if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ConfigDocument =
            toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(document.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_guards_job_wide() {
        let config = JobConfig::default();
        assert_eq!(config.name(), "job");
        assert_eq!(config.mutation_guard(), MutationGuard::JobWide);
    }

    #[test]
    fn missing_table_yields_defaults() -> anyhow::Result<()> {
        let config = JobConfig::from_toml_str("[other]\nkey = 1\n")?;
        assert_eq!(config, JobConfig::default());
        Ok(())
    }

    #[test]
    fn parses_job_table() -> anyhow::Result<()> {
        let config = JobConfig::from_toml_str(
            r#"
            [job]
            name = "provision"
            mutation-guard = "per-step"
            "#,
        )?;
        assert_eq!(config.name(), "provision");
        assert_eq!(config.mutation_guard(), MutationGuard::PerStep);
        Ok(())
    }

    #[test]
    fn partial_table_keeps_remaining_defaults() -> anyhow::Result<()> {
        let config = JobConfig::from_toml_str("[job]\nname = \"deploy\"\n")?;
        assert_eq!(config.name(), "deploy");
        assert_eq!(config.mutation_guard(), MutationGuard::JobWide);
        Ok(())
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = JobConfig::from_toml_str("[job]\nretries = 3\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn unknown_guard_is_rejected() {
        let result = JobConfig::from_toml_str("[job]\nmutation-guard = \"never\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn builder_methods_override_fields() {
        let config = JobConfig::default()
            .with_name("nightly")
            .with_mutation_guard(MutationGuard::PerStep);
        assert_eq!(config.name(), "nightly");
        assert_eq!(config.mutation_guard(), MutationGuard::PerStep);
    }

    #[test]
    fn load_reads_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "[job]\nmutation-guard = \"per-step\"\n")?;

        let config = JobConfig::load(&path)?;

        assert_eq!(config.mutation_guard(), MutationGuard::PerStep);
        Ok(())
    }

    #[test]
    fn load_reports_missing_file_with_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.toml");

        let err = JobConfig::load(&path).expect_err("file does not exist");

        assert!(matches!(&err, ConfigError::Read { path: p, .. } if p == &path));
        Ok(())
    }

    #[test]
    fn load_reports_parse_failure_with_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[job\n")?;

        let err = JobConfig::load(&path).expect_err("file is malformed");

        assert!(matches!(err, ConfigError::ParseFile { .. }));
        assert!(err.to_string().contains("broken.toml"));
        Ok(())
    }
}
