use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dispatchr::breaker::BreakerConfig;
use dispatchr::supervisor::SupervisorConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supervisor: SupervisorSection,
    pub breaker: BreakerSection,
    pub llm: LlmSection,
    pub workers: Vec<WorkerSection>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supervisor: SupervisorSection::default(),
            breaker: BreakerSection::default(),
            llm: LlmSection::default(),
            workers: default_workers(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub max_concurrent_tasks: usize,
    pub task_timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            task_timeout_ms: 30000,
            max_retries: 3,
        }
    }
}

impl SupervisorSection {
    /// Build the core supervisor config from this section.
    ///
    /// Rejects zero knobs here so a bad config file surfaces as an error
    /// instead of a panic in the core constructor.
    pub fn to_supervisor_config(&self) -> Result<SupervisorConfig> {
        if self.max_concurrent_tasks == 0 {
            eyre::bail!("supervisor.max_concurrent_tasks must be positive");
        }
        if self.task_timeout_ms == 0 {
            eyre::bail!("supervisor.task_timeout_ms must be positive");
        }
        Ok(SupervisorConfig::new(
            self.max_concurrent_tasks,
            Duration::from_millis(self.task_timeout_ms),
            self.max_retries,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_requests: u32,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60000,
            half_open_requests: 3,
        }
    }
}

impl BreakerSection {
    /// Build the core breaker config from this section.
    pub fn to_breaker_config(&self) -> Result<BreakerConfig> {
        if self.failure_threshold == 0 {
            eyre::bail!("breaker.failure_threshold must be positive");
        }
        if self.reset_timeout_ms == 0 {
            eyre::bail!("breaker.reset_timeout_ms must be positive");
        }
        if self.half_open_requests == 0 {
            eyre::bail!("breaker.half_open_requests must be positive");
        }
        Ok(BreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            half_open_requests: self.half_open_requests,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            timeout_ms: 300000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    pub id: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Default worker pool mirroring the refactoring subagents.
fn default_workers() -> Vec<WorkerSection> {
    vec![
        WorkerSection {
            id: "pattern-detector".to_string(),
            capabilities: vec!["detect-patterns".to_string()],
            system_prompt: Some(
                "You detect design patterns and code smells in source code.".to_string(),
            ),
        },
        WorkerSection {
            id: "code-analyzer".to_string(),
            capabilities: vec!["analyze-structure".to_string()],
            system_prompt: Some(
                "You analyze code structure and complexity.".to_string(),
            ),
        },
        WorkerSection {
            id: "diff-generator".to_string(),
            capabilities: vec!["generate-diff".to_string()],
            system_prompt: Some(
                "You produce unified diffs implementing requested refactorings.".to_string(),
            ),
        },
    ]
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .context(format!("Failed to read {}", path.as_ref().display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .context(format!("Failed to parse {}", path.as_ref().display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.supervisor.max_concurrent_tasks, 5);
        assert_eq!(config.supervisor.task_timeout_ms, 30000);
        assert_eq!(config.supervisor.max_retries, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.workers.len(), 3);
        assert!(!config.debug);
    }

    #[test]
    fn test_supervisor_section_conversion() {
        let section = SupervisorSection {
            max_concurrent_tasks: 2,
            task_timeout_ms: 1500,
            max_retries: 1,
        };
        let config = section.to_supervisor_config().unwrap();
        assert_eq!(config.max_concurrent_tasks, 2);
        assert_eq!(config.task_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_supervisor_section_rejects_zero_ceiling() {
        let section = SupervisorSection {
            max_concurrent_tasks: 0,
            ..Default::default()
        };
        assert!(section.to_supervisor_config().is_err());
    }

    #[test]
    fn test_breaker_section_conversion() {
        let section = BreakerSection::default();
        let config = section.to_breaker_config().unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.half_open_requests, 3);
    }

    #[test]
    fn test_breaker_section_rejects_zero_threshold() {
        let section = BreakerSection {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(section.to_breaker_config().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "supervisor:\n  max_concurrent_tasks: 9\nworkers:\n  - id: solo\n    capabilities: [analyze-structure]\n"
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.supervisor.max_concurrent_tasks, 9);
        // Unspecified fields fall back to section defaults
        assert_eq!(config.supervisor.max_retries, 3);
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].id, "solo");
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let path = PathBuf::from("/nonexistent/dispatchr.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_default_workers_cover_refactoring_capabilities() {
        let workers = default_workers();
        let capabilities: Vec<&str> = workers
            .iter()
            .flat_map(|w| w.capabilities.iter().map(|c| c.as_str()))
            .collect();
        assert!(capabilities.contains(&"detect-patterns"));
        assert!(capabilities.contains(&"analyze-structure"));
        assert!(capabilities.contains(&"generate-diff"));
    }
}
