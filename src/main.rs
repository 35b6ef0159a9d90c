use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

use dispatchr::supervisor::Supervisor;
use dispatchr::task::{Task, TaskSpec, TaskStatus};
use dispatchr::worker::{LlmWorker, LlmWorkerConfig};

/// A batch of task submissions loaded from a YAML job file.
#[derive(Debug, Deserialize)]
struct JobFile {
    tasks: Vec<TaskSpec>,
}

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dispatchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("dispatchr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_jobs(path: &Path) -> Result<JobFile> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read job file {}", path.display()))?;
    let jobs: JobFile = serde_yaml::from_str(&content)
        .context(format!("Failed to parse job file {}", path.display()))?;
    Ok(jobs)
}

/// Build a supervisor with one LLM worker per configured worker entry.
fn build_supervisor(config: &Config) -> Result<Supervisor> {
    let supervisor = Supervisor::new(config.supervisor.to_supervisor_config()?);

    for worker_cfg in &config.workers {
        let llm_config = LlmWorkerConfig {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            system_prompt: worker_cfg.system_prompt.clone(),
            timeout: std::time::Duration::from_millis(config.llm.timeout_ms),
            breaker: config.breaker.to_breaker_config()?,
        };
        let worker = LlmWorker::new(llm_config)
            .context(format!("Failed to build worker {}", worker_cfg.id))?;
        supervisor.register_worker(
            worker_cfg.id.clone(),
            Arc::new(worker),
            worker_cfg.capabilities.clone(),
        )?;
    }

    Ok(supervisor)
}

async fn handle_run_command(jobs_path: &Path, config: &Config) -> Result<()> {
    info!("Running job file: {}", jobs_path.display());

    let jobs = load_jobs(jobs_path)?;
    if jobs.tasks.is_empty() {
        println!("{}", "Job file contains no tasks".yellow());
        return Ok(());
    }

    let supervisor = build_supervisor(config)?;

    let mut ids = Vec::new();
    for spec in jobs.tasks {
        ids.push(supervisor.submit(spec));
    }
    println!("{} {} task(s) submitted", "Dispatching:".cyan(), ids.len());

    supervisor.orchestrate().await?;

    for id in &ids {
        match supervisor.task_status(id) {
            Some(task) => {
                println!("{}", outcome_line(id, &task));
                if task.status == TaskStatus::Completed
                    && let Some(result) = task.result
                {
                    println!("{}", result);
                }
            }
            None => println!("{} {}", "Unknown task:".red(), id),
        }
    }

    Ok(())
}

/// Render one task's final state for terminal output.
fn outcome_line(id: &str, task: &Task) -> String {
    match task.status {
        TaskStatus::Completed => format!("{} {}", "Completed:".green(), id),
        TaskStatus::Failed => format!(
            "{} {} ({} retries): {}",
            "Failed:".red(),
            id,
            task.retry_count,
            task.error.clone().unwrap_or_default()
        ),
        TaskStatus::Cancelled => format!("{} {}", "Cancelled:".yellow(), id),
        status => {
            // Still queued: no worker ever matched its capability.
            format!("{} {} is {}", "Stalled:".yellow(), id, status.as_str())
        }
    }
}

fn handle_validate_command(jobs_path: &Path) -> Result<()> {
    info!("Validating job file: {}", jobs_path.display());

    let jobs = load_jobs(jobs_path)?;
    println!("{} {} task(s)", "Valid:".green(), jobs.tasks.len());
    for spec in &jobs.tasks {
        println!(
            "  {} type={} priority={}",
            spec.id.cyan(),
            spec.task_type,
            spec.priority
        );
    }

    Ok(())
}

fn handle_workers_command(config: &Config) -> Result<()> {
    println!("{}", "Configured workers:".cyan());
    for worker in &config.workers {
        println!("  {} [{}]", worker.id.green(), worker.capabilities.join(", "));
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }
    if config.debug {
        println!("{}", "Debug mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { jobs } => handle_run_command(jobs, config).await,
        Commands::Validate { jobs } => handle_validate_command(jobs),
        Commands::Workers => handle_workers_command(config),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref())?;

    run_application(&cli, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str) -> Task {
        Task::from_spec(TaskSpec {
            id: id.to_string(),
            task_type: "analyze-structure".to_string(),
            input: json!({"target": "lib.rs"}),
            priority: 0,
        })
    }

    #[test]
    fn test_outcome_line_completed() {
        let mut t = task("t1");
        t.mark_running();
        t.complete("done".to_string());
        assert!(outcome_line("t1", &t).contains("Completed:"));
    }

    #[test]
    fn test_outcome_line_failed_includes_error() {
        let mut t = task("t1");
        t.mark_running();
        t.fail("boom".to_string());
        let line = outcome_line("t1", &t);
        assert!(line.contains("Failed:"));
        assert!(line.contains("boom"));
    }

    #[test]
    fn test_outcome_line_cancelled_is_not_stalled() {
        let mut t = task("t1");
        t.mark_cancelled();
        let line = outcome_line("t1", &t);
        assert!(line.contains("Cancelled:"));
        assert!(!line.contains("Stalled:"));
    }

    #[test]
    fn test_outcome_line_queued_is_stalled() {
        let t = task("t1");
        let line = outcome_line("t1", &t);
        assert!(line.contains("Stalled:"));
        assert!(line.contains("queued"));
    }
}
