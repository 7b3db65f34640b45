mod cli;
mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use cli::{Cli, Command};
use extrator::analyzer::AnalyzerKind;
use extrator::state_machine::display_name;
use extrator::{Bridge, ExtratorConfig, JobOrchestrator, telemetry};
use ui::BatchProgress;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let mut config = ExtratorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Process {
            files,
            mime,
            any_type,
            timeout,
            jobs,
            json,
        } => {
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            if let Some(jobs) = jobs {
                config.max_concurrent_jobs = jobs;
            }
            config.validate()?;
            let bridge = Bridge::from_config(&config)?;
            run_process(&bridge, &config, files, mime.as_deref(), any_type, json).await
        }
        Command::Fetch { url } => {
            let bridge = Bridge::from_config(&config)?;
            let response = bridge.fetch_data(&url).await?;
            println!("{}", response.body);
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyzers => {
            print_analyzers(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_process(
    bridge: &Bridge,
    config: &ExtratorConfig,
    files: Vec<PathBuf>,
    mime_override: Option<&str>,
    any_type: bool,
    json: bool,
) -> Result<ExitCode> {
    let orchestrator = bridge.orchestrator();
    let mut progress = (!json).then(BatchProgress::new);
    let mut handles = Vec::new();
    let mut any_failed = false;

    for file in files {
        let mime = mime_override.map(String::from).unwrap_or_else(|| guess_mime(&file));
        let name = display_name(&file);
        if !any_type && !config.is_allowed_type(&mime) {
            let kind = if mime.is_empty() { "no type" } else { mime.as_str() };
            let message = format!("unsupported format: {name} ({kind})");
            match &progress {
                Some(p) => p.rejected(&message),
                None => eprintln!("{message}"),
            }
            any_failed = true;
            continue;
        }

        let path = std::path::absolute(&file)
            .with_context(|| format!("failed to resolve path {}", file.display()))?;
        let handle = orchestrator.submit(path, mime.clone());
        debug!(job_id = handle.job_id(), file = %name, "submitted");
        if let Some(p) = progress.as_mut() {
            p.start(handle.job_id(), &name, &mime);
        }
        handles.push(handle);
    }

    let mut completions = JobOrchestrator::completions(handles);
    while let Some(done) = completions.recv().await {
        any_failed |= !done.result.is_success();
        match progress.as_mut() {
            Some(p) => p.complete(&done),
            None => {
                let line = serde_json::json!({
                    "job_id": done.job_id,
                    "file": done.file_path,
                    "mime_type": done.mime_type,
                    "result": done.result,
                    "report": done.report,
                });
                println!("{line}");
            }
        }
    }

    Ok(if any_failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_analyzers(config: &ExtratorConfig) {
    let table = config.analyzer_table();
    let limits = config.job_limits();
    let interpreter = table
        .interpreter()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());

    println!("interpreter:        {interpreter}");
    println!("image/*:            {}", table.executable(AnalyzerKind::Image).display());
    println!("everything else:    {}", table.executable(AnalyzerKind::Document).display());
    println!("deadline:           {}s", limits.deadline.as_secs());
    println!("max output:         {} bytes", limits.max_output_bytes);
    println!("concurrent jobs:    {}", limits.max_concurrent_jobs);
    println!("allowed types:      {}", config.allowed_types.join(", "));
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .map(String::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(guess_mime(Path::new("invoice.pdf")), "application/pdf");
        assert_eq!(guess_mime(Path::new("photo.png")), "image/png");
        assert_eq!(guess_mime(Path::new("scan.jpg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("no_extension")), "");
    }
}
