//! `run` command: drive a scheduler and render its events

use crate::core::models::{format_hms, RunSettings};
use crate::events::{RunEvent, RunSummary, StopReason};
use crate::scheduler::RepeatScheduler;
use crate::signal::install_ctrl_c;
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Run until the scheduler finishes; returns why it stopped.
pub async fn execute(settings: RunSettings, json: bool) -> Result<StopReason> {
    let scheduler = RepeatScheduler::with_http_probe(settings)?;
    let mut handle = scheduler.spawn();
    let ctrl_c = install_ctrl_c(handle.token.clone());

    let mut renderer = if json {
        Renderer::Json
    } else {
        Renderer::progress()
    };
    while let Some(event) = handle.events.recv().await {
        renderer.render(&event)?;
    }

    ctrl_c.abort();
    let summary = handle.task.await?;
    Ok(summary.stop_reason)
}

enum Renderer {
    Json,
    Progress {
        spinner: ProgressBar,
        position: String,
    },
}

impl Renderer {
    fn progress() -> Self {
        let spinner = ProgressBar::new_spinner().with_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message("Starting...");
        Renderer::Progress {
            spinner,
            position: String::new(),
        }
    }

    fn render(&mut self, event: &RunEvent) -> Result<()> {
        match self {
            Renderer::Json => {
                println!("{}", serde_json::to_string(event)?);
            }
            Renderer::Progress { spinner, position } => match event {
                RunEvent::Title { title, .. } => {
                    spinner.println(format!("{} {}", style("▶").cyan(), style(title).bold()));
                }
                RunEvent::IterationStarted {
                    iteration, total, ..
                } => {
                    *position = match total {
                        Some(total) => format!("[{}/{}]", iteration, total),
                        None => format!("[{}/∞]", iteration),
                    };
                    spinner.set_prefix(position.clone());
                }
                RunEvent::Countdown { remaining_secs } => {
                    spinner.set_message(format_hms(*remaining_secs));
                }
                RunEvent::Error { category, message } => {
                    spinner.println(format!(
                        "{} {}",
                        style(format!("{} error:", category)).red().bold(),
                        message
                    ));
                }
                RunEvent::Diagnostic { message } => {
                    spinner.println(format!("{} {}", style("warning:").yellow(), message));
                }
                RunEvent::Finished { summary } => {
                    spinner.finish_and_clear();
                    println!("{}", describe(summary));
                }
            },
        }
        Ok(())
    }
}

fn describe(summary: &RunSummary) -> String {
    let elapsed = (summary.finished_at - summary.started_at)
        .num_seconds()
        .max(0) as u64;
    let verdict = match summary.stop_reason {
        StopReason::Completed => style("Completed").green(),
        StopReason::Cancelled => style("Cancelled").yellow(),
        StopReason::Failed => style("Failed").red(),
    };
    format!(
        "{}: {} iteration(s), {} launch(es), elapsed {}",
        verdict,
        summary.iterations_completed,
        summary.launches,
        format_hms(elapsed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_describe_summary() {
        let now = Utc::now();
        let summary = RunSummary {
            iterations_completed: 2,
            launches: 2,
            stop_reason: StopReason::Completed,
            started_at: now - chrono::Duration::seconds(75),
            finished_at: now,
        };
        let text = describe(&summary);
        assert!(text.contains("2 iteration(s)"));
        assert!(text.contains("00:01:15"));
    }
}
