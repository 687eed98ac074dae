use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use crate::app::RunSummary;
use crate::progress::{ProgressEvent, ProgressSink, ProgressUnit};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Renders progress events as log lines, at most one per 10 % of a task.
#[derive(Default)]
pub struct LogProgress {
    tasks: Mutex<HashMap<String, TaskState>>,
}

struct TaskState {
    unit: ProgressUnit,
    total: Option<u64>,
    done: u64,
    reported: u64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        match event {
            ProgressEvent::Phase { verb, message } => info!("{verb:>12} {message}"),
            ProgressEvent::TaskStarted { task, unit, total } => {
                tasks.insert(
                    task,
                    TaskState {
                        unit,
                        total,
                        done: 0,
                        reported: 0,
                    },
                );
            }
            ProgressEvent::TaskAdvanced { task, amount } => {
                let Some(state) = tasks.get_mut(&task) else {
                    return;
                };
                state.done += amount;
                let Some(total) = state.total.filter(|total| *total > 0) else {
                    return;
                };
                let percent = (state.done.min(total) * 100 / total) / 10 * 10;
                if percent > state.reported {
                    state.reported = percent;
                    info!(
                        "{task:>12} {percent:>3}% ({}/{total} {})",
                        state.done,
                        state.unit.as_str()
                    );
                }
            }
            ProgressEvent::TaskFinished { task, elapsed } => {
                if let Some(state) = tasks.remove(&task) {
                    info!(
                        "{:>12} {task} ({} {}) in {:.2}s",
                        "Finished",
                        state.done,
                        state.unit.as_str(),
                        elapsed.as_secs_f64()
                    );
                }
            }
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn print_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}BGC composition summary{reset}");
    println!(
        "{green}Clusters: {}  Domains: {}  Mode: {}{reset}",
        summary.clusters, summary.domains, summary.composition
    );
    if summary.missing > 0 {
        println!("{yellow}Missing compositions for {} BGCs{reset}", summary.missing);
    }
    println!("{cyan}   labels: {}{reset}", summary.artifacts.labels);
    println!("{cyan}   domains: {}{reset}", summary.artifacts.domains);
    println!("{cyan}   compositions: {}{reset}", summary.artifacts.compositions);
}
