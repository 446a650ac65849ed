//! The repeat loop
//!
//! A scheduler run owns everything that outlives a single iteration: the
//! protected set captured before the first launch, the temporary profile
//! directory, and the cancellation token. However the loop ends, the last
//! browser is swept, the directory is removed, and a `Finished` event is the
//! final message on the channel.

use crate::config::PROFILE_DIR_PREFIX;
use crate::core::models::{ProcessSet, RunSettings};
use crate::core::ownership::Ownership;
use crate::core::process_tree::ProcessSnapshot;
use crate::error::{RepeaterError, RepeaterResult};
use crate::events::{event_channel, EventSender, RunEvent, RunSummary, StopReason};
use crate::logging::{debug, warn};
use crate::probe::{HttpProbe, ReachabilityProbe};
use crate::signal::CancellationToken;
use crate::supervisor::{
    IterationOutcome, LaunchSupervisor, RunContext, TerminationPolicy, VideoInfoSource,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// A scheduler running on a background task.
pub struct RunHandle {
    pub token: CancellationToken,
    pub events: UnboundedReceiver<RunEvent>,
    pub task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Request a stop; the worker finishes its cleanup first.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }
}

pub struct RepeatScheduler {
    settings: RunSettings,
    probe: Arc<dyn ReachabilityProbe>,
    video_info: Option<Arc<dyn VideoInfoSource>>,
    policy: TerminationPolicy,
    temp_root: Option<PathBuf>,
}

impl RepeatScheduler {
    pub fn new(settings: RunSettings, probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            settings,
            probe,
            video_info: None,
            policy: TerminationPolicy::default(),
            temp_root: None,
        }
    }

    /// Scheduler probing the configured video host over HTTP.
    pub fn with_http_probe(settings: RunSettings) -> RepeaterResult<Self> {
        Ok(Self::new(settings, Arc::new(HttpProbe::from_env()?)))
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_video_info(mut self, source: Arc<dyn VideoInfoSource>) -> Self {
        self.video_info = Some(source);
        self
    }

    /// Create profile directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Start the run on a tokio task with a fresh cancellation token.
    pub fn spawn(self) -> RunHandle {
        let token = CancellationToken::new();
        let (tx, rx) = event_channel();
        let worker_token = token.clone();
        let task = tokio::spawn(async move { self.run(worker_token, tx).await });
        RunHandle {
            token,
            events: rx,
            task,
        }
    }

    /// Run to completion, cancellation or the first error.
    ///
    /// Errors are reported on `events`, never returned.
    pub async fn run(self, token: CancellationToken, events: EventSender) -> RunSummary {
        let started_at = Utc::now();
        let target = crate::browser::executable_name(&self.settings.browser);

        // captured before anything is launched and never refreshed
        let protected = ProcessSnapshot::capture(&target);
        debug(format!(
            "Protected {} pre-existing '{}' process(es)",
            protected.len(),
            target
        ));

        let mut iterations_completed = 0u32;
        let mut stop_reason = StopReason::Completed;

        let profile_dir = match self.create_profile_dir() {
            Ok(dir) => Some(dir),
            Err(err) => {
                events.error(&err);
                stop_reason = StopReason::Failed;
                None
            }
        };

        let mut supervisor = LaunchSupervisor::new(
            &self.settings,
            self.probe.as_ref(),
            token.clone(),
            events.clone(),
        )
        .with_policy(self.policy);
        if let Some(source) = self.video_info.as_deref() {
            supervisor = supervisor.with_video_info(source);
        }

        if let Some(dir) = profile_dir.as_ref() {
            while self.settings.repeat.allows(iterations_completed) {
                if token.is_cancelled() {
                    stop_reason = StopReason::Cancelled;
                    break;
                }

                let ctx = RunContext::new(
                    Some(dir.path().to_path_buf()),
                    self.settings.incognito,
                    protected.clone(),
                );
                match supervisor.run_iteration(iterations_completed + 1, ctx).await {
                    Ok(IterationOutcome::Completed) => iterations_completed += 1,
                    Ok(IterationOutcome::Cancelled) => {
                        stop_reason = StopReason::Cancelled;
                        break;
                    }
                    Err(err) => {
                        warn(format!("Run stopped: {}", err));
                        events.error(&err);
                        stop_reason = StopReason::Failed;
                        break;
                    }
                }
            }
        }

        self.backstop(&mut supervisor, &protected).await;
        let launches = supervisor.launches();
        drop(supervisor);

        if let Some(dir) = profile_dir {
            remove_profile_dir(dir);
        }

        let summary = RunSummary {
            iterations_completed,
            launches,
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        };
        debug(format!(
            "Run finished: {:?} after {} iteration(s)",
            summary.stop_reason, summary.iterations_completed
        ));
        events.send(RunEvent::Finished {
            summary: summary.clone(),
        });
        summary
    }

    /// Last-chance sweep against the pre-run protected set.
    async fn backstop(&self, supervisor: &mut LaunchSupervisor<'_>, protected: &ProcessSet) {
        let mut modes = Vec::with_capacity(2);
        if let Some(primary) = supervisor.live_primary() {
            modes.push(Ownership::Tree { primary });
        }
        modes.push(Ownership::IncognitoSweep);
        supervisor.stop_owned(protected, &modes).await;
    }

    fn create_profile_dir(&self) -> RepeaterResult<TempDir> {
        let root = self.temp_root.clone().unwrap_or_else(std::env::temp_dir);
        tempfile::Builder::new()
            .prefix(PROFILE_DIR_PREFIX)
            .tempdir_in(&root)
            .map_err(|err| RepeaterError::filesystem("cannot create profile directory", root, err))
    }
}

/// Best effort: the browser may still hold files for a moment.
fn remove_profile_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        warn(format!(
            "Failed to remove profile directory {}: {}",
            path.display(),
            err
        ));
        let _ = std::fs::remove_dir_all(&path);
    }
}
