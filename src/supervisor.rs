//! One browser invocation at a time
//!
//! Per iteration the supervisor walks `Idle → Launching → Playing →
//! Terminating → Idle`, or drops to `Aborted` when the run cannot go on.
//! Everything it knows about the processes of an iteration lives in a
//! [`RunContext`] that is rebuilt for every iteration.

use crate::browser::{LaunchCommand, ProfileMode};
use crate::core::models::{ProcessId, ProcessSet, RunSettings};
use crate::core::ownership::{Ownership, OwnershipClassifier};
use crate::core::process_tree::ProcessSnapshot;
use crate::error::{LaunchError, RepeaterError, RepeaterResult};
use crate::events::{EventSender, RunEvent};
use crate::logging::{debug, warn};
use crate::platform;
use crate::probe::ReachabilityProbe;
use crate::signal::CancellationToken;
use crate::terminator::{ProcessControl, ProcessTerminator};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Title and thumbnail for the video being played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: Option<Vec<u8>>,
}

/// Optional metadata collaborator.
///
/// `None` means "nothing to show"; a lookup failure never affects the run.
#[async_trait]
pub trait VideoInfoSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<VideoInfo>;
}

/// Timing knobs for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Wait after the graceful stop before killing.
    pub grace_period: Duration,
    /// Wait after the kill before giving up.
    pub kill_period: Duration,
    /// Pause between teardown and the follow-up incognito sweep.
    pub settle_delay: Duration,
    /// Countdown granularity; also the cancellation latency bound.
    pub tick: Duration,
    pub poll_interval: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        use crate::config::{
            COUNTDOWN_TICK, EXIT_POLL_INTERVAL, GRACE_PERIOD, KILL_PERIOD, SETTLE_DELAY,
        };
        Self {
            grace_period: GRACE_PERIOD,
            kill_period: KILL_PERIOD,
            settle_delay: SETTLE_DELAY,
            tick: COUNTDOWN_TICK,
            poll_interval: EXIT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Launching,
    Playing,
    Terminating,
    Aborted,
}

/// How an iteration ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The interval ran out and the browser was torn down.
    Completed,
    /// Cancelled; the browser (if any) was torn down.
    Cancelled,
}

/// Process bookkeeping for a single iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub temporary_profile_directory: Option<PathBuf>,
    pub use_incognito: bool,
    pub protected_process_ids: ProcessSet,
    pub primary_process_id: Option<ProcessId>,
}

impl RunContext {
    pub fn new(
        temporary_profile_directory: Option<PathBuf>,
        use_incognito: bool,
        protected_process_ids: ProcessSet,
    ) -> Self {
        Self {
            temporary_profile_directory,
            use_incognito,
            protected_process_ids,
            primary_process_id: None,
        }
    }

    /// Incognito launches ignore the profile directory; standard launches
    /// cannot go ahead without one.
    pub fn profile_mode(&self) -> Result<ProfileMode, LaunchError> {
        match (&self.temporary_profile_directory, self.use_incognito) {
            (_, true) => Ok(ProfileMode::Incognito),
            (Some(dir), false) => Ok(ProfileMode::Isolated(dir.clone())),
            (None, false) => Err(LaunchError::MissingProfileDirectory),
        }
    }

    /// Ownership modes used to tear this iteration down.
    pub fn ownership_modes(&self) -> Vec<Ownership> {
        let mut modes = Vec::with_capacity(2);
        if let Some(primary) = self.primary_process_id {
            modes.push(Ownership::Tree { primary });
        }
        if self.use_incognito {
            modes.push(Ownership::IncognitoSweep);
        }
        modes
    }
}

/// Spawn the browser detached from our stdio, in its own process group.
pub fn launch(command: &LaunchCommand) -> Result<Child, LaunchError> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    platform::prepare_command(&mut cmd);

    cmd.spawn()
        .map_err(|err| LaunchError::from_spawn(command.program.clone(), err))
}

pub struct LaunchSupervisor<'a, C: ProcessControl = crate::terminator::SystemProcessControl> {
    settings: &'a RunSettings,
    target: String,
    probe: &'a dyn ReachabilityProbe,
    video_info: Option<&'a dyn VideoInfoSource>,
    token: CancellationToken,
    events: EventSender,
    policy: TerminationPolicy,
    terminator: ProcessTerminator<C>,
    state: SupervisorState,
    child: Option<Child>,
    launches: u32,
}

impl<'a> LaunchSupervisor<'a> {
    pub fn new(
        settings: &'a RunSettings,
        probe: &'a dyn ReachabilityProbe,
        token: CancellationToken,
        events: EventSender,
    ) -> Self {
        Self::with_control(
            settings,
            probe,
            token,
            events,
            crate::terminator::SystemProcessControl,
        )
    }
}

impl<'a, C: ProcessControl> LaunchSupervisor<'a, C> {
    pub fn with_control(
        settings: &'a RunSettings,
        probe: &'a dyn ReachabilityProbe,
        token: CancellationToken,
        events: EventSender,
        control: C,
    ) -> Self {
        let policy = TerminationPolicy::default();
        Self {
            settings,
            target: crate::browser::executable_name(&settings.browser),
            probe,
            video_info: None,
            token,
            events,
            policy,
            terminator: ProcessTerminator::new(control).with_poll_interval(policy.poll_interval),
            state: SupervisorState::Idle,
            child: None,
            launches: 0,
        }
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self.terminator = self.terminator.with_poll_interval(policy.poll_interval);
        self
    }

    pub fn with_video_info(mut self, source: &'a dyn VideoInfoSource) -> Self {
        self.video_info = Some(source);
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn policy(&self) -> TerminationPolicy {
        self.policy
    }

    /// Executable name processes of the configured browser report.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Browser processes started so far.
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Pid of the launched browser while it is still running.
    ///
    /// Decided from the child handle alone: once the child is reaped its pid
    /// is free for reuse, so an exited browser has no primary. Reaps the
    /// child as a side effect when it has exited.
    pub fn live_primary(&mut self) -> Option<ProcessId> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(None) => child.id(),
            Ok(Some(status)) => {
                debug(format!("Browser exited with {}", status));
                self.child = None;
                None
            }
            Err(err) => {
                warn(format!("Failed to reap browser process: {}", err));
                self.child = None;
                None
            }
        }
    }

    /// Run one full iteration.
    ///
    /// `Err` means the run must stop; the caller reports it. Whatever was
    /// launched has already been torn down when this returns.
    pub async fn run_iteration(
        &mut self,
        iteration: u32,
        mut ctx: RunContext,
    ) -> RepeaterResult<IterationOutcome> {
        self.transition(SupervisorState::Launching);

        if let Err(err) = self.probe.check().await {
            self.transition(SupervisorState::Aborted);
            return Err(err);
        }
        let profile = match ctx.profile_mode() {
            Ok(profile) => profile,
            Err(err) => {
                self.transition(SupervisorState::Aborted);
                return Err(err.into());
            }
        };
        self.publish_title().await;

        if let Some(previous) = self.live_primary() {
            debug(format!("Previous browser pid={} still alive, stopping it", previous));
            self.stop_owned(&ctx.protected_process_ids, &[Ownership::Tree { primary: previous }])
                .await;
        }

        if self.token.is_cancelled() {
            self.transition(SupervisorState::Idle);
            return Ok(IterationOutcome::Cancelled);
        }

        let command = LaunchCommand::build(&self.settings.browser, &self.settings.url, &profile);
        let child = match launch(&command) {
            Ok(child) => child,
            Err(err) => {
                self.transition(SupervisorState::Aborted);
                return Err(err.into());
            }
        };
        let Some(pid) = child.id() else {
            self.transition(SupervisorState::Aborted);
            return Err(LaunchError::MissingPid(command.program).into());
        };
        debug(format!(
            "Started browser pid={} iteration={} profile={:?}",
            pid,
            iteration,
            profile
        ));

        ctx.primary_process_id = Some(pid);
        self.launches += 1;
        self.child = Some(child);
        self.events.send(RunEvent::IterationStarted {
            iteration,
            total: self.settings.repeat.total(),
            pid,
        });

        self.transition(SupervisorState::Playing);
        let outcome = self.play().await;

        self.transition(SupervisorState::Terminating);
        self.teardown(&ctx).await;
        self.transition(SupervisorState::Idle);
        Ok(outcome)
    }

    /// Stop whatever `modes` select, against `protected`.
    ///
    /// Used for iteration teardown and for the scheduler's final sweep.
    pub async fn stop_owned(&mut self, protected: &ProcessSet, modes: &[Ownership]) {
        if modes.is_empty() {
            return;
        }
        let targets = match ProcessSnapshot::take() {
            Ok(snapshot) => {
                OwnershipClassifier::new(&self.target, protected).eligible_any(&snapshot, modes)
            }
            Err(err) => {
                warn(format!("Process enumeration failed, stopping primary only: {}", err));
                modes
                    .iter()
                    .filter_map(|mode| match mode {
                        Ownership::Tree { primary } => Some(*primary),
                        Ownership::IncognitoSweep => None,
                    })
                    .filter(|pid| !protected.contains(pid))
                    .collect()
            }
        };
        if targets.is_empty() {
            return;
        }

        let report = self
            .terminator
            .terminate(&targets, self.policy.grace_period, self.policy.kill_period)
            .await;
        // collect our child if it was among the targets
        self.live_primary();

        for pid in &report.denied {
            let err = RepeaterError::PermissionDenied { pid: *pid };
            warn(err.to_string());
            self.events.diagnostic(err.user_message());
        }
        if !report.unreached.is_empty() {
            let err = RepeaterError::TerminationFailure {
                count: report.unreached.len(),
                pids: report.unreached.into_iter().collect(),
            };
            warn(err.to_string());
            self.events.diagnostic(err.user_message());
        }
    }

    /// Count down the interval in ticks. Cancellation ends it early.
    async fn play(&mut self) -> IterationOutcome {
        let total = self.settings.interval.as_secs();
        self.events.countdown(total);
        for remaining in (0..total).rev() {
            if self.token.sleep(self.policy.tick).await {
                debug("Cancelled during playback");
                return IterationOutcome::Cancelled;
            }
            self.events.countdown(remaining);
        }
        IterationOutcome::Completed
    }

    async fn teardown(&mut self, ctx: &RunContext) {
        self.stop_owned(&ctx.protected_process_ids, &ctx.ownership_modes())
            .await;

        // incognito helpers can respawn briefly after the window closes
        tokio::time::sleep(self.policy.settle_delay).await;
        self.stop_owned(&ctx.protected_process_ids, &[Ownership::IncognitoSweep])
            .await;
        self.live_primary();
    }

    async fn publish_title(&self) {
        let Some(source) = self.video_info else {
            return;
        };
        if let Some(info) = source.fetch(&self.settings.url).await {
            self.events.send(RunEvent::Title {
                title: info.title,
                thumbnail: info.thumbnail,
            });
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "supervisor state");
            self.state = next;
        }
    }
}
