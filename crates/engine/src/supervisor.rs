//! Process pair supervisor – runs the web dev server and the desktop shell
//! as one session with a single deterministic exit.
//!
//! The web server spawns first; the shell is never spawned before an
//! endpoint is confirmed ready. If either process exits while the session is
//! running, the other receives a graceful interrupt. Finalization is guarded
//! so it executes at most once no matter how many events race toward it, and
//! a 250ms liveness poll acts as a safety net for platforms where exit
//! notifications are unreliable.

use crate::config::{CommandSpec, OrchestratorConfig};
use crate::error::{EngineError, EngineResult};
use crate::probe::{wait_for_ready, Poller, LIVENESS_INTERVAL};
use crate::project::ProjectLayout;
use crate::runner::resolve_binary;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;

/// Session lifecycle. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Finalized,
}

impl ShutdownState {
    /// Advance to `next` if it is a forward transition; returns whether the
    /// state changed. Reverse transitions are refused.
    pub fn advance(&mut self, next: ShutdownState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// Once-guard for finalization. The first caller wins; everyone else gets
/// `false` and must not repeat the side effects.
#[derive(Debug, Default)]
pub struct Finalizer {
    done: AtomicBool,
}

impl Finalizer {
    pub fn try_finalize(&self) -> bool {
        !self.done.swap(true, Ordering::SeqCst)
    }

    pub fn is_finalized(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    WebServer,
    Shell,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::WebServer => f.write_str("web-server"),
            ProcessRole::Shell => f.write_str("shell"),
        }
    }
}

/// A child owned by the supervisor. Liveness is probed, not stored.
#[derive(Debug)]
pub struct ManagedProcess {
    pub role: ProcessRole,
    pub pid: u32,
    pub exit_code: Option<i32>,
}

impl ManagedProcess {
    fn gone(&self) -> bool {
        self.exit_code.is_some() || !pid_alive(self.pid)
    }
}

#[derive(Debug)]
pub(crate) enum Event {
    Exited { role: ProcessRole, code: i32 },
    LivenessTick,
    Interrupt,
    RestartShell,
    SourceChanged(serde_json::Value),
}

pub struct Supervisor {
    config: OrchestratorConfig,
    layout: ProjectLayout,
    state: ShutdownState,
    finalizer: Finalizer,
    web: Option<ManagedProcess>,
    shell: Option<ManagedProcess>,
    shell_stdin: Option<ChildStdin>,
    endpoint: Option<String>,
    /// Exit code of whichever event triggered shutdown.
    trigger_code: Option<i32>,
    pending_restart: bool,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
}

impl Supervisor {
    pub fn new(config: OrchestratorConfig, layout: ProjectLayout) -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self {
            config,
            layout,
            state: ShutdownState::Running,
            finalizer: Finalizer::default(),
            web: None,
            shell: None,
            shell_stdin: None,
            endpoint: None,
            trigger_code: None,
            pending_restart: false,
            tx,
            rx,
        }
    }

    /// Run the dev session to completion and return the session exit code.
    pub async fn run(mut self) -> EngineResult<i32> {
        // Fail fast: both binaries must exist before anything spawns.
        resolve_binary(&self.config.dev_server.bin)?;
        resolve_binary(&self.config.shell.bin)?;

        spawn_signal_listener(self.tx.clone());

        let web_cmd = build_command(&self.config.dev_server, &[], &[], &self.layout)?;
        let (web, _) = spawn_watched(self.tx.clone(), ProcessRole::WebServer, web_cmd, false)?;
        tracing::info!(pid = web.pid, command = %self.config.dev_server.display(), "web server started");
        self.web = Some(web);

        let candidates = self.config.ready_candidates();
        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        let endpoint = match wait_for_ready(&candidates, timeout).await {
            Ok(url) => url,
            Err(e) => {
                self.interrupt_role(ProcessRole::WebServer);
                return Err(e);
            }
        };
        self.endpoint = Some(endpoint);

        if let Err(e) = self.spawn_shell() {
            self.interrupt_role(ProcessRole::WebServer);
            return Err(e);
        }

        #[cfg(unix)]
        {
            let socket = self.layout.control_socket();
            if let Some(parent) = socket.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            tokio::spawn(crate::control::serve(socket, self.tx.clone()));
        }

        spawn_liveness(self.tx.clone());

        Ok(self.event_loop().await)
    }

    async fn event_loop(&mut self) -> i32 {
        while let Some(ev) = self.rx.recv().await {
            match ev {
                Event::Exited { role, code } => {
                    tracing::info!(%role, code, "child exited");
                    self.record_exit(role, code);

                    if role == ProcessRole::Shell
                        && self.pending_restart
                        && self.state == ShutdownState::Running
                    {
                        self.pending_restart = false;
                        match self.spawn_shell() {
                            Ok(()) => continue,
                            Err(e) => {
                                tracing::error!(error = %e, "shell relaunch failed; shutting down");
                                self.trigger_code.get_or_insert(1);
                                self.begin_shutdown(None);
                            }
                        }
                    } else if self.state == ShutdownState::Running {
                        self.trigger_code = Some(code);
                        self.begin_shutdown(Some(role));
                    }

                    if self.both_gone() {
                        if let Some(code) = self.finalize(self.trigger_code.unwrap_or(0)) {
                            return code;
                        }
                    }
                }
                Event::Interrupt => {
                    if self.state == ShutdownState::Running {
                        tracing::info!("interrupt received; shutting down session");
                        self.trigger_code.get_or_insert(0);
                        self.begin_shutdown(None);
                        if self.both_gone() {
                            if let Some(code) = self.finalize(self.trigger_code.unwrap_or(0)) {
                                return code;
                            }
                        }
                    }
                    // Already shutting down: exit and liveness handlers finish the job.
                }
                Event::LivenessTick => {
                    if self.state != ShutdownState::Finalized && self.both_gone() {
                        // A recorded trigger wins; 0 is only for the pure
                        // safety-net case where no exit was ever observed.
                        if let Some(code) = self.finalize(self.trigger_code.unwrap_or(0)) {
                            return code;
                        }
                    }
                }
                Event::RestartShell => {
                    if self.state != ShutdownState::Running {
                        tracing::debug!("restart request ignored during shutdown");
                        continue;
                    }
                    if let Some(shell) = &self.shell {
                        if shell.exit_code.is_none() {
                            tracing::info!("restart requested; relaunching shell");
                            self.pending_restart = true;
                            send_interrupt(shell.pid);
                        }
                    }
                }
                Event::SourceChanged(params) => self.notify_shell(params).await,
            }
        }
        // All senders dropped without finalization; treat as a clean end.
        0
    }

    fn spawn_shell(&mut self) -> EngineResult<()> {
        let endpoint = self.endpoint.clone().unwrap_or_default();
        let entry = self
            .config
            .shell_entry
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.layout.shell_entry());

        let extra = vec![entry.to_string_lossy().into_owned()];
        let mut envs = vec![
            ("DEV_SERVER_URL".to_string(), endpoint),
            ("DESKPACK_DEV".to_string(), self.config.dev_mode.to_string()),
            (
                "DESKPACK_DISABLE_CSP".to_string(),
                self.config.disable_csp.to_string(),
            ),
        ];
        if let Some(policy) = &self.config.csp_policy {
            envs.push(("DESKPACK_CSP_POLICY".to_string(), policy.clone()));
        }

        let cmd = build_command(&self.config.shell, &extra, &envs, &self.layout)?;
        let (shell, stdin) = spawn_watched(self.tx.clone(), ProcessRole::Shell, cmd, true)?;
        tracing::info!(pid = shell.pid, entry = %entry.display(), "shell started");
        self.shell = Some(shell);
        self.shell_stdin = stdin;
        Ok(())
    }

    fn record_exit(&mut self, role: ProcessRole, code: i32) {
        let slot = match role {
            ProcessRole::WebServer => &mut self.web,
            ProcessRole::Shell => &mut self.shell,
        };
        if let Some(proc_) = slot {
            proc_.exit_code = Some(code);
        }
        if role == ProcessRole::Shell {
            self.shell_stdin = None;
        }
    }

    /// Move toward ShuttingDown, interrupting every live child except the
    /// one that already exited (if given).
    fn begin_shutdown(&mut self, exited: Option<ProcessRole>) {
        self.state.advance(ShutdownState::ShuttingDown);
        for role in [ProcessRole::WebServer, ProcessRole::Shell] {
            if Some(role) != exited {
                self.interrupt_role(role);
            }
        }
    }

    fn interrupt_role(&self, role: ProcessRole) {
        let slot = match role {
            ProcessRole::WebServer => &self.web,
            ProcessRole::Shell => &self.shell,
        };
        if let Some(proc_) = slot {
            if proc_.exit_code.is_none() {
                send_interrupt(proc_.pid);
            }
        }
    }

    fn both_gone(&self) -> bool {
        let web_gone = self.web.as_ref().map(|p| p.gone()).unwrap_or(true);
        let shell_gone = self.shell.as_ref().map(|p| p.gone()).unwrap_or(true);
        web_gone && shell_gone
    }

    fn finalize(&mut self, code: i32) -> Option<i32> {
        if self.finalizer.try_finalize() {
            self.state.advance(ShutdownState::Finalized);
            tracing::info!(code, "dev session finalized");
            Some(code)
        } else {
            None
        }
    }

    async fn notify_shell(&mut self, params: serde_json::Value) {
        let Some(stdin) = self.shell_stdin.as_mut() else {
            tracing::debug!("source-changed notification dropped; shell has no stdin");
            return;
        };
        let mut line =
            serde_json::json!({ "event": "source-changed", "params": params }).to_string();
        line.push('\n');
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            tracing::warn!(error = %e, "failed to notify shell of source change");
        }
    }
}

fn build_command(
    spec: &CommandSpec,
    extra_args: &[String],
    envs: &[(String, String)],
    layout: &ProjectLayout,
) -> EngineResult<Command> {
    let bin = resolve_binary(&spec.bin)?;
    let mut cmd = Command::new(bin);
    cmd.args(&spec.args)
        .args(extra_args)
        .current_dir(layout.root());
    for (k, v) in envs {
        cmd.env(k, v);
    }
    Ok(cmd)
}

/// Spawn a child and watch it from a background task that reports its exit
/// on the supervisor channel. Spawn failure is fatal to the caller.
fn spawn_watched(
    tx: mpsc::Sender<Event>,
    role: ProcessRole,
    mut cmd: Command,
    piped_stdin: bool,
) -> EngineResult<(ManagedProcess, Option<ChildStdin>)> {
    if piped_stdin {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::inherit());
    }
    cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());

    let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
        command: role.to_string(),
        source: e,
    })?;
    let pid = child.id().unwrap_or(0);
    let stdin = if piped_stdin { child.stdin.take() } else { None };

    tokio::spawn(async move {
        let code = match child.wait().await {
            // A signal-terminated child has no code; report it as 1 so a
            // crash that triggers shutdown is visible in the session code.
            Ok(status) => status.code().unwrap_or(1),
            Err(e) => {
                tracing::warn!(%role, error = %e, "wait on child failed");
                1
            }
        };
        let _ = tx.send(Event::Exited { role, code }).await;
    });

    Ok((
        ManagedProcess {
            role,
            pid,
            exit_code: None,
        },
        stdin,
    ))
}

fn spawn_liveness(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let poller = Poller::new(LIVENESS_INTERVAL, None);
        poller
            .run(|| {
                let tx = tx.clone();
                async move {
                    // Ends once the supervisor drops its receiver.
                    if tx.send(Event::LivenessTick).await.is_err() {
                        Some(())
                    } else {
                        None
                    }
                }
            })
            .await;
    });
}

#[cfg(unix)]
fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    use tokio::signal::unix::{signal, SignalKind};
    // Interrupt, terminate and hangup are treated identically.
    for kind in [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::hangup(),
    ] {
        match signal(kind) {
            Ok(mut sig) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while sig.recv().await.is_some() {
                        if tx.send(Event::Interrupt).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "cannot install signal handler"),
        }
    }
}

#[cfg(not(unix))]
fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(Event::Interrupt).await.is_err() {
                break;
            }
        }
    });
}

/// Liveness probe without linking libc: `kill -0` only checks existence.
#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No portable existence check; assume alive until an exit is observed.
    true
}

/// Graceful interrupt, giving the child a chance to exit on its own.
#[cfg(unix)]
fn send_interrupt(pid: u32) {
    if pid == 0 {
        return;
    }
    let _ = std::process::Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(not(unix))]
fn send_interrupt(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_shutdown_state_is_monotonic() {
        let mut state = ShutdownState::Running;
        assert!(state.advance(ShutdownState::ShuttingDown));
        assert!(!state.advance(ShutdownState::Running));
        assert_eq!(state, ShutdownState::ShuttingDown);
        assert!(state.advance(ShutdownState::Finalized));
        assert!(!state.advance(ShutdownState::ShuttingDown));
        assert_eq!(state, ShutdownState::Finalized);
    }

    #[test]
    fn test_shutdown_state_can_skip_to_finalized() {
        let mut state = ShutdownState::Running;
        assert!(state.advance(ShutdownState::Finalized));
        assert!(!state.advance(ShutdownState::ShuttingDown));
    }

    #[tokio::test]
    async fn test_finalizer_executes_once_under_contention() {
        let finalizer = Arc::new(Finalizer::default());
        let wins = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let finalizer = finalizer.clone();
            let wins = wins.clone();
            handles.push(tokio::spawn(async move {
                if finalizer.try_finalize() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(finalizer.is_finalized());
    }

    #[cfg(unix)]
    #[test]
    fn test_pid_alive_self_and_bogus() {
        assert!(pid_alive(std::process::id()));
        // PID near the usual pid_max; extremely unlikely to exist.
        assert!(!pid_alive(4_194_000));
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            dev_url: None,
            shell_entry: None,
            disable_csp: false,
            csp_policy: None,
            dev_mode: false,
            dev_server: CommandSpec {
                bin: "sh".into(),
                args: vec![],
            },
            exporter: CommandSpec {
                bin: "sh".into(),
                args: vec![],
            },
            shell: CommandSpec {
                bin: "sh".into(),
                args: vec![],
            },
            packager: CommandSpec {
                bin: "sh".into(),
                args: vec![],
            },
            ready_timeout_secs: 1,
        }
    }

    /// A liveness tick that finds both children gone after a trigger was
    /// recorded must finalize with the trigger code, not downgrade to 0.
    #[tokio::test]
    async fn test_liveness_finalize_preserves_trigger_code() {
        let layout = ProjectLayout::new(std::env::temp_dir());
        let mut sup = Supervisor::new(test_config(), layout);
        sup.web = Some(ManagedProcess {
            role: ProcessRole::WebServer,
            pid: 0,
            exit_code: Some(3),
        });
        sup.shell = Some(ManagedProcess {
            role: ProcessRole::Shell,
            pid: 0,
            exit_code: Some(1),
        });
        sup.trigger_code = Some(3);
        sup.state = ShutdownState::ShuttingDown;

        sup.tx.send(Event::LivenessTick).await.unwrap();
        let code = tokio::time::timeout(Duration::from_secs(5), sup.event_loop())
            .await
            .expect("tick should finalize the session");
        assert_eq!(code, 3);
    }

    /// Drives the event loop with two real children: the web server exits
    /// non-zero on its own, the shell sleeps until it is cross-signaled.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_propagates_code_and_finalizes() {
        let layout = ProjectLayout::new(std::env::temp_dir());
        let mut sup = Supervisor::new(test_config(), layout);

        let mut web_cmd = Command::new("sh");
        web_cmd.args(["-c", "exit 3"]);
        let (web, _) = spawn_watched(sup.tx.clone(), ProcessRole::WebServer, web_cmd, false).unwrap();
        sup.web = Some(web);

        let mut shell_cmd = Command::new("sh");
        shell_cmd.args(["-c", "exec sleep 30"]);
        let (shell, stdin) =
            spawn_watched(sup.tx.clone(), ProcessRole::Shell, shell_cmd, true).unwrap();
        sup.shell = Some(shell);
        sup.shell_stdin = stdin;

        spawn_liveness(sup.tx.clone());

        let code = tokio::time::timeout(Duration::from_secs(10), sup.event_loop())
            .await
            .expect("session should finalize");
        assert_eq!(code, 3);
        assert_eq!(sup.state, ShutdownState::Finalized);
        assert!(sup.finalizer.is_finalized());
    }

    /// Shell-first exit ordering: the supervisor interrupts the web server
    /// and adopts the shell's exit code.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_exit_first_interrupts_web() {
        let layout = ProjectLayout::new(std::env::temp_dir());
        let mut sup = Supervisor::new(test_config(), layout);

        let mut web_cmd = Command::new("sh");
        web_cmd.args(["-c", "exec sleep 30"]);
        let (web, _) = spawn_watched(sup.tx.clone(), ProcessRole::WebServer, web_cmd, false).unwrap();
        let web_pid = web.pid;
        sup.web = Some(web);

        let mut shell_cmd = Command::new("sh");
        shell_cmd.args(["-c", "exit 0"]);
        let (shell, stdin) =
            spawn_watched(sup.tx.clone(), ProcessRole::Shell, shell_cmd, true).unwrap();
        sup.shell = Some(shell);
        sup.shell_stdin = stdin;

        spawn_liveness(sup.tx.clone());

        let code = tokio::time::timeout(Duration::from_secs(10), sup.event_loop())
            .await
            .expect("session should finalize");
        assert_eq!(code, 0);
        assert!(!pid_alive(web_pid));
    }
}
