//! Event loop and policy process supervision
//!
//! Runs a session on the headless platform inside a calloop event loop,
//! together with the policy process that drives it. The loop watches:
//!
//! - the policy process's stdout, for requests
//! - SIGINT / SIGTERM, to shut down
//! - SIGCHLD, to shut down once the policy process is gone
//! - one frame timer per output, paced by a [`FrameClock`]
//!
//! The headless platform only connects outputs while the session starts, so
//! frame timers are registered once, for the outputs present at that point.

use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{anyhow, Context};
use calloop::signals::{Signal, Signals};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle, LoopSignal};
use tracing::{error, info, warn};

use crate::backend::HeadlessBackend;
use crate::config::Config;
use crate::frame_clock::FrameClock;
use crate::ipc::{self, LineBuffer};
use crate::protocol::ProtocolEvent;
use crate::session::{Session, SessionError};
use crate::utils::get_monotonic_time;

/// Shell used to run the policy command
const SHELL: &str = "/bin/sh";

/// Everything the event loop callbacks operate on
pub struct State {
    pub session: Session<HeadlessBackend>,
    pub policy: Option<PolicyProcess>,
    /// Partial request line read from the policy process
    pub lines: LineBuffer,
    loop_signal: LoopSignal,
    fatal: Option<SessionError>,
    shutting_down: bool,
}

impl State {
    /// Dispatch pending protocol events; a session error stops the loop.
    pub fn new(session: Session<HeadlessBackend>, loop_signal: LoopSignal) -> Self {
        Self {
            session,
            policy: None,
            lines: LineBuffer::new(),
            loop_signal,
            fatal: None,
            shutting_down: false,
        }
    }

    pub fn refresh(&mut self) {
        if self.fatal.is_some() {
            return;
        }
        if let Err(err) = self.session.pump() {
            error!(error = ?err, "Fatal session error: {err}");
            self.fatal = Some(err);
            self.shutdown();
        }
    }

    /// The policy process stopped reading or writing.
    ///
    /// Also shuts down if it has already exited, since its SIGCHLD may have
    /// been delivered before the channel closed.
    pub fn policy_closed(&mut self) {
        self.session.detach_policy();
        self.on_child_exit();
    }

    /// Whether the event loop was asked to stop
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    fn shutdown(&mut self) {
        self.shutting_down = true;
        self.loop_signal.stop();
    }

    fn on_child_exit(&mut self) {
        let exited = self
            .policy
            .as_mut()
            .map(PolicyProcess::has_exited)
            .unwrap_or(true);
        if exited {
            info!("Policy process exited, shutting down");
            self.shutdown();
        }
    }
}

/// The external process making window management decisions
#[derive(Debug)]
pub struct PolicyProcess {
    child: Child,
}

impl PolicyProcess {
    /// Run `command` through the shell as a client of the display at `socket`.
    ///
    /// Returns the process together with its stdin (notifications) and stdout
    /// (requests).
    pub fn spawn(command: &str, socket: &str) -> io::Result<(Self, ChildStdin, ChildStdout)> {
        let mut child = Command::new(SHELL)
            .arg("-c")
            .arg(command)
            .env_remove("DISPLAY")
            .env("WAYLAND_DISPLAY", socket)
            .env("GDK_BACKEND", "wayland")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        info!(pid = child.id(), "Spawned policy process: {command}");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let mut process = Self { child };
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok((process, stdin, stdout)),
            _ => {
                process.terminate();
                Err(io::Error::other("policy process pipes unavailable"))
            }
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!("Policy process exited with {status}");
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("Failed to query policy process: {err}");
                true
            }
        }
    }

    /// Send SIGTERM if the process is still running and reap it.
    pub fn terminate(&mut self) {
        if self.has_exited() {
            return;
        }
        let Ok(pid) = libc::pid_t::try_from(self.child.id()) else {
            return;
        };
        // SAFETY: pid names our own child, which has not been reaped yet.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            warn!(
                "Failed to terminate policy process: {}",
                io::Error::last_os_error()
            );
            return;
        }
        if let Err(err) = self.child.wait() {
            warn!("Failed to reap policy process: {err}");
        }
    }
}

/// Run a session on `seat` driven by the policy process `command`.
pub fn run(config: Config, seat: &str, command: &str) -> anyhow::Result<()> {
    let mut event_loop: EventLoop<'static, State> =
        EventLoop::try_new().context("Failed to create event loop")?;
    let handle = event_loop.handle();

    let backend = HeadlessBackend::from_config(&config);
    let mut session = Session::new(backend, config, seat);
    session.start().context("Failed to start session")?;
    let socket = session
        .socket_name()
        .context("Session has no display socket")?;
    info!("Display socket: {socket}");

    // SIGCHLD must be blocked before the child exists or an early exit is lost.
    register_signals(&handle)?;
    let (policy, stdin, stdout) = PolicyProcess::spawn(command, &socket)
        .with_context(|| format!("Failed to spawn policy process {command:?}"))?;
    session.attach_policy(Box::new(stdin));
    // Outputs connected before the policy process was listening
    session.announce_outputs();

    ipc::register_policy_source(&handle, stdout)
        .context("Failed to watch policy process output")?;
    register_frame_timers(&handle, &session)?;

    let mut state = State::new(session, event_loop.get_signal());
    state.policy = Some(policy);

    info!("Event loop running");
    let result = event_loop.run(None, &mut state, |state| state.refresh());

    if let Some(policy) = state.policy.as_mut() {
        policy.terminate();
    }
    state.session.stop();
    result.context("Event loop failed")?;

    match state.fatal.take() {
        Some(err) => Err(err).context("Session failed"),
        None => Ok(()),
    }
}

fn register_signals(handle: &LoopHandle<'static, State>) -> anyhow::Result<()> {
    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM, Signal::SIGCHLD])
        .context("Failed to block signals")?;
    handle
        .insert_source(signals, |event, _, state| match event.signal() {
            Signal::SIGCHLD => state.on_child_exit(),
            signal => {
                info!("Received {signal:?}, shutting down");
                state.shutdown();
            }
        })
        .map_err(|err| anyhow!("Failed to register signal source: {}", err.error))?;
    Ok(())
}

/// Drive frame events on every enabled output at its refresh rate.
fn register_frame_timers(
    handle: &LoopHandle<'static, State>,
    session: &Session<HeadlessBackend>,
) -> anyhow::Result<()> {
    for output in session.outputs().iter().filter(|o| o.enabled) {
        let id = output.id;
        let refresh = output.current_mode.map(|mode| mode.refresh).unwrap_or(0);
        let mut clock = FrameClock::from_refresh(refresh);
        handle
            .insert_source(Timer::immediate(), move |_, _, state| {
                state
                    .session
                    .platform_mut()
                    .inject(ProtocolEvent::OutputFrame { output: id });
                state.refresh();

                let now = get_monotonic_time();
                clock.presented(now);
                TimeoutAction::ToDuration(clock.time_to_next_frame(now))
            })
            .map_err(|err| anyhow!("Failed to register frame timer: {}", err.error))?;
    }
    Ok(())
}
