//! Policy process protocol
//!
//! The session talks to the policy process over its stdin/stdout, one
//! message per line.
//!
//! Notifications (compositor to policy):
//!
//! ```text
//! <serial> <event> <role> <address>
//! ```
//!
//! Requests (policy to compositor), answered with `@ <message-id>` once
//! applied:
//!
//! ```text
//! <message-id> map <surface>
//! <message-id> unmap <surface>
//! <message-id> set_window_geometry <surface> <x> <y> <width> <height>
//! <message-id> focus <surface>
//! ```
//!
//! Requests that cannot be parsed, or that name a surface the session does
//! not know, are dropped without an answer.

use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::process::ChildStdout;
use std::str::FromStr;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode as CalloopMode, PostAction, RegistrationToken};
use smithay::utils::Size;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::Platform;
use crate::event::{Event, Notification};
use crate::input;
use crate::runtime::State;
use crate::session::{Session, SessionError};
use crate::surface::SurfaceId;

/// Outbound half of the policy channel plus the notification serial
#[derive(Default)]
pub struct PolicyBridge {
    serial: u64,
    channel: Option<Box<dyn Write>>,
}

impl fmt::Debug for PolicyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyBridge")
            .field("serial", &self.serial)
            .field("attached", &self.channel.is_some())
            .finish()
    }
}

impl PolicyBridge {
    pub fn attach(&mut self, channel: Box<dyn Write>) {
        self.channel = Some(channel);
    }

    pub fn detach(&mut self) -> Option<Box<dyn Write>> {
        self.channel.take()
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    /// Serial the next notification will carry
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Send a notification, returning it if it was written.
    ///
    /// Without an attached channel nothing is sent and the serial is unchanged.
    pub fn notify(&mut self, event: Event, role: &str, address: u64) -> Option<Notification> {
        if self.channel.is_none() {
            return None;
        }
        let notification = Notification {
            serial: self.serial,
            event,
            role: role.to_string(),
            address,
        };
        if !self.write_line(&notification.to_string()) {
            return None;
        }
        self.serial += 1;
        Some(notification)
    }

    /// Answer a request that was applied.
    pub fn acknowledge(&mut self, message_id: &str) -> bool {
        self.write_line(&format!("@ {message_id}"))
    }

    fn write_line(&mut self, line: &str) -> bool {
        let Some(channel) = self.channel.as_mut() else {
            return false;
        };
        if let Err(err) = writeln!(channel, "{line}").and_then(|()| channel.flush()) {
            warn!("Failed to write to policy process, detaching: {err}");
            self.channel = None;
            return false;
        }
        debug!(line, "sent to policy process");
        true
    }
}

/// A parsed policy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub message_id: String,
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Raise the surface to the top of its siblings
    Map { surface: SurfaceId },
    /// Lower the surface to the bottom of its siblings
    Unmap { surface: SurfaceId },
    SetWindowGeometry {
        surface: SurfaceId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Focus { surface: SurfaceId },
}

impl Command {
    pub fn surface(&self) -> SurfaceId {
        match *self {
            Command::Map { surface }
            | Command::Unmap { surface }
            | Command::SetWindowGeometry { surface, .. }
            | Command::Focus { surface } => surface,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Map { .. } => "map",
            Command::Unmap { .. } => "unmap",
            Command::SetWindowGeometry { .. } => "set_window_geometry",
            Command::Focus { .. } => "focus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("request {message_id} has no command")]
    MissingCommand { message_id: String },
    #[error("request {message_id}: unknown command {command:?}")]
    UnknownCommand { message_id: String, command: String },
    #[error("{command} takes {expected} arguments, got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid surface id {0:?}")]
    InvalidSurfaceId(String),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
}

impl FromStr for Request {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let message_id = words.next().ok_or(ParseError::Empty)?.to_string();
        let Some(command) = words.next() else {
            return Err(ParseError::MissingCommand { message_id });
        };
        let args: Vec<&str> = words.collect();

        let (name, expected) = match command {
            "map" => ("map", 1),
            "unmap" => ("unmap", 1),
            "set_window_geometry" => ("set_window_geometry", 5),
            "focus" => ("focus", 1),
            _ => {
                return Err(ParseError::UnknownCommand {
                    message_id,
                    command: command.to_string(),
                })
            }
        };
        if args.len() != expected {
            return Err(ParseError::Arity {
                command: name,
                expected,
                got: args.len(),
            });
        }

        let surface = parse_surface(args[0])?;
        let command = match name {
            "map" => Command::Map { surface },
            "unmap" => Command::Unmap { surface },
            "focus" => Command::Focus { surface },
            _ => Command::SetWindowGeometry {
                surface,
                x: parse_int(args[1])?,
                y: parse_int(args[2])?,
                width: parse_int(args[3])?,
                height: parse_int(args[4])?,
            },
        };
        Ok(Request {
            message_id,
            command,
        })
    }
}

fn parse_surface(word: &str) -> Result<SurfaceId, ParseError> {
    word.parse()
        .map_err(|_| ParseError::InvalidSurfaceId(word.to_string()))
}

fn parse_int(word: &str) -> Result<i32, ParseError> {
    word.parse()
        .map_err(|_| ParseError::InvalidInteger(word.to_string()))
}

/// Longest unfinished line kept while waiting for its newline
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Reassembles newline-terminated lines from arbitrary read chunks
///
/// An unfinished line longer than [`MAX_LINE_LEN`] is discarded up to and
/// including its newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them.
    pub fn push(&mut self, mut bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        if self.discarding {
            let Some(end) = bytes.iter().position(|&b| b == b'\n') else {
                return lines;
            };
            self.discarding = false;
            bytes = &bytes[end + 1..];
        }

        self.pending.extend_from_slice(bytes);
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]);
            lines.push(text.trim_end_matches('\r').to_string());
        }

        if self.pending.len() > MAX_LINE_LEN {
            warn!(
                len = self.pending.len(),
                "Discarding overlong policy request line"
            );
            self.pending.clear();
            self.discarding = true;
        }
        lines
    }

    /// Bytes of an unfinished line
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<P: Platform> Session<P> {
    /// Parse and apply one request line from the policy process.
    pub fn handle_policy_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        debug!(line, "policy request");
        match line.parse::<Request>() {
            Ok(request) => {
                self.handle_request(request);
            }
            Err(err) => warn!(line, "Dropping malformed policy request: {err}"),
        }
    }

    /// Apply `request`, commit all outputs and acknowledge it.
    ///
    /// Returns whether the request was applied. A request naming an unknown
    /// surface is dropped without an answer, leaving the policy process
    /// waiting on that message id.
    pub fn handle_request(&mut self, request: Request) -> bool {
        let Request {
            message_id,
            command,
        } = request;
        let surface = command.surface();
        let Some(record) = self.surfaces.get(surface) else {
            warn!(
                %message_id,
                %surface,
                command = command.name(),
                "request for unknown surface dropped, policy will not get an answer"
            );
            return false;
        };
        let node = record.node;

        let applied: Result<(), SessionError> = match (command, node) {
            (Command::Focus { surface }, _) => {
                self.platform.surface_set_activated(surface, true);
                input::focus_surface(self, surface);
                Ok(())
            }
            (Command::Map { .. }, Some(node)) => self.scene.raise_to_top(node).map_err(Into::into),
            (Command::Unmap { .. }, Some(node)) => {
                self.scene.lower_to_bottom(node).map_err(Into::into)
            }
            (
                Command::SetWindowGeometry {
                    surface,
                    x,
                    y,
                    width,
                    height,
                },
                Some(node),
            ) => self
                .scene
                .set_position(node, x, y)
                .map_err(Into::into)
                .and_then(|()| self.resize_surface(surface, Size::from((width, height)))),
            (command, None) => {
                warn!(
                    %message_id,
                    %surface,
                    command = command.name(),
                    "surface is not in the scene, request dropped"
                );
                return false;
            }
        };
        if let Err(err) = applied {
            warn!(%message_id, %surface, "Failed to apply {}: {err}", command.name());
            return false;
        }

        self.commit_all_outputs();
        self.bridge.acknowledge(&message_id);
        true
    }
}

/// Put `stdout` in non-blocking mode.
fn set_nonblocking(stdout: &ChildStdout) -> io::Result<()> {
    let fd = stdout.as_raw_fd();
    // SAFETY: fd is a valid descriptor owned by `stdout` for the duration of the calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only the O_NONBLOCK status flag is added.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Watch the policy process's stdout and apply every request line it writes.
///
/// The source removes itself when the policy process closes its stdout.
pub fn register_policy_source(
    handle: &LoopHandle<'static, State>,
    stdout: ChildStdout,
) -> io::Result<RegistrationToken> {
    set_nonblocking(&stdout)?;
    handle
        .insert_source(
            Generic::new(stdout, Interest::READ, CalloopMode::Level),
            |_, source, state: &mut State| {
                // SAFETY: We're inside the event loop callback where the source is valid
                let stdout = unsafe { source.get_mut() };
                Ok(read_policy_requests(state, stdout))
            },
        )
        .map_err(|err| io::Error::other(err.error))
}

fn read_policy_requests(state: &mut State, stdout: &mut impl Read) -> PostAction {
    let mut buf = [0u8; 4096];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => {
                info!("Policy process closed its output");
                state.policy_closed();
                return PostAction::Remove;
            }
            Ok(n) => {
                for line in state.lines.push(&buf[..n]) {
                    state.session.handle_policy_line(&line);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("Failed to read from policy process: {err}");
                state.policy_closed();
                return PostAction::Remove;
            }
        }
    }
    state.refresh();
    PostAction::Continue
}
