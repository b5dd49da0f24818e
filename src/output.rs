//! Output management
//!
//! Outputs are announced by the backend. Each one is initialized for
//! rendering, switched to its preferred mode, enabled and placed in the
//! layout (at its configured position, or right of the existing outputs).
//! Outputs live until the session stops.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use smithay::utils::{Logical, Physical, Point, Size, Transform};
use tracing::{debug, info, warn};

use crate::backend::Platform;
use crate::dispatch::{EventKind, Handler, Source};
use crate::event::{Event, OUTPUT_ROLE};
use crate::session::Session;
use crate::utils::{effective_resolution, get_monotonic_time};

/// Stable identity of a connected output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u64);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Output mode information
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputMode {
    pub size: Size<i32, Physical>,
    pub refresh: i32, // mHz
    pub preferred: bool,
}

/// Output information, serializable for logging and diagnostics
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OutputInfo {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub refresh: i32,
    pub scale: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub modes: Vec<OutputMode>,
    pub current_mode: Option<OutputMode>,
    pub position: Point<i32, Logical>,
    pub scale: f64,
    pub transform: Transform,
    pub enabled: bool,
    /// Frames rendered on this output
    pub frames: u64,
}

impl Output {
    pub fn new(id: OutputId, name: String, modes: Vec<OutputMode>) -> Self {
        Self {
            id,
            name,
            modes,
            current_mode: None,
            position: Point::default(),
            scale: 1.0,
            transform: Transform::Normal,
            enabled: false,
            frames: 0,
        }
    }

    /// The mode flagged preferred, else the first advertised one
    pub fn preferred_mode(&self) -> Option<OutputMode> {
        self.modes
            .iter()
            .find(|mode| mode.preferred)
            .or_else(|| self.modes.first())
            .copied()
    }

    /// Logical size of the current mode after scale and transform; zero without a mode
    pub fn effective_resolution(&self) -> Size<i32, Logical> {
        self.current_mode
            .map(|mode| effective_resolution(mode.size, self.scale, self.transform))
            .unwrap_or_default()
    }

    pub fn info(&self) -> OutputInfo {
        let size = self.effective_resolution();
        OutputInfo {
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            width: size.w,
            height: size.h,
            refresh: self.current_mode.map(|m| m.refresh).unwrap_or(0),
            scale: self.scale,
            enabled: self.enabled,
        }
    }
}

/// Connected outputs in connection order
#[derive(Debug, Default)]
pub struct OutputManager {
    outputs: Vec<Output>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, output: Output) {
        self.outputs.retain(|o| o.id != output.id);
        self.outputs.push(output);
    }

    /// The first connected output, which sizes the desktop
    pub fn first(&self) -> Option<&Output> {
        self.outputs.first()
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter()
    }

    pub fn ids(&self) -> Vec<OutputId> {
        self.outputs.iter().map(|o| o.id).collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }
}

impl<P: Platform> Session<P> {
    pub(crate) fn handle_new_output(&mut self, id: OutputId, name: String, modes: Vec<OutputMode>) {
        info!(output = %id, %name, "new output device");
        let config = self.config.output(&name);
        let mut output = Output::new(id, name, modes);
        if let Some(scale) = config.scale.filter(|s| *s > 0.0) {
            output.scale = scale;
        }
        if let Some(transform) = config.transform {
            output.transform = transform.into();
        }

        if let Err(err) = self.platform.output_init_render(id) {
            warn!(output = %id, "dropping output: {err}");
            return;
        }

        output.current_mode = output.preferred_mode();
        self.platform.output_set_mode(id, output.current_mode);
        if config.enabled {
            self.platform.output_enable(id, true);
            output.enabled = true;
        } else {
            info!(output = %id, name = %output.name, "output disabled by configuration");
        }
        self.platform.output_commit(id);

        if output.enabled {
            let size = output.effective_resolution();
            output.position = match config.position {
                Some((x, y)) => {
                    let position = Point::from((x, y));
                    self.platform.layout_add(id, position, size);
                    position
                }
                None => self.platform.layout_add_auto(id, size),
            };
        }
        debug!(output = %id, info = ?output.info(), "output configured");

        self.handlers
            .subscribe(Source::Output(id), EventKind::Frame, Handler::OutputFrame);
        self.outputs.insert(output);
        self.notify(Event::NewOutput, OUTPUT_ROLE, id.0);
    }

    /// Render the scene on `id` and tell clients the frame is done.
    pub(crate) fn handle_output_frame(&mut self, id: OutputId) {
        let now = get_monotonic_time();
        self.render_output_frame(id, now);
    }

    pub(crate) fn render_output_frame(&mut self, id: OutputId, time: Duration) {
        let Some(output) = self.outputs.get_mut(id) else {
            return;
        };
        if !output.enabled {
            return;
        }
        output.frames += 1;
        self.platform.render_scene_output(id, &self.scene);
        self.platform.send_frame_done(id, time);
    }

    /// Commit every connected output, applying pending scene changes.
    pub fn commit_all_outputs(&mut self) {
        for id in self.outputs.ids() {
            self.platform.output_commit(id);
        }
    }

    /// Send a `new_output` notification for every connected output.
    ///
    /// Used once a policy process attaches, so it learns about outputs that
    /// were connected before it was listening.
    pub fn announce_outputs(&mut self) {
        for id in self.outputs.ids() {
            self.notify(Event::NewOutput, OUTPUT_ROLE, id.0);
        }
    }
}
