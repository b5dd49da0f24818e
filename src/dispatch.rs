//! Handler table
//!
//! Every event source the session listens to is recorded explicitly as a
//! `(Source, EventKind) -> Handler` entry. Subscribing a surface, keyboard or
//! output adds entries; destroying it removes them. Events whose source has no
//! entry are dropped by the session.

use std::collections::HashMap;

use crate::event::Event;
use crate::output::OutputId;
use crate::protocol::{DeviceId, ToplevelRequest};
use crate::surface::SurfaceId;

/// Object that emits events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// The display backend (new inputs and outputs)
    Backend,
    /// The xdg shell (new surfaces)
    Shell,
    /// The shared cursor
    Cursor,
    /// The seat (client requests)
    Seat,
    Surface(SurfaceId),
    Keyboard(DeviceId),
    Output(OutputId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewSurface,
    NewInput,
    NewOutput,
    Motion,
    MotionAbsolute,
    Button,
    Axis,
    Frame,
    RequestSetCursor,
    RequestSetSelection,
    Destroy,
    Map,
    Unmap,
    NewPopup,
    Commit,
    ToplevelRequest(ToplevelRequest),
    Reposition,
    Modifiers,
    Key,
}

/// Role written into a forwarded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLabel {
    /// The emitting surface's own role name
    OfSurface,
    Toplevel,
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    NewSurface,
    NewInput,
    NewOutput,
    CursorMotion,
    CursorMotionAbsolute,
    CursorButton,
    CursorAxis,
    CursorFrame,
    RequestSetCursor,
    RequestSetSelection,
    SurfaceDestroy,
    SurfaceMap,
    SurfaceUnmap,
    SurfaceCommit,
    /// Forward the event to the policy process unchanged
    Notify { event: Event, role: RoleLabel },
    KeyboardModifiers,
    KeyboardKey,
    OutputFrame,
}

#[derive(Debug, Default)]
pub struct HandlerTable {
    records: HashMap<(Source, EventKind), Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handler` for `kind` events from `source`, replacing any previous entry.
    pub fn subscribe(&mut self, source: Source, kind: EventKind, handler: Handler) {
        self.records.insert((source, kind), handler);
    }

    pub fn unsubscribe(&mut self, source: Source, kind: EventKind) -> Option<Handler> {
        self.records.remove(&(source, kind))
    }

    /// Drop every entry of `source`, returning how many were removed.
    pub fn unsubscribe_source(&mut self, source: Source) -> usize {
        let before = self.records.len();
        self.records.retain(|(s, _), _| *s != source);
        before - self.records.len()
    }

    pub fn lookup(&self, source: Source, kind: EventKind) -> Option<Handler> {
        self.records.get(&(source, kind)).copied()
    }

    pub fn is_subscribed(&self, source: Source, kind: EventKind) -> bool {
        self.records.contains_key(&(source, kind))
    }

    pub fn subscriptions(&self, source: Source) -> usize {
        self.records.keys().filter(|(s, _)| *s == source).count()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(Source, EventKind) -> bool) {
        self.records.retain(|(source, kind), _| keep(*source, *kind));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
