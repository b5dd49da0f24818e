//! Cursor image state
//!
//! The pointer either shows a named image from the xcursor theme, a surface
//! provided by the client under the pointer, or nothing at all.

use smithay::utils::{Logical, Point};

/// Image shown when the pointer is not over any client surface
pub const DEFAULT_CURSOR: &str = "left_ptr";

#[derive(Debug, Clone, PartialEq)]
pub enum CursorImage {
    /// Named image from the cursor theme
    Named(String),
    /// Client-provided surface with its hotspot
    Surface {
        surface: crate::surface::SurfaceId,
        hotspot: Point<i32, Logical>,
    },
    Hidden,
}

impl CursorImage {
    pub fn default_pointer() -> Self {
        CursorImage::Named(DEFAULT_CURSOR.to_string())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, CursorImage::Named(name) if name == DEFAULT_CURSOR)
    }
}

impl Default for CursorImage {
    fn default() -> Self {
        Self::default_pointer()
    }
}

/// Cursor theme settings handed to the cursor image manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorTheme {
    pub name: Option<String>,
    pub size: u32,
}
