use std::fmt;
use std::rc::Rc;

use super::{ContextHandle, RenderSurface};

/// How the drawing buffer composes with whatever is behind the surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum TransparentMode {
    /// No alpha channel.
    #[default]
    Opaque,
    /// Alpha channel with color already multiplied by alpha.
    Premultiplied,
    /// Alpha channel with straight (non-multiplied) color.
    StraightAlpha,
}

impl TransparentMode {
    #[inline]
    pub fn is_transparent(self) -> bool {
        self != TransparentMode::Opaque
    }
}

/// Construction options for [`ContextManager`](super::ContextManager).
///
/// Either `existing_context` is adopted as-is, or a new context is created on
/// `surface` using attributes derived from the remaining fields.
#[derive(Clone, Default)]
pub struct ContextOptions {
    /// Pre-created context to adopt instead of creating one.
    pub existing_context: Option<ContextHandle>,

    /// Drawing surface. Required when `existing_context` is absent; also the
    /// source of loss/restore signals.
    pub surface: Option<Rc<dyn RenderSurface>>,

    pub transparent_mode: TransparentMode,

    pub antialias: bool,

    /// Keep the drawing buffer contents after presentation.
    pub preserve_drawing_buffer: bool,
}

impl ContextOptions {
    /// Attributes requested from the surface on the create path.
    pub fn attributes(&self) -> ContextAttributes {
        let transparent = self.transparent_mode.is_transparent();
        ContextAttributes {
            stencil: true,
            alpha: transparent,
            antialias: self.antialias,
            premultiplied_alpha: transparent
                && self.transparent_mode != TransparentMode::StraightAlpha,
            preserve_drawing_buffer: self.preserve_drawing_buffer,
        }
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("existing_context", &self.existing_context.is_some())
            .field("surface", &self.surface.is_some())
            .field("transparent_mode", &self.transparent_mode)
            .field("antialias", &self.antialias)
            .field("preserve_drawing_buffer", &self.preserve_drawing_buffer)
            .finish()
    }
}

/// Attributes requested when creating a context.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ContextAttributes {
    pub stencil: bool,
    pub alpha: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        ContextOptions::default().attributes()
    }
}
