//! Texture handles and sampler/image slots.
//!
//! Texture upload is handled elsewhere; this module only carries the identity
//! and kind of a texture so catalogs can fill their sampler and image slots.

use std::sync::Arc;

use crate::types::TextureKind;

/// A shared texture handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    kind: TextureKind,
    label: Option<String>,
}

impl Texture {
    /// Create a texture of the given kind.
    pub fn new(kind: TextureKind) -> Self {
        Self { kind, label: None }
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// A sampler or image slot of a shader catalog.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    kind: TextureKind,
    texture: Option<Arc<Texture>>,
}

impl TextureBinding {
    pub(crate) fn new(kind: TextureKind) -> Self {
        Self {
            kind,
            texture: None,
        }
    }

    /// Kind of texture the slot expects.
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// Texture currently assigned to the slot.
    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    pub(crate) fn set(&mut self, texture: Arc<Texture>) {
        self.texture = Some(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_label() {
        let texture = Texture::new(TextureKind::Cubemap).with_label("skybox");
        assert_eq!(texture.kind(), TextureKind::Cubemap);
        assert_eq!(texture.label(), Some("skybox"));
    }

    #[test]
    fn test_binding_starts_empty() {
        let mut binding = TextureBinding::new(TextureKind::Image2d);
        assert!(binding.texture().is_none());
        binding.set(Arc::new(Texture::new(TextureKind::Image2d)));
        assert!(binding.texture().is_some());
    }
}
