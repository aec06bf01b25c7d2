//! Boundary to the host rendering loop

use fontera_gpu::UploadBackend;

/// Services the host engine provides to the renderer
pub trait RenderHost<B: UploadBackend> {
    /// Display scale factor applied to logical sizes
    fn gui_scale(&self) -> f32;

    /// Whether overlays are hidden this frame
    fn hide_gui(&self) -> bool {
        false
    }

    /// Associate an uploaded texture with an identifier for draw submission
    fn register_texture(&mut self, id: &str, texture: &B::Texture);
}

/// Host with a fixed scale that records registered identifiers
#[derive(Debug, Clone)]
pub struct StaticHost {
    pub scale: f32,
    pub hidden: bool,
    pub registered: Vec<String>,
}

impl StaticHost {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            hidden: false,
            registered: Vec::new(),
        }
    }
}

impl Default for StaticHost {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl<B: UploadBackend> RenderHost<B> for StaticHost {
    fn gui_scale(&self) -> f32 {
        self.scale
    }

    fn hide_gui(&self) -> bool {
        self.hidden
    }

    fn register_texture(&mut self, id: &str, _texture: &B::Texture) {
        self.registered.push(id.to_string());
    }
}
