//! Process entry point
//!
//! [`Fontera`] owns the device context, the shared font registry and the
//! default renderer. Work registered with [`Fontera::on_client_start`] runs
//! once, in order, when the host reports that the client has started.

use crate::config::FonteraConfig;
use crate::pool::RendererPool;
use crate::renderer::TextRenderer;
use crate::{FonteraError, Result};
use fontera_gpu::{GpuContext, GpuError, UploadBackend};
use fontera_text::FontRegistry;
use std::cell::RefCell;
use std::rc::Rc;

type StartCallback = Box<dyn FnOnce()>;

pub struct Fontera<B: UploadBackend + 'static> {
    config: FonteraConfig,
    context: GpuContext<B>,
    registry: Rc<RefCell<FontRegistry>>,
    start_callbacks: Vec<StartCallback>,
    started: bool,
    text_renderer: Option<TextRenderer<B>>,
    pool: RendererPool<B>,
}

impl<B: UploadBackend + 'static> Fontera<B> {
    /// Runtime backed by the system font database
    pub fn new(config: FonteraConfig) -> Self {
        Self::with_registry(config, FontRegistry::new())
    }

    pub fn with_registry(config: FonteraConfig, registry: FontRegistry) -> Self {
        let context = GpuContext::new();
        let registry = Rc::new(RefCell::new(registry));
        let pool = RendererPool::with_config(
            context.clone(),
            Rc::clone(&registry),
            config.default_font_path.clone(),
            &config.cache,
        );

        Self {
            config,
            context,
            registry,
            start_callbacks: Vec::new(),
            started: false,
            text_renderer: None,
            pool,
        }
    }

    /// Queue `callback` to run when the client starts
    pub fn on_client_start(&mut self, callback: impl FnOnce() + 'static) -> Result<()> {
        if self.started {
            return Err(GpuError::AlreadyReady.into());
        }
        self.start_callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Host lifecycle signal: the client and its GPU device are up
    ///
    /// Runs queued start callbacks in order, releases deferred uploads, then
    /// creates the default renderer.
    pub fn client_started(&mut self, backend: B) -> Result<()> {
        if self.started {
            tracing::warn!("Client start reported twice; ignoring");
            return Ok(());
        }
        self.started = true;

        for callback in std::mem::take(&mut self.start_callbacks) {
            callback();
        }
        self.context.device_ready(backend);

        let renderer = TextRenderer::with_policy(
            self.config.default_font_path.clone(),
            10.0,
            Rc::clone(&self.registry),
            self.context.clone(),
            self.config.cache.eviction_policy(),
        )?;
        tracing::info!(
            "Fontera started with font '{}'",
            renderer.primary_font().family_name()
        );
        self.text_renderer = Some(renderer);
        Ok(())
    }

    /// The default renderer
    ///
    /// # Panics
    ///
    /// Panics if called before [`client_started`](Self::client_started).
    pub fn text_renderer(&mut self) -> &mut TextRenderer<B> {
        match self.text_renderer.as_mut() {
            Some(renderer) => renderer,
            None => panic!("Text renderer not initialized."),
        }
    }

    pub fn try_text_renderer(&mut self) -> Option<&mut TextRenderer<B>> {
        self.text_renderer.as_mut()
    }

    /// Renderers keyed by font path and base size
    pub fn pool(&mut self) -> &mut RendererPool<B> {
        &mut self.pool
    }

    pub fn context(&self) -> &GpuContext<B> {
        &self.context
    }

    pub fn registry(&self) -> &Rc<RefCell<FontRegistry>> {
        &self.registry
    }

    pub fn config(&self) -> &FonteraConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Release every texture owned by the runtime
    pub fn shutdown(&mut self) {
        if let Some(mut renderer) = self.text_renderer.take() {
            renderer.dispose();
        }
        self.pool.dispose_all();
    }
}

impl<B: UploadBackend + 'static> Drop for Fontera<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fontera_gpu::MemoryBackend;

    fn empty_runtime() -> Fontera<MemoryBackend> {
        Fontera::with_registry(
            FonteraConfig::default(),
            FontRegistry::with_database(fontdb::Database::new()),
        )
    }

    #[test]
    #[should_panic(expected = "Text renderer not initialized.")]
    fn test_accessor_fails_fast_before_start() {
        let mut fontera = empty_runtime();
        fontera.text_renderer();
    }

    #[test]
    fn test_try_accessor_before_start() {
        let mut fontera = empty_runtime();
        assert!(fontera.try_text_renderer().is_none());
        assert!(!fontera.is_started());
    }

    #[test]
    fn test_start_callbacks_run_in_order() {
        let mut fontera = empty_runtime();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            fontera.on_client_start(move || order.borrow_mut().push(i)).unwrap();
        }

        // No fonts installed: the default renderer cannot be created
        let result = fontera.client_started(MemoryBackend::new());

        assert!(matches!(result, Err(FonteraError::NoFont(_))));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(fontera.context().is_ready());
    }

    #[test]
    fn test_late_start_callback_is_rejected() {
        let mut fontera = empty_runtime();
        let _ = fontera.client_started(MemoryBackend::new());
        let result = fontera.on_client_start(|| {});
        assert!(matches!(
            result,
            Err(FonteraError::Gpu(GpuError::AlreadyReady))
        ));
    }

    #[test]
    fn test_default_renderer_after_start() {
        let mut fontera: Fontera<MemoryBackend> = Fontera::new(FonteraConfig::default());
        if fontera.registry().borrow_mut().first_available().is_none() {
            println!("Skipping: no system fonts available");
            return;
        }

        fontera.client_started(MemoryBackend::new()).unwrap();

        let renderer = fontera.text_renderer();
        assert_eq!(renderer.base_size(), 10.0);
        assert_eq!(renderer.render_size(), None);
    }
}
