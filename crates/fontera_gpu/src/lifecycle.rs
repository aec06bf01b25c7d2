//! Device lifecycle and deferred uploads
//!
//! Rendering can be requested before the GPU device exists. Work that needs the
//! device is queued until [`GpuContext::device_ready`] and then run once, in
//! registration order, on the same thread. After the device is ready nothing
//! can be queued; callers upload directly.

use crate::error::{GpuError, Result};
use crate::upload::{TextureUpload, UploadBackend};
use image::RgbaImage;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Deferred<B> = Box<dyn FnOnce(&B)>;

enum DeviceState<B> {
    Pending(VecDeque<Deferred<B>>),
    Ready(Rc<B>),
}

/// Outcome of [`GpuContext::upload_or_defer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    Deferred,
}

/// Shared handle to the device state
///
/// Cloning shares the same queue and backend.
pub struct GpuContext<B> {
    state: Rc<RefCell<DeviceState<B>>>,
}

impl<B> Clone for GpuContext<B> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<B: UploadBackend + 'static> GpuContext<B> {
    /// Context whose device is not available yet
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState::Pending(VecDeque::new()))),
        }
    }

    /// Context with a device already available
    pub fn ready(backend: B) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState::Ready(Rc::new(backend)))),
        }
    }

    /// The backend, once the device is ready
    pub fn backend(&self) -> Option<Rc<B>> {
        match &*self.state.borrow() {
            DeviceState::Ready(backend) => Some(Rc::clone(backend)),
            DeviceState::Pending(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.borrow(), DeviceState::Ready(_))
    }

    /// Number of queued actions
    pub fn pending(&self) -> usize {
        match &*self.state.borrow() {
            DeviceState::Pending(queue) => queue.len(),
            DeviceState::Ready(_) => 0,
        }
    }

    /// Queue `action` to run when the device becomes ready
    pub fn on_ready(&self, action: impl FnOnce(&B) + 'static) -> Result<()> {
        match &mut *self.state.borrow_mut() {
            DeviceState::Pending(queue) => {
                queue.push_back(Box::new(action));
                Ok(())
            }
            DeviceState::Ready(_) => Err(GpuError::AlreadyReady),
        }
    }

    /// Mark the device ready and run every queued action in order
    ///
    /// A second call keeps the first backend and drops `backend`.
    pub fn device_ready(&self, backend: B) -> Rc<B> {
        let backend = Rc::new(backend);
        let previous = std::mem::replace(
            &mut *self.state.borrow_mut(),
            DeviceState::Ready(Rc::clone(&backend)),
        );

        let queue = match previous {
            DeviceState::Pending(queue) => queue,
            DeviceState::Ready(existing) => {
                tracing::warn!("Device reported ready twice; keeping the first backend");
                *self.state.borrow_mut() = DeviceState::Ready(Rc::clone(&existing));
                return existing;
            }
        };

        tracing::info!("GPU device ready; running {} deferred action(s)", queue.len());
        for action in queue {
            action(&backend);
        }
        backend
    }

    /// Upload now if the device is ready, otherwise queue the upload
    ///
    /// A queued upload holds only a weak reference; if the upload is dropped
    /// before the device is ready, the queued work does nothing.
    pub fn upload_or_defer(
        &self,
        upload: &Rc<RefCell<TextureUpload<B>>>,
        image: RgbaImage,
    ) -> Result<UploadStatus> {
        if let Some(backend) = self.backend() {
            upload.borrow_mut().upload_rgba(&backend, &image)?;
            return Ok(UploadStatus::Uploaded);
        }

        let weak = Rc::downgrade(upload);
        self.on_ready(move |backend| {
            let Some(upload) = weak.upgrade() else {
                tracing::debug!("Deferred upload dropped before the device was ready");
                return;
            };
            let mut upload = upload.borrow_mut();
            if let Err(e) = upload.upload_rgba(backend, &image) {
                tracing::error!("Deferred upload of {} failed: {}", upload.label(), e);
            }
        })?;
        Ok(UploadStatus::Deferred)
    }
}

impl<B: UploadBackend + 'static> Default for GpuContext<B> {
    fn default() -> Self {
        Self::new()
    }
}
