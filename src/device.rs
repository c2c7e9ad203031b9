use std::cell::RefCell;
use std::marker::PhantomData;
use serde::{Deserialize, Serialize};
use crate::backends::TensorBackend;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("The backend {1} cannot place tensors on {0}")]
    UnsupportedDevice(TensorDeviceType, TensorBackend),
    #[error("No {0} device is available for backend {1}")]
    DeviceUnavailable(TensorDeviceType, TensorBackend),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    strum_macros::EnumIter, strum_macros::Display)]
pub enum TensorDeviceType {
    CPU,
    GPU,
}

thread_local! {
    static DEVICE_SCOPE: RefCell<Vec<TensorDeviceType>> = const { RefCell::new(Vec::new()) };
}

/// Makes `device` the target for tensor creation on this thread until dropped.
///
/// Scopes nest; dropping a guard restores whatever was current before it was entered,
/// including when the guarded creation returned an error or unwound.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct DeviceScope {
    device: TensorDeviceType,
    // Stack length before this guard pushed its entry.
    depth: usize,
    // The stack is per thread, so the guard must stay on the thread that pushed it.
    _not_send: PhantomData<*const ()>,
}

impl DeviceScope {
    pub fn enter(device: TensorDeviceType) -> Self {
        let depth = DEVICE_SCOPE.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(device);
            stack.len() - 1
        });
        log::debug!("Entered {device} device scope");
        Self {
            device,
            depth,
            _not_send: PhantomData,
        }
    }
}

impl Drop for DeviceScope {
    fn drop(&mut self) {
        // Also discards scopes entered after this one that are still alive.
        DEVICE_SCOPE.with(|stack| stack.borrow_mut().truncate(self.depth));
        log::debug!("Left {} device scope", self.device);
    }
}

/// Device that creation calls target right now; CPU outside of any scope.
pub fn current_device() -> TensorDeviceType {
    DEVICE_SCOPE.with(|stack| stack.borrow().last().copied().unwrap_or(TensorDeviceType::CPU))
}

pub fn with_device<T>(device: TensorDeviceType, f: impl FnOnce() -> T) -> T {
    let _scope = DeviceScope::enter(device);
    f()
}

/// Device types with at least one usable device for `backend` on this host.
pub fn available_devices(backend: TensorBackend) -> Vec<TensorDeviceType> {
    let mut devices = Vec::new();
    if !backend.is_compiled() {
        return devices;
    }
    devices.push(TensorDeviceType::CPU);
    if gpu_available(backend) {
        devices.push(TensorDeviceType::GPU);
    }
    devices
}

fn gpu_available(backend: TensorBackend) -> bool {
    match backend {
        TensorBackend::NDArray | TensorBackend::Ort => false,
        #[cfg(feature = "candle")]
        TensorBackend::Candle => crate::backends::candle_backend::gpu_device().is_ok(),
        #[cfg(feature = "tch")]
        TensorBackend::Tch => tch::Cuda::is_available(),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

pub fn to_canonical_device(tensor: &crate::Tensor) -> TensorDeviceType {
    tensor.device()
}
