use wgpu::{Device, ErrorFilter};

use crate::DeviceError;

/// Captures validation and out-of-memory errors raised by the GPU work created while it is alive.
#[must_use = "All error scopes must end in a call to `end`"]
pub struct DeviceErrorScope<'a> {
    device: &'a Device,
    operation: &'static str,
    ended: bool,
}

impl<'a> DeviceErrorScope<'a> {
    pub fn new(device: &'a Device, operation: &'static str) -> Self {
        device.push_error_scope(ErrorFilter::OutOfMemory);
        device.push_error_scope(ErrorFilter::Validation);
        Self {
            device,
            operation,
            ended: false,
        }
    }

    pub fn end(mut self) -> Result<(), DeviceError> {
        self.ended = true;
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        match validation.or(oom) {
            Some(error) => {
                log::error!("GPU error during {}: {}", self.operation, error);
                Err(DeviceError::from_wgpu(self.operation, error))
            }
            None => Ok(()),
        }
    }
}

impl<'a> Drop for DeviceErrorScope<'a> {
    fn drop(&mut self) {
        if !self.ended {
            log::error!("DeviceErrorScope for {} dropped without calling `end`", self.operation);
            let _ = pollster::block_on(self.device.pop_error_scope());
            let _ = pollster::block_on(self.device.pop_error_scope());
        }
    }
}
