use voicemesh_client::DeviceError;
use voicemesh_client::media::{CaptureConfig, CaptureSource, CaptureStream};

/// Capture source that always fails, for join-abort tests.
pub struct FailingSource(pub DeviceError);

impl CaptureSource for FailingSource {
    fn acquire(&self, _config: &CaptureConfig) -> Result<CaptureStream, DeviceError> {
        Err(self.0)
    }
}
