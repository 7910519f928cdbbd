mod devices;
mod engine;
mod error;
mod model;
mod parser;

pub use devices::enumerate_devices;
pub use engine::CaptureEngine;
pub use error::CaptureError;
pub use model::{CaptureDevice, CaptureOptions, PacketCaptureRecord};
