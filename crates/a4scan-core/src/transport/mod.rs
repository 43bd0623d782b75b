//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::MockChannel;
pub use nusb::UsbChannel;
pub use traits::{BulkIo, DuplexChannel, TransferFailure};
