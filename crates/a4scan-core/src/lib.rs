//! Driver for the Custom A4 sheet-fed document scanner.
//!
//! Speaks the scanner's binary protocol over USB bulk transfers and
//! exposes a blocking, session-oriented API: connect, query status,
//! scan both sides of a sheet, move paper, reset.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Coder**: Binary message encoding/decoding primitives
//! - **Protocol**: The request/response record catalog and operations
//! - **Transport**: USB duplex channel abstraction (nusb, mocks)
//! - **Status**: Interpretation of raw status records
//! - **Scanner**: High-level session with locking, retries and the scan loop
//! - **Watch**: Pull-driven status-change sequence
//! - **Sim**: Deterministic paper state machine and simulated device
//!
//! # Example
//!
//! ```no_run
//! use a4scan_core::scanner::{CustomA4Scanner, ScanOptions};
//! use a4scan_core::types::{
//!     DoubleSheetDetection, FormStanding, ImageColorDepth, ImageResolution,
//!     ScanParameters, ScanSide,
//! };
//!
//! let scanner = CustomA4Scanner::open()?;
//! let parameters = ScanParameters {
//!     wanted_scan_side: ScanSide::AAndB,
//!     resolution: ImageResolution::Dpi200,
//!     image_color_depth: ImageColorDepth::Grey8bpp,
//!     form_standing_after_scan: FormStanding::HoldTicket,
//!     double_sheet_detection: DoubleSheetDetection::Level2,
//! };
//! let images = scanner.scan(&parameters, ScanOptions::default())?;
//! println!("side A: {} bytes", images.side_a.image_buffer.len());
//! # Ok::<(), a4scan_core::ErrorCode>(())
//! ```

pub mod coder;
pub mod error;
pub mod parameters;
pub mod protocol;
pub mod scanner;
pub mod sim;
pub mod status;
pub mod transport;
pub mod types;
pub mod watch;

// Re-exports for convenience
pub use error::ErrorCode;
pub use scanner::{CustomA4Scanner, ScanOptions};
pub use sim::{MockA4Scanner, PaperState, SimOptions};
pub use status::{InterpretedStatus, convert_from_internal_status};
pub use transport::{DuplexChannel, MockChannel, UsbChannel};
pub use types::{
    FormMovement, ImageFromScanner, ReleaseType, ScanParameters, ScannerA4Status, ScannerStatus,
    Sheet,
};
pub use watch::{StatusWatcher, WatchHandle};
