//! Transport layer abstraction.
//!
//! `DuplexChannel` is the seam between the protocol layer and the USB
//! stack, allowing different implementations (nusb, mock, simulator).
//! `BulkIo` sits one level lower and models a single raw bulk transfer;
//! the retry policies are written against it so they can be tested
//! without hardware.

use tracing::{debug, warn};

use crate::error::ErrorCode;

/// Read transfers are attempted this many times before giving up.
pub const READ_MAX_ATTEMPTS: u32 = 5;

/// Write transfers are attempted this many times before giving up.
pub const WRITE_MAX_ATTEMPTS: u32 = 3;

/// How a single bulk transfer failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    /// The endpoint stalled; recoverable with a clear-halt.
    Stall,
    /// The device dropped off the bus.
    Disconnected,
    /// Any other transfer failure.
    Other(String),
}

/// A single pair of raw bulk endpoints.
///
/// `write_some` may send fewer bytes than requested; the caller decides
/// whether and how to resubmit the remainder.
pub trait BulkIo {
    fn write_some(&mut self, data: &[u8]) -> Result<usize, TransferFailure>;
    fn read_some(&mut self, max_length: usize) -> Result<Vec<u8>, TransferFailure>;
    fn clear_halt_in(&mut self) -> Result<(), TransferFailure>;
    fn clear_halt_out(&mut self) -> Result<(), TransferFailure>;
}

/// A connected duplex link to the scanner.
pub trait DuplexChannel: Send {
    /// Opens the device, claims the interface and validates the bulk
    /// endpoints. A no-op when already connected.
    fn connect(&mut self) -> Result<(), ErrorCode>;

    /// Releases the device. A no-op when not connected.
    fn disconnect(&mut self);

    /// Reads up to `max_length` bytes, retrying stalled transfers.
    fn read(&mut self, max_length: usize) -> Result<Vec<u8>, ErrorCode>;

    /// Writes the whole buffer, retrying stalled or short transfers.
    fn write(&mut self, data: &[u8]) -> Result<(), ErrorCode>;
}

/// Reads one response, retrying up to [`READ_MAX_ATTEMPTS`] times with a
/// clear-halt on the IN endpoint between attempts. An empty transfer
/// counts as a failed attempt. Exhausting the attempts without data
/// reports [`ErrorCode::NoDeviceAnswer`].
pub fn read_with_retries(
    io: &mut impl BulkIo,
    max_length: usize,
) -> Result<Vec<u8>, ErrorCode> {
    for attempt in 1..=READ_MAX_ATTEMPTS {
        match io.read_some(max_length) {
            Ok(data) if !data.is_empty() => {
                debug!(bytes = data.len(), attempt, "read complete");
                return Ok(data);
            }
            Ok(_) => {
                debug!(attempt, "empty read");
            }
            Err(TransferFailure::Disconnected) => {
                warn!(attempt, "device disconnected during read");
                return Err(ErrorCode::ScannerOffline);
            }
            Err(failure) => {
                debug!(attempt, ?failure, "read transfer failed");
            }
        }
        if attempt < READ_MAX_ATTEMPTS {
            if let Err(TransferFailure::Disconnected) = io.clear_halt_in() {
                return Err(ErrorCode::ScannerOffline);
            }
        }
    }
    warn!("device produced no answer");
    Err(ErrorCode::NoDeviceAnswer)
}

/// Writes the whole buffer, retrying up to [`WRITE_MAX_ATTEMPTS`] times.
/// After a short write only the unsent remainder is resubmitted, with a
/// clear-halt on the OUT endpoint before the retry. Exhausting the
/// attempts reports [`ErrorCode::WriteError`].
pub fn write_with_retries(io: &mut impl BulkIo, data: &[u8]) -> Result<(), ErrorCode> {
    let mut remaining = data;
    for attempt in 1..=WRITE_MAX_ATTEMPTS {
        match io.write_some(remaining) {
            Ok(sent) => {
                remaining = &remaining[sent.min(remaining.len())..];
                if remaining.is_empty() {
                    debug!(bytes = data.len(), attempt, "write complete");
                    return Ok(());
                }
                debug!(attempt, sent, pending = remaining.len(), "short write");
            }
            Err(TransferFailure::Disconnected) => {
                warn!(attempt, "device disconnected during write");
                return Err(ErrorCode::ScannerOffline);
            }
            Err(failure) => {
                debug!(attempt, ?failure, "write transfer failed");
            }
        }
        if attempt < WRITE_MAX_ATTEMPTS {
            if let Err(TransferFailure::Disconnected) = io.clear_halt_out() {
                return Err(ErrorCode::ScannerOffline);
            }
        }
    }
    warn!(pending = remaining.len(), "write retries exhausted");
    Err(ErrorCode::WriteError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedIo {
        reads: VecDeque<Result<Vec<u8>, TransferFailure>>,
        writes: VecDeque<Result<usize, TransferFailure>>,
        received: Vec<u8>,
        clear_halt_in_count: u32,
        clear_halt_out_count: u32,
    }

    impl BulkIo for ScriptedIo {
        fn write_some(&mut self, data: &[u8]) -> Result<usize, TransferFailure> {
            let outcome = self.writes.pop_front().unwrap_or(Ok(data.len()));
            if let Ok(sent) = &outcome {
                let sent = (*sent).min(data.len());
                self.received.extend_from_slice(&data[..sent]);
            }
            outcome
        }

        fn read_some(&mut self, _max_length: usize) -> Result<Vec<u8>, TransferFailure> {
            self.reads.pop_front().unwrap_or(Ok(Vec::new()))
        }

        fn clear_halt_in(&mut self) -> Result<(), TransferFailure> {
            self.clear_halt_in_count += 1;
            Ok(())
        }

        fn clear_halt_out(&mut self) -> Result<(), TransferFailure> {
            self.clear_halt_out_count += 1;
            Ok(())
        }
    }

    #[test]
    fn read_returns_first_nonempty_transfer() {
        let mut io = ScriptedIo::default();
        io.reads.push_back(Ok(b"abc".to_vec()));
        assert_eq!(read_with_retries(&mut io, 30).unwrap(), b"abc");
        assert_eq!(io.clear_halt_in_count, 0);
    }

    #[test]
    fn read_clears_halt_between_attempts() {
        let mut io = ScriptedIo::default();
        io.reads.push_back(Err(TransferFailure::Stall));
        io.reads.push_back(Err(TransferFailure::Stall));
        io.reads.push_back(Ok(b"ok".to_vec()));
        assert_eq!(read_with_retries(&mut io, 30).unwrap(), b"ok");
        assert_eq!(io.clear_halt_in_count, 2);
    }

    #[test]
    fn read_exhaustion_is_no_device_answer() {
        let mut io = ScriptedIo::default();
        for _ in 0..READ_MAX_ATTEMPTS {
            io.reads.push_back(Ok(Vec::new()));
        }
        assert_eq!(read_with_retries(&mut io, 30), Err(ErrorCode::NoDeviceAnswer));
        assert_eq!(io.clear_halt_in_count, READ_MAX_ATTEMPTS - 1);
    }

    #[test]
    fn read_disconnect_is_not_retried() {
        let mut io = ScriptedIo::default();
        io.reads.push_back(Err(TransferFailure::Disconnected));
        io.reads.push_back(Ok(b"never".to_vec()));
        assert_eq!(read_with_retries(&mut io, 30), Err(ErrorCode::ScannerOffline));
    }

    #[test]
    fn short_write_resubmits_only_the_remainder() {
        let mut io = ScriptedIo::default();
        io.writes.push_back(Ok(3));
        io.writes.push_back(Ok(5));
        write_with_retries(&mut io, b"abcdefgh").unwrap();
        assert_eq!(io.received, b"abcdefgh");
        assert_eq!(io.clear_halt_out_count, 1);
    }

    #[test]
    fn stalled_write_recovers_and_delivers_the_whole_buffer() {
        let mut io = ScriptedIo::default();
        io.writes.push_back(Err(TransferFailure::Stall));
        io.writes.push_back(Ok(8));
        write_with_retries(&mut io, b"abcdefgh").unwrap();
        assert_eq!(io.received, b"abcdefgh");
        assert_eq!(io.clear_halt_out_count, 1);
    }

    #[test]
    fn write_exhaustion_is_write_error() {
        let mut io = ScriptedIo::default();
        for _ in 0..WRITE_MAX_ATTEMPTS {
            io.writes.push_back(Err(TransferFailure::Stall));
        }
        assert_eq!(write_with_retries(&mut io, b"abc"), Err(ErrorCode::WriteError));
    }

    #[test]
    fn write_disconnect_is_not_retried() {
        let mut io = ScriptedIo::default();
        io.writes.push_back(Err(TransferFailure::Disconnected));
        assert_eq!(
            write_with_retries(&mut io, b"abc"),
            Err(ErrorCode::ScannerOffline)
        );
    }
}
