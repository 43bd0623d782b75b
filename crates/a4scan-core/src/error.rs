//! Driver-facing error taxonomy.

use thiserror::Error;

/// Errors reported by the driver to its callers.
///
/// Every public operation returns `Result<_, ErrorCode>`. The variants are
/// grouped by remediation: transport problems (reconnect the device),
/// protocol problems (usually retried internally), physical paper faults
/// (require operator intervention before retrying), and derived conditions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The scanner is offline or the link dropped mid-transfer.
    #[error("scanner offline")]
    ScannerOffline,

    /// The USB device could not be opened or configured.
    #[error("failed to open device")]
    OpenDeviceError,

    /// A transfer was attempted before `connect()` succeeded.
    #[error("device is not opened, connect first")]
    DeviceNotOpened,

    /// The device produced no data after exhausting read retries.
    #[error("the device doesn't answer")]
    NoDeviceAnswer,

    /// Write retries were exhausted without sending the whole buffer.
    #[error("write error")]
    WriteError,

    /// A lock guarding the device could not be acquired.
    #[error("communication synchronization error")]
    SynchronizationError,

    /// A value could not be encoded into a wire record.
    #[error("invalid parameter")]
    InvalidParameter,

    /// A buffer was too small to decode the expected record.
    #[error("small buffer")]
    SmallBuffer,

    /// Firmware rejected the command as invalid.
    #[error("invalid command")]
    InvalidCommand,

    /// Firmware rejected the job handle; the job must be recreated.
    #[error("scan job not valid")]
    JobNotValid,

    /// Firmware reported a malformed request, or a reply had trailing bytes.
    #[error("communication unknown error")]
    CommunicationUnknownError,

    /// The reply matched none of the known record shapes.
    #[error("device answer unknown")]
    DeviceAnswerUnknown,

    /// No document has been scanned for the requested side.
    #[error("no document scanned")]
    NoDocumentScanned,

    /// No document was inserted to be scanned.
    #[error("no document to be scanned")]
    NoDocumentToBeScanned,

    /// Mechanical paper jam.
    #[error("paper jam")]
    PaperJam,

    /// The paper was held back by the user during scanning.
    #[error("paper held back by user")]
    PaperHeldBack,

    /// The scanner could not disengage from the paper sheet.
    #[error("scanner jam")]
    ScannerJam,

    /// The scanner stalled with the motor off and no scan in progress.
    #[error("scanner error")]
    ScannerError,

    /// A trouble impeded a correct scan (feed fault or power problem).
    #[error("scan impeded")]
    ScanImpeded,

    /// More than one sheet was fed at the same time.
    #[error("double sheet detected")]
    DoubleSheet,
}
