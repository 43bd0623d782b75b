//! Protocol layer: request/response records plus the send/receive
//! primitives and per-command operations built on top of a
//! [`DuplexChannel`].
//!
//! None of these functions lock the channel; callers serialize access.

pub mod messages;
pub mod mock;

use tracing::debug;

use crate::coder::{CoderError, Message};
use crate::error::ErrorCode;
use crate::transport::DuplexChannel;
use crate::types::{FormMovement, ReleaseType, ScanSide};
use messages::{
    AckResponse, DataResponse, ErrorResponse, FormMovementRequest, GetImageDataRequest,
    HardwareResetRequest, JobCreateRequest, JobEndRequest, MapParametersRequest,
    MapParametersRequestData, ReleaseVersionRequest, ResponseErrorCode,
    SetScanParametersRequest, SetScanParametersRequestData, StartScanRequest,
    StatusInternalMessage, StatusInternalRequest, StopScanRequest,
};

/// Read length used for plain acknowledgement replies.
pub const DEFAULT_MAX_READ_LENGTH: usize = 30;

/// Read length for release version replies.
pub const MAX_RELEASE_VERSION_RESPONSE_LENGTH: usize = 100;

/// Read length for internal status replies.
pub const MAX_STATUS_RESPONSE_LENGTH: usize = 0x30;

/// A device reply classified into one of the known shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckAnswerResult {
    /// Positive acknowledgement with the job handle.
    Ack { job_id: u8 },
    /// Firmware error, already mapped to the driver taxonomy.
    Error { error_code: ErrorCode },
    /// String payload.
    Data { data: String },
    /// Anything else; the caller decodes it itself.
    Other { buffer: Vec<u8> },
}

pub(crate) fn map_coder_error(error: CoderError) -> ErrorCode {
    match error {
        CoderError::InvalidValue => ErrorCode::InvalidParameter,
        CoderError::SmallBuffer => ErrorCode::SmallBuffer,
        CoderError::TrailingData => ErrorCode::CommunicationUnknownError,
    }
}

fn map_response_error(error_code: ResponseErrorCode) -> ErrorCode {
    match error_code {
        ResponseErrorCode::FormatError => ErrorCode::CommunicationUnknownError,
        ResponseErrorCode::InvalidCommand => ErrorCode::InvalidCommand,
        ResponseErrorCode::InvalidJobId => ErrorCode::JobNotValid,
    }
}

/// Classifies a reply buffer.
pub fn check_answer(data: &[u8]) -> CheckAnswerResult {
    if let Ok(AckResponse { job_id }) = AckResponse::decode(data) {
        debug!(job_id, "reply: ack");
        return CheckAnswerResult::Ack { job_id };
    }
    if let Ok(ErrorResponse { error_code }) = ErrorResponse::decode(data) {
        debug!(?error_code, "reply: firmware error");
        return CheckAnswerResult::Error {
            error_code: map_response_error(error_code),
        };
    }
    if let Ok(DataResponse { data }) = DataResponse::decode(data) {
        debug!(len = data.len(), "reply: data");
        return CheckAnswerResult::Data { data };
    }
    debug!(len = data.len(), "reply: unclassified");
    CheckAnswerResult::Other {
        buffer: data.to_vec(),
    }
}

/// Encodes and writes one request. Does not wait for a reply.
pub fn send_request<C, M>(channel: &mut C, request: &M) -> Result<(), ErrorCode>
where
    C: DuplexChannel + ?Sized,
    M: Message,
{
    let encoded = request.encode().map_err(map_coder_error)?;
    channel.write(&encoded)
}

/// Sends a request and classifies the reply.
pub fn send_request_and_read_response<C, M>(
    channel: &mut C,
    request: &M,
    max_length: usize,
) -> Result<CheckAnswerResult, ErrorCode>
where
    C: DuplexChannel + ?Sized,
    M: Message,
{
    send_request(channel, request)?;
    let reply = channel.read(max_length)?;
    Ok(check_answer(&reply))
}

fn expect_ack(response: CheckAnswerResult) -> Result<u8, ErrorCode> {
    match response {
        CheckAnswerResult::Ack { job_id } => Ok(job_id),
        CheckAnswerResult::Error { error_code } => Err(error_code),
        _ => Err(ErrorCode::DeviceAnswerUnknown),
    }
}

fn expect_data(response: CheckAnswerResult) -> Result<String, ErrorCode> {
    match response {
        CheckAnswerResult::Data { data } => Ok(data),
        CheckAnswerResult::Error { error_code } => Err(error_code),
        _ => Err(ErrorCode::DeviceAnswerUnknown),
    }
}

fn expect_raw(response: CheckAnswerResult) -> Result<Vec<u8>, ErrorCode> {
    match response {
        CheckAnswerResult::Other { buffer } => Ok(buffer),
        CheckAnswerResult::Error { error_code } => Err(error_code),
        _ => Err(ErrorCode::DeviceAnswerUnknown),
    }
}

/// Creates the scan job and returns its handle.
pub fn create_job<C: DuplexChannel + ?Sized>(channel: &mut C) -> Result<u8, ErrorCode> {
    debug!("create_job");
    let response =
        send_request_and_read_response(channel, &JobCreateRequest, DEFAULT_MAX_READ_LENGTH)?;
    expect_ack(response)
}

/// Releases a job handle.
pub fn end_job<C: DuplexChannel + ?Sized>(channel: &mut C, job_id: u8) -> Result<(), ErrorCode> {
    debug!(job_id, "end_job");
    let response = send_request_and_read_response(
        channel,
        &JobEndRequest { job_id },
        DEFAULT_MAX_READ_LENGTH,
    )?;
    expect_ack(response).map(|_| ())
}

/// Fetches one of the release version strings.
pub fn get_release_version<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    release_type: ReleaseType,
) -> Result<String, ErrorCode> {
    debug!(?release_type, "get_release_version");
    let response = send_request_and_read_response(
        channel,
        &ReleaseVersionRequest { release_type },
        MAX_RELEASE_VERSION_RESPONSE_LENGTH,
    )?;
    expect_data(response)
}

/// Fetches and decodes the raw internal status record.
pub fn get_status_internal<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    job_id: u8,
) -> Result<StatusInternalMessage, ErrorCode> {
    let response = send_request_and_read_response(
        channel,
        &StatusInternalRequest { job_id },
        MAX_STATUS_RESPONSE_LENGTH,
    )?;
    let buffer = expect_raw(response)?;
    StatusInternalMessage::decode(&buffer).map_err(map_coder_error)
}

/// Drives the paper transport.
pub fn form_move<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    job_id: u8,
    movement: FormMovement,
) -> Result<(), ErrorCode> {
    debug!(job_id, ?movement, "form_move");
    let response = send_request_and_read_response(
        channel,
        &FormMovementRequest { movement, job_id },
        DEFAULT_MAX_READ_LENGTH,
    )?;
    expect_ack(response).map(|_| ())
}

/// Sends the scan parameter announcement and its 40-byte data block,
/// then reads the single acknowledgement covering both.
pub fn set_scan_parameters<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    job_id: u8,
    parameters: &SetScanParametersRequestData,
) -> Result<(), ErrorCode> {
    debug!(job_id, "set_scan_parameters");
    send_request(channel, &SetScanParametersRequest { job_id })?;
    send_request(channel, parameters)?;
    let reply = channel.read(DEFAULT_MAX_READ_LENGTH)?;
    expect_ack(check_answer(&reply)).map(|_| ())
}

/// Sends a tone map selector and its clip/gamma data block, then reads
/// the single acknowledgement covering both.
pub fn set_map_parameters<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    request: &MapParametersRequest,
    data: &MapParametersRequestData,
) -> Result<(), ErrorCode> {
    debug!(job_id = request.job_id, "set_map_parameters");
    send_request(channel, request)?;
    send_request(channel, data)?;
    let reply = channel.read(DEFAULT_MAX_READ_LENGTH)?;
    expect_ack(check_answer(&reply)).map(|_| ())
}

/// Starts the scan pass.
pub fn start_scan<C: DuplexChannel + ?Sized>(channel: &mut C, job_id: u8) -> Result<(), ErrorCode> {
    debug!(job_id, "start_scan");
    let response = send_request_and_read_response(
        channel,
        &StartScanRequest { job_id },
        DEFAULT_MAX_READ_LENGTH,
    )?;
    expect_ack(response).map(|_| ())
}

/// Stops the scan pass.
pub fn stop_scan<C: DuplexChannel + ?Sized>(channel: &mut C, job_id: u8) -> Result<(), ErrorCode> {
    debug!(job_id, "stop_scan");
    let response = send_request_and_read_response(
        channel,
        &StopScanRequest { job_id },
        DEFAULT_MAX_READ_LENGTH,
    )?;
    expect_ack(response).map(|_| ())
}

/// Resets the scanner hardware.
pub fn reset_hardware<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    job_id: u8,
) -> Result<(), ErrorCode> {
    debug!(job_id, "reset_hardware");
    let response = send_request_and_read_response(
        channel,
        &HardwareResetRequest { job_id },
        DEFAULT_MAX_READ_LENGTH,
    )?;
    expect_ack(response).map(|_| ())
}

/// Pulls up to `length` bytes of image data for one side, reading until
/// the requested length arrives or the device sends a short transfer.
/// An in-band firmware error reply aborts with
/// [`ErrorCode::ScannerError`].
pub fn get_image_data<C: DuplexChannel + ?Sized>(
    channel: &mut C,
    length: u32,
    scan_side: ScanSide,
) -> Result<Vec<u8>, ErrorCode> {
    debug!(length, ?scan_side, "get_image_data");
    send_request(channel, &GetImageDataRequest { length, scan_side })?;

    let length = length as usize;
    let mut buffer = Vec::with_capacity(length);
    while buffer.len() < length {
        let chunk = channel.read(length - buffer.len())?;
        if chunk.is_empty() {
            debug!(received = buffer.len(), "image transfer ended short");
            break;
        }
        if ErrorResponse::decode(&chunk).is_ok() {
            debug!("image transfer answered with an error record");
            return Err(ErrorCode::ScannerError);
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockChannel;

    fn connected() -> MockChannel {
        let mut channel = MockChannel::new();
        channel.connect().unwrap();
        channel
    }

    #[test]
    fn check_answer_classifies_known_shapes() {
        assert_eq!(
            check_answer(b"STA\x00A\x00\x00\x01"),
            CheckAnswerResult::Ack { job_id: 1 }
        );
        assert_eq!(
            check_answer(b"STA\x00E\x00\x00\x80"),
            CheckAnswerResult::Error {
                error_code: ErrorCode::InvalidCommand
            }
        );
        assert_eq!(
            check_answer(b"STA\x00E\x00\x00\x00"),
            CheckAnswerResult::Error {
                error_code: ErrorCode::CommunicationUnknownError
            }
        );
        assert_eq!(
            check_answer(b"CDATv1\x00"),
            CheckAnswerResult::Data {
                data: "v1".to_owned()
            }
        );
        assert_eq!(
            check_answer(b"????"),
            CheckAnswerResult::Other {
                buffer: b"????".to_vec()
            }
        );
    }

    #[test]
    fn create_job_returns_the_acknowledged_handle() {
        let mut channel = connected();
        channel.push_read(b"STA\x00A\x00\x00\x01".to_vec());
        assert_eq!(create_job(&mut channel).unwrap(), 0x01);
        assert_eq!(channel.written(), vec![b"JOB\x00C\x00\x00\x00".to_vec()]);
    }

    #[test]
    fn invalid_job_reply_maps_to_job_not_valid() {
        let mut channel = connected();
        channel.push_read(b"STA\x00E\x00\x00\x81".to_vec());
        assert_eq!(
            start_scan(&mut channel, 0x01),
            Err(ErrorCode::JobNotValid)
        );
    }

    #[test]
    fn unclassified_reply_to_an_ack_request_is_unknown_answer() {
        let mut channel = connected();
        channel.push_read(b"garbage!".to_vec());
        assert_eq!(
            stop_scan(&mut channel, 0x01),
            Err(ErrorCode::DeviceAnswerUnknown)
        );
    }

    #[test]
    fn get_release_version_expects_a_data_reply() {
        let mut channel = connected();
        channel.push_read(b"CDAT1.02.00\x00".to_vec());
        assert_eq!(
            get_release_version(&mut channel, ReleaseType::Firmware).unwrap(),
            "1.02.00"
        );
    }

    #[test]
    fn get_status_internal_decodes_the_raw_record() {
        let status = StatusInternalMessage {
            motor_move: b'S',
            ..Default::default()
        };
        let mut channel = connected();
        channel.push_read(status.encode().unwrap());
        assert_eq!(get_status_internal(&mut channel, 0x01).unwrap(), status);
    }

    #[test]
    fn get_status_internal_rejects_a_truncated_record() {
        let status = StatusInternalMessage::default();
        let mut truncated = status.encode().unwrap();
        truncated.truncate(20);
        let mut channel = connected();
        channel.push_read(truncated);
        assert_eq!(
            get_status_internal(&mut channel, 0x01),
            Err(ErrorCode::SmallBuffer)
        );
    }

    #[test]
    fn set_scan_parameters_writes_both_records_before_the_ack() {
        let mut channel = connected();
        channel.push_read(b"STA\x00A\x00\x00\x01".to_vec());
        set_scan_parameters(&mut channel, 0x01, &SetScanParametersRequestData::default())
            .unwrap();
        let written = channel.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], b"PAR\x00\x28\x00\x00\x01");
        assert_eq!(&written[1][0..4], b"ADF\x00");
    }

    #[test]
    fn set_map_parameters_writes_both_records_before_the_ack() {
        let mut channel = connected();
        channel.push_read(b"STA\x00A\x00\x00\x01".to_vec());
        set_map_parameters(
            &mut channel,
            &MapParametersRequest {
                duplex_side_a: true,
                red_channel: true,
                green_channel: true,
                blue_channel: true,
                job_id: 0x01,
                ..Default::default()
            },
            &MapParametersRequestData {
                black_clip_level: 0,
                white_clip_level: 256,
                gamma10: 16,
            },
        )
        .unwrap();
        let written = channel.written();
        assert_eq!(written.len(), 2);
        assert_eq!(&written[0][0..5], b"MAP\x00P");
        assert_eq!(written[1], vec![0x00, 0x00, 0x00, 0x01, 0x10]);
    }

    #[test]
    fn get_image_data_concatenates_chunks() {
        let mut channel = connected();
        channel.push_read(vec![0xaa; 10]);
        channel.push_read(vec![0xbb; 6]);
        let data = get_image_data(&mut channel, 16, ScanSide::A).unwrap();
        assert_eq!(&data[..10], &[0xaa; 10]);
        assert_eq!(&data[10..], &[0xbb; 6]);
    }

    #[test]
    fn get_image_data_stops_on_a_short_transfer() {
        let mut channel = connected();
        channel.push_read(vec![0xaa; 4]);
        channel.push_read(Vec::new());
        let data = get_image_data(&mut channel, 16, ScanSide::A).unwrap();
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn get_image_data_detects_in_band_error_replies() {
        let mut channel = connected();
        channel.push_read(b"STA\x00E\x00\x00\x80".to_vec());
        assert_eq!(
            get_image_data(&mut channel, 16, ScanSide::A),
            Err(ErrorCode::ScannerError)
        );
    }
}
