//! Wire record definitions.
//!
//! Every request the host can send and every response the device can
//! produce is a fixed-layout record built from the primitives in
//! [`crate::coder`]. Field order and bit positions follow the device
//! documentation byte for byte.

use crate::coder::{ByteReader, ByteWriter, CoderError, Message};
use crate::types::{
    BitType, ColorMode, FormMovement, FormStanding, ImageResolution, ReleaseType, ScanSide,
};

/// Error codes reported by the device firmware in an [`ErrorResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ResponseErrorCode {
    /// The request was malformed.
    #[default]
    FormatError = 0x00,
    /// The command is not recognized.
    InvalidCommand = 0x80,
    /// The job handle is not valid.
    InvalidJobId = 0x81,
}

impl ResponseErrorCode {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::FormatError),
            0x80 => Some(Self::InvalidCommand),
            0x81 => Some(Self::InvalidJobId),
            _ => None,
        }
    }
}

/// Positive acknowledgement carrying the job handle it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckResponse {
    pub job_id: u8,
}

impl Message for AckResponse {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"STA\x00A\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"STA\x00A\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Negative acknowledgement carrying a firmware error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorResponse {
    pub error_code: ResponseErrorCode,
}

impl Message for ErrorResponse {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"STA\x00E\x00\x00")?;
        w.u8(self.error_code as u8)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"STA\x00E\x00\x00")?;
        let error_code =
            ResponseErrorCode::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        r.finish()?;
        Ok(Self { error_code })
    }
}

/// Free-form string payload, e.g. a release version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataResponse {
    pub data: String,
}

impl Message for DataResponse {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"CDAT")?;
        w.cstring(&self.data)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"CDAT")?;
        let data = r.cstring()?;
        r.finish()?;
        Ok(Self { data })
    }
}

/// Creates the scan job. Takes no arguments; the handle comes back in the
/// acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobCreateRequest;

impl Message for JobCreateRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"JOB\x00C\x00\x00\x00")?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"JOB\x00C\x00\x00\x00")?;
        r.finish()?;
        Ok(Self)
    }
}

/// Releases a scan job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobEndRequest {
    pub job_id: u8,
}

impl Message for JobEndRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"JOB\x00E\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"JOB\x00E\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Requests one of the release version strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseVersionRequest {
    pub release_type: ReleaseType,
}

impl Default for ReleaseVersionRequest {
    fn default() -> Self {
        Self {
            release_type: ReleaseType::Model,
        }
    }
}

impl Message for ReleaseVersionRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"CAP\x00\x1c\x00")?;
        w.u8(self.release_type as u8)?;
        w.literal(&[0x00])?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"CAP\x00\x1c\x00")?;
        let release_type = ReleaseType::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        r.literal(&[0x00])?;
        r.finish()?;
        Ok(Self { release_type })
    }
}

/// Requests the raw internal status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusInternalRequest {
    pub job_id: u8,
}

impl Message for StatusInternalRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"INFO\x30\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"INFO\x30\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Raw internal status record as reported by the device.
///
/// Most fields are raw sentinel bytes or bitmasks; interpretation lives in
/// [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusInternalMessage {
    pub page_num_side_a: u16,
    pub page_num_side_b: u16,
    pub valid_page_size_a: u32,
    pub valid_page_size_b: u32,
    pub image_width_a: u16,
    pub image_width_b: u16,
    pub image_height_a: u16,
    pub image_height_b: u16,
    pub end_page_a: u8,
    pub end_page_b: u8,
    pub end_scan_a: u8,
    pub end_scan_b: u8,
    pub ultrasonic: u8,
    pub paper_jam: u8,
    pub cover_open: u8,
    pub cancel: u8,
    pub key: u8,
    pub motor_move: u8,
    pub adf_sensor: u8,
    pub doc_sensor: u8,
    pub home_sensor: u8,
    pub job_owner: u8,
    pub reserve1: u16,
    pub reserve2: u32,
    pub job_state: u32,
}

impl Message for StatusInternalMessage {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"IDAT")?;
        w.u16(self.page_num_side_a)?;
        w.u16(self.page_num_side_b)?;
        w.u32(self.valid_page_size_a)?;
        w.u32(self.valid_page_size_b)?;
        w.u16(self.image_width_a)?;
        w.u16(self.image_width_b)?;
        w.u16(self.image_height_a)?;
        w.u16(self.image_height_b)?;
        w.u8(self.end_page_a)?;
        w.u8(self.end_page_b)?;
        w.u8(self.end_scan_a)?;
        w.u8(self.end_scan_b)?;
        w.u8(self.ultrasonic)?;
        w.u8(self.paper_jam)?;
        w.u8(self.cover_open)?;
        w.u8(self.cancel)?;
        w.u8(self.key)?;
        w.u8(self.motor_move)?;
        w.u8(self.adf_sensor)?;
        w.u8(self.doc_sensor)?;
        w.u8(self.home_sensor)?;
        w.u8(self.job_owner)?;
        w.u16(self.reserve1)?;
        w.u32(self.reserve2)?;
        w.u32(self.job_state)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"IDAT")?;
        let value = Self {
            page_num_side_a: r.u16()?,
            page_num_side_b: r.u16()?,
            valid_page_size_a: r.u32()?,
            valid_page_size_b: r.u32()?,
            image_width_a: r.u16()?,
            image_width_b: r.u16()?,
            image_height_a: r.u16()?,
            image_height_b: r.u16()?,
            end_page_a: r.u8()?,
            end_page_b: r.u8()?,
            end_scan_a: r.u8()?,
            end_scan_b: r.u8()?,
            ultrasonic: r.u8()?,
            paper_jam: r.u8()?,
            cover_open: r.u8()?,
            cancel: r.u8()?,
            key: r.u8()?,
            motor_move: r.u8()?,
            adf_sensor: r.u8()?,
            doc_sensor: r.u8()?,
            home_sensor: r.u8()?,
            job_owner: r.u8()?,
            reserve1: r.u16()?,
            reserve2: r.u32()?,
            job_state: r.u32()?,
        };
        r.finish()?;
        Ok(value)
    }
}

/// Drives the paper transport motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormMovementRequest {
    pub movement: FormMovement,
    pub job_id: u8,
}

impl Default for FormMovementRequest {
    fn default() -> Self {
        Self {
            movement: FormMovement::Stop,
            job_id: 0,
        }
    }
}

impl Message for FormMovementRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"MOTO\x00\x00")?;
        w.u8(self.movement as u8)?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"MOTO\x00\x00")?;
        let movement = FormMovement::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { movement, job_id })
    }
}

/// Announces a 40-byte [`SetScanParametersRequestData`] block to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetScanParametersRequest {
    pub job_id: u8,
}

impl Message for SetScanParametersRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"PAR\x00")?;
        // Data block length, then a reserved code byte.
        w.literal(&[40, 0x00])?;
        w.literal(&[0x00])?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"PAR\x00")?;
        r.literal(&[40, 0x00])?;
        r.literal(&[0x00])?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// The 40-byte scan parameter block sent after [`SetScanParametersRequest`].
///
/// Acquire flags are documented by their byte.bit position masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScanParametersRequestData {
    /// Byte 4.3 (0x08): motor reverse scan.
    pub acquire_back_scan: bool,
    /// Byte 4.2 (0x04): disable shading correction.
    pub acquire_no_shading: bool,
    /// Byte 4.1 (0x02): raw sensor pixel output without mirror correction.
    pub acquire_no_mirror: bool,
    /// Byte 4.0 (0x01): wait for one page to read rather than block read.
    pub acquire_page_read: bool,

    /// Byte 5.6 (0x40): ISP auto-threshold.
    pub acquire_auth_threshold: bool,
    /// Byte 5.5 (0x20): ISP detect color vs gray target.
    pub acquire_detect_color: bool,
    /// Byte 5.4 (0x10): ISP auto-histogram on the Y channel.
    pub acquire_auto_level: bool,
    /// Byte 5.3 (0x08): ISP auto-histogram on the RGB channels.
    pub acquire_auto_color: bool,
    /// Byte 5.2 (0x04): ISP crop the image left-aligned.
    pub acquire_left_align: bool,
    /// Byte 5.1 (0x02): ISP fill the blank area of the cropped image.
    pub acquire_page_fill: bool,
    /// Byte 5.0 (0x01): ISP crop-de-skew.
    pub acquire_crop_deskew: bool,

    /// Byte 6.4 (0x10): simulate ADF scan with a pseudo sensor.
    pub acquire_pseudo_sensor: bool,
    /// Byte 6.3 (0x08): produce a test pattern image.
    pub acquire_test_pattern: bool,
    /// Byte 6.2 (0x04): scan with the lamp off.
    pub acquire_lamp_off: bool,
    /// Byte 6.1 (0x02): scan without the doc/ADF sensors.
    pub acquire_no_paper_sensor: bool,
    /// Byte 6.0 (0x01): scan without moving the motor.
    pub acquire_motor_off: bool,

    /// Byte 8.7-8.6: ultrasonic sensor sensitivity (2 bits).
    pub ultrasonic_sensor_level: u8,
    /// Byte 8.5 (0x20).
    pub disable_ultrasonic_sensor: bool,
    /// Byte 8.4 (0x10).
    pub disable_hardware_deskew: bool,
    /// Byte 8.1-8.0: sheet handling after the scan pass.
    pub form_standing_after_scan: FormStanding,

    /// Byte 10: sides of the page to scan.
    pub wanted_scan_side: ScanSide,

    /// Byte 18: color depth in bits per pixel.
    pub bit_type: BitType,
    /// Byte 19: sensors used to scan.
    pub color_mode: ColorMode,

    /// Bytes 20-23: resolution, identical on both axes.
    pub resolution_x: ImageResolution,
    pub resolution_y: ImageResolution,

    /// Bytes 24-31: left and top margins in pixels.
    pub offset_x: u32,
    pub offset_y: u32,
    /// Bytes 32-39: scan area in pixels.
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for SetScanParametersRequestData {
    fn default() -> Self {
        Self {
            acquire_back_scan: false,
            acquire_no_shading: false,
            acquire_no_mirror: false,
            acquire_page_read: false,
            acquire_auth_threshold: false,
            acquire_detect_color: false,
            acquire_auto_level: false,
            acquire_auto_color: false,
            acquire_left_align: false,
            acquire_page_fill: false,
            acquire_crop_deskew: false,
            acquire_pseudo_sensor: false,
            acquire_test_pattern: false,
            acquire_lamp_off: false,
            acquire_no_paper_sensor: false,
            acquire_motor_off: false,
            ultrasonic_sensor_level: 0,
            disable_ultrasonic_sensor: false,
            disable_hardware_deskew: false,
            form_standing_after_scan: FormStanding::HoldTicket,
            wanted_scan_side: ScanSide::A,
            bit_type: BitType::BlackAndWhite1bpp,
            color_mode: ColorMode::Color,
            resolution_x: ImageResolution::Dpi200,
            resolution_y: ImageResolution::Dpi200,
            offset_x: 0,
            offset_y: 0,
            image_width: 0,
            image_height: 0,
        }
    }
}

impl Message for SetScanParametersRequestData {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"ADF\x00")?;

        w.padding(4)?;
        w.bits(self.acquire_back_scan as u8, 1)?;
        w.bits(self.acquire_no_shading as u8, 1)?;
        w.bits(self.acquire_no_mirror as u8, 1)?;
        w.bits(self.acquire_page_read as u8, 1)?;

        w.padding(1)?;
        w.bits(self.acquire_auth_threshold as u8, 1)?;
        w.bits(self.acquire_detect_color as u8, 1)?;
        w.bits(self.acquire_auto_level as u8, 1)?;
        w.bits(self.acquire_auto_color as u8, 1)?;
        w.bits(self.acquire_left_align as u8, 1)?;
        w.bits(self.acquire_page_fill as u8, 1)?;
        w.bits(self.acquire_crop_deskew as u8, 1)?;

        w.padding(3)?;
        w.bits(self.acquire_pseudo_sensor as u8, 1)?;
        w.bits(self.acquire_test_pattern as u8, 1)?;
        w.bits(self.acquire_lamp_off as u8, 1)?;
        w.bits(self.acquire_no_paper_sensor as u8, 1)?;
        w.bits(self.acquire_motor_off as u8, 1)?;

        w.padding(8)?;

        w.bits(self.ultrasonic_sensor_level, 2)?;
        w.bits(self.disable_ultrasonic_sensor as u8, 1)?;
        w.bits(self.disable_hardware_deskew as u8, 1)?;
        w.padding(2)?;
        w.bits(self.form_standing_after_scan as u8, 2)?;

        w.padding(8)?;

        w.u8(self.wanted_scan_side as u8)?;
        // Pages to scan, always one.
        w.literal(&[0x01])?;
        // Output format; "JPG\0" is also supported by the device but unused.
        w.literal(b"RAW\x00")?;
        // JPEG quality options, unused with raw output.
        w.literal(&[0x00, 0x00])?;
        w.u8(self.bit_type as u8)?;
        w.u8(self.color_mode as u8)?;
        w.u16(self.resolution_x as u16)?;
        w.u16(self.resolution_y as u16)?;
        w.u32(self.offset_x)?;
        w.u32(self.offset_y)?;
        w.u32(self.image_width)?;
        w.u32(self.image_height)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"ADF\x00")?;

        r.padding(4)?;
        let acquire_back_scan = r.bits(1)? != 0;
        let acquire_no_shading = r.bits(1)? != 0;
        let acquire_no_mirror = r.bits(1)? != 0;
        let acquire_page_read = r.bits(1)? != 0;

        r.padding(1)?;
        let acquire_auth_threshold = r.bits(1)? != 0;
        let acquire_detect_color = r.bits(1)? != 0;
        let acquire_auto_level = r.bits(1)? != 0;
        let acquire_auto_color = r.bits(1)? != 0;
        let acquire_left_align = r.bits(1)? != 0;
        let acquire_page_fill = r.bits(1)? != 0;
        let acquire_crop_deskew = r.bits(1)? != 0;

        r.padding(3)?;
        let acquire_pseudo_sensor = r.bits(1)? != 0;
        let acquire_test_pattern = r.bits(1)? != 0;
        let acquire_lamp_off = r.bits(1)? != 0;
        let acquire_no_paper_sensor = r.bits(1)? != 0;
        let acquire_motor_off = r.bits(1)? != 0;

        r.padding(8)?;

        let ultrasonic_sensor_level = r.bits(2)?;
        let disable_ultrasonic_sensor = r.bits(1)? != 0;
        let disable_hardware_deskew = r.bits(1)? != 0;
        r.padding(2)?;
        let form_standing_after_scan =
            FormStanding::from_wire(r.bits(2)?).ok_or(CoderError::InvalidValue)?;

        r.padding(8)?;

        let wanted_scan_side = ScanSide::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        r.literal(&[0x01])?;
        r.literal(b"RAW\x00")?;
        r.literal(&[0x00, 0x00])?;
        let bit_type = BitType::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        let color_mode = ColorMode::from_wire(r.u8()?).ok_or(CoderError::InvalidValue)?;
        let resolution_x =
            ImageResolution::from_wire(r.u16()?).ok_or(CoderError::InvalidValue)?;
        let resolution_y =
            ImageResolution::from_wire(r.u16()?).ok_or(CoderError::InvalidValue)?;
        let offset_x = r.u32()?;
        let offset_y = r.u32()?;
        let image_width = r.u32()?;
        let image_height = r.u32()?;
        r.finish()?;
        Ok(Self {
            acquire_back_scan,
            acquire_no_shading,
            acquire_no_mirror,
            acquire_page_read,
            acquire_auth_threshold,
            acquire_detect_color,
            acquire_auto_level,
            acquire_auto_color,
            acquire_left_align,
            acquire_page_fill,
            acquire_crop_deskew,
            acquire_pseudo_sensor,
            acquire_test_pattern,
            acquire_lamp_off,
            acquire_no_paper_sensor,
            acquire_motor_off,
            ultrasonic_sensor_level,
            disable_ultrasonic_sensor,
            disable_hardware_deskew,
            form_standing_after_scan,
            wanted_scan_side,
            bit_type,
            color_mode,
            resolution_x,
            resolution_y,
            offset_x,
            offset_y,
            image_width,
            image_height,
        })
    }
}

/// Starts the scan pass for the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartScanRequest {
    pub job_id: u8,
}

impl Message for StartScanRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"SCAN\x00\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"SCAN\x00\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Stops the scan pass for the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopScanRequest {
    pub job_id: u8,
}

impl Message for StopScanRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"STOP\x00\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"STOP\x00\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Resets the scanner hardware. The device drops off the bus and
/// re-enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareResetRequest {
    pub job_id: u8,
}

impl Message for HardwareResetRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"PWR\x00\x00\x00\x00")?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"PWR\x00\x00\x00\x00")?;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self { job_id })
    }
}

/// Requests up to `length` bytes of image data for a single side.
///
/// Only sides A and B are addressable here; asking for both sides in one
/// request is an encoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetImageDataRequest {
    /// Number of bytes to transfer, at most [`crate::coder::MAX_UINT24`].
    pub length: u32,
    pub scan_side: ScanSide,
}

impl Default for GetImageDataRequest {
    fn default() -> Self {
        Self {
            length: 0,
            scan_side: ScanSide::A,
        }
    }
}

impl GetImageDataRequest {
    const SIDE_A: u8 = 0x00;
    const SIDE_B: u8 = 0x01;
}

impl Message for GetImageDataRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let side = match self.scan_side {
            ScanSide::A => Self::SIDE_A,
            ScanSide::B => Self::SIDE_B,
            ScanSide::AAndB => return Err(CoderError::InvalidValue),
        };
        let mut w = ByteWriter::new();
        w.literal(b"IMG\x00")?;
        w.u24(self.length)?;
        w.u8(side)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"IMG\x00")?;
        let length = r.u24()?;
        let scan_side = match r.u8()? {
            Self::SIDE_A => ScanSide::A,
            Self::SIDE_B => ScanSide::B,
            _ => return Err(CoderError::InvalidValue),
        };
        r.finish()?;
        Ok(Self { length, scan_side })
    }
}

/// Selects the sides and color channels a [`MapParametersRequestData`]
/// tone curve applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapParametersRequest {
    pub duplex_side_b: bool,
    pub duplex_side_a: bool,
    pub ir_channel: bool,
    pub blue_channel: bool,
    pub green_channel: bool,
    pub red_channel: bool,
    pub job_id: u8,
}

impl Message for MapParametersRequest {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.literal(b"MAP\x00P")?;
        w.padding(6)?;
        w.bits(self.duplex_side_b as u8, 1)?;
        w.bits(self.duplex_side_a as u8, 1)?;
        w.padding(4)?;
        w.bits(self.ir_channel as u8, 1)?;
        w.bits(self.blue_channel as u8, 1)?;
        w.bits(self.green_channel as u8, 1)?;
        w.bits(self.red_channel as u8, 1)?;
        w.u8(self.job_id)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        r.literal(b"MAP\x00P")?;
        r.padding(6)?;
        let duplex_side_b = r.bits(1)? != 0;
        let duplex_side_a = r.bits(1)? != 0;
        r.padding(4)?;
        let ir_channel = r.bits(1)? != 0;
        let blue_channel = r.bits(1)? != 0;
        let green_channel = r.bits(1)? != 0;
        let red_channel = r.bits(1)? != 0;
        let job_id = r.u8()?;
        r.finish()?;
        Ok(Self {
            duplex_side_b,
            duplex_side_a,
            ir_channel,
            blue_channel,
            green_channel,
            red_channel,
            job_id,
        })
    }
}

/// Tone curve clip levels and gamma sent after a [`MapParametersRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapParametersRequestData {
    /// Pixels below this value clip to black (0-256).
    pub black_clip_level: u16,
    /// Pixels above this value clip to white (0-256).
    pub white_clip_level: u16,
    /// Gamma times ten, e.g. 16 for a gamma of 1.6.
    pub gamma10: u8,
}

impl Message for MapParametersRequestData {
    fn encode(&self) -> Result<Vec<u8>, CoderError> {
        let mut w = ByteWriter::new();
        w.u16(self.black_clip_level)?;
        w.u16(self.white_clip_level)?;
        w.u8(self.gamma10)?;
        w.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CoderError> {
        let mut r = ByteReader::new(bytes);
        let black_clip_level = r.u16()?;
        let white_clip_level = r.u16()?;
        let gamma10 = r.u8()?;
        r.finish()?;
        Ok(Self {
            black_clip_level,
            white_clip_level,
            gamma10,
        })
    }
}

/// Any request the host can send, as recognized by [`parse_request`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRequest {
    JobCreate(JobCreateRequest),
    JobEnd(JobEndRequest),
    GetImageData(GetImageDataRequest),
    SetScanParameters(SetScanParametersRequest),
    SetScanParametersData(SetScanParametersRequestData),
    StartScan(StartScanRequest),
    StopScan(StopScanRequest),
    HardwareReset(HardwareResetRequest),
    FormMovement(FormMovementRequest),
    StatusInternal(StatusInternalRequest),
    ReleaseVersion(ReleaseVersionRequest),
    MapParameters(MapParametersRequest),
    MapParametersData(MapParametersRequestData),
}

/// Any response the device can produce, as recognized by
/// [`parse_response`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyResponse {
    Ack(AckResponse),
    Error(ErrorResponse),
    Data(DataResponse),
    StatusInternal(StatusInternalMessage),
}

/// Parses a request buffer by trying each record shape in turn.
///
/// Used by test doubles standing in for the device.
pub fn parse_request(data: &[u8]) -> Option<AnyRequest> {
    if let Ok(m) = JobCreateRequest::decode(data) {
        return Some(AnyRequest::JobCreate(m));
    }
    if let Ok(m) = JobEndRequest::decode(data) {
        return Some(AnyRequest::JobEnd(m));
    }
    if let Ok(m) = GetImageDataRequest::decode(data) {
        return Some(AnyRequest::GetImageData(m));
    }
    if let Ok(m) = SetScanParametersRequest::decode(data) {
        return Some(AnyRequest::SetScanParameters(m));
    }
    if let Ok(m) = SetScanParametersRequestData::decode(data) {
        return Some(AnyRequest::SetScanParametersData(m));
    }
    if let Ok(m) = StartScanRequest::decode(data) {
        return Some(AnyRequest::StartScan(m));
    }
    if let Ok(m) = StopScanRequest::decode(data) {
        return Some(AnyRequest::StopScan(m));
    }
    if let Ok(m) = HardwareResetRequest::decode(data) {
        return Some(AnyRequest::HardwareReset(m));
    }
    if let Ok(m) = FormMovementRequest::decode(data) {
        return Some(AnyRequest::FormMovement(m));
    }
    if let Ok(m) = StatusInternalRequest::decode(data) {
        return Some(AnyRequest::StatusInternal(m));
    }
    if let Ok(m) = ReleaseVersionRequest::decode(data) {
        return Some(AnyRequest::ReleaseVersion(m));
    }
    if let Ok(m) = MapParametersRequest::decode(data) {
        return Some(AnyRequest::MapParameters(m));
    }
    if let Ok(m) = MapParametersRequestData::decode(data) {
        return Some(AnyRequest::MapParametersData(m));
    }
    None
}

/// Parses a response buffer by trying each record shape in turn.
pub fn parse_response(data: &[u8]) -> Option<AnyResponse> {
    if let Ok(m) = AckResponse::decode(data) {
        return Some(AnyResponse::Ack(m));
    }
    if let Ok(m) = ErrorResponse::decode(data) {
        return Some(AnyResponse::Error(m));
    }
    if let Ok(m) = DataResponse::decode(data) {
        return Some(AnyResponse::Data(m));
    }
    if let Ok(m) = StatusInternalMessage::decode(data) {
        return Some(AnyResponse::StatusInternal(m));
    }
    None
}
