//! Domain model shared by the protocol layer, the session and the simulator.

use crate::error::ErrorCode;

/// A pair of values, one per sheet side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet<T> {
    pub side_a: T,
    pub side_b: T,
}

impl<T> Sheet<T> {
    pub fn new(side_a: T, side_b: T) -> Self {
        Self { side_a, side_b }
    }

    /// The value for one side. `AAndB` names both sides and has no
    /// single value, so it resolves to side A.
    pub fn side(&self, side: ScanSide) -> &T {
        match side {
            ScanSide::B => &self.side_b,
            ScanSide::A | ScanSide::AAndB => &self.side_a,
        }
    }
}

/// Types of release versions the scanner can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReleaseType {
    Model = 0x01,
    Firmware = 0x02,
    Hardware = 0x03,
    Capabilities = 0x04,
}

impl ReleaseType {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Model),
            0x02 => Some(Self::Firmware),
            0x03 => Some(Self::Hardware),
            0x04 => Some(Self::Capabilities),
            _ => None,
        }
    }
}

/// Which side(s) of the sheet to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanSide {
    /// Front side.
    A = 0b01,
    /// Back side.
    B = 0b10,
    /// Both sides.
    AAndB = 0b11,
}

impl ScanSide {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0b01 => Some(Self::A),
            0b10 => Some(Self::B),
            0b11 => Some(Self::AAndB),
            _ => None,
        }
    }

    /// Whether this selection includes the given single side.
    pub fn includes(self, side: ScanSide) -> bool {
        (self as u8) & (side as u8) == side as u8
    }
}

/// Bits per pixel used when scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BitType {
    BlackAndWhite1bpp = 1,
    GrayScale8bpp = 8,
    Color24bpp = 24,
}

impl BitType {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::BlackAndWhite1bpp),
            8 => Some(Self::GrayScale8bpp),
            24 => Some(Self::Color24bpp),
            _ => None,
        }
    }
}

/// Which color sensors are used when scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorMode {
    Color = 0x00,
    RedOnly = 0x01,
    GreenOnly = 0x02,
    BlueOnly = 0x03,
    Infrared = 0x04,
    Ultraviolet = 0x05,
    BlackAndWhite = 0x06,
    Gray = 0x07,
    GrayDigital = 0x08,
}

impl ColorMode {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Color),
            0x01 => Some(Self::RedOnly),
            0x02 => Some(Self::GreenOnly),
            0x03 => Some(Self::BlueOnly),
            0x04 => Some(Self::Infrared),
            0x05 => Some(Self::Ultraviolet),
            0x06 => Some(Self::BlackAndWhite),
            0x07 => Some(Self::Gray),
            0x08 => Some(Self::GrayDigital),
            _ => None,
        }
    }
}

/// Image color depth as exposed to callers, combining bit type and the
/// sensor channels used to produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColorDepth {
    /// 8 bit per pixel grey scale image.
    Grey8bpp,
    /// 24 bit per pixel color image.
    Color24bpp,
    /// 1 bit per pixel black and white image.
    BlackAndWhite,
    /// RED channel only, 8 bit per pixel.
    RedChannel8bpp,
    /// GREEN channel only, 8 bit per pixel.
    GreenChannel8bpp,
    /// BLUE channel only, 8 bit per pixel.
    BlueChannel8bpp,
}

impl ImageColorDepth {
    pub fn bit_type(self) -> BitType {
        match self {
            Self::Color24bpp => BitType::Color24bpp,
            Self::BlackAndWhite => BitType::BlackAndWhite1bpp,
            _ => BitType::GrayScale8bpp,
        }
    }

    pub fn color_mode(self) -> ColorMode {
        match self {
            Self::Grey8bpp | Self::BlackAndWhite => ColorMode::Gray,
            Self::Color24bpp => ColorMode::Color,
            Self::RedChannel8bpp => ColorMode::RedOnly,
            Self::GreenChannel8bpp => ColorMode::GreenOnly,
            Self::BlueChannel8bpp => ColorMode::BlueOnly,
        }
    }
}

/// Supported output resolutions.
///
/// The scanner only supports a fixed set of geometries; anything else is
/// rejected here, at construction, rather than mid-transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ImageResolution {
    Dpi200 = 200,
    Dpi300 = 300,
    Dpi600 = 600,
}

impl ImageResolution {
    /// Resolves a dpi value against the supported table.
    pub fn from_dpi(dpi: u16) -> Result<Self, ErrorCode> {
        Self::from_wire(dpi).ok_or(ErrorCode::InvalidParameter)
    }

    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            200 => Some(Self::Dpi200),
            300 => Some(Self::Dpi300),
            600 => Some(Self::Dpi600),
            _ => None,
        }
    }
}

/// Output image container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileFormat {
    Tiff,
    Bmp,
    Jpeg,
    /// Raw pixel data exactly as pulled off the wire.
    Raw,
}

/// Where the paper form is driven after the scan pass completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FormStanding {
    /// Hold the sheet in the scanner, awaiting a movement command.
    HoldTicket = 0b00,
    /// Eject the sheet forward past the scanner.
    DriveForward = 0b01,
    /// Return the sheet backward to the user.
    DriveBackward = 0b10,
}

impl FormStanding {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0b00 => Some(Self::HoldTicket),
            0b01 => Some(Self::DriveForward),
            0b10 => Some(Self::DriveBackward),
            _ => None,
        }
    }
}

/// Ultrasonic double/multiple sheet detection setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoubleSheetDetection {
    /// Detection off; multiple sheets go unnoticed.
    Off = 0x3,
    /// Very high sensor sensitivity.
    Level1 = 0x1,
    /// High sensor sensitivity.
    Level2 = 0x5,
    /// Low sensor sensitivity.
    Level3 = 0x9,
    /// Very low sensor sensitivity.
    Level4 = 0xd,
}

impl DoubleSheetDetection {
    /// The 2-bit sensor level encoded in the parameter block.
    pub fn sensor_level(self) -> u8 {
        (self as u8) >> 2
    }

    pub fn is_disabled(self) -> bool {
        self == Self::Off
    }
}

/// Movements the paper transport can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FormMovement {
    /// Stop the motors.
    Stop = 0,
    /// Load paper into the scanner.
    LoadPaper = 1,
    /// Eject the sheet forward.
    EjectPaperForward = 2,
    /// Retract the sheet backward to the user.
    RetractPaperBackward = 3,
}

impl FormMovement {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::LoadPaper),
            2 => Some(Self::EjectPaperForward),
            3 => Some(Self::RetractPaperBackward),
            _ => None,
        }
    }
}

/// Paper-presence sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    NoPaper,
    PaperPresent,
    /// The sensor is not fitted on this device.
    NotAvailable,
}

impl SensorStatus {
    pub fn from_bit(present: bool) -> Self {
        if present {
            Self::PaperPresent
        } else {
            Self::NoPaper
        }
    }
}

/// Semantic scanner status derived from the raw status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerStatus {
    // Entry sensors, left to right.
    pub sensor_input_left_left: SensorStatus,
    pub sensor_input_center_left: SensorStatus,
    pub sensor_input_center_right: SensorStatus,
    pub sensor_input_right_right: SensorStatus,

    // Internal de-skew sensors.
    pub sensor_internal_input_left: SensorStatus,
    pub sensor_internal_input_right: SensorStatus,

    // Exit sensors, left to right.
    pub sensor_output_left_left: SensorStatus,
    pub sensor_output_center_left: SensorStatus,
    pub sensor_output_center_right: SensorStatus,
    pub sensor_output_right_right: SensorStatus,

    /// More than one sheet has been loaded.
    pub is_double_sheet: bool,
    /// The scan operation has been canceled.
    pub is_scan_canceled: bool,
    /// A scan pass is in progress.
    pub is_scan_in_progress: bool,
    /// The transport is currently loading paper.
    pub is_loading_paper: bool,
    /// The scanner cover is open.
    pub is_scanner_cover_open: bool,
    /// Mechanical paper jam. Mutually exclusive with
    /// `is_jam_paper_held_back`.
    pub is_paper_jam: bool,
    /// The sheet was held back by the user mid-scan (encoder error).
    pub is_jam_paper_held_back: bool,
    /// The transport motor is running.
    pub is_motor_on: bool,

    /// A ticket of any width sits on the central part of the scanner mouth.
    pub is_ticket_on_enter_center: bool,
    /// A full-width (A4) ticket sits on the scanner mouth.
    pub is_ticket_on_enter_a4: bool,
    /// A ticket has been loaded and is inside the scanner.
    pub is_ticket_loaded: bool,
    /// A ticket is present at the back (exit) of the scanner.
    pub is_ticket_on_exit: bool,
}

/// Per-side scan progress specific to the A4 scanner protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScannerA4Status {
    pub page_count_side_a: u16,
    pub page_count_side_b: u16,

    /// Size in bytes of the next image portion available for side A.
    pub page_size_side_a: u32,
    /// Size in bytes of the next image portion available for side B.
    pub page_size_side_b: u32,

    pub image_width_side_a: u16,
    pub image_width_side_b: u16,
    pub image_height_side_a: u16,
    pub image_height_side_b: u16,

    /// The scan pass for side A is finished.
    pub end_scan_side_a: bool,
    /// The scan pass for side B is finished.
    pub end_scan_side_b: bool,
}

/// Parameters for a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    pub wanted_scan_side: ScanSide,
    pub resolution: ImageResolution,
    pub image_color_depth: ImageColorDepth,
    /// Behavior of the sheet after the scan pass: hold, eject or retract.
    pub form_standing_after_scan: FormStanding,
    pub double_sheet_detection: DoubleSheetDetection,
}

/// An image read from the scanner. The pixel buffer is opaque to the
/// driver; callers interpret it using the width/height/depth metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFromScanner {
    pub image_buffer: Vec<u8>,
    pub image_width: u32,
    pub image_height: u32,
    pub image_depth: ImageColorDepth,
    pub image_format: ImageFileFormat,
    pub scan_side: ScanSide,
    pub image_resolution: ImageResolution,
}

impl ImageFromScanner {
    /// An empty image for a side that was not requested or not scanned.
    pub fn empty(scan_side: ScanSide, parameters: &ScanParameters) -> Self {
        Self {
            image_buffer: Vec::new(),
            image_width: 0,
            image_height: 0,
            image_depth: parameters.image_color_depth,
            image_format: ImageFileFormat::Raw,
            scan_side,
            image_resolution: parameters.resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_side_inclusion() {
        assert!(ScanSide::A.includes(ScanSide::A));
        assert!(!ScanSide::A.includes(ScanSide::B));
        assert!(ScanSide::AAndB.includes(ScanSide::A));
        assert!(ScanSide::AAndB.includes(ScanSide::B));
    }

    #[test]
    fn sheet_side_selection() {
        let sheet = Sheet::new("front", "back");
        assert_eq!(*sheet.side(ScanSide::A), "front");
        assert_eq!(*sheet.side(ScanSide::B), "back");
        assert_eq!(*sheet.side(ScanSide::AAndB), "front");
    }

    #[test]
    fn resolution_table_rejects_unsupported_dpi() {
        assert_eq!(
            ImageResolution::from_dpi(200),
            Ok(ImageResolution::Dpi200)
        );
        assert_eq!(
            ImageResolution::from_dpi(250),
            Err(ErrorCode::InvalidParameter)
        );
    }

    #[test]
    fn double_sheet_detection_sensor_levels() {
        assert!(DoubleSheetDetection::Off.is_disabled());
        assert_eq!(DoubleSheetDetection::Level1.sensor_level(), 0b00);
        assert_eq!(DoubleSheetDetection::Level2.sensor_level(), 0b01);
        assert_eq!(DoubleSheetDetection::Level3.sensor_level(), 0b10);
        assert_eq!(DoubleSheetDetection::Level4.sensor_level(), 0b11);
    }
}
