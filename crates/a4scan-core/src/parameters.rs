//! Conversion from caller-facing scan parameters to the wire parameter
//! block, including the table of supported scan geometries.

use crate::error::ErrorCode;
use crate::protocol::messages::SetScanParametersRequestData;
use crate::types::{ImageResolution, ScanParameters};

/// Scan area in pixels for a supported resolution. The scan bed is the
/// same physical size at every resolution, so the pixel counts scale
/// linearly with dpi.
pub fn scan_area_for_resolution(resolution: ImageResolution) -> (u32, u32) {
    match resolution {
        ImageResolution::Dpi200 => (1728, 2912),
        ImageResolution::Dpi300 => (2592, 4368),
        ImageResolution::Dpi600 => (5184, 8736),
    }
}

/// Builds the wire parameter block for a scan request.
///
/// The resolution has already been validated against the supported table
/// by construction of [`ImageResolution`], so this cannot fail on
/// geometry; it exists as a `Result` for parity with the coder path.
pub fn convert_to_internal_scan_parameters(
    parameters: &ScanParameters,
) -> Result<SetScanParametersRequestData, ErrorCode> {
    let (image_width, image_height) = scan_area_for_resolution(parameters.resolution);
    Ok(SetScanParametersRequestData {
        ultrasonic_sensor_level: parameters.double_sheet_detection.sensor_level(),
        disable_ultrasonic_sensor: parameters.double_sheet_detection.is_disabled(),
        form_standing_after_scan: parameters.form_standing_after_scan,
        wanted_scan_side: parameters.wanted_scan_side,
        bit_type: parameters.image_color_depth.bit_type(),
        color_mode: parameters.image_color_depth.color_mode(),
        resolution_x: parameters.resolution,
        resolution_y: parameters.resolution,
        offset_x: 0,
        offset_y: 0,
        image_width,
        image_height,
        // The ISP crop-de-skew pass is always on; the hardware bed is
        // wider than A4 and uncropped output shifts with paper skew.
        acquire_crop_deskew: true,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DoubleSheetDetection, FormStanding, ImageColorDepth, ScanSide,
    };
    use crate::types::{BitType, ColorMode};

    fn parameters() -> ScanParameters {
        ScanParameters {
            wanted_scan_side: ScanSide::AAndB,
            resolution: ImageResolution::Dpi300,
            image_color_depth: ImageColorDepth::Grey8bpp,
            form_standing_after_scan: FormStanding::HoldTicket,
            double_sheet_detection: DoubleSheetDetection::Level2,
        }
    }

    #[test]
    fn geometry_scales_with_resolution() {
        assert_eq!(
            scan_area_for_resolution(ImageResolution::Dpi200),
            (1728, 2912)
        );
        assert_eq!(
            scan_area_for_resolution(ImageResolution::Dpi600),
            (5184, 8736)
        );
    }

    #[test]
    fn conversion_fills_the_wire_block() {
        let internal = convert_to_internal_scan_parameters(&parameters()).unwrap();
        assert_eq!(internal.wanted_scan_side, ScanSide::AAndB);
        assert_eq!(internal.bit_type, BitType::GrayScale8bpp);
        assert_eq!(internal.color_mode, ColorMode::Gray);
        assert_eq!(internal.resolution_x, ImageResolution::Dpi300);
        assert_eq!(internal.resolution_y, ImageResolution::Dpi300);
        assert_eq!(internal.image_width, 2592);
        assert_eq!(internal.image_height, 4368);
        assert_eq!(internal.ultrasonic_sensor_level, 0b01);
        assert!(!internal.disable_ultrasonic_sensor);
        assert!(internal.acquire_crop_deskew);
        assert!(!internal.acquire_back_scan);
        assert!(!internal.acquire_test_pattern);
    }

    #[test]
    fn detection_off_disables_the_ultrasonic_sensor() {
        let internal = convert_to_internal_scan_parameters(&ScanParameters {
            double_sheet_detection: DoubleSheetDetection::Off,
            ..parameters()
        })
        .unwrap();
        assert!(internal.disable_ultrasonic_sensor);
    }
}
