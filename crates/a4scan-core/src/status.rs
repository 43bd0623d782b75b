//! Interpretation of the raw internal status record.
//!
//! [`convert_from_internal_status`] is a pure, total function from the wire
//! record to semantic status. All sentinel bytes and bitmask positions the
//! firmware uses live here.

use crate::protocol::messages::StatusInternalMessage;
use crate::types::{ScannerA4Status, ScannerStatus, SensorStatus};

/// Bit positions in the `doc_sensor` mask.
pub mod doc_sensor {
    /// Paper was held back; the encoder saw no motion while the motor ran.
    pub const ENCODER_ERROR: u8 = 0b0000_0001;
    pub const DOUBLE_SHEET: u8 = 0b0000_0010;
    pub const DESKEW_LEFT: u8 = 0b0000_0100;
    pub const DESKEW_RIGHT: u8 = 0b0000_1000;
    pub const INPUT_LEFT_LEFT: u8 = 0b0001_0000;
    pub const INPUT_CENTER_LEFT: u8 = 0b0010_0000;
    pub const INPUT_CENTER_RIGHT: u8 = 0b0100_0000;
    pub const INPUT_RIGHT_RIGHT: u8 = 0b1000_0000;
}

/// Bit positions in the `home_sensor` mask.
pub mod home_sensor {
    pub const OUTPUT_LEFT_LEFT: u8 = 0b0000_0001;
    pub const OUTPUT_CENTER_LEFT: u8 = 0b0000_0010;
    pub const OUTPUT_CENTER_RIGHT: u8 = 0b0000_0100;
    pub const OUTPUT_RIGHT_RIGHT: u8 = 0b0000_1000;
}

/// Bits in the `job_state` word.
pub mod job_state {
    pub const ADF_LOAD_PAPER: u32 = 1 << 16;
}

/// Flag byte sentinels used by the firmware.
pub mod flags {
    pub const PAPER_JAM: u8 = b'J';
    pub const SCAN_CANCELED: u8 = b'C';
    pub const MOTOR_ON: u8 = b'M';
    pub const MOTOR_ON_SCANNING: u8 = b'S';
    pub const END_SCAN: u8 = b'S';
}

/// The two views derived from one raw status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretedStatus {
    pub status: ScannerStatus,
    pub a4_status: ScannerA4Status,
}

/// Translates the raw internal status record into semantic status.
///
/// Total over all possible records. When the jam byte is set, exactly one
/// of `is_paper_jam` and `is_jam_paper_held_back` is true, selected by the
/// encoder-error sensor bit.
pub fn convert_from_internal_status(internal: &StatusInternalMessage) -> InterpretedStatus {
    let doc = internal.doc_sensor;
    let home = internal.home_sensor;

    let jam = internal.paper_jam != 0;
    let held_back = doc & doc_sensor::ENCODER_ERROR != 0;

    let input_left_left = doc & doc_sensor::INPUT_LEFT_LEFT != 0;
    let input_center_left = doc & doc_sensor::INPUT_CENTER_LEFT != 0;
    let input_center_right = doc & doc_sensor::INPUT_CENTER_RIGHT != 0;
    let input_right_right = doc & doc_sensor::INPUT_RIGHT_RIGHT != 0;
    let deskew_left = doc & doc_sensor::DESKEW_LEFT != 0;
    let deskew_right = doc & doc_sensor::DESKEW_RIGHT != 0;
    let output_left_left = home & home_sensor::OUTPUT_LEFT_LEFT != 0;
    let output_center_left = home & home_sensor::OUTPUT_CENTER_LEFT != 0;
    let output_center_right = home & home_sensor::OUTPUT_CENTER_RIGHT != 0;
    let output_right_right = home & home_sensor::OUTPUT_RIGHT_RIGHT != 0;

    let status = ScannerStatus {
        sensor_input_left_left: SensorStatus::from_bit(input_left_left),
        sensor_input_center_left: SensorStatus::from_bit(input_center_left),
        sensor_input_center_right: SensorStatus::from_bit(input_center_right),
        sensor_input_right_right: SensorStatus::from_bit(input_right_right),
        sensor_internal_input_left: SensorStatus::from_bit(deskew_left),
        sensor_internal_input_right: SensorStatus::from_bit(deskew_right),
        sensor_output_left_left: SensorStatus::from_bit(output_left_left),
        sensor_output_center_left: SensorStatus::from_bit(output_center_left),
        sensor_output_center_right: SensorStatus::from_bit(output_center_right),
        sensor_output_right_right: SensorStatus::from_bit(output_right_right),

        is_double_sheet: doc & doc_sensor::DOUBLE_SHEET != 0,
        is_scan_canceled: internal.cancel == flags::SCAN_CANCELED,
        is_scan_in_progress: internal.motor_move == flags::MOTOR_ON_SCANNING,
        is_loading_paper: internal.job_state & job_state::ADF_LOAD_PAPER != 0,
        is_scanner_cover_open: internal.cover_open != 0,
        is_paper_jam: jam && !held_back,
        is_jam_paper_held_back: jam && held_back,
        is_motor_on: internal.motor_move == flags::MOTOR_ON
            || internal.motor_move == flags::MOTOR_ON_SCANNING,

        // Derived positions describe the physical ends of the paper path.
        is_ticket_on_enter_center: input_center_left && input_center_right,
        is_ticket_on_enter_a4: input_left_left
            && input_center_left
            && input_center_right
            && input_right_right,
        is_ticket_loaded: deskew_left && deskew_right,
        is_ticket_on_exit: output_left_left
            && output_center_left
            && output_center_right
            && output_right_right,
    };

    let a4_status = ScannerA4Status {
        page_count_side_a: internal.page_num_side_a,
        page_count_side_b: internal.page_num_side_b,
        page_size_side_a: internal.valid_page_size_a,
        page_size_side_b: internal.valid_page_size_b,
        image_width_side_a: internal.image_width_a,
        image_width_side_b: internal.image_width_b,
        image_height_side_a: internal.image_height_a,
        image_height_side_b: internal.image_height_b,
        end_scan_side_a: internal.end_scan_a.eq_ignore_ascii_case(&flags::END_SCAN),
        end_scan_side_b: internal.end_scan_b.eq_ignore_ascii_case(&flags::END_SCAN),
    };

    InterpretedStatus { status, a4_status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_bytes(f: impl FnOnce(&mut StatusInternalMessage)) -> StatusInternalMessage {
        let mut internal = StatusInternalMessage::default();
        f(&mut internal);
        internal
    }

    #[test]
    fn idle_record_reports_nothing() {
        let interpreted = convert_from_internal_status(&StatusInternalMessage::default());
        let status = interpreted.status;
        assert!(!status.is_paper_jam);
        assert!(!status.is_jam_paper_held_back);
        assert!(!status.is_motor_on);
        assert!(!status.is_scan_in_progress);
        assert!(!status.is_ticket_loaded);
        assert_eq!(status.sensor_input_left_left, SensorStatus::NoPaper);
    }

    #[test]
    fn jam_without_encoder_error_is_a_paper_jam() {
        let internal = with_bytes(|s| s.paper_jam = flags::PAPER_JAM);
        let status = convert_from_internal_status(&internal).status;
        assert!(status.is_paper_jam);
        assert!(!status.is_jam_paper_held_back);
    }

    #[test]
    fn jam_with_encoder_error_is_held_back_paper() {
        let internal = with_bytes(|s| {
            s.paper_jam = flags::PAPER_JAM;
            s.doc_sensor = doc_sensor::ENCODER_ERROR;
        });
        let status = convert_from_internal_status(&internal).status;
        assert!(!status.is_paper_jam);
        assert!(status.is_jam_paper_held_back);
    }

    #[test]
    fn motor_sentinels() {
        let motor_only = with_bytes(|s| s.motor_move = flags::MOTOR_ON);
        let status = convert_from_internal_status(&motor_only).status;
        assert!(status.is_motor_on);
        assert!(!status.is_scan_in_progress);

        let scanning = with_bytes(|s| s.motor_move = flags::MOTOR_ON_SCANNING);
        let status = convert_from_internal_status(&scanning).status;
        assert!(status.is_motor_on);
        assert!(status.is_scan_in_progress);
    }

    #[test]
    fn scan_cancel_sentinel() {
        let internal = with_bytes(|s| s.cancel = flags::SCAN_CANCELED);
        assert!(convert_from_internal_status(&internal).status.is_scan_canceled);
    }

    #[test]
    fn end_scan_accepts_either_case() {
        let internal = with_bytes(|s| {
            s.end_scan_a = b'S';
            s.end_scan_b = b's';
        });
        let a4 = convert_from_internal_status(&internal).a4_status;
        assert!(a4.end_scan_side_a);
        assert!(a4.end_scan_side_b);
    }

    #[test]
    fn loading_paper_comes_from_the_job_state_word() {
        let internal = with_bytes(|s| s.job_state = job_state::ADF_LOAD_PAPER);
        assert!(convert_from_internal_status(&internal).status.is_loading_paper);
    }

    #[test]
    fn ticket_positions_are_ands_over_sensor_groups() {
        let at_mouth = with_bytes(|s| {
            s.doc_sensor = doc_sensor::INPUT_LEFT_LEFT
                | doc_sensor::INPUT_CENTER_LEFT
                | doc_sensor::INPUT_CENTER_RIGHT
                | doc_sensor::INPUT_RIGHT_RIGHT;
        });
        let status = convert_from_internal_status(&at_mouth).status;
        assert!(status.is_ticket_on_enter_a4);
        assert!(status.is_ticket_on_enter_center);
        assert!(!status.is_ticket_loaded);
        assert!(!status.is_ticket_on_exit);

        let narrow = with_bytes(|s| {
            s.doc_sensor = doc_sensor::INPUT_CENTER_LEFT | doc_sensor::INPUT_CENTER_RIGHT;
        });
        let status = convert_from_internal_status(&narrow).status;
        assert!(status.is_ticket_on_enter_center);
        assert!(!status.is_ticket_on_enter_a4);

        let loaded = with_bytes(|s| {
            s.doc_sensor = doc_sensor::DESKEW_LEFT | doc_sensor::DESKEW_RIGHT;
        });
        assert!(convert_from_internal_status(&loaded).status.is_ticket_loaded);

        let at_exit = with_bytes(|s| {
            s.home_sensor = home_sensor::OUTPUT_LEFT_LEFT
                | home_sensor::OUTPUT_CENTER_LEFT
                | home_sensor::OUTPUT_CENTER_RIGHT
                | home_sensor::OUTPUT_RIGHT_RIGHT;
        });
        assert!(convert_from_internal_status(&at_exit).status.is_ticket_on_exit);
    }

    proptest! {
        #[test]
        fn jam_flags_are_mutually_exclusive(
            paper_jam: u8,
            doc_sensor_byte: u8,
            motor_move: u8,
            cancel: u8,
            job_state_word: u32,
        ) {
            let internal = with_bytes(|s| {
                s.paper_jam = paper_jam;
                s.doc_sensor = doc_sensor_byte;
                s.motor_move = motor_move;
                s.cancel = cancel;
                s.job_state = job_state_word;
            });
            let status = convert_from_internal_status(&internal).status;
            prop_assert!(!(status.is_paper_jam && status.is_jam_paper_held_back));
            if paper_jam != 0 {
                prop_assert!(status.is_paper_jam || status.is_jam_paper_held_back);
            }
        }
    }
}
