//! Scanner session: orchestrates protocol calls into connect, scan, move
//! and reset operations, and owns all concurrency control.

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::coder::MAX_UINT24;
use crate::error::ErrorCode;
use crate::parameters::convert_to_internal_scan_parameters;
use crate::protocol::{self, messages::StatusInternalMessage};
use crate::status::convert_from_internal_status;
use crate::transport::{DuplexChannel, UsbChannel};
use crate::types::{
    FormMovement, ImageFromScanner, ReleaseType, ScanParameters, ScanSide, ScannerStatus, Sheet,
};

/// The only job handle the firmware accepts. The firmware supports a
/// single job at a time and rejects every other ID, yet the job must
/// still be explicitly created and destroyed.
pub const ONLY_VALID_JOB_ID: u8 = 0x01;

/// Largest image portion a single data request can pull; the wire length
/// field is 24 bits.
pub const MAX_IMAGE_PORTION_SIZE: u32 = MAX_UINT24;

const RECREATE_JOB_MAX: u32 = 1;
const CREATE_JOB_ERROR_MAX: u32 = 4;

/// Tuning knobs for [`CustomA4Scanner::scan`].
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// How long the scan loop tolerates the motor being off with no scan
    /// in progress before giving up. The window restarts whenever
    /// activity resumes.
    pub max_timeout_no_move_no_scan: Duration,
    /// Retry budget for transient status-read and image-read failures.
    pub max_retries: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_timeout_no_move_no_scan: Duration::from_millis(5_000),
            max_retries: 3,
        }
    }
}

/// Driver session for the Custom A4 sheet-fed scanner.
///
/// Public operations are serialized end-to-end by a public-API lock. A
/// separate channel lock guards each individual wire transfer, so the
/// status watcher can interleave its polls with a long-running scan.
pub struct CustomA4Scanner<C: DuplexChannel> {
    public_api_lock: Mutex<()>,
    channel: Mutex<C>,
}

impl CustomA4Scanner<UsbChannel> {
    /// Finds the scanner on the bus and connects to it.
    pub fn open() -> Result<Self, ErrorCode> {
        let mut channel = UsbChannel::new();
        channel.connect()?;
        Ok(Self::new(channel))
    }
}

impl<C: DuplexChannel> CustomA4Scanner<C> {
    /// Wraps an existing channel. The channel may be connected later via
    /// [`CustomA4Scanner::connect`].
    pub fn new(channel: C) -> Self {
        Self {
            public_api_lock: Mutex::new(()),
            channel: Mutex::new(channel),
        }
    }

    fn public_lock(&self) -> Result<MutexGuard<'_, ()>, ErrorCode> {
        self.public_api_lock
            .lock()
            .map_err(|_| ErrorCode::SynchronizationError)
    }

    /// Runs one wire operation while holding the channel lock.
    fn with_channel<T>(
        &self,
        f: impl FnOnce(&mut C) -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        let mut channel = self
            .channel
            .lock()
            .map_err(|_| ErrorCode::SynchronizationError)?;
        f(&mut channel)
    }

    /// Connects to the scanner. A no-op when already connected.
    #[instrument(skip(self))]
    pub fn connect(&self) -> Result<(), ErrorCode> {
        let _guard = self.public_lock()?;
        self.with_channel(|channel| channel.connect())
    }

    /// Disconnects from the scanner after any pending operation
    /// completes. A no-op when not connected.
    #[instrument(skip(self))]
    pub fn disconnect(&self) {
        let Ok(_guard) = self.public_lock() else {
            return;
        };
        let _ = self.with_channel(|channel| {
            channel.disconnect();
            Ok(())
        });
    }

    /// Fetches one of the scanner's release version strings.
    #[instrument(skip(self))]
    pub fn get_release_version(&self, release_type: ReleaseType) -> Result<String, ErrorCode> {
        let _guard = self.public_lock()?;
        self.with_channel(|channel| protocol::get_release_version(channel, release_type))
    }

    /// Fetches the current semantic status.
    pub fn get_status(&self) -> Result<ScannerStatus, ErrorCode> {
        Ok(convert_from_internal_status(&self.get_status_raw()?).status)
    }

    /// Fetches the raw internal status record.
    pub fn get_status_raw(&self) -> Result<StatusInternalMessage, ErrorCode> {
        let _guard = self.public_lock()?;
        self.get_status_internal()
    }

    /// Raw status fetch without the public lock; used by the scan loop
    /// and the status watcher.
    pub(crate) fn get_status_internal(&self) -> Result<StatusInternalMessage, ErrorCode> {
        self.with_channel(|channel| protocol::get_status_internal(channel, ONLY_VALID_JOB_ID))
    }

    /// Creates a job, ending and recreating it when the firmware reports
    /// the handle invalid. The returned handle is always
    /// [`ONLY_VALID_JOB_ID`] in practice.
    fn create_job_internal(&self) -> Result<u8, ErrorCode> {
        debug!("creating job");
        let mut recreate_count = 0;
        let mut error_count = 0;
        loop {
            match self.with_channel(protocol::create_job) {
                Ok(job_id) => return Ok(job_id),
                Err(ErrorCode::JobNotValid) => {
                    debug!("job not valid, ending current job");
                    let _ = self.with_channel(|channel| {
                        protocol::end_job(channel, ONLY_VALID_JOB_ID)
                    });
                    recreate_count += 1;
                    if recreate_count > RECREATE_JOB_MAX {
                        return Err(ErrorCode::JobNotValid);
                    }
                }
                Err(error) => {
                    debug!(?error, "create job failed");
                    error_count += 1;
                    if error_count > CREATE_JOB_ERROR_MAX {
                        return Err(error);
                    }
                }
            }
        }
    }

    /// Retries `f` up to `max` extra times, but only while it fails with
    /// an invalid job handle; any other error surfaces immediately.
    fn with_retries<T>(
        &self,
        max: u32,
        mut f: impl FnMut() -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        let mut result = f();
        for _ in 0..max {
            match result {
                Err(ErrorCode::JobNotValid) => result = f(),
                _ => break,
            }
        }
        result
    }

    /// Moves the sheet as directed.
    ///
    /// A stop movement is achieved purely by recreating the job, which
    /// halts the motors; no movement command goes on the wire for it.
    #[instrument(skip(self))]
    pub fn move_paper(&self, movement: FormMovement) -> Result<(), ErrorCode> {
        let _guard = self.public_lock()?;
        self.with_retries(1, || {
            self.create_job_internal()?;
            if movement == FormMovement::Stop {
                return Ok(());
            }
            self.with_channel(|channel| {
                protocol::form_move(channel, ONLY_VALID_JOB_ID, movement)
            })
        })
    }

    /// Scans a sheet and returns the resulting images.
    ///
    /// Always returns a pair, even when only one side was requested; the
    /// other side comes back with zero dimensions and an empty buffer.
    #[instrument(skip(self, parameters, options))]
    pub fn scan(
        &self,
        parameters: &ScanParameters,
        options: ScanOptions,
    ) -> Result<Sheet<ImageFromScanner>, ErrorCode> {
        let _guard = self.public_lock()?;

        let mut image_a = ImageFromScanner::empty(ScanSide::A, parameters);
        let mut image_b = ImageFromScanner::empty(ScanSide::B, parameters);

        let result = self.scan_locked(parameters, options, &mut image_a, &mut image_b);

        // The stop command is sent however the loop ended; the device
        // stays in the scan state otherwise.
        let _ = self.stop_scan_internal();

        result.map(|()| Sheet::new(image_a, image_b))
    }

    fn scan_locked(
        &self,
        parameters: &ScanParameters,
        options: ScanOptions,
        image_a: &mut ImageFromScanner,
        image_b: &mut ImageFromScanner,
    ) -> Result<(), ErrorCode> {
        let scan_side = parameters.wanted_scan_side;

        match self.set_scan_parameters_internal(parameters) {
            Ok(()) => {}
            Err(ErrorCode::JobNotValid) => {
                debug!("job not valid, recreating job");
                self.create_job_internal()?;
                self.set_scan_parameters_internal(parameters)?;
            }
            Err(error) => return Err(error),
        }

        self.start_scan_internal()?;

        let mut error_count = 0;
        let mut no_move_no_scan_since: Option<Instant> = None;

        loop {
            let internal = match self.get_status_internal() {
                Ok(internal) => {
                    error_count = 0;
                    internal
                }
                Err(error) => {
                    error_count += 1;
                    if error_count < options.max_retries {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    return Err(error);
                }
            };

            let interpreted = convert_from_internal_status(&internal);
            let status = interpreted.status;
            let a4_status = interpreted.a4_status;

            if status.is_scan_canceled {
                debug!("scan canceled by the device");
                return Err(ErrorCode::NoDocumentToBeScanned);
            }

            if status.is_jam_paper_held_back {
                warn!("paper held back during scan");
                return Err(ErrorCode::PaperHeldBack);
            }

            if status.is_paper_jam {
                warn!("paper jam during scan");
                return Err(ErrorCode::PaperJam);
            }

            if !status.is_motor_on && !status.is_scan_in_progress {
                match no_move_no_scan_since {
                    None => {
                        debug!("motor off and no scan in progress, starting idle window");
                        no_move_no_scan_since = Some(Instant::now());
                    }
                    Some(since) if since.elapsed() > options.max_timeout_no_move_no_scan => {
                        warn!("scan stalled beyond the idle timeout");
                        return Err(ErrorCode::ScannerError);
                    }
                    Some(_) => {}
                }
            } else {
                no_move_no_scan_since = None;
            }

            let side_a_done = !scan_side.includes(ScanSide::A) || a4_status.end_scan_side_a;
            let side_b_done = !scan_side.includes(ScanSide::B) || a4_status.end_scan_side_b;
            if side_a_done && side_b_done {
                if a4_status.image_width_side_a != 0 {
                    image_a.image_width = u32::from(a4_status.image_width_side_a);
                }
                if a4_status.image_width_side_b != 0 {
                    image_b.image_width = u32::from(a4_status.image_width_side_b);
                }
                if a4_status.image_height_side_a != 0 {
                    image_a.image_height = u32::from(a4_status.image_height_side_a);
                }
                if a4_status.image_height_side_b != 0 {
                    image_b.image_height = u32::from(a4_status.image_height_side_b);
                }
                return Ok(());
            }

            if scan_side.includes(ScanSide::A) && !a4_status.end_scan_side_a {
                self.process_image_data(
                    image_a,
                    a4_status.page_size_side_a,
                    a4_status.image_width_side_a,
                    a4_status.image_height_side_a,
                    options.max_retries,
                )?;
            }

            if scan_side.includes(ScanSide::B) && !a4_status.end_scan_side_b {
                self.process_image_data(
                    image_b,
                    a4_status.page_size_side_b,
                    a4_status.image_width_side_b,
                    a4_status.image_height_side_b,
                    options.max_retries,
                )?;
            }
        }
    }

    /// Pulls newly available image bytes for one side and appends them to
    /// the image buffer.
    fn process_image_data(
        &self,
        image: &mut ImageFromScanner,
        page_size: u32,
        image_width: u16,
        image_height: u16,
        max_retries: u32,
    ) -> Result<(), ErrorCode> {
        if page_size == 0 || image_width == 0 {
            return Ok(());
        }

        debug!(
            side = ?image.scan_side,
            page_size,
            image_width,
            image_height,
            "side has image data"
        );

        let mut read_error_count = 0;
        loop {
            match self.get_image_portion_internal(image.scan_side, page_size) {
                Ok(portion) => {
                    image.image_buffer.extend_from_slice(&portion);
                    image.image_width = u32::from(image_width);
                    image.image_height = u32::from(image_height);
                    return Ok(());
                }
                Err(error) => {
                    read_error_count += 1;
                    if read_error_count < max_retries {
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    fn get_image_portion_internal(
        &self,
        scan_side: ScanSide,
        portion_size: u32,
    ) -> Result<Vec<u8>, ErrorCode> {
        if portion_size == 0 {
            return Ok(Vec::new());
        }
        self.with_channel(|channel| {
            protocol::get_image_data(
                channel,
                portion_size.min(MAX_IMAGE_PORTION_SIZE),
                scan_side,
            )
        })
    }

    fn set_scan_parameters_internal(&self, parameters: &ScanParameters) -> Result<(), ErrorCode> {
        let internal = convert_to_internal_scan_parameters(parameters)?;
        self.with_channel(|channel| {
            protocol::set_scan_parameters(channel, ONLY_VALID_JOB_ID, &internal)
        })
    }

    fn start_scan_internal(&self) -> Result<(), ErrorCode> {
        self.with_channel(|channel| protocol::start_scan(channel, ONLY_VALID_JOB_ID))
    }

    fn stop_scan_internal(&self) -> Result<(), ErrorCode> {
        self.with_channel(|channel| protocol::stop_scan(channel, ONLY_VALID_JOB_ID))
    }

    /// Resets the scanner hardware.
    ///
    /// The reset drops the device off the bus, so a missing answer to the
    /// reset command itself is expected and not treated as a failure.
    #[instrument(skip(self))]
    pub fn reset_hardware(&self) -> Result<(), ErrorCode> {
        let _guard = self.public_lock()?;
        let result = self.with_retries(1, || {
            self.with_channel(|channel| protocol::reset_hardware(channel, ONLY_VALID_JOB_ID))
        });
        match result {
            Err(ErrorCode::NoDeviceAnswer) => {
                debug!("no answer after reset, treating as success");
                Ok(())
            }
            other => other,
        }
    }
}
