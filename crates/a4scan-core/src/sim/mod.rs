//! Deterministic scanner simulator.
//!
//! [`PaperMachine`] models how a sheet physically moves through the
//! device as an explicit finite-state machine with timed transitions.
//! [`MockA4Scanner`] wraps it behind the same operations the real
//! driver exposes, synthesizes raw status records per state, and adds
//! `simulate_*` hooks for loading paper, pulling sheets out, arming
//! jams and cycling power. Fault-code selection uses a seeded xorshift
//! generator, so a given seed always reports the same faults.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::error::ErrorCode;
use crate::parameters::scan_area_for_resolution;
use crate::protocol::messages::StatusInternalMessage;
use crate::status::{convert_from_internal_status, doc_sensor, flags, home_sensor};
use crate::types::{
    FormMovement, ImageFileFormat, ImageFromScanner, ReleaseType, ScanParameters, ScanSide,
    ScannerStatus, Sheet,
};

/// Time a sheet takes to travel through the scanner.
pub const DEFAULT_PASSTHROUGH_DURATION: Duration = Duration::from_millis(1000);
/// Time the transport holds a sheet at the mouth before releasing it.
pub const DEFAULT_TOGGLE_HOLD_DURATION: Duration = Duration::from_millis(100);

const DEFAULT_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Faults the firmware reports for a jammed movement. Which one shows
/// up for a given mechanical jam is not predictable on real hardware.
const MOVEMENT_JAM_FAULTS: &[ErrorCode] = &[
    ErrorCode::PaperJam,
    ErrorCode::PaperHeldBack,
    ErrorCode::ScannerJam,
];
const SCAN_JAM_FAULTS: &[ErrorCode] = &[ErrorCode::PaperJam, ErrorCode::PaperHeldBack];
const FEED_ERROR_FAULTS: &[ErrorCode] = &[ErrorCode::ScanImpeded, ErrorCode::PaperHeldBack];

/// Where the paper physically is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperState {
    Disconnected,
    PoweredOff,
    NoPaper,
    ReadyToScan,
    Scanning,
    ReadyToEject,
    Accepting,
    Rejecting,
    /// Ejected backward past the hold point; the transport re-grabs the
    /// sheet after the hold delay.
    NoPaperBeforeHold,
    /// A second sheet entered the mouth while the first still occupies
    /// the exit.
    BothSidesHavePaper,
    Jam,
}

/// Inputs to the paper state machine. Unhandled events in a given state
/// are dropped, as real sensors simply would not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperEvent {
    Connect,
    Disconnect,
    PowerOff,
    LoadSheet,
    RemoveSheet,
    RemoveSheetFromBack,
    Scan,
    Accept,
    Reject,
    /// The feeder failed to grab the sheet; it falls back to the mouth.
    ScanError,
}

/// Explicit finite-state machine over [`PaperState`].
///
/// Timed transitions are deadline-based: entering `Scanning`,
/// `Accepting`, `Rejecting` or `NoPaperBeforeHold` records a deadline,
/// and any later observation first settles every deadline that has
/// passed. The one-shot jam flag is consumed on entry to the three
/// moving states and diverts them to `Jam`.
#[derive(Debug)]
pub struct PaperMachine {
    state: PaperState,
    deadline: Option<Instant>,
    jam_armed: bool,
    passthrough: Duration,
    toggle_hold: Duration,
}

impl PaperMachine {
    pub fn new(passthrough: Duration, toggle_hold: Duration) -> Self {
        Self {
            state: PaperState::Disconnected,
            deadline: None,
            jam_armed: false,
            passthrough,
            toggle_hold,
        }
    }

    /// The current state, after settling any elapsed timed transitions.
    pub fn state(&mut self) -> PaperState {
        self.settle(Instant::now());
        self.state
    }

    /// Arms a jam that the next scan, accept or reject will trip over.
    pub fn arm_jam(&mut self) {
        self.jam_armed = true;
    }

    pub fn jam_armed(&self) -> bool {
        self.jam_armed
    }

    /// Drops the machine into `PoweredOff` regardless of state. Only
    /// [`power_on`](Self::power_on) leaves it.
    pub fn power_off(&mut self) {
        self.state = PaperState::PoweredOff;
        self.deadline = None;
    }

    /// Restores power with the paper in the given position.
    pub fn power_on(&mut self, state: PaperState) {
        self.state = state;
        self.deadline = None;
        self.jam_armed = false;
    }

    pub fn send(&mut self, event: PaperEvent) {
        let now = Instant::now();
        self.settle(now);
        debug!(state = ?self.state, ?event, "paper machine event");

        if self.state == PaperState::PoweredOff {
            return;
        }
        match event {
            PaperEvent::Disconnect => {
                self.state = PaperState::Disconnected;
                self.deadline = None;
                return;
            }
            PaperEvent::PowerOff => {
                self.power_off();
                return;
            }
            _ => {}
        }

        use PaperEvent as E;
        use PaperState as S;
        match (self.state, event) {
            (S::Disconnected, E::Connect) => self.enter(S::NoPaper, now),

            (S::NoPaper, E::LoadSheet) => self.enter(S::ReadyToScan, now),
            // A sheet entering while another occupies the path.
            (S::Scanning | S::ReadyToEject | S::Rejecting, E::LoadSheet) => {
                self.enter(S::BothSidesHavePaper, now);
            }
            // Loading during an accept completes the accept and grabs
            // the new sheet; the transport toggled just in time.
            (S::Accepting, E::LoadSheet) => self.enter(S::ReadyToScan, now),

            (S::ReadyToScan | S::Jam, E::RemoveSheet) => self.enter(S::NoPaper, now),
            (S::BothSidesHavePaper, E::RemoveSheet) => self.enter(S::ReadyToEject, now),
            (S::ReadyToEject | S::Jam, E::RemoveSheetFromBack) => self.enter(S::NoPaper, now),
            (S::BothSidesHavePaper, E::RemoveSheetFromBack) => self.enter(S::ReadyToScan, now),

            (S::ReadyToScan, E::Scan) => self.enter(S::Scanning, now),
            (S::Scanning, E::ScanError) => self.enter(S::ReadyToScan, now),

            (S::ReadyToScan, E::Accept) => self.enter(S::Accepting, now),
            // Quirk observed on hardware: a jam armed while the sheet
            // already sits at the exit means the mechanism never
            // released, so the accept does nothing at all.
            (S::ReadyToEject, E::Accept) => {
                if self.jam_armed {
                    self.jam_armed = false;
                } else {
                    self.enter(S::Accepting, now);
                }
            }
            (S::ReadyToScan | S::ReadyToEject, E::Reject) => self.enter(S::Rejecting, now),

            _ => {}
        }
    }

    fn enter(&mut self, state: PaperState, now: Instant) {
        use PaperState as S;
        self.deadline = None;
        // The jam flag trips exactly the states with paper in motion.
        if matches!(state, S::Scanning | S::Accepting | S::Rejecting) && self.jam_armed {
            self.jam_armed = false;
            self.state = S::Jam;
            return;
        }
        self.state = state;
        self.deadline = match state {
            S::Scanning | S::Rejecting => Some(now + self.passthrough),
            S::Accepting | S::NoPaperBeforeHold => Some(now + self.toggle_hold),
            _ => None,
        };
    }

    fn settle(&mut self, now: Instant) {
        use PaperState as S;
        while let Some(deadline) = self.deadline {
            if now < deadline {
                return;
            }
            match self.state {
                S::Scanning => self.enter(S::ReadyToEject, deadline),
                S::Accepting => self.enter(S::NoPaper, deadline),
                S::Rejecting => self.enter(S::NoPaperBeforeHold, deadline),
                S::NoPaperBeforeHold => self.enter(S::ReadyToScan, deadline),
                _ => self.deadline = None,
            }
        }
    }
}

/// Failures of the simulation hooks themselves, as opposed to errors
/// the simulated device reports through the driver surface.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// A sheet is already loaded at the mouth.
    #[error("a sheet is already loaded")]
    DuplicateLoad,
    /// The simulated device is powered off.
    #[error("scanner is unresponsive")]
    Unresponsive,
    /// `connect()` has not been called yet.
    #[error("scanner is not connected")]
    NotConnected,
    /// There is no sheet at that end of the paper path.
    #[error("no paper to remove")]
    NoPaperToRemove,
}

/// xorshift64; deterministic per seed, good enough to spread fault
/// picks around.
#[derive(Debug)]
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        // The all-zero state is a fixed point.
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn pick(&mut self, options: &[ErrorCode]) -> ErrorCode {
        options[(self.next_u64() % options.len() as u64) as usize]
    }
}

/// Tuning knobs for the simulated device.
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    pub passthrough_duration: Duration,
    pub toggle_hold_duration: Duration,
    /// Seed for fault-code selection.
    pub seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            passthrough_duration: DEFAULT_PASSTHROUGH_DURATION,
            toggle_hold_duration: DEFAULT_TOGGLE_HOLD_DURATION,
            seed: DEFAULT_SEED,
        }
    }
}

struct SimState {
    machine: PaperMachine,
    sheet: Option<Sheet<Vec<u8>>>,
    feed_error_armed: bool,
    /// Whether the current jam was reported as held-back paper, which
    /// selects the encoder-error bit in the synthesized status.
    jam_held_back: bool,
    rng: XorShift64,
}

impl SimState {
    fn jam_fault(&mut self, faults: &[ErrorCode]) -> ErrorCode {
        let fault = self.rng.pick(faults);
        self.jam_held_back = fault == ErrorCode::PaperHeldBack;
        fault
    }
}

/// A scanner made of software.
///
/// Exposes the driver-facing operations of the real device plus
/// `simulate_*` hooks that stand in for hands and paper. Clones share
/// the same simulated device, so a test can block in [`scan`] on one
/// clone while another thread feeds events through a second.
///
/// [`scan`]: Self::scan
#[derive(Clone)]
pub struct MockA4Scanner {
    inner: Arc<Mutex<SimState>>,
}

impl Default for MockA4Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockA4Scanner {
    pub fn new() -> Self {
        Self::with_options(SimOptions::default())
    }

    pub fn with_options(options: SimOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                machine: PaperMachine::new(
                    options.passthrough_duration,
                    options.toggle_hold_duration,
                ),
                sheet: None,
                feed_error_armed: false,
                jam_held_back: false,
                rng: XorShift64::new(options.seed),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Simulator state is plain data; a panic elsewhere does not
        // invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current paper position, after settling elapsed transitions.
    pub fn paper_state(&self) -> PaperState {
        self.lock().machine.state()
    }

    pub fn connect(&self) -> Result<(), ErrorCode> {
        let mut sim = self.lock();
        if sim.machine.state() == PaperState::PoweredOff {
            return Err(ErrorCode::ScannerOffline);
        }
        sim.machine.send(PaperEvent::Connect);
        Ok(())
    }

    pub fn disconnect(&self) {
        self.lock().machine.send(PaperEvent::Disconnect);
    }

    pub fn get_release_version(&self, release_type: ReleaseType) -> Result<String, ErrorCode> {
        Ok(format!("{release_type:?} 1.0.0"))
    }

    pub fn get_status(&self) -> Result<ScannerStatus, ErrorCode> {
        let raw = self.get_status_raw()?;
        Ok(convert_from_internal_status(&raw).status)
    }

    /// Synthesizes the raw status record the firmware would report for
    /// the current paper position.
    pub fn get_status_raw(&self) -> Result<StatusInternalMessage, ErrorCode> {
        let mut sim = self.lock();
        let state = sim.machine.state();

        let input_bits = doc_sensor::INPUT_LEFT_LEFT
            | doc_sensor::INPUT_CENTER_LEFT
            | doc_sensor::INPUT_CENTER_RIGHT
            | doc_sensor::INPUT_RIGHT_RIGHT;
        let output_bits = home_sensor::OUTPUT_LEFT_LEFT
            | home_sensor::OUTPUT_CENTER_LEFT
            | home_sensor::OUTPUT_CENTER_RIGHT
            | home_sensor::OUTPUT_RIGHT_RIGHT;
        let internal_bits = doc_sensor::DESKEW_LEFT | doc_sensor::DESKEW_RIGHT;

        let mut record = StatusInternalMessage::default();
        match state {
            PaperState::PoweredOff | PaperState::Disconnected => {
                return Err(ErrorCode::ScannerOffline);
            }
            PaperState::NoPaper | PaperState::NoPaperBeforeHold => {}
            PaperState::ReadyToScan => record.doc_sensor = input_bits,
            PaperState::ReadyToEject => record.home_sensor = output_bits,
            PaperState::Scanning => {
                record.motor_move = flags::MOTOR_ON_SCANNING;
                record.doc_sensor = internal_bits;
            }
            PaperState::Accepting | PaperState::Rejecting => {
                record.motor_move = flags::MOTOR_ON;
            }
            PaperState::Jam => {
                record.paper_jam = flags::PAPER_JAM;
                record.doc_sensor = internal_bits;
                if sim.jam_held_back {
                    record.doc_sensor |= doc_sensor::ENCODER_ERROR;
                }
            }
            PaperState::BothSidesHavePaper => {
                record.doc_sensor = input_bits;
                record.home_sensor = output_bits;
            }
        }
        Ok(record)
    }

    /// Scans the loaded sheet, blocking for the pass-through duration.
    ///
    /// Returns exactly two images carrying the loaded sheet's data, with
    /// geometry taken from the requested resolution.
    pub fn scan(
        &self,
        parameters: &ScanParameters,
    ) -> Result<Sheet<ImageFromScanner>, ErrorCode> {
        let wait = {
            let mut sim = self.lock();
            match sim.machine.state() {
                PaperState::PoweredOff | PaperState::Disconnected => {
                    return Err(ErrorCode::ScannerOffline);
                }
                PaperState::NoPaper
                | PaperState::NoPaperBeforeHold
                | PaperState::ReadyToEject => return Err(ErrorCode::NoDocumentToBeScanned),
                PaperState::Jam => return Err(sim.jam_fault(SCAN_JAM_FAULTS)),
                PaperState::BothSidesHavePaper
                | PaperState::Scanning
                | PaperState::Accepting
                | PaperState::Rejecting => return Err(ErrorCode::ScanImpeded),
                PaperState::ReadyToScan => {
                    let feed_error = std::mem::take(&mut sim.feed_error_armed);
                    sim.machine.send(PaperEvent::Scan);
                    match sim.machine.state() {
                        PaperState::Jam => return Err(sim.jam_fault(SCAN_JAM_FAULTS)),
                        PaperState::Scanning if feed_error => {
                            // The feeder lost its grip; the sheet drops
                            // back to the mouth.
                            sim.machine.send(PaperEvent::ScanError);
                            return Err(sim.rng.pick(FEED_ERROR_FAULTS));
                        }
                        _ => sim.machine.passthrough,
                    }
                }
            }
        };
        thread::sleep(wait);

        let mut sim = self.lock();
        match sim.machine.state() {
            PaperState::PoweredOff | PaperState::Disconnected => Err(ErrorCode::ScannerOffline),
            PaperState::Jam => Err(sim.jam_fault(SCAN_JAM_FAULTS)),
            // A second sheet arrived mid-pass.
            PaperState::BothSidesHavePaper => Err(ErrorCode::ScannerError),
            _ => {
                let sheet = sim.sheet.clone().ok_or(ErrorCode::ScannerError)?;
                let (width, height) = scan_area_for_resolution(parameters.resolution);
                let image = |scan_side: ScanSide, buffer: Vec<u8>| ImageFromScanner {
                    image_buffer: buffer,
                    image_width: width,
                    image_height: height,
                    image_depth: parameters.image_color_depth,
                    image_format: ImageFileFormat::Raw,
                    scan_side,
                    image_resolution: parameters.resolution,
                };
                Ok(Sheet::new(
                    image(ScanSide::A, sheet.side_a),
                    image(ScanSide::B, sheet.side_b),
                ))
            }
        }
    }

    /// Moves the loaded sheet forward (accept) or backward (reject).
    /// `Stop` is a no-op; the simulated transport is never mid-motion
    /// when a caller can issue it.
    pub fn move_paper(&self, movement: FormMovement) -> Result<(), ErrorCode> {
        match movement {
            FormMovement::EjectPaperForward => self.drive(PaperEvent::Accept),
            FormMovement::RetractPaperBackward => self.drive(PaperEvent::Reject),
            FormMovement::Stop => Ok(()),
            FormMovement::LoadPaper => Err(ErrorCode::InvalidParameter),
        }
    }

    fn drive(&self, event: PaperEvent) -> Result<(), ErrorCode> {
        let wait = {
            let mut sim = self.lock();
            match sim.machine.state() {
                PaperState::PoweredOff | PaperState::Disconnected => {
                    return Err(ErrorCode::ScannerOffline);
                }
                PaperState::NoPaper | PaperState::NoPaperBeforeHold => {
                    return Err(ErrorCode::NoDocumentScanned);
                }
                PaperState::Jam => {
                    return Err(match event {
                        PaperEvent::Accept => sim.jam_fault(MOVEMENT_JAM_FAULTS),
                        _ => ErrorCode::PaperJam,
                    });
                }
                PaperState::BothSidesHavePaper
                | PaperState::Scanning
                | PaperState::Accepting
                | PaperState::Rejecting => return Err(ErrorCode::ScanImpeded),
                PaperState::ReadyToScan | PaperState::ReadyToEject => {
                    sim.machine.send(event);
                    match sim.machine.state() {
                        PaperState::Jam => {
                            return Err(match event {
                                PaperEvent::Accept => sim.jam_fault(MOVEMENT_JAM_FAULTS),
                                _ => ErrorCode::PaperJam,
                            });
                        }
                        // Jam-armed accept at the exit: the mechanism
                        // never released and nothing moved.
                        PaperState::ReadyToEject => return Ok(()),
                        PaperState::Accepting => sim.machine.toggle_hold,
                        _ => sim.machine.passthrough,
                    }
                }
            }
        };
        thread::sleep(wait);

        let mut sim = self.lock();
        match sim.machine.state() {
            PaperState::PoweredOff | PaperState::Disconnected => Err(ErrorCode::ScannerOffline),
            state => {
                if state == PaperState::NoPaper {
                    sim.sheet = None;
                }
                Ok(())
            }
        }
    }

    pub fn reset_hardware(&self) -> Result<(), ErrorCode> {
        Ok(())
    }

    /// Feeds a sheet into the scanner mouth, blocking for the hold
    /// toggle the hardware performs on insertion.
    pub fn simulate_load_sheet(&self, sheet: Sheet<Vec<u8>>) -> Result<(), SimError> {
        let hold = {
            let mut sim = self.lock();
            match sim.machine.state() {
                PaperState::PoweredOff => return Err(SimError::Unresponsive),
                PaperState::Disconnected => return Err(SimError::NotConnected),
                PaperState::ReadyToScan => return Err(SimError::DuplicateLoad),
                _ => {}
            }
            sim.machine.send(PaperEvent::LoadSheet);
            sim.sheet = Some(sheet);
            sim.machine.toggle_hold
        };
        thread::sleep(hold);
        Ok(())
    }

    /// Pulls the sheet out of the scanner mouth.
    pub fn simulate_remove_sheet(&self) -> Result<(), SimError> {
        self.remove(PaperEvent::RemoveSheet, |state| {
            matches!(
                state,
                PaperState::ReadyToScan | PaperState::Jam | PaperState::BothSidesHavePaper
            )
        })
    }

    /// Pulls the sheet out of the back of the scanner.
    pub fn simulate_remove_sheet_from_back(&self) -> Result<(), SimError> {
        self.remove(PaperEvent::RemoveSheetFromBack, |state| {
            matches!(
                state,
                PaperState::ReadyToEject | PaperState::Jam | PaperState::BothSidesHavePaper
            )
        })
    }

    fn remove(
        &self,
        event: PaperEvent,
        legal: impl Fn(PaperState) -> bool,
    ) -> Result<(), SimError> {
        let mut sim = self.lock();
        match sim.machine.state() {
            PaperState::PoweredOff => return Err(SimError::Unresponsive),
            PaperState::Disconnected => return Err(SimError::NotConnected),
            state if !legal(state) => return Err(SimError::NoPaperToRemove),
            _ => {}
        }
        sim.machine.send(event);
        if sim.machine.state() == PaperState::NoPaper {
            sim.sheet = None;
            sim.jam_held_back = false;
        }
        Ok(())
    }

    /// Arms a one-shot jam that the next scan, accept or reject trips
    /// over.
    pub fn simulate_jam_on_next_operation(&self) {
        self.lock().machine.arm_jam();
    }

    /// Arms a one-shot feed fault for the next scan: the feeder fails
    /// to grab the sheet and the scan reports an impeded pass.
    pub fn simulate_feed_error(&self) {
        self.lock().feed_error_armed = true;
    }

    /// Cuts power. Every operation reports offline until
    /// [`simulate_power_on`](Self::simulate_power_on).
    pub fn simulate_power_off(&self) {
        self.lock().machine.power_off();
    }

    /// Restores power with the paper in the given position.
    pub fn simulate_power_on(&self, state: PaperState) {
        let mut sim = self.lock();
        sim.machine.power_on(state);
        sim.feed_error_armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DoubleSheetDetection, FormStanding, ImageColorDepth, ImageResolution,
    };

    const TICK: Duration = Duration::from_millis(2);

    fn fast_scanner() -> MockA4Scanner {
        MockA4Scanner::with_options(SimOptions {
            passthrough_duration: TICK,
            toggle_hold_duration: TICK,
            seed: 7,
        })
    }

    fn parameters() -> ScanParameters {
        ScanParameters {
            wanted_scan_side: ScanSide::AAndB,
            resolution: ImageResolution::Dpi200,
            image_color_depth: ImageColorDepth::Grey8bpp,
            form_standing_after_scan: FormStanding::HoldTicket,
            double_sheet_detection: DoubleSheetDetection::Level2,
        }
    }

    fn sheet() -> Sheet<Vec<u8>> {
        Sheet::new(vec![0xaa; 16], vec![0xbb; 16])
    }

    fn machine() -> PaperMachine {
        let mut machine = PaperMachine::new(TICK, TICK);
        machine.send(PaperEvent::Connect);
        machine
    }

    fn run_out(machine: &mut PaperMachine) -> PaperState {
        thread::sleep(TICK * 4);
        machine.state()
    }

    #[test]
    fn sheet_travels_through_the_machine() {
        let mut machine = machine();
        assert_eq!(machine.state(), PaperState::NoPaper);

        machine.send(PaperEvent::LoadSheet);
        assert_eq!(machine.state(), PaperState::ReadyToScan);

        machine.send(PaperEvent::Scan);
        assert_eq!(machine.state(), PaperState::Scanning);
        assert_eq!(run_out(&mut machine), PaperState::ReadyToEject);

        machine.send(PaperEvent::Accept);
        assert_eq!(machine.state(), PaperState::Accepting);
        assert_eq!(run_out(&mut machine), PaperState::NoPaper);
    }

    #[test]
    fn reject_holds_then_returns_the_sheet_to_the_mouth() {
        let mut machine = machine();
        machine.send(PaperEvent::LoadSheet);
        machine.send(PaperEvent::Reject);
        assert_eq!(machine.state(), PaperState::Rejecting);
        // Rejecting passes through the hold point before re-grabbing.
        assert_eq!(run_out(&mut machine), PaperState::ReadyToScan);
    }

    #[test]
    fn armed_jam_diverts_a_scan_and_only_removal_leaves_jam() {
        let mut machine = machine();
        machine.send(PaperEvent::LoadSheet);
        machine.arm_jam();
        machine.send(PaperEvent::Scan);
        assert_eq!(machine.state(), PaperState::Jam);
        assert!(!machine.jam_armed());

        // No movement event gets the machine out of a jam.
        for event in [PaperEvent::Scan, PaperEvent::Accept, PaperEvent::Reject] {
            machine.send(event);
            assert_eq!(machine.state(), PaperState::Jam);
        }
        machine.send(PaperEvent::RemoveSheet);
        assert_eq!(machine.state(), PaperState::NoPaper);
    }

    #[test]
    fn jam_armed_at_the_exit_makes_accept_a_no_op() {
        let mut machine = machine();
        machine.send(PaperEvent::LoadSheet);
        machine.send(PaperEvent::Scan);
        run_out(&mut machine);
        assert_eq!(machine.state(), PaperState::ReadyToEject);

        machine.arm_jam();
        machine.send(PaperEvent::Accept);
        assert_eq!(machine.state(), PaperState::ReadyToEject);
        assert!(!machine.jam_armed());

        // With the flag consumed the next accept goes through.
        machine.send(PaperEvent::Accept);
        assert_eq!(run_out(&mut machine), PaperState::NoPaper);
    }

    #[test]
    fn second_sheet_during_a_pass_blocks_both_ends() {
        let mut machine = machine();
        machine.send(PaperEvent::LoadSheet);
        machine.send(PaperEvent::Scan);
        machine.send(PaperEvent::LoadSheet);
        assert_eq!(machine.state(), PaperState::BothSidesHavePaper);

        // The scanning deadline no longer applies.
        assert_eq!(run_out(&mut machine), PaperState::BothSidesHavePaper);

        machine.send(PaperEvent::RemoveSheetFromBack);
        assert_eq!(machine.state(), PaperState::ReadyToScan);
    }

    #[test]
    fn loading_during_an_accept_grabs_the_new_sheet() {
        let mut machine = machine();
        machine.send(PaperEvent::LoadSheet);
        machine.send(PaperEvent::Accept);
        assert_eq!(machine.state(), PaperState::Accepting);
        machine.send(PaperEvent::LoadSheet);
        assert_eq!(machine.state(), PaperState::ReadyToScan);
    }

    #[test]
    fn power_off_is_terminal_until_power_on() {
        let mut machine = machine();
        machine.send(PaperEvent::PowerOff);
        for event in [PaperEvent::Connect, PaperEvent::LoadSheet, PaperEvent::Scan] {
            machine.send(event);
            assert_eq!(machine.state(), PaperState::PoweredOff);
        }
        machine.power_on(PaperState::ReadyToScan);
        assert_eq!(machine.state(), PaperState::ReadyToScan);
    }

    // Load a sheet and scan it; the paper then sits at the exit, so an
    // immediate second scan has nothing to feed.
    #[test]
    fn scan_succeeds_once_then_reports_nothing_to_scan() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        scanner.simulate_load_sheet(sheet()).unwrap();

        let images = scanner.scan(&parameters()).unwrap();
        assert_eq!(images.side_a.image_buffer, vec![0xaa; 16]);
        assert_eq!(images.side_b.image_buffer, vec![0xbb; 16]);
        assert_eq!(images.side_a.image_width, 1728);
        assert_eq!(images.side_a.image_height, 2912);
        assert_eq!(scanner.paper_state(), PaperState::ReadyToEject);

        assert_eq!(
            scanner.scan(&parameters()),
            Err(ErrorCode::NoDocumentToBeScanned)
        );
    }

    // A second sheet loaded mid-pass leaves paper at both ends; scans
    // and movements are impeded until the front sheet is removed.
    #[test]
    fn second_sheet_mid_scan_impedes_everything() {
        // A long pass leaves plenty of room to feed the second sheet.
        let scanner = MockA4Scanner::with_options(SimOptions {
            passthrough_duration: Duration::from_millis(300),
            toggle_hold_duration: TICK,
            seed: 7,
        });
        scanner.connect().unwrap();
        scanner.simulate_load_sheet(sheet()).unwrap();

        let worker = {
            let scanner = scanner.clone();
            thread::spawn(move || scanner.scan(&parameters()))
        };
        // Feed the second sheet while the first is mid-pass.
        while scanner.paper_state() != PaperState::Scanning {
            if scanner.paper_state() == PaperState::ReadyToEject {
                panic!("pass completed before the second sheet was fed");
            }
            thread::yield_now();
        }
        scanner.simulate_load_sheet(sheet()).unwrap();
        assert_eq!(scanner.paper_state(), PaperState::BothSidesHavePaper);
        assert_eq!(worker.join().unwrap(), Err(ErrorCode::ScannerError));

        assert_eq!(scanner.scan(&parameters()), Err(ErrorCode::ScanImpeded));
        assert_eq!(
            scanner.move_paper(FormMovement::EjectPaperForward),
            Err(ErrorCode::ScanImpeded)
        );
        assert_eq!(
            scanner.move_paper(FormMovement::RetractPaperBackward),
            Err(ErrorCode::ScanImpeded)
        );

        scanner.simulate_remove_sheet().unwrap();
        assert_eq!(scanner.paper_state(), PaperState::ReadyToEject);
        scanner
            .move_paper(FormMovement::EjectPaperForward)
            .unwrap();
        assert_eq!(scanner.paper_state(), PaperState::NoPaper);
    }

    // An armed jam makes the eject fail with a jam-family fault, and
    // status keeps reporting the jam until the sheet is removed.
    #[test]
    fn armed_jam_fails_the_eject_until_the_sheet_is_removed() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        scanner.simulate_load_sheet(sheet()).unwrap();
        scanner.simulate_jam_on_next_operation();

        let fault = scanner
            .move_paper(FormMovement::EjectPaperForward)
            .unwrap_err();
        assert!(MOVEMENT_JAM_FAULTS.contains(&fault));
        assert_eq!(scanner.paper_state(), PaperState::Jam);

        let status = scanner.get_status().unwrap();
        assert!(status.is_paper_jam || status.is_jam_paper_held_back);

        scanner.simulate_remove_sheet().unwrap();
        let status = scanner.get_status().unwrap();
        assert!(!status.is_paper_jam && !status.is_jam_paper_held_back);
    }

    #[test]
    fn feed_error_returns_the_sheet_and_reports_a_feeder_fault() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        scanner.simulate_load_sheet(sheet()).unwrap();
        scanner.simulate_feed_error();

        let fault = scanner.scan(&parameters()).unwrap_err();
        assert!(FEED_ERROR_FAULTS.contains(&fault));
        assert_eq!(scanner.paper_state(), PaperState::ReadyToScan);

        // The fault was one-shot; the retry goes through.
        scanner.scan(&parameters()).unwrap();
    }

    #[test]
    fn powered_off_reports_offline_everywhere() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        scanner.simulate_power_off();

        assert_eq!(scanner.connect(), Err(ErrorCode::ScannerOffline));
        assert_eq!(scanner.get_status_raw(), Err(ErrorCode::ScannerOffline));
        assert_eq!(
            scanner.scan(&parameters()),
            Err(ErrorCode::ScannerOffline)
        );
        assert_eq!(
            scanner.move_paper(FormMovement::EjectPaperForward),
            Err(ErrorCode::ScannerOffline)
        );
        assert_eq!(
            scanner.simulate_load_sheet(sheet()),
            Err(SimError::Unresponsive)
        );

        scanner.simulate_power_on(PaperState::NoPaper);
        scanner.simulate_load_sheet(sheet()).unwrap();
        scanner.scan(&parameters()).unwrap();
    }

    #[test]
    fn load_is_rejected_when_a_sheet_is_already_at_the_mouth() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        scanner.simulate_load_sheet(sheet()).unwrap();
        assert_eq!(
            scanner.simulate_load_sheet(sheet()),
            Err(SimError::DuplicateLoad)
        );
    }

    #[test]
    fn remove_requires_paper_at_that_end() {
        let scanner = fast_scanner();
        scanner.connect().unwrap();
        assert_eq!(
            scanner.simulate_remove_sheet(),
            Err(SimError::NoPaperToRemove)
        );
        assert_eq!(
            scanner.simulate_remove_sheet_from_back(),
            Err(SimError::NoPaperToRemove)
        );

        scanner.simulate_load_sheet(sheet()).unwrap();
        // Paper at the mouth is not reachable from the back.
        assert_eq!(
            scanner.simulate_remove_sheet_from_back(),
            Err(SimError::NoPaperToRemove)
        );
        scanner.simulate_remove_sheet().unwrap();
        assert_eq!(scanner.paper_state(), PaperState::NoPaper);
    }

    #[test]
    fn status_records_follow_the_paper() {
        let scanner = fast_scanner();
        assert_eq!(scanner.get_status_raw(), Err(ErrorCode::ScannerOffline));

        scanner.connect().unwrap();
        let idle = scanner.get_status_raw().unwrap();
        assert_eq!(idle, StatusInternalMessage::default());

        scanner.simulate_load_sheet(sheet()).unwrap();
        let status = scanner.get_status().unwrap();
        assert!(status.is_ticket_on_enter_a4);
        assert!(!status.is_ticket_on_exit);

        scanner.scan(&parameters()).unwrap();
        let status = scanner.get_status().unwrap();
        assert!(status.is_ticket_on_exit);
        assert!(!status.is_ticket_on_enter_a4);
    }

    #[test]
    fn fault_picks_are_deterministic_per_seed() {
        let faults = |seed| {
            let scanner = MockA4Scanner::with_options(SimOptions {
                passthrough_duration: TICK,
                toggle_hold_duration: TICK,
                seed,
            });
            scanner.connect().unwrap();
            let mut picked = Vec::new();
            for _ in 0..4 {
                scanner.simulate_load_sheet(sheet()).unwrap();
                scanner.simulate_jam_on_next_operation();
                picked.push(scanner.scan(&parameters()).unwrap_err());
                scanner.simulate_remove_sheet().unwrap();
            }
            picked
        };
        assert_eq!(faults(42), faults(42));
    }

    #[test]
    fn version_strings_name_the_release_type() {
        let scanner = fast_scanner();
        assert_eq!(
            scanner.get_release_version(ReleaseType::Firmware).unwrap(),
            "Firmware 1.0.0"
        );
    }
}
