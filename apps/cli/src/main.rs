use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::info;

use a4scan_core::scanner::{CustomA4Scanner, ScanOptions};
use a4scan_core::transport::UsbChannel;
use a4scan_core::types::{
    DoubleSheetDetection, FormMovement, FormStanding, ImageColorDepth, ImageResolution,
    ReleaseType, ScanParameters, ScanSide,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Custom A4 scanner tool", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a release version string reported by the scanner
    Version {
        #[arg(long, value_enum, default_value_t = VersionKind::Firmware)]
        kind: VersionKind,
    },
    /// Print the current scanner status
    Status {
        /// Print the raw status record instead of the interpreted one
        #[arg(long)]
        raw: bool,
    },
    /// Print status changes as they happen
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,

        /// Stop after this many changes (runs forever by default)
        #[arg(long)]
        count: Option<usize>,
    },
    /// Scan a sheet and write the raw images to disk
    Scan {
        /// TOML scan profile; flags below override its values
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Resolution in dpi (200, 300 or 600)
        #[arg(long)]
        dpi: Option<u16>,

        /// Which side(s) to scan
        #[arg(long, value_enum)]
        side: Option<SideArg>,

        /// Output path prefix; images land at <prefix>-a.raw / <prefix>-b.raw
        #[arg(long, default_value = "scan")]
        out: PathBuf,
    },
    /// Drive the paper transport
    Move {
        #[arg(value_enum)]
        movement: MovementArg,
    },
    /// Reset the scanner hardware
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VersionKind {
    Model,
    Firmware,
    Hardware,
    Capabilities,
}

impl From<VersionKind> for ReleaseType {
    fn from(kind: VersionKind) -> Self {
        match kind {
            VersionKind::Model => ReleaseType::Model,
            VersionKind::Firmware => ReleaseType::Firmware,
            VersionKind::Hardware => ReleaseType::Hardware,
            VersionKind::Capabilities => ReleaseType::Capabilities,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum SideArg {
    A,
    B,
    Both,
}

impl From<SideArg> for ScanSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::A => ScanSide::A,
            SideArg::B => ScanSide::B,
            SideArg::Both => ScanSide::AAndB,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MovementArg {
    Stop,
    Load,
    Eject,
    Retract,
}

impl From<MovementArg> for FormMovement {
    fn from(movement: MovementArg) -> Self {
        match movement {
            MovementArg::Stop => FormMovement::Stop,
            MovementArg::Load => FormMovement::LoadPaper,
            MovementArg::Eject => FormMovement::EjectPaperForward,
            MovementArg::Retract => FormMovement::RetractPaperBackward,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "kebab-case")]
enum ColorArg {
    Grey,
    Color,
    BlackAndWhite,
    Red,
    Green,
    Blue,
}

impl From<ColorArg> for ImageColorDepth {
    fn from(color: ColorArg) -> Self {
        match color {
            ColorArg::Grey => ImageColorDepth::Grey8bpp,
            ColorArg::Color => ImageColorDepth::Color24bpp,
            ColorArg::BlackAndWhite => ImageColorDepth::BlackAndWhite,
            ColorArg::Red => ImageColorDepth::RedChannel8bpp,
            ColorArg::Green => ImageColorDepth::GreenChannel8bpp,
            ColorArg::Blue => ImageColorDepth::BlueChannel8bpp,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "kebab-case")]
enum AfterScanArg {
    Hold,
    Eject,
    Retract,
}

impl From<AfterScanArg> for FormStanding {
    fn from(after: AfterScanArg) -> Self {
        match after {
            AfterScanArg::Hold => FormStanding::HoldTicket,
            AfterScanArg::Eject => FormStanding::DriveForward,
            AfterScanArg::Retract => FormStanding::DriveBackward,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "kebab-case")]
enum DoubleSheetArg {
    Off,
    Level1,
    Level2,
    Level3,
    Level4,
}

impl From<DoubleSheetArg> for DoubleSheetDetection {
    fn from(level: DoubleSheetArg) -> Self {
        match level {
            DoubleSheetArg::Off => DoubleSheetDetection::Off,
            DoubleSheetArg::Level1 => DoubleSheetDetection::Level1,
            DoubleSheetArg::Level2 => DoubleSheetDetection::Level2,
            DoubleSheetArg::Level3 => DoubleSheetDetection::Level3,
            DoubleSheetArg::Level4 => DoubleSheetDetection::Level4,
        }
    }
}

/// Scan settings persisted as TOML.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ScanProfile {
    side: Option<SideArg>,
    dpi: Option<u16>,
    color: Option<ColorArg>,
    after_scan: Option<AfterScanArg>,
    double_sheet: Option<DoubleSheetArg>,
}

impl ScanProfile {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scan profile {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing scan profile {}", path.display()))
    }

    fn into_parameters(self) -> Result<ScanParameters> {
        Ok(ScanParameters {
            wanted_scan_side: self.side.unwrap_or(SideArg::Both).into(),
            resolution: ImageResolution::from_dpi(self.dpi.unwrap_or(200))
                .context("unsupported dpi, expected 200, 300 or 600")?,
            image_color_depth: self.color.unwrap_or(ColorArg::Grey).into(),
            form_standing_after_scan: self.after_scan.unwrap_or(AfterScanArg::Hold).into(),
            double_sheet_detection: self.double_sheet.unwrap_or(DoubleSheetArg::Level2).into(),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")?;

    let scanner = CustomA4Scanner::open().context("opening the scanner")?;
    let result = run(&scanner, args.command);
    scanner.disconnect();
    result
}

fn run(scanner: &CustomA4Scanner<UsbChannel>, command: Command) -> Result<()> {
    match command {
        Command::Version { kind } => {
            let version = scanner.get_release_version(kind.into())?;
            println!("{version}");
        }
        Command::Status { raw } => {
            if raw {
                println!("{:#?}", scanner.get_status_raw()?);
            } else {
                println!("{:#?}", scanner.get_status()?);
            }
        }
        Command::Watch { interval_ms, count } => {
            let watcher =
                scanner.watch_status_with_interval(Duration::from_millis(interval_ms));
            let changes = watcher.take(count.unwrap_or(usize::MAX));
            for change in changes {
                match change {
                    Ok(status) => println!("{status:#?}"),
                    Err(error) => println!("error: {error}"),
                }
            }
        }
        Command::Scan {
            profile,
            dpi,
            side,
            out,
        } => {
            let mut profile = match profile {
                Some(path) => ScanProfile::load(&path)?,
                None => ScanProfile::default(),
            };
            if dpi.is_some() {
                profile.dpi = dpi;
            }
            if side.is_some() {
                profile.side = side;
            }
            let parameters = profile.into_parameters()?;

            info!(?parameters, "scanning");
            let images = scanner.scan(&parameters, ScanOptions::default())?;
            for (suffix, image) in [("a", &images.side_a), ("b", &images.side_b)] {
                if image.image_buffer.is_empty() {
                    continue;
                }
                let path = out.with_file_name(format!(
                    "{}-{suffix}.raw",
                    out.file_name().unwrap_or_default().to_string_lossy()
                ));
                std::fs::write(&path, &image.image_buffer)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!(
                    "{}: {}x{} px, {} bytes",
                    path.display(),
                    image.image_width,
                    image.image_height,
                    image.image_buffer.len()
                );
            }
        }
        Command::Move { movement } => {
            scanner.move_paper(movement.into())?;
            println!("ok");
        }
        Command::Reset => {
            scanner.reset_hardware()?;
            println!("ok");
        }
    }
    Ok(())
}
