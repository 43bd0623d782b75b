//! nusb-based duplex channel implementation.

use nusb::transfer::{Bulk, In, Out};
use nusb::{Interface, MaybeFuture, list_devices};
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, info, instrument, warn};

use super::traits::{
    BulkIo, DuplexChannel, TransferFailure, read_with_retries, write_with_retries,
};
use crate::error::ErrorCode;

/// USB vendor ID of the scanner.
pub const VENDOR_ID: u16 = 0x0dd4;

/// USB product ID of the A4 scanner model.
pub const PRODUCT_ID: u16 = 0x4103;

const INTERFACE_NUMBER: u8 = 0;
const CONFIGURATION_VALUE: u8 = 1;

fn io_failure(e: std::io::Error) -> TransferFailure {
    match e.kind() {
        ErrorKind::NotConnected => TransferFailure::Disconnected,
        _ => TransferFailure::Other(e.to_string()),
    }
}

struct OpenedUsb {
    interface: Interface,
    in_endpoint: u8,
    out_endpoint: u8,
}

impl BulkIo for OpenedUsb {
    fn write_some(&mut self, data: &[u8]) -> Result<usize, TransferFailure> {
        let ep = self
            .interface
            .endpoint::<Bulk, Out>(self.out_endpoint)
            .map_err(|e| TransferFailure::Other(e.to_string()))?;
        let mut writer = ep.writer(4096);
        let sent = writer.write(data).map_err(io_failure)?;
        writer.flush().map_err(io_failure)?;
        Ok(sent)
    }

    fn read_some(&mut self, max_length: usize) -> Result<Vec<u8>, TransferFailure> {
        let ep = self
            .interface
            .endpoint::<Bulk, In>(self.in_endpoint)
            .map_err(|e| TransferFailure::Other(e.to_string()))?;
        let mut reader = ep.reader(4096);
        let mut buf = vec![0u8; max_length];
        let n = reader.read(&mut buf).map_err(io_failure)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn clear_halt_in(&mut self) -> Result<(), TransferFailure> {
        let mut ep = self
            .interface
            .endpoint::<Bulk, In>(self.in_endpoint)
            .map_err(|e| TransferFailure::Other(e.to_string()))?;
        ep.clear_halt()
            .wait()
            .map_err(|e| TransferFailure::Other(e.to_string()))
    }

    fn clear_halt_out(&mut self) -> Result<(), TransferFailure> {
        let mut ep = self
            .interface
            .endpoint::<Bulk, Out>(self.out_endpoint)
            .map_err(|e| TransferFailure::Other(e.to_string()))?;
        ep.clear_halt()
            .wait()
            .map_err(|e| TransferFailure::Other(e.to_string()))
    }
}

/// Duplex channel over the real USB link.
///
/// Starts unconnected; all transfers before `connect()` report
/// [`ErrorCode::DeviceNotOpened`].
#[derive(Default)]
pub struct UsbChannel {
    opened: Option<OpenedUsb>,
}

impl UsbChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&mut self) -> Result<&mut OpenedUsb, ErrorCode> {
        self.opened.as_mut().ok_or(ErrorCode::DeviceNotOpened)
    }
}

impl DuplexChannel for UsbChannel {
    #[instrument(skip(self))]
    fn connect(&mut self) -> Result<(), ErrorCode> {
        if self.opened.is_some() {
            debug!("already connected");
            return Ok(());
        }

        let device_info = list_devices()
            .wait()
            .map_err(|e| {
                warn!(error = %e, "failed to list devices");
                ErrorCode::OpenDeviceError
            })?
            .find(|d| d.vendor_id() == VENDOR_ID && d.product_id() == PRODUCT_ID)
            .ok_or_else(|| {
                warn!(
                    vendor_id = %format!("{VENDOR_ID:04x}"),
                    product_id = %format!("{PRODUCT_ID:04x}"),
                    "scanner not found on the bus"
                );
                ErrorCode::ScannerOffline
            })?;

        let device = device_info.open().wait().map_err(|e| {
            warn!(error = %e, "failed to open device");
            ErrorCode::OpenDeviceError
        })?;

        device
            .set_configuration(CONFIGURATION_VALUE)
            .wait()
            .map_err(|e| {
                warn!(error = %e, "failed to select configuration");
                ErrorCode::OpenDeviceError
            })?;

        let interface = device.claim_interface(INTERFACE_NUMBER).wait().map_err(|e| {
            warn!(error = %e, "failed to claim interface");
            ErrorCode::OpenDeviceError
        })?;

        let mut in_endpoint: u8 = 0;
        let mut out_endpoint: u8 = 0;
        for config in device.configurations() {
            for iface in config.interfaces() {
                if iface.interface_number() == INTERFACE_NUMBER {
                    for alt in iface.alt_settings() {
                        for ep in alt.endpoints() {
                            if ep.transfer_type() == nusb::descriptors::TransferType::Bulk {
                                if ep.direction() == nusb::transfer::Direction::In {
                                    in_endpoint = ep.address();
                                } else {
                                    out_endpoint = ep.address();
                                }
                            }
                        }
                    }
                }
            }
        }

        if in_endpoint == 0 || out_endpoint == 0 {
            warn!("expected bulk endpoints not present");
            return Err(ErrorCode::OpenDeviceError);
        }

        info!(
            in_ep = %format!("0x{in_endpoint:02x}"),
            out_ep = %format!("0x{out_endpoint:02x}"),
            "scanner connected"
        );

        self.opened = Some(OpenedUsb {
            interface,
            in_endpoint,
            out_endpoint,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.opened.take().is_some() {
            info!("scanner disconnected");
        }
    }

    fn read(&mut self, max_length: usize) -> Result<Vec<u8>, ErrorCode> {
        read_with_retries(self.opened()?, max_length)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        write_with_retries(self.opened()?, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfers_require_a_connection() {
        let mut channel = UsbChannel::new();
        assert_eq!(channel.read(30), Err(ErrorCode::DeviceNotOpened));
        assert_eq!(channel.write(b"x"), Err(ErrorCode::DeviceNotOpened));
    }

    #[test]
    fn disconnect_without_connect_is_a_no_op() {
        let mut channel = UsbChannel::new();
        channel.disconnect();
        channel.disconnect();
    }
}
