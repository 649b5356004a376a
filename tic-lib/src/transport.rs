//! The control-transfer seam between the protocol code and USB.

use crate::command::{CommandDescriptor, Direction, RequestKind};
use crate::constants::{Product, VENDOR_ID};
use crate::error::{Result, TicError};
use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient, TransferError};
use nusb::{DeviceInfo, MaybeFuture};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Executes control transfers on behalf of a session.
///
/// IN transfers return the bytes the device sent; OUT transfers return an
/// empty vector.
pub trait Transport {
    fn execute(&mut self, descriptor: &CommandDescriptor, timeout: Duration) -> Result<Vec<u8>, TransferError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn execute(&mut self, descriptor: &CommandDescriptor, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        (**self).execute(descriptor, timeout)
    }
}

impl From<RequestKind> for ControlType {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Vendor => ControlType::Vendor,
            RequestKind::Standard => ControlType::Standard,
        }
    }
}

/// Transport over an opened `nusb` device.
pub struct UsbTransport {
    device: nusb::Device,
}

impl UsbTransport {
    pub fn new(device: nusb::Device) -> Self {
        Self { device }
    }
}

impl Transport for UsbTransport {
    fn execute(&mut self, descriptor: &CommandDescriptor, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        match descriptor.direction {
            Direction::Out => {
                let data = descriptor.payload.as_deref().unwrap_or(&[]);
                self.device
                    .control_out(
                        ControlOut {
                            control_type: descriptor.kind.into(),
                            recipient: Recipient::Device,
                            request: descriptor.request,
                            value: descriptor.value,
                            index: descriptor.index,
                            data,
                        },
                        timeout,
                    )
                    .wait()?;
                Ok(Vec::new())
            }
            Direction::In => self
                .device
                .control_in(
                    ControlIn {
                        control_type: descriptor.kind.into(),
                        recipient: Recipient::Device,
                        request: descriptor.request,
                        value: descriptor.value,
                        index: descriptor.index,
                        length: descriptor.length,
                    },
                    timeout,
                )
                .wait(),
        }
    }
}

/// Firmware version as reported in `bcdDevice`, e.g. `01.06`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FirmwareVersion {
    pub bcd: u16,
}

impl FirmwareVersion {
    pub fn major(&self) -> u8 {
        (self.bcd >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.bcd & 0xFF) as u8
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // BCD digits print correctly in hex.
        write!(f, "{:02x}.{:02x}", self.major(), self.minor())
    }
}

/// Who a session is talking to. Fixed when the device is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product: Product,
    pub serial: Option<String>,
    pub firmware_version: FirmwareVersion,
}

impl DeviceIdentity {
    pub fn from_device_info(info: &DeviceInfo) -> Result<Self> {
        let product =
            Product::from_usb_product_id(info.product_id()).ok_or(TicError::UnsupportedProduct(info.product_id()))?;
        Ok(Self {
            vendor_id: info.vendor_id(),
            product,
            serial: info.serial_number().map(str::to_owned),
            firmware_version: FirmwareVersion {
                bcd: info.device_version(),
            },
        })
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tic {} (serial {}, firmware {})",
            self.product,
            self.serial.as_deref().unwrap_or("<none>"),
            self.firmware_version
        )
    }
}

fn is_tic(info: &DeviceInfo) -> bool {
    info.vendor_id() == VENDOR_ID && Product::from_usb_product_id(info.product_id()).is_some()
}

/// Lists every connected Tic controller.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let devices: Vec<DeviceInfo> = nusb::list_devices().wait()?.filter(is_tic).collect();
    debug!("Found {} Tic controller(s)", devices.len());
    Ok(devices)
}

/// Finds the first Tic controller, or the one with the given serial number.
pub fn find_device(serial: Option<&str>) -> Result<DeviceInfo> {
    info!("Searching for Tic controller...");
    let found = list_devices()?
        .into_iter()
        .find(|d| serial.is_none_or(|s| d.serial_number() == Some(s)))
        .ok_or_else(|| TicError::DeviceNotFound {
            serial: serial.map(str::to_owned),
        })?;
    info!(
        "Found Tic {:#06x}:{:#06x} serial {}",
        found.vendor_id(),
        found.product_id(),
        found.serial_number().unwrap_or("<none>")
    );
    Ok(found)
}
