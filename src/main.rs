use anyhow::Result;
use tic_lib::DeviceIdentity;
use tic_lib::transport::list_devices;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Listing connected Tic controllers...\n");

    let devices = list_devices()?;
    for (count, device_info) in devices.iter().enumerate() {
        let identity = DeviceIdentity::from_device_info(device_info)?;
        info!(
            "Device #{}: {} (VID: {:#06x}, PID: {:#06x}, Bus: {:03}, Address: {:03})",
            count + 1,
            identity,
            device_info.vendor_id(),
            device_info.product_id(),
            device_info.busnum(),
            device_info.device_address()
        );
        match device_info.product_string() {
            Some(product) => info!("  Product: {}", product),
            None => info!("  Product: <Not available>"),
        }
        info!("  Speed: {:?}", device_info.speed());
        info!("---");
    }
    if devices.is_empty() {
        info!("No Tic controllers found.");
    }
    Ok(())
}
