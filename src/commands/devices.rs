//! Devices command handler

use colored::*;

use crate::devices::DEVICES;
use crate::ui::Table;

/// Print the device registry as a table
pub fn list_devices() {
    let mut table = Table::new(
        "Garmin Connect IQ Devices",
        &["Device ID", "Name", "Resolution", "Display"],
    );
    for device in DEVICES {
        table.add_row(vec![
            device.id.cyan().to_string(),
            device.name.green().to_string(),
            device.resolution.yellow().to_string(),
            device.display_type.magenta().to_string(),
        ]);
    }
    table.print();
}
