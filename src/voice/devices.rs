//! Audio device enumeration

use cpal::traits::{DeviceTrait, HostTrait};

use crate::{Error, Result};

/// An audio device and whether it is the host default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Input and output devices on the default host
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub inputs: Vec<DeviceInfo>,
    pub outputs: Vec<DeviceInfo>,
}

/// List the input and output devices of the default audio host
///
/// # Errors
///
/// Returns error if the host cannot enumerate devices
pub fn list_devices() -> Result<DeviceList> {
    let host = cpal::default_host();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let describe = |devices: Vec<String>, default: Option<&String>| -> Vec<DeviceInfo> {
        devices
            .into_iter()
            .map(|name| DeviceInfo {
                is_default: Some(&name) == default,
                name,
            })
            .collect()
    };

    let inputs = host
        .input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();
    let outputs = host
        .output_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(DeviceList {
        inputs: describe(inputs, default_input.as_ref()),
        outputs: describe(outputs, default_output.as_ref()),
    })
}
