use crate::metrics_defs::SKIPPED_DEVICES;
use serde::{Deserialize, Serialize};
use shared::counter;

/// Body of `GET /api/v2/tailnet/{tailnet}/devices`. Only the fields the relay
/// re-exposes are decoded, everything else is ignored.
#[derive(Deserialize, Debug)]
pub struct ApiDevicesResponse {
    pub devices: Vec<ApiDevice>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiDevice {
    #[serde(default)]
    pub addresses: Vec<String>,
    pub hostname: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// A device as served by the relay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Device {
    pub ip_v4: String,
    pub hostname: String,
    pub tags: Vec<String>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("device {hostname:?} has no addresses")]
pub struct NoAddress {
    pub hostname: String,
}

impl TryFrom<ApiDevice> for Device {
    type Error = NoAddress;

    fn try_from(device: ApiDevice) -> Result<Self, Self::Error> {
        // Tailscale lists the IPv4 address first.
        let Some(ip_v4) = device.addresses.into_iter().next() else {
            return Err(NoAddress {
                hostname: device.hostname,
            });
        };

        Ok(Device {
            ip_v4,
            hostname: device.hostname,
            tags: device.tags.unwrap_or_default(),
        })
    }
}

/// Converts upstream records into relay devices sorted by hostname.
///
/// Records without any address are dropped.
pub fn normalize(api_devices: Vec<ApiDevice>) -> Vec<Device> {
    let mut devices: Vec<Device> = api_devices
        .into_iter()
        .filter_map(|api_device| match Device::try_from(api_device) {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!(hostname = %e.hostname, "skipping device without addresses");
                counter!(SKIPPED_DEVICES).increment(1);
                None
            }
        })
        .collect();

    devices.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    devices
}
