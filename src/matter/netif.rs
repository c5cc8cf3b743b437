//! Network provisioning query.
//!
//! A device counts as provisioned when an operational interface already has an
//! IPv4 address. The answer only selects the power-save mode.

use crate::error::{BridgeError, Result};
use log::info;
use nix::ifaddrs::{InterfaceAddress, getifaddrs};
use nix::net::if_::InterfaceFlags;
use nix::sys::socket::{AddressFamily, SockaddrLike};

/// Radio power-save mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PowerSave {
    /// Radio stays on, lowest latency
    None,
    /// Modem sleep between beacons
    MinModem,
}

/// Whether `interface` (or any interface when `None`) is provisioned.
pub fn is_provisioned(interface: Option<&str>) -> Result<bool> {
    let addrs = getifaddrs().map_err(|e| BridgeError::Network(e.to_string()))?;
    Ok(provisioned_in(addrs, interface))
}

fn provisioned_in(
    addrs: impl IntoIterator<Item = InterfaceAddress>,
    interface: Option<&str>,
) -> bool {
    addrs.into_iter().any(|ifaddr| {
        if interface.is_some_and(|name| name != ifaddr.interface_name) {
            return false;
        }
        if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK)
            || !ifaddr.flags.contains(InterfaceFlags::IFF_RUNNING)
        {
            return false;
        }
        ifaddr
            .address
            .and_then(|addr| addr.family())
            .is_some_and(|family| family == AddressFamily::Inet)
    })
}

/// Power-save mode for a provisioning answer.
pub fn power_save_for(provisioned: bool) -> PowerSave {
    if provisioned {
        info!("[Matter] Network already provisioned previously, disable PS");
        PowerSave::None
    } else {
        PowerSave::MinModem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_save_choice() {
        assert_eq!(power_save_for(true), PowerSave::None);
        assert_eq!(power_save_for(false), PowerSave::MinModem);
    }

    #[test]
    fn test_unknown_interface_is_unprovisioned() {
        assert!(!is_provisioned(Some("no-such-if0")).unwrap());
    }

    #[test]
    fn test_empty_list() {
        assert!(!provisioned_in(Vec::new(), None));
    }
}
