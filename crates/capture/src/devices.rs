use crate::model::CaptureDevice;

/// Lists local network interfaces usable as capture devices.
pub fn enumerate_devices() -> Vec<CaptureDevice> {
    pnet::datalink::interfaces()
        .into_iter()
        .map(|iface| CaptureDevice {
            name: iface.name.clone(),
            description: if iface.description.is_empty() { None } else { Some(iface.description.clone()) },
            is_loopback: iface.is_loopback(),
            is_up: iface.is_up(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_devices_returns_something_on_any_host() {
        // Every host has at least a loopback interface.
        let devices = enumerate_devices();
        assert!(!devices.is_empty());
    }
}
