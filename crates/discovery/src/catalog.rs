//! Well-known mDNS service types scanned by every discovery run.
//!
//! `COMMON_TYPES` covers the handful of types present on nearly every
//! home/office network; `EXTENDED_TYPES` rounds the catalog out to the
//! long tail of vendor- and protocol-specific services worth probing for.

pub const COMMON_TYPES: &[&str] = &[
    "_http._tcp.local.",
    "_https._tcp.local.",
    "_airplay._tcp.local.",
    "_raop._tcp.local.",
    "_ipp._tcp.local.",
    "_ipps._tcp.local.",
    "_printer._tcp.local.",
    "_pdl-datastream._tcp.local.",
    "_googlecast._tcp.local.",
    "_spotify-connect._tcp.local.",
    "_ssh._tcp.local.",
    "_sftp-ssh._tcp.local.",
    "_smb._tcp.local.",
    "_afpovertcp._tcp.local.",
    "_device-info._tcp.local.",
    "_workstation._tcp.local.",
    "_companion-link._tcp.local.",
    "_homekit._tcp.local.",
    "_hap._tcp.local.",
];

pub const EXTENDED_TYPES: &[&str] = &[
    "_nfs._tcp.local.",
    "_webdav._tcp.local.",
    "_rfb._tcp.local.",
    "_vnc._tcp.local.",
    "_rdp._tcp.local.",
    "_teamviewer._tcp.local.",
    "_amzn-wplay._tcp.local.",
    "_sonos._tcp.local.",
    "_bose._tcp.local.",
    "_soundtouch._tcp.local.",
    "_hue._tcp.local.",
    "_philipshue._tcp.local.",
    "_matter._tcp.local.",
    "_matterc._udp.local.",
    "_esphomelib._tcp.local.",
    "_arduino._tcp.local.",
    "_octoprint._tcp.local.",
    "_plugwise._tcp.local.",
    "_nvstream._tcp.local.",
    "_xbox._tcp.local.",
    "_ps4._tcp.local.",
    "_nintendo-switch._tcp.local.",
    "_daap._tcp.local.",
    "_dacp._tcp.local.",
    "_touch-able._tcp.local.",
    "_mqtt._tcp.local.",
    "_coap._udp.local.",
    "_amazon-ssh._tcp.local.",
    "_miio._udp.local.",
    "_tuya._tcp.local.",
    "_onvif._tcp.local.",
    "_rtsp._tcp.local.",
    "_axis-video._tcp.local.",
    "_hap-nat-t._udp.local.",
    "_airport._tcp.local.",
    "_time-machine._tcp.local.",
    "_presence._tcp.local.",
    "_xmpp-client._tcp.local.",
    "_xmpp-server._tcp.local.",
    "_sip._udp.local.",
    "_sips._tcp.local.",
    "_h323cs._tcp.local.",
    "_distcc._tcp.local.",
    "_rsync._tcp.local.",
    "_amazon-alexa._tcp.local.",
    "_googlehome._tcp.local.",
    "_chromecast._tcp.local.",
    "_dlna._tcp.local.",
    "_upnp._tcp.local.",
    "_media-remote._tcp.local.",
    "_airserver._tcp.local.",
    "_smartglass._udp.local.",
    "_elg._tcp.local.",
    "_nanoleafapi._tcp.local.",
    "_wemo._tcp.local.",
    "_insteon._tcp.local.",
    "_zigbee._tcp.local.",
    "_zwave._tcp.local.",
    "_homebridge._tcp.local.",
    "_lutron._tcp.local.",
    "_ecobee._tcp.local.",
    "_nest._tcp.local.",
    "_ring._tcp.local.",
    "_wyze._tcp.local.",
    "_unifi._tcp.local.",
    "_ubnt._tcp.local.",
    "_synology._tcp.local.",
    "_qnap._tcp.local.",
    "_plex._tcp.local.",
    "_jellyfin._tcp.local.",
    "_minidlna._tcp.local.",
];

pub fn all_types() -> impl Iterator<Item = &'static str> {
    COMMON_TYPES.iter().chain(EXTENDED_TYPES.iter()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for ty in all_types() {
            assert!(seen.insert(ty), "duplicate service type: {ty}");
        }
    }

    #[test]
    fn every_type_ends_with_local_dot() {
        for ty in all_types() {
            assert!(ty.ends_with(".local."), "{ty} missing .local. suffix");
        }
    }
}
