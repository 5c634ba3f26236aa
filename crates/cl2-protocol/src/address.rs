//! Guessed device roles by bus address
//!
//! Based on the Carrier Infinity addressing scheme, which ComfortLink II may
//! or may not share. Every hint is a guess and is labelled as such.

/// Suspected broadcast address
pub const BROADCAST_ADDR: u16 = 0x1F1F;

/// Guessed role for a known address
pub fn device_hint(addr: u16) -> Option<&'static str> {
    match addr {
        BROADCAST_ADDR => Some("Broadcast?"),
        0x2001 => Some("Thermostat?"),
        0x4001 => Some("Air Handler?"),
        0x5001 => Some("Outdoor Unit?"),
        _ => None,
    }
}

/// Parse an address given as `0x2001`, `2001h` or decimal `8193`
pub fn parse_address(text: &str) -> Option<u16> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_suffix('h'))
    {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}
