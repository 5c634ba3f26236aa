//! Subcommand implementations

pub mod analyze;
pub mod capture;
pub mod probe;
pub mod replay;

use cl2_protocol::{parse_address, ChecksumKind};

/// Parse a bus address given as `0x2001`, `2001h` or decimal
pub fn address_arg(text: &str) -> Result<u16, String> {
    parse_address(text).ok_or_else(|| format!("invalid address '{}'", text))
}

/// Parse a checksum hypothesis name
pub fn checksum_arg(text: &str) -> Result<ChecksumKind, String> {
    ChecksumKind::from_name(text).ok_or_else(|| {
        format!(
            "unknown checksum '{}': expected unverified, sum16, crc16-ccitt, crc16-arc, crc16-modbus or fletcher16",
            text
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn address_arg_accepts_every_spelling(addr in any::<u16>()) {
            prop_assert_eq!(address_arg(&format!("0x{:04X}", addr)), Ok(addr));
            prop_assert_eq!(address_arg(&format!("0x{:x}", addr)), Ok(addr));
            prop_assert_eq!(address_arg(&format!("{:04X}h", addr)), Ok(addr));
            prop_assert_eq!(address_arg(&addr.to_string()), Ok(addr));
        }

        #[test]
        fn address_arg_rejects_out_of_range(value in 0x1_0000u32..) {
            prop_assert!(address_arg(&value.to_string()).is_err());
            let hex = format!("0x{:X}", value);
            prop_assert!(address_arg(&hex).is_err());
        }
    }

    #[test]
    fn test_address_arg() {
        assert_eq!(address_arg("0x2001"), Ok(0x2001));
        assert_eq!(address_arg("8193"), Ok(0x2001));
        assert!(address_arg("nope").is_err());
    }

    #[test]
    fn test_checksum_arg() {
        assert_eq!(checksum_arg("crc16-modbus"), Ok(ChecksumKind::Crc16Modbus));
        assert!(checksum_arg("md5").is_err());
    }
}
