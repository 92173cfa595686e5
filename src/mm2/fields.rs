//! Field assembly from decoded bits and trits

use super::types::{FrameKind, Trit};

/// Raw-export byte used where a field has no value on this frame kind.
const RAW_UNSET: u8 = 0xFF;

/// Reconstruct the address from the first four trits as a base-3 number,
/// trit 3 most significant. The result is always in 0..=80.
pub fn address(trits: &[Trit]) -> u8 {
    trits[3].value() * 27 + trits[2].value() * 9 + trits[1].value() * 3 + trits[0].value()
}

/// Raw 4-bit speed step from bits 10, 12, 14 and 16 (bit 10 least
/// significant). Feed the result through `SpeedCommand::from_step`.
pub fn speed_step(bits: &[u8]) -> u8 {
    bits[10] + bits[12] * 2 + bits[14] * 4 + bits[16] * 8
}

/// Export bytes for the binary passthrough channel: address, the
/// kind/function byte and the raw step. The payload was never pinned down
/// upstream; accessory frames export `0xFF` for the fields they don't carry.
pub fn raw_export(address: u8, kind: FrameKind, function: Option<Trit>, step: Option<u8>) -> [u8; 3] {
    match kind {
        FrameKind::Accessory => [address, RAW_UNSET, RAW_UNSET],
        FrameKind::Locomotive => [
            address,
            function.map(Trit::value).unwrap_or(RAW_UNSET),
            step.unwrap_or(RAW_UNSET),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_zero() {
        let trits = [Trit::Zero; 9];
        assert_eq!(address(&trits), 0);
    }

    #[test]
    fn test_address_max_is_80() {
        let trits = [Trit::Open; 9];
        assert_eq!(address(&trits), 80);
    }

    #[test]
    fn test_address_42() {
        // 42 = 1*27 + 1*9 + 2*3 + 0, so trits low-to-high are [0, 2, 1, 1].
        let trits = [
            Trit::Zero,
            Trit::Open,
            Trit::One,
            Trit::One,
            Trit::Zero,
            Trit::Zero,
            Trit::Zero,
            Trit::Zero,
            Trit::Zero,
        ];
        assert_eq!(address(&trits), 42);
    }

    #[test]
    fn test_speed_step_weights() {
        let mut bits = [0u8; 18];
        bits[10] = 1;
        assert_eq!(speed_step(&bits), 1);
        bits[12] = 1;
        assert_eq!(speed_step(&bits), 3);
        bits[14] = 1;
        bits[16] = 1;
        assert_eq!(speed_step(&bits), 15);
    }

    #[test]
    fn test_raw_export_locomotive() {
        let raw = raw_export(42, FrameKind::Locomotive, Some(Trit::One), Some(5));
        assert_eq!(raw, [42, 1, 5]);
    }

    #[test]
    fn test_raw_export_accessory_placeholder() {
        let raw = raw_export(12, FrameKind::Accessory, None, None);
        assert_eq!(raw, [12, 0xFF, 0xFF]);
    }
}
