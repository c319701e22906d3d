//! NMEA checksum computation and repair.
//!
//! The firmware emits its high-rate sensor sentences without a checksum to
//! save UART bandwidth. Downstream tooling expects every line to carry one,
//! so those tags are repaired — recompute and append — before generic
//! parsing. The tag list is a device quirk and must not change without a
//! matching firmware release.
//!

use std::borrow::Cow;

/// Tags the device emits without a checksum.
pub const REPAIR_TAGS: [&str; 3] = ["PTMPENV", "PTMPIMU", "PTMPHCK"];

/// XOR checksum over the sentence body, the content between `$` and `*`.
///
#[inline]
pub fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Repair a line whose tag is on the no-checksum list.
///
/// Returns the line untouched when it already carries a `*`, or when the
/// tag is not on the list — unknown garbage stays garbage and is rejected
/// later by the frame parser.
///
pub fn repair_line(line: &str) -> Cow<'_, str> {
    if line.contains('*') || !line.starts_with('$') {
        return Cow::Borrowed(line);
    }
    let body = &line[1..];
    let tag = body.split(',').next().unwrap_or("");
    if REPAIR_TAGS.contains(&tag) {
        let ck = nmea_checksum(body);
        Cow::Owned(format!("{}*{:02X}", line, ck))
    } else {
        Cow::Borrowed(line)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_nmea_checksum() {
        // Canonical example from the NMEA 0183 spec
        assert_eq!(
            0x76,
            nmea_checksum("GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,")
        );
    }

    #[rstest]
    #[case("$PTMPENV,1000,1013.2,350.0,3.91")]
    #[case("$PTMPIMU,1000,0.1,0.2,9.8,0.0,0.0,0.0")]
    #[case("$PTMPHCK,12345")]
    fn test_repair_appends_checksum(#[case] line: &str) {
        let repaired = repair_line(line);
        assert!(repaired.contains('*'));
        let (body, ck) = repaired[1..].split_once('*').unwrap();
        assert_eq!(format!("{:02X}", nmea_checksum(body)), ck);
    }

    #[test]
    fn test_repair_leaves_checksummed_line_alone() {
        let line = "$PTMPENV,1000,1013.2,350.0,3.91*11";
        assert_eq!(line, repair_line(line));
    }

    #[test]
    fn test_repair_ignores_other_tags() {
        let line = "$PTMPDBG,no checksum here";
        assert_eq!(line, repair_line(line));
    }
}
