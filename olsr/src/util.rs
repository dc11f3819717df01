use std::time::Duration;

/// Largest value of any OLSR sequence number
pub const MAX_SEQ_NUM: u16 = u16::MAX;

/// Scaling factor of the mantissa/exponent time encoding, in seconds
pub const OLSR_C: f64 = 0.0625;

/// Compares whether s1 is newer than s2, taking wraparound into account (RFC 3626, Section 19)
///
/// # Examples
///
/// ```
/// assert!(olsr::util::seq_num_bigger_than(10, 5));
/// assert!(olsr::util::seq_num_bigger_than(5, 65530));
///
/// assert!(!olsr::util::seq_num_bigger_than(65530, 5));
/// assert!(!olsr::util::seq_num_bigger_than(7, 7));
/// ```
pub fn seq_num_bigger_than(s1: u16, s2: u16) -> bool {
    let half = MAX_SEQ_NUM / 2;
    (s1 > s2 && s1 - s2 <= half) || (s2 > s1 && s2 - s1 > half)
}

/// Shortcut for increment mod 2^16
pub fn increment(x: &mut u16) {
    *x = x.overflowing_add(1).0
}

/// Finds the exponent b such that 2^b <= seconds / C < 2^(b+1), stopping at 16 since larger values are clamped anyway
fn exponent(seconds: f64) -> i32 {
    let ratio = seconds / OLSR_C;
    let mut b = 0;
    while b <= 16 && ratio >= 2f64.powi(b) {
        b += 1;
    }
    b - 1
}

/// Encodes a duration into the 8 bit mantissa/exponent format of RFC 3626, Section 18.3
///
/// The high nibble holds the mantissa a and the low nibble the exponent b, so that the value is
/// `C * (1 + a/16) * 2^b`. Values below C and above the largest representable value are clamped.
///
/// # Examples
///
/// ```
/// assert_eq!(olsr::util::seconds_to_emf(2.0), 0x05);
/// assert_eq!(olsr::util::seconds_to_emf(6.0), 0x86);
/// ```
pub fn seconds_to_emf(seconds: f64) -> u8 {
    let mut b = exponent(seconds);
    let mut a;
    if b < 0 {
        a = 1;
        b = 0;
    } else if b > 15 {
        a = 15;
        b = 15;
    } else {
        a = (16.0 * (seconds / (OLSR_C * 2f64.powi(b)) - 1.0)) as i32;
        while a >= 16 {
            a -= 16;
            b += 1;
        }
        if b > 15 {
            a = 15;
            b = 15;
        }
    }
    (a * 16 + b) as u8
}

/// Decodes the mantissa/exponent format back to seconds
///
/// # Examples
///
/// ```
/// assert_eq!(olsr::util::emf_to_seconds(0x05), 2.0);
/// assert_eq!(olsr::util::emf_to_seconds(0x86), 6.0);
/// ```
pub fn emf_to_seconds(emf: u8) -> f64 {
    let a = (emf >> 4) as f64;
    let b = (emf & 0x0f) as i32;
    OLSR_C * (1.0 + a / 16.0) * 2f64.powi(b)
}

/// Distance between two neighbouring encodable values around `seconds`
pub fn one_step(seconds: f64) -> f64 {
    let b = exponent(seconds).clamp(0, 15);
    OLSR_C * 2f64.powi(b) / 16.0
}

pub fn duration_to_emf(duration: Duration) -> u8 {
    seconds_to_emf(duration.as_secs_f64())
}

pub fn emf_to_duration(emf: u8) -> Duration {
    Duration::from_secs_f64(emf_to_seconds(emf))
}
