use std::fmt;

const DECIMAL_SUFFIXES: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];
const BINARY_SUFFIXES: [&str; 9] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];

/// Wraps a number of seconds for `MM:SS` / `H:MM:SS` formatting.
///
/// Hours are unbounded, so 66 hours render as `66:08:33`. Negative and
/// non-finite inputs render as `00:00`.
#[derive(Debug, Clone, Copy)]
pub struct FormattedInterval(pub f64);

impl fmt::Display for FormattedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // saturating cast: NaN and negatives become 0
        let t = self.0 as u64;
        let (minutes, seconds) = (t / 60, t % 60);
        let (hours, minutes) = (minutes / 60, minutes % 60);
        if hours > 0 {
            write!(f, "{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            write!(f, "{:02}:{:02}", minutes, seconds)
        }
    }
}

/// Formats a number of seconds as `MM:SS`, or `H:MM:SS` past the hour.
pub fn format_interval(secs: f64) -> String {
    FormattedInterval(secs).to_string()
}

/// Scales `num` by `divisor` until its magnitude drops below 999.5.
///
/// Returns the scaled value and its prefix. A divisor of 1024 selects the
/// binary prefixes (`Ki`, `Mi`, ...), anything else the decimal ones. Values
/// beyond the largest prefix keep their `Y`/`Yi` suffix.
pub fn scale_si(num: f64, divisor: u32) -> (f64, &'static str) {
    let suffixes = if divisor == 1024 {
        &BINARY_SUFFIXES
    } else {
        &DECIMAL_SUFFIXES
    };
    let divisor = f64::from(divisor.max(2));
    let (last, rest) = suffixes.split_last().unwrap_or((&"", &[]));

    let mut num = num;
    for suffix in rest {
        if num.abs() < 999.5 {
            return (num, suffix);
        }
        num /= divisor;
    }
    (num, last)
}

/// A magnitude with its SI prefix, formatted with 2, 1 or 0 decimals
/// depending on how many integer digits it has.
#[derive(Debug, Clone, Copy)]
pub struct SizeOf {
    pub value: f64,
    pub suffix: &'static str,
}

impl SizeOf {
    pub fn new(num: f64, divisor: u32) -> SizeOf {
        let (value, suffix) = scale_si(num, divisor);
        SizeOf { value, suffix }
    }
}

impl fmt::Display for SizeOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.value.abs();
        let precision = if abs < 9.995 {
            2
        } else if abs < 99.95 {
            1
        } else {
            0
        };
        write!(f, "{:.*}{}", precision, self.value, self.suffix)
    }
}

/// Formats `num` with an SI (or IEC when `divisor == 1024`) prefix.
///
/// ```
/// assert_eq!(progmeter::format_sizeof(1_234_567.0, 1000), "1.23M");
/// assert_eq!(progmeter::format_sizeof(2048.0, 1024), "2.00Ki");
/// ```
pub fn format_sizeof(num: f64, divisor: u32) -> String {
    SizeOf::new(num, divisor).to_string()
}

/// Formats a count: integral values without a fraction, others as-is.
pub fn format_count(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Formats a number in the most compact of its plain and exponential forms.
///
/// Integral values print as integers. Everything else uses the shorter of
/// the plain representation and a 3-significant-digit general form with
/// exponents written as `1.23e-5` / `4.56e+7`.
pub fn format_num(n: f64) -> String {
    let plain = format_count(n);
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return plain;
    }
    let general = format_general(n, 3);
    if general.len() < plain.len() {
        general
    } else {
        plain
    }
}

/// Equivalent of printf's `%.{precision}g`, with the exponent's leading
/// zeros stripped.
fn format_general(x: f64, precision: usize) -> String {
    if x == 0.0 || !x.is_finite() {
        return format!("{}", x);
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_owned()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Formats a completion fraction as a right-aligned percentage.
///
/// The fraction is clamped into `[0, 1]`; `precision` is the number of
/// decimals, `format_percentage(0.231, 0)` gives `" 23%"`.
pub fn format_percentage(frac: f64, precision: usize) -> String {
    let frac = if frac.is_nan() { 0.0 } else { frac.clamp(0.0, 1.0) };
    format!("{:3.*}%", precision, frac * 100.0)
}

/// Formats a rate in items per second.
///
/// Positive rates below one item per second are inverted to seconds per
/// item (`1.70s/it`). An unknown or zero rate renders as `?it/s`. With
/// `unit_scale` the value gets an SI prefix instead of a fixed 5.2 layout.
pub fn format_rate(rate: Option<f64>, unit: &str, unit_scale: bool) -> String {
    match rate.filter(|r| r.is_finite() && *r != 0.0) {
        Some(rate) if rate > 0.0 && rate < 1.0 => {
            format!("{}s/{}", format_rate_value(1.0 / rate, unit_scale), unit)
        }
        Some(rate) => format!("{}{}/s", format_rate_value(rate, unit_scale), unit),
        None => format!("?{}/s", unit),
    }
}

pub(crate) fn format_rate_value(value: f64, unit_scale: bool) -> String {
    if unit_scale {
        format_sizeof(value, 1000)
    } else {
        format!("{:5.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_minutes_and_hours() {
        assert_eq!(format_interval(0.0), "00:00");
        assert_eq!(format_interval(59.9), "00:59");
        assert_eq!(format_interval(60.0), "01:00");
        assert_eq!(format_interval(392.0), "06:32");
        assert_eq!(format_interval(3599.0), "59:59");
        assert_eq!(format_interval(3600.0), "1:00:00");
        assert_eq!(format_interval(6160.0), "1:42:40");
        assert_eq!(format_interval(238113.0), "66:08:33");
    }

    #[test]
    fn interval_degenerate_input() {
        assert_eq!(format_interval(-5.0), "00:00");
        assert_eq!(format_interval(f64::NAN), "00:00");
    }

    #[test]
    fn sizeof_precision_bands() {
        assert_eq!(format_sizeof(9.0, 1000), "9.00");
        assert_eq!(format_sizeof(99.0, 1000), "99.0");
        assert_eq!(format_sizeof(999.0, 1000), "999");
        assert_eq!(format_sizeof(999.4, 1000), "999");
        assert_eq!(format_sizeof(999.5, 1000), "1.00K");
        assert_eq!(format_sizeof(1000.0, 1000), "1.00K");
        assert_eq!(format_sizeof(10_000.0, 1000), "10.0K");
        assert_eq!(format_sizeof(100_000.0, 1000), "100K");
        assert_eq!(format_sizeof(1e9, 1000), "1.00G");
        assert_eq!(format_sizeof(-1500.0, 1000), "-1.50K");
    }

    #[test]
    fn sizeof_binary_prefixes() {
        assert_eq!(format_sizeof(1024.0, 1024), "1.00Ki");
        assert_eq!(format_sizeof(1536.0 * 1024.0, 1024), "1.50Mi");
        assert_eq!(scale_si(3.0 * 1024f64.powi(3), 1024), (3.0, "Gi"));
    }

    #[test]
    fn sizeof_beyond_largest_prefix() {
        let (value, suffix) = scale_si(5e27, 1000);
        assert_eq!(suffix, "Y");
        assert!((value - 5000.0).abs() < 1e-6);
        assert_eq!(format_sizeof(5e27, 1000), "5000Y");
    }

    #[test]
    fn sizeof_parses_back_within_precision() {
        for &(num, divisor) in &[
            (1.0, 1000u32),
            (12.345, 1000),
            (5_432.1, 1000),
            (987_654.0, 1000),
            (3.3e10, 1000),
            (70_000.0, 1024),
            (5.5e12, 1024),
        ] {
            let formatted = format_sizeof(num, divisor);
            let suffixes: &[&str] = if divisor == 1024 {
                &BINARY_SUFFIXES
            } else {
                &DECIMAL_SUFFIXES
            };
            let (power, suffix) = suffixes
                .iter()
                .enumerate()
                .rev()
                .find(|(_, s)| !s.is_empty() && formatted.ends_with(*s))
                .unwrap_or((0, &""));
            let digits = &formatted[..formatted.len() - suffix.len()];
            let decimals = digits.split_once('.').map_or(0, |(_, d)| d.len());
            let scale = f64::from(divisor).powi(power as i32);
            let parsed: f64 = digits.parse().unwrap();
            let tolerance = 0.5 * 10f64.powi(-(decimals as i32)) * scale;
            assert!(
                (parsed * scale - num).abs() <= tolerance + 1e-9,
                "{} -> {} does not round-trip",
                num,
                formatted
            );
        }
    }

    #[test]
    fn num_compact_forms() {
        assert_eq!(format_num(1337.0), "1337");
        assert_eq!(format_num(1e6), "1000000");
        assert_eq!(format_num(0.00001234), "1.23e-5");
        assert_eq!(format_num(-0.1234), "-0.123");
        assert_eq!(format_num(0.5), "0.5");
        assert_eq!(format_num(2.5e20), "2.5e+20");
        assert_eq!(format_num(123456.789), "1.23e+5");
    }

    #[test]
    fn count_integral_and_fractional() {
        assert_eq!(format_count(231.0), "231");
        assert_eq!(format_count(-3.0), "-3");
        assert_eq!(format_count(2.5), "2.5");
    }

    #[test]
    fn percentage_is_clamped_and_padded() {
        assert_eq!(format_percentage(0.231, 0), " 23%");
        assert_eq!(format_percentage(1.0, 0), "100%");
        assert_eq!(format_percentage(1.7, 0), "100%");
        assert_eq!(format_percentage(-0.5, 0), "  0%");
        assert_eq!(format_percentage(0.5, 1), "50.0%");
    }

    #[test]
    fn rate_inversion_below_one() {
        assert_eq!(format_rate(Some(1.0 / 1.7), "it", false), " 1.70s/it");
        assert_eq!(format_rate(Some(1.0), "it", false), " 1.00it/s");
        assert_eq!(format_rate(Some(12.5), "B", false), "12.50B/s");
        assert_eq!(format_rate(Some(2_500_000.0), "B", true), "2.50MB/s");
        assert_eq!(format_rate(None, "it", false), "?it/s");
        assert_eq!(format_rate(Some(0.0), "it", false), "?it/s");
        assert_eq!(format_rate(Some(-0.5), "it", false), "-0.50it/s");
    }
}
