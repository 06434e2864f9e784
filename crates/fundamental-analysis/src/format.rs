/// Scale a magnitude to a "B"/"M" suffixed string for display. Values below
/// one million are printed as-is.
pub fn format_large_number(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.4}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.4}M", value / 1e6)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_large_number() {
        assert_eq!(format_large_number(386_000_000_000.0), "386.0000B");
        assert_eq!(format_large_number(-2_500_000.0), "-2.5000M");
        assert_eq!(format_large_number(1_234_567_890.0), "1.2346B");
        assert_eq!(format_large_number(999.5), "999.5");
    }
}
