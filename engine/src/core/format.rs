//! Formatting helpers for presenting metrics.

pub fn format_ms(value: f64) -> String {
    format!("{value:.0} ms")
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

pub fn format_level(n_level: usize) -> String {
    format!("{n_level}-back")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_summary_values() {
        assert_eq!(format_ms(412.6), "413 ms");
        assert_eq!(format_percent(0.8), "80%");
        assert_eq!(format_level(2), "2-back");
    }
}
