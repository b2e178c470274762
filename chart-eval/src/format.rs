/// Notation used when rendering a number of bytes as a human-readable
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteNotation {
    /// Powers of 1024: B, KiB, MiB, ...
    Iec,
    /// Powers of 1000: B, KB, MB, ...
    Si,
    /// Bits in powers of 1000: b, kb, Mb, ...
    Bit,
}

const IEC_UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const SI_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB", "EB"];
const BIT_UNITS: &[&str] = &["b", "kb", "Mb", "Gb", "Tb", "Pb", "Eb"];

impl ByteNotation {
    pub fn parse(name: &str) -> Option<ByteNotation> {
        match name {
            "iec" => Some(ByteNotation::Iec),
            "si" => Some(ByteNotation::Si),
            "bit" => Some(ByteNotation::Bit),
            _ => None,
        }
    }

    fn step(&self) -> f64 {
        match self {
            ByteNotation::Iec => 1024.0,
            ByteNotation::Si | ByteNotation::Bit => 1000.0,
        }
    }

    fn units(&self) -> &'static [&'static str] {
        match self {
            ByteNotation::Iec => IEC_UNITS,
            ByteNotation::Si => SI_UNITS,
            ByteNotation::Bit => BIT_UNITS,
        }
    }
}

/// Formats a byte count like `1.5 MiB`, rounded to one decimal place.
pub fn format_bytes(value: f64, notation: ByteNotation) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut scaled = match notation {
        ByteNotation::Bit => value.abs() * 8.0,
        _ => value.abs(),
    };

    let step = notation.step();
    let units = notation.units();
    let mut unit_idx = 0;
    while scaled >= step && unit_idx < units.len() - 1 {
        scaled /= step;
        unit_idx += 1;
    }

    let rounded = (scaled * 10.0).round() / 10.0;
    let number = if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.1}")
    };
    format!("{sign}{number} {}", units[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_iec_units() {
        assert_eq!(format_bytes(0.0, ByteNotation::Iec), "0 B");
        assert_eq!(format_bytes(1024.0, ByteNotation::Iec), "1 KiB");
        assert_eq!(format_bytes(1536.0, ByteNotation::Iec), "1.5 KiB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0, ByteNotation::Iec), "3 MiB");
    }

    #[test]
    fn formats_si_units() {
        assert_eq!(format_bytes(1000.0, ByteNotation::Si), "1 KB");
        assert_eq!(format_bytes(2_500_000.0, ByteNotation::Si), "2.5 MB");
    }

    #[test]
    fn formats_bit_units() {
        assert_eq!(format_bytes(125.0, ByteNotation::Bit), "1 kb");
    }

    #[test]
    fn keeps_sign() {
        assert_eq!(format_bytes(-1024.0, ByteNotation::Iec), "-1 KiB");
    }
}
