/// One mebibyte, the alignment unit for every computed volume size (spec.md §8 invariant 8)
pub const MIB: i64 = 1024 * 1024;

/// Given a desired usable image size and a filesystem overhead fraction, compute the PVC size
/// that must be requested so that, after the filesystem reserves `overhead` of the volume,
/// `size` usable bytes remain. Spec.md §8 invariant 8: for `size >= 1 MiB` the *actual* overhead
/// recovered from the result (`1 - size/result`) must be within 0.01 of `overhead`, and the
/// result itself must be 1 MiB aligned.
#[must_use]
pub fn get_required_space(overhead: f64, size: i64) -> i64 {
    if size <= 0 {
        return 0;
    }
    let usable_fraction = (1.0 - overhead).max(f64::EPSILON);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let required = (size as f64 / usable_fraction).ceil() as i64;
    align_up(required, MIB)
}

/// Round `value` up to the next multiple of `unit`
#[must_use]
pub fn align_up(value: i64, unit: i64) -> i64 {
    if unit <= 0 {
        return value;
    }
    let remainder = value % unit;
    if remainder == 0 {
        value
    } else {
        value + (unit - remainder)
    }
}

/// Binary (power-of-1024) suffixes a Kubernetes `Quantity` string may carry
const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

/// Decimal (power-of-1000) suffixes a Kubernetes `Quantity` string may carry
const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("k", 1000.0),
    ("M", 1_000_000.0),
    ("G", 1_000_000_000.0),
    ("T", 1_000_000_000_000.0),
];

/// Parse a Kubernetes `Quantity` string (e.g. `"500Mi"`, `"2Gi"`, `"10G"`, a bare byte count) into
/// a byte count. Returns `None` on a suffix this reconciler doesn't recognize; callers treat that
/// the same as a missing size rather than guessing.
#[must_use]
pub fn parse_quantity(value: &str) -> Option<i64> {
    let value = value.trim();
    for (suffix, unit) in BINARY_SUFFIXES.iter().chain(DECIMAL_SUFFIXES) {
        if let Some(number) = value.strip_suffix(suffix) {
            let parsed: f64 = number.trim().parse().ok()?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            return Some((parsed * unit).round() as i64);
        }
    }
    value.parse().ok()
}
