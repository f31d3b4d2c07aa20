//! The `Value` type: the tagged union every stack slot, global, field and
//! constant holds.
//!
//! Two interchangeable representations are provided behind the same
//! inherent API, selected at build time:
//!
//! - the default, `tagged`: a plain four-variant Rust enum.
//! - `nan_boxing` (enabled via the `nan_boxing` Cargo feature on this
//!   crate, forwarded the same way the reference workspace forwards its own
//!   `nanbox` feature from `seqc` down into `seq-runtime`): all four variants
//!   packed into the 64 bits of an IEEE-754 double.
//!
//! Whichever is active, `pub use` re-exports a single `Value` type with an
//! identical set of constructors and accessors, so nothing outside this
//! module needs to know which representation is compiled in.

#[cfg(not(feature = "nan_boxing"))]
mod tagged;
#[cfg(feature = "nan_boxing")]
mod nanbox;

#[cfg(not(feature = "nan_boxing"))]
pub use tagged::Value;
#[cfg(feature = "nan_boxing")]
pub use nanbox::Value;

/// Format a number the way `print` does: 15 significant digits (matching the
/// `%.15g` variant named as an open question in the spec — see DESIGN.md),
/// trailing zeros stripped, a bare trailing `.` elided, and `-0` printed as
/// `0`.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Catches both +0.0 and -0.0.
        return "0".to_string();
    }
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    // Round-trip through scientific notation at 15 significant digits to
    // find how many fractional digits a fixed-point rendering needs, then
    // render fixed-point and trim trailing zeros. Equivalent to `%.15g`
    // for the magnitudes this language's numbers realistically take.
    let sci = format!("{n:.14e}");
    let exp: i32 = sci
        .rsplit('e')
        .next()
        .and_then(|e| e.parse().ok())
        .unwrap_or(0);
    let decimals = (14 - exp).clamp(0, 100) as usize;
    let mut s = format!("{n:.decimals$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

#[cfg(test)]
mod format_tests {
    use super::format_number;

    #[test]
    fn strips_trailing_zeros() {
        assert_eq!(format_number(1.2), "1.2");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn seed_scenario_arithmetic() {
        let n = -((1.2 + 3.4) / 5.6);
        assert_eq!(format_number(n), "-0.821428571428571");
    }

    #[test]
    fn large_and_small_magnitudes() {
        assert_eq!(format_number(100000.0), "100000");
        assert_eq!(format_number(0.1), "0.1");
    }
}
