use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeError {
    /// The series was too short to supply the reference close.
    MissingReference,
    ZeroReference,
    /// An input or the result was NaN or infinite.
    NonFinite,
}

impl fmt::Display for ChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReference => f.write_str("reference price unavailable"),
            Self::ZeroReference => f.write_str("reference price is zero"),
            Self::NonFinite => f.write_str("price change is not a finite number"),
        }
    }
}

impl std::error::Error for ChangeError {}

/// Percentage change from `reference` to `current`, unrounded.
pub fn percent_change(current: f64, reference: f64) -> Result<f64, ChangeError> {
    if !current.is_finite() || !reference.is_finite() {
        return Err(ChangeError::NonFinite);
    }
    if reference == 0.0 {
        return Err(ChangeError::ZeroReference);
    }

    let pct = (current - reference) / reference * 100.0;
    if !pct.is_finite() {
        return Err(ChangeError::NonFinite);
    }
    Ok(pct)
}

pub fn percent_change_from(current: f64, reference: Option<f64>) -> Result<f64, ChangeError> {
    let reference = reference.ok_or(ChangeError::MissingReference)?;
    percent_change(current, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_formula_within_epsilon() {
        let cases = [(90.0, 100.0), (123.45, 120.01), (0.5, 2.0), (250.0, 125.0)];
        for (current, reference) in cases {
            let got = percent_change(current, reference).unwrap();
            let want = (current - reference) / reference * 100.0;
            assert!((got - want).abs() < 1e-9, "{current}/{reference}: {got} != {want}");
        }
    }

    #[test]
    fn ten_percent_drop() {
        let got = percent_change(90.0, 100.0).unwrap();
        assert!((got - -10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_reference_is_an_error() {
        assert_eq!(percent_change(10.0, 0.0), Err(ChangeError::ZeroReference));
        assert_eq!(percent_change(10.0, -0.0), Err(ChangeError::ZeroReference));
    }

    #[test]
    fn nan_inputs_are_reported_not_propagated() {
        assert_eq!(percent_change(f64::NAN, 100.0), Err(ChangeError::NonFinite));
        assert_eq!(percent_change(100.0, f64::NAN), Err(ChangeError::NonFinite));
        assert_eq!(
            percent_change(f64::INFINITY, 100.0),
            Err(ChangeError::NonFinite)
        );
    }

    #[test]
    fn overflowing_result_is_non_finite() {
        assert_eq!(
            percent_change(f64::MAX, f64::MIN_POSITIVE),
            Err(ChangeError::NonFinite)
        );
    }

    #[test]
    fn missing_reference() {
        assert_eq!(
            percent_change_from(10.0, None),
            Err(ChangeError::MissingReference)
        );
        assert!(percent_change_from(10.0, Some(5.0)).is_ok());
    }
}
