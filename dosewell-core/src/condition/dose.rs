use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use ordered_float::OrderedFloat;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::UserError;

/// A concentration: magnitude in the unit it was authored with.
///
/// Comparisons, ordering, and hashing all go through the micromolar
/// normalization, so `1mM` and `1000μM` are the same concentration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Concentration {
    value: f64,
    unit: String,
}

impl Concentration {
    pub fn new(value: f64, unit: &str) -> Self {
        Concentration { value, unit: unit.to_string() }
    }

    /// A concentration of zero with no unit (undosed / control wells).
    pub fn none() -> Self {
        Concentration { value: 0.0, unit: String::new() }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Magnitude normalized to micromolar. Unitless magnitudes pass through
    /// unchanged (symbolic/abbreviated labels carry their own scale).
    pub fn micromolar(&self) -> f64 {
        let multiplier = match self.unit.as_str() {
            "nM" => 1e-3,
            "mM" => 1e3,
            "M" => 1e6,
            // μM, uM, and unitless
            _ => 1.0,
        };
        self.value * multiplier
    }
}

impl PartialEq for Concentration {
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.micromolar()) == OrderedFloat(other.micromolar())
    }
}

impl Eq for Concentration {}

impl PartialOrd for Concentration {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Concentration {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        OrderedFloat(self.micromolar()).cmp(&OrderedFloat(other.micromolar()))
    }
}

impl Hash for Concentration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        OrderedFloat(self.micromolar()).hash(state);
    }
}

impl Display for Concentration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == self.value.trunc() && self.value.abs() < 1e15 {
            write!(f, "{:.0}{}", self.value, self.unit)
        } else {
            write!(f, "{}{}", self.value, self.unit)
        }
    }
}

/// One (drug, concentration) pair parsed from a dose token.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dose {
    pub drug: String,
    pub concentration: Concentration,
}

fn dose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*([A-Za-z][A-Za-z'_-]*(?:\s+[A-Za-z][A-Za-z'_-]*)*)\s*(\d+(?:\.\d+)?)?\s*([uμnm]?M)?\s*$",
        )
        .expect("valid dose regex")
    })
}

impl Dose {
    /// Parse one dose token, e.g. `Gent 100μM`, `Neomycin 2.5mM`, or a bare
    /// control label like `B`. A symbolic token (e.g. `ABC50`) should be run
    /// through the conversion table before it reaches this parser; without a
    /// conversion it parses as drug `ABC` at unitless magnitude 50.
    pub fn parse(token: &str) -> Result<Dose, UserError> {
        let caps = dose_re().captures(token).ok_or_else(|| UserError::MalformedLabel {
            label: token.to_string(),
            reason: "expected `<drug> [<magnitude>[<unit>]]`".to_string(),
        })?;
        let drug = caps[1].trim().to_string();
        let concentration = match caps.get(2) {
            Some(mag) => {
                let value = mag.as_str().parse::<f64>().map_err(|e| UserError::MalformedLabel {
                    label: token.to_string(),
                    reason: e.to_string(),
                })?;
                let unit = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                Concentration::new(value, unit)
            }
            None => Concentration::none(),
        };
        Ok(Dose { drug, concentration })
    }

    pub fn micromolar(&self) -> f64 {
        self.concentration.micromolar()
    }

    pub fn is_dosed(&self) -> bool {
        self.concentration.value() != 0.0
    }
}

impl Display for Dose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dosed() {
            write!(f, "{} {}", self.drug, self.concentration)
        } else {
            write!(f, "{}", self.drug)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parse_literal_with_unit() {
        let dose = Dose::parse("Gent 100μM").unwrap();
        assert_eq!(dose.drug, "Gent");
        assert_relative_eq!(dose.concentration.value(), 100.0);
        assert_eq!(dose.concentration.unit(), "μM");
        assert_relative_eq!(dose.micromolar(), 100.0);
    }

    #[test]
    fn parse_control_label() {
        let dose = Dose::parse("B").unwrap();
        assert_eq!(dose.drug, "B");
        assert!(!dose.is_dosed());
        assert_eq!(dose.to_string(), "B");
    }

    #[test]
    fn parse_attached_magnitude() {
        // Unconverted symbolic form: name runs straight into digits.
        let dose = Dose::parse("ABC50").unwrap();
        assert_eq!(dose.drug, "ABC");
        assert_relative_eq!(dose.concentration.value(), 50.0);
        assert_eq!(dose.concentration.unit(), "");
    }

    #[test]
    fn units_normalize_for_equality() {
        let a = Dose::parse("Gent 1mM").unwrap();
        let b = Dose::parse("Gent 1000μM").unwrap();
        let c = Dose::parse("Gent 1000000nM").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_relative_eq!(a.micromolar(), 1000.0);
    }

    #[test]
    fn ordering_by_concentration() {
        let low = Dose::parse("Gent 10μM").unwrap();
        let high = Dose::parse("Gent 1mM").unwrap();
        assert!(low < high);
    }

    #[test]
    fn malformed_token_is_user_error() {
        let err = Dose::parse("123garbage+").unwrap_err();
        assert!(matches!(err, UserError::MalformedLabel { .. }));
        assert!(err.to_string().contains("123garbage"));
    }

    #[test]
    fn decimal_magnitude_display() {
        let dose = Dose::parse("Neo 2.5mM").unwrap();
        assert_eq!(dose.to_string(), "Neo 2.5mM");
        let whole = Dose::parse("Neo 10mM").unwrap();
        assert_eq!(whole.to_string(), "Neo 10mM");
    }
}
