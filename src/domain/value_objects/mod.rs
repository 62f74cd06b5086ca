//! Value Objects for orders and inventory

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stock counter value object. Never negative by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);
    /// Largest count the storage column holds. Increments stop here.
    pub const MAX: Quantity = Quantity(i32::MAX as u32);

    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other).min(Self::MAX.0)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn covers(&self, requested: u32) -> bool { self.0 >= requested }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A size x color coordinate identifying one variant of a product.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub size: String,
    pub color: String,
}

impl VariantKey {
    pub fn new(size: impl Into<String>, color: impl Into<String>) -> Self {
        Self { size: size.into(), color: color.into() }
    }

    /// Both halves of a selection must be present to address a variant.
    pub fn from_selection(size: Option<&str>, color: Option<&str>) -> Option<Self> {
        match (size, color) {
            (Some(size), Some(color)) if !size.is_empty() && !color.is_empty() => Some(Self::new(size, color)),
            _ => None,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}, {}", self.size, self.color) }
}

/// Human-readable order number: `ORD-<unix millis>-<9 base36 chars>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

impl OrderNumber {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
            .collect();
        Self(format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    /// Wraps a number read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// How the customer intends to pay. Recorded only; nothing is charged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "COD")]
    Cod,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cod => "COD", Self::Online => "Online" }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentMethod {
    type Err = UnknownValue;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::Cod),
            "Online" => Ok(Self::Online),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// A stored enum value that no longer maps onto a known variant.
#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownValue(pub String);
impl std::error::Error for UnknownValue {}
impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown value `{}`", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_subtract_refuses_to_go_negative() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(3), Some(Quantity::ZERO));
        assert_eq!(q.subtract(4), None);
        assert!(q.covers(3));
        assert!(!q.covers(4));
    }

    #[test]
    fn test_quantity_add_stops_at_max() {
        assert_eq!(Quantity::new(3).add(2), Quantity::new(5));
        assert_eq!(Quantity::new(Quantity::MAX.value() - 1).add(5), Quantity::MAX);
        assert_eq!(Quantity::MAX.add(u32::MAX), Quantity::MAX);
    }

    #[test]
    fn test_variant_key_requires_both_halves() {
        assert_eq!(VariantKey::from_selection(Some("M"), Some("Red")), Some(VariantKey::new("M", "Red")));
        assert_eq!(VariantKey::from_selection(Some("M"), None), None);
        assert_eq!(VariantKey::from_selection(Some(""), Some("Red")), None);
    }

    #[test]
    fn test_order_number_format() {
        let number = OrderNumber::generate();
        let parts: Vec<&str> = number.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_order_numbers_differ() {
        assert_ne!(OrderNumber::generate(), OrderNumber::generate());
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"COD\"");
        assert_eq!("Online".parse::<PaymentMethod>().unwrap(), PaymentMethod::Online);
        assert!("Card".parse::<PaymentMethod>().is_err());
    }
}
