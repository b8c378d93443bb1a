//! Internal part number (IPN) codec.
//!
//! # Responsibility
//! - Parse, validate and construct `CCC-NNN-VVVV` identifiers.
//! - Classify identifier categories as owned parts, owned assemblies with
//!   their own BOM, or bought-out parts.
//!
//! # Invariants
//! - An `Ipn` value only exists after passing `Ipn::parse` or `Ipn::from_parts`.
//! - Equality and ordering are exact-string comparisons of the IPN text.
//! - The sub-BOM category set is always a subset of the owned category set.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static IPN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{3})-([0-9]{3})-([0-9]{4})$").expect("valid ipn regex"));
static CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid category regex"));

const MAX_NUMBER: i32 = 999;
const MAX_VARIANT: i32 = 9999;

/// Categories for parts designed in-house.
pub const DEFAULT_OWNED_CATEGORIES: &[&str] =
    &["PCA", "PCB", "ASY", "DOC", "DFW", "DSW", "DCL", "FIX"];
/// Owned categories that carry their own BOM.
pub const DEFAULT_SUB_BOM_CATEGORIES: &[&str] = &["PCA", "ASY"];

/// Validated internal part number.
///
/// Field order matters: derived ordering compares `text` first, which keeps
/// ordering identical to plain string comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipn {
    text: String,
    category: String,
    number: u16,
    variant: u16,
}

impl Ipn {
    /// Parses `CCC-NNN-VVVV`.
    ///
    /// # Errors
    /// - `IpnError::InvalidSyntax` when the text does not match the grammar
    ///   exactly (no trimming, no lowercase).
    pub fn parse(value: &str) -> Result<Self, IpnError> {
        let invalid = || IpnError::InvalidSyntax(value.to_string());
        let captures = IPN_RE.captures(value).ok_or_else(invalid)?;

        let number = captures[2].parse::<u16>().map_err(|_| invalid())?;
        let variant = captures[3].parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            text: value.to_string(),
            category: captures[1].to_string(),
            number,
            variant,
        })
    }

    /// Builds an IPN from its parts, zero padding number and variant.
    ///
    /// # Errors
    /// - `NumberOutOfRange` unless `0 <= number <= 999`.
    /// - `VariantOutOfRange` unless `0 <= variant <= 9999`.
    /// - `InvalidCategory` unless `category` is exactly 3 uppercase ASCII letters.
    pub fn from_parts(category: &str, number: i32, variant: i32) -> Result<Self, IpnError> {
        if !(0..=MAX_NUMBER).contains(&number) {
            return Err(IpnError::NumberOutOfRange(number));
        }
        if !(0..=MAX_VARIANT).contains(&variant) {
            return Err(IpnError::VariantOutOfRange(variant));
        }
        validate_category(category)?;

        Self::parse(&format!("{category}-{number:03}-{variant:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns `(category, number, variant)`.
    pub fn parts(&self) -> (&str, u16, u16) {
        (&self.category, self.number, self.variant)
    }

    /// `CCC-NNN` without the variant; design-tool files are stored under this name.
    pub fn base(&self) -> String {
        format!("{}-{:03}", self.category, self.number)
    }
}

impl Display for Ipn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Ipn {
    type Err = IpnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ipn {
    type Error = IpnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ipn> for String {
    fn from(value: Ipn) -> Self {
        value.text
    }
}

impl AsRef<str> for Ipn {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Category classification of an IPN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpnClass {
    /// Designed in-house, released as a package, no BOM of its own.
    OwnedPart,
    /// Designed in-house and carries its own BOM. Also owned.
    HasSubBom,
    /// Bought-out part.
    Other,
}

impl IpnClass {
    /// Whether a release package must exist for this class.
    pub fn is_owned(self) -> bool {
        matches!(self, Self::OwnedPart | Self::HasSubBom)
    }

    pub fn has_sub_bom(self) -> bool {
        self == Self::HasSubBom
    }
}

/// Immutable category configuration used to classify identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpnCodec {
    owned: BTreeSet<String>,
    sub_bom: BTreeSet<String>,
}

impl IpnCodec {
    /// Creates a codec from owned and sub-BOM category sets.
    ///
    /// # Errors
    /// - `InvalidCategory` when any entry is not 3 uppercase letters.
    /// - `CategoryNotOwned` when a sub-BOM category is missing from the owned set.
    pub fn new<O, S>(owned: O, sub_bom: S) -> Result<Self, IpnError>
    where
        O: IntoIterator,
        O::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let owned = collect_categories(owned)?;
        let sub_bom = collect_categories(sub_bom)?;

        if let Some(stray) = sub_bom.iter().find(|category| !owned.contains(*category)) {
            return Err(IpnError::CategoryNotOwned(stray.clone()));
        }

        Ok(Self { owned, sub_bom })
    }

    /// Classifies a category code. Unknown or malformed categories are `Other`.
    pub fn classify(&self, category: &str) -> IpnClass {
        if self.sub_bom.contains(category) {
            IpnClass::HasSubBom
        } else if self.owned.contains(category) {
            IpnClass::OwnedPart
        } else {
            IpnClass::Other
        }
    }

    pub fn classify_ipn(&self, ipn: &Ipn) -> IpnClass {
        self.classify(ipn.category())
    }

    /// Classifies raw line text; text that is not a valid IPN is `Other`.
    pub fn classify_text(&self, value: &str) -> IpnClass {
        match Ipn::parse(value) {
            Ok(ipn) => self.classify_ipn(&ipn),
            Err(_) => IpnClass::Other,
        }
    }
}

impl Default for IpnCodec {
    fn default() -> Self {
        Self {
            owned: DEFAULT_OWNED_CATEGORIES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            sub_bom: DEFAULT_SUB_BOM_CATEGORIES
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

fn collect_categories<I>(values: I) -> Result<BTreeSet<String>, IpnError>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut categories = BTreeSet::new();
    for value in values {
        let value = value.into();
        validate_category(&value)?;
        categories.insert(value);
    }
    Ok(categories)
}

fn validate_category(category: &str) -> Result<(), IpnError> {
    if CATEGORY_RE.is_match(category) {
        Ok(())
    } else {
        Err(IpnError::InvalidCategory(category.to_string()))
    }
}

/// Identifier syntax and range errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpnError {
    InvalidSyntax(String),
    NumberOutOfRange(i32),
    VariantOutOfRange(i32),
    InvalidCategory(String),
    /// Sub-BOM category configured without being owned.
    CategoryNotOwned(String),
}

impl IpnError {
    /// Whether this is a construction range error rather than a syntax error.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            Self::NumberOutOfRange(_) | Self::VariantOutOfRange(_) | Self::InvalidCategory(_)
        )
    }
}

impl Display for IpnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSyntax(value) => {
                write!(f, "invalid IPN `{value}`, expected CCC-NNN-VVVV")
            }
            Self::NumberOutOfRange(value) => {
                write!(f, "IPN number {value} out of range 0..=999")
            }
            Self::VariantOutOfRange(value) => {
                write!(f, "IPN variant {value} out of range 0..=9999")
            }
            Self::InvalidCategory(value) => {
                write!(f, "IPN category `{value}` must be 3 uppercase letters")
            }
            Self::CategoryNotOwned(value) => {
                write!(f, "sub-BOM category `{value}` is not an owned category")
            }
        }
    }
}

impl Error for IpnError {}

#[cfg(test)]
mod tests {
    use super::{Ipn, IpnClass, IpnCodec, IpnError};

    #[test]
    fn parse_splits_parts() {
        let ipn = Ipn::parse("PCB-019-0003").expect("valid ipn");
        assert_eq!(ipn.parts(), ("PCB", 19, 3));
        assert_eq!(ipn.base(), "PCB-019");
        assert_eq!(ipn.to_string(), "PCB-019-0003");
    }

    #[test]
    fn parse_rejects_near_misses() {
        for value in [
            "",
            "pcb-019-0003",
            "PCB-19-0003",
            "PCB-019-003",
            "PCB-019-00030",
            " PCB-019-0003",
            "PCB-019-0003 ",
            "PC1-019-0003",
            "PCB_019_0003",
            "PCB-٠١٢-0003",
        ] {
            assert!(
                matches!(Ipn::parse(value), Err(IpnError::InvalidSyntax(_))),
                "`{value}` should be rejected"
            );
        }
    }

    #[test]
    fn from_parts_pads_and_checks_ranges() {
        let ipn = Ipn::from_parts("CAP", 1, 2).expect("valid parts");
        assert_eq!(ipn.as_str(), "CAP-001-0002");

        assert_eq!(
            Ipn::from_parts("CAP", 1000, 0),
            Err(IpnError::NumberOutOfRange(1000))
        );
        assert_eq!(
            Ipn::from_parts("CAP", -1, 0),
            Err(IpnError::NumberOutOfRange(-1))
        );
        assert_eq!(
            Ipn::from_parts("CAP", 0, 10000),
            Err(IpnError::VariantOutOfRange(10000))
        );
        let err = Ipn::from_parts("CA", 0, 0).unwrap_err();
        assert_eq!(err, IpnError::InvalidCategory("CA".to_string()));
        assert!(err.is_range_error());
        assert!(Ipn::from_parts("Cap", 0, 0).is_err());
    }

    #[test]
    fn ordering_is_string_ordering() {
        let mut values = vec![
            Ipn::parse("RES-010-0001").unwrap(),
            Ipn::parse("CAP-002-0001").unwrap(),
            Ipn::parse("CAP-001-0009").unwrap(),
        ];
        values.sort();
        let texts: Vec<&str> = values.iter().map(Ipn::as_str).collect();
        assert_eq!(texts, vec!["CAP-001-0009", "CAP-002-0001", "RES-010-0001"]);
    }

    #[test]
    fn default_codec_classifies_categories() {
        let codec = IpnCodec::default();
        assert_eq!(codec.classify("PCA"), IpnClass::HasSubBom);
        assert_eq!(codec.classify("PCB"), IpnClass::OwnedPart);
        assert_eq!(codec.classify("CAP"), IpnClass::Other);
        assert_eq!(codec.classify_text("not an ipn"), IpnClass::Other);
        assert!(IpnClass::HasSubBom.is_owned());
        assert!(!IpnClass::Other.is_owned());
    }

    #[test]
    fn codec_rejects_sub_bom_category_outside_owned_set() {
        let err = IpnCodec::new(["PCB"], ["ASY"]).unwrap_err();
        assert_eq!(err, IpnError::CategoryNotOwned("ASY".to_string()));
    }

    #[test]
    fn codec_rejects_malformed_category() {
        let err = IpnCodec::new(["PCB", "asy"], Vec::<String>::new()).unwrap_err();
        assert_eq!(err, IpnError::InvalidCategory("asy".to_string()));
    }
}
