//! Postal address used for shipping and billing.

use serde::{Deserialize, Serialize};

/// A shipping or billing address.
///
/// All fields are plain strings so a half-filled checkout form can be held
/// between requests. [`Address::missing_fields`] is the presence check run
/// before the address is sent to the commerce API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(alias = "address1", alias = "address_line1")]
    pub line1: String,
    #[serde(alias = "address2", alias = "address_line2")]
    pub line2: String,
    pub city: String,
    #[serde(alias = "state", alias = "province")]
    pub region: String,
    #[serde(alias = "zip", alias = "postcode")]
    pub postal_code: String,
    #[serde(alias = "country")]
    pub country_code: String,
    pub phone: String,
}

/// Address fields that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    FirstName,
    LastName,
    Line1,
    City,
    Region,
    PostalCode,
    CountryCode,
}

impl AddressField {
    /// Form field name, matching the serialized field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Line1 => "line1",
            Self::City => "city",
            Self::Region => "region",
            Self::PostalCode => "postal_code",
            Self::CountryCode => "country_code",
        }
    }

    /// Human-readable label for error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Line1 => "Address",
            Self::City => "City",
            Self::Region => "State / region",
            Self::PostalCode => "Postal code",
            Self::CountryCode => "Country",
        }
    }
}

impl Address {
    /// Required fields that are empty or whitespace, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<AddressField> {
        [
            (AddressField::FirstName, &self.first_name),
            (AddressField::LastName, &self.last_name),
            (AddressField::Line1, &self.line1),
            (AddressField::City, &self.city),
            (AddressField::Region, &self.region),
            (AddressField::PostalCode, &self.postal_code),
            (AddressField::CountryCode, &self.country_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Whether every required field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Copy with surrounding whitespace removed and the country uppercased.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: self.line2.trim().to_string(),
            city: self.city.trim().to_string(),
            region: self.region.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country_code: self.country_code.trim().to_uppercase(),
            phone: self.phone.trim().to_string(),
        }
    }

    /// Single-line summary for review pages.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.line1.as_str(),
            self.line2.as_str(),
            self.city.as_str(),
            self.region.as_str(),
            self.postal_code.as_str(),
            self.country_code.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> Address {
        Address {
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            line1: "12 St James Sq".into(),
            line2: String::new(),
            city: "London".into(),
            region: "LDN".into(),
            postal_code: "SW1Y 4JH".into(),
            country_code: "gb".into(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_complete_address_has_no_missing_fields() {
        assert!(complete().is_complete());
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let mut address = complete();
        address.city = "   ".into();
        address.postal_code = String::new();
        assert_eq!(
            address.missing_fields(),
            vec![AddressField::City, AddressField::PostalCode]
        );
    }

    #[test]
    fn test_line2_and_phone_are_optional() {
        let address = complete();
        assert!(address.line2.is_empty());
        assert!(address.phone.is_empty());
        assert!(address.is_complete());
    }

    #[test]
    fn test_normalized_uppercases_country() {
        assert_eq!(complete().normalized().country_code, "GB");
    }

    #[test]
    fn test_deserialize_aliases() {
        let address: Address = serde_json::from_str(
            r#"{"first_name":"A","address1":"1 Main","zip":"10001","state":"NY","country":"US"}"#,
        )
        .unwrap();
        assert_eq!(address.line1, "1 Main");
        assert_eq!(address.postal_code, "10001");
        assert_eq!(address.region, "NY");
        assert_eq!(address.country_code, "US");
    }

    #[test]
    fn test_one_line_skips_empty_parts() {
        assert_eq!(
            complete().one_line(),
            "12 St James Sq, London, LDN, SW1Y 4JH, gb"
        );
    }
}
