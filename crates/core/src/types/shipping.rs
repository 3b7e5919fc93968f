//! Shipping form validation.
//!
//! The checkout form is raw user input ([`ShippingForm`]). Passing field
//! validation produces a [`ShippingInfo`], which is the only shape the
//! checkout accepts.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A field of the shipping form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShippingField {
    FullName,
    AddressLine1,
    City,
    PostalCode,
    Country,
}

impl fmt::Display for ShippingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FullName => "full name",
            Self::AddressLine1 => "address",
            Self::City => "city",
            Self::PostalCode => "postal code",
            Self::Country => "country",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when validating a [`ShippingForm`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingFieldError {
    /// A required field is blank.
    #[error("{field} cannot be empty")]
    Empty {
        /// The offending field.
        field: ShippingField,
    },
    /// A field exceeds its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// The offending field.
        field: ShippingField,
        /// Maximum allowed length.
        max: usize,
    },
    /// The postal code contains characters other than letters, digits,
    /// spaces and dashes, or is too short.
    #[error("postal code is not valid")]
    InvalidPostalCode,
    /// The country is not a two-letter ISO 3166-1 code.
    #[error("country must be a two-letter code (e.g. PE, US)")]
    InvalidCountry,
}

/// Raw shipping form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    pub full_name: String,
    pub address_line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Shipping details that passed field validation.
///
/// Values are trimmed; the country code is upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    full_name: String,
    address_line1: String,
    city: String,
    postal_code: String,
    country: String,
}

impl ShippingForm {
    /// Maximum length of the name and city fields.
    pub const MAX_NAME_LENGTH: usize = 100;
    /// Maximum length of the address line.
    pub const MAX_ADDRESS_LENGTH: usize = 200;
    /// Maximum length of a postal code.
    pub const MAX_POSTAL_CODE_LENGTH: usize = 10;

    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the first failing field, checked in form order:
    /// - Any field is blank
    /// - Name or city longer than 100 characters, address longer than 200
    /// - Postal code shorter than 3 or longer than 10 characters, or with
    ///   characters other than letters, digits, spaces and dashes
    /// - Country not a two-letter alphabetic code
    pub fn validate(&self) -> Result<ShippingInfo, ShippingFieldError> {
        let full_name = required(
            &self.full_name,
            ShippingField::FullName,
            Self::MAX_NAME_LENGTH,
        )?;
        let address_line1 = required(
            &self.address_line1,
            ShippingField::AddressLine1,
            Self::MAX_ADDRESS_LENGTH,
        )?;
        let city = required(&self.city, ShippingField::City, Self::MAX_NAME_LENGTH)?;

        let postal_code = required(
            &self.postal_code,
            ShippingField::PostalCode,
            Self::MAX_POSTAL_CODE_LENGTH,
        )?;
        if postal_code.len() < 3
            || !postal_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(ShippingFieldError::InvalidPostalCode);
        }

        let country = required(&self.country, ShippingField::Country, 2)
            .map_err(|_| ShippingFieldError::InvalidCountry)?;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ShippingFieldError::InvalidCountry);
        }

        Ok(ShippingInfo {
            full_name,
            address_line1,
            city,
            postal_code,
            country: country.to_ascii_uppercase(),
        })
    }

    /// Whether the form passes validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn required(value: &str, field: ShippingField, max: usize) -> Result<String, ShippingFieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShippingFieldError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ShippingFieldError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

impl ShippingInfo {
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn address_line1(&self) -> &str {
        &self.address_line1
    }

    #[must_use]
    pub fn city(&self) -> &str {
        &self.city
    }

    #[must_use]
    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    /// ISO 3166-1 alpha-2 country code, upper-case.
    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }
}
