//! Client-side validation for new listings.
//!
//! Validation only checks shape: the contract enforces everything else.
//! A successful [`ListingForm::validate`] yields a [`ListingDraft`] whose
//! price is normalized; the session converts it to wei on submit.

use abi::U256;
use abi::units::{UnitError, normalize_decimal, parse_ether};

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
/// Prices above this many ether are treated as typos.
pub const PRICE_CEILING_ETHER: u64 = 1_000_000;

/// Prefix of the generated external reference stored with each listing.
pub const REFERENCE_PREFIX: &str = "IPFS_Hash_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Name is required.")]
    NameRequired,
    #[error("Name must be at most {NAME_MAX_CHARS} characters.")]
    NameTooLong,
    #[error("Description is required.")]
    DescriptionRequired,
    #[error("Description must be at most {DESCRIPTION_MAX_CHARS} characters.")]
    DescriptionTooLong,
    #[error("Invalid price: {0}.")]
    Price(#[from] UnitError),
    #[error("Price must be at most {PRICE_CEILING_ETHER} ETH.")]
    PriceTooHigh,
}

/// Raw user input, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingForm {
    pub name: String,
    pub description: String,
    pub price: String,
}

/// Validated input ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDraft {
    pub name: String,
    pub description: String,
    /// Normalized decimal ether string, e.g. `"12.50"`.
    pub price: String,
}

impl ListingForm {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), price: price.into() }
    }

    /// Check every field, reporting the first failure in form order.
    ///
    /// # Errors
    ///
    /// Returns the [`FormError`] for the first invalid field.
    pub fn validate(&self) -> Result<ListingDraft, FormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FormError::NameRequired);
        }
        if name.chars().count() > NAME_MAX_CHARS {
            return Err(FormError::NameTooLong);
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(FormError::DescriptionRequired);
        }
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(FormError::DescriptionTooLong);
        }

        let price = normalize_decimal(&self.price);
        let price_wei = parse_ether(&price)?;
        if price_wei > price_ceiling_wei() {
            return Err(FormError::PriceTooHigh);
        }

        Ok(ListingDraft { name: name.to_owned(), description: description.to_owned(), price })
    }
}

fn price_ceiling_wei() -> U256 {
    U256::from(PRICE_CEILING_ETHER) * U256::exp10(abi::units::ETHER_DECIMALS)
}

/// Pseudo-identifier stored as the listing's external reference.
#[must_use]
pub fn external_reference(unix_millis: i64) -> String {
    format!("{REFERENCE_PREFIX}{unix_millis}")
}

/// Wall-clock milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "listing_form_test.rs"]
mod tests;
