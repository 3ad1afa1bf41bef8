//! Multi-step checkout wizard.
//!
//! # Flow
//!
//! ```text
//! /checkout/information -> /checkout/shipping -> /checkout/payment -> /checkout/review
//! ```
//!
//! The step lives in the URL and the form state in the session, so reloads
//! and back/forward navigation land where the shopper left off. Each POST
//! validates only the submitted step; GETs are guarded so a shopper cannot
//! skip past the first step that is still incomplete.

mod form;
mod validation;

pub use form::CheckoutForm;
pub use validation::{FieldErrors, StepContext, first_invalid_step, guard, validate_step};

use std::fmt;

/// A checkout wizard step, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckoutStep {
    Information,
    Shipping,
    Payment,
    Review,
}

impl CheckoutStep {
    /// All steps, in wizard order.
    pub const ALL: [Self; 4] = [Self::Information, Self::Shipping, Self::Payment, Self::Review];

    /// URL segment.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Information => "information",
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Review => "review",
        }
    }

    /// Heading shown in the step indicator.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Information => "Information",
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Review => "Review",
        }
    }

    /// Parse a URL segment.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.slug() == slug)
    }

    /// Zero-based position.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Information => Some(Self::Shipping),
            Self::Shipping => Some(Self::Payment),
            Self::Payment => Some(Self::Review),
            Self::Review => None,
        }
    }

    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Information => None,
            Self::Shipping => Some(Self::Information),
            Self::Payment => Some(Self::Shipping),
            Self::Review => Some(Self::Payment),
        }
    }

    /// Path of this step's page.
    #[must_use]
    pub fn path(self) -> String {
        format!("/checkout/{}", self.slug())
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
