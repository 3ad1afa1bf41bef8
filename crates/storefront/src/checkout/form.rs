//! Checkout form state held in the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use larkspur_core::{Address, Email, GatewayId, ShippingMethodId};

use super::CheckoutStep;
use crate::commerce::OrderRequest;
use crate::models::session_keys;

/// Everything the shopper has entered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub email: String,
    pub phone: String,
    pub accepts_marketing: bool,
    pub shipping_address: Address,
    pub shipping_method_id: Option<ShippingMethodId>,
    pub billing_same_as_shipping: bool,
    pub billing_address: Address,
    pub payment_gateway_id: Option<GatewayId>,
    pub notes: String,
    pub terms_accepted: bool,
    /// Whether `begin_checkout` was already reported for this checkout.
    pub begin_checkout_tracked: bool,
}

impl Default for CheckoutForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            phone: String::new(),
            accepts_marketing: false,
            shipping_address: Address::default(),
            shipping_method_id: None,
            billing_same_as_shipping: true,
            billing_address: Address::default(),
            payment_gateway_id: None,
            notes: String::new(),
            terms_accepted: false,
            begin_checkout_tracked: false,
        }
    }
}

impl CheckoutForm {
    /// Load the form from the session, or start a blank one.
    pub async fn load(session: &Session) -> Self {
        session
            .get::<Self>(session_keys::CHECKOUT)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Persist the form in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(session_keys::CHECKOUT, self).await
    }

    /// Drop the form (after the order is placed).
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn clear(session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.remove::<Self>(session_keys::CHECKOUT).await.map(|_| ())
    }

    /// Copy the fields of `step` from submitted form input.
    ///
    /// Checkboxes are absent from the input when unchecked.
    pub fn apply(&mut self, step: CheckoutStep, input: &HashMap<String, String>) {
        let text = |key: &str| input.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let choice = |key: &str| {
            input
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        match step {
            CheckoutStep::Information => {
                self.email = text("email");
                self.phone = text("phone");
                self.accepts_marketing = is_checked(input, "accepts_marketing");
            }
            CheckoutStep::Shipping => {
                self.shipping_address = read_address(input, "shipping_");
                self.shipping_method_id = choice("shipping_method_id").map(ShippingMethodId::new);
            }
            CheckoutStep::Payment => {
                self.billing_same_as_shipping = is_checked(input, "billing_same_as_shipping");
                if !self.billing_same_as_shipping {
                    self.billing_address = read_address(input, "billing_");
                }
                self.payment_gateway_id = choice("payment_gateway_id").map(GatewayId::new);
            }
            CheckoutStep::Review => {
                self.notes = text("notes");
                self.terms_accepted = is_checked(input, "terms_accepted");
            }
        }
    }

    /// The address the order is billed to.
    #[must_use]
    pub const fn effective_billing_address(&self) -> &Address {
        if self.billing_same_as_shipping {
            &self.shipping_address
        } else {
            &self.billing_address
        }
    }

    /// Build the order body.
    ///
    /// Returns `None` if no payment gateway was chosen; callers validate the
    /// form first, so that indicates a bug rather than bad input.
    #[must_use]
    pub fn to_order_request(
        &self,
        cart_token: &str,
        coupon_code: Option<String>,
    ) -> Option<OrderRequest> {
        let email = Email::parse(&self.email)
            .map(|e| e.as_str().to_string())
            .unwrap_or_else(|_| self.email.trim().to_string());
        let phone = [self.phone.trim(), self.shipping_address.phone.trim()]
            .into_iter()
            .find(|p| !p.is_empty())
            .map(String::from);
        let notes = Some(self.notes.trim())
            .filter(|n| !n.is_empty())
            .map(String::from);

        Some(OrderRequest {
            cart_token: cart_token.to_string(),
            email,
            phone,
            shipping_address: self.shipping_address.normalized(),
            billing_address: self.effective_billing_address().normalized(),
            shipping_method_id: self.shipping_method_id.clone(),
            payment_gateway_id: self.payment_gateway_id.clone()?,
            notes,
            accepts_marketing: self.accepts_marketing,
            coupon_code,
        })
    }
}

fn is_checked(input: &HashMap<String, String>, key: &str) -> bool {
    input.get(key).is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "on" | "true" | "1" | "yes"
        )
    })
}

fn read_address(input: &HashMap<String, String>, prefix: &str) -> Address {
    let field = |name: &str| {
        input
            .get(&format!("{prefix}{name}"))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    Address {
        first_name: field("first_name"),
        last_name: field("last_name"),
        line1: field("line1"),
        line2: field("line2"),
        city: field("city"),
        region: field("region"),
        postal_code: field("postal_code"),
        country_code: field("country_code"),
        phone: field("phone"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_default_bills_to_shipping_address() {
        assert!(CheckoutForm::default().billing_same_as_shipping);
    }

    #[test]
    fn test_apply_information() {
        let mut form = CheckoutForm::default();
        form.apply(
            CheckoutStep::Information,
            &input(&[("email", "  Ada@Example.com "), ("accepts_marketing", "on")]),
        );
        assert_eq!(form.email, "Ada@Example.com");
        assert!(form.accepts_marketing);

        form.apply(CheckoutStep::Information, &input(&[("email", "ada@example.com")]));
        assert!(!form.accepts_marketing);
    }

    #[test]
    fn test_apply_payment_keeps_billing_when_same() {
        let mut form = CheckoutForm::default();
        form.billing_address.city = "Leeds".into();
        form.apply(
            CheckoutStep::Payment,
            &input(&[
                ("billing_same_as_shipping", "on"),
                ("billing_city", "York"),
                ("payment_gateway_id", "card"),
            ]),
        );
        assert_eq!(form.billing_address.city, "Leeds");
        assert_eq!(form.payment_gateway_id, Some(GatewayId::new("card")));
    }

    #[test]
    fn test_apply_payment_separate_billing() {
        let mut form = CheckoutForm::default();
        form.apply(
            CheckoutStep::Payment,
            &input(&[("billing_city", "York"), ("payment_gateway_id", "")]),
        );
        assert!(!form.billing_same_as_shipping);
        assert_eq!(form.billing_address.city, "York");
        assert!(form.payment_gateway_id.is_none());
    }

    #[test]
    fn test_order_request_uses_shipping_as_billing() {
        let mut form = CheckoutForm::default();
        form.email = "Ada@Example.COM".into();
        form.shipping_address.city = " Bath ".into();
        form.shipping_address.country_code = "gb".into();
        form.shipping_address.phone = "0123".into();
        form.payment_gateway_id = Some(GatewayId::new("bank"));

        let request = form.to_order_request("tok", Some("SPRING".into())).unwrap();
        assert_eq!(request.email, "ada@example.com");
        assert_eq!(request.billing_address.city, "Bath");
        assert_eq!(request.billing_address.country_code, "GB");
        assert_eq!(request.phone.as_deref(), Some("0123"));
        assert!(request.notes.is_none());
        assert_eq!(request.coupon_code.as_deref(), Some("SPRING"));
    }

    #[test]
    fn test_order_request_requires_gateway() {
        assert!(CheckoutForm::default().to_order_request("tok", None).is_none());
    }
}
