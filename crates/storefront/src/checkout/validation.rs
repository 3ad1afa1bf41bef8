//! Step validation.
//!
//! Each step's requirements are a small tree of rules over the form. The
//! checks are presence checks plus email well-formedness; everything else
//! (deliverability, stock, payment) is decided by the commerce API when the
//! order is placed.

use std::collections::BTreeMap;

use larkspur_core::{Address, Email, GatewayId, ShippingMethodId};

use super::{CheckoutForm, CheckoutStep};

/// What the backend currently offers for this cart.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub shipping_methods: Vec<ShippingMethodId>,
    pub payment_gateways: Vec<GatewayId>,
}

impl StepContext {
    fn offers_shipping(&self) -> bool {
        !self.shipping_methods.is_empty()
    }
}

/// Field name to error message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `field` has an error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Error for `field`, or an empty string.
    #[must_use]
    pub fn message(&self, field: &str) -> &str {
        self.0.get(field).map_or("", String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, field: String, message: String) {
        self.0.entry(field).or_insert(message);
    }
}

type Predicate = fn(&CheckoutForm, &StepContext) -> bool;

enum Rule {
    All(Vec<Rule>),
    When(Predicate, Box<Rule>),
    Check {
        field: &'static str,
        message: &'static str,
        test: Predicate,
    },
    Address {
        prefix: &'static str,
        address: fn(&CheckoutForm) -> &Address,
    },
}

impl Rule {
    fn evaluate(&self, form: &CheckoutForm, ctx: &StepContext, errors: &mut FieldErrors) {
        match self {
            Self::All(rules) => {
                for rule in rules {
                    rule.evaluate(form, ctx, errors);
                }
            }
            Self::When(condition, rule) => {
                if condition(form, ctx) {
                    rule.evaluate(form, ctx, errors);
                }
            }
            Self::Check {
                field,
                message,
                test,
            } => {
                if !test(form, ctx) {
                    errors.insert((*field).to_string(), (*message).to_string());
                }
            }
            Self::Address { prefix, address } => {
                for field in address(form).missing_fields() {
                    errors.insert(
                        format!("{prefix}{}", field.name()),
                        format!("{} is required", field.label()),
                    );
                }
            }
        }
    }
}

fn rules(step: CheckoutStep) -> Rule {
    match step {
        CheckoutStep::Information => Rule::Check {
            field: "email",
            message: "Enter a valid email address",
            test: |form, _| Email::parse(&form.email).is_ok(),
        },
        CheckoutStep::Shipping => Rule::All(vec![
            Rule::Address {
                prefix: "shipping_",
                address: |form| &form.shipping_address,
            },
            Rule::When(
                |_, ctx| ctx.offers_shipping(),
                Box::new(Rule::Check {
                    field: "shipping_method_id",
                    message: "Choose a shipping method",
                    test: |form, ctx| {
                        form.shipping_method_id
                            .as_ref()
                            .is_some_and(|id| ctx.shipping_methods.contains(id))
                    },
                }),
            ),
        ]),
        CheckoutStep::Payment => Rule::All(vec![
            Rule::Check {
                field: "payment_gateway_id",
                message: "Choose a payment method",
                test: |form, ctx| {
                    form.payment_gateway_id
                        .as_ref()
                        .is_some_and(|id| ctx.payment_gateways.contains(id))
                },
            },
            Rule::When(
                |form, _| !form.billing_same_as_shipping,
                Box::new(Rule::Address {
                    prefix: "billing_",
                    address: |form| &form.billing_address,
                }),
            ),
        ]),
        CheckoutStep::Review => Rule::Check {
            field: "terms_accepted",
            message: "Please accept the terms and conditions",
            test: |form, _| form.terms_accepted,
        },
    }
}

/// Validate the fields belonging to one step.
#[must_use]
pub fn validate_step(step: CheckoutStep, form: &CheckoutForm, ctx: &StepContext) -> FieldErrors {
    let mut errors = FieldErrors::default();
    rules(step).evaluate(form, ctx, &mut errors);
    errors
}

/// First step before `target` whose fields are invalid.
#[must_use]
pub fn first_invalid_step(
    form: &CheckoutForm,
    ctx: &StepContext,
    target: CheckoutStep,
) -> Option<CheckoutStep> {
    CheckoutStep::ALL
        .into_iter()
        .take_while(|step| *step < target)
        .find(|step| !validate_step(*step, form, ctx).is_empty())
}

/// Check that `requested` may be shown.
///
/// # Errors
///
/// Returns the step to redirect to when an earlier step is incomplete.
pub fn guard(
    requested: CheckoutStep,
    form: &CheckoutForm,
    ctx: &StepContext,
) -> Result<(), CheckoutStep> {
    first_invalid_step(form, ctx, requested).map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StepContext {
        StepContext {
            shipping_methods: vec![ShippingMethodId::new("std")],
            payment_gateways: vec![GatewayId::new("card")],
        }
    }

    fn address() -> Address {
        Address {
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            line1: "12 St James Sq".into(),
            city: "London".into(),
            region: "LND".into(),
            postal_code: "SW1Y 4JH".into(),
            country_code: "GB".into(),
            ..Address::default()
        }
    }

    fn complete_form() -> CheckoutForm {
        CheckoutForm {
            email: "ada@example.com".into(),
            shipping_address: address(),
            shipping_method_id: Some(ShippingMethodId::new("std")),
            payment_gateway_id: Some(GatewayId::new("card")),
            terms_accepted: true,
            ..CheckoutForm::default()
        }
    }

    #[test]
    fn test_information_requires_valid_email() {
        let mut form = complete_form();
        form.email = "ada@".into();
        let errors = validate_step(CheckoutStep::Information, &form, &ctx());
        assert!(errors.has("email"));
        assert_eq!(errors.message("email"), "Enter a valid email address");
    }

    #[test]
    fn test_shipping_reports_each_missing_field() {
        let mut form = complete_form();
        form.shipping_address.city = "  ".into();
        form.shipping_address.postal_code = String::new();
        let errors = validate_step(CheckoutStep::Shipping, &form, &ctx());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.message("shipping_city"), "City is required");
        assert!(errors.has("shipping_postal_code"));
    }

    #[test]
    fn test_shipping_method_only_required_when_offered() {
        let mut form = complete_form();
        form.shipping_method_id = None;
        assert!(validate_step(CheckoutStep::Shipping, &form, &ctx()).has("shipping_method_id"));

        let no_methods = StepContext {
            shipping_methods: Vec::new(),
            ..ctx()
        };
        assert!(validate_step(CheckoutStep::Shipping, &form, &no_methods).is_empty());
    }

    #[test]
    fn test_shipping_method_must_be_offered() {
        let mut form = complete_form();
        form.shipping_method_id = Some(ShippingMethodId::new("teleport"));
        assert!(validate_step(CheckoutStep::Shipping, &form, &ctx()).has("shipping_method_id"));
    }

    #[test]
    fn test_billing_only_checked_when_different() {
        let mut form = complete_form();
        assert!(validate_step(CheckoutStep::Payment, &form, &ctx()).is_empty());

        form.billing_same_as_shipping = false;
        let errors = validate_step(CheckoutStep::Payment, &form, &ctx());
        assert!(errors.has("billing_first_name"));
        assert!(errors.has("billing_country_code"));
        assert!(!errors.has("billing_line2"));
    }

    #[test]
    fn test_review_requires_terms() {
        let mut form = complete_form();
        form.terms_accepted = false;
        assert!(validate_step(CheckoutStep::Review, &form, &ctx()).has("terms_accepted"));
    }

    #[test]
    fn test_guard_redirects_to_first_invalid_step() {
        let mut form = complete_form();
        form.shipping_address = Address::default();
        assert_eq!(
            guard(CheckoutStep::Review, &form, &ctx()),
            Err(CheckoutStep::Shipping)
        );
        assert_eq!(guard(CheckoutStep::Shipping, &form, &ctx()), Ok(()));
        assert_eq!(guard(CheckoutStep::Information, &CheckoutForm::default(), &ctx()), Ok(()));
    }

    #[test]
    fn test_first_invalid_step_ignores_target_itself() {
        let form = CheckoutForm::default();
        assert_eq!(
            first_invalid_step(&form, &ctx(), CheckoutStep::Information),
            None
        );
        assert_eq!(
            first_invalid_step(&form, &ctx(), CheckoutStep::Review),
            Some(CheckoutStep::Information)
        );
    }
}
