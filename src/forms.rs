//! Request bodies that carry user input, with their validation rules.
//!
//! Field rules come from `validator`; cross-field rules are checked in
//! `clean`. Checks that need the database live in the handlers.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    core::app_error::{FieldErrors, NON_FIELD_ERRORS},
    models::CreateShippingAddressEntity,
};

const REQUIRED: &str = "This field is required.";

pub const EMAIL_TAKEN: &str = "Este email ya está registrado.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "Las contraseñas no coinciden.";

fn validate_form<T: Validate>(form: &T) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}

#[derive(Deserialize, Validate, Debug, ToSchema)]
pub struct RegistrationForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this value has at most 254 characters.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn clean(mut self) -> Result<Self, FieldErrors> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();

        let mut errors = FieldErrors::new();
        if self.username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.email.is_empty() {
            errors.add("email", REQUIRED);
        }
        errors.merge_missing(validate_form(&self));

        if !self.username.is_empty() && !is_valid_username(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        if !self.password.is_empty()
            && !self.confirm_password.is_empty()
            && self.password != self.confirm_password
        {
            errors.add(NON_FIELD_ERRORS, PASSWORD_MISMATCH);
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors)
        }
    }
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

#[derive(Deserialize, Validate, Debug, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

impl LoginForm {
    pub fn clean(mut self) -> Result<Self, FieldErrors> {
        self.username = self.username.trim().to_string();
        let errors = validate_form(&self);
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors)
        }
    }
}

#[derive(Deserialize, Validate, Debug, ToSchema)]
pub struct ShippingAddressForm {
    #[serde(default)]
    #[validate(length(max = 100, message = "Enter at most 100 characters."))]
    pub first_names: String,
    #[validate(length(max = 100, message = "Enter at most 100 characters."))]
    pub last_names: Option<String>,
    #[serde(default)]
    #[validate(length(max = 15, message = "Enter at most 15 characters."))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 8, message = "Enter at most 8 characters."))]
    pub national_id: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Enter at most 255 characters."))]
    pub address: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Enter at most 100 characters."))]
    pub city: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Enter at most 100 characters."))]
    pub district: String,
    #[validate(length(max = 50, message = "Enter at most 50 characters."))]
    pub country: Option<String>,
    #[serde(default)]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Enter at most 254 characters.")
    )]
    pub email: String,
}

impl ShippingAddressForm {
    pub fn clean(mut self) -> Result<Self, FieldErrors> {
        for field in [
            &mut self.first_names,
            &mut self.phone,
            &mut self.national_id,
            &mut self.address,
            &mut self.city,
            &mut self.district,
            &mut self.email,
        ] {
            *field = field.trim().to_string();
        }
        self.last_names = self
            .last_names
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.country = self.country.map(|s| s.trim().to_string());

        let mut errors = FieldErrors::new();
        for (field, value) in [
            ("first_names", &self.first_names),
            ("phone", &self.phone),
            ("national_id", &self.national_id),
            ("address", &self.address),
            ("city", &self.city),
            ("district", &self.district),
            ("email", &self.email),
        ] {
            if value.is_empty() {
                errors.add(field, REQUIRED);
            }
        }
        errors.merge_missing(validate_form(&self));

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(errors)
        }
    }

    pub fn into_entity(self, user_id: i32) -> CreateShippingAddressEntity {
        CreateShippingAddressEntity {
            user_id,
            first_names: self.first_names,
            last_names: self.last_names,
            phone: self.phone,
            national_id: self.national_id,
            address: self.address,
            city: self.city,
            district: self.district,
            country: self.country.unwrap_or_default(),
            email: self.email,
        }
    }
}

fn one() -> i32 {
    1
}

/// Body of "add to cart".
#[derive(Deserialize, Validate, Debug, ToSchema)]
pub struct AddToCartForm {
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 9999, message = "Quantity must be between 1 and 9999."))]
    pub quantity: i32,
}

impl Default for AddToCartForm {
    fn default() -> Self {
        Self { quantity: one() }
    }
}

/// Body of "update cart line". Zero removes the line.
#[derive(Deserialize, Validate, Debug, ToSchema)]
pub struct UpdateCartForm {
    #[validate(range(min = 0, max = 9999, message = "Quantity must be between 0 and 9999."))]
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            username: "  maria.p  ".into(),
            email: "maria@example.com".into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    fn address() -> ShippingAddressForm {
        ShippingAddressForm {
            first_names: "María".into(),
            last_names: Some("".into()),
            phone: "987654321".into(),
            national_id: "12345678".into(),
            address: "Av. Siempre Viva 742".into(),
            city: "Lima".into(),
            district: "Miraflores".into(),
            country: None,
            email: "maria@example.com".into(),
        }
    }

    #[test]
    fn registration_trims_and_accepts_matching_passwords() {
        let form = registration("secreto", "secreto").clean().unwrap();
        assert_eq!(form.username, "maria.p");
    }

    #[test]
    fn registration_rejects_mismatched_passwords() {
        let errors = registration("secreto", "otro").clean().unwrap_err();
        assert_eq!(
            errors.get(NON_FIELD_ERRORS),
            Some(&[PASSWORD_MISMATCH.to_string()][..])
        );
    }

    #[test]
    fn registration_rejects_bad_username_and_email() {
        let form = RegistrationForm {
            username: "maria p!".into(),
            email: "not-an-email".into(),
            password: "x".into(),
            confirm_password: "x".into(),
        };
        let errors = form.clean().unwrap_err();
        assert!(errors.get("username").is_some());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn address_form_accepts_a_complete_address() {
        let form = address().clean().unwrap();
        assert_eq!(form.last_names, None);

        let entity = form.into_entity(7);
        assert_eq!(entity.user_id, 7);
        assert_eq!(entity.country, "");
    }

    #[test]
    fn address_form_reports_required_and_length_errors() {
        let mut form = address();
        form.phone = "   ".into();
        form.national_id = "123456789".into();

        let errors = form.clean().unwrap_err();
        assert_eq!(errors.get("phone"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(errors.get("national_id").map(<[String]>::len), Some(1));
        assert!(errors.get("city").is_none());
    }

    #[test]
    fn address_form_rejects_bad_email() {
        let mut form = address();
        form.email = "maria".into();
        assert!(form.clean().unwrap_err().get("email").is_some());
    }

    #[test]
    fn cart_quantities_are_range_checked() {
        assert!(AddToCartForm { quantity: 0 }.validate().is_err());
        assert!(AddToCartForm::default().validate().is_ok());
        assert!(UpdateCartForm { quantity: 0 }.validate().is_ok());
        assert!(UpdateCartForm { quantity: -1 }.validate().is_err());
        assert!(AddToCartForm { quantity: i32::MAX }.validate().is_err());
        assert!(UpdateCartForm { quantity: i32::MAX }.validate().is_err());
        assert!(AddToCartForm { quantity: crate::cart::MAX_LINE_QUANTITY }.validate().is_ok());
        assert!(UpdateCartForm { quantity: crate::cart::MAX_LINE_QUANTITY + 1 }.validate().is_err());
    }

    #[test]
    fn add_to_cart_defaults_to_one_unit() {
        let form: AddToCartForm = serde_json::from_str("{}").unwrap();
        assert_eq!(form.quantity, 1);
    }
}
