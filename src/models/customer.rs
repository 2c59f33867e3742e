use super::{lenient, CustomerId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A customer request as stored by `/customer_request/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub id: CustomerId,
    /// Company name
    #[serde(default, deserialize_with = "lenient::text")]
    pub c_name: String,
    /// Contact person
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub whatsapp_number: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: String,
    #[serde(default)]
    pub is_delete: Option<bool>,
}

impl CustomerRequest {
    pub fn from_input(id: CustomerId, input: &CustomerInput) -> Self {
        Self {
            id,
            c_name: input.c_name.clone(),
            name: input.name.clone(),
            email: input.email.clone(),
            phone_number: input.phone_number.clone(),
            whatsapp_number: input.whatsapp_number.clone(),
            address: input.address.clone(),
            is_delete: Some(input.is_delete),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.is_delete.unwrap_or(false)
    }

    /// Case-insensitive match on contact name, email or company.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty()
            || [&self.name, &self.email, &self.c_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn to_input(&self) -> CustomerInput {
        CustomerInput {
            c_name: self.c_name.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            whatsapp_number: self.whatsapp_number.clone(),
            address: self.address.clone(),
            is_delete: self.is_deleted(),
        }
    }
}

/// Body for creating or updating a customer request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CustomerInput {
    #[validate(length(max = 50, message = "Company name must be at most 50 characters"))]
    pub c_name: String,
    #[validate(length(min = 1, max = 50, message = "Contact name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 20, message = "Phone number is required"))]
    pub phone_number: String,
    #[validate(length(max = 20))]
    pub whatsapp_number: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[serde(default)]
    pub is_delete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_input() -> CustomerInput {
        CustomerInput {
            c_name: "Acme Water".into(),
            name: "Ravi Kumar".into(),
            email: "ravi@acme.in".into(),
            phone_number: "9876543210".into(),
            whatsapp_number: "9876543210".into(),
            address: "12 Ring Road, Surat".into(),
            is_delete: false,
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(sample_input().validate().is_ok());
    }

    #[test]
    fn missing_contact_fields_fail() {
        let input = CustomerInput {
            name: String::new(),
            email: "not-an-email".into(),
            ..sample_input()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn search_matches_name_email_or_company() {
        let customer: CustomerRequest = serde_json::from_value(json!({
            "id": 3,
            "c_name": "Acme Water",
            "name": "Ravi Kumar",
            "email": "ravi@acme.in",
            "phone_number": null
        }))
        .unwrap();
        assert_eq!(customer.phone_number, "");
        assert!(customer.matches("ACME"));
        assert!(customer.matches("ravi@"));
        assert!(!customer.matches("hydro"));
    }
}
