//! HTML form parsing and validation
//!
//! Each form mirrors one POST body. Validation returns either the
//! cleaned values or a map of per-field error messages that handlers
//! feed back into the template for redisplay.

use crate::models::{AccountUpdate, NewUser};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum length of a username
pub const USERNAME_MAX: usize = 150;

/// Maximum length of an email address
pub const EMAIL_MAX: usize = 254;

/// Maximum length of a topic subject
pub const SUBJECT_MAX: usize = 255;

/// Maximum length of a post message
pub const MESSAGE_MAX: usize = 4000;

/// Minimum password length
pub const PASSWORD_MIN: usize = 8;

/// Per-field validation error messages.
///
/// Serializes as a plain field-to-messages map so templates can check
/// `errors.subject` directly.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error message for a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Messages for one field, if any
    pub fn field(&self, name: &str) -> Option<&Vec<String>> {
        self.errors.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

fn require(errors: &mut ValidationErrors, field: &str, value: &str) -> bool {
    if value.is_empty() {
        errors.add(field, "This field is required");
        return false;
    }
    true
}

fn check_max(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters", max),
        );
    }
}

fn check_email(errors: &mut ValidationErrors, field: &str, value: &str) {
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid {
        errors.add(field, "Enter a valid email address");
    }
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// Sign-up form
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let username = self.username.trim();
        let email = self.email.trim();

        if require(&mut errors, "username", username) {
            check_max(&mut errors, "username", username, USERNAME_MAX);
            if !username.chars().all(valid_username_char) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, \
                     numbers, and @/./+/-/_ characters",
                );
            }
        }

        if require(&mut errors, "email", email) {
            check_max(&mut errors, "email", email, EMAIL_MAX);
            check_email(&mut errors, "email", email);
        }

        if require(&mut errors, "password1", &self.password1)
            && self.password1.chars().count() < PASSWORD_MIN
        {
            errors.add(
                "password1",
                format!("This password is too short. It must contain at least {} characters", PASSWORD_MIN),
            );
        }

        if require(&mut errors, "password2", &self.password2)
            && !self.password1.is_empty()
            && self.password1 != self.password2
        {
            errors.add("password2", "The two password fields didn't match");
        }

        if errors.is_empty() {
            Ok(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password: self.password1.clone(),
            })
        } else {
            Err(errors)
        }
    }
}

/// Login form
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Where to go after a successful login
    #[serde(default)]
    pub next: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "username", self.username.trim());
        require(&mut errors, "password", &self.password);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// New topic form: subject plus the opening message
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NewTopicForm {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl NewTopicForm {
    /// Returns the cleaned (subject, message) pair.
    pub fn validate(&self) -> Result<(String, String), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let subject = self.subject.trim();
        let message = self.message.trim();

        if require(&mut errors, "subject", subject) {
            check_max(&mut errors, "subject", subject, SUBJECT_MAX);
            if subject.contains("test") {
                errors.add("subject", "Invalid text - string \"test\" not allowed");
            }
        }

        if require(&mut errors, "message", message) {
            check_max(&mut errors, "message", message, MESSAGE_MAX);
        }

        if errors.is_empty() {
            Ok((subject.to_string(), message.to_string()))
        } else {
            Err(errors)
        }
    }
}

/// Reply form
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ReplyForm {
    #[serde(default)]
    pub message: String,
}

impl ReplyForm {
    pub fn validate(&self) -> Result<String, ValidationErrors> {
        validate_message(&self.message)
    }
}

/// Post edit form
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct EditPostForm {
    #[serde(default)]
    pub message: String,
}

impl EditPostForm {
    pub fn validate(&self) -> Result<String, ValidationErrors> {
        validate_message(&self.message)
    }
}

fn validate_message(message: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let message = message.trim();

    if require(&mut errors, "message", message) {
        check_max(&mut errors, "message", message, MESSAGE_MAX);
    }

    if errors.is_empty() {
        Ok(message.to_string())
    } else {
        Err(errors)
    }
}

/// Account settings form
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct AccountForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl AccountForm {
    pub fn validate(&self) -> Result<AccountUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        let email = self.email.trim();

        check_max(&mut errors, "first_name", first_name, USERNAME_MAX);
        check_max(&mut errors, "last_name", last_name, USERNAME_MAX);

        if require(&mut errors, "email", email) {
            check_max(&mut errors, "email", email, EMAIL_MAX);
            check_email(&mut errors, "email", email);
        }

        if errors.is_empty() {
            Ok(AccountUpdate {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.to_string(),
            })
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn register(username: &str, email: &str, pw1: &str, pw2: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password1: pw1.to_string(),
            password2: pw2.to_string(),
        }
    }

    #[test]
    fn test_register_valid() {
        let form = register("jane", "jane@example.com", "s3cret-pass", "s3cret-pass");
        let user = form.validate().expect("valid");
        assert_eq!(user.username, "jane");
        assert_eq!(user.password, "s3cret-pass");
    }

    #[test]
    fn test_register_requires_all_fields() {
        let errors = RegisterForm::default().validate().unwrap_err();
        for field in ["username", "email", "password1", "password2"] {
            assert!(errors.field(field).is_some(), "missing error for {}", field);
        }
    }

    #[test]
    fn test_register_rejects_password_mismatch() {
        let form = register("jane", "jane@example.com", "s3cret-pass", "different");
        let errors = form.validate().unwrap_err();
        assert!(errors.field("password2").is_some());
    }

    #[test]
    fn test_register_rejects_short_password() {
        let form = register("jane", "jane@example.com", "short", "short");
        let errors = form.validate().unwrap_err();
        assert!(errors.field("password1").is_some());
    }

    #[test]
    fn test_register_rejects_bad_username_chars() {
        let form = register("jane doe", "jane@example.com", "s3cret-pass", "s3cret-pass");
        let errors = form.validate().unwrap_err();
        assert!(errors.field("username").is_some());
    }

    #[test]
    fn test_register_rejects_bad_email() {
        for email in ["not-an-email", "@example.com", "jane@nodot"] {
            let form = register("jane", email, "s3cret-pass", "s3cret-pass");
            let errors = form.validate().unwrap_err();
            assert!(errors.field("email").is_some(), "accepted {}", email);
        }
    }

    #[test]
    fn test_login_requires_fields() {
        let errors = LoginForm::default().validate().unwrap_err();
        assert!(errors.field("username").is_some());
        assert!(errors.field("password").is_some());
    }

    #[test]
    fn test_new_topic_valid() {
        let form = NewTopicForm {
            subject: "  Weekend plans  ".to_string(),
            message: "Anyone up for hiking?".to_string(),
        };
        let (subject, message) = form.validate().expect("valid");
        assert_eq!(subject, "Weekend plans");
        assert_eq!(message, "Anyone up for hiking?");
    }

    #[test]
    fn test_new_topic_rejects_forbidden_subject() {
        let form = NewTopicForm {
            subject: "just a test topic".to_string(),
            message: "Body".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field("subject").is_some());
    }

    #[test]
    fn test_new_topic_forbidden_check_is_case_sensitive() {
        // Only the exact lowercase string is rejected
        let form = NewTopicForm {
            subject: "A Test of character".to_string(),
            message: "Body".to_string(),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_new_topic_rejects_long_message() {
        let form = NewTopicForm {
            subject: "Long one".to_string(),
            message: "x".repeat(MESSAGE_MAX + 1),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field("message").is_some());
    }

    #[test]
    fn test_reply_message_at_limit_is_accepted() {
        let form = ReplyForm {
            message: "x".repeat(MESSAGE_MAX),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_reply_requires_message() {
        let form = ReplyForm {
            message: "   ".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field("message").is_some());
    }

    #[test]
    fn test_account_form_allows_empty_names() {
        let form = AccountForm {
            first_name: String::new(),
            last_name: String::new(),
            email: "jane@example.com".to_string(),
        };
        let update = form.validate().expect("valid");
        assert_eq!(update.first_name, "");
        assert_eq!(update.email, "jane@example.com");
    }

    #[test]
    fn test_account_form_requires_email() {
        let form = AccountForm {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: String::new(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field("email").is_some());
    }

    proptest! {
        #[test]
        fn prop_subject_containing_test_is_rejected(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
            let form = NewTopicForm {
                subject: format!("{}test{}", prefix, suffix),
                message: "Body".to_string(),
            };
            prop_assert!(form.validate().is_err());
        }

        #[test]
        fn prop_message_over_limit_is_rejected(extra in 1usize..100) {
            let form = ReplyForm {
                message: "x".repeat(MESSAGE_MAX + extra),
            };
            prop_assert!(form.validate().is_err());
        }
    }
}
