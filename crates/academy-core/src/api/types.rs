//! Wire types for the academy REST API
//!
//! Field names follow the server's JSON. The auth payload is the one place
//! where the server has shipped more than one spelling; [`AuthResponse`]
//! accepts all of them and [`AuthResponse::normalize`] is the only way to
//! turn it into an [`AuthResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Platform role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_LEARNER", alias = "LEARNER")]
    Learner,
    #[serde(rename = "ROLE_INSTRUCTOR", alias = "INSTRUCTOR")]
    Instructor,
    #[serde(rename = "ROLE_ADMIN", alias = "ADMIN")]
    Admin,
    #[serde(rename = "ROLE_COMPANY_REP", alias = "COMPANY_REP")]
    CompanyRep,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Self::Learner,
        Self::Instructor,
        Self::Admin,
        Self::CompanyRep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => "ROLE_LEARNER",
            Self::Instructor => "ROLE_INSTRUCTOR",
            Self::Admin => "ROLE_ADMIN",
            Self::CompanyRep => "ROLE_COMPANY_REP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().trim_start_matches("ROLE_") == bare)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal
///
/// Replaced wholesale on refresh. Also the shape of the persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Login input
///
/// The server names the identifier field `username` even though it accepts
/// an email address too.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    #[serde(rename = "username")]
    pub username_or_email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username_or_email", &self.username_or_email)
            .field("password", &"***")
            .finish()
    }
}

/// Raw login response as the server sends it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default, alias = "access_token", alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default, alias = "user_id", alias = "userId")]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Canonical login result, consumed once to build the session
#[derive(Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl fmt::Debug for AuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResult")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl AuthResponse {
    /// Map the server payload onto [`AuthResult`]
    ///
    /// Fails with [`Error::MalformedResponse`] when the token or user id is
    /// missing. Missing profile fields degrade to empty strings and the
    /// learner role.
    pub fn normalize(self) -> Result<AuthResult> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse("authentication response has no token".to_string())
            })?;
        let user_id = self.id.ok_or_else(|| {
            Error::MalformedResponse("authentication response has no user id".to_string())
        })?;

        Ok(AuthResult {
            token,
            user_id,
            username: self.username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            role: self.role.unwrap_or(Role::Learner),
        })
    }
}

impl AuthResult {
    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Account creation payload
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub role: Option<Role>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Error envelope the server attaches to non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ApiErrorBody {
    /// Pull the conventional fields out of an arbitrary JSON body
    pub fn from_value(body: &Value) -> Self {
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            message: text("message"),
            error: text("error"),
            details: body.get("details").cloned(),
        }
    }

    pub fn message_or(&self, status: u16) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("HTTP error! status: {}", status))
    }
}

// ========== Catalog ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub company_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub representative: Option<User>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price_range: String,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseMode {
    InPerson,
    Online,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub mode: CourseMode,
    pub status: CourseStatus,
    #[serde(default)]
    pub category: String,
    pub price: f64,
    /// Duration in hours
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub current_participants: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_date: String,
    #[serde(default)]
    pub location: Option<String>,
}

// ========== Learner records ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub enrollment_date: String,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub certification_date: String,
    #[serde(default)]
    pub expiration_date: Option<String>,
    pub status: CertificationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Paypal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub amount: f64,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: String,
    pub user_id: i64,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub event_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// New review for a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCreate {
    pub rating: u8,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        let role: Role = serde_json::from_value(json!("ROLE_COMPANY_REP")).unwrap();
        assert_eq!(role, Role::CompanyRep);
        let bare: Role = serde_json::from_value(json!("INSTRUCTOR")).unwrap();
        assert_eq!(bare, Role::Instructor);
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("ROLE_ADMIN"));
        assert!(serde_json::from_value::<Role>(json!("ROLE_JANITOR")).is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("learner"), Some(Role::Learner));
        assert_eq!(Role::parse("ROLE_ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("company_rep"), Some(Role::CompanyRep));
        assert_eq!(Role::parse("guest"), None);
    }

    #[test]
    fn test_credentials_wire_shape() {
        let credentials = Credentials::new("a@b.com", "hunter2");
        let value = serde_json::to_value(&credentials).unwrap();
        assert_eq!(value, json!({"username": "a@b.com", "password": "hunter2"}));
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }

    #[test]
    fn test_normalize_access_token_spelling() {
        let raw: AuthResponse = serde_json::from_value(json!({
            "access_token": "tok-1",
            "user_id": 7,
            "username": "marie",
            "email": "marie@example.com",
            "role": "ROLE_LEARNER"
        }))
        .unwrap();
        let result = raw.normalize().unwrap();
        assert_eq!(result.token, "tok-1");
        assert_eq!(result.user().id, 7);
        assert_eq!(result.user().role, Role::Learner);
        assert!(!format!("{:?}", result).contains("tok-1"));
    }

    #[test]
    fn test_normalize_camel_case_spelling() {
        let raw: AuthResponse = serde_json::from_value(json!({
            "token": "tok-2",
            "userId": 9,
            "username": "paul",
            "email": "paul@example.com",
            "role": "ROLE_INSTRUCTOR"
        }))
        .unwrap();
        let result = raw.normalize().unwrap();
        assert_eq!(result.user_id, 9);
        assert_eq!(result.role, Role::Instructor);
    }

    #[test]
    fn test_normalize_rejects_missing_fields() {
        let no_token: AuthResponse =
            serde_json::from_value(json!({"user_id": 1, "username": "x"})).unwrap();
        assert!(matches!(no_token.normalize(), Err(Error::MalformedResponse(_))));

        let blank_token: AuthResponse =
            serde_json::from_value(json!({"token": " ", "user_id": 1})).unwrap();
        assert!(matches!(blank_token.normalize(), Err(Error::MalformedResponse(_))));

        let no_id: AuthResponse = serde_json::from_value(json!({"token": "t"})).unwrap();
        assert!(matches!(no_id.normalize(), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_register_request_is_camel_case() {
        let request = RegisterRequest {
            first_name: "Marie".to_string(),
            last_name: "Curie".to_string(),
            username: "mcurie".to_string(),
            email: "marie@example.com".to_string(),
            password: "polonium".to_string(),
            role: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["firstName"], "Marie");
        assert_eq!(value["lastName"], "Curie");
        assert!(value.get("role").is_none());
        assert!(!format!("{:?}", request).contains("polonium"));
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body = ApiErrorBody::from_value(&json!({"message": "Bad credentials", "error": "x"}));
        assert_eq!(body.message_or(401), "Bad credentials");

        let body = ApiErrorBody::from_value(&json!({"error": "Forbidden"}));
        assert_eq!(body.message_or(403), "Forbidden");

        let body = ApiErrorBody::from_value(&json!({"status": 500}));
        assert_eq!(body.message_or(500), "HTTP error! status: 500");
    }

    #[test]
    fn test_course_from_server_json() {
        let course: Course = serde_json::from_value(json!({
            "courseId": 3,
            "title": "Injection moulding basics",
            "description": "Intro",
            "mode": "IN_PERSON",
            "status": "PUBLISHED",
            "category": "Process",
            "price": 450.0,
            "duration": 14,
            "createdAt": "2024-01-10T09:00:00",
            "updatedAt": "2024-01-10T09:00:00"
        }))
        .unwrap();
        assert_eq!(course.mode, CourseMode::InPerson);
        assert_eq!(course.duration, 14.0);
        assert!(course.instructor_id.is_none());
    }
}
