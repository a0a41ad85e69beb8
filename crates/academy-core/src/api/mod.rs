//! Academy REST API
//!
//! The request client, the endpoint table, and the JSON types the server
//! speaks. Authentication calls live on [`ApiClient`] next to the
//! feature-level fetches in `resources`.

pub mod client;
pub mod endpoints;
mod resources;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, BearerToken};
pub use types::{
    ApiErrorBody, AuthResponse, AuthResult, Certification, CertificationStatus, Company, Course,
    CourseMode, CourseStatus, Credentials, Enrollment, EnrollmentStatus, Event, Payment,
    PaymentMethod, PaymentStatus, RegisterRequest, Review, ReviewCreate, Role, Service, User,
};
