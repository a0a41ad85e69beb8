//! Feature-level fetches
//!
//! Thin typed wrappers over [`ApiClient::request`]. They carry whatever
//! token the session manager last set, and a `null` body on a list endpoint
//! reads as an empty list.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::client::ApiClient;
use super::endpoints;
use super::types::{
    Certification, Company, Course, Enrollment, Event, Payment, Review, ReviewCreate, Role,
    Service,
};

impl ApiClient {
    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        Ok(self.get(path).await?.unwrap_or_default())
    }

    // ========== Companies ==========

    pub async fn companies(&self) -> Result<Vec<Company>> {
        self.list(endpoints::COMPANIES).await
    }

    pub async fn search_companies(&self, query: &str) -> Result<Vec<Company>> {
        let url = self.url_with_query(endpoints::COMPANIES_SEARCH, &[("query", query)])?;
        self.list(&url).await
    }

    pub async fn companies_by_city(&self, city: &str) -> Result<Vec<Company>> {
        let url = self.url_with_query(endpoints::COMPANIES_BY_CITY, &[("city", city)])?;
        self.list(&url).await
    }

    // ========== Catalog ==========

    pub async fn services(&self) -> Result<Vec<Service>> {
        self.list(endpoints::SERVICES).await
    }

    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.list(endpoints::COURSES).await
    }

    pub async fn course(&self, course_id: i64) -> Result<Course> {
        self.get(&endpoints::course(course_id))
            .await?
            .ok_or_else(|| Error::MalformedResponse(format!("course {} came back empty", course_id)))
    }

    pub async fn events(&self) -> Result<Vec<Event>> {
        self.list(endpoints::EVENTS).await
    }

    /// Roles a new account may be registered with
    pub fn roles(&self) -> &'static [Role] {
        &Role::ALL
    }

    // ========== Signed-in user's records ==========

    pub async fn my_enrollments(&self) -> Result<Vec<Enrollment>> {
        self.list(endpoints::ENROLLMENTS_ME).await
    }

    pub async fn my_certifications(&self) -> Result<Vec<Certification>> {
        self.list(endpoints::CERTIFICATIONS_ME).await
    }

    pub async fn my_payments(&self) -> Result<Vec<Payment>> {
        self.list(endpoints::PAYMENTS_ME).await
    }

    pub async fn my_reviews(&self) -> Result<Vec<Review>> {
        self.list(endpoints::REVIEWS_ME).await
    }

    /// Post a review; servers that answer 204 get `None`
    pub async fn create_course_review(
        &self,
        course_id: i64,
        review: &ReviewCreate,
    ) -> Result<Option<Review>> {
        if !(1..=5).contains(&review.rating) {
            return Err(Error::InvalidInput(format!(
                "Rating must be between 1 and 5 (got {})",
                review.rating
            )));
        }
        self.post(&endpoints::course_reviews(course_id), review).await
    }
}
