//! REST endpoint paths, relative to the configured base URL

pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_REGISTER: &str = "/auth/register";
pub const AUTH_CURRENT_USER: &str = "/auth/me";
pub const AUTH_LOGOUT: &str = "/auth/logout";

pub const COMPANIES: &str = "/companies";
pub const COMPANIES_SEARCH: &str = "/companies/search";
pub const COMPANIES_BY_CITY: &str = "/companies/by-city";

pub const SERVICES: &str = "/services";

pub const COURSES: &str = "/courses";

pub const EVENTS: &str = "/events";

pub const ENROLLMENTS_ME: &str = "/enrollments/user";
pub const CERTIFICATIONS_ME: &str = "/certifications/my-certifications";
pub const PAYMENTS_ME: &str = "/payments/me";
pub const REVIEWS_ME: &str = "/reviews/me";

pub fn course(course_id: i64) -> String {
    format!("{}/{}", COURSES, course_id)
}

pub fn course_reviews(course_id: i64) -> String {
    format!("{}/{}/reviews", COURSES, course_id)
}
