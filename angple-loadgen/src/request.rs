//! The requests a virtual user can issue and what counts as a good response for each.
use angple_loadgen_core::Series;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::fmt;

pub const TEST_USERNAME: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpassword";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Request {
    BrowsePosts,
    ViewPost,
    ViewComments,
    ListBoards,
    ListUsers,
    HealthCheck,
    AuthLogin,
}

impl Request {
    pub const COUNT: usize = 7;

    pub const ALL: [Request; Request::COUNT] = [
        Request::BrowsePosts,
        Request::ViewPost,
        Request::ViewComments,
        Request::ListBoards,
        Request::ListUsers,
        Request::HealthCheck,
        Request::AuthLogin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Request::BrowsePosts => "browse_posts",
            Request::ViewPost => "view_post",
            Request::ViewComments => "view_comments",
            Request::ListBoards => "list_boards",
            Request::ListUsers => "list_users",
            Request::HealthCheck => "health_check",
            Request::AuthLogin => "auth_login",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Request::AuthLogin => Method::POST,
            _ => Method::GET,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Request::BrowsePosts => "/api/v2/boards/free/posts?page=1&per_page=20",
            Request::ViewPost => "/api/v2/boards/free/posts/1",
            Request::ViewComments => "/api/v2/boards/free/posts/1/comments",
            Request::ListBoards => "/api/v2/boards",
            Request::ListUsers => "/api/v2/users",
            Request::HealthCheck => "/health",
            Request::AuthLogin => "/api/v2/auth/login",
        }
    }

    /// Label of the pass/fail check recorded for every response.
    pub fn check(&self) -> &'static str {
        match self {
            Request::BrowsePosts => "post list status 200",
            Request::ViewPost => "post detail status 200 or 404",
            Request::ViewComments => "comments status 200 or 404",
            Request::ListBoards => "boards status 200",
            Request::ListUsers => "users status 200",
            Request::HealthCheck => "health ok",
            Request::AuthLogin => "login responds",
        }
    }

    pub fn accepts(&self, status: StatusCode) -> bool {
        match self {
            Request::ViewPost | Request::ViewComments => {
                status == StatusCode::OK || status == StatusCode::NOT_FOUND
            }
            Request::AuthLogin => status == StatusCode::OK || status == StatusCode::UNAUTHORIZED,
            _ => status == StatusCode::OK,
        }
    }

    /// Dedicated latency series, if the request has one.
    pub fn series(&self) -> Option<Series> {
        match self {
            Request::BrowsePosts => Some(Series::PostList),
            Request::ViewPost => Some(Series::PostDetail),
            Request::ViewComments => Some(Series::Comments),
            Request::AuthLogin => Some(Series::AuthLogin),
            Request::ListBoards | Request::ListUsers | Request::HealthCheck => None,
        }
    }

    /// Health checks are diagnostic only and stay out of the error rate.
    pub fn feeds_errors(&self) -> bool {
        !matches!(self, Request::HealthCheck)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JSON body of the login request.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub username: &'static str,
    pub password: &'static str,
}

impl Default for LoginRequest {
    fn default() -> Self {
        Self {
            username: TEST_USERNAME,
            password: TEST_PASSWORD,
        }
    }
}
