//! Request-scoped context threaded explicitly through handlers and actions.

use crate::db::DbUser;

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id from the access log (`x-request-id`).
    pub request_id: String,
    /// The authenticated caller.
    pub user: DbUser,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, user: DbUser) -> Self {
        Self {
            request_id: request_id.into(),
            user,
        }
    }

    pub fn realm_id(&self) -> i64 {
        self.user.realm_id
    }
}
