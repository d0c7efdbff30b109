use super::error::ClientError;

/// How often a request may log in again after the server rejected its token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenRetryPolicy {
    pub max_refreshes: u32,
}

impl Default for TokenRetryPolicy {
    fn default() -> Self {
        TokenRetryPolicy { max_refreshes: 1 }
    }
}

impl TokenRetryPolicy {
    /// `refreshes_done` counts the logins already spent on this request.
    pub fn should_refresh(&self, refreshes_done: u32, error: &ClientError) -> bool {
        matches!(error, ClientError::InvalidToken) && refreshes_done < self.max_refreshes
    }
}
