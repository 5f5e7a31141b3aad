//! Login flow result extraction for the embedded identity-provider page.

use serde::Serialize;

const LOGIN_SUCCESS_PREFIX: &str = "/profile.html?token=";
const LOGIN_FAILURE_PREFIX: &str = "/error.html?errorCode=";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "LoginPayload")]
pub enum LoginResult {
    Success { token: String },
    Failure { error_code: Option<String> },
}

impl LoginResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginResult::Success { .. })
    }
}

/// Wire shape posted back to the login screen.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
}

impl From<LoginResult> for LoginPayload {
    fn from(result: LoginResult) -> Self {
        match result {
            LoginResult::Success { token } => Self {
                success: true,
                token: Some(token),
                error_code: None,
            },
            LoginResult::Failure { error_code } => Self {
                success: false,
                token: None,
                error_code,
            },
        }
    }
}

/// Classify a URL visited by the login page.
///
/// Returns `None` when the URL is not part of the login flow.
pub fn extract_login_result(url: &str) -> Option<LoginResult> {
    if let Some(pos) = url.find(LOGIN_SUCCESS_PREFIX) {
        let token = &url[pos + LOGIN_SUCCESS_PREFIX.len()..];
        return Some(if token.is_empty() {
            LoginResult::Failure { error_code: None }
        } else {
            LoginResult::Success {
                token: token.to_string(),
            }
        });
    }

    url.find(LOGIN_FAILURE_PREFIX).map(|pos| {
        let code = &url[pos + LOGIN_FAILURE_PREFIX.len()..];
        LoginResult::Failure {
            error_code: (!code.is_empty()).then(|| code.to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_token_on_success() {
        assert_eq!(
            extract_login_result("https://x/profile.html?token=abc123"),
            Some(LoginResult::Success {
                token: "abc123".into()
            })
        );
    }

    #[test]
    fn empty_token_is_a_failure() {
        assert_eq!(
            extract_login_result("https://x/profile.html?token="),
            Some(LoginResult::Failure { error_code: None })
        );
    }

    #[test]
    fn extracts_error_code() {
        assert_eq!(
            extract_login_result("https://x/error.html?errorCode=19"),
            Some(LoginResult::Failure {
                error_code: Some("19".into())
            })
        );
        assert_eq!(
            extract_login_result("https://x/error.html?errorCode="),
            Some(LoginResult::Failure { error_code: None })
        );
    }

    #[test]
    fn unrelated_url_is_ignored() {
        assert_eq!(extract_login_result("https://x/other.html"), None);
    }

    #[test]
    fn success_prefix_wins_over_failure_prefix() {
        let url = "https://x/error.html?errorCode=1/profile.html?token=t";
        assert!(extract_login_result(url).is_some_and(|result| result.is_success()));
    }

    #[test]
    fn serializes_like_the_login_contract() {
        let success = LoginResult::Success {
            token: "abc".into(),
        };
        assert_eq!(
            serde_json::to_string(&success).unwrap(),
            r#"{"success":true,"token":"abc"}"#
        );

        let failure = LoginResult::Failure {
            error_code: Some("42".into()),
        };
        assert_eq!(
            serde_json::to_string(&failure).unwrap(),
            r#"{"success":false,"errorCode":"42"}"#
        );

        let bare = LoginResult::Failure { error_code: None };
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#"{"success":false}"#);
    }
}
