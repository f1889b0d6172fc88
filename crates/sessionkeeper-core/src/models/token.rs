use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub remember: bool,
}

/// Response from `POST /auth/login` and `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_defaults_type() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token": "a.b.c"}"#).unwrap();
        assert_eq!(parsed.access_token, "a.b.c");
        assert_eq!(parsed.token_type, "bearer");
    }

    #[test]
    fn test_login_request_shape() {
        let body = LoginRequest {
            email: "owner@example.com",
            password: "hunter2",
            remember: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["email"], "owner@example.com");
        assert_eq!(json["remember"], true);
    }
}
