use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AuthFileConfig;

/// Request authentication settings, fixed at start-up.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Bearer token for the dispatch API. None = auth disabled.
    pub bearer_token: Option<String>,
    /// GitHub webhook HMAC secret. None = signature verification disabled.
    pub github_webhook_secret: Option<String>,
    /// Reject webhooks outright when no secret is configured.
    pub require_webhook_signature: bool,
}

impl From<&AuthFileConfig> for AuthConfig {
    fn from(file: &AuthFileConfig) -> Self {
        Self {
            bearer_token: file.bearer_token.clone(),
            github_webhook_secret: file.github_webhook_secret.clone(),
            require_webhook_signature: file.require_webhook_signature,
        }
    }
}

/// Axum middleware that validates Bearer token authentication.
/// If no token is configured, all requests are allowed through.
pub async fn bearer_auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ref expected) = auth.bearer_token {
        let provided = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(token) if token == expected => {},
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    }

    Ok(next.run(request).await)
}

/// Verify a GitHub webhook HMAC-SHA256 signature.
/// `signature` is the `X-Hub-Signature-256` header value (e.g. "sha256=abcdef...").
pub fn verify_github_signature(signature: &str, secret: &str, body: &[u8]) -> bool {
    type HmacSha256 = Hmac<Sha256>;

    let Some(hex_sig) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(expected_bytes) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = <Hmac<Sha256>>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn verify_valid_signature() {
        let body = br#"{"ref":"feature/x","ref_type":"branch"}"#;
        assert!(verify_github_signature(&sign("whsec", body), "whsec", body));
    }

    #[test]
    fn signature_with_other_secret_or_body_fails() {
        let body = b"payload";
        let sig = sign("whsec", body);
        assert!(!verify_github_signature(&sig, "other", body));
        assert!(!verify_github_signature(&sig, "whsec", b"tampered"));
    }

    #[test]
    fn verify_malformed_signature() {
        assert!(!verify_github_signature("invalid", "secret", b"body"));
        assert!(!verify_github_signature("sha256=notvalidhex!", "secret", b"body"));
        assert!(!verify_github_signature("sha1=abcd", "secret", b"body"));
    }

    #[test]
    fn from_file_config_copies_settings() {
        let auth = AuthConfig::from(&AuthFileConfig::default());
        assert!(auth.bearer_token.is_none());
        assert!(auth.require_webhook_signature);
    }
}
