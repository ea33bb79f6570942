use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Scheme tag stored in front of every password hash
const PASSWORD_SCHEME: &str = "pbkdf2-sha256";

const DERIVED_KEY_LEN: usize = 32;

/// Fixed JOSE header for HS256 tokens
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// =============================================================================
// Password Hashing
// =============================================================================

/// Combine a password with the server-side pepper
///
/// `peppered = SHA256(password + pepper)`. The pepper lives in the
/// environment, never in the database, so a leaked `users` table alone is
/// not enough to mount a dictionary attack.
pub fn apply_pepper(password: &str, pepper: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(pepper.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password for storage
///
/// Format: `pbkdf2-sha256$<iterations>$<salt hex>$<key hex>`
pub fn hash_password(password: &str, pepper: &str, iterations: u32) -> String {
    let salt = uuid::Uuid::new_v4();
    let key = derive_key(password, pepper, salt.as_bytes(), iterations);

    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        iterations,
        hex::encode(salt.as_bytes()),
        hex::encode(key)
    )
}

/// Check a password against a stored hash
///
/// Unknown schemes and malformed hashes never verify.
pub fn verify_password(password: &str, pepper: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        tracing::warn!("Malformed password hash in storage");
        return false;
    };

    if scheme != PASSWORD_SCHEME {
        tracing::warn!("Unknown password hash scheme: {}", scheme);
        return false;
    }

    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        tracing::warn!("Malformed password hash in storage");
        return false;
    };

    let key = derive_key(password, pepper, &salt, iterations);
    constant_time_eq(&key, &expected)
}

fn derive_key(password: &str, pepper: &str, salt: &[u8], iterations: u32) -> [u8; DERIVED_KEY_LEN] {
    let peppered = apply_pepper(password, pepper);
    let mut key = [0u8; DERIVED_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(peppered.as_bytes(), salt, iterations.max(1), &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// HMAC
// =============================================================================

/// Sign data with HMAC-SHA256
fn sign(data: &[u8], secret: &str) -> Option<Vec<u8>> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return None;
        }
    };
    mac.update(data);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Verify an HMAC-SHA256 signature in constant time
fn verify_hmac(data: &[u8], signature: &[u8], secret: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return false;
        }
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

// =============================================================================
// JSON Web Tokens (HS256)
// =============================================================================

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub name: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, email: &str, name: &str, now: i64, lifetime_secs: i64) -> Self {
        Self {
            user_id,
            email: email.to_string(),
            name: name.to_string(),
            iat: now,
            exp: now + lifetime_secs,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

/// Issue a signed HS256 token
pub fn issue_token(claims: &Claims, secret: &str) -> Option<String> {
    let payload = serde_json::to_vec(claims).ok()?;
    let signing_input = format!(
        "{}.{}",
        base64url_encode(JWT_HEADER.as_bytes()),
        base64url_encode(&payload)
    );
    let signature = sign(signing_input.as_bytes(), secret)?;

    Some(format!("{}.{}", signing_input, base64url_encode(&signature)))
}

/// Verify a token's signature and expiry and return its claims
pub fn verify_token(token: &str, secret: &str, now: i64) -> Result<Claims, TokenError> {
    let (signing_input, signature) = token.trim().rsplit_once('.').ok_or(TokenError::Malformed)?;
    let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;
    if payload.contains('.') {
        return Err(TokenError::Malformed);
    }

    let header_bytes = base64url_decode(header).map_err(|_| TokenError::Malformed)?;
    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
    if header["alg"] != "HS256" {
        return Err(TokenError::Malformed);
    }

    let signature = base64url_decode(signature).map_err(|_| TokenError::Malformed)?;
    if !verify_hmac(signing_input.as_bytes(), &signature, secret) {
        return Err(TokenError::BadSignature);
    }

    let payload = base64url_decode(payload).map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

// =============================================================================
// Base64url (RFC 4648 §5, unpadded)
// =============================================================================

const BASE64URL_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Encode to unpadded base64url, as JWT segments require
pub fn base64url_encode(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0] as usize;
        let b1 = chunk.get(1).copied().unwrap_or(0) as usize;
        let b2 = chunk.get(2).copied().unwrap_or(0) as usize;

        result.push(BASE64URL_ALPHABET[b0 >> 2] as char);
        result.push(BASE64URL_ALPHABET[((b0 & 0x03) << 4) | (b1 >> 4)] as char);

        if chunk.len() > 1 {
            result.push(BASE64URL_ALPHABET[((b1 & 0x0f) << 2) | (b2 >> 6)] as char);
        }

        if chunk.len() > 2 {
            result.push(BASE64URL_ALPHABET[b2 & 0x3f] as char);
        }
    }

    result
}

/// Decode unpadded base64url. Trailing `=` padding is tolerated.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>, String> {
    let input = input.trim_end_matches('=');
    if input.len() % 4 == 1 {
        return Err("Invalid base64 length".to_string());
    }

    let values = input
        .chars()
        .map(decode_base64url_char)
        .collect::<Result<Vec<u8>, String>>()?;

    let mut result = Vec::with_capacity(values.len() * 3 / 4);

    for chunk in values.chunks(4) {
        result.push((chunk[0] << 2) | (chunk[1] >> 4));
        if chunk.len() > 2 {
            result.push((chunk[1] << 4) | (chunk[2] >> 2));
        }
        if chunk.len() > 3 {
            result.push((chunk[2] << 6) | chunk[3]);
        }
    }

    Ok(result)
}

fn decode_base64url_char(c: char) -> Result<u8, String> {
    match c {
        'A'..='Z' => Ok(c as u8 - b'A'),
        'a'..='z' => Ok(c as u8 - b'a' + 26),
        '0'..='9' => Ok(c as u8 - b'0' + 52),
        '-' => Ok(62),
        '_' => Ok(63),
        _ => Err(format!("Invalid base64url character: {}", c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret";

    // =========================================================================
    // Password Tests
    // =========================================================================

    #[test]
    fn test_apply_pepper_deterministic() {
        assert_eq!(apply_pepper("hunter2", "p"), apply_pepper("hunter2", "p"));
        assert_ne!(apply_pepper("hunter2", "p1"), apply_pepper("hunter2", "p2"));
        assert_eq!(apply_pepper("hunter2", "p").len(), 64);
    }

    #[test]
    fn test_hash_and_verify_password() {
        let stored = hash_password("secret123", "pepper", 10);
        assert!(stored.starts_with("pbkdf2-sha256$10$"));
        assert!(verify_password("secret123", "pepper", &stored));
        assert!(!verify_password("secret124", "pepper", &stored));
        assert!(!verify_password("secret123", "other-pepper", &stored));
    }

    #[test]
    fn test_hash_password_is_salted() {
        let a = hash_password("secret123", "", 10);
        let b = hash_password("secret123", "", 10);
        assert_ne!(a, b);
        assert!(verify_password("secret123", "", &a));
        assert!(verify_password("secret123", "", &b));
    }

    #[test]
    fn test_verify_password_rejects_malformed_hashes() {
        assert!(!verify_password("x", "", ""));
        assert!(!verify_password("x", "", "plaintext"));
        assert!(!verify_password("x", "", "bcrypt$10$aa$bb"));
        assert!(!verify_password("x", "", "pbkdf2-sha256$ten$aa$bb"));
        assert!(!verify_password("x", "", "pbkdf2-sha256$10$zz$bb"));
        assert!(!verify_password("x", "", "pbkdf2-sha256$10$aa$bb$cc"));
    }

    // =========================================================================
    // Token Tests
    // =========================================================================

    #[test]
    fn test_issue_and_verify_token() {
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 3_600);
        let token = issue_token(&claims, SECRET).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify_token(&token, SECRET, 1_500), Ok(claims));
    }

    #[test]
    fn test_token_uses_userid_claim_name() {
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 3_600);
        let token = issue_token(&claims, SECRET).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&base64url_decode(payload).unwrap()).unwrap();

        assert_eq!(json["userId"], 7);
        assert_eq!(json["exp"], 4_600);
    }

    #[test]
    fn test_token_expired() {
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 60);
        let token = issue_token(&claims, SECRET).unwrap();
        assert_eq!(verify_token(&token, SECRET, 1_060), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_wrong_secret() {
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 60);
        let token = issue_token(&claims, SECRET).unwrap();
        assert_eq!(
            verify_token(&token, "another-secret", 1_001),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_token_tampered_payload() {
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 60);
        let token = issue_token(&claims, SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims::new(8, "ana@example.com", "Ana", 1_000, 60);
        let forged_payload = base64url_encode(&serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            verify_token(&tampered, SECRET, 1_001),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_token_malformed() {
        assert_eq!(verify_token("", SECRET, 0), Err(TokenError::Malformed));
        assert_eq!(verify_token("abc", SECRET, 0), Err(TokenError::Malformed));
        assert_eq!(verify_token("a.b.c.d", SECRET, 0), Err(TokenError::Malformed));
        assert_eq!(verify_token("!!.??.##", SECRET, 0), Err(TokenError::Malformed));
    }

    #[test]
    fn test_token_rejects_other_algorithms() {
        let header = base64url_encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = Claims::new(7, "ana@example.com", "Ana", 1_000, 60);
        let payload = base64url_encode(&serde_json::to_vec(&claims).unwrap());
        let token = format!("{}.{}.", header, payload);
        assert_eq!(verify_token(&token, SECRET, 1_001), Err(TokenError::Malformed));
    }

    // =========================================================================
    // Base64url Tests
    // =========================================================================

    #[test]
    fn test_base64url_known_values() {
        assert_eq!(base64url_encode(b""), "");
        assert_eq!(base64url_encode(b"f"), "Zg");
        assert_eq!(base64url_encode(b"fo"), "Zm8");
        assert_eq!(base64url_encode(b"foo"), "Zm9v");
        assert_eq!(base64url_encode(b"Hello"), "SGVsbG8");
        // 0xfb 0xff encodes with url-safe characters
        assert_eq!(base64url_encode(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn test_base64url_decode() {
        assert_eq!(base64url_decode("SGVsbG8").unwrap(), b"Hello");
        assert_eq!(base64url_decode("SGVsbG8=").unwrap(), b"Hello");
        assert_eq!(base64url_decode("-_8").unwrap(), vec![0xfb, 0xff]);
        assert!(base64url_decode("SGVs+G8").is_err());
        assert!(base64url_decode("SGVsb").is_err());
    }
}
