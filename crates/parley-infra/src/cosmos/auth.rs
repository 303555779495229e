//! Master-key request signing for the Cosmos DB REST API.
//!
//! Each request carries an authorization token: an HMAC-SHA256 over
//! `(verb, resource type, resource link, date)` keyed by the account's
//! base64 master key, itself base64-encoded and URL-escaped. The signing
//! date must match the `x-ms-date` header and both sides of the HMAC use
//! lowercase verb and date.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use parley_types::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Current time in the RFC 1123 shape Cosmos expects, lowercased for
/// signing. Sent verbatim as the `x-ms-date` header.
pub fn signing_date() -> String {
    Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
        .to_lowercase()
}

/// Build the authorization header value for one request.
///
/// `resource_link` is the link of the resource being addressed, e.g.
/// `dbs/parley/colls/chat_messages` for collection-level operations or
/// `dbs/parley/colls/chat_messages/docs/<id>` for point operations.
pub fn master_key_token(
    key: &SecretString,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, StorageError> {
    let key_bytes = BASE64
        .decode(key.expose_secret())
        .map_err(|e| StorageError::Backend(format!("master key is not valid base64: {e}")))?;

    let payload = format!("{}\n{}\n{}\n{}\n\n", verb.to_lowercase(), resource_type, resource_link, date);

    let mut mac = HmacSha256::new_from_slice(&key_bytes)
        .map_err(|e| StorageError::Backend(format!("master key rejected by hmac: {e}")))?;
    mac.update(payload.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned())
}
