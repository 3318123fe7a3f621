//! HTTP client for one remote MPC key service endpoint
//!
//! The client never sees private key material. It asks the service for a
//! public key once, caches it for its whole lifetime, and then forwards signing
//! requests to the path named by that key. Every call is one round trip with
//! no retry; failures are split into transport (could not talk to the service)
//! and protocol (the service answered something unusable).

use crate::crypto::{PublicKey, Signature};
use crate::errors::{KeystoreError, Result};
use crate::keyservice::protocol::{
    parse_url, KeyServiceBinding, ProtocolVersion, PublicKeyResponse, SignRequest, SignResponse,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Deadline applied to key service requests unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by key service clients
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KeystoreError::ConfigError(format!("failed to build HTTP client: {}", e)))
}

/// Client bound to a single key service endpoint
#[derive(Debug)]
pub struct KeyServiceClient {
    raw_url: String,
    url: Url,
    version: ProtocolVersion,
    public_key: OnceCell<PublicKey>,
    http: reqwest::Client,
}

impl KeyServiceClient {
    /// Create a client with the default request deadline
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests expire after `timeout`
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = parse_url(url)?;
        Ok(Self::from_parts(url, parsed, http_client(timeout)?))
    }

    /// Create a client sharing an existing HTTP client
    pub fn with_http(url: &str, http: reqwest::Client) -> Result<Self> {
        let parsed = parse_url(url)?;
        Ok(Self::from_parts(url, parsed, http))
    }

    /// Create a client for a key whose public half is already known
    pub fn bound(url: &str, public_key: PublicKey) -> Result<Self> {
        Ok(Self::new(url)?.with_public_key(public_key))
    }

    /// Rebuild a client from its persisted binding
    pub fn from_binding(binding: &KeyServiceBinding, http: reqwest::Client) -> Result<Self> {
        let version = ProtocolVersion::from_u32(binding.version)?;
        let mut client = Self::with_http(&binding.url, http)?;
        client.version = version;
        if let Some(pk_hex) = &binding.pubkey {
            client = client.with_public_key(PublicKey::from_hex(pk_hex)?);
        }
        Ok(client)
    }

    fn from_parts(raw: &str, url: Url, http: reqwest::Client) -> Self {
        Self {
            raw_url: raw.to_string(),
            url,
            version: ProtocolVersion::CURRENT,
            public_key: OnceCell::new(),
            http,
        }
    }

    /// Bind a public key that is already known, skipping the fetch
    pub fn with_public_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = OnceCell::from(public_key);
        self
    }

    /// The endpoint exactly as it was given
    pub fn url(&self) -> &str {
        &self.raw_url
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The public key, if it has been fetched or bound
    pub fn cached_public_key(&self) -> Option<PublicKey> {
        self.public_key.get().copied()
    }

    /// Persisted form of this binding
    pub fn binding(&self) -> KeyServiceBinding {
        KeyServiceBinding {
            url: self.raw_url.clone(),
            pubkey: self.cached_public_key().map(|pk| pk.to_hex()),
            version: self.version.as_u32(),
        }
    }

    /// Fetch the public key on first use, then serve it from the cache
    pub async fn public_key(&self) -> Result<PublicKey> {
        self.public_key
            .get_or_try_init(|| self.fetch_public_key())
            .await
            .copied()
    }

    async fn fetch_public_key(&self) -> Result<PublicKey> {
        debug!("Fetching public key from key service {}", self.raw_url);

        let response = self.http.get(self.url.clone()).send().await?;
        let body: PublicKeyResponse = read_json(response).await?;

        if body.pk.is_empty() {
            return Err(KeystoreError::ProtocolError("missing public key".to_string()));
        }

        let public_key = PublicKey::from_hex(&body.pk)?;
        debug!("Key service {} returned public key {}", self.raw_url, public_key);
        Ok(public_key)
    }

    /// Ask the key service to sign `payload` under `domain` with the bound key
    ///
    /// The payload travels as a JSON string, so it must be UTF-8. Invalid
    /// sequences are replaced with U+FFFD before sending, and the returned
    /// signature then covers the replaced text rather than the original bytes.
    pub async fn sign(&self, payload: &[u8], domain: u64) -> Result<Signature> {
        let public_key = self.cached_public_key().ok_or_else(|| {
            KeystoreError::ProtocolError("public key not fetched from key service".to_string())
        })?;
        let endpoint = self.sign_endpoint(&public_key)?;

        let payload = String::from_utf8_lossy(payload);
        let request = SignRequest {
            payload: &payload,
            domain,
        };

        debug!("Requesting signature from {} (domain {})", endpoint, domain);

        let response = self.http.post(endpoint).json(&request).send().await?;
        let body: SignResponse = read_json(response).await?;

        if body.sign.is_empty() {
            return Err(KeystoreError::ProtocolError("missing signature".to_string()));
        }

        Signature::from_hex(&body.sign)
    }

    /// Like [`sign`](Self::sign), but gives up when `token` is cancelled
    pub async fn sign_cancellable(
        &self,
        payload: &[u8],
        domain: u64,
        token: &CancellationToken,
    ) -> Result<Signature> {
        tokio::select! {
            _ = token.cancelled() => Err(KeystoreError::TransportError(
                "key service request cancelled".to_string(),
            )),
            result = self.sign(payload, domain) => result,
        }
    }

    fn sign_endpoint(&self, public_key: &PublicKey) -> Result<Url> {
        let mut endpoint = self.url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| {
                KeystoreError::ConfigError(format!(
                    "keyService URL '{}' cannot carry a signing path",
                    self.raw_url
                ))
            })?
            .pop_if_empty()
            .push(&public_key.to_hex());
        Ok(endpoint)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(KeystoreError::ProtocolError(format!(
            "unexpected status {}",
            status
        )));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| KeystoreError::ProtocolError(format!("malformed response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestSigner, PUBKEY_HEX};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_client() {
        let client = KeyServiceClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.url(), "http://localhost:8080");
        assert_eq!(client.version(), ProtocolVersion::V1);
        assert!(client.cached_public_key().is_none());
    }

    #[test]
    fn test_url_kept_verbatim() {
        for url in [
            "http://localhost:8080",
            "https://mpc.example.com/signer",
            "http://10.0.0.1:8000/v1/",
        ] {
            let client = KeyServiceClient::new(url).unwrap();
            assert_eq!(client.url(), url);
        }
    }

    #[test]
    fn test_not_absolute() {
        for url in ["", "localhost", "bad", "/relative/path"] {
            let err = KeyServiceClient::new(url).unwrap_err();
            assert!(matches!(err, KeystoreError::ConfigError(_)));
            assert_eq!(
                err.to_string(),
                format!("keyService URL '{}' is not absolute", url)
            );
        }
    }

    #[test]
    fn test_binding_round_trip() {
        let pk = PublicKey::from_hex(PUBKEY_HEX).unwrap();
        let client = KeyServiceClient::new("http://localhost:8000")
            .unwrap()
            .with_public_key(pk);

        let binding = client.binding();
        assert_eq!(binding.pubkey.as_deref(), Some(PUBKEY_HEX));

        let rebuilt =
            KeyServiceClient::from_binding(&binding, http_client(DEFAULT_REQUEST_TIMEOUT).unwrap())
                .unwrap();
        assert_eq!(rebuilt.url(), "http://localhost:8000");
        assert_eq!(rebuilt.cached_public_key(), Some(pk));
    }

    #[tokio::test]
    async fn test_public_key_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pk": PUBKEY_HEX })))
            .expect(1)
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri()).unwrap();

        let first = client.public_key().await.unwrap();
        assert_eq!(first.to_hex(), PUBKEY_HEX);

        let second = client.public_key().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_public_key_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pk": "" })))
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri()).unwrap();
        let err = client.public_key().await.unwrap_err();
        assert!(matches!(err, KeystoreError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_public_key_not_a_point() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pk": "abcd" })))
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri()).unwrap();
        let err = client.public_key().await.unwrap_err();
        assert!(matches!(err, KeystoreError::CryptoError(_)));
        assert!(client.cached_public_key().is_none());
    }

    #[tokio::test]
    async fn test_public_key_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri()).unwrap();
        let err = client.public_key().await.unwrap_err();
        assert!(matches!(err, KeystoreError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 9 of localhost
        let client = KeyServiceClient::new("http://127.0.0.1:9").unwrap();
        let err = client.public_key().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_sign() {
        let signer = TestSigner::from_seed(7);
        let pk = signer.public_key();
        let expected = signer.sign(b"abcd", 0);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{}", pk.to_hex())))
            .and(body_json(json!({ "payload": "abcd", "domain": 0 })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "sign": expected.to_hex() })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri())
            .unwrap()
            .with_public_key(pk);

        let signature = client.sign(b"abcd", 0).await.unwrap();
        assert_eq!(signature, expected);
        assert!(signature.verify(b"abcd", &pk, 0));
    }

    #[tokio::test]
    async fn test_sign_under_base_path() {
        let signer = TestSigner::from_seed(8);
        let pk = signer.public_key();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/mpc/{}", pk.to_hex())))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "sign": signer.sign(b"data", 5).to_hex() }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&format!("{}/mpc", server.uri()))
            .unwrap()
            .with_public_key(pk);

        assert!(client.sign(b"data", 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_without_public_key() {
        let client = KeyServiceClient::new("http://localhost:8080").unwrap();
        let err = client.sign(b"abcd", 0).await.unwrap_err();
        assert!(matches!(err, KeystoreError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_sign_malformed_responses() {
        let pk = PublicKey::from_hex(PUBKEY_HEX).unwrap();

        let cases = [
            (ResponseTemplate::new(200).set_body_json(json!({ "sign": "" })), "protocol"),
            (ResponseTemplate::new(200).set_body_string("not json"), "protocol"),
            (ResponseTemplate::new(403), "protocol"),
            (ResponseTemplate::new(200).set_body_json(json!({ "sign": "zz" })), "crypto"),
            (ResponseTemplate::new(200).set_body_json(json!({ "sign": "abcd" })), "crypto"),
        ];

        for (template, kind) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(template)
                .mount(&server)
                .await;

            let client = KeyServiceClient::new(&server.uri())
                .unwrap()
                .with_public_key(pk);
            let err = client.sign(b"abcd", 0).await.unwrap_err();

            match kind {
                "protocol" => assert!(matches!(err, KeystoreError::ProtocolError(_)), "{}", err),
                _ => assert!(matches!(err, KeystoreError::CryptoError(_)), "{}", err),
            }
        }
    }

    #[tokio::test]
    async fn test_sign_timeout() {
        let signer = TestSigner::from_seed(9);
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "sign": signer.sign(b"x", 0).to_hex() }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = KeyServiceClient::with_timeout(&server.uri(), Duration::from_millis(100))
            .unwrap()
            .with_public_key(signer.public_key());

        let err = client.sign(b"x", 0).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_sign_cancelled() {
        let signer = TestSigner::from_seed(10);
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "sign": signer.sign(b"x", 0).to_hex() }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = KeyServiceClient::new(&server.uri())
            .unwrap()
            .with_public_key(signer.public_key());

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = client.sign_cancellable(b"x", 0, &token).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Key service transport error: key service request cancelled"
        );
    }
}
