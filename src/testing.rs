//! Test helpers: deterministic BLS signers and a stub key service

use crate::crypto::bls::{domain_aug, SIGNING_DST};
use crate::crypto::{PublicKey, Signature};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// A public key known to decode
pub(crate) const PUBKEY_HEX: &str = "a99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c";

/// Local stand-in for the key shares held by the MPC service
pub(crate) struct TestSigner {
    sk: blst::min_pk::SecretKey,
}

impl TestSigner {
    pub fn from_seed(seed: u8) -> Self {
        let ikm = [seed; 32];
        let sk = blst::min_pk::SecretKey::key_gen(&ikm, &[]).expect("valid ikm");
        Self { sk }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(&self.sk.sk_to_pk().compress()).expect("valid public key")
    }

    pub fn sign(&self, payload: &[u8], domain: u64) -> Signature {
        let sig = self.sk.sign(payload, SIGNING_DST, &domain_aug(domain));
        Signature::from_bytes(&sig.compress()).expect("valid signature")
    }
}

/// Hands out the signers' public keys in turn, one per `GET /`
struct NewKeyResponder {
    signers: Arc<Vec<TestSigner>>,
    next: AtomicUsize,
}

impl Respond for NewKeyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let idx = self.next.fetch_add(1, Ordering::SeqCst) % self.signers.len();
        ResponseTemplate::new(200)
            .set_body_json(json!({ "pk": self.signers[idx].public_key().to_hex() }))
    }
}

#[derive(Deserialize)]
struct SignBody {
    payload: String,
    domain: u64,
}

/// Signs with whichever signer owns the key named in the path
struct SignResponder {
    signers: Arc<Vec<TestSigner>>,
}

impl Respond for SignResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let key_hex = request.url.path().trim_start_matches('/');
        let Some(signer) = self
            .signers
            .iter()
            .find(|s| s.public_key().to_hex() == key_hex)
        else {
            return ResponseTemplate::new(404);
        };

        let Ok(body) = serde_json::from_slice::<SignBody>(&request.body) else {
            return ResponseTemplate::new(400);
        };

        let sig = signer.sign(body.payload.as_bytes(), body.domain);
        ResponseTemplate::new(200).set_body_json(json!({ "sign": sig.to_hex() }))
    }
}

/// An in-process key service backed by `count` deterministic signers
pub(crate) struct StubKeyService {
    pub server: MockServer,
    pub signers: Arc<Vec<TestSigner>>,
}

impl StubKeyService {
    pub async fn start(count: usize) -> Self {
        let signers: Arc<Vec<TestSigner>> =
            Arc::new((1..=count as u8).map(TestSigner::from_seed).collect());
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(NewKeyResponder {
                signers: signers.clone(),
                next: AtomicUsize::new(0),
            })
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(SignResponder {
                signers: signers.clone(),
            })
            .mount(&server)
            .await;

        Self { server, signers }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of signing requests the service has seen
    pub async fn sign_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|reqs| {
                reqs.iter()
                    .filter(|r| r.method.as_str() == "POST")
                    .count()
            })
            .unwrap_or(0)
    }
}
