#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use api_gate::app::{build_router, build_state};
use api_gate::config::Config;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, header};
use axum::routing::get;
use axum::{Json, Router};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TENANT: &str = "0b7c4e2a-5d1f-4a8e-9c3b-2f6d8e1a7b90";
pub const AUDIENCE: &str = "api://gate";

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn jwk(key: &SigningKey, kid: &str) -> Value {
    json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes()),
        "kid": kid,
        "alg": "EdDSA",
        "use": "sig"
    })
}

#[derive(Clone)]
struct IdpState {
    issuer: String,
    jwks_uri: String,
    keys: Arc<RwLock<Vec<Value>>>,
    discovery_hits: Arc<AtomicUsize>,
}

async fn discovery(State(state): State<IdpState>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "issuer": state.issuer,
        "jwks_uri": state.jwks_uri,
        "id_token_signing_alg_values_supported": ["EdDSA"]
    }))
}

async fn jwks(State(state): State<IdpState>) -> Json<Value> {
    let keys = state.keys.read().unwrap().clone();
    Json(json!({ "keys": keys }))
}

/// In-process identity provider: discovery document + JWKS on 127.0.0.1:0.
pub struct Idp {
    pub addr: SocketAddr,
    pub issuer: String,
    keys: Arc<RwLock<Vec<Value>>>,
    discovery_hits: Arc<AtomicUsize>,
    _server: JoinHandle<()>,
}

impl Idp {
    pub async fn start(keys: &[(&SigningKey, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let base = format!("http://{addr}");
        let issuer = format!("{base}/{TENANT}/v2.0");

        let state = IdpState {
            issuer: issuer.clone(),
            jwks_uri: format!("{base}/discovery/v2.0/keys"),
            keys: Arc::new(RwLock::new(Vec::new())),
            discovery_hits: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/discovery/v2.0/keys", get(jwks))
            .with_state(state.clone());
        let server = axum::serve(listener, app.into_make_service());
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        let idp = Self {
            addr,
            issuer,
            keys: state.keys,
            discovery_hits: state.discovery_hits,
            _server: handle,
        };
        idp.publish(keys);
        idp
    }

    /// Replace the published key set.
    pub fn publish(&self, keys: &[(&SigningKey, &str)]) {
        *self.keys.write().unwrap() = keys.iter().map(|(key, kid)| jwk(key, kid)).collect();
    }

    pub fn metadata_url(&self) -> String {
        format!("http://{}/.well-known/openid-configuration", self.addr)
    }

    pub fn discovery_hits(&self) -> usize {
        self.discovery_hits.load(Ordering::SeqCst)
    }
}

pub fn config(metadata_url: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![
        ("AUTH_TENANT_ID".into(), TENANT.into()),
        ("AUTH_METADATA_URL".into(), metadata_url.into()),
        ("AUTH_AUDIENCES".into(), AUDIENCE.into()),
        ("TRUST_ANCHOR_FETCH_TIMEOUT_SECONDS".into(), "2".into()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    Config::from_lookup(move |key: &str| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("config")
}

pub async fn app(idp: &Idp, extra: &[(&str, &str)]) -> Router {
    app_with_config(config(&idp.metadata_url(), extra)).await
}

pub async fn app_with_config(config: Config) -> Router {
    let state = build_state(&config).await.expect("state");
    build_router(state, &config)
}

/// Claims for a token from `issuer`, merged with `extra` (extra wins).
pub fn claims(issuer: &str, extra: Value) -> Value {
    let now = chrono::Utc::now().timestamp();
    let mut claims = json!({
        "iss": issuer,
        "sub": "user-1",
        "aud": AUDIENCE,
        "iat": now,
        "nbf": now,
        "exp": now + 600,
    });
    if let (Some(base), Value::Object(extra)) = (claims.as_object_mut(), extra) {
        base.extend(extra);
    }
    claims
}

pub fn mint(key: &SigningKey, kid: &str, claims: &Value) -> String {
    let der = key.to_pkcs8_der().expect("pkcs8 der");
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(der.as_bytes())).expect("token")
}

pub fn request(method: Method, path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
