use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::truncate_text;

/// Canonical handle for a generated asset, usually a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetReference(String);

impl AssetReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The remote inference capability.
///
/// `invoke_raw` returns whatever the service produced. `invoke` narrows that
/// to one [`AssetReference`] with [`normalize_output`]; an output with no
/// usable reference is an error, never an empty string.
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;

    fn invoke_raw(&self, model: &str, input: &Map<String, Value>) -> Result<Value>;

    fn invoke(&self, model: &str, input: &Map<String, Value>) -> Result<AssetReference> {
        let output = self.invoke_raw(model, input)?;
        normalize_output(&output)
            .ok_or_else(|| anyhow!("{} returned no output for {model}", self.name()))
    }
}

/// Collapses a model output into one reference.
///
/// Accepts a bare string, a list (first usable element), or an object
/// (`url`, `audio`, `video`, `output`, `uri`, or its only field).
pub fn normalize_output(value: &Value) -> Option<AssetReference> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(AssetReference::new(trimmed))
            }
        }
        Value::Array(rows) => rows.iter().find_map(normalize_output),
        Value::Object(obj) => {
            for key in ["url", "audio", "video", "output", "uri"] {
                if let Some(found) = obj.get(key).and_then(normalize_output) {
                    return Some(found);
                }
            }
            if obj.len() == 1 {
                return obj.values().next().and_then(normalize_output);
            }
            None
        }
        _ => None,
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn InferenceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: InferenceProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn InferenceProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry() -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider::default());
    providers.register(ReplicateProvider::new());
    providers
}

/// Wraps a closure as a provider.
pub struct FnProvider<F> {
    name: String,
    invoke: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&str, &Map<String, Value>) -> Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, invoke: F) -> Self {
        Self {
            name: name.into(),
            invoke,
        }
    }
}

impl<F> InferenceProvider for FnProvider<F>
where
    F: Fn(&str, &Map<String, Value>) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke_raw(&self, model: &str, input: &Map<String, Value>) -> Result<Value> {
        (self.invoke)(model, input)
    }
}

/// Offline provider. Asset requests get `dryrun://<model>/<n>` references;
/// text requests (`max_new_tokens` present) get no output.
#[derive(Debug, Default)]
pub struct DryrunProvider {
    counter: AtomicU64,
}

impl InferenceProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn invoke_raw(&self, model: &str, input: &Map<String, Value>) -> Result<Value> {
        if input.contains_key("max_new_tokens") {
            return Ok(Value::Null);
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let name = model.split(':').next().unwrap_or(model).trim();
        Ok(Value::String(format!("dryrun://{name}/{idx:04}")))
    }
}

pub struct ReplicateProvider {
    api_base: String,
    http: HttpClient,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ReplicateProvider {
    pub fn new() -> Self {
        let api_base = env::var("REPLICATE_API_BASE")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "https://api.replicate.com/v1".to_string());
        Self::with_api_base(api_base)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        // `Prefer: wait` holds the connection for up to a minute.
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            api_base: api_base.into(),
            http,
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(600),
        }
    }

    pub fn api_key() -> Option<String> {
        non_empty_env("REPLICATE_API_TOKEN").or_else(|| non_empty_env("REPLICATE_API_KEY"))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Endpoint and body for one prediction. Pinned identifiers
    /// (`owner/name:version`) go through `/predictions`; bare `owner/name`
    /// identifiers use the model's own endpoint.
    pub fn prediction_request(&self, model: &str, input: &Map<String, Value>) -> (String, Value) {
        match model.trim().split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.api_base),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/predictions", self.api_base, model.trim()),
                json!({ "input": input }),
            ),
        }
    }

    fn poll_prediction(&self, poll_url: &str, api_key: &str) -> Result<Value> {
        let started = Instant::now();
        loop {
            let response = self
                .http
                .get(poll_url)
                .bearer_auth(api_key)
                .send()
                .with_context(|| format!("Replicate poll request failed ({poll_url})"))?;
            let payload = response_json_or_error("Replicate poll", response)?;
            let status = prediction_status(&payload);
            if status == "succeeded" {
                return Ok(payload);
            }
            if matches!(status.as_str(), "failed" | "canceled") {
                bail!("Replicate prediction {status}: {}", prediction_error(&payload));
            }
            if started.elapsed() >= self.poll_timeout {
                bail!(
                    "Replicate polling timed out after {:.1}s",
                    self.poll_timeout.as_secs_f64()
                );
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// `GET /account`; proves the token works.
    pub fn check_account(&self) -> Result<Value> {
        let Some(api_key) = Self::api_key() else {
            bail!("REPLICATE_API_TOKEN not set");
        };
        let url = format!("{}/account", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&api_key)
            .send()
            .with_context(|| format!("Replicate account request failed ({url})"))?;
        response_json_or_error("Replicate account", response)
    }

    /// `GET /models/<owner>/<name>`; the version suffix is ignored.
    pub fn check_model(&self, identifier: &str) -> Result<()> {
        let Some(api_key) = Self::api_key() else {
            bail!("REPLICATE_API_TOKEN not set");
        };
        let name = identifier.split(':').next().unwrap_or(identifier).trim();
        let url = format!("{}/models/{name}", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&api_key)
            .send()
            .with_context(|| format!("Replicate model request failed ({url})"))?;
        response_json_or_error("Replicate model", response)?;
        Ok(())
    }
}

impl Default for ReplicateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceProvider for ReplicateProvider {
    fn name(&self) -> &str {
        "replicate"
    }

    fn invoke_raw(&self, model: &str, input: &Map<String, Value>) -> Result<Value> {
        let Some(api_key) = Self::api_key() else {
            bail!("REPLICATE_API_TOKEN not set");
        };
        let (endpoint, payload) = self.prediction_request(model, input);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&api_key)
            .header("Prefer", "wait")
            .json(&payload)
            .send()
            .with_context(|| format!("Replicate request failed ({endpoint})"))?;
        let mut prediction = response_json_or_error("Replicate", response)?;
        let status = prediction_status(&prediction);
        if status != "succeeded" {
            if matches!(status.as_str(), "starting" | "processing") {
                let poll_url = prediction
                    .get("urls")
                    .and_then(Value::as_object)
                    .and_then(|obj| obj.get("get"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| anyhow!("Replicate prediction missing poll URL"))?
                    .to_string();
                prediction = self.poll_prediction(&poll_url, &api_key)?;
            } else {
                bail!(
                    "Replicate prediction {status}: {}",
                    prediction_error(&prediction)
                );
            }
        }
        Ok(prediction.get("output").cloned().unwrap_or(Value::Null))
    }
}

fn prediction_status(prediction: &Value) -> String {
    prediction
        .get("status")
        .and_then(Value::as_str)
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default()
}

fn prediction_error(prediction: &Value) -> String {
    match prediction.get("error") {
        Some(Value::String(text)) if !text.trim().is_empty() => truncate_text(text, 512),
        _ => truncate_text(&prediction.to_string(), 512),
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use serde_json::{json, Map, Value};

    use super::{
        default_provider_registry, normalize_output, DryrunProvider, FnProvider, HttpClient,
        InferenceProvider, ReplicateProvider,
    };

    #[test]
    fn normalize_accepts_string_object_and_list() {
        assert_eq!(
            normalize_output(&json!("https://cdn.example/a.png")).map(|r| r.into_string()),
            Some("https://cdn.example/a.png".to_string())
        );
        assert_eq!(
            normalize_output(&json!({"audio": "https://cdn.example/a.wav", "spectrogram": "https://cdn.example/s.png"}))
                .map(|r| r.into_string()),
            Some("https://cdn.example/a.wav".to_string())
        );
        assert_eq!(
            normalize_output(&json!({"file": "https://cdn.example/v.mp4"})).map(|r| r.into_string()),
            Some("https://cdn.example/v.mp4".to_string())
        );
        assert_eq!(
            normalize_output(&json!(["", "https://cdn.example/b.png", "https://cdn.example/c.png"]))
                .map(|r| r.into_string()),
            Some("https://cdn.example/b.png".to_string())
        );
    }

    #[test]
    fn normalize_rejects_empty_outputs() {
        assert_eq!(normalize_output(&Value::Null), None);
        assert_eq!(normalize_output(&json!("  ")), None);
        assert_eq!(normalize_output(&json!([])), None);
        assert_eq!(normalize_output(&json!({"a": 1, "b": 2})), None);
    }

    #[test]
    fn invoke_fails_when_provider_returns_nothing() {
        let provider = FnProvider::new("fake", |_model: &str, _input: &Map<String, Value>| {
            Ok(Value::Null)
        });
        let err = provider.invoke("owner/model", &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "fake returned no output for owner/model");
    }

    #[test]
    fn dryrun_references_are_sequential_and_strip_versions() -> anyhow::Result<()> {
        let provider = DryrunProvider::default();
        let first = provider.invoke("stability-ai/sdxl:39ed52f2", &Map::new())?;
        let second = provider.invoke("meta/musicgen", &Map::new())?;
        assert_eq!(first.as_str(), "dryrun://stability-ai/sdxl/0001");
        assert_eq!(second.as_str(), "dryrun://meta/musicgen/0002");

        let mut text_input = Map::new();
        text_input.insert("max_new_tokens".to_string(), json!(200));
        assert_eq!(provider.invoke_raw("meta/meta-llama-3-70b-instruct", &text_input)?, Value::Null);
        Ok(())
    }

    #[test]
    fn prediction_request_routes_by_identifier_shape() {
        let provider = ReplicateProvider::with_api_base("https://api.example/v1");
        let mut input = Map::new();
        input.insert("prompt".to_string(), json!("boat"));

        let (endpoint, body) = provider.prediction_request("stability-ai/sdxl:39ed52f2", &input);
        assert_eq!(endpoint, "https://api.example/v1/predictions");
        assert_eq!(body["version"], json!("39ed52f2"));
        assert_eq!(body["input"]["prompt"], json!("boat"));

        let (endpoint, body) = provider.prediction_request("black-forest-labs/flux-dev", &input);
        assert_eq!(
            endpoint,
            "https://api.example/v1/models/black-forest-labs/flux-dev/predictions"
        );
        assert!(body.get("version").is_none());
    }

    #[test]
    fn default_registry_has_dryrun_and_replicate() {
        let registry = default_provider_registry();
        assert_eq!(registry.names(), vec!["dryrun", "replicate"]);
        assert!(registry.get("dryrun").is_some());
        assert!(registry.get("openai").is_none());
    }

    /// Serves each body once, in order, one connection per response.
    fn serve_json(bodies: Vec<Value>) -> anyhow::Result<(String, thread::JoinHandle<usize>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        let handle = thread::spawn(move || {
            let mut served = 0;
            for body in bodies {
                let Ok((stream, _)) = listener.accept() else {
                    break;
                };
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut stream = reader.into_inner();
                if stream.write_all(response.as_bytes()).is_err() {
                    break;
                }
                served += 1;
            }
            served
        });
        Ok((base, handle))
    }

    fn polling_provider(base: &str, timeout: Duration) -> ReplicateProvider {
        ReplicateProvider {
            http: HttpClient::builder().no_proxy().build().unwrap(),
            poll_interval: Duration::from_millis(5),
            poll_timeout: timeout,
            ..ReplicateProvider::with_api_base(base)
        }
    }

    #[test]
    fn poll_returns_payload_once_prediction_succeeds() -> anyhow::Result<()> {
        let (base, server) = serve_json(vec![
            json!({"status": "processing"}),
            json!({"status": "succeeded", "output": ["https://cdn.example/out.png"]}),
        ])?;
        let provider = polling_provider(&base, Duration::from_secs(30));
        let payload = provider.poll_prediction(&format!("{base}/predictions/abc"), "token")?;
        assert_eq!(payload["output"][0], json!("https://cdn.example/out.png"));
        assert_eq!(server.join().unwrap(), 2);
        Ok(())
    }

    #[test]
    fn poll_reports_failed_and_canceled_predictions() -> anyhow::Result<()> {
        let (base, server) = serve_json(vec![
            json!({"status": "failed", "error": "NSFW content detected"}),
            json!({"status": "canceled"}),
        ])?;
        let provider = polling_provider(&base, Duration::from_secs(30));
        let url = format!("{base}/predictions/abc");

        let err = provider.poll_prediction(&url, "token").unwrap_err();
        assert!(err
            .to_string()
            .contains("Replicate prediction failed: NSFW content detected"));
        let err = provider.poll_prediction(&url, "token").unwrap_err();
        assert!(err.to_string().starts_with("Replicate prediction canceled"));
        assert_eq!(server.join().unwrap(), 2);
        Ok(())
    }

    #[test]
    fn poll_gives_up_after_timeout() -> anyhow::Result<()> {
        let (base, server) = serve_json(vec![json!({"status": "processing"})])?;
        let provider = polling_provider(&base, Duration::ZERO);
        let err = provider
            .poll_prediction(&format!("{base}/predictions/abc"), "token")
            .unwrap_err();
        assert!(err.to_string().contains("polling timed out"));
        assert_eq!(server.join().unwrap(), 1);
        Ok(())
    }
}
