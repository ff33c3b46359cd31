// API client module: a small blocking client for the Freckle REST API.
// Every call is a single synchronous request; nothing is retried.

use crate::config::Config;
use crate::error::{single_line, ApiError, FreckError, FreckResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_SERVICE_HOST: &str = "letsfreckle.com";
pub const TOKEN_HEADER: &str = "X-FreckleToken";

/// Username/password pair, only used to exchange credentials for a token.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub user: String,
    pub password: String,
}

/// An API call: path segments below `/api/`, optional query pairs,
/// optional JSON body and optional explicit basic-auth credentials.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub basic_auth: Option<BasicCredentials>,
}

impl ApiRequest {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApiRequest {
            path: path.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn basic_auth(mut self, credentials: BasicCredentials) -> Self {
        self.basic_auth = Some(credentials);
        self
    }
}

/// A fully resolved HTTP request, as handed to a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends one HTTP request and returns the response body text.
/// Implementations must map non-2xx statuses to `ApiError::Status`.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<String, ApiError>;
}

/// `Transport` backed by a reqwest blocking client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> FreckResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<String, ApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| ApiError::Transport(e.to_string()))?;
            headers.insert(name, value);
        }

        let mut req = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let res = req
            .send()
            .map_err(|e| ApiError::Transport(single_line(&e.to_string())))?;
        let status = res.status();
        let text = res.text().unwrap_or_default();
        if !status.is_success() {
            debug!("{} answered {} with body {:?}", request.url, status, text);
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        Ok(text)
    }
}

/// Lazily populated name -> id mapping for a remote collection. Once
/// filled it is never fetched again during the process; `insert` is the
/// only way it changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    loaded: bool,
    entries: BTreeMap<String, u64>,
}

impl ResourceCache {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn fill(&mut self, entries: impl IntoIterator<Item = (String, u64)>) {
        self.entries.extend(entries);
        self.loaded = true;
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: u64) {
        self.entries.insert(name.into(), id);
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct ProjectEnvelope {
    project: Project,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct TagEnvelope {
    tag: Tag,
}

#[derive(Deserialize, Debug)]
struct TokenEnvelope {
    user: TokenUser,
}

#[derive(Deserialize, Debug)]
struct TokenUser {
    api_auth_token: String,
}

#[derive(Deserialize, Debug)]
struct SelfEnvelope {
    user: SelfUser,
}

#[derive(Deserialize, Debug)]
struct SelfUser {
    id: Value,
}

/// Client for one account. Owns the configuration record it was built
/// from and the project/tag caches.
#[derive(Debug)]
pub struct ApiClient<T: Transport = HttpTransport> {
    transport: T,
    host: String,
    config: Config,
    projects: ResourceCache,
    tags: ResourceCache,
}

impl ApiClient<HttpTransport> {
    /// Create a client using the reqwest transport. The service host is
    /// taken from `FRECK_SERVICE_HOST`, or defaults to letsfreckle.com.
    pub fn from_env(config: Config) -> FreckResult<Self> {
        Ok(ApiClient::new(config, HttpTransport::new()?, service_host()))
    }
}

/// Service host from `FRECK_SERVICE_HOST`, or the public default.
pub fn service_host() -> String {
    std::env::var("FRECK_SERVICE_HOST").unwrap_or_else(|_| DEFAULT_SERVICE_HOST.into())
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: Config, transport: T, host: impl Into<String>) -> Self {
        ApiClient {
            transport,
            host: host.into(),
            config,
            projects: ResourceCache::default(),
            tags: ResourceCache::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `https://{subdomain}.{host}/api/`
    pub fn base_url(&self) -> String {
        format!("https://{}.{}/api/", self.config.subdomain(), self.host)
    }

    fn build(&self, request: &ApiRequest) -> Result<HttpRequest, ApiError> {
        let mut url = format!("{}{}.json", self.base_url(), request.path.join("/"));
        if !request.query.is_empty() {
            url = Url::parse_with_params(&url, &request.query)
                .map_err(|e| ApiError::Transport(e.to_string()))?
                .to_string();
        }

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        match &request.basic_auth {
            Some(creds) => {
                let encoded = BASE64.encode(format!("{}:{}", creds.user, creds.password));
                headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
            }
            None => {
                let token = self.config.token.clone().unwrap_or_default();
                headers.push((TOKEN_HEADER.to_string(), token));
            }
        }

        let body = request
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let method = if body.is_some() {
            Method::POST
        } else {
            Method::GET
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Issue one request. An empty response body yields `None`.
    pub fn request(&self, request: &ApiRequest) -> Result<Option<Value>, ApiError> {
        let http = self.build(request)?;
        debug!("Requesting {} with payload {:?}", http.url, http.body);

        let text = self.transport.send(&http)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn fetch<D: DeserializeOwned>(&self, request: &ApiRequest) -> Result<D, ApiError> {
        let value = self
            .request(request)?
            .ok_or_else(|| ApiError::Decode("empty response".into()))?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Exchange an email/password pair for the account's API token.
    pub fn exchange_token(&self, credentials: BasicCredentials) -> Result<String, ApiError> {
        let request = ApiRequest::new(["user", "api_auth_token"]).basic_auth(credentials);
        let envelope: TokenEnvelope = self.fetch(&request)?;
        Ok(envelope.user.api_auth_token)
    }

    /// Remote id of the authenticated user, rendered as text.
    pub fn current_user_id(&self) -> Result<String, ApiError> {
        let envelope: SelfEnvelope = self.fetch(&ApiRequest::new(["users", "self"]))?;
        Ok(match envelope.user.id {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Project name -> id, fetched on first use.
    pub fn projects(&mut self) -> Result<&BTreeMap<String, u64>, ApiError> {
        if !self.projects.is_loaded() {
            let list: Vec<ProjectEnvelope> = self.fetch(&ApiRequest::new(["projects"]))?;
            self.projects
                .fill(list.into_iter().map(|e| (e.project.name, e.project.id)));
        }
        Ok(self.projects.entries())
    }

    /// Tag name -> id, fetched on first use.
    pub fn tags(&mut self) -> Result<&BTreeMap<String, u64>, ApiError> {
        if !self.tags.is_loaded() {
            let list: Vec<TagEnvelope> = self.fetch(&ApiRequest::new(["tags"]))?;
            self.tags.fill(list.into_iter().map(|e| (e.tag.name, e.tag.id)));
        }
        Ok(self.tags.entries())
    }

    /// The explicit name if given, else the configured default.
    pub fn resolve_project_name(&self, explicit: Option<&str>) -> FreckResult<String> {
        explicit
            .or_else(|| self.config.default_project())
            .map(str::to_string)
            .ok_or(FreckError::NoProjectSpecified)
    }

    /// Create the project unless it already exists. Returns whether a
    /// remote project was created. When the service echoes the new
    /// project back, it is added to the cache.
    pub fn create_project(&mut self, name: Option<&str>) -> FreckResult<bool> {
        let name = self.resolve_project_name(name)?;
        if self.projects()?.contains_key(&name) {
            return Ok(false);
        }

        let body = serde_json::json!({ "project": { "name": name } });
        let response = self.request(&ApiRequest::new(["projects"]).body(body))?;
        match response.and_then(|v| serde_json::from_value::<ProjectEnvelope>(v).ok()) {
            Some(created) => self.projects.insert(created.project.name, created.project.id),
            None => tracing::warn!(
                "The service did not return the new project '{}'; it cannot be used until the next run",
                name
            ),
        }
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Transport that replays canned responses and records every request.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<String, ApiError>>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, body: &str) -> Self {
            self.responses.borrow_mut().push_back(Ok(body.to_string()));
            self
        }

        pub fn fail(self, status: u16) -> Self {
            self.responses
                .borrow_mut()
                .push_back(Err(ApiError::from_status(status, "<html>\n</html>")));
            self
        }

        pub fn sent(&self) -> Vec<HttpRequest> {
            self.sent.borrow().clone()
        }
    }

    impl<T: Transport> ApiClient<T> {
        pub fn transport(&self) -> &T {
            &self.transport
        }

        pub fn project_cache(&self) -> &ResourceCache {
            &self.projects
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &HttpRequest) -> Result<String, ApiError> {
            self.sent.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("no scripted response".into())))
        }
    }

    pub fn config(project: &str, tags: &str) -> Config {
        Config {
            subdomain: Some("acme".into()),
            user: Some("jo@example.com".into()),
            token: Some("secret".into()),
            user_id: Some("7".into()),
            project: Some(project.into()),
            tags: Some(tags.into()),
        }
    }

    pub fn client(config: Config, transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::new(config, transport, DEFAULT_SERVICE_HOST)
    }

    pub const PROJECTS: &str = r#"[
        {"project": {"id": 1, "name": "Acme"}},
        {"project": {"id": 2, "name": "Internal"}}
    ]"#;
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn token_requests_carry_token_header_and_json_content_type() {
        let api = client(config("Acme", ""), ScriptedTransport::new().reply(""));
        let result = api.request(&ApiRequest::new(["projects"])).unwrap();
        assert!(result.is_none());

        let sent = api.transport().sent();
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].url, "https://acme.letsfreckle.com/api/projects.json");
        assert_eq!(sent[0].header("x-freckletoken"), Some("secret"));
        assert_eq!(sent[0].header("Content-Type"), Some("application/json"));
        assert_eq!(sent[0].header("Authorization"), None);
    }

    #[test]
    fn basic_auth_replaces_token_header() {
        let api = client(
            config("", ""),
            ScriptedTransport::new().reply(r#"{"user": {"api_auth_token": "abc"}}"#),
        );
        let token = api
            .exchange_token(BasicCredentials {
                user: "jo@example.com".into(),
                password: "pw".into(),
            })
            .unwrap();
        assert_eq!(token, "abc");

        let sent = api.transport().sent();
        assert_eq!(
            sent[0].url,
            "https://acme.letsfreckle.com/api/user/api_auth_token.json"
        );
        let expected = format!("Basic {}", BASE64.encode("jo@example.com:pw"));
        assert_eq!(sent[0].header("Authorization"), Some(expected.as_str()));
        assert_eq!(sent[0].header(TOKEN_HEADER), None);
    }

    #[test]
    fn body_makes_a_post_and_query_is_encoded() {
        let api = client(config("", ""), ScriptedTransport::new().reply("{}").reply("[]"));
        api.request(&ApiRequest::new(["entries"]).body(serde_json::json!({"a": 1})))
            .unwrap();
        api.request(&ApiRequest::new(["entries"]).query("search[people]", "7"))
            .unwrap();

        let sent = api.transport().sent();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(sent[1].method, Method::GET);
        assert_eq!(
            sent[1].url,
            "https://acme.letsfreckle.com/api/entries.json?search%5Bpeople%5D=7"
        );
    }

    #[test]
    fn http_errors_propagate() {
        let api = client(config("", ""), ScriptedTransport::new().fail(500));
        let err = api.request(&ApiRequest::new(["tags"])).unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }

    #[test]
    fn projects_are_fetched_once() {
        let mut api = client(config("", ""), ScriptedTransport::new().reply(PROJECTS));
        assert_eq!(api.projects().unwrap().get("Acme"), Some(&1));
        assert_eq!(api.projects().unwrap().len(), 2);
        assert_eq!(api.transport().sent().len(), 1);
    }

    #[test]
    fn tags_are_flattened_from_envelopes() {
        let mut api = client(
            config("", ""),
            ScriptedTransport::new().reply(r#"[{"tag": {"id": 9, "name": "urgent"}}]"#),
        );
        assert_eq!(api.tags().unwrap().get("urgent"), Some(&9));
        api.tags().unwrap();
        assert_eq!(api.transport().sent().len(), 1);
    }

    #[test]
    fn resolve_project_name_prefers_explicit_then_default() {
        let api = client(config("Acme", ""), ScriptedTransport::new());
        assert_eq!(api.resolve_project_name(Some("Other")).unwrap(), "Other");
        assert_eq!(api.resolve_project_name(None).unwrap(), "Acme");

        let api = client(config("", ""), ScriptedTransport::new());
        assert!(matches!(
            api.resolve_project_name(None),
            Err(FreckError::NoProjectSpecified)
        ));
    }

    #[test]
    fn create_existing_project_issues_no_remote_call() {
        let mut api = client(config("Acme", ""), ScriptedTransport::new().reply(PROJECTS));
        assert!(!api.create_project(None).unwrap());
        assert!(!api.create_project(Some("Acme")).unwrap());
        assert_eq!(api.transport().sent().len(), 1);
    }

    #[test]
    fn created_project_is_added_to_cache() {
        let mut api = client(
            config("", ""),
            ScriptedTransport::new()
                .reply(PROJECTS)
                .reply(r#"{"project": {"id": 3, "name": "New"}}"#),
        );
        assert!(api.create_project(Some("New")).unwrap());
        assert_eq!(api.project_cache().get("New"), Some(3));

        let sent = api.transport().sent();
        assert_eq!(sent[1].method, Method::POST);
        assert_eq!(sent[1].body.as_deref(), Some(r#"{"project":{"name":"New"}}"#));

        assert!(!api.create_project(Some("New")).unwrap());
        assert_eq!(api.transport().sent().len(), 2);
    }

    #[test]
    fn created_project_without_echo_leaves_cache_alone() {
        let mut api = client(config("", ""), ScriptedTransport::new().reply(PROJECTS).reply(""));
        assert!(api.create_project(Some("New")).unwrap());
        assert_eq!(api.project_cache().get("New"), None);
    }

    #[test]
    fn current_user_id_accepts_numbers() {
        let api = client(
            config("", ""),
            ScriptedTransport::new().reply(r#"{"user": {"id": 1234}}"#),
        );
        assert_eq!(api.current_user_id().unwrap(), "1234");
        assert!(api.transport().sent()[0].url.ends_with("/api/users/self.json"));
    }
}
