//! The one HTTP collaborator the engine ships a real implementation of.
//! Everything else an embedder might want to swap (storage, inventory,
//! property writer) is a trait with no default; this one isn't, because
//! "make an HTTP request and classify the response" has exactly one
//! reasonable meaning.

use std::time::Duration;

use async_trait::async_trait;
use cache::CloneCache;
use ds_model::HttpMethod;
use indexmap::IndexMap;
use reqwest::Client;

/// The outcome of one HTTP request, already classified per §4.3: there are
/// no retries and no partial-success states, only these four.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  Success(String),
  NotFound,
  HttpError(u16, String),
  TransportError(String),
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: HttpMethod,
  pub url: String,
  pub headers: IndexMap<String, String>,
  pub params: IndexMap<String, String>,
  pub check_ssl: bool,
  pub connect_timeout: Duration,
  pub read_timeout: Duration,
  pub user_agent: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
  async fn fetch(&self, request: FetchRequest) -> FetchOutcome;
}

/// A `reqwest`-backed transport. Clients are cached by `(check_ssl,
/// connect_timeout)` since those are the only request parameters `reqwest`
/// requires at client-construction time rather than per-request.
#[derive(Default)]
pub struct HttpFetcher {
  clients: CloneCache<(bool, u64), Client>,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  async fn client_for(
    &self,
    check_ssl: bool,
    connect_timeout: Duration,
    user_agent: &str,
  ) -> Result<Client, reqwest::Error> {
    let key = (check_ssl, connect_timeout.as_millis() as u64);
    if let Some(client) = self.clients.get(&key).await {
      return Ok(client);
    }
    let client = Client::builder()
      .connect_timeout(connect_timeout)
      .danger_accept_invalid_certs(!check_ssl)
      .user_agent(user_agent.to_string())
      .build()?;
    self.clients.insert(key, client.clone()).await;
    Ok(client)
  }
}

#[async_trait]
impl HttpTransport for HttpFetcher {
  async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
    let client = match self
      .client_for(
        request.check_ssl,
        request.connect_timeout,
        &request.user_agent,
      )
      .await
    {
      Ok(client) => client,
      Err(e) => return FetchOutcome::TransportError(e.to_string()),
    };

    let method = match request.method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
    };

    let mut builder = client
      .request(method.clone(), request.url.as_str())
      .timeout(request.read_timeout);
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    let params: Vec<(&String, &String)> = request.params.iter().collect();
    builder = match method {
      reqwest::Method::GET => builder.query(&params),
      _ => builder.form(&params),
    };

    match builder.send().await {
      Ok(response) => {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
          return FetchOutcome::NotFound;
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
          FetchOutcome::Success(body)
        } else {
          FetchOutcome::HttpError(status.as_u16(), body)
        }
      }
      Err(e) => FetchOutcome::TransportError(e.to_string()),
    }
  }
}
