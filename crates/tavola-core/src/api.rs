use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{
  Form,
  Part
};
use serde_json::{
  Value,
  json
};
use tavola_shared::{
  EntityId,
  WriteAck
};
use tracing::{
  debug,
  instrument,
  warn
};

use crate::config::ApiSettings;
use crate::envelope::normalize_ack;
use crate::error::ApiError;
use crate::form::mime_for_path;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      | Method::Get => "GET",
      | Method::Post => "POST",
      | Method::Put => "PUT",
      | Method::Delete => "DELETE"
    }
  }

  fn to_reqwest(self) -> reqwest::Method {
    match self {
      | Method::Get => reqwest::Method::GET,
      | Method::Post => {
        reqwest::Method::POST
      }
      | Method::Put => reqwest::Method::PUT,
      | Method::Delete => {
        reqwest::Method::DELETE
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  pub body:   Option<Value>
}

impl ApiRequest {
  pub fn get() -> Self {
    Self {
      method: Method::Get,
      body:   None
    }
  }

  pub fn post(body: Value) -> Self {
    Self {
      method: Method::Post,
      body:   Some(body)
    }
  }

  pub fn put(body: Value) -> Self {
    Self {
      method: Method::Put,
      body:   Some(body)
    }
  }

  pub fn delete() -> Self {
    Self {
      method: Method::Delete,
      body:   None
    }
  }
}

/// Authenticated JSON API. The
/// implementation owns credential
/// handling; callers only see paths.
#[async_trait]
pub trait ApiClient: Send + Sync {
  async fn call(
    &self,
    path: &str,
    request: ApiRequest
  ) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
  pub file_name: String,
  pub mime:      String,
  pub bytes:     Vec<u8>
}

impl UploadFile {
  pub async fn from_path(
    path: &Path
  ) -> anyhow::Result<Self> {
    let bytes = tokio::fs::read(path)
      .await
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let file_name = path
      .file_name()
      .map(|name| {
        name.to_string_lossy().to_string()
      })
      .unwrap_or_else(|| {
        "image".to_string()
      });
    Ok(Self {
      file_name,
      mime: mime_for_path(path).to_string(),
      bytes
    })
  }
}

/// Raw multipart transport for table
/// photos; separate from the JSON
/// client.
#[async_trait]
pub trait UploadChannel: Send + Sync {
  async fn upload_table_images(
    &self,
    table_id: &EntityId,
    files: Vec<UploadFile>
  ) -> Result<WriteAck, ApiError>;
}

#[derive(Clone, Default)]
pub struct Credentials {
  token: Option<String>
}

impl Credentials {
  pub fn bearer(
    token: impl Into<String>
  ) -> Self {
    let token = token.into();
    Self {
      token: (!token.trim().is_empty())
        .then_some(token)
    }
  }

  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn token(&self) -> Option<&str> {
    self.token.as_deref()
  }
}

impl fmt::Debug for Credentials {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("Credentials")
      .field(
        "token",
        &self.token.as_ref().map(|_| "<redacted>")
      )
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
  client:      reqwest::Client,
  base_url:    String,
  credentials: Credentials
}

impl HttpApiClient {
  pub fn new(
    settings: &ApiSettings,
    credentials: Credentials
  ) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(
        settings.timeout_secs
      ))
      .build()
      .context(
        "failed to build HTTP client"
      )?;

    Ok(Self {
      client,
      base_url: settings
        .base_url
        .trim_end_matches('/')
        .to_string(),
      credentials
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  fn authorize(
    &self,
    builder: reqwest::RequestBuilder
  ) -> reqwest::RequestBuilder {
    match self.credentials.token() {
      | Some(token) => {
        builder.bearer_auth(token)
      }
      | None => builder
    }
  }
}

#[async_trait]
impl ApiClient for HttpApiClient {
  #[instrument(skip(self, request), fields(method = request.method.as_str()))]
  async fn call(
    &self,
    path: &str,
    request: ApiRequest
  ) -> Result<Value, ApiError> {
    let mut builder = self.authorize(
      self.client.request(
        request.method.to_reqwest(),
        self.url(path)
      )
    );
    if let Some(body) = request.body.as_ref()
    {
      builder = builder.json(body);
    }

    let response =
      builder.send().await.map_err(|err| {
        ApiError::transport(err.to_string())
      })?;
    read_json_response(response).await
  }
}

#[derive(Debug, Clone)]
pub struct HttpUploadChannel {
  inner: HttpApiClient
}

impl HttpUploadChannel {
  pub fn new(inner: HttpApiClient) -> Self {
    Self {
      inner
    }
  }
}

#[async_trait]
impl UploadChannel for HttpUploadChannel {
  #[instrument(skip(self, files), fields(table = %table_id, count = files.len()))]
  async fn upload_table_images(
    &self,
    table_id: &EntityId,
    files: Vec<UploadFile>
  ) -> Result<WriteAck, ApiError> {
    let path = format!(
      "/admin/tables/{}/images",
      table_id.as_path_segment()
    );

    let mut form = Form::new();
    for file in files {
      let part = Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.mime)
        .map_err(|err| {
          ApiError::transport(err.to_string())
        })?;
      form = form.part("images", part);
    }

    let builder = self.inner.authorize(
      self
        .inner
        .client
        .post(self.inner.url(&path))
        .multipart(form)
    );
    let response =
      builder.send().await.map_err(|err| {
        ApiError::transport(err.to_string())
      })?;
    let value =
      read_json_response(response).await?;
    normalize_ack(&path, value)
  }
}

async fn read_json_response(
  response: reqwest::Response
) -> Result<Value, ApiError> {
  let status = response.status();
  let text =
    response.text().await.map_err(|err| {
      ApiError::transport(err.to_string())
    })?;
  debug!(
    status = status.as_u16(),
    bytes = text.len(),
    "api response"
  );

  if !status.is_success() {
    let message = serde_json::from_str::<
      Value,
    >(&text)
    .ok()
    .and_then(|body| {
      body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
    })
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
    });
    warn!(status = status.as_u16(), message = %message, "api request rejected");
    return Err(ApiError::rejected(
      Some(status.as_u16()),
      message
    ));
  }

  // 204 and friends: an empty success
  // body acknowledges the write.
  if text.trim().is_empty() {
    return Ok(json!({ "success": true }));
  }

  serde_json::from_str(&text).map_err(
    |err| {
      ApiError::transport(format!(
        "invalid JSON body: {err}"
      ))
    }
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn credentials_never_print_token() {
    let creds = Credentials::bearer("s3cret");
    let printed = format!("{creds:?}");
    assert!(!printed.contains("s3cret"));
    assert_eq!(creds.token(), Some("s3cret"));
    assert_eq!(
      Credentials::bearer("  ").token(),
      None
    );
  }

  #[test]
  fn client_joins_paths_without_double_slash()
  {
    let settings = ApiSettings {
      base_url:     "http://localhost:5000/api/"
        .to_string(),
      token:        None,
      timeout_secs: 5
    };
    let client = HttpApiClient::new(
      &settings,
      Credentials::anonymous()
    )
    .unwrap();
    assert_eq!(
      client.url("/admin/menu"),
      "http://localhost:5000/api/admin/menu"
    );
  }
}
