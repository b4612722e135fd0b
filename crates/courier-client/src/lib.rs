//! HTTP transport for the courier console.
//!
//! [`HttpBackend`] implements [`AuthBackend`] and [`ParcelBackend`] against
//! the courier JSON REST API. Every failure is mapped onto the
//! [`courier_core::Error`] taxonomy:
//!
//! | Response | Error |
//! |----------|-------|
//! | 401, 403 | `Unauthorized` |
//! | 404 | `NotFound` |
//! | 400, 422 | `Validation` |
//! | other non-2xx, transport or decode failure | `Server` |

use std::time::Duration;

use chrono::NaiveDate;
use courier_core::{
  Error, Result,
  backend::{
    Ack, AuthBackend, Driver, LoginResponse, ParcelBackend, ParcelFilter,
    StatusUpdate,
  },
  credential::Credential,
  parcel::{NewParcel, Parcel, ParcelStatus},
  session::User,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Connection settings for the courier API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Async HTTP client for the courier REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: Client,
  config: ApiConfig,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LoginBody<'a> {
  email:    &'a str,
  password: &'a str,
}

#[derive(Serialize)]
struct AssignBody {
  driver_id: i64,
  parcel_id: i64,
}

#[derive(Serialize)]
struct StatusBody {
  status: ParcelStatus,
}

#[derive(Deserialize)]
struct StatusUpdateBody {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  data:    Option<NotificationBody>,
}

#[derive(Deserialize)]
struct NotificationBody {
  #[serde(default)]
  email_sent: bool,
}

impl From<StatusUpdateBody> for StatusUpdate {
  fn from(b: StatusUpdateBody) -> Self {
    Self {
      success:    b.success,
      message:    b.message,
      email_sent: b.data.is_some_and(|d| d.email_sent),
    }
  }
}

/// `GET /reports/daily` also carries a server-side summary; the core
/// recomputes it from the rows.
#[derive(Deserialize)]
struct DailyReportBody {
  #[serde(default)]
  parcels: Vec<Parcel>,
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
  error:   Option<String>,
}

/// The server's own `message` or `error` text, or the status reason.
fn rejection_message(status: StatusCode, body: &str) -> String {
  serde_json::from_str::<ErrorBody>(body)
    .ok()
    .and_then(|b| b.message.or(b.error))
    .unwrap_or_else(|| {
      status.canonical_reason().unwrap_or("unexpected response").to_string()
    })
}

/// Map a non-2xx response onto the error taxonomy.
pub fn error_for_status(status: StatusCode, body: &str) -> Error {
  let message = rejection_message(status, body);
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
    StatusCode::NOT_FOUND => Error::NotFound(message),
    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
      Error::Validation(message)
    }
    _ => Error::Server(format!("{status}: {message}")),
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl HttpBackend {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Server(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub fn base_url(&self) -> &str { &self.config.base_url }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  /// Send `req`; only transport failures are errors here.
  async fn execute(&self, what: &str, req: RequestBuilder) -> Result<Response> {
    tracing::debug!(%what, "sending request");
    req
      .send()
      .await
      .map_err(|e| Error::Server(format!("{what} failed: {e}")))
  }

  async fn read_json<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
    resp
      .json()
      .await
      .map_err(|e| Error::Server(format!("decoding {what}: {e}")))
  }

  /// Send `req` and decode a JSON body, mapping failures for `what`.
  async fn send<T: DeserializeOwned>(&self, what: &str, req: RequestBuilder) -> Result<T> {
    let resp = self.execute(what, req).await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      tracing::debug!(%what, %status, "request rejected");
      return Err(error_for_status(status, &body));
    }
    Self::read_json(what, resp).await
  }
}

impl AuthBackend for HttpBackend {
  /// `POST /api/login`
  async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
    let req = self
      .client
      .post(self.url("/login"))
      .json(&LoginBody { email, password });
    self.send("POST /login", req).await
  }

  /// `GET /api/verifyToken`
  ///
  /// Any non-2xx answer means the token is no good.
  async fn verify(&self, token: &Credential) -> Result<User> {
    let what = "GET /verifyToken";
    let req = self
      .client
      .get(self.url("/verifyToken"))
      .bearer_auth(token.as_str());
    let resp = self.execute(what, req).await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Unauthorized(rejection_message(status, &body)));
    }
    Self::read_json(what, resp).await
  }
}

impl ParcelBackend for HttpBackend {
  /// `GET /api/parcels/assigned-to-driver`, `GET /api/orders`, or
  /// `GET /api/parcels`, depending on the filter.
  async fn list_parcels(
    &self,
    token: &Credential,
    filter: &ParcelFilter,
  ) -> Result<Vec<Parcel>> {
    let (what, req) = if let Some(email) = &filter.driver_email {
      (
        "GET /parcels/assigned-to-driver",
        self
          .client
          .get(self.url("/parcels/assigned-to-driver"))
          .query(&[("driverEmail", email)]),
      )
    } else if let Some(email) = &filter.customer_email {
      (
        "GET /orders",
        self.client.get(self.url("/orders")).query(&[("email", email)]),
      )
    } else {
      let mut req = self.client.get(self.url("/parcels"));
      if let Some(status) = filter.status {
        req = req.query(&[("status", status.as_ref())]);
      }
      ("GET /parcels", req)
    };
    self.send(what, req.bearer_auth(token.as_str())).await
  }

  /// `GET /api/parcels/{id}`
  async fn get_parcel(&self, token: &Credential, id: i64) -> Result<Parcel> {
    let req = self
      .client
      .get(self.url(&format!("/parcels/{id}")))
      .bearer_auth(token.as_str());
    self.send("GET /parcels/{id}", req).await
  }

  /// `POST /api/parcels/register`
  async fn register_parcel(
    &self,
    token: &Credential,
    parcel: &NewParcel,
  ) -> Result<Parcel> {
    let req = self
      .client
      .post(self.url("/parcels/register"))
      .bearer_auth(token.as_str())
      .json(parcel);
    self.send("POST /parcels/register", req).await
  }

  /// `POST /api/assign-parcel`
  async fn assign_parcel(
    &self,
    token: &Credential,
    parcel_id: i64,
    driver_id: i64,
  ) -> Result<Ack> {
    let req = self
      .client
      .post(self.url("/assign-parcel"))
      .bearer_auth(token.as_str())
      .json(&AssignBody { driver_id, parcel_id });
    self.send("POST /assign-parcel", req).await
  }

  /// `PUT /api/parcels/{id}/update-status`
  async fn update_parcel_status(
    &self,
    token: &Credential,
    parcel_id: i64,
    status: ParcelStatus,
  ) -> Result<StatusUpdate> {
    let req = self
      .client
      .put(self.url(&format!("/parcels/{parcel_id}/update-status")))
      .bearer_auth(token.as_str())
      .json(&StatusBody { status });
    let body: StatusUpdateBody = self.send("PUT /parcels/{id}/update-status", req).await?;
    Ok(body.into())
  }

  /// `GET /api/drivers`
  async fn list_drivers(&self, token: &Credential) -> Result<Vec<Driver>> {
    let req = self
      .client
      .get(self.url("/drivers"))
      .bearer_auth(token.as_str());
    self.send("GET /drivers", req).await
  }

  /// `GET /api/track-parcel?parcelNumber=`, unauthenticated.
  async fn track_parcel(&self, parcel_number: &str) -> Result<Parcel> {
    let req = self
      .client
      .get(self.url("/track-parcel"))
      .query(&[("parcelNumber", parcel_number)]);
    self.send("GET /track-parcel", req).await
  }

  /// `GET /api/reports/daily?date=YYYY-MM-DD`
  async fn daily_parcels(
    &self,
    token: &Credential,
    date: NaiveDate,
  ) -> Result<Vec<Parcel>> {
    let req = self
      .client
      .get(self.url("/reports/daily"))
      .bearer_auth(token.as_str())
      .query(&[("date", date.format("%Y-%m-%d").to_string())]);
    let body: DailyReportBody = self.send("GET /reports/daily", req).await?;
    Ok(body.parcels)
  }
}
