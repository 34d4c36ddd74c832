use std::time::{Duration, Instant};

use reqwest::header;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::decode::{self, id_string};
use crate::logger::MessageLogger;
use crate::protocol::{self, CONTROL_PATH, DEFAULT_BASE_URL, HOUSE_PATH, LOGIN_PATH};
use crate::store::TokenStore;
use crate::types::*;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The vendor invalidates tokens server-side on an opaque schedule; a fresh
/// login every 3 days stays ahead of it.
const REAUTH_INTERVAL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

const DEFAULT_TEMP_STEP: f64 = 0.5;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

struct AuthSession {
    token: String,
    token_type: String,
    expires_at: Instant,
}

impl AuthSession {
    fn new(token: String, token_type: String) -> Self {
        Self {
            token,
            token_type,
            expires_at: Instant::now() + REAUTH_INTERVAL,
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    #[cfg(test)]
    fn expire_now(&mut self) {
        self.expires_at = Instant::now();
    }
}

pub struct HailinClientBuilder {
    base_url: String,
    login_type: LoginType,
    username: String,
    password: String,
    temp_step: f64,
    poll_interval: Duration,
    overrides: CapabilityOverrides,
    log_path: Option<String>,
    token_store: Option<Box<dyn TokenStore>>,
}

impl HailinClientBuilder {
    pub fn new(
        login_type: LoginType,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_type,
            username: username.into(),
            password: password.into(),
            temp_step: DEFAULT_TEMP_STEP,
            poll_interval: DEFAULT_POLL_INTERVAL,
            overrides: CapabilityOverrides::default(),
            log_path: None,
            token_store: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn temp_step(mut self, step: f64) -> Self {
        self.temp_step = step;
        self
    }

    pub fn poll_interval(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    pub fn support_fan(mut self, supported: bool) -> Self {
        self.overrides.fan = Some(supported);
        self
    }

    pub fn support_cool(mut self, supported: bool) -> Self {
        self.overrides.cool = Some(supported);
        self
    }

    pub fn support_heat(mut self, supported: bool) -> Self {
        self.overrides.heat = Some(supported);
        self
    }

    pub fn message_log(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn token_store(mut self, store: impl TokenStore + 'static) -> Self {
        self.token_store = Some(Box::new(store));
        self
    }

    pub fn build(self) -> HailinClient {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        let logger = self
            .log_path
            .map(|path| MessageLogger::new(&path).expect("failed to open log file"));

        HailinClient {
            http,
            base_url: self.base_url,
            login_type: self.login_type,
            username: self.username,
            password: self.password,
            temp_step: self.temp_step,
            poll_interval: self.poll_interval,
            overrides: self.overrides,
            session: None,
            houses: Vec::new(),
            devices: Vec::new(),
            logger,
            token_store: self.token_store,
        }
    }
}

/// Client for the HaiLin cloud API: login, device directory refresh, and
/// device control. All methods take `&mut self`; a single owner at a time
/// is the intended discipline.
pub struct HailinClient {
    http: reqwest::Client,
    base_url: String,
    login_type: LoginType,
    username: String,
    password: String,
    temp_step: f64,
    poll_interval: Duration,
    overrides: CapabilityOverrides,
    session: Option<AuthSession>,
    houses: Vec<House>,
    devices: Vec<DeviceRecord>,
    logger: Option<MessageLogger>,
    token_store: Option<Box<dyn TokenStore>>,
}

impl HailinClient {
    pub fn builder(
        login_type: LoginType,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> HailinClientBuilder {
        HailinClientBuilder::new(login_type, username, password)
    }

    /// Exchange credentials for a bearer token. Any failure surfaces as
    /// `Error::Auth`; the caller decides whether to retry now or wait for
    /// the next scheduled cycle.
    pub async fn login(&mut self) -> Result<()> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!(url = %url, username = %self.username, "logging in");

        if let Some(ref mut logger) = self.logger {
            // Credentials stay out of the trace log.
            logger.log_request("POST", LOGIN_PATH, None);
        }

        let payload = protocol::login_payload(self.login_type, &self.username, &self.password);
        let resp = self
            .http
            .post(&url)
            .header(header::USER_AGENT, protocol::USER_AGENT)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "login rejected");
            return Err(Error::Auth(format!("login failed with status {status}: {body}")));
        }

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed login response: {e}")))?;

        if let Some(store) = &self.token_store
            && let Err(e) = store.save(&body.access_token)
        {
            warn!("failed to persist token: {e}");
        }

        let session = AuthSession::new(
            body.access_token,
            body.token_type.unwrap_or_else(|| "bearer".to_string()),
        );
        info!(username = %self.username, token_type = %session.token_type, "login succeeded");
        self.session = Some(session);
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if let Some(session) = &self.session {
            if !session.is_expired_at(Instant::now()) {
                return Ok(());
            }
            debug!("session past re-auth interval, logging in again");
        } else if let Some(store) = &self.token_store {
            match store.load() {
                Ok(Some(token)) => {
                    debug!("adopting persisted token");
                    self.session = Some(AuthSession::new(token, "bearer".to_string()));
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => warn!("failed to load persisted token: {e}"),
            }
        }
        self.login().await
    }

    /// Authenticated call against a vendor endpoint. 200 is the only
    /// success status; everything else is reported, never retried here.
    async fn request(&mut self, path: &str, body: Option<&Value>, method: Method) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, method = %method, "vendor request");

        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), path, body);
        }

        let mut req = self
            .http
            .request(method, &url)
            .header(header::USER_AGENT, protocol::USER_AGENT)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = &self.session {
            req = req.bearer_auth(&session.token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "vendor request failed");
            return Err(Error::Status { status, body });
        }
        Ok(resp.json().await?)
    }

    /// Same as `request`, but a 401/403 clears the session and retries the
    /// call once after a fresh login.
    async fn request_with_relogin(
        &mut self,
        path: &str,
        body: Option<&Value>,
        method: Method,
    ) -> Result<Value> {
        match self.request(path, body, method.clone()).await {
            Err(Error::Status { status: 401 | 403, .. }) => {
                debug!("auth rejected, logging in again");
                self.session = None;
                self.login().await?;
                self.request(path, body, method).await
            }
            other => other,
        }
    }

    /// The vendor reports a single house object; normalize it to a list.
    pub async fn fetch_houses(&mut self) -> Result<()> {
        let result = self.request_with_relogin(HOUSE_PATH, None, Method::GET).await?;
        let house_id = result
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| Error::Protocol(format!("house response missing id: {result}")))?;
        let name = result
            .get("house_name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        info!(house = %name, id = %house_id, "fetched house");
        self.houses = vec![House { house_id, name }];
        Ok(())
    }

    /// Walk house → group → device listings and replace the device list
    /// wholesale. Per-house and per-device failures are logged and skipped;
    /// returns the number of records in the new list.
    pub async fn refresh(&mut self) -> Result<usize> {
        self.ensure_session().await?;
        if self.houses.is_empty() {
            self.fetch_houses().await?;
        }

        let houses = self.houses.clone();
        let mut all = Vec::new();

        for house in &houses {
            let path = protocol::group_list_path(&house.house_id);
            let result = match self.request_with_relogin(&path, None, Method::GET).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(house = %house.name, error = %e, "device list fetch failed");
                    continue;
                }
            };
            let Some(Value::Array(groups)) = result.get("data") else {
                warn!(house = %house.name, "device list response missing data array");
                continue;
            };

            for group in groups {
                let group_name = group
                    .get("group_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string();
                let Some(Value::Array(items)) = group.get("devicesGroupItems") else {
                    debug!(group = %group_name, "group has no devices, skipping");
                    continue;
                };

                let placement = Placement {
                    house_id: house.house_id.clone(),
                    house_name: house.name.clone(),
                    group_id: group.get("group_id").and_then(id_string).unwrap_or_default(),
                    group_name,
                };

                for entry in items {
                    match decode::decode(entry, &placement, &self.overrides) {
                        Ok(record) => all.push(record),
                        Err(e) => {
                            warn!(error = %e, "device entry undecodable, keeping identity only");
                            match decode::partial_record(entry, &placement) {
                                Some(record) => all.push(record),
                                None => warn!("device entry has no mac, skipped"),
                            }
                        }
                    }
                }
            }
        }

        let count = all.len();
        self.devices = all;
        if let Some(ref mut logger) = self.logger {
            logger.log_refresh(count);
        }
        info!(devices = count, "device list refreshed");
        Ok(count)
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn device(&self, mac: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.mac == mac)
    }

    fn device_mut(&mut self, mac: &str) -> Option<&mut DeviceRecord> {
        self.devices.iter_mut().find(|d| d.mac == mac)
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    pub fn temp_step(&self) -> f64 {
        self.temp_step
    }

    /// Cadence the host scheduler should call `refresh` at.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    // -- Command methods --

    pub async fn set_hvac_mode(&mut self, mac: &str, mode: HvacMode) -> Result<()> {
        let operation = protocol::set_mode_operation(mode);
        self.send_operation(mac, "set_hvac_mode", operation).await?;
        if let Some(device) = self.device_mut(mac) {
            device.apply_hvac_mode(mode);
        }
        Ok(())
    }

    pub async fn set_target_temperature(&mut self, mac: &str, value: f64) -> Result<()> {
        let key = self
            .device(mac)
            .ok_or_else(|| Error::UnknownDevice(mac.to_string()))?
            .active_mode_key
            .unwrap_or(ActiveModeKey::Heat);
        let operation = protocol::set_temperature_operation(key, value);
        self.send_operation(mac, "set_temperature", operation).await?;
        if let Some(device) = self.device_mut(mac) {
            device.apply_target_temperature(value);
        }
        Ok(())
    }

    pub async fn set_fan_mode(&mut self, mac: &str, mode: FanMode) -> Result<()> {
        let operation = protocol::set_fan_operation(mode);
        self.send_operation(mac, "set_fan_mode", operation).await?;
        if let Some(device) = self.device_mut(mac) {
            device.apply_fan_mode(mode);
        }
        Ok(())
    }

    /// String-keyed control front for the host-platform adapter. Unknown
    /// attributes and mistyped values are rejected locally; no request is
    /// issued.
    pub async fn control(&mut self, mac: &str, attribute: &str, value: &Value) -> Result<()> {
        let invalid = |attribute: &str, value: &Value| Error::InvalidValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
        };
        match attribute {
            "hvac_mode" => {
                let mode = value
                    .as_str()
                    .and_then(HvacMode::from_name)
                    .ok_or_else(|| invalid(attribute, value))?;
                self.set_hvac_mode(mac, mode).await
            }
            "temperature" => {
                let target = value
                    .as_f64()
                    .ok_or_else(|| invalid(attribute, value))?;
                self.set_target_temperature(mac, target).await
            }
            "fan_mode" => {
                let mode = value
                    .as_str()
                    .and_then(FanMode::from_name)
                    .ok_or_else(|| invalid(attribute, value))?;
                self.set_fan_mode(mac, mode).await
            }
            other => {
                warn!(attribute = other, "unsupported control attribute");
                Err(Error::UnsupportedAttribute(other.to_string()))
            }
        }
    }

    #[cfg(test)]
    fn expire_session(&mut self) {
        if let Some(session) = &mut self.session {
            session.expire_now();
        }
    }

    /// Post one operation envelope. The vendor acknowledges accepted
    /// operations with an empty JSON object and nothing else.
    async fn send_operation(&mut self, mac: &str, action: &str, operation: String) -> Result<()> {
        if self.device(mac).is_none() {
            return Err(Error::UnknownDevice(mac.to_string()));
        }
        self.ensure_session().await?;

        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, mac, &operation);
        }

        debug!(mac = %mac, action = %action, operation = %operation, "sending control operation");
        let envelope = protocol::control_envelope(mac, &operation);
        let result = self
            .request_with_relogin(CONTROL_PATH, Some(&envelope), Method::POST)
            .await?;

        if result.as_object().is_some_and(|m| m.is_empty()) {
            Ok(())
        } else {
            warn!(mac = %mac, action = %action, response = %result, "control not acknowledged");
            Err(Error::ControlRejected(result.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn session_expires_after_reauth_interval() {
        let session = AuthSession::new("tok".to_string(), "bearer".to_string());
        let now = Instant::now();
        assert!(!session.is_expired_at(now));
        assert!(!session.is_expired_at(now + REAUTH_INTERVAL - Duration::from_secs(60)));
        assert!(session.is_expired_at(now + REAUTH_INTERVAL + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn expired_session_relogs_in_on_next_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok123",
                "token_type": "bearer",
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(HOUSE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 77,
                "house_name": "Home",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(protocol::GROUP_LIST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let mut client = HailinClient::builder(LoginType::Email, "u@example.com", "pw")
            .base_url(server.uri())
            .build();
        client.refresh().await.unwrap();

        // Still fresh: no second login.
        client.refresh().await.unwrap();

        client.expire_session();
        client.refresh().await.unwrap();
    }

    #[test]
    fn builder_defaults() {
        let client = HailinClient::builder(LoginType::Email, "u@example.com", "pw").build();
        assert_eq!(client.temp_step(), 0.5);
        assert_eq!(client.poll_interval(), Duration::from_secs(300));
        assert!(client.devices().is_empty());
        assert!(client.houses().is_empty());
    }
}
