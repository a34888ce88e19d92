//! Host-integration adapter: one explicitly owned object driven by the host's
//! lifecycle (start, heartbeat, stop) callbacks.

use crate::api::{StatusClass, TelemetryApi};
use crate::config::WeheatConfig;
use crate::device::{DeviceIdentity, DeviceSetupResolver};
use crate::identity::IdentityProvider;
use crate::mapping::{MappingReport, SampleMapper};
use crate::scheduler::PollScheduler;
use crate::sensors::{SensorHost, SensorRegistry, SLOTS};
use crate::session::{wipe, SessionState, TokenSession};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a heartbeat did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Start did not complete (login failed, no device) or the plugin stopped.
    Inactive,
    /// Throttled; no remote call.
    Skipped,
    Polled(MappingReport),
    /// 401 from the telemetry API; one re-login was attempted.
    Unauthorized { relogged: bool },
    RateLimited,
    ServerError(u16),
    UnexpectedStatus(u16),
    /// 200 with a body that is not a telemetry object.
    MalformedPayload,
    TransportFailed,
}

pub struct WeheatPlugin<H: SensorHost> {
    username: String,
    password: String,
    session: TokenSession,
    api: Arc<dyn TelemetryApi>,
    host: H,
    scheduler: PollScheduler,
    device: Option<DeviceIdentity>,
}

impl<H: SensorHost> WeheatPlugin<H> {
    pub fn new(
        cfg: &WeheatConfig,
        provider: Arc<dyn IdentityProvider>,
        api: Arc<dyn TelemetryApi>,
        host: H,
    ) -> Self {
        Self {
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            session: TokenSession::new(provider),
            api,
            host,
            scheduler: PollScheduler::default(),
            device: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    pub fn device(&self) -> Option<&DeviceIdentity> {
        self.device.as_ref()
    }

    /// Whether the configured username/password are still held in memory.
    pub fn holds_login_secrets(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    fn is_active(&self) -> bool {
        self.device.is_some() && self.session.is_logged_in()
    }

    /// Login, resolve the device and create its slots.
    pub async fn on_start(&mut self, now: DateTime<Utc>) {
        info!("weheat plugin is starting");
        if self
            .session
            .login(&self.username, &self.password, now)
            .await
            .is_err()
        {
            return;
        }

        let Some(device) = DeviceSetupResolver::resolve(&self.session, self.api.as_ref()).await
        else {
            warn!("device setup incomplete; polling disabled");
            return;
        };

        let created = SensorRegistry::ensure_slots(&mut self.host, device.topology);
        info!(created, uuid = %device.uuid, "slots ready");
        self.device = Some(device);
    }

    pub async fn on_heartbeat(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.is_active() {
            debug!(state = ?self.session.state(), "heartbeat ignored; plugin inactive");
            return TickOutcome::Inactive;
        }

        if self.session.refresh_if_needed(now).await.is_err() {
            debug!("continuing with current access token");
        }

        if !self.scheduler.should_poll_now() {
            debug!(counter = self.scheduler.counter(), "poll throttled");
            return TickOutcome::Skipped;
        }

        self.poll(now).await
    }

    async fn poll(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let (Some(device), Some(token)) = (self.device.as_ref(), self.session.access_token())
        else {
            return TickOutcome::Inactive;
        };

        let res = match self.api.latest_sample(token, &device.uuid).await {
            Ok(res) => res,
            Err(e) if e.is_decode() => {
                error!(error = %e, "malformed heat pump log payload");
                return TickOutcome::MalformedPayload;
            }
            Err(e) => {
                error!(error = %e, "failed to fetch latest heat pump log");
                return TickOutcome::TransportFailed;
            }
        };

        match res.class() {
            StatusClass::Success => {
                let Some(sample) = res.payload else {
                    error!("telemetry response without payload");
                    return TickOutcome::UnexpectedStatus(res.status);
                };
                let nominal = device.nominal_power_w;
                let report = SampleMapper::apply(&sample, &SLOTS, nominal, &mut self.host);
                debug!(
                    updated = report.updated.len(),
                    failed = report.failed.len(),
                    "sample mapped"
                );
                TickOutcome::Polled(report)
            }
            StatusClass::Unauthorized => {
                warn!("telemetry API returned 401; logging in again");
                // the failed fetch itself is not retried this tick
                let relogged = self
                    .session
                    .login(&self.username, &self.password, now)
                    .await
                    .is_ok();
                TickOutcome::Unauthorized { relogged }
            }
            StatusClass::RateLimited => {
                warn!(status = res.status, "telemetry API rate limit hit");
                TickOutcome::RateLimited
            }
            StatusClass::ServerError => {
                error!(status = res.status, "telemetry API service error");
                TickOutcome::ServerError(res.status)
            }
            StatusClass::Unexpected => {
                error!(status = res.status, "unexpected telemetry API status");
                TickOutcome::UnexpectedStatus(res.status)
            }
        }
    }

    pub async fn on_stop(&mut self) {
        info!("weheat plugin is stopping");
        self.session.logout().await;
        wipe(&mut self.username);
        wipe(&mut self.password);
        if self.session.state() == SessionState::LoggedOut {
            debug!("credentials cleared");
        }
    }
}
