use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};

use crate::{
    error::AuthError,
    info,
    spotify::Accounts,
    success,
    types::{SessionSnapshot, SessionStatus, TokenResponse},
    utils, warning,
};

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    obtained_at: Option<DateTime<Utc>>,
    status: SessionStatus,
    refresh_failures: u32,
    /// Bumped on every login. Only the refresh cycle started for the current
    /// generation may write to the session.
    generation: u64,
    refresh_task: Option<JoinHandle<()>>,
}

impl Session {
    fn cancel_refresh(&mut self) {
        if let Some(handle) = self.refresh_task.take() {
            handle.abort();
        }
    }

    fn store(&mut self, token: &TokenResponse, refresh_token: Option<String>) {
        self.generation += 1;
        self.access_token = Some(token.access_token.clone());
        self.refresh_token = refresh_token;
        self.expires_in = Some(token.expires_in);
        self.obtained_at = Some(Utc::now());
        self.status = SessionStatus::Authenticated;
        self.refresh_failures = 0;
    }
}

/// Authorization and session manager.
///
/// Owns the one [`Session`] of the process. Writers are the callback path
/// ([`handle_callback`](Self::handle_callback)), the client-credentials path
/// and the refresh cycle; every handler only reads through
/// [`get_access_token`](Self::get_access_token).
///
/// The session lock is never held while a request to the provider is in
/// flight.
pub struct SessionManager {
    accounts: Arc<dyn Accounts>,
    session: Arc<Mutex<Session>>,
    max_refresh_failures: u32,
}

impl SessionManager {
    pub fn new(accounts: Arc<dyn Accounts>, max_refresh_failures: u32) -> Self {
        SessionManager {
            accounts,
            session: Arc::new(Mutex::new(Session::default())),
            max_refresh_failures: max_refresh_failures.max(1),
        }
    }

    /// Completes the authorization-code flow.
    ///
    /// # Behavior
    ///
    /// - `error` present: the provider's error is returned as
    ///   [`AuthError::Provider`] and no exchange is attempted
    /// - `code` missing: [`AuthError::MissingCode`], no exchange either
    /// - otherwise the code is exchanged once. On success the tokens are stored,
    ///   the session becomes `Authenticated` and a refresh cycle replaces any
    ///   previous one. On failure the session is left exactly as it was.
    ///
    /// The code is never retried; the provider rejects a replayed code anyway.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(error) = error {
            warning!("Callback error: {}", error);
            return Err(AuthError::Provider(error.to_string()));
        }

        let Some(code) = code.filter(|c| !c.is_empty()) else {
            warning!("Callback without authorization code");
            return Err(AuthError::MissingCode);
        };

        let token = match self.accounts.exchange_code(code).await {
            Ok(token) => token,
            Err(e) => {
                warning!("Error getting tokens: {}", e);
                return Err(e);
            }
        };

        let mut session = self.session.lock().await;
        session.cancel_refresh();
        session.store(&token, token.refresh_token.clone());

        match token.refresh_token {
            Some(_) => self.schedule_refresh(&mut session, token.expires_in),
            None => warning!("Token response carried no refresh token, the session will not be renewed"),
        }

        success!(
            "Successfully retrieved access token. Expires in {} s.",
            token.expires_in
        );
        Ok(())
    }

    /// Obtains an app-level token with the client-credentials grant.
    ///
    /// The token is stored without a refresh token and any running refresh
    /// cycle is stopped.
    pub async fn client_credentials_grant(&self) -> Result<TokenResponse, AuthError> {
        let token = match self.accounts.client_credentials().await {
            Ok(token) => token,
            Err(e) => {
                warning!("Client credentials grant failed: {}", e);
                return Err(e);
            }
        };

        let mut session = self.session.lock().await;
        session.cancel_refresh();
        session.store(&token, None);

        info!("Obtained app access token. Expires in {} s.", token.expires_in);
        Ok(token)
    }

    /// Current access token, `None` unless the session is `Authenticated`.
    pub async fn get_access_token(&self) -> Option<String> {
        let session = self.session.lock().await;
        match session.status {
            SessionStatus::Authenticated => session.access_token.clone(),
            SessionStatus::Unauthenticated | SessionStatus::Expired => None,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            status: session.status,
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_in: session.expires_in,
            obtained_at: session.obtained_at,
            refresh_failures: session.refresh_failures,
            refresh_scheduled: session
                .refresh_task
                .as_ref()
                .is_some_and(|handle| !handle.is_finished()),
        }
    }

    fn schedule_refresh(&self, session: &mut Session, expires_in: u64) {
        let cycle = RefreshCycle {
            accounts: Arc::clone(&self.accounts),
            session: Arc::downgrade(&self.session),
            generation: session.generation,
            period: utils::refresh_interval(expires_in),
            max_failures: self.max_refresh_failures,
        };
        session.refresh_task = Some(tokio::spawn(cycle.run()));
    }
}

/// The refresh cycle only holds a weak reference to the session. If the lock is
/// busy here the cycle is not aborted, but it stops at its next firing once the
/// session is gone.
impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.try_lock() {
            session.cancel_refresh();
        }
    }
}

struct RefreshCycle {
    accounts: Arc<dyn Accounts>,
    session: Weak<Mutex<Session>>,
    generation: u64,
    period: Duration,
    max_failures: u32,
}

impl RefreshCycle {
    /// Refresh token of the session this cycle was started for, `None` once
    /// the session is gone or replaced by a newer login.
    async fn current_refresh_token(&self) -> Option<String> {
        let shared = self.session.upgrade()?;
        let session = shared.lock().await;
        if session.generation != self.generation {
            return None;
        }
        session.refresh_token.clone()
    }

    async fn run(self) {
        loop {
            sleep(self.period).await;

            let Some(refresh_token) = self.current_refresh_token().await else {
                return;
            };

            let result = self.accounts.refresh_access_token(&refresh_token).await;

            let Some(shared) = self.session.upgrade() else {
                return;
            };
            let mut session = shared.lock().await;
            if session.generation != self.generation {
                return;
            }

            match result {
                Ok(token) => {
                    session.access_token = Some(token.access_token);
                    session.obtained_at = Some(Utc::now());
                    session.refresh_failures = 0;
                    info!("The access token has been refreshed");
                }
                Err(e) => {
                    session.refresh_failures += 1;
                    warning!(
                        "Refreshing the access token failed ({}/{}): {}",
                        session.refresh_failures,
                        self.max_failures,
                        e
                    );

                    if session.refresh_failures >= self.max_failures {
                        session.status = SessionStatus::Expired;
                        session.refresh_task = None;
                        warning!("Session expired, a new login is required");
                        return;
                    }
                }
            }
        }
    }
}
