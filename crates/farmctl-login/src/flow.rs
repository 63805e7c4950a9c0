//! Login state machine: `Requested -> Wait* -> OK | Used | Error`.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use thiserror::Error;

use crate::backend::{LoginBackend, LoginCode, LoginError, LoginStatus};

/// Attempts remembered at once; the oldest is forgotten first.
const MAX_ATTEMPTS: usize = 32;

/// One login attempt as tracked locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginAttempt {
    pub code: String,
    pub status: LoginStatus,
    /// Present only when `status` is `OK`.
    pub ticket: Option<String>,
}

/// Outcome of a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    pub attempt: LoginAttempt,
    /// True only for the poll that observed the transition to a terminal status.
    pub transitioned: bool,
}

/// Error from [`LoginFlow::advance`].
#[derive(Debug, Error)]
pub enum AdvanceError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error(transparent)]
    Completion(E),
}

#[derive(Default)]
struct Attempts {
    by_code: HashMap<String, LoginAttempt>,
    order: VecDeque<String>,
}

impl Attempts {
    fn entry(&mut self, code: &str) -> &mut LoginAttempt {
        if !self.by_code.contains_key(code) {
            while self.order.len() >= MAX_ATTEMPTS {
                if let Some(oldest) = self.order.pop_front() {
                    self.by_code.remove(&oldest);
                }
            }
            self.order.push_back(code.to_string());
        }
        self.by_code
            .entry(code.to_string())
            .or_insert_with(|| LoginAttempt {
                code: code.to_string(),
                status: LoginStatus::Wait,
                ticket: None,
            })
    }
}

/// Login state machine over a [`LoginBackend`].
///
/// Status is monotonic per code: once a code reached `OK`, `Used` or
/// `Error`, later polls return that status without contacting the backend.
/// Terminal codes are never regenerated; the caller must request a new one.
pub struct LoginFlow {
    backend: Arc<dyn LoginBackend>,
    attempts: Mutex<Attempts>,
}

impl LoginFlow {
    #[must_use]
    pub fn new(backend: Arc<dyn LoginBackend>) -> Self {
        Self {
            backend,
            attempts: Mutex::new(Attempts::default()),
        }
    }

    /// Issue a new login code.
    ///
    /// # Errors
    /// Returns `Issuance` if the backend call fails.
    pub async fn request_code(&self) -> Result<LoginCode, LoginError> {
        let issued = self.backend.request_code().await?;
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(&issued.code);
        tracing::info!(code = %issued.code, "Login code issued");
        Ok(issued)
    }

    /// Tracked state of `code`, if known.
    #[must_use]
    pub fn attempt(&self, code: &str) -> Option<LoginAttempt> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_code
            .get(code)
            .cloned()
    }

    /// Check `code` once. Never retries.
    ///
    /// # Errors
    /// Returns `Poll` if the backend call fails or reports `OK` without a ticket.
    pub async fn poll_status(&self, code: &str) -> Result<Poll, LoginError> {
        if let Some(attempt) = self.attempt(code).filter(|a| a.status.is_terminal()) {
            return Ok(Poll {
                attempt,
                transitioned: false,
            });
        }

        let report = self.backend.query_status(code).await?;
        if report.status == LoginStatus::Ok && report.ticket.is_none() {
            return Err(LoginError::Poll("status OK without a ticket".to_string()));
        }

        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = attempts.entry(code);
        // A concurrent poll may have settled the attempt while we were waiting.
        if attempt.status.is_terminal() {
            return Ok(Poll {
                attempt: attempt.clone(),
                transitioned: false,
            });
        }

        attempt.status = report.status;
        if report.status == LoginStatus::Ok {
            attempt.ticket = report.ticket;
        }
        let transitioned = attempt.status.is_terminal();
        if transitioned {
            tracing::info!(code, status = ?attempt.status, "Login attempt settled");
        }
        Ok(Poll {
            attempt: attempt.clone(),
            transitioned,
        })
    }

    /// Trade a ticket for a credential.
    ///
    /// # Errors
    /// Returns `Exchange` if the ticket is stale or rejected.
    pub async fn exchange(&self, ticket: &str) -> Result<String, LoginError> {
        self.backend.exchange(ticket).await
    }

    /// Poll `code`; on its transition to `OK`, exchange the ticket and hand
    /// the credential to `on_success`.
    ///
    /// `on_success` runs at most once per code. If the exchange or
    /// `on_success` fails, the attempt settles as `Error` instead of `OK`.
    ///
    /// # Errors
    /// Returns the poll or exchange error, or the error from `on_success`.
    pub async fn advance<F, Fut, E>(
        &self,
        code: &str,
        on_success: F,
    ) -> Result<LoginStatus, AdvanceError<E>>
    where
        F: FnOnce(String) -> Fut + Send,
        Fut: Future<Output = Result<(), E>> + Send,
        E: std::error::Error + 'static,
    {
        let poll = self.poll_status(code).await?;
        let status = poll.attempt.status;

        if poll.transitioned && status == LoginStatus::Ok {
            let ticket = poll.attempt.ticket.unwrap_or_default();
            let credential = match self.exchange(&ticket).await {
                Ok(credential) => credential,
                Err(e) => {
                    self.fail(code);
                    return Err(e.into());
                }
            };
            if let Err(e) = on_success(credential).await {
                self.fail(code);
                return Err(AdvanceError::Completion(e));
            }
        }
        Ok(status)
    }

    fn fail(&self, code: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = attempts.entry(code);
        attempt.status = LoginStatus::Error;
        attempt.ticket = None;
        tracing::warn!(code, "Login completion failed");
    }
}
