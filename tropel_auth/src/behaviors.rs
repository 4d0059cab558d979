//! Endpoint behaviors of the identity service.
//!
//! Each behavior performs one user flow, records its checks and returns the
//! last response. Unexpected status codes or missing tokens never fail the
//! behavior: they only show up as failed checks. A behavior fails when the
//! request could not be sent at all, or when a pooled login finds the pool
//! empty.
use std::{sync::Arc, time::Duration};

use tropel::{BoxError, CaseKey, Checks, CredentialSource, Identity, IdentityPool};

use crate::http::{Request, Response, Transport, ACCESS_TOKEN_COOKIE, CSRF_HEADER, REFRESH_TOKEN_COOKIE};

pub const REGISTRATION_PATH: &str = "/api/v1/identities";
pub const LOGIN_PATH: &str = "/api/v1/authentication/login";
pub const LOGOUT_PATH: &str = "/api/v1/authentication/logout";

/// Every behavior the suites can dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CaseKey)]
pub enum AuthCase {
    SuccessfulRegistration,
    SuccessfulLogin,
    PooledLogin,
    RandomPooledLogin,
    InvalidCredentialsLogin,
    MissingCredentialsLogin,
    SuccessfulLogout,
}

pub struct AuthBehaviors<T> {
    transport: T,
    pool: Arc<IdentityPool>,
    credentials: Arc<dyn CredentialSource>,
    checks: Checks,
    think_time: Duration,
}

impl<T: Transport> AuthBehaviors<T> {
    pub fn new(
        transport: T,
        pool: Arc<IdentityPool>,
        credentials: Arc<dyn CredentialSource>,
        checks: Checks,
        think_time: Duration,
    ) -> Self {
        Self {
            transport,
            pool,
            credentials,
            checks,
            think_time,
        }
    }

    pub fn pool(&self) -> &IdentityPool {
        &self.pool
    }

    pub fn checks(&self) -> &Checks {
        &self.checks
    }

    /// Registers a fresh identity. Only a `201` adds it to the pool.
    pub async fn successful_registration(&self) -> Result<Response, BoxError> {
        let identity = self.credentials.next_identity();
        self.register(identity).await
    }

    /// Registers a fresh identity, then logs in with it.
    pub async fn successful_login(&self) -> Result<Response, BoxError> {
        let identity = self.credentials.next_identity();
        self.register(identity.clone()).await?;
        self.think().await;
        self.login(&identity, AuthCase::SuccessfulLogin).await
    }

    /// Logs in as the next identity of the pool.
    pub async fn pooled_login(&self) -> Result<Response, BoxError> {
        let identity = self.pool.pick_round_robin()?;
        self.login(&identity, AuthCase::PooledLogin).await
    }

    /// Logs in as any identity of the pool, drawn uniformly.
    pub async fn random_pooled_login(&self) -> Result<Response, BoxError> {
        let identity = self.pool.pick_random(&mut rand::thread_rng())?;
        self.login(&identity, AuthCase::RandomPooledLogin).await
    }

    pub async fn invalid_credentials_login(&self) -> Result<Response, BoxError> {
        let request = Request::post(LOGIN_PATH).basic_auth(&Identity::new("", ""));
        let response = self.transport.post(request).await?;
        self.check_rejected_login(&response, AuthCase::InvalidCredentialsLogin);
        Ok(response)
    }

    pub async fn missing_credentials_login(&self) -> Result<Response, BoxError> {
        let response = self.transport.post(Request::post(LOGIN_PATH)).await?;
        self.check_rejected_login(&response, AuthCase::MissingCredentialsLogin);
        Ok(response)
    }

    /// Registers and logs in a fresh identity, then logs it out again with the
    /// session the login handed out.
    pub async fn successful_logout(&self) -> Result<Response, BoxError> {
        let identity = self.credentials.next_identity();
        self.register(identity.clone()).await?;
        self.think().await;
        let login = self.login(&identity, AuthCase::SuccessfulLogin).await?;
        self.think().await;

        let mut request = Request::post(LOGOUT_PATH);
        if let Some(csrf) = login.header(CSRF_HEADER) {
            request = request.header(CSRF_HEADER, csrf);
        }
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            if let Some(value) = login.cookie(name) {
                request = request.cookie(name, value);
            }
        }

        let response = self.transport.post(request).await?;
        let case = AuthCase::SuccessfulLogout.name();
        self.checks
            .check(&response)
            .that(&format!("{case}: Status code is 200"), |r| r.status == 200);
        Ok(response)
    }

    async fn register(&self, identity: Identity) -> Result<Response, BoxError> {
        let request = Request::post(REGISTRATION_PATH).basic_auth(&identity);
        let response = self.transport.post(request).await?;

        let case = AuthCase::SuccessfulRegistration.name();
        let created = self
            .checks
            .check(&response)
            .that(&format!("{case}: Status code is 201"), |r| r.status == 201)
            .passed();
        if created {
            tracing::debug!("Registered {}", identity.username);
            self.pool.append(identity);
        }
        Ok(response)
    }

    async fn login(&self, identity: &Identity, case: AuthCase) -> Result<Response, BoxError> {
        let request = Request::post(LOGIN_PATH).basic_auth(identity);
        let response = self.transport.post(request).await?;

        let case = case.name();
        self.checks
            .check(&response)
            .that(&format!("{case}: Status code is 200"), |r| r.status == 200)
            .that(&format!("{case}: Contains CSRF header"), |r| {
                r.header(CSRF_HEADER).is_some()
            })
            .that(&format!("{case}: Contains cookie access token"), |r| {
                r.cookie(ACCESS_TOKEN_COOKIE).is_some()
            })
            .that(&format!("{case}: Contains cookie refresh token"), |r| {
                r.cookie(REFRESH_TOKEN_COOKIE).is_some()
            });
        Ok(response)
    }

    fn check_rejected_login(&self, response: &Response, case: AuthCase) {
        let case = case.name();
        self.checks
            .check(response)
            .that(&format!("{case}: Status code is 401"), |r| r.status == 401)
            .that(&format!("{case}: Does not contain CSRF header"), |r| {
                r.header(CSRF_HEADER).is_none()
            })
            .that(&format!("{case}: Does not contain cookie access token"), |r| {
                r.cookie(ACCESS_TOKEN_COOKIE).is_none()
            })
            .that(&format!("{case}: Does not contain cookie refresh token"), |r| {
                r.cookie(REFRESH_TOKEN_COOKIE).is_none()
            });
    }

    async fn think(&self) {
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }
    }
}
