use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tropel::{
    BoxError, Checks, CounterRegistry, DispatchPolicy, Identity, IdentityPool, Outcome,
    RandomCredentials, VirtualUser,
};
use tropel_auth::{
    behaviors::{LOGIN_PATH, LOGOUT_PATH, REGISTRATION_PATH},
    fixtures,
    http::{ACCESS_TOKEN_COOKIE, CSRF_HEADER, REFRESH_TOKEN_COOKIE},
    smoke::smoke_all,
    AuthBehaviors, AuthCase, Request, Response, Suite, Transport,
};

/// In-memory stand-in for the identity service.
#[derive(Default)]
struct FakeService {
    accounts: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<Request>>,
    reject_registrations: bool,
}

impl FakeService {
    fn with_accounts(identities: &[Identity]) -> Self {
        let service = Self::default();
        service.accounts.lock().extend(
            identities
                .iter()
                .map(|i| (i.username.clone(), i.password.clone())),
        );
        service
    }

    fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn handle(&self, request: &Request) -> Response {
        match request.path.as_str() {
            REGISTRATION_PATH => match &request.basic_auth {
                Some(id) if !self.reject_registrations && !id.username.is_empty() => {
                    self.accounts
                        .lock()
                        .insert(id.username.clone(), id.password.clone());
                    Response::new(201)
                }
                _ => Response::new(400),
            },
            LOGIN_PATH => {
                let known = request.basic_auth.as_ref().is_some_and(|id| {
                    self.accounts.lock().get(&id.username) == Some(&id.password)
                });
                if known {
                    Response::new(200)
                        .with_header(CSRF_HEADER, "csrf-token")
                        .with_cookie(ACCESS_TOKEN_COOKIE, "access")
                        .with_cookie(REFRESH_TOKEN_COOKIE, "refresh")
                } else {
                    Response::new(401)
                }
            }
            LOGOUT_PATH => {
                let csrf = request
                    .headers
                    .iter()
                    .any(|(name, value)| name == CSRF_HEADER && value == "csrf-token");
                let session = request
                    .cookies
                    .iter()
                    .any(|(name, _)| name == ACCESS_TOKEN_COOKIE);
                Response::new(if csrf && session { 200 } else { 401 })
            }
            _ => Response::new(404),
        }
    }
}

#[derive(Clone)]
struct FakeTransport(Arc<FakeService>);

impl Transport for FakeTransport {
    async fn post(&self, request: Request) -> Result<Response, BoxError> {
        let response = self.0.handle(&request);
        self.0.requests.lock().push(request);
        Ok(response)
    }
}

struct Harness {
    service: Arc<FakeService>,
    behaviors: Arc<AuthBehaviors<FakeTransport>>,
    checks: Checks,
}

fn harness(service: FakeService, pool: IdentityPool) -> Harness {
    let service = Arc::new(service);
    let checks = Checks::new();
    let behaviors = Arc::new(AuthBehaviors::new(
        FakeTransport(Arc::clone(&service)),
        Arc::new(pool),
        Arc::new(RandomCredentials::seeded("email", 11)),
        checks.clone(),
        Duration::ZERO,
    ));
    Harness {
        service,
        behaviors,
        checks,
    }
}

fn assert_all_checks_pass(checks: &Checks) {
    let snapshot = checks.snapshot();
    assert!(!snapshot.is_empty());
    for (description, tally) in snapshot {
        assert_eq!(tally.fails, 0, "check failed: {description}");
    }
}

#[tokio::test]
async fn registration_grows_the_pool() {
    let h = harness(FakeService::default(), IdentityPool::new());

    let response = h.behaviors.successful_registration().await.unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(h.behaviors.pool().len(), 1);
    assert_all_checks_pass(&h.checks);
}

#[tokio::test]
async fn rejected_registration_leaves_the_pool_alone() {
    let service = FakeService {
        reject_registrations: true,
        ..FakeService::default()
    };
    let h = harness(service, IdentityPool::new());

    h.behaviors.successful_registration().await.unwrap();

    assert!(h.behaviors.pool().is_empty());
    let tally = h.checks.snapshot()["successful_registration: Status code is 201"];
    assert_eq!(tally.fails, 1);
}

#[tokio::test]
async fn pooled_login_uses_pool_identities_in_order() {
    let seeds = fixtures::seed_identities();
    let h = harness(
        FakeService::with_accounts(&seeds),
        IdentityPool::seeded(seeds.clone()),
    );

    for _ in 0..3 {
        h.behaviors.pooled_login().await.unwrap();
    }

    let users: Vec<String> = h
        .service
        .requests_to(LOGIN_PATH)
        .into_iter()
        .filter_map(|r| r.basic_auth.map(|id| id.username))
        .collect();
    assert_eq!(users, ["some1@email", "some2@email", "some3@email"]);
    assert_all_checks_pass(&h.checks);
}

#[tokio::test]
async fn pooled_login_on_an_empty_pool_fails() {
    let h = harness(FakeService::default(), IdentityPool::new());
    assert!(h.behaviors.pooled_login().await.is_err());
    assert!(h.service.requests_to(LOGIN_PATH).is_empty());
}

#[tokio::test]
async fn random_pooled_login_draws_from_the_pool() {
    let seeds = fixtures::seed_identities();
    let h = harness(
        FakeService::with_accounts(&seeds),
        IdentityPool::seeded(seeds.clone()),
    );

    for _ in 0..20 {
        let response = h.behaviors.random_pooled_login().await.unwrap();
        assert_eq!(response.status, 200);
    }

    let users: Vec<String> = h
        .service
        .requests_to(LOGIN_PATH)
        .into_iter()
        .filter_map(|r| r.basic_auth.map(|id| id.username))
        .collect();
    assert_eq!(users.len(), 20);
    assert!(users
        .iter()
        .all(|u| seeds.iter().any(|s| &s.username == u)));
    // 20 draws out of 50 seeds landing in sequence is practically impossible
    let sequential: Vec<String> = seeds.iter().take(20).map(|s| s.username.clone()).collect();
    assert_ne!(users, sequential);
    assert_all_checks_pass(&h.checks);
    assert!(h
        .checks
        .snapshot()
        .contains_key("random_pooled_login: Status code is 200"));
}

#[tokio::test]
async fn random_pooled_login_on_an_empty_pool_fails() {
    let h = harness(FakeService::default(), IdentityPool::new());
    assert!(h.behaviors.random_pooled_login().await.is_err());
    assert!(h.service.requests_to(LOGIN_PATH).is_empty());
}

#[tokio::test]
async fn bad_logins_are_rejected_without_tokens() {
    let h = harness(FakeService::default(), IdentityPool::new());

    let invalid = h.behaviors.invalid_credentials_login().await.unwrap();
    let missing = h.behaviors.missing_credentials_login().await.unwrap();

    assert_eq!(invalid.status, 401);
    assert_eq!(missing.status, 401);
    let requests = h.service.requests_to(LOGIN_PATH);
    assert_eq!(requests[0].basic_auth, Some(Identity::new("", "")));
    assert_eq!(requests[1].basic_auth, None);
    assert_all_checks_pass(&h.checks);
}

#[tokio::test]
async fn logout_forwards_the_login_session() {
    let h = harness(FakeService::default(), IdentityPool::new());

    let response = h.behaviors.successful_logout().await.unwrap();

    assert_eq!(response.status, 200);
    let logout = &h.service.requests_to(LOGOUT_PATH)[0];
    assert!(logout
        .headers
        .contains(&(CSRF_HEADER.to_string(), "csrf-token".to_string())));
    assert_all_checks_pass(&h.checks);
}

#[tokio::test]
async fn counters_add_up_to_executions() {
    let seeds = fixtures::seed_identities();
    let h = harness(
        FakeService::with_accounts(&seeds),
        IdentityPool::seeded(seeds),
    );
    let counters = CounterRegistry::new();
    let cases = Arc::new(Suite::Login.case_set(&h.behaviors, &counters).unwrap());
    let vu = VirtualUser::with_rng(cases, DispatchPolicy::Weighted, StdRng::seed_from_u64(5));

    let n = 400;
    for _ in 0..n {
        let metric = vu.run_iteration().await;
        assert_eq!(metric.outcome, Outcome::Completed);
    }

    let snapshot = counters.snapshot();
    let total: u64 = snapshot.values().sum();
    assert_eq!(total, n);
    let pooled = snapshot["iterations-pooled_login"];
    // 85% of 400 with a wide margin
    assert!((280..=400).contains(&pooled), "pooled_login ran {pooled} times");
    assert_all_checks_pass(&h.checks);
}

#[tokio::test]
async fn by_name_runs_only_the_named_case() {
    let h = harness(FakeService::default(), IdentityPool::new());
    let counters = CounterRegistry::new();
    let cases = Arc::new(Suite::All.case_set(&h.behaviors, &counters).unwrap());
    let vu = VirtualUser::new(
        cases,
        DispatchPolicy::ByName(AuthCase::SuccessfulRegistration),
    );

    for _ in 0..5 {
        vu.run_iteration().await;
    }

    assert_eq!(counters.snapshot()["iterations-successful_registration"], 5);
    assert_eq!(counters.snapshot()["iterations-pooled_login"], 0);
    assert_eq!(h.behaviors.pool().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn smoke_all_runs_login_and_logout_side_by_side() {
    let seeds = fixtures::seed_identities();
    let h = harness(
        FakeService::with_accounts(&seeds),
        IdentityPool::seeded(seeds),
    );
    let counters = CounterRegistry::new();

    let aggregate = smoke_all(&h.behaviors, &counters, Some(3)).await.unwrap();

    let snapshot = counters.snapshot();
    let login: u64 = [
        "iterations-pooled_login",
        "iterations-invalid_credentials_login",
        "iterations-missing_credentials_login",
    ]
    .iter()
    .map(|name| snapshot[*name])
    .sum();
    let logout = snapshot["iterations-successful_logout"];
    // one paced iteration per second for ten seconds, per suite
    assert!((10..=11).contains(&login), "login ran {login} times");
    assert!((10..=11).contains(&logout), "logout ran {logout} times");
    assert_eq!(aggregate.iterations(), login + logout);
    assert_eq!(h.service.requests_to(LOGOUT_PATH).len() as u64, logout);
    assert_all_checks_pass(&h.checks);
}
