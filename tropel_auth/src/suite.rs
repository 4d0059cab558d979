//! Weighted case sets, one per feature under test.
use std::sync::Arc;

use clap::ValueEnum;
use tropel::{CaseSet, CounterRegistry};

use crate::{
    behaviors::{AuthBehaviors, AuthCase},
    http::Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    Register,
    Login,
    Logout,
    /// Every behavior at once.
    All,
}

impl Suite {
    pub fn name(self) -> &'static str {
        match self {
            Suite::Register => "register",
            Suite::Login => "login",
            Suite::Logout => "logout",
            Suite::All => "all",
        }
    }

    /// Cases of the suite with their relative weights, in dispatch order.
    pub fn weights(self) -> &'static [(AuthCase, f64)] {
        match self {
            Suite::Register => &[(AuthCase::SuccessfulRegistration, 100.0)],
            Suite::Login => &[
                (AuthCase::PooledLogin, 85.0),
                (AuthCase::InvalidCredentialsLogin, 10.0),
                (AuthCase::MissingCredentialsLogin, 5.0),
            ],
            Suite::Logout => &[(AuthCase::SuccessfulLogout, 100.0)],
            Suite::All => &[
                (AuthCase::SuccessfulRegistration, 100.0),
                (AuthCase::SuccessfulLogin, 85.0),
                (AuthCase::PooledLogin, 85.0),
                (AuthCase::RandomPooledLogin, 85.0),
                (AuthCase::InvalidCredentialsLogin, 10.0),
                (AuthCase::MissingCredentialsLogin, 5.0),
                (AuthCase::SuccessfulLogout, 100.0),
            ],
        }
    }

    /// Registers the suite's cases, each with its `iterations-<case>` counter.
    pub fn case_set<T: Transport>(
        self,
        behaviors: &Arc<AuthBehaviors<T>>,
        counters: &CounterRegistry,
    ) -> tropel::Result<CaseSet<AuthCase>> {
        self.weights()
            .iter()
            .fold(CaseSet::builder(), |builder, &(case, weight)| {
                let behaviors = Arc::clone(behaviors);
                builder.case(case, weight, move || {
                    let behaviors = Arc::clone(&behaviors);
                    async move { run(&behaviors, case).await }
                })
            })
            .build(counters)
    }
}

async fn run<T: Transport>(behaviors: &AuthBehaviors<T>, case: AuthCase) -> Result<(), tropel::BoxError> {
    match case {
        AuthCase::SuccessfulRegistration => behaviors.successful_registration().await,
        AuthCase::SuccessfulLogin => behaviors.successful_login().await,
        AuthCase::PooledLogin => behaviors.pooled_login().await,
        AuthCase::RandomPooledLogin => behaviors.random_pooled_login().await,
        AuthCase::InvalidCredentialsLogin => behaviors.invalid_credentials_login().await,
        AuthCase::MissingCredentialsLogin => behaviors.missing_credentials_login().await,
        AuthCase::SuccessfulLogout => behaviors.successful_logout().await,
    }
    .map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_suite_matches_the_reference_mix() {
        let weights = Suite::Login.weights();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        assert_eq!(total, 100.0);
        assert_eq!(weights[0], (AuthCase::PooledLogin, 85.0));
    }

    #[test]
    fn all_suite_covers_every_case() {
        let cases: Vec<AuthCase> = Suite::All.weights().iter().map(|(c, _)| *c).collect();
        for case in <AuthCase as tropel::CaseKey>::ALL {
            assert!(cases.contains(case), "{case:?} missing");
        }
    }

    #[test]
    fn every_weight_is_positive() {
        for suite in Suite::value_variants() {
            assert!(suite.weights().iter().all(|(_, w)| *w > 0.0), "{}", suite.name());
        }
    }
}
