use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};

use crate::pool::Identity;

/// Supplies fresh credentials to behaviors that create identities.
pub trait CredentialSource: Send + Sync {
    fn next_identity(&self) -> Identity;
}

/// Builds a random identity `<12 chars>@<domain>` with a password that
/// carries an upper case letter, a digit and a symbol.
pub fn random_identity<R: Rng + ?Sized>(rng: &mut R, domain: &str) -> Identity {
    let mut sample = |len: usize| -> String {
        (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    };
    let local = sample(12).to_lowercase();
    let password = format!("{}A1@", sample(12));
    Identity::new(format!("{local}@{domain}"), password)
}

/// [`CredentialSource`] backed by a shared random generator.
pub struct RandomCredentials {
    rng: Mutex<StdRng>,
    domain: String,
}

impl RandomCredentials {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            domain: domain.into(),
        }
    }

    pub fn seeded(domain: impl Into<String>, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            domain: domain.into(),
        }
    }
}

impl CredentialSource for RandomCredentials {
    fn next_identity(&self) -> Identity {
        random_identity(&mut *self.rng.lock(), &self.domain)
    }
}
