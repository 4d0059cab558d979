//! Shared pool of registered identities.
//!
//! The pool starts from an optional seed list, grows as registration
//! behaviors succeed and is never shrunk. Readers pick from whatever the pool
//! holds at the time of the pick: the length bound and the indexed read happen
//! under the same read guard, so a concurrent append can never cause an out of
//! bounds access.

use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    cursor::RoundRobinCursor,
    error::{Error, Result},
};

/// A credential pair. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub password: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct IdentityPool {
    identities: RwLock<Vec<Arc<Identity>>>,
    cursor: RoundRobinCursor,
}

impl IdentityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            identities: RwLock::new(seed.into_iter().map(Arc::new).collect()),
            cursor: RoundRobinCursor::new(),
        }
    }

    pub fn append(&self, identity: Identity) {
        self.identities.write().push(Arc::new(identity));
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.read().is_empty()
    }

    /// Uniformly random identity from the current pool.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Arc<Identity>> {
        let identities = self.identities.read();
        if identities.is_empty() {
            return Err(Error::EmptyPool);
        }
        let index = rng.gen_range(0..identities.len());
        Ok(Arc::clone(&identities[index]))
    }

    /// Identity at the shared cursor, modulo the current pool length.
    pub fn pick_round_robin(&self) -> Result<Arc<Identity>> {
        let identities = self.identities.read();
        if identities.is_empty() {
            return Err(Error::EmptyPool);
        }
        let ticket = self.cursor.next_ticket();
        Ok(Arc::clone(&identities[ticket % identities.len()]))
    }

    /// Copy of the pool as it stands.
    pub fn snapshot(&self) -> Vec<Arc<Identity>> {
        self.identities.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::thread;

    fn user(n: usize) -> Identity {
        Identity::new(format!("some{n}@email"), "P@ssw0rd")
    }

    #[test]
    fn empty_pool_fails_both_picks() {
        let pool = IdentityPool::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(pool.pick_random(&mut rng), Err(Error::EmptyPool)));
        assert!(matches!(pool.pick_round_robin(), Err(Error::EmptyPool)));
    }

    #[test]
    fn single_identity_is_always_picked() {
        let pool = IdentityPool::seeded([user(1)]);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            assert_eq!(*pool.pick_random(&mut rng).unwrap(), user(1));
        }
    }

    #[test]
    fn round_robin_cycles_over_seed() {
        let pool = IdentityPool::seeded((1..=3).map(user));
        let picked: Vec<String> = (0..6)
            .map(|_| pool.pick_round_robin().unwrap().username.clone())
            .collect();
        assert_eq!(
            picked,
            vec![
                "some1@email",
                "some2@email",
                "some3@email",
                "some1@email",
                "some2@email",
                "some3@email"
            ]
        );
    }

    #[test]
    fn appended_identity_joins_the_cycle_once() {
        let pool = IdentityPool::seeded((1..=3).map(user));
        pool.pick_round_robin().unwrap();
        pool.append(user(4));

        // The cursor is monotonic, so any window of `len` picks covers every
        // identity exactly once.
        let len = pool.len();
        for _ in 0..3 {
            let cycle: Vec<Arc<Identity>> =
                (0..len).map(|_| pool.pick_round_robin().unwrap()).collect();
            assert_eq!(cycle.iter().filter(|i| ***i == user(4)).count(), 1);
        }
    }

    #[test]
    fn concurrent_appends_and_reads() {
        let pool = Arc::new(IdentityPool::seeded([user(0)]));

        let writers: Vec<_> = (1..=4)
            .map(|w| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..250 {
                        pool.append(user(w * 1000 + i));
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|seed| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    for _ in 0..1000 {
                        pool.pick_random(&mut rng).unwrap();
                        pool.pick_round_robin().unwrap();
                    }
                })
            })
            .collect();

        writers
            .into_iter()
            .chain(readers)
            .for_each(|h| h.join().unwrap());
        assert_eq!(pool.len(), 1001);
    }
}
