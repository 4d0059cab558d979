use tropel::Identity;

pub const SEED_PASSWORD: &str = "P@ssw0rd";
pub const SEED_COUNT: usize = 50;

/// Identities expected to exist before a run: `some1@email` to
/// `some50@email`.
pub fn seed_identities() -> Vec<Identity> {
    (1..=SEED_COUNT)
        .map(|n| Identity::new(format!("some{n}@email"), SEED_PASSWORD))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_distinct_identities() {
        let seeds = seed_identities();
        assert_eq!(seeds.len(), 50);
        assert_eq!(seeds[0], Identity::new("some1@email", "P@ssw0rd"));
        assert_eq!(seeds[49].username, "some50@email");
    }
}
