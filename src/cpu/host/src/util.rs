use rand::{distributions::Alphanumeric, Rng};
use std::env;

pub fn env_is_set(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => !value.is_empty(),
        Err(_) => false,
    }
}

pub fn env_bool(name: &str, false_name: &str, default_value: bool) -> bool {
    if env_is_set(name) {
        assert!(!env_is_set(false_name), "bool environment variable conflicts");
        true
    } else if env_is_set(false_name) {
        false
    } else {
        default_value
    }
}

pub fn env_usize(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("environment variable {name} should be an unsigned integer, found {value:?}")),
        Err(_) => default,
    }
}

/// the `__sync` token the host sends to the board
pub fn random_name_16() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
