//! The Primitives engine's typed configuration surface.
//!
//! The engine never reads environment variables, CLI flags or files itself (SPEC_FULL.md §1,
//! §6): everything it needs crosses this one boundary, validated once at construction rather
//! than deep inside a running protocol.

use thiserror::Error;

/// Selects the pseudo-random generator backing share/random-number sampling.
///
/// The engine makes no claim of cryptographic strength for either choice (SPEC_FULL.md §9 open
/// question); `random_algorithm` simply names which one to use, matching the teacher
/// convention of a selector string rather than a trait object chosen implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomAlgorithm {
    /// `rand_chacha::ChaCha20Rng`, seeded from `rand::thread_rng()`.
    #[default]
    ChaCha20,
    /// The process' default thread-local RNG, reseeded per use. Chosen for reproducibility with
    /// systems that historically relied on a non-cryptographic process-default PRNG; see the
    /// open question in SPEC_FULL.md §9.
    ThreadLocal,
}

/// Configuration accepted by the Primitives engine.
///
/// Constructed and owned by the surrounding application (config loading, keystores, and CLI
/// parsing are all out of scope here, SPEC_FULL.md §1); the engine only ever sees an already
/// validated `EngineConfig`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The prime `p` used for sharing.
    pub prime_field_size: u64,

    /// The polynomial degree `t`. `None` selects the default `floor((m - 1) / 2)`.
    pub polynomial_degree_t: Option<u64>,

    /// The number of privacy peers, `m`.
    pub num_privacy_peers: usize,

    /// This peer's 1-based index into the ordered peer list.
    pub my_privacy_peer_index: usize,

    /// How many operations of a set run concurrently. `0` means "all of them".
    pub parallel_operations_count: usize,

    /// Whether Multiplication performs the mask-intersection handshake (SPEC_FULL.md §4.C).
    pub synchronize_shares: bool,

    /// Selects the PRNG backing random sampling.
    pub random_algorithm: RandomAlgorithm,
}

/// A validated, resolved view of an [EngineConfig] (default degree resolved, bounds checked).
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// See [EngineConfig::prime_field_size].
    pub prime_field_size: u64,
    /// The resolved polynomial degree.
    pub polynomial_degree_t: u64,
    /// See [EngineConfig::num_privacy_peers].
    pub num_privacy_peers: usize,
    /// See [EngineConfig::my_privacy_peer_index].
    pub my_privacy_peer_index: usize,
    /// The resolved parallel operation count (`0` resolved to `usize::MAX`, meaning unbounded).
    pub parallel_operations_count: usize,
    /// See [EngineConfig::synchronize_shares].
    pub synchronize_shares: bool,
    /// See [EngineConfig::random_algorithm].
    pub random_algorithm: RandomAlgorithm,
}

/// A configuration value was out of range.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// `prime_field_size` was smaller than 2.
    #[error("prime_field_size must be at least 2")]
    PrimeTooSmall,

    /// `num_privacy_peers` was smaller than 2 (multiplication needs `m >= 2t + 1 >= 3`).
    #[error("num_privacy_peers must be at least 2")]
    NotEnoughPeers,

    /// `my_privacy_peer_index` wasn't in `1 ..= num_privacy_peers`.
    #[error("my_privacy_peer_index {index} out of range for {peer_count} peers")]
    PeerIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The configured peer count.
        peer_count: usize,
    },

    /// `polynomial_degree_t` was outside `1 ..= floor((m - 1) / 2)`.
    #[error("polynomial_degree_t {degree} out of range for {peer_count} peers")]
    DegreeOutOfRange {
        /// The offending degree.
        degree: u64,
        /// The configured peer count.
        peer_count: usize,
    },
}

impl EngineConfig {
    /// Validates this configuration, resolving `polynomial_degree_t = None` to its default.
    pub fn validate(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.prime_field_size < 2 {
            return Err(ConfigError::PrimeTooSmall);
        }
        if self.num_privacy_peers < 2 {
            return Err(ConfigError::NotEnoughPeers);
        }
        if self.my_privacy_peer_index == 0 || self.my_privacy_peer_index > self.num_privacy_peers {
            return Err(ConfigError::PeerIndexOutOfRange {
                index: self.my_privacy_peer_index,
                peer_count: self.num_privacy_peers,
            });
        }
        let max_degree = (self.num_privacy_peers as u64 - 1) / 2;
        let degree = self.polynomial_degree_t.unwrap_or(max_degree);
        if degree == 0 || degree > max_degree {
            return Err(ConfigError::DegreeOutOfRange { degree, peer_count: self.num_privacy_peers });
        }
        let parallel_operations_count =
            if self.parallel_operations_count == 0 { usize::MAX } else { self.parallel_operations_count };
        Ok(ResolvedConfig {
            prime_field_size: self.prime_field_size,
            polynomial_degree_t: degree,
            num_privacy_peers: self.num_privacy_peers,
            my_privacy_peer_index: self.my_privacy_peer_index,
            parallel_operations_count,
            synchronize_shares: self.synchronize_shares,
            random_algorithm: self.random_algorithm,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig {
            prime_field_size: 2147483647,
            polynomial_degree_t: None,
            num_privacy_peers: 5,
            my_privacy_peer_index: 1,
            parallel_operations_count: 0,
            synchronize_shares: true,
            random_algorithm: RandomAlgorithm::ChaCha20,
        }
    }

    #[test]
    fn default_degree_resolves() {
        let resolved = base().validate().unwrap();
        assert_eq!(resolved.polynomial_degree_t, 2);
        assert_eq!(resolved.parallel_operations_count, usize::MAX);
    }

    #[test]
    fn rejects_peer_index_out_of_range() {
        let mut config = base();
        config.my_privacy_peer_index = 6;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PeerIndexOutOfRange { index: 6, peer_count: 5 })
        );
    }

    #[test]
    fn rejects_degree_out_of_range() {
        let mut config = base();
        config.polynomial_degree_t = Some(10);
        assert!(matches!(config.validate(), Err(ConfigError::DegreeOutOfRange { .. })));
    }
}
