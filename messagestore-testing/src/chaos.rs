use std::future::Future;
use std::sync::{Mutex, PoisonError};

use messagestore::{BackendError, Param, Procedure, Row, Session, Statement};
use nutype::nutype;
use rand::{random, rngs::StdRng, Rng, SeedableRng};

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```ignore
/// use messagestore_testing::chaos::Probability;
///
/// let never = Probability::try_new(0.0).unwrap();
/// let sometimes = Probability::try_new(0.5).unwrap();
/// let always = Probability::try_new(1.0).unwrap();
///
/// // Values outside [0.0, 1.0] are rejected
/// assert!(Probability::try_new(1.5).is_err());
/// assert!(Probability::try_new(-0.1).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Probability,
    version_conflict_probability: Probability,
}

impl ChaosConfig {
    pub fn deterministic() -> Self {
        Self::seeded(0)
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            deterministic_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Chance that any statement fails with an opaque backend error.
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }

    /// Chance that an append fails the way a stale expected version does.
    pub fn with_version_conflict_probability(mut self, probability: f32) -> Self {
        self.version_conflict_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            failure_probability: Probability::try_new(0.0).expect("0.0 is valid probability"),
            version_conflict_probability: Probability::try_new(0.0)
                .expect("0.0 is valid probability"),
        }
    }
}

pub trait ChaosSessionExt: Sized {
    fn with_chaos(self, config: ChaosConfig) -> ChaosSession<Self>;
}

/// Session wrapper that injects backend failures before delegating.
///
/// Injected failures never reach the wrapped session, so the store is left
/// unchanged by them.
pub struct ChaosSession<S> {
    session: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl<S> ChaosSession<S> {
    pub fn new(session: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            session,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn inner(&self) -> &S {
        &self.session
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let probability: f32 = probability.into();

        if probability <= 0.0 {
            return false;
        }

        if probability >= 1.0 {
            return true;
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        rng.random_bool(f64::from(probability))
    }
}

/// Backend text of a rejected append, shaped like the database's own.
fn injected_conflict(statement: &Statement) -> BackendError {
    let stream_name = match statement.params().get(1) {
        Some(Param::Text(Some(stream_name))) => stream_name.as_str(),
        _ => "unknown",
    };
    let expected_version = match statement.params().get(5) {
        Some(Param::Integer(Some(version))) => version.to_string(),
        _ => "none".to_string(),
    };

    BackendError::new(format!(
        "Wrong expected version: {expected_version} (Stream: {stream_name}, Stream Version: injected)"
    ))
}

impl<S> Session for ChaosSession<S>
where
    S: Session + Sync,
{
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send {
        let is_append = statement.procedure() == Procedure::WriteMessage;
        let should_conflict =
            is_append && self.should_inject(self.config.version_conflict_probability);
        let should_fail = self.should_inject(self.config.failure_probability);
        let session = &self.session;

        async move {
            if should_conflict {
                return Err(injected_conflict(statement));
            }

            if should_fail {
                return Err(BackendError::new(format!(
                    "chaos: injected failure in {}",
                    statement.procedure()
                )));
            }

            session.execute(statement).await
        }
    }
}

impl<S> ChaosSessionExt for S
where
    S: Session + Sync,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosSession<Self> {
        ChaosSession::new(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messagestore::{ExpectedVersion, GetOptions, PutOptions, StreamName, WriteMessage};
    use messagestore_memory::InMemorySession;
    use serde_json::json;

    fn stream_name() -> StreamName {
        StreamName::try_new("chaos-1").expect("valid stream name")
    }

    #[test]
    fn deterministic_config_sets_seed() {
        let default_is_none = ChaosConfig::default().deterministic_seed.is_none();
        let deterministic_is_some = ChaosConfig::deterministic().deterministic_seed.is_some();

        assert!(default_is_none && deterministic_is_some);
    }

    #[tokio::test]
    async fn zero_probability_passthrough_allows_normal_operations() {
        let session = InMemorySession::new().with_chaos(ChaosConfig::default());
        let message = WriteMessage::new("Added", json!({}));

        let put = messagestore::put(&session, &message, &stream_name(), PutOptions::default()).await;
        let get = messagestore::get(&session, &stream_name(), GetOptions::default()).await;

        assert!(put.is_ok() && get.is_ok());
    }

    #[tokio::test]
    async fn certain_conflict_surfaces_as_version_conflict() {
        let session = InMemorySession::new()
            .with_chaos(ChaosConfig::deterministic().with_version_conflict_probability(1.0));
        let message = WriteMessage::new("Added", json!({}));
        let options = PutOptions::new().with_expected_version(ExpectedVersion::NoStream);

        let error = messagestore::put(&session, &message, &stream_name(), options)
            .await
            .expect_err("conflict is always injected");

        assert!(error.is_version_conflict());
        assert_eq!(session.inner().message_count(), 0);
    }

    #[tokio::test]
    async fn conflicts_are_only_injected_into_appends() {
        let session = InMemorySession::new()
            .with_chaos(ChaosConfig::deterministic().with_version_conflict_probability(1.0));

        let read = messagestore::get(&session, &stream_name(), GetOptions::default()).await;

        assert!(read.is_ok());
    }

    #[tokio::test]
    async fn certain_failure_is_an_opaque_backend_error() {
        let session = InMemorySession::new()
            .with_chaos(ChaosConfig::deterministic().with_failure_probability(1.0));

        let error = messagestore::get(&session, &stream_name(), GetOptions::default())
            .await
            .expect_err("failure is always injected");

        assert!(!error.is_version_conflict());
        assert_eq!(error.to_string(), "chaos: injected failure in get_stream_messages");
    }

    #[test]
    fn out_of_range_probability_is_clamped() {
        let config = ChaosConfig::default().with_failure_probability(3.0);

        assert_eq!(f32::from(config.failure_probability), 1.0);
    }
}
