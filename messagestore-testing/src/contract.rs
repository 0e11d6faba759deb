//! Behavioral contract every message store session must satisfy.
//!
//! Each scenario builds its own session with the supplied factory and uses
//! freshly generated stream names, so the suite can run in parallel against
//! a shared database.

use std::fmt;

use messagestore::{
    BatchSize, ExpectedVersion, GetLastOptions, GetOptions, MessageStoreError, PutOptions,
    ReadMessage, Session, StreamName, WriteMessage, WRONG_EXPECTED_VERSION,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(
        scenario: &'static str,
        operation: &'static str,
        error: &MessageStoreError,
    ) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

pub type ContractTestResult = Result<(), ContractTestFailure>;

/// A category name no other test run will use.
fn contract_category(scenario: &'static str) -> String {
    // Categories cannot contain the id separator, so use the hyphenless form
    format!("contract_{scenario}_{}", Uuid::now_v7().simple())
}

fn contract_stream(scenario: &'static str, raw: String) -> Result<StreamName, ContractTestFailure> {
    StreamName::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct stream name `{raw}`: {error}"),
        )
    })
}

fn entity_stream(
    scenario: &'static str,
    category: &str,
    id: &str,
) -> Result<StreamName, ContractTestFailure> {
    contract_stream(scenario, format!("{category}-{id}"))
}

fn contract_message(sequence: u64) -> WriteMessage {
    WriteMessage::new("ContractTested", json!({ "sequence": sequence }))
        .with_metadata(json!({ "origin": "contract" }))
}

async fn put_message<S>(
    scenario: &'static str,
    session: &S,
    stream_name: &StreamName,
    sequence: u64,
    options: PutOptions,
) -> Result<u64, ContractTestFailure>
where
    S: Session + Sync,
{
    messagestore::put(session, &contract_message(sequence), stream_name, options)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "put", &error))?
        .ok_or_else(|| ContractTestFailure::assertion(scenario, "put reported no global position"))
}

async fn get_messages<S>(
    scenario: &'static str,
    session: &S,
    stream_name: &StreamName,
    options: GetOptions,
) -> Result<Vec<ReadMessage>, ContractTestFailure>
where
    S: Session + Sync,
{
    messagestore::get(session, stream_name, options)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "get", &error))
}

fn positions(messages: &[ReadMessage]) -> Vec<u64> {
    messages.iter().map(ReadMessage::position).collect()
}

fn batch_size(scenario: &'static str, size: u32) -> Result<BatchSize, ContractTestFailure> {
    BatchSize::try_new(size).map_err(|error| {
        ContractTestFailure::assertion(scenario, format!("invalid batch size {size}: {error}"))
    })
}

pub async fn test_append_and_read<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "append_and_read";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "1")?;
    let id = Uuid::new_v4();

    let message = contract_message(7).with_id(id);
    messagestore::put(&session, &message, &stream_name, PutOptions::default())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "put", &error))?;

    let messages = get_messages(SCENARIO, &session, &stream_name, GetOptions::default()).await?;

    let [read] = messages.as_slice() else {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected exactly one message, observed {}", messages.len()),
        ));
    };

    if read.id() != id
        || read.stream_name() != &stream_name
        || read.message_type() != "ContractTested"
        || read.position() != 0
        || read.data() != &json!({ "sequence": 7 })
        || read.metadata() != &json!({ "origin": "contract" })
    {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("read message does not match the appended one: {read:?}"),
        ));
    }

    Ok(())
}

pub async fn test_expected_version_conflict<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "expected_version_conflict";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "1")?;
    let new_stream = || PutOptions::new().with_expected_version(ExpectedVersion::NoStream);

    let _ = put_message(SCENARIO, &session, &stream_name, 0, new_stream()).await?;

    match messagestore::put(&session, &contract_message(1), &stream_name, new_stream()).await {
        Err(MessageStoreError::VersionConflict { message, .. }) => {
            if !message.starts_with(WRONG_EXPECTED_VERSION) {
                return Err(ContractTestFailure::assertion(
                    SCENARIO,
                    format!("conflict message lost the backend text: {message}"),
                ));
            }
        }
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "put", &error)),
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected version conflict but append succeeded",
            ))
        }
    }

    let messages = get_messages(SCENARIO, &session, &stream_name, GetOptions::default()).await?;
    if messages.len() != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "rejected append changed the stream, observed {} messages",
                messages.len()
            ),
        ));
    }

    Ok(())
}

pub async fn test_expected_version_sequence<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "expected_version_sequence";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "123")?;

    let first = put_message(
        SCENARIO,
        &session,
        &stream_name,
        0,
        PutOptions::new().with_expected_version(ExpectedVersion::NoStream),
    )
    .await?;
    let second = put_message(
        SCENARIO,
        &session,
        &stream_name,
        1,
        PutOptions::new().with_expected_version(0_u64),
    )
    .await?;

    if second <= first {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("global positions must increase, observed {first} then {second}"),
        ));
    }

    let stale = messagestore::put(
        &session,
        &contract_message(2),
        &stream_name,
        PutOptions::new().with_expected_version(0_u64),
    )
    .await;

    match stale {
        Err(error) if error.is_version_conflict() => Ok(()),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "put", &error)),
        Ok(_) => Err(ContractTestFailure::assertion(
            SCENARIO,
            "stale expected version was accepted",
        )),
    }
}

pub async fn test_sequential_positions<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "sequential_positions";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "1")?;

    let mut written = Vec::new();
    for sequence in 0..3 {
        written.push(put_message(SCENARIO, &session, &stream_name, sequence, PutOptions::default()).await?);
    }

    let messages = get_messages(SCENARIO, &session, &stream_name, GetOptions::default()).await?;

    if positions(&messages) != [0, 1, 2] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected positions [0, 1, 2], observed {:?}", positions(&messages)),
        ));
    }

    let global_positions: Vec<u64> = messages.iter().map(ReadMessage::global_position).collect();
    if global_positions != written {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "put returned {written:?} but messages carry global positions {global_positions:?}"
            ),
        ));
    }

    if global_positions.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("global positions must increase, observed {global_positions:?}"),
        ));
    }

    Ok(())
}

pub async fn test_missing_stream_reads<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "missing_stream_reads";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "absent")?;

    let messages = get_messages(SCENARIO, &session, &stream_name, GetOptions::default()).await?;
    if !messages.is_empty() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected no messages, observed {}", messages.len()),
        ));
    }

    let last = messagestore::get_last(&session, &stream_name, GetLastOptions::default())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "get_last", &error))?;
    if let Some(last) = last {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected no last message, observed {last:?}"),
        ));
    }

    Ok(())
}

pub async fn test_get_last_returns_latest<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "get_last_returns_latest";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "1")?;
    let other_stream = entity_stream(SCENARIO, &category, "2")?;

    for sequence in 0..3 {
        let _ = put_message(SCENARIO, &session, &stream_name, sequence, PutOptions::default()).await?;
    }
    let _ = put_message(SCENARIO, &session, &other_stream, 9, PutOptions::default()).await?;

    let last = messagestore::get_last(&session, &stream_name, GetLastOptions::default())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "get_last", &error))?
        .ok_or_else(|| ContractTestFailure::assertion(SCENARIO, "expected a last message"))?;

    if last.position() != 2 || last.data() != &json!({ "sequence": 2 }) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected the third message, observed {last:?}"),
        ));
    }

    Ok(())
}

pub async fn test_batch_size_limits_reads<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "batch_size_limits_reads";

    let session = make_session();
    let category = contract_category(SCENARIO);
    let stream_name = entity_stream(SCENARIO, &category, "1")?;

    for sequence in 0..5 {
        let _ = put_message(SCENARIO, &session, &stream_name, sequence, PutOptions::default()).await?;
    }

    let first_page = get_messages(
        SCENARIO,
        &session,
        &stream_name,
        GetOptions::new().with_batch_size(batch_size(SCENARIO, 2)?),
    )
    .await?;
    if positions(&first_page) != [0, 1] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected positions [0, 1], observed {:?}", positions(&first_page)),
        ));
    }

    let tail = get_messages(
        SCENARIO,
        &session,
        &stream_name,
        GetOptions::new()
            .with_position(3)
            .with_batch_size(batch_size(SCENARIO, 2)?),
    )
    .await?;
    if positions(&tail) != [3, 4] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected positions [3, 4], observed {:?}", positions(&tail)),
        ));
    }

    Ok(())
}

pub async fn test_category_reads<F, S>(make_session: F) -> ContractTestResult
where
    F: Fn() -> S,
    S: Session + Sync,
{
    const SCENARIO: &str = "category_reads";

    let session = make_session();
    let category_raw = contract_category(SCENARIO);
    let category = contract_stream(SCENARIO, category_raw.clone())?;
    let first = entity_stream(SCENARIO, &category_raw, "1")?;
    let second = entity_stream(SCENARIO, &category_raw, "2")?;
    let unrelated = entity_stream(SCENARIO, &contract_category(SCENARIO), "1")?;

    let _ = put_message(SCENARIO, &session, &first, 0, PutOptions::default()).await?;
    let second_global = put_message(SCENARIO, &session, &second, 1, PutOptions::default()).await?;
    let _ = put_message(SCENARIO, &session, &unrelated, 2, PutOptions::default()).await?;
    let _ = put_message(SCENARIO, &session, &first, 3, PutOptions::default()).await?;

    let messages = get_messages(SCENARIO, &session, &category, GetOptions::default()).await?;
    let streams: Vec<&str> = messages
        .iter()
        .map(|message| message.stream_name().as_str())
        .collect();
    let expected = [first.as_str(), second.as_str(), first.as_str()];
    if streams != expected {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected category streams {expected:?}, observed {streams:?}"),
        ));
    }

    let from_second = get_messages(
        SCENARIO,
        &session,
        &category,
        GetOptions::new().with_position(second_global),
    )
    .await?;
    if from_second.len() != 2 || from_second[0].global_position() != second_global {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "category read from global position {second_global} returned {:?}",
                from_second
                    .iter()
                    .map(ReadMessage::global_position)
                    .collect::<Vec<_>>()
            ),
        ));
    }

    Ok(())
}

#[macro_export]
macro_rules! message_store_contract_tests {
    (suite = $suite:ident, make_session = $make_session:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_append_and_read, test_batch_size_limits_reads, test_category_reads,
                test_expected_version_conflict, test_expected_version_sequence,
                test_get_last_returns_latest, test_missing_stream_reads,
                test_sequential_positions,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn append_and_read_contract() {
                test_append_and_read($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn expected_version_conflict_contract() {
                test_expected_version_conflict($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn expected_version_sequence_contract() {
                test_expected_version_sequence($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn sequential_positions_contract() {
                test_sequential_positions($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn missing_stream_reads_contract() {
                test_missing_stream_reads($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn get_last_returns_latest_contract() {
                test_get_last_returns_latest($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn batch_size_limits_reads_contract() {
                test_batch_size_limits_reads($make_session)
                    .await
                    .expect("message store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn category_reads_contract() {
                test_category_reads($make_session)
                    .await
                    .expect("message store contract failed");
            }
        }
    };
}

pub use message_store_contract_tests;
