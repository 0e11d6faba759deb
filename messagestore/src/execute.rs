//! Statement execution and backend failure classification.
//!
//! This is the only place that interprets backend error text. A failure whose
//! message starts with [`WRONG_EXPECTED_VERSION`] is a version conflict;
//! everything else passes through untouched.

use tracing::{error, warn};

use crate::{BackendError, MessageStoreError, Row, Session, Statement};

/// Prefix the backend uses when an expected version check fails.
pub const WRONG_EXPECTED_VERSION: &str = "Wrong expected version";

pub(crate) async fn execute<S>(
    session: &S,
    statement: &Statement,
) -> Result<Vec<Row>, MessageStoreError>
where
    S: Session + Sync,
{
    session
        .execute(statement)
        .await
        .map_err(|error| translate(error, statement))
}

fn translate(error: BackendError, statement: &Statement) -> MessageStoreError {
    if error.message().starts_with(WRONG_EXPECTED_VERSION) {
        warn!(
            procedure = %statement.procedure(),
            error = %error,
            "[message_store.version_conflict] expected version check failed"
        );
        return MessageStoreError::VersionConflict {
            message: error.message().to_string(),
            source: error,
        };
    }

    error!(
        procedure = %statement.procedure(),
        error = %error,
        "[message_store.backend_error] backend operation failed"
    );
    MessageStoreError::Backend(error)
}
