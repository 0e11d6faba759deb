//! Statement construction for the four backend primitives.

use uuid::Uuid;

use crate::codec;
use crate::{
    BatchSize, Condition, ExpectedVersion, Param, Procedure, Statement, StreamName, WriteMessage,
};

pub(crate) const GET_STREAM_MESSAGES: &str =
    "SELECT * FROM get_stream_messages($1::varchar, $2::bigint, $3::bigint, $4::varchar);";

// Correlation and consumer group filters are not used; they stay NULL.
pub(crate) const GET_CATEGORY_MESSAGES: &str = "SELECT * FROM get_category_messages($1::varchar, $2::bigint, $3::bigint, NULL, NULL, NULL, $4::varchar);";

pub(crate) const GET_LAST_STREAM_MESSAGE: &str =
    "SELECT * FROM get_last_stream_message($1::varchar);";

pub(crate) const WRITE_MESSAGE: &str = "SELECT write_message($1::varchar, $2::varchar, $3::varchar, $4::jsonb, $5::jsonb, $6::bigint);";

/// Read statement for a window of `stream_name`.
///
/// Category streams read across every entity stream of the category,
/// starting from a global position; entity streams read one stream starting
/// from a stream position.
pub(crate) fn build_read(
    stream_name: &StreamName,
    position: u64,
    batch_size: BatchSize,
    condition: Option<&Condition>,
) -> Statement {
    let (procedure, sql) = if stream_name.is_category() {
        (Procedure::GetCategoryMessages, GET_CATEGORY_MESSAGES)
    } else {
        (Procedure::GetStreamMessages, GET_STREAM_MESSAGES)
    };

    let params = vec![
        Param::Text(Some(stream_name.to_string())),
        Param::Integer(Some(to_bigint(position))),
        Param::Integer(Some(i64::from(u32::from(batch_size)))),
        Param::Text(condition.map(Condition::wrapped)),
    ];

    Statement::new(procedure, sql, params)
}

pub(crate) fn build_read_last(stream_name: &StreamName) -> Statement {
    Statement::new(
        Procedure::GetLastStreamMessage,
        GET_LAST_STREAM_MESSAGE,
        vec![Param::Text(Some(stream_name.to_string()))],
    )
}

/// Append statement for `message`, whose id has already been resolved.
pub(crate) fn build_append(
    id: Uuid,
    message: &WriteMessage,
    stream_name: &StreamName,
    expected_version: Option<ExpectedVersion>,
) -> Statement {
    let params = vec![
        Param::Text(Some(id.to_string())),
        Param::Text(Some(stream_name.to_string())),
        Param::Text(Some(message.message_type.clone())),
        Param::Text(Some(codec::encode_data(&message.data))),
        Param::Text(Some(codec::encode_metadata(&message.metadata))),
        Param::Integer(expected_version.map(ExpectedVersion::canonical)),
    ];

    Statement::new(Procedure::WriteMessage, WRITE_MESSAGE, params)
}

// No stream reaches i64::MAX positions, so saturating keeps the read empty.
fn to_bigint(position: u64) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}
