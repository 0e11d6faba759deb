//! The three store operations, plus paging and stream version helpers.
//!
//! Every function here is stateless: it borrows a caller-owned session for
//! exactly one backend round trip (except [`read`], which issues one `get`
//! per page) and keeps nothing between calls.

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info, instrument};

use crate::execute::execute;
use crate::mapper::{self, non_negative};
use crate::queries;
use crate::{
    GetLastOptions, GetOptions, MessageStoreError, PutOptions, ReadMessage, Session, StreamName,
    WriteMessage,
};

/// Read a window of messages from an entity or category stream.
///
/// Entity streams return messages with `position >= options.position`;
/// category streams return messages from every stream in the category with
/// `global_position >= options.position`. At most `options.batch_size`
/// messages are returned, in the order the backend produced them. An empty
/// result is not an error.
///
/// # Examples
///
/// ```ignore
/// let messages = messagestore::get(&session, &stream_name, GetOptions::default()).await?;
/// for message in &messages {
///     println!("{} {}", message.position(), message.message_type());
/// }
/// ```
#[instrument(
    name = "message_store.get",
    skip(session, options),
    fields(stream_name = %stream_name, position = options.position, batch_size = %options.batch_size)
)]
pub async fn get<S>(
    session: &S,
    stream_name: &StreamName,
    options: GetOptions,
) -> Result<Vec<ReadMessage>, MessageStoreError>
where
    S: Session + Sync,
{
    let GetOptions {
        position,
        batch_size,
        condition,
        transform,
    } = options;

    debug!(
        category = stream_name.is_category(),
        condition = condition.as_ref().map(|condition| condition.fragment()),
        "[message_store.get] reading messages"
    );

    let statement = queries::build_read(stream_name, position, batch_size, condition.as_ref());
    let rows = execute(session, &statement).await?;

    let messages = rows
        .iter()
        .map(|row| mapper::map_row(row, &transform))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        count = messages.len(),
        "[message_store.get] read messages"
    );

    Ok(messages)
}

/// Read the last message of a stream, `None` when the stream is empty.
#[instrument(name = "message_store.get_last", skip(session, options), fields(stream_name = %stream_name))]
pub async fn get_last<S>(
    session: &S,
    stream_name: &StreamName,
    options: GetLastOptions,
) -> Result<Option<ReadMessage>, MessageStoreError>
where
    S: Session + Sync,
{
    let statement = queries::build_read_last(stream_name);
    let rows = execute(session, &statement).await?;

    let message = mapper::map_optional_row(rows.first(), &options.transform)?;

    debug!(
        found = message.is_some(),
        position = message.as_ref().map(ReadMessage::position),
        "[message_store.get_last] read last message"
    );

    Ok(message)
}

/// Append one message to a stream.
///
/// The message id is taken from `message.id` or generated with
/// `options.id_generator`. When `options.expected_version` is set, the
/// backend rejects the append unless the stream's last position matches, and
/// this returns [`MessageStoreError::VersionConflict`]. Returns the global
/// position assigned to the message, or `None` if the backend reports none.
///
/// # Examples
///
/// ```ignore
/// let message = WriteMessage::new("Added", json!({ "qty": 3 }));
/// let options = PutOptions::new().with_expected_version(ExpectedVersion::NoStream);
///
/// match messagestore::put(&session, &message, &stream_name, options).await {
///     Ok(global_position) => println!("written at {global_position:?}"),
///     Err(error) if error.is_version_conflict() => println!("stream moved on, retry"),
///     Err(error) => return Err(error),
/// }
/// ```
#[instrument(
    name = "message_store.put",
    skip(session, message, options),
    fields(stream_name = %stream_name, message_type = %message.message_type)
)]
pub async fn put<S>(
    session: &S,
    message: &WriteMessage,
    stream_name: &StreamName,
    options: PutOptions,
) -> Result<Option<u64>, MessageStoreError>
where
    S: Session + Sync,
{
    let PutOptions {
        expected_version,
        id_generator,
    } = options;

    let id = message.id.unwrap_or_else(|| id_generator.generate());

    debug!(
        message_id = %id,
        expected_version = expected_version.map(|version| version.canonical()),
        "[message_store.put] writing message"
    );

    let statement = queries::build_append(id, message, stream_name, expected_version);
    let rows = execute(session, &statement).await?;

    let global_position = match rows.first() {
        Some(row) => row
            .optional_integer(0, "global_position")?
            .map(|value| non_negative(value, "global_position"))
            .transpose()?,
        None => None,
    };

    info!(
        message_id = %id,
        global_position,
        "[message_store.put] wrote message"
    );

    Ok(global_position)
}

/// Position of the last message in a stream, `None` when the stream is empty.
pub async fn stream_version<S>(
    session: &S,
    stream_name: &StreamName,
) -> Result<Option<u64>, MessageStoreError>
where
    S: Session + Sync,
{
    let last = get_last(session, stream_name, GetLastOptions::default()).await?;
    Ok(last.as_ref().map(ReadMessage::position))
}

/// Read every message from `options.position` onwards, one batch at a time.
///
/// Each page is a [`get`] call. After a full page the next one starts just
/// past the last message read (by stream position for entity streams, by
/// global position for category streams); a short or empty page ends the
/// stream. The first error ends the stream after being yielded.
pub fn read<'a, S>(
    session: &'a S,
    stream_name: &'a StreamName,
    options: GetOptions,
) -> impl Stream<Item = Result<ReadMessage, MessageStoreError>> + 'a
where
    S: Session + Sync,
{
    let page_size = usize::try_from(u32::from(options.batch_size)).unwrap_or(usize::MAX);
    let category = stream_name.is_category();

    stream::try_unfold(Some(options), move |next: Option<GetOptions>| async move {
        let Some(options) = next else {
            return Ok::<_, MessageStoreError>(None);
        };

        let page = get(session, stream_name, options.clone()).await?;

        let next = if page.len() < page_size {
            None
        } else {
            page.last().map(|last| {
                let position = if category {
                    last.global_position()
                } else {
                    last.position()
                };
                options.with_position(position.saturating_add(1))
            })
        };

        Ok(Some((stream::iter(page.into_iter().map(Ok::<_, MessageStoreError>)), next)))
    })
    .try_flatten()
}
