//! Conversion of raw result rows into `ReadMessage`s.
//!
//! Message rows have eight columns in fixed order: id, stream name, type,
//! position, global position, data, metadata, time.

use uuid::Uuid;

use crate::codec;
use crate::{CodecError, MessageRecord, ReadMessage, ReadTransform, Row, StreamName};

const COLUMNS: [&str; 8] = [
    "id",
    "stream_name",
    "type",
    "position",
    "global_position",
    "data",
    "metadata",
    "time",
];

pub(crate) fn map_row(row: &Row, transform: &ReadTransform) -> Result<ReadMessage, CodecError> {
    if row.len() != COLUMNS.len() {
        return Err(CodecError::ColumnCount {
            expected: COLUMNS.len(),
            actual: row.len(),
        });
    }

    let id = row.text(0, COLUMNS[0])?;
    let id = Uuid::parse_str(id).map_err(|_| CodecError::InvalidMessageId {
        value: id.to_string(),
    })?;

    let stream_name = row.text(1, COLUMNS[1])?;
    let stream_name =
        StreamName::try_new(stream_name).map_err(|_| CodecError::InvalidStreamName {
            value: stream_name.to_string(),
        })?;

    let record = MessageRecord {
        id,
        stream_name,
        message_type: row.text(2, COLUMNS[2])?.to_string(),
        position: non_negative(row.integer(3, COLUMNS[3])?, COLUMNS[3])?,
        global_position: non_negative(row.integer(4, COLUMNS[4])?, COLUMNS[4])?,
        data: codec::decode_data(row.optional_text(5, COLUMNS[5])?)?,
        metadata: codec::decode_metadata(row.optional_text(6, COLUMNS[6])?)?,
        time: row.timestamp(7, COLUMNS[7])?.and_utc(),
    };

    Ok(ReadMessage::from(transform.apply(record)))
}

/// An absent row is a valid "no message" result.
pub(crate) fn map_optional_row(
    row: Option<&Row>,
    transform: &ReadTransform,
) -> Result<Option<ReadMessage>, CodecError> {
    row.map(|row| map_row(row, transform)).transpose()
}

pub(crate) fn non_negative(value: i64, column: &'static str) -> Result<u64, CodecError> {
    u64::try_from(value).map_err(|_| CodecError::NegativePosition { column, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cell;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde_json::json;

    const ID: &str = "0b5e3a52-7a6e-4a38-9a43-2f1d8d5c4b10";

    fn time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(12, 30, 0))
            .expect("valid timestamp")
    }

    fn message_row() -> Vec<Cell> {
        vec![
            Cell::Text(ID.to_string()),
            Cell::Text("cart-123".to_string()),
            Cell::Text("Added".to_string()),
            Cell::Integer(0),
            Cell::Integer(1),
            Cell::Text(r#"{"qty": 3}"#.to_string()),
            Cell::Text(r#"{"schema_version": "1"}"#.to_string()),
            Cell::Timestamp(time()),
        ]
    }

    #[test]
    fn maps_columns_in_fixed_order() {
        let message = map_row(&Row::new(message_row()), &ReadTransform::identity())
            .expect("row should map");

        assert_eq!(message.id().to_string(), ID);
        assert_eq!(message.stream_name().as_str(), "cart-123");
        assert_eq!(message.message_type(), "Added");
        assert_eq!(message.position(), 0);
        assert_eq!(message.global_position(), 1);
        assert_eq!(message.data(), &json!({ "qty": 3 }));
        assert_eq!(message.metadata(), &json!({ "schema_version": "1" }));
        assert_eq!(message.time(), DateTime::<Utc>::from_naive_utc_and_offset(time(), Utc));
    }

    #[test]
    fn null_payloads_decode_to_null() {
        let mut cells = message_row();
        cells[5] = Cell::Null;
        cells[6] = Cell::Null;

        let message = map_row(&Row::new(cells), &ReadTransform::identity()).expect("row should map");

        assert!(message.data().is_null());
        assert!(message.metadata().is_null());
    }

    #[test]
    fn transform_sees_decoded_record_before_freeze() {
        let transform = ReadTransform::new(|mut record| {
            record.message_type = record.message_type.to_lowercase();
            record.metadata = json!({ "seen_qty": record.data["qty"] });
            record
        });

        let message = map_row(&Row::new(message_row()), &transform).expect("row should map");

        assert_eq!(message.message_type(), "added");
        assert_eq!(message.metadata(), &json!({ "seen_qty": 3 }));
    }

    #[test]
    fn stream_name_is_not_rewritten() {
        let mut cells = message_row();
        cells[1] = Cell::Text("cart-1 ".to_string());

        let message = map_row(&Row::new(cells), &ReadTransform::identity()).expect("row should map");

        assert_eq!(message.stream_name().as_str(), "cart-1 ");
    }

    #[test]
    fn blank_stream_name_is_rejected() {
        let mut cells = message_row();
        cells[1] = Cell::Text("  ".to_string());

        let error = map_row(&Row::new(cells), &ReadTransform::identity()).expect_err("blank name");

        assert!(matches!(error, CodecError::InvalidStreamName { .. }));
    }

    #[test]
    fn absent_row_maps_to_none() {
        let mapped = map_optional_row(None, &ReadTransform::identity()).expect("no row is fine");

        assert!(mapped.is_none());
    }

    #[test]
    fn short_row_is_rejected() {
        let mut cells = message_row();
        let _ = cells.pop();

        let error = map_row(&Row::new(cells), &ReadTransform::identity()).expect_err("seven columns");

        assert!(matches!(error, CodecError::ColumnCount { expected: 8, actual: 7 }));
    }

    #[test]
    fn invalid_id_is_rejected() {
        let mut cells = message_row();
        cells[0] = Cell::Text("not-a-uuid".to_string());

        let error = map_row(&Row::new(cells), &ReadTransform::identity()).expect_err("bad id");

        insta::assert_snapshot!(error.to_string(), @r#"invalid message id "not-a-uuid""#);
    }

    #[test]
    fn negative_position_is_rejected() {
        let mut cells = message_row();
        cells[3] = Cell::Integer(-1);

        let error = map_row(&Row::new(cells), &ReadTransform::identity()).expect_err("negative");

        assert!(matches!(
            error,
            CodecError::NegativePosition {
                column: "position",
                value: -1
            }
        ));
    }

    #[test]
    fn malformed_data_is_a_codec_error() {
        let mut cells = message_row();
        cells[5] = Cell::Text("{qty".to_string());

        let error = map_row(&Row::new(cells), &ReadTransform::identity()).expect_err("malformed");

        assert!(matches!(
            error,
            CodecError::MalformedPayload {
                field: crate::PayloadField::Data,
                ..
            }
        ));
    }
}
