//! Arrow schema for the ranked-mistakes report.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, Int32Array, ListBuilder, StringArray, StringBuilder, TimestampMillisecondArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::aggregate::DeviationGroup;

fn utf8_list() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
}

fn utc_millis() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

/// One row per ranked deviation group.
pub fn report_schema() -> Schema {
    Schema::new(vec![
        Field::new("rank", DataType::UInt32, false),
        Field::new("position", DataType::Utf8, false),
        Field::new("played_move", DataType::Utf8, false),
        Field::new("best_move", DataType::Utf8, true),
        Field::new("book_moves", utf8_list(), false),
        Field::new("ply", DataType::UInt32, false),
        Field::new("color", DataType::Utf8, false),
        Field::new("eco", DataType::Utf8, true),
        Field::new("opening", DataType::Utf8, true),
        Field::new("eval_loss", DataType::Int32, false),
        Field::new("score_before", DataType::Int32, false),
        Field::new("score_after", DataType::Int32, false),
        Field::new("occurrences", DataType::UInt32, false),
        Field::new("game_ids", utf8_list(), false),
        Field::new("first_seen", utc_millis(), false),
        Field::new("last_seen", utc_millis(), false),
    ])
}

fn list_column<'a>(rows: impl Iterator<Item = &'a Vec<String>>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for items in rows {
        for item in items {
            builder.values().append_value(item);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Convert ranked groups (already in output order) into a record batch.
pub fn groups_to_batch(groups: &[DeviationGroup]) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from_iter_values((1..=groups.len()).map(to_u32))),
        Arc::new(StringArray::from_iter_values(
            groups.iter().map(|g| g.position.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            groups.iter().map(|g| g.played_move.as_str()),
        )),
        Arc::new(StringArray::from(
            groups.iter().map(|g| g.best_move.as_deref()).collect::<Vec<_>>(),
        )),
        list_column(groups.iter().map(|g| &g.book_moves)),
        Arc::new(UInt32Array::from_iter_values(groups.iter().map(|g| to_u32(g.ply)))),
        Arc::new(StringArray::from_iter_values(
            groups.iter().map(|g| g.color.as_str()),
        )),
        Arc::new(StringArray::from(
            groups.iter().map(|g| g.eco.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            groups.iter().map(|g| g.opening.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(Int32Array::from_iter_values(groups.iter().map(|g| g.eval_loss()))),
        Arc::new(Int32Array::from_iter_values(groups.iter().map(|g| g.eval.before.cp))),
        Arc::new(Int32Array::from_iter_values(groups.iter().map(|g| g.eval.after.cp))),
        Arc::new(UInt32Array::from_iter_values(
            groups.iter().map(|g| to_u32(g.occurrences)),
        )),
        list_column(groups.iter().map(|g| &g.game_ids)),
        Arc::new(
            TimestampMillisecondArray::from_iter_values(
                groups.iter().map(|g| g.first_seen.timestamp_millis()),
            )
            .with_timezone("UTC"),
        ),
        Arc::new(
            TimestampMillisecondArray::from_iter_values(
                groups.iter().map(|g| g.last_seen.timestamp_millis()),
            )
            .with_timezone("UTC"),
        ),
    ];
    RecordBatch::try_new(Arc::new(report_schema()), columns)
}
