// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations, grouped by entity.

pub mod search;
pub mod sessions;
pub mod summaries;
pub mod tasks;
pub mod turns;

pub(crate) fn row_to_turn(row: &rusqlite::Row) -> rusqlite::Result<mnemos_core::types::Turn> {
    let role: String = row.get(3)?;
    Ok(mnemos_core::types::Turn {
        turn_id: row.get(0)?,
        session_id: row.get(1)?,
        ts: row.get(2)?,
        role: role.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown role: {role}").into(),
            )
        })?,
        text: row.get(4)?,
    })
}

pub(crate) fn row_to_summary(
    row: &rusqlite::Row,
) -> rusqlite::Result<mnemos_core::types::Summary> {
    Ok(mnemos_core::types::Summary {
        summary_id: row.get(0)?,
        session_id: row.get(1)?,
        text: row.get(2)?,
        first_ts: row.get(3)?,
        last_ts: row.get(4)?,
    })
}
