use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::error::Result;
use crate::extract::{BrowserFamily, HistoryFilter};
use crate::record::HistoryRecord;

const WEBKIT_UNIX_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Read the most recent history rows matching `filter`, newest first.
pub fn query_history(
    conn: &Connection,
    family: BrowserFamily,
    filter: &HistoryFilter,
) -> Result<Vec<HistoryRecord>> {
    let (mut sql, url_col, title_col, time_col) = match family {
        BrowserFamily::Chromium => {
            let mut sql = String::from(
                "SELECT urls.url, urls.title, urls.last_visit_time FROM urls WHERE 1=1",
            );
            if has_table(conn, "visits")? {
                sql.push_str(" AND EXISTS (SELECT 1 FROM visits WHERE visits.url = urls.id)");
            }
            (sql, "urls.url", "urls.title", "urls.last_visit_time")
        }
        BrowserFamily::Firefox => (
            String::from(
                "SELECT moz_places.url, moz_places.title, moz_places.last_visit_date \
                 FROM moz_places WHERE moz_places.last_visit_date IS NOT NULL",
            ),
            "moz_places.url",
            "moz_places.title",
            "moz_places.last_visit_date",
        ),
    };

    let to_native = match family {
        BrowserFamily::Chromium => datetime_to_webkit,
        BrowserFamily::Firefox => datetime_to_unix_micro,
    };

    let mut params: Vec<Value> = Vec::new();
    if let Some(start) = filter.start {
        sql.push_str(&format!(" AND {time_col} >= ?"));
        params.push(Value::Integer(to_native(start)));
    }
    if let Some(end) = filter.end {
        sql.push_str(&format!(" AND {time_col} <= ?"));
        params.push(Value::Integer(to_native(end)));
    }
    if !filter.keywords.is_empty() {
        let clause = filter
            .keywords
            .iter()
            .map(|_| format!("{url_col} LIKE ? OR {title_col} LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        sql.push_str(&format!(" AND ({clause})"));
        for keyword in &filter.keywords {
            let pattern = format!("%{keyword}%");
            params.push(Value::Text(pattern.clone()));
            params.push(Value::Text(pattern));
        }
    }
    sql.push_str(&format!(" ORDER BY {time_col} DESC LIMIT ?"));
    params.push(Value::Integer(filter.limit as i64));

    let from_native = match family {
        BrowserFamily::Chromium => webkit_timestamp_to_datetime,
        BrowserFamily::Firefox => unix_micro_to_datetime,
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let url: String = row.get(0)?;
        let title: Option<String> = row.get(1)?;
        let time: Option<i64> = row.get(2)?;
        Ok((url, title, time))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (url, title, time) = row?;
        if url.is_empty() {
            continue;
        }
        out.push(HistoryRecord {
            url,
            title,
            visit_time: time.and_then(from_native),
        });
    }
    Ok(out)
}

/// Which schema the file carries, if any.
pub fn detect_family(conn: &Connection) -> Result<Option<BrowserFamily>> {
    if has_table(conn, "urls")? {
        return Ok(Some(BrowserFamily::Chromium));
    }
    if has_table(conn, "moz_places")? {
        return Ok(Some(BrowserFamily::Firefox));
    }
    Ok(None)
}

fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let mut rows = stmt.query([name])?;
    Ok(rows.next()?.is_some())
}

pub fn webkit_timestamp_to_datetime(microseconds: i64) -> Option<NaiveDateTime> {
    if microseconds <= 0 {
        return None;
    }
    unix_micro_to_datetime(microseconds - WEBKIT_UNIX_OFFSET_MICROS)
}

pub fn unix_micro_to_datetime(microseconds: i64) -> Option<NaiveDateTime> {
    if microseconds <= 0 {
        return None;
    }
    chrono::DateTime::<chrono::Utc>::from_timestamp_micros(microseconds).map(|dt| dt.naive_utc())
}

pub fn datetime_to_unix_micro(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

pub fn datetime_to_webkit(dt: NaiveDateTime) -> i64 {
    datetime_to_unix_micro(dt) + WEBKIT_UNIX_OFFSET_MICROS
}
