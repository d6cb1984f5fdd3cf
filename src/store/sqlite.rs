//! # SQLite Store
//!
//! Frame and packet tables plus the paginated record sources and the
//! windowed frame lookup used for time correlation.
//!
//! Times are stored as nanoseconds since the Unix epoch; SCLK as separate
//! coarse and fine columns.

use super::query::{
    FrameOrder, FrameQuery, FrameWindowQuery, PacketOrder, PacketQuery, PacketSelection,
    PacketTimeWindow, SclkRange, TimeRange,
};
use super::types::{FrameRecord, PacketRecord};
use super::{FrameLookup, RecordSource};
use crate::error::FetchError;
use crate::types::{from_unix_nanos, to_unix_nanos, Sclk};
use log::debug;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS frames (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL DEFAULT 0,
        frame_type TEXT NOT NULL DEFAULT '',
        relay_scid INTEGER,
        vcid INTEGER NOT NULL,
        vcfc INTEGER,
        dss_id INTEGER NOT NULL,
        ert_ns INTEGER NOT NULL,
        rct_ns INTEGER NOT NULL,
        bit_rate REAL NOT NULL DEFAULT 0,
        fill_frame INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS frames_by_ert ON frames (ert_ns);
    CREATE INDEX IF NOT EXISTS frames_by_vc ON frames (vcid, vcfc, ert_ns);
    CREATE TABLE IF NOT EXISTS packets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL DEFAULT 0,
        apid INTEGER NOT NULL,
        spsc INTEGER NOT NULL,
        vcid INTEGER,
        dss_id INTEGER NOT NULL DEFAULT 0,
        from_sse INTEGER NOT NULL DEFAULT 0,
        ert_ns INTEGER NOT NULL,
        scet_ns INTEGER NOT NULL,
        rct_ns INTEGER NOT NULL,
        sclk_coarse INTEGER NOT NULL,
        sclk_fine INTEGER NOT NULL,
        body BLOB NOT NULL DEFAULT x''
    );
    CREATE INDEX IF NOT EXISTS packets_by_apid_ert ON packets (apid, ert_ns);
";

const FRAME_COLUMNS: &str = "id, session_id, frame_type, relay_scid, vcid, vcfc, dss_id, \
                             ert_ns, rct_ns, bit_rate, fill_frame";

const PACKET_COLUMNS: &str = "id, session_id, apid, spsc, vcid, dss_id, from_sse, \
                              ert_ns, scet_ns, rct_ns, sclk_coarse, sclk_fine";

/// SCLK as a single comparable tick count in SQL (fine modulus 2^16).
const SCLK_TICKS_SQL: &str = "(sclk_coarse * 65536 + sclk_fine)";

/// SQLite-backed frame and packet store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FetchError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
            path: Some(path),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Private in-memory store.
    pub fn open_in_memory() -> Result<Self, FetchError> {
        let store = SqliteStore {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), FetchError> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Inserts a frame and returns its row id.
    pub fn insert_frame(&self, frame: &FrameRecord) -> Result<i64, FetchError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO frames (
                session_id, frame_type, relay_scid, vcid, vcfc, dss_id,
                ert_ns, rct_ns, bit_rate, fill_frame
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                frame.session_id,
                frame.frame_type,
                frame.relay_scid,
                frame.vcid,
                frame.vcfc,
                frame.dss_id,
                to_unix_nanos(&frame.ert)?,
                to_unix_nanos(&frame.rct)?,
                frame.bit_rate,
                frame.fill_frame,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Inserts a packet and returns its row id.
    pub fn insert_packet(&self, packet: &PacketRecord) -> Result<i64, FetchError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO packets (
                session_id, apid, spsc, vcid, dss_id, from_sse,
                ert_ns, scet_ns, rct_ns, sclk_coarse, sclk_fine, body
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                packet.session_id,
                packet.apid,
                packet.spsc,
                packet.vcid,
                packet.dss_id,
                packet.from_sse,
                to_unix_nanos(&packet.ert)?,
                to_unix_nanos(&packet.scet)?,
                to_unix_nanos(&packet.rct)?,
                packet.sclk.coarse,
                packet.sclk.fine,
                packet.body,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Paginated frame source for `query`.
    pub fn frame_source(
        &self,
        query: &FrameQuery,
        batch_size: usize,
    ) -> Result<SqliteSource<'_, FrameRecord>, FetchError> {
        let mut clause = WhereClause::default();
        clause.time_range("ert_ns", &query.ert)?;
        if let Some(ref frame_type) = query.frame_type {
            clause.equals("frame_type", Value::Text(frame_type.clone()));
        }
        if let Some(scid) = query.relay_scid {
            clause.equals("relay_scid", Value::Integer(i64::from(scid)));
        }
        clause.one_of("vcid", &query.vcids);
        clause.one_of("dss_id", &query.dss_ids);

        let order = match query.order {
            FrameOrder::Ert => "ert_ns, id",
            FrameOrder::Rct => "rct_ns, id",
            FrameOrder::None => "id",
        };

        let sql = format!(
            "SELECT {} FROM frames{} ORDER BY {} LIMIT ? OFFSET ?",
            FRAME_COLUMNS,
            clause.render(),
            order
        );
        Ok(SqliteSource::new(self, sql, clause.params, batch_size, frame_from_row))
    }

    /// Paginated packet source for `query`.
    pub fn packet_source(
        &self,
        query: &PacketQuery,
        batch_size: usize,
    ) -> Result<SqliteSource<'_, PacketRecord>, FetchError> {
        let mut clause = WhereClause::default();
        match query.window {
            PacketTimeWindow::Ert(ref range) => clause.time_range("ert_ns", range)?,
            PacketTimeWindow::Scet(ref range) => clause.time_range("scet_ns", range)?,
            PacketTimeWindow::Rct(ref range) => clause.time_range("rct_ns", range)?,
            PacketTimeWindow::Sclk(ref range) => clause.sclk_range(range),
        }
        if let Some(apid) = query.apid {
            clause.equals("apid", Value::Integer(i64::from(apid)));
        }
        clause.one_of("vcid", &query.vcids);
        clause.one_of("dss_id", &query.dss_ids);
        match query.selection {
            PacketSelection::All => {}
            PacketSelection::FswOnly => clause.equals("from_sse", Value::Integer(0)),
            PacketSelection::SseOnly => clause.equals("from_sse", Value::Integer(1)),
        }

        let order = match query.effective_order() {
            PacketOrder::Ert => "ert_ns, id".to_string(),
            PacketOrder::Scet => "scet_ns, id".to_string(),
            PacketOrder::Rct => "rct_ns, id".to_string(),
            PacketOrder::Sclk => format!("{}, id", SCLK_TICKS_SQL),
            PacketOrder::Spsc => "spsc, id".to_string(),
            PacketOrder::None => "id".to_string(),
        };

        let body = if query.include_body { "body" } else { "x'' AS body" };

        let sql = format!(
            "SELECT {}, {} FROM packets{} ORDER BY {} LIMIT ? OFFSET ?",
            PACKET_COLUMNS,
            body,
            clause.render(),
            order
        );
        Ok(SqliteSource::new(self, sql, clause.params, batch_size, packet_from_row))
    }
}

impl FrameLookup for SqliteStore {
    fn frames_in_window(&self, query: &FrameWindowQuery) -> Result<Vec<FrameRecord>, FetchError> {
        let begin = to_unix_nanos(&query.ert_begin)?;
        let end = to_unix_nanos(&query.ert_end)?;
        let limit = i64::try_from(query.limit).map_err(lookup_error)?;

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {} FROM frames
                 WHERE vcid = ?1 AND vcfc = ?2 AND ert_ns BETWEEN ?3 AND ?4
                 ORDER BY ert_ns DESC, id DESC
                 LIMIT ?5",
                FRAME_COLUMNS
            ))
            .map_err(lookup_error)?;

        let rows = stmt
            .query_map(params![query.vcid, query.vcfc, begin, end, limit], frame_from_row)
            .map_err(lookup_error)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(lookup_error)
    }
}

/// Offset-paginated record source over one SELECT statement.
///
/// The first call to [`RecordSource::next_batch`] runs the first page. The
/// source is fused: once a short or empty page is seen it returns empty
/// batches without touching the database.
pub struct SqliteSource<'a, R> {
    store: &'a SqliteStore,
    sql: String,
    params: Vec<Value>,
    batch_size: usize,
    offset: usize,
    exhausted: bool,
    map_row: fn(&Row<'_>) -> rusqlite::Result<R>,
}

impl<'a, R> SqliteSource<'a, R> {
    fn new(
        store: &'a SqliteStore,
        sql: String,
        params: Vec<Value>,
        batch_size: usize,
        map_row: fn(&Row<'_>) -> rusqlite::Result<R>,
    ) -> Self {
        debug!("Prepared fetch: {}", sql);
        Self {
            store,
            sql,
            params,
            batch_size: batch_size.max(1),
            offset: 0,
            exhausted: false,
            map_row,
        }
    }

    /// Rows handed out so far.
    pub fn rows_fetched(&self) -> usize {
        self.offset
    }
}

impl<R> RecordSource for SqliteSource<'_, R> {
    type Record = R;

    fn next_batch(&mut self) -> Result<Vec<R>, FetchError> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let mut bound = self.params.clone();
        bound.push(Value::Integer(self.batch_size as i64));
        bound.push(Value::Integer(self.offset as i64));

        let batch = {
            let conn = self.store.conn.lock();
            let mut stmt = conn.prepare_cached(&self.sql)?;
            let rows = stmt.query_map(params_from_iter(bound.iter()), self.map_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        self.offset += batch.len();
        if batch.len() < self.batch_size {
            self.exhausted = true;
        }
        Ok(batch)
    }

    fn close(&mut self) {
        if !self.exhausted {
            debug!("Closing fetch after {} rows", self.offset);
        }
        self.exhausted = true;
    }
}

#[derive(Default)]
struct WhereClause {
    terms: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    fn equals(&mut self, column: &str, value: Value) {
        self.terms.push(format!("{} = ?", column));
        self.params.push(value);
    }

    fn one_of(&mut self, column: &str, values: &Option<BTreeSet<u32>>) {
        let Some(values) = values else {
            return;
        };
        if values.is_empty() {
            self.terms.push("0".to_string());
            return;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.terms.push(format!("{} IN ({})", column, placeholders));
        self.params
            .extend(values.iter().map(|v| Value::Integer(i64::from(*v))));
    }

    fn time_range(&mut self, column: &str, range: &TimeRange) -> Result<(), FetchError> {
        if let Some(ref begin) = range.begin {
            self.terms.push(format!("{} >= ?", column));
            self.params.push(Value::Integer(to_unix_nanos(begin)?));
        }
        if let Some(ref end) = range.end {
            self.terms.push(format!("{} <= ?", column));
            self.params.push(Value::Integer(to_unix_nanos(end)?));
        }
        Ok(())
    }

    fn sclk_range(&mut self, range: &SclkRange) {
        if let Some(begin) = range.begin {
            self.terms.push(format!("{} >= ?", SCLK_TICKS_SQL));
            self.params.push(Value::Integer(begin.ticks() as i64));
        }
        if let Some(end) = range.end {
            self.terms.push(format!("{} <= ?", SCLK_TICKS_SQL));
            self.params.push(Value::Integer(end.ticks() as i64));
        }
    }

    fn render(&self) -> String {
        if self.terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.terms.join(" AND "))
        }
    }
}

fn frame_from_row(row: &Row<'_>) -> rusqlite::Result<FrameRecord> {
    Ok(FrameRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        frame_type: row.get("frame_type")?,
        relay_scid: row.get("relay_scid")?,
        vcid: row.get("vcid")?,
        vcfc: row.get("vcfc")?,
        dss_id: row.get("dss_id")?,
        ert: from_unix_nanos(row.get("ert_ns")?),
        rct: from_unix_nanos(row.get("rct_ns")?),
        bit_rate: row.get("bit_rate")?,
        fill_frame: row.get("fill_frame")?,
    })
}

fn packet_from_row(row: &Row<'_>) -> rusqlite::Result<PacketRecord> {
    Ok(PacketRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        apid: row.get("apid")?,
        spsc: row.get("spsc")?,
        vcid: row.get("vcid")?,
        dss_id: row.get("dss_id")?,
        from_sse: row.get("from_sse")?,
        ert: from_unix_nanos(row.get("ert_ns")?),
        scet: from_unix_nanos(row.get("scet_ns")?),
        rct: from_unix_nanos(row.get("rct_ns")?),
        sclk: Sclk::new(row.get("sclk_coarse")?, row.get("sclk_fine")?),
        body: row.get("body")?,
    })
}

fn lookup_error(e: impl Display) -> FetchError {
    FetchError::Lookup(e.to_string())
}
