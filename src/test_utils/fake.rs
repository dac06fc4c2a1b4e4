use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::native::{
    NativeClient, NativeResult, NativeResultSet, OpenParams, PreparedInfo, ResultSetHandle,
    StatementHandle, StatusCode, UpdateCount,
};
use crate::registry::NativeClientFactory;
use crate::types::RowValues;
use crate::wire::{BindBatch, RowBuffer};

const RUNTIME_ERROR: StatusCode = match StatusCode::new(-5) {
    Some(status) => status,
    None => panic!("non-zero literal"),
};

const CONNECTION_ERROR: StatusCode = match StatusCode::new(-10) {
    Some(status) => status,
    None => panic!("non-zero literal"),
};

/// Boundary call names, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Open,
    Close,
    Autocommit,
    SetAutocommit,
    Commit,
    Rollback,
    ExecuteDirect,
    Prepare,
    Bind,
    SetQueryTimeout,
    Execute,
    Query,
    ColumnNames,
    Next,
    CloseResultSet,
    CloseStatement,
}

/// One recorded boundary call with its decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    Open {
        database: String,
        username: String,
        properties: Vec<(String, String)>,
    },
    Close,
    Autocommit,
    SetAutocommit(bool),
    Commit,
    Rollback,
    ExecuteDirect { sql: String, timeout_micros: i64 },
    Prepare(String),
    Bind { statement: u64, values: Vec<RowValues> },
    SetQueryTimeout { statement: u64, timeout_micros: i64 },
    Execute(u64),
    Query(u64),
    ColumnNames(u64),
    Next(u64),
    CloseResultSet(u64),
    CloseStatement(u64),
}

impl NativeCall {
    #[must_use]
    pub fn kind(&self) -> CallKind {
        match self {
            NativeCall::Open { .. } => CallKind::Open,
            NativeCall::Close => CallKind::Close,
            NativeCall::Autocommit => CallKind::Autocommit,
            NativeCall::SetAutocommit(_) => CallKind::SetAutocommit,
            NativeCall::Commit => CallKind::Commit,
            NativeCall::Rollback => CallKind::Rollback,
            NativeCall::ExecuteDirect { .. } => CallKind::ExecuteDirect,
            NativeCall::Prepare(_) => CallKind::Prepare,
            NativeCall::Bind { .. } => CallKind::Bind,
            NativeCall::SetQueryTimeout { .. } => CallKind::SetQueryTimeout,
            NativeCall::Execute(_) => CallKind::Execute,
            NativeCall::Query(_) => CallKind::Query,
            NativeCall::ColumnNames(_) => CallKind::ColumnNames,
            NativeCall::Next(_) => CallKind::Next,
            NativeCall::CloseResultSet(_) => CallKind::CloseResultSet,
            NativeCall::CloseStatement(_) => CallKind::CloseStatement,
        }
    }
}

/// Scripted response for one SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
    },
    Affected {
        rows_affected: i64,
        last_insert_id: i64,
    },
}

#[derive(Debug)]
struct Cursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<RowValues>>,
}

#[derive(Debug)]
struct FakeState {
    scripts: HashMap<String, Script>,
    failures: HashMap<CallKind, (StatusCode, String)>,
    calls: Vec<NativeCall>,
    last_error: String,
    open: bool,
    autocommit: bool,
    next_handle: u64,
    statements: BTreeMap<u64, String>,
    cursors: BTreeMap<u64, Cursor>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            scripts: HashMap::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            last_error: String::new(),
            open: false,
            autocommit: true,
            next_handle: 1,
            statements: BTreeMap::new(),
            cursors: BTreeMap::new(),
        }
    }
}

impl FakeState {
    /// Record `call` and apply any failure injected for its kind.
    fn enter(&mut self, call: NativeCall) -> NativeResult<()> {
        let kind = call.kind();
        self.calls.push(call);
        if let Some((status, message)) = self.failures.get(&kind).cloned() {
            return Err(self.refuse(status, message));
        }
        if !self.open && !matches!(kind, CallKind::Open | CallKind::Close) {
            return Err(self.refuse(CONNECTION_ERROR, "connection is not open".into()));
        }
        Ok(())
    }

    fn refuse(&mut self, status: StatusCode, message: String) -> StatusCode {
        self.last_error = message;
        status
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn statement_sql(&mut self, statement: StatementHandle) -> NativeResult<String> {
        match self.statements.get(&statement.as_raw()) {
            Some(sql) => Ok(sql.clone()),
            None => Err(self.refuse(RUNTIME_ERROR, "invalid statement handle".into())),
        }
    }

    fn cursor(&mut self, result_set: ResultSetHandle) -> NativeResult<&mut Cursor> {
        if !self.cursors.contains_key(&result_set.as_raw()) {
            return Err(self.refuse(RUNTIME_ERROR, "invalid result set handle".into()));
        }
        self.cursors
            .get_mut(&result_set.as_raw())
            .ok_or(RUNTIME_ERROR)
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Scripted in-memory [`NativeClient`].
///
/// Clones share state, so a clone kept by the test observes everything the
/// connection's copy does. Unscripted SQL executes with zero rows affected
/// and queries as an empty result without columns. The parameter count of a
/// prepared statement is the number of `?` in its text.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `sql` to return `rows` under `columns`.
    #[must_use]
    pub fn with_rows<S: Into<String>>(
        self,
        sql: &str,
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<RowValues>>,
    ) -> Self {
        let columns = columns.into_iter().map(Into::into).collect();
        lock(&self.state)
            .scripts
            .insert(sql.to_owned(), Script::Rows { columns, rows });
        self
    }

    /// Script `sql` to report an update count.
    #[must_use]
    pub fn with_affected(self, sql: &str, rows_affected: i64, last_insert_id: i64) -> Self {
        lock(&self.state).scripts.insert(
            sql.to_owned(),
            Script::Affected {
                rows_affected,
                last_insert_id,
            },
        );
        self
    }

    /// Make every call of `kind` fail with `code` and `message`. A zero code
    /// injects nothing.
    #[must_use]
    pub fn failing_on(self, kind: CallKind, code: i32, message: &str) -> Self {
        self.probe().fail_on(kind, code, message);
        self
    }

    #[must_use]
    pub fn probe(&self) -> FakeProbe {
        FakeProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl NativeClient for FakeClient {
    fn last_error(&self) -> String {
        lock(&self.state).last_error.clone()
    }

    fn open(&mut self, params: &OpenParams<'_>) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Open {
            database: params.database.to_owned(),
            username: params.username.to_owned(),
            properties: params
                .properties
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        })?;
        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Close)?;
        state.open = false;
        state.statements.clear();
        state.cursors.clear();
        Ok(())
    }

    fn autocommit(&mut self) -> NativeResult<bool> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Autocommit)?;
        Ok(state.autocommit)
    }

    fn set_autocommit(&mut self, enabled: bool) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::SetAutocommit(enabled))?;
        state.autocommit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> NativeResult<()> {
        lock(&self.state).enter(NativeCall::Commit)
    }

    fn rollback(&mut self) -> NativeResult<()> {
        lock(&self.state).enter(NativeCall::Rollback)
    }

    fn execute_direct(&mut self, sql: &str, timeout_micros: i64) -> NativeResult<UpdateCount> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::ExecuteDirect {
            sql: sql.to_owned(),
            timeout_micros,
        })?;
        Ok(update_count(state.scripts.get(sql)))
    }

    fn prepare(&mut self, sql: &str) -> NativeResult<PreparedInfo> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Prepare(sql.to_owned()))?;
        let handle = state.allocate();
        state.statements.insert(handle, sql.to_owned());
        Ok(PreparedInfo {
            handle: StatementHandle::from_raw(handle),
            parameter_count: sql.matches('?').count(),
        })
    }

    fn bind(&mut self, statement: StatementHandle, parameters: &BindBatch<'_>) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Bind {
            statement: statement.as_raw(),
            values: parameters.iter().map(|value| value.to_row_value()).collect(),
        })?;
        state.statement_sql(statement).map(|_| ())
    }

    fn set_query_timeout(
        &mut self,
        statement: StatementHandle,
        timeout_micros: i64,
    ) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::SetQueryTimeout {
            statement: statement.as_raw(),
            timeout_micros,
        })?;
        state.statement_sql(statement).map(|_| ())
    }

    fn execute(&mut self, statement: StatementHandle) -> NativeResult<UpdateCount> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Execute(statement.as_raw()))?;
        let sql = state.statement_sql(statement)?;
        Ok(update_count(state.scripts.get(&sql)))
    }

    fn query(&mut self, statement: StatementHandle) -> NativeResult<NativeResultSet> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Query(statement.as_raw()))?;
        let sql = state.statement_sql(statement)?;
        let cursor = match state.scripts.get(&sql) {
            Some(Script::Rows { columns, rows }) => Cursor {
                columns: columns.clone(),
                rows: rows.iter().cloned().collect(),
            },
            _ => Cursor {
                columns: Vec::new(),
                rows: VecDeque::new(),
            },
        };
        let column_count = cursor.columns.len();
        let handle = state.allocate();
        state.cursors.insert(handle, cursor);
        Ok(NativeResultSet {
            handle: ResultSetHandle::from_raw(handle),
            column_count,
        })
    }

    fn column_names(
        &mut self,
        result_set: ResultSetHandle,
        names: &mut RowBuffer,
    ) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::ColumnNames(result_set.as_raw()))?;
        let columns = state.cursor(result_set)?.columns.clone();
        if names.fill_names(&columns).is_err() {
            return Err(state.refuse(RUNTIME_ERROR, "column buffer too small".into()));
        }
        Ok(())
    }

    fn next(&mut self, result_set: ResultSetHandle, row: &mut RowBuffer) -> NativeResult<bool> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::Next(result_set.as_raw()))?;
        let Some(values) = state.cursor(result_set)?.rows.pop_front() else {
            return Ok(false);
        };
        if row.fill(&values).is_err() {
            return Err(state.refuse(RUNTIME_ERROR, "row buffer too small".into()));
        }
        Ok(true)
    }

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::CloseResultSet(result_set.as_raw()))?;
        state.cursors.remove(&result_set.as_raw());
        Ok(())
    }

    fn close_statement(&mut self, statement: StatementHandle) -> NativeResult<()> {
        let mut state = lock(&self.state);
        state.enter(NativeCall::CloseStatement(statement.as_raw()))?;
        state.statements.remove(&statement.as_raw());
        Ok(())
    }
}

fn update_count(script: Option<&Script>) -> UpdateCount {
    match script {
        Some(Script::Affected {
            rows_affected,
            last_insert_id,
        }) => UpdateCount {
            rows_affected: *rows_affected,
            last_insert_id: *last_insert_id,
        },
        _ => UpdateCount::default(),
    }
}

/// Read-side view of a [`FakeClient`]'s shared state.
#[derive(Debug, Clone)]
pub struct FakeProbe {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProbe {
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        lock(&self.state).calls.clone()
    }

    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    /// Values passed to the most recent bind call.
    #[must_use]
    pub fn last_bind(&self) -> Option<Vec<RowValues>> {
        lock(&self.state).calls.iter().rev().find_map(|call| match call {
            NativeCall::Bind { values, .. } => Some(values.clone()),
            _ => None,
        })
    }

    /// Timeout passed by the most recent direct execute or timeout call.
    #[must_use]
    pub fn last_timeout(&self) -> Option<i64> {
        lock(&self.state).calls.iter().rev().find_map(|call| match call {
            NativeCall::ExecuteDirect { timeout_micros, .. }
            | NativeCall::SetQueryTimeout { timeout_micros, .. } => Some(*timeout_micros),
            _ => None,
        })
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Make every later call of `kind` fail; a zero `code` injects nothing.
    pub fn fail_on(&self, kind: CallKind, code: i32, message: &str) {
        if let Some(status) = StatusCode::new(code) {
            lock(&self.state)
                .failures
                .insert(kind, (status, message.to_owned()));
        }
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    #[must_use]
    pub fn autocommit(&self) -> bool {
        lock(&self.state).autocommit
    }

    #[must_use]
    pub fn open_statements(&self) -> usize {
        lock(&self.state).statements.len()
    }

    #[must_use]
    pub fn open_result_sets(&self) -> usize {
        lock(&self.state).cursors.len()
    }
}

/// Hands out clones of one [`FakeClient`], so every connection opened
/// through the registry shares the same script and call log.
#[derive(Debug, Clone)]
pub struct FakeClientFactory {
    client: FakeClient,
}

impl FakeClientFactory {
    #[must_use]
    pub fn new(client: FakeClient) -> Self {
        Self { client }
    }
}

impl NativeClientFactory for FakeClientFactory {
    fn create(&self) -> Box<dyn NativeClient> {
        Box::new(self.client.clone())
    }
}
