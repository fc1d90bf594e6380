//! Shared payload types for the EYWA task client.
//!
//! These are the `params` and `result` shapes exchanged with the EYWA host:
//! task logging and reporting, GraphQL envelopes, and the file service's
//! inputs, filters and records. All types are serializable for RPC transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Folder every user folder ultimately hangs off. Root-level folders have
/// this as their parent rather than `null`.
pub const ROOT_UUID: &str = "87ce50d8-5dfa-4008-a265-053e727ab793";

/// Deserialize a Vec that may be null or missing (both become empty vec)
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

// ============================================================================
// Task
// ============================================================================

/// Lifecycle state of the running task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Error,
    #[default]
    Processing,
    Exception,
}

impl TaskStatus {
    /// Process exit code for a task that finishes with this status.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            TaskStatus::Success => 0,
            _ => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Error => "ERROR",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Exception => "EXCEPTION",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(TaskStatus::Success),
            "ERROR" => Ok(TaskStatus::Error),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "EXCEPTION" => Ok(TaskStatus::Exception),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Severity of a task log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEvent {
    #[default]
    Info,
    Warn,
    Error,
    Debug,
    Trace,
    Exception,
}

/// Params of `task.log`.
///
/// Every key is always present on the wire; unset optional fields are sent as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub event: LogEvent,
    pub message: String,
    pub data: Option<Value>,
    pub coordinates: Option<Value>,
    /// Milliseconds
    pub duration: Option<u64>,
}

impl LogRecord {
    /// Record stamped with the current time.
    pub fn new(event: LogEvent, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            event,
            message: message.into(),
            data: None,
            coordinates: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Value) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    #[must_use]
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

/// Params of `task.report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub message: String,
    pub data: Option<ReportData>,
    /// Base64 image or URL, shown next to the report
    pub image: Option<String>,
}

impl Report {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            image: None,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: Table) -> Self {
        self.data = Some(ReportData::Table(table));
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(ReportData::Raw(data));
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Report payload: a structured table or any JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportData {
    Table(Table),
    Raw(Value),
}

/// Tabular report made of named sheets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new("Table")
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Remove the sheet at `index`, if there is one.
    pub fn remove_sheet(&mut self, index: usize) -> Option<Sheet> {
        (index < self.sheets.len()).then(|| self.sheets.remove(index))
    }
}

/// One sheet of a [`Table`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Value>,
    pub columns: Vec<String>,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new("Sheet")
    }
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Value) {
        self.rows.push(row);
    }

    /// Remove the first row equal to `row`. Returns whether one was found.
    pub fn remove_row(&mut self, row: &Value) -> bool {
        if let Some(pos) = self.rows.iter().position(|r| r == row) {
            self.rows.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn set_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
    }
}

// ============================================================================
// GraphQL
// ============================================================================

/// Raw GraphQL response envelope. Both members may be present at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(
        default,
        deserialize_with = "deserialize_null_as_empty_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// Top-level field of `data`, ignoring `null`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data
            .as_ref()
            .and_then(|data| data.get(name))
            .filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// All error messages joined with `"; "`, or `None` when there are none.
    #[must_use]
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// `data` (or `null`) when there are no errors.
    ///
    /// # Errors
    ///
    /// Returns the error list when it is non-empty.
    pub fn into_result(self) -> Result<Value, Vec<GraphqlError>> {
        if self.errors.is_empty() {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

// ============================================================================
// Files and folders
// ============================================================================

/// Folder reference by id or by path.
///
/// Serializes as `{"euuid": "..."}` or `{"path": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderRef {
    Euuid(String),
    Path(String),
}

impl FolderRef {
    #[must_use]
    pub fn root() -> Self {
        FolderRef::Euuid(ROOT_UUID.to_string())
    }
}

/// GraphQL `FileInput`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Client-generated id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub euuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_euuid(mut self, euuid: impl Into<String>) -> Self {
        self.euuid = Some(euuid.into());
        self
    }

    #[must_use]
    pub fn in_folder(mut self, folder: FolderRef) -> Self {
        self.folder = Some(folder);
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// GraphQL `FolderInput`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub euuid: Option<String>,
    /// Omit for a root-level folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<FolderRef>,
}

impl FolderInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            euuid: None,
            parent: None,
        }
    }

    #[must_use]
    pub fn with_euuid(mut self, euuid: impl Into<String>) -> Self {
        self.euuid = Some(euuid.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: FolderRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Criteria for listing files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFilter {
    pub limit: Option<u32>,
    /// e.g. `UPLOADED`
    pub status: Option<String>,
    /// Case-insensitive substring match
    pub name: Option<String>,
    pub folder: Option<FolderRef>,
}

/// Parent constraint for listing folders
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParentFilter {
    /// No constraint
    #[default]
    Any,
    /// Folders directly under [`ROOT_UUID`]
    Root,
    Folder(FolderRef),
}

/// Criteria for listing folders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderFilter {
    pub limit: Option<u32>,
    /// Case-insensitive substring match
    pub name: Option<String>,
    pub parent: ParentFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub name: Option<String>,
}

/// Folder fields embedded in file and folder records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub euuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// File as returned by `getFile` and `searchFile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub euuid: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<UserRef>,
    #[serde(default)]
    pub folder: Option<FolderSummary>,
}

/// Folder as returned by `getFolder`, `searchFolder` and `stackFolder`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub euuid: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
    #[serde(default)]
    pub parent: Option<FolderSummary>,
}


/// Property-based tests using proptest for serialization round-trips.
#[cfg(test)]
mod proptest_roundtrip_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_json_string() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[a-zA-Z0-9_\\-. /]{0,40}").unwrap()
    }

    fn arb_opt_string() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(arb_json_string())
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            arb_json_string().prop_map(Value::String),
        ]
    }

    fn arb_time() -> impl Strategy<Value = DateTime<Utc>> {
        (0i64..4_102_444_800, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
            DateTime::from_timestamp(secs, nanos).unwrap_or_default()
        })
    }

    fn arb_log_event() -> impl Strategy<Value = LogEvent> {
        prop_oneof![
            Just(LogEvent::Info),
            Just(LogEvent::Warn),
            Just(LogEvent::Error),
            Just(LogEvent::Debug),
            Just(LogEvent::Trace),
            Just(LogEvent::Exception),
        ]
    }

    fn arb_folder_ref() -> impl Strategy<Value = FolderRef> {
        prop_oneof![
            arb_json_string().prop_map(FolderRef::Euuid),
            arb_json_string().prop_map(FolderRef::Path),
        ]
    }

    prop_compose! {
        fn arb_log_record()(
            time in arb_time(),
            event in arb_log_event(),
            message in arb_json_string(),
            data in proptest::option::of(arb_value().prop_filter("non-null", |v| !v.is_null())),
            duration in proptest::option::of(any::<u64>())
        ) -> LogRecord {
            LogRecord { time, event, message, data, coordinates: None, duration }
        }
    }

    prop_compose! {
        fn arb_file_input()(
            name in arb_opt_string(),
            euuid in arb_opt_string(),
            folder in proptest::option::of(arb_folder_ref()),
            content_type in arb_opt_string(),
            size in proptest::option::of(any::<u64>())
        ) -> FileInput {
            FileInput { name, euuid, folder, content_type, size }
        }
    }

    prop_compose! {
        fn arb_sheet()(
            name in arb_json_string(),
            rows in proptest::collection::vec(arb_value(), 0..10),
            columns in proptest::collection::vec(arb_json_string(), 0..5)
        ) -> Sheet {
            Sheet { name, rows, columns }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn log_record_roundtrip(record in arb_log_record()) {
            let json = serde_json::to_string(&record).unwrap();
            let parsed: LogRecord = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(record, parsed);
        }

        #[test]
        fn file_input_roundtrip(input in arb_file_input()) {
            let json = serde_json::to_string(&input).unwrap();
            let parsed: FileInput = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(input, parsed);
        }

        #[test]
        fn table_report_roundtrip(name in arb_json_string(), sheets in proptest::collection::vec(arb_sheet(), 0..4)) {
            let report = Report::new("r").with_table(Table { name, sheets });
            let json = serde_json::to_string(&report).unwrap();
            let parsed: Report = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(report, parsed);
        }
    }
}
