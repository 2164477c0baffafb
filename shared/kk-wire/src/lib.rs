//! 標準出力ワイヤプロトコル（NDJSON）
//!
//! 1行1レコード。ログレコードは `{level, message, timestamp}`、
//! 終端レコードは `success` または `error` キーを持つ1件のみ。
//! Trace レベルはワイヤに流さない。

use kk_domain::port::driven::EventLog;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// ワイヤ上のログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Information,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

/// 標準出力へNDJSONログを書くロガー
#[derive(Debug, Default)]
pub struct JsonLogger;

impl JsonLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if let Some(line) = format_log_record(level, message, &utc_rfc3339_millis()) {
            println!("{}", line);
        }
    }
}

impl EventLog for JsonLogger {
    fn trace(&self, message: &str) {
        self.emit(LogLevel::Trace, message);
    }

    fn info(&self, message: &str) {
        self.emit(LogLevel::Information, message);
    }

    fn warn(&self, message: &str) {
        self.emit(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}

/// ログレコードを1行に整形する。Trace は `None`（抑制）。
pub fn format_log_record(level: LogLevel, message: &str, timestamp: &str) -> Option<String> {
    if level == LogLevel::Trace {
        return None;
    }
    let mut map = Map::new();
    map.insert("level".into(), Value::String(level.as_str().into()));
    map.insert("message".into(), Value::String(message.into()));
    map.insert("timestamp".into(), Value::String(timestamp.into()));
    Some(Value::Object(map).to_string())
}

/// `{"success":true}` 終端レコード
pub fn success_record() -> String {
    let mut map = Map::new();
    map.insert("success".into(), Value::Bool(true));
    Value::Object(map).to_string()
}

/// 付加値つきの成功終端レコード（例: `{"success":true,"steamPath":"..."}`）
pub fn success_record_with(key: &str, value: &str) -> String {
    let mut map = Map::new();
    map.insert("success".into(), Value::Bool(true));
    map.insert(key.into(), Value::String(value.into()));
    Value::Object(map).to_string()
}

/// `{"error":"..."}` 終端レコード
pub fn error_record(message: &str) -> String {
    let mut map = Map::new();
    map.insert("error".into(), Value::String(message.into()));
    Value::Object(map).to_string()
}

/// 終端レコードを標準出力へ書き出す
pub fn emit_terminal(record: &str) {
    println!("{}", record);
}

/// UTCのRFC3339（ミリ秒付き）。例: 2025-01-15T10:30:00.123Z
pub fn utc_rfc3339_millis() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let millis = now.subsec_millis();
    let (year, month, day, hour, minute, second) = unix_seconds_to_utc_components(secs);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year, month, day, hour, minute, second, millis
    )
}

fn unix_seconds_to_utc_components(secs: u64) -> (i32, u32, u32, u32, u32, u32) {
    let days = (secs / 86_400) as i64;
    let rem = (secs % 86_400) as i64;
    let hour = (rem / 3_600) as u32;
    let minute = ((rem % 3_600) / 60) as u32;
    let second = (rem % 60) as u32;
    let (year, month, day) = civil_from_days(days);
    (year, month, day, hour, minute, second)
}

fn civil_from_days(days: i64) -> (i32, u32, u32) {
    // Howard Hinnant のアルゴリズム
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]
    let year = y + if m <= 2 { 1 } else { 0 };
    (year as i32, m as u32, d as u32)
}
