//! イベントログポート

/// 呼び出し元へ転送される進行ログ。
/// 本番実装はワイヤプロトコル（標準出力NDJSON）に書き出す。
/// Trace はワイヤには流れない（実装側で抑制される）。
pub trait EventLog {
    fn trace(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}
