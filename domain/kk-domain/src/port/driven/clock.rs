//! 時刻・待機ポート

/// 時刻ポート。ポーリングループの待機もここを通すことで
/// エンジンを実時間なしでテストできる。
pub trait Clock {
    /// ISO 8601形式のタイムスタンプを取得
    fn now_iso8601(&self) -> String;

    /// 指定ミリ秒だけ停止する
    fn sleep_ms(&self, ms: u64);
}
