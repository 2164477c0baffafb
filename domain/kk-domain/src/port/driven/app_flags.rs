//! アプリ状態フラグポート

/// クライアントがレジストリに書くアプリ毎の状態フラグ。
/// 読み取り失敗は「未設定」と同義に扱う。
pub trait AppFlags {
    /// アプリが起動済みか（Running フラグ）
    fn is_running(&self, app_id: &str) -> bool;

    /// アプリが更新中か（Updating フラグ）
    fn is_updating(&self, app_id: &str) -> bool;
}
