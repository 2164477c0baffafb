//! 外部起動ポート

use crate::DomainError;
use std::path::Path;

/// URL・実行ファイル・外部ツールの起動。
pub trait Launcher {
    /// URLスキーム経由で起動を要求する（クライアントが処理する）
    fn open_url(&self, url: &str) -> Result<(), DomainError>;

    /// 実行ファイルをデタッチ起動する（終了は待たない）
    fn spawn_detached(&self, exe: &Path) -> Result<(), DomainError>;

    /// 外部ツールを起動し、終了を待って標準出力を返す
    fn run_capture(&self, exe: &Path, args: &[String]) -> Result<String, DomainError>;
}
