//! プロファイル仮想化ファイルシステムポート

use crate::DomainError;
use std::path::{Path, PathBuf};

/// 切替・複製ワークフローが必要とするファイルシステム操作。
/// リパースリンク（ディレクトリシンボリックリンク／ジャンクション）を
/// 扱えることが前提。
pub trait ProfileFs {
    /// ディレクトリが存在するか（リンクは辿る）
    fn dir_exists(&self, path: &Path) -> bool;

    /// ファイルが存在するか
    fn file_exists(&self, path: &Path) -> bool;

    /// パス自体がリパースリンクか（リンク先は辿らない）
    fn is_reparse_link(&self, path: &Path) -> bool;

    /// ディレクトリを親ごと作成する（既存なら成功）
    fn ensure_dir(&self, path: &Path) -> Result<(), DomainError>;

    /// ディレクトリツリーを再帰削除する
    fn remove_tree(&self, path: &Path) -> Result<(), DomainError>;

    /// リンクのみを削除する（リンク先のデータは残る）
    fn remove_link(&self, path: &Path) -> Result<(), DomainError>;

    /// ディレクトリを丸ごと移動する
    fn move_dir(&self, from: &Path, to: &Path) -> Result<(), DomainError>;

    /// `link` が `target` を指すディレクトリリンクを作成する
    fn create_dir_link(&self, link: &Path, target: &Path) -> Result<(), DomainError>;

    /// リンクを辿った実パスを返す
    fn resolve_real_path(&self, path: &Path) -> Result<PathBuf, DomainError>;

    /// 直下のサブディレクトリ一覧
    fn list_subdirs(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError>;

    /// 直下のファイル一覧
    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>, DomainError>;

    /// ファイルを1つコピーする（上書き）
    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), DomainError>;
}
