//! インストールパス解決ポート

use crate::DomainError;

/// クライアントのインストールパスをレジストリから解決する。
pub trait InstallLocator {
    /// ユーザースコープの値を優先し、無ければマシンスコープへフォールバック。
    /// どちらも無い場合は `Ok(None)`（致命的ではない）。
    fn install_path(&self) -> Result<Option<String>, DomainError>;
}
