//! ドメインエラー型
//!
//! 標準ライブラリのみ使用（外部エラーハンドリングクレートなし）

use std::fmt;

/// ドメイン層のエラー型
/// 各バリアントは特定の失敗シナリオを表現
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// レジストリアクセス拒否（管理者権限不足）
    RegistryAccessDenied(String),

    /// レジストリ操作の失敗（アクセス拒否以外）
    RegistryError(String),

    /// ファイルI/Oエラー
    IoError(String),

    /// プロセスの起動・操作失敗
    ProcessLaunchFailed(String),

    /// リトライ上限までファイルコピーに失敗した（設定複製で致命的）
    CopyRetriesExhausted { file: String, attempts: u32 },

    /// バリデーションエラー
    ValidationError(String),

    /// タイムアウト
    Timeout(String),

    /// 不明なエラー
    Unknown(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryAccessDenied(msg) => {
                write!(f, "Registry access denied: {}", msg)
            }
            Self::RegistryError(msg) => {
                write!(f, "Registry error: {}", msg)
            }
            Self::IoError(msg) => {
                write!(f, "IO error: {}", msg)
            }
            Self::ProcessLaunchFailed(msg) => {
                write!(f, "Process launch failed: {}", msg)
            }
            Self::CopyRetriesExhausted { file, attempts } => {
                write!(f, "Failed to copy file {} after {} attempts.", file, attempts)
            }
            Self::ValidationError(msg) => {
                write!(f, "Validation error: {}", msg)
            }
            Self::Timeout(msg) => {
                write!(f, "Timeout: {}", msg)
            }
            Self::Unknown(msg) => {
                write!(f, "Unknown error: {}", msg)
            }
        }
    }
}

impl std::error::Error for DomainError {}
