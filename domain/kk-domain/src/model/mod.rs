//! ドメインモデル
//!
//! 標準ライブラリのみ使用（外部依存なし）
//! 値オブジェクトとコマンドレコードを定義

mod account;    // アカウントID / アプリID
mod client;     // 対象クライアント（Steam）の固定値
mod command;    // エンジン起動コマンドレコード
pub mod exit_codes; // エグゼキュータ終了コード
mod profile;    // プロファイル名とバックアップ対象サブツリー

pub use account::*;
pub use client::*;
pub use command::*;
pub use profile::*;
