//! 対象クライアント（Steam）の固定値。
//! レジストリパスはアダプター側、プロセス名とURLスキームはここで共有する。

/// ライブインストール直下のクライアント実行ファイル名。
pub const CLIENT_EXE: &str = "steam.exe";

/// クライアントのメインプロセス名（拡張子なし）。
pub const CLIENT_PROCESS: &str = "steam";

/// クライアントに内蔵されたWebヘルパープロセス名。
pub const CLIENT_WEB_HELPER: &str = "steamwebhelper";

/// アプリ起動用URLスキームのプレフィックス。
pub const LAUNCH_URL_PREFIX: &str = "steam://rungameid/";
