/// エンジン起動時に一度だけ解析される不変のコマンドレコード。
/// 全フラグは任意かつ組み合わせ可能。パスやID類は未指定なら `None`。
#[derive(Debug, Clone, Default)]
pub struct EngineCommand {
    /// インストールパスを取得して即終了
    pub get_steam_path: bool,
    /// アクティブプロファイルを取得して即終了（インストールパス必須）
    pub get_selected_profile: bool,
    /// クライアントのインストールパス
    pub steam_path: Option<String>,
    /// 切替前（名目上の現在）プロファイル名
    pub selected_profile_name: Option<String>,
    /// 切替先プロファイル名
    pub new_profile_name: Option<String>,
    /// 削除対象プロファイル名
    pub remove_profile_name: Option<String>,
    /// 削除対象アカウントID（remove_profile_name と併用）
    pub remove_account_id: Option<String>,
    /// 設定複製対象のアプリID（"0" はセンチネル）
    pub app_id: String,
    /// 複製元プロファイル名
    pub ref_profile_name: Option<String>,
    /// 複製元アカウントID
    pub ref_account_id: Option<String>,
    /// ボリュームシリアル書換ツールのパス
    pub tool_path: Option<String>,
    /// プロファイル切替を実行
    pub perform_unlink: bool,
    /// 設定複製を実行
    pub auto_copy_settings: bool,
    /// クライアントの全プロセスを終了
    pub terminate_steam: bool,
    /// ボリュームシリアルを書き換え
    pub change_hwid: bool,
    /// 有線アダプターのMACアドレスをランダム化
    pub random_macs: bool,
    /// クライアントのレジストリキーを削除
    pub clean_regedit: bool,
    /// マシンGUIDを再生成
    pub change_mguid: bool,
    /// クライアントサービスを起動
    pub start_steam_service: bool,
}
