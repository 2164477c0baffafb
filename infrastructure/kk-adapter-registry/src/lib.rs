//! Steam／マシン識別子レジストリアダプター
//!
//! インストールパス解決、マシンGUID、NICアドレス上書き、アプリ状態フラグ、
//! クライアントキー削除をWin32レジストリAPIで実装する。
//! NICのサブキーは表示名ではなく NetCfgInstanceId で照合する
//! （名前は一意でも安定でもない）。

use kk_domain::port::driven::{
    AdapterInfo, AppFlags, InstallLocator, KeyLocation, MachineIdentity, NetworkConfig,
    RegistryScope,
};
use kk_domain::DomainError;

/// ユーザースコープのクライアントキー（インストールパス・アプリフラグ）
pub const STEAM_USER_KEY: &str = r"Software\Valve\Steam";
/// マシンスコープのクライアントキー
pub const STEAM_MACHINE_KEY: &str = r"SOFTWARE\Valve\Steam";
/// マシンスコープ（32bitビュー）のクライアントキー
pub const STEAM_MACHINE_WOW_KEY: &str = r"SOFTWARE\WOW6432Node\Valve\Steam";
/// マシンGUIDを保持する暗号キー
pub const CRYPTOGRAPHY_KEY: &str = r"SOFTWARE\Microsoft\Cryptography";
/// ネットワークアダプタークラスキー
pub const NET_CLASS_KEY: &str =
    r"SYSTEM\CurrentControlSet\Control\Class\{4d36e972-e325-11ce-bfc1-08002be10318}";

/// アプリ毎の状態フラグを保持するサブキーパス
pub fn app_key_path(app_id: &str) -> String {
    format!(r"{}\Apps\{}", STEAM_USER_KEY, app_id)
}

fn default_client_key_locations() -> Vec<KeyLocation> {
    vec![
        KeyLocation::new(RegistryScope::CurrentUser, STEAM_USER_KEY),
        KeyLocation::new(RegistryScope::LocalMachine, STEAM_MACHINE_KEY),
        KeyLocation::new(RegistryScope::LocalMachine, STEAM_MACHINE_WOW_KEY),
    ]
}

/// プラットフォーム中立のハンドル
#[cfg(windows)]
pub type RegistryAdapter = WindowsRegistryAdapter;
#[cfg(not(windows))]
pub type RegistryAdapter = NonWindowsRegistryAdapter;

#[cfg(windows)]
#[derive(Debug, Default)]
pub struct WindowsRegistryAdapter;

#[cfg(windows)]
impl WindowsRegistryAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(windows)]
impl InstallLocator for WindowsRegistryAdapter {
    fn install_path(&self) -> Result<Option<String>, DomainError> {
        windows_impl::install_path()
    }
}

#[cfg(windows)]
impl MachineIdentity for WindowsRegistryAdapter {
    fn machine_guid(&self) -> Result<Option<String>, DomainError> {
        windows_impl::machine_guid()
    }

    fn set_machine_guid(&self, guid: &str) -> Result<(), DomainError> {
        windows_impl::set_machine_guid(guid)
    }

    fn client_key_locations(&self) -> Vec<KeyLocation> {
        default_client_key_locations()
    }

    fn delete_key_tree(&self, location: &KeyLocation) -> Result<bool, DomainError> {
        windows_impl::delete_key_tree(location)
    }
}

#[cfg(windows)]
impl NetworkConfig for WindowsRegistryAdapter {
    fn up_ethernet_adapters(&self) -> Result<Vec<AdapterInfo>, DomainError> {
        windows_impl::up_ethernet_adapters()
    }

    fn set_network_address(&self, instance_id: &str, address: &str) -> Result<(), DomainError> {
        windows_impl::set_network_address(instance_id, address)
    }
}

#[cfg(windows)]
impl AppFlags for WindowsRegistryAdapter {
    fn is_running(&self, app_id: &str) -> bool {
        windows_impl::app_flag(app_id, "Running")
    }

    fn is_updating(&self, app_id: &str) -> bool {
        windows_impl::app_flag(app_id, "Updating")
    }
}

#[cfg(not(windows))]
#[derive(Debug, Default)]
pub struct NonWindowsRegistryAdapter;

#[cfg(not(windows))]
impl NonWindowsRegistryAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl InstallLocator for NonWindowsRegistryAdapter {
    fn install_path(&self) -> Result<Option<String>, DomainError> {
        Ok(None)
    }
}

#[cfg(not(windows))]
impl MachineIdentity for NonWindowsRegistryAdapter {
    fn machine_guid(&self) -> Result<Option<String>, DomainError> {
        Ok(None)
    }

    fn set_machine_guid(&self, _guid: &str) -> Result<(), DomainError> {
        Err(DomainError::Unknown(
            "registry is not supported on this platform".into(),
        ))
    }

    fn client_key_locations(&self) -> Vec<KeyLocation> {
        default_client_key_locations()
    }

    fn delete_key_tree(&self, _location: &KeyLocation) -> Result<bool, DomainError> {
        Ok(false)
    }
}

#[cfg(not(windows))]
impl NetworkConfig for NonWindowsRegistryAdapter {
    fn up_ethernet_adapters(&self) -> Result<Vec<AdapterInfo>, DomainError> {
        Ok(Vec::new())
    }

    fn set_network_address(&self, _instance_id: &str, _address: &str) -> Result<(), DomainError> {
        Err(DomainError::Unknown(
            "registry is not supported on this platform".into(),
        ))
    }
}

#[cfg(not(windows))]
impl AppFlags for NonWindowsRegistryAdapter {
    fn is_running(&self, _app_id: &str) -> bool {
        false
    }

    fn is_updating(&self, _app_id: &str) -> bool {
        false
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_BUFFER_OVERFLOW, ERROR_SUCCESS};
    use windows::Win32::System::Registry::{
        HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_ENUMERATE_SUB_KEYS, KEY_QUERY_VALUE,
        KEY_SET_VALUE, REG_SZ, REG_VALUE_TYPE, RRF_RT_REG_DWORD, RRF_RT_REG_EXPAND_SZ,
        RRF_RT_REG_SZ, RegCloseKey, RegDeleteTreeW, RegEnumKeyExW, RegGetValueW, RegOpenKeyExW,
        RegSetValueExW,
    };

    const ERROR_NOT_FOUND_CODE: u32 = 2; // ERROR_FILE_NOT_FOUND
    const ERROR_PATH_NOT_FOUND_CODE: u32 = 3;

    fn to_wide(s: &str) -> Vec<u16> {
        let mut wide: Vec<u16> = s.encode_utf16().collect();
        wide.push(0);
        wide
    }

    fn root_of(scope: RegistryScope) -> HKEY {
        match scope {
            RegistryScope::CurrentUser => HKEY_CURRENT_USER,
            RegistryScope::LocalMachine => HKEY_LOCAL_MACHINE,
        }
    }

    /// REG_SZ/REG_EXPAND_SZ 値を読み取る。キー/値が無ければ `Ok(None)`。
    fn read_string_value(
        root: HKEY,
        subkey: &str,
        value: &str,
    ) -> Result<Option<String>, DomainError> {
        let subkey_w = to_wide(subkey);
        let value_w = to_wide(value);
        let mut value_type = REG_VALUE_TYPE(0);
        let mut size_bytes: u32 = 0;
        let status = unsafe {
            RegGetValueW(
                root,
                PCWSTR(subkey_w.as_ptr()),
                PCWSTR(value_w.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                Some(&mut value_type),
                None,
                Some(&mut size_bytes),
            )
        };
        if status != ERROR_SUCCESS {
            return match status.0 {
                ERROR_NOT_FOUND_CODE | ERROR_PATH_NOT_FOUND_CODE => Ok(None),
                code if code == ERROR_ACCESS_DENIED.0 => Err(DomainError::RegistryAccessDenied(
                    format!("Access denied reading {}\\{}", subkey, value),
                )),
                code => Err(DomainError::RegistryError(format!(
                    "Failed to read {}\\{}: status={}",
                    subkey, value, code
                ))),
            };
        }

        let mut buffer: Vec<u16> = vec![0u16; (size_bytes as usize / 2).max(1)];
        let status = unsafe {
            RegGetValueW(
                root,
                PCWSTR(subkey_w.as_ptr()),
                PCWSTR(value_w.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                Some(&mut value_type),
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut size_bytes),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(DomainError::RegistryError(format!(
                "Failed to read {}\\{}: status={}",
                subkey, value, status.0
            )));
        }
        // size_bytesは終端nullを含むため適切に切り詰める
        let char_len = (size_bytes as usize / 2).saturating_sub(1);
        buffer.truncate(char_len);
        Ok(Some(String::from_utf16_lossy(&buffer)))
    }

    /// REG_DWORD 値を読み取る。キー/値が無ければ `Ok(None)`。
    fn read_dword_value(root: HKEY, subkey: &str, value: &str) -> Result<Option<u32>, DomainError> {
        let subkey_w = to_wide(subkey);
        let value_w = to_wide(value);
        let mut data: u32 = 0;
        let mut size_bytes: u32 = std::mem::size_of::<u32>() as u32;
        let status = unsafe {
            RegGetValueW(
                root,
                PCWSTR(subkey_w.as_ptr()),
                PCWSTR(value_w.as_ptr()),
                RRF_RT_REG_DWORD,
                None,
                Some(&mut data as *mut u32 as *mut _),
                Some(&mut size_bytes),
            )
        };
        if status != ERROR_SUCCESS {
            return match status.0 {
                ERROR_NOT_FOUND_CODE | ERROR_PATH_NOT_FOUND_CODE => Ok(None),
                code => Err(DomainError::RegistryError(format!(
                    "Failed to read {}\\{}: status={}",
                    subkey, value, code
                ))),
            };
        }
        Ok(Some(data))
    }

    /// 既存キーの REG_SZ 値を上書きする。
    fn write_string_value(
        root: HKEY,
        subkey: &str,
        value: &str,
        data: &str,
    ) -> Result<(), DomainError> {
        let subkey_w = to_wide(subkey);
        let mut key = HKEY::default();
        let status = unsafe {
            RegOpenKeyExW(
                root,
                PCWSTR(subkey_w.as_ptr()),
                Some(0),
                KEY_SET_VALUE,
                &mut key,
            )
        };
        if status != ERROR_SUCCESS {
            return match status.0 {
                code if code == ERROR_ACCESS_DENIED.0 => Err(DomainError::RegistryAccessDenied(
                    format!("Access denied opening {}", subkey),
                )),
                code => Err(DomainError::RegistryError(format!(
                    "Failed to open {}: status={}",
                    subkey, code
                ))),
            };
        }

        let value_w = to_wide(value);
        let data_w = to_wide(data);
        let status = unsafe {
            RegSetValueExW(
                key,
                PCWSTR(value_w.as_ptr()),
                Some(0),
                REG_SZ,
                Some(std::slice::from_raw_parts(
                    data_w.as_ptr() as *const u8,
                    data_w.len() * 2,
                )),
            )
        };
        let _ = unsafe { RegCloseKey(key) };
        if status != ERROR_SUCCESS {
            return match status.0 {
                code if code == ERROR_ACCESS_DENIED.0 => Err(DomainError::RegistryAccessDenied(
                    format!("Access denied writing {}\\{}", subkey, value),
                )),
                code => Err(DomainError::RegistryError(format!(
                    "Failed to write {}\\{}: status={}",
                    subkey, value, code
                ))),
            };
        }
        Ok(())
    }

    pub(super) fn install_path() -> Result<Option<String>, DomainError> {
        let user = read_string_value(HKEY_CURRENT_USER, STEAM_USER_KEY, "SteamPath")?;
        if let Some(path) = user {
            if !path.trim().is_empty() {
                return Ok(Some(path));
            }
        }
        let machine = read_string_value(HKEY_LOCAL_MACHINE, STEAM_MACHINE_WOW_KEY, "InstallPath")?;
        Ok(machine.filter(|path| !path.trim().is_empty()))
    }

    pub(super) fn machine_guid() -> Result<Option<String>, DomainError> {
        read_string_value(HKEY_LOCAL_MACHINE, CRYPTOGRAPHY_KEY, "MachineGuid")
    }

    pub(super) fn set_machine_guid(guid: &str) -> Result<(), DomainError> {
        write_string_value(HKEY_LOCAL_MACHINE, CRYPTOGRAPHY_KEY, "MachineGuid", guid)
    }

    pub(super) fn delete_key_tree(location: &KeyLocation) -> Result<bool, DomainError> {
        let subkey_w = to_wide(&location.path);
        let status =
            unsafe { RegDeleteTreeW(root_of(location.scope), PCWSTR(subkey_w.as_ptr())) };
        if status == ERROR_SUCCESS {
            return Ok(true);
        }
        match status.0 {
            ERROR_NOT_FOUND_CODE | ERROR_PATH_NOT_FOUND_CODE => Ok(false),
            code if code == ERROR_ACCESS_DENIED.0 => Err(DomainError::RegistryAccessDenied(
                location.to_string(),
            )),
            code => Err(DomainError::RegistryError(format!(
                "Failed to delete {}: status={}",
                location, code
            ))),
        }
    }

    pub(super) fn app_flag(app_id: &str, value: &str) -> bool {
        matches!(
            read_dword_value(HKEY_CURRENT_USER, &app_key_path(app_id), value),
            Ok(Some(1))
        )
    }

    pub(super) fn up_ethernet_adapters() -> Result<Vec<AdapterInfo>, DomainError> {
        use windows::Win32::NetworkManagement::IpHelper::{
            GAA_FLAG_SKIP_ANYCAST, GAA_FLAG_SKIP_DNS_SERVER, GAA_FLAG_SKIP_MULTICAST,
            GAA_FLAG_SKIP_UNICAST, GetAdaptersAddresses, IP_ADAPTER_ADDRESSES_LH,
        };
        use windows::Win32::NetworkManagement::Ndis::IfOperStatusUp;
        use windows::Win32::Networking::WinSock::AF_UNSPEC;

        // IANA ifType 6 = ethernetCsmacd（有線）
        const IF_TYPE_ETHERNET_CSMACD: u32 = 6;

        let flags = GAA_FLAG_SKIP_UNICAST
            | GAA_FLAG_SKIP_ANYCAST
            | GAA_FLAG_SKIP_MULTICAST
            | GAA_FLAG_SKIP_DNS_SERVER;
        let mut size: u32 = 16 * 1024;
        for _ in 0..4 {
            // IP_ADAPTER_ADDRESSES_LH のアラインメントを満たすため u64 で確保する
            let mut buffer: Vec<u64> = vec![0; (size as usize + 7) / 8];
            let status = unsafe {
                GetAdaptersAddresses(
                    AF_UNSPEC.0 as u32,
                    flags,
                    None,
                    Some(buffer.as_mut_ptr() as *mut IP_ADAPTER_ADDRESSES_LH),
                    &mut size,
                )
            };
            if status == ERROR_BUFFER_OVERFLOW.0 {
                continue; // sizeは必要量に更新されている
            }
            if status != ERROR_SUCCESS.0 {
                return Err(DomainError::Unknown(format!(
                    "GetAdaptersAddresses failed: status={}",
                    status
                )));
            }

            let mut adapters = Vec::new();
            let mut cursor = buffer.as_ptr() as *const IP_ADAPTER_ADDRESSES_LH;
            while !cursor.is_null() {
                let entry = unsafe { &*cursor };
                if entry.IfType == IF_TYPE_ETHERNET_CSMACD && entry.OperStatus == IfOperStatusUp {
                    let instance_id = unsafe { pstr_to_string(entry.AdapterName) };
                    let description = unsafe { pwstr_to_string(entry.Description) };
                    let len = entry.PhysicalAddressLength.min(8) as usize;
                    let address: String = entry.PhysicalAddress[..len]
                        .iter()
                        .map(|b| format!("{:02X}", b))
                        .collect();
                    adapters.push(AdapterInfo {
                        description,
                        instance_id,
                        address,
                    });
                }
                cursor = entry.Next;
            }
            return Ok(adapters);
        }
        Err(DomainError::Unknown(
            "GetAdaptersAddresses buffer negotiation failed".into(),
        ))
    }

    pub(super) fn set_network_address(
        instance_id: &str,
        address: &str,
    ) -> Result<(), DomainError> {
        let class_w = to_wide(NET_CLASS_KEY);
        let mut class_key = HKEY::default();
        let status = unsafe {
            RegOpenKeyExW(
                HKEY_LOCAL_MACHINE,
                PCWSTR(class_w.as_ptr()),
                Some(0),
                KEY_ENUMERATE_SUB_KEYS | KEY_QUERY_VALUE,
                &mut class_key,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(DomainError::RegistryError(format!(
                "Failed to open network adapter class key: status={}",
                status.0
            )));
        }

        let mut index: u32 = 0;
        let mut name_buf: [u16; 260] = [0; 260];
        let result = loop {
            let mut name_len = name_buf.len() as u32;
            let enum_status = unsafe {
                RegEnumKeyExW(
                    class_key,
                    index,
                    Some(PWSTR(name_buf.as_mut_ptr())),
                    &mut name_len,
                    None,
                    None, // 予約
                    None, // クラス
                    None, // 最終書き込み時刻
                )
            };
            if enum_status != ERROR_SUCCESS {
                break Err(DomainError::RegistryError(format!(
                    "No adapter subkey matched instance id {}",
                    instance_id
                )));
            }

            let subkey_name = String::from_utf16_lossy(&name_buf[..name_len as usize]);
            let adapter_path = format!(r"{}\{}", NET_CLASS_KEY, subkey_name);
            let matches_instance = matches!(
                read_string_value(HKEY_LOCAL_MACHINE, &adapter_path, "NetCfgInstanceId"),
                Ok(Some(id)) if id.eq_ignore_ascii_case(instance_id)
            );
            if matches_instance {
                break write_string_value(
                    HKEY_LOCAL_MACHINE,
                    &adapter_path,
                    "NetworkAddress",
                    address,
                );
            }
            index += 1;
        };

        let _ = unsafe { RegCloseKey(class_key) };
        result
    }

    unsafe fn pwstr_to_string(pwstr: PWSTR) -> String {
        if pwstr.is_null() {
            return String::new();
        }
        let mut len = 0usize;
        while *pwstr.0.add(len) != 0 {
            len += 1;
        }
        let slice = std::slice::from_raw_parts(pwstr.0, len);
        String::from_utf16_lossy(slice)
    }

    unsafe fn pstr_to_string(pstr: windows::core::PSTR) -> String {
        if pstr.is_null() {
            return String::new();
        }
        let mut len = 0usize;
        while *pstr.0.add(len) != 0 {
            len += 1;
        }
        let slice = std::slice::from_raw_parts(pstr.0, len);
        String::from_utf8_lossy(slice).into_owned()
    }
}
