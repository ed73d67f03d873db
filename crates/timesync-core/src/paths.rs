//! Platform configuration directory.
//!
//! - Windows:  `%APPDATA%\TimeSync`
//! - Linux:    `$XDG_CONFIG_HOME/timesync` or `~/.config/timesync`
//! - macOS:    `~/Library/Application Support/TimeSync`

use std::path::PathBuf;

/// Resolves the directory holding `server.toml`, `client.toml`, and the
/// client address cache. `None` when the environment gives no base directory.
pub fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("TimeSync"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("timesync"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("TimeSync")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_config_dir_names_the_application() {
        // Stripped containers may lack HOME; only check when a result exists.
        if let Some(dir) = platform_config_dir() {
            let leaf = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            assert!(leaf.eq_ignore_ascii_case("timesync"), "got {dir:?}");
        }
    }
}
