use std::path::PathBuf;

pub fn data_dir() -> PathBuf {
    // Use ~/.local/share/nowplay/ (XDG standard) on all unixes, including
    // macOS, so logs and the token store are always in the same place.
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("nowplay")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nowplay")
}

pub fn mpv_socket_path() -> String {
    format!("{}/nowplay-mpv.sock", std::env::temp_dir().display())
}

pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_path())
}

pub fn find_mpv_binary() -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    for dir in path.split(':') {
        let candidate = PathBuf::from(dir).join("mpv");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
