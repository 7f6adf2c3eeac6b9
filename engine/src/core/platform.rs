//! Platform detection helpers and task spawning.

use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Desktop,
    Mobile,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Web
        } else if cfg!(any(target_os = "android", target_os = "ios")) {
            Self::Mobile
        } else if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            Self::Desktop
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Unknown => "unknown",
        }
    }
}

/// Platform label with the OS appended, e.g. `desktop/linux`.
pub fn platform_string() -> String {
    format!("{}/{}", Platform::current().as_str(), std::env::consts::OS)
}

/// Spawn a detached future on the ambient executor.
///
/// Native builds need a tokio runtime in scope.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_future<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future);
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_future<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_build_reports_a_known_platform() {
        let label = platform_string();
        assert!(label.ends_with(std::env::consts::OS));
        assert!(!label.starts_with("web"));
    }
}
