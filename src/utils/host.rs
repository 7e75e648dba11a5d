// Local host identification for notifications

use std::path::Path;

/// Name of the machine running the invocation, or "unknown"
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| read_hostname_file(Path::new("/etc/hostname")))
        .map(|h| h.trim().to_string())
        .unwrap_or_else(|| {
            tracing::debug!("could not determine host name");
            String::from("unknown")
        })
}

fn read_hostname_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .filter(|h| !h.trim().is_empty())
}
