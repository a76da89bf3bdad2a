use std::time::{Duration, Instant};

/// Process-wide version and uptime. Initialized once at startup and
/// read-only thereafter.
#[derive(Clone)]
pub struct NodeInfo {
    version: String,
    start_time: Instant,
}

impl NodeInfo {
    pub fn new() -> NodeInfo {
        NodeInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn get_version(&self) -> String {
        self.version.clone()
    }

    /// Time since process start. `Instant` is monotonic, so repeated
    /// calls never go backwards.
    pub fn get_uptime(&self) -> Duration {
        Instant::now().duration_since(self.start_time)
    }
}

impl Default for NodeInfo {
    fn default() -> Self {
        NodeInfo::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_the_package() {
        assert_eq!(NodeInfo::new().get_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn uptime_is_monotonic() {
        let info = NodeInfo::new();
        let mut last = info.get_uptime();
        for _ in 0..100 {
            let next = info.get_uptime();
            assert!(next >= last);
            last = next;
        }
    }
}
