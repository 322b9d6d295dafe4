use crate::error::ProcessMetricsError;
use std::path::Path;

/// Read the HAProxy master pid from its pid file.
///
/// The file is re-read on every call so a restarted HAProxy is picked up.
pub fn read_pid_file(path: &Path) -> Result<i32, ProcessMetricsError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProcessMetricsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content = content.trim();
    content
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| ProcessMetricsError::Parse {
            path: path.to_path_buf(),
            content: content.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    fn pid_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("haproxy.pid");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reads_trimmed_pid() {
        let dir = TempDir::new().unwrap();
        let path = pid_file(&dir, "4242\n");
        assert_eq!(read_pid_file(&path).unwrap(), 4242);
    }

    #[test]
    fn rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = pid_file(&dir, "haproxy\n");
        assert!(matches!(read_pid_file(&path), Err(ProcessMetricsError::Parse { .. })));

        let path = pid_file(&dir, "-1");
        assert!(matches!(read_pid_file(&path), Err(ProcessMetricsError::Parse { .. })));
    }

    #[test]
    fn missing_file() {
        let error = read_pid_file(Path::new("/nonexistent/haproxy.pid")).unwrap_err();
        assert!(matches!(error, ProcessMetricsError::Read { .. }));
        assert!(error.to_string().starts_with("can't read pid file"));
    }
}
