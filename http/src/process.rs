use haproxy_exporter_collector::{
    read_pid_file,
    ProcessMetricsError,
};
use prometheus::core::Collector;
use std::path::Path;

/// Process metrics (`haproxy_process_*`) for the pid currently in `pid_file`.
#[cfg(all(target_os = "linux", feature = "process"))]
pub fn process_collector(pid_file: &Path) -> Result<Box<dyn Collector>, ProcessMetricsError> {
    let pid = read_pid_file(pid_file)?;
    // The collector silently reports nothing for a missing process.
    if !Path::new("/proc").join(pid.to_string()).exists() {
        return Err(ProcessMetricsError::Collect {
            pid,
            reason: "no such process".to_string(),
        });
    }
    let collector = prometheus::process_collector::ProcessCollector::new(
        pid as libc::pid_t,
        haproxy_exporter_collector::NAMESPACE,
    );
    Ok(Box::new(collector))
}

#[cfg(not(all(target_os = "linux", feature = "process")))]
pub fn process_collector(pid_file: &Path) -> Result<Box<dyn Collector>, ProcessMetricsError> {
    let pid = read_pid_file(pid_file)?;
    Err(ProcessMetricsError::Collect {
        pid,
        reason: "process metrics are only available on Linux".to_string(),
    })
}
