use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters describing a rotator's activity
#[derive(Debug)]
pub struct RotationMetrics {
    // Operation counts
    /// Number of write calls that reached a target
    write_count: AtomicU64,
    /// Number of files opened
    files_opened: AtomicU64,
    /// Number of files closed at a period boundary
    rotations: AtomicU64,
    /// Number of directories created
    directories_created: AtomicU64,
    /// Number of link updates that failed
    link_failures: AtomicU64,

    // Data metrics
    /// Total bytes written across all files
    bytes_written: AtomicU64,

    // Timing metrics
    /// Total write duration in nanoseconds
    write_duration_ns: AtomicU64,
    /// Total duration spent opening files in nanoseconds
    open_duration_ns: AtomicU64,

    /// Start time of the metrics collector
    start_time: Instant,
}

impl Default for RotationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationMetrics {
    /// Create a new collector with all counters at zero
    pub fn new() -> Self {
        Self {
            write_count: AtomicU64::new(0),
            files_opened: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            directories_created: AtomicU64::new(0),
            link_failures: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_duration_ns: AtomicU64::new(0),
            open_duration_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed write of `bytes`
    pub fn record_write(&self, bytes: usize, duration: Duration) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.write_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a newly opened file
    pub fn record_open(&self, duration: Duration) {
        self.files_opened.fetch_add(1, Ordering::Relaxed);
        self.open_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a file closed at a period boundary
    pub fn increment_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the number of directories created
    pub fn add_directories_created(&self, count: usize) {
        self.directories_created
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a failed link update
    pub fn increment_link_failures(&self) {
        self.link_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of writes
    pub fn get_write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Get the number of files opened
    pub fn get_files_opened(&self) -> u64 {
        self.files_opened.load(Ordering::Relaxed)
    }

    /// Get the number of boundary rotations
    pub fn get_rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Get the number of directories created
    pub fn get_directories_created(&self) -> u64 {
        self.directories_created.load(Ordering::Relaxed)
    }

    /// Get the number of failed link updates
    pub fn get_link_failures(&self) -> u64 {
        self.link_failures.load(Ordering::Relaxed)
    }

    /// Get total bytes written
    pub fn get_bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Get total time spent writing
    pub fn get_write_duration(&self) -> Duration {
        Duration::from_nanos(self.write_duration_ns.load(Ordering::Relaxed))
    }

    /// Get total time spent opening files
    pub fn get_open_duration(&self) -> Duration {
        Duration::from_nanos(self.open_duration_ns.load(Ordering::Relaxed))
    }

    /// Get uptime of the metrics collector
    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get a report of all metrics
    pub fn get_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== cronolog Metrics Report ===\n\n");

        let uptime = self.get_uptime();
        report.push_str(&format!("Uptime: {:?}\n\n", uptime));

        report.push_str("Operation Counts:\n");
        report.push_str(&format!("  Writes: {}\n", self.get_write_count()));
        report.push_str(&format!("  Files Opened: {}\n", self.get_files_opened()));
        report.push_str(&format!("  Rotations: {}\n", self.get_rotations()));
        report.push_str(&format!("  Directories Created: {}\n", self.get_directories_created()));
        report.push_str(&format!("  Link Failures: {}\n\n", self.get_link_failures()));

        report.push_str("Data Metrics:\n");
        report.push_str(&format!("  Bytes Written: {}\n\n", self.get_bytes_written()));

        report.push_str("Performance Metrics:\n");
        if self.get_write_count() > 0 {
            let avg_write = self.get_write_duration().as_micros() / self.get_write_count() as u128;
            report.push_str(&format!("  Avg. Write Time: {}µs\n", avg_write));
        }
        if self.get_files_opened() > 0 {
            let avg_open = self.get_open_duration().as_micros() / self.get_files_opened() as u128;
            report.push_str(&format!("  Avg. Open Time: {}µs\n", avg_open));
        }

        let uptime_secs = uptime.as_secs_f64();
        if uptime_secs > 0.0 {
            report.push_str(&format!(
                "  Write Bytes/sec: {:.2}\n",
                self.get_bytes_written() as f64 / uptime_secs
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_recording() {
        let metrics = RotationMetrics::new();

        metrics.record_open(Duration::from_millis(2));
        metrics.record_write(100, Duration::from_millis(1));
        metrics.record_write(50, Duration::from_millis(1));
        metrics.increment_rotations();
        metrics.add_directories_created(3);
        metrics.increment_link_failures();

        assert_eq!(metrics.get_files_opened(), 1);
        assert_eq!(metrics.get_write_count(), 2);
        assert_eq!(metrics.get_bytes_written(), 150);
        assert_eq!(metrics.get_rotations(), 1);
        assert_eq!(metrics.get_directories_created(), 3);
        assert_eq!(metrics.get_link_failures(), 1);
        assert_eq!(metrics.get_write_duration(), Duration::from_millis(2));
        assert_eq!(metrics.get_open_duration(), Duration::from_millis(2));
    }

    #[test]
    fn test_metrics_report() {
        let metrics = RotationMetrics::new();
        metrics.record_write(1000, Duration::from_micros(10));

        let report = metrics.get_report();
        assert!(report.contains("Operation Counts:"));
        assert!(report.contains("Bytes Written: 1000"));
        assert!(report.contains("Avg. Write Time: 10µs"));
    }

    #[test]
    fn test_metrics_thread_safety() {
        let metrics = Arc::new(RotationMetrics::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_write(10, Duration::ZERO);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.get_write_count(), 800);
        assert_eq!(metrics.get_bytes_written(), 8000);
    }
}
