#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct StageStats {
    pub stage: String,
    pub stage_time: Duration,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    last_checkpoint: Instant,
    peak_memory_mb: u64,
    // 每個階段的累計時間 (Extract / Index / Retrieve / Generate)
    stage_totals: Vec<(String, Duration, u32)>,
}

/// Times the RAG stages and samples the process' CPU and memory after each one.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    pid: Option<Pid>,
    started: Instant,
    state: Option<Mutex<MonitorState>>,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(pid),
                Err(e) => {
                    tracing::warn!("Process monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let now = Instant::now();
        let state = enabled.then(|| {
            Mutex::new(MonitorState {
                system: System::new(),
                last_checkpoint: now,
                peak_memory_mb: 0,
                stage_totals: Vec::new(),
            })
        });

        Self {
            pid,
            started: now,
            state,
        }
    }

    /// Marks the start of the first stage of an operation, so idle time
    /// since the previous checkpoint is not attributed to it.
    pub fn start_stage(&self) {
        if let Some(mut state) = self.state.as_ref().and_then(|s| s.lock().ok()) {
            state.last_checkpoint = Instant::now();
        }
    }

    /// Closes the current stage and samples the process.
    pub fn checkpoint(&self, stage: &str) -> Option<StageStats> {
        let mut state = self.state.as_ref()?.lock().ok()?;
        let stage_time = state.last_checkpoint.elapsed();
        state.last_checkpoint = Instant::now();

        match state.stage_totals.iter_mut().find(|(name, _, _)| name == stage) {
            Some((_, total, runs)) => {
                *total += stage_time;
                *runs += 1;
            }
            None => state.stage_totals.push((stage.to_string(), stage_time, 1)),
        }

        let (cpu_usage, memory_mb) = match self.pid {
            Some(pid) => {
                state.system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu().with_memory(),
                );
                state
                    .system
                    .process(pid)
                    .map(|p| (p.cpu_usage(), p.memory() / 1024 / 1024))
                    .unwrap_or((0.0, 0))
            }
            None => (0.0, 0),
        };
        state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);

        Some(StageStats {
            stage: stage.to_string(),
            stage_time,
            cpu_usage,
            memory_mb,
            peak_memory_mb: state.peak_memory_mb,
        })
    }

    pub fn log_stats(&self, stage: &str) {
        if let Some(stats) = self.checkpoint(stage) {
            tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                stats.stage,
                stats.stage_time,
                stats.cpu_usage,
                stats.memory_mb,
                stats.peak_memory_mb
            );
        }
    }

    /// Per-stage totals since the monitor was created.
    pub fn log_final_stats(&self) {
        let Some(state) = self.state.as_ref().and_then(|s| s.lock().ok()) else {
            return;
        };
        for (stage, total, runs) in &state.stage_totals {
            tracing::info!("📊 {}: {} run(s), {:?} total", stage, runs, total);
        }
        tracing::info!(
            "📊 Session time: {:?}, Peak Memory: {}MB",
            self.started.elapsed(),
            state.peak_memory_mb
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn start_stage(&self) {}

    pub fn log_stats(&self, _stage: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.checkpoint("Extract").is_none());
    }

    #[test]
    fn test_checkpoints_accumulate_per_stage() {
        let monitor = SystemMonitor::new(true);
        assert!(monitor.is_enabled());

        let first = monitor.checkpoint("Retrieve").unwrap();
        monitor.checkpoint("Generate").unwrap();
        let again = monitor.checkpoint("Retrieve").unwrap();
        assert_eq!(first.stage, "Retrieve");
        assert!(again.peak_memory_mb >= first.peak_memory_mb);

        let state = monitor.state.as_ref().unwrap().lock().unwrap();
        let retrieve = state
            .stage_totals
            .iter()
            .find(|(name, _, _)| name == "Retrieve")
            .unwrap();
        assert_eq!(retrieve.2, 2);
        assert_eq!(state.stage_totals.len(), 2);
    }

    #[test]
    fn test_idle_time_before_stage_is_not_counted() {
        let monitor = SystemMonitor::new(true);
        monitor.checkpoint("Generate").unwrap();

        std::thread::sleep(Duration::from_millis(300));
        monitor.start_stage();
        let retrieve = monitor.checkpoint("Retrieve").unwrap();

        assert!(retrieve.stage_time < Duration::from_millis(300));
    }
}
