//! Host resource sampling for saturation reports.

use parking_lot::Mutex;
use sysinfo::System;

/// Source of host CPU and RAM utilization, in percent.
///
/// Sampled only when a response is being built, never while executor locks
/// are held.
pub trait HostSampler: Send + Sync {
    /// Current CPU utilization, if known.
    fn cpu_utilization(&self) -> Option<f64>;
    /// Current RAM utilization, if known.
    fn ram_utilization(&self) -> Option<f64>;
}

/// Sampler that reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHostSampler;

impl HostSampler for NoopHostSampler {
    fn cpu_utilization(&self) -> Option<f64> {
        None
    }

    fn ram_utilization(&self) -> Option<f64> {
        None
    }
}

/// Fixed readings, handy for tests and dashboards fed from elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticHostSampler {
    /// Reported CPU utilization.
    pub cpu: f64,
    /// Reported RAM utilization.
    pub ram: f64,
}

impl HostSampler for StaticHostSampler {
    fn cpu_utilization(&self) -> Option<f64> {
        Some(self.cpu)
    }

    fn ram_utilization(&self) -> Option<f64> {
        Some(self.ram)
    }
}

/// Live host readings from `sysinfo`.
///
/// CPU usage is measured since the previous sample (or since construction
/// for the first one), so sampling never sleeps on the response path.
pub struct SysinfoHostSampler {
    system: Mutex<System>,
}

impl SysinfoHostSampler {
    /// Create a sampler and take the CPU baseline.
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoHostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoHostSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoHostSampler").finish_non_exhaustive()
    }
}

impl HostSampler for SysinfoHostSampler {
    fn cpu_utilization(&self) -> Option<f64> {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        percent(f64::from(system.global_cpu_usage()))
    }

    #[allow(clippy::cast_precision_loss)]
    fn ram_utilization(&self) -> Option<f64> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        percent(system.used_memory() as f64 / total as f64 * 100.0)
    }
}

fn percent(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_sampler_reports_percentages() {
        let sampler = SysinfoHostSampler::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        let cpu = sampler.cpu_utilization().expect("cpu reading");
        let ram = sampler.ram_utilization().expect("ram reading");
        assert!((0.0..=100.0).contains(&cpu), "cpu out of range: {cpu}");
        assert!((0.0..=100.0).contains(&ram), "ram out of range: {ram}");
        assert!(ram > 0.0);
    }

    #[test]
    fn test_percent_rejects_non_finite() {
        assert_eq!(percent(f64::NAN), None);
        assert_eq!(percent(140.0), Some(100.0));
        assert_eq!(percent(-1.0), Some(0.0));
    }
}
