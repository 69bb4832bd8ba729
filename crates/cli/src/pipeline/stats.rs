//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::DispatchReport;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Producers that were started
    pub producers: Vec<String>,

    /// Ingestion counters at shutdown
    pub ingestion: ingestion::MetricsSnapshot,

    /// Dispatcher counters at shutdown
    pub dispatch: DispatchReport,

    /// First producer failure, `None` on a requested shutdown
    pub failure: Option<String>,
}

impl PipelineStats {
    /// Records placed on the queue per minute
    pub fn records_per_minute(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.ingestion.records_emitted as f64 * 60.0 / secs
        } else {
            0.0
        }
    }

    /// Share of sink deliveries suppressed by rate limiting, as percentage
    pub fn suppression_rate(&self) -> f64 {
        let (forwarded, suppressed) = self
            .dispatch
            .sinks
            .iter()
            .fold((0u64, 0u64), |(f, s), (_, m)| {
                (f + m.forwarded_count, s + m.suppressed_count)
            });
        let total = forwarded + suppressed;
        if total > 0 {
            (suppressed as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Energy Logger Statistics                  ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Producers: {}", self.producers.join(", "));
        println!("   ├─ Records emitted: {}", self.ingestion.records_emitted);
        println!("   ├─ Records/min: {:.2}", self.records_per_minute());
        println!("   └─ Records dispatched: {}", self.dispatch.records);

        let ing = &self.ingestion;
        println!("\n📥 Ingestion");
        println!("   ├─ Telegrams: {}", ing.telegrams_received);
        println!("   ├─ Parse errors: {}", ing.parse_errors);
        println!("   ├─ Skipped (zero/empty): {}", ing.validation_skipped);
        println!("   ├─ Poll cycles: {}", ing.poll_cycles);
        println!("   └─ Failed register reads: {}", ing.failed_reads);

        if !self.dispatch.sinks.is_empty() {
            println!(
                "\n📤 Sinks (suppressed {:.2}%)",
                self.suppression_rate()
            );
            for (i, (name, m)) in self.dispatch.sinks.iter().enumerate() {
                let prefix = if i == self.dispatch.sinks.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: forwarded {}, suppressed {}, failed {}",
                    prefix, name, m.forwarded_count, m.suppressed_count, m.failure_count
                );
            }
        }

        if let Some(ref failure) = self.failure {
            println!("\n⚠️  Stopped by producer failure");
            println!("   └─ {}", failure);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher::MetricsSnapshot;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            duration: Duration::from_secs(30),
            ingestion: ingestion::MetricsSnapshot {
                records_emitted: 100,
                ..Default::default()
            },
            dispatch: DispatchReport {
                records: 100,
                sinks: vec![
                    (
                        "mqtt".to_string(),
                        MetricsSnapshot {
                            forwarded_count: 30,
                            suppressed_count: 70,
                            ..Default::default()
                        },
                    ),
                    (
                        "influxdb".to_string(),
                        MetricsSnapshot {
                            forwarded_count: 10,
                            suppressed_count: 90,
                            ..Default::default()
                        },
                    ),
                ],
            },
            ..Default::default()
        };

        assert!((stats.records_per_minute() - 200.0).abs() < 1e-9);
        assert!((stats.suppression_rate() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        let stats = PipelineStats::default();
        assert_eq!(stats.records_per_minute(), 0.0);
        assert_eq!(stats.suppression_rate(), 0.0);
    }
}
