// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per logged training step to
// <save_dir>/metrics.csv, mirroring the log line:
//
//   global_step,epoch,batch,loss,avg_loss,accuracy,step_accuracy,lr,speed
//   10,1,10,0.693100,0.701200,0.512500,0.562500,0.00000500,4.21
//
// avg_loss and accuracy are running values since the start of
// the run; loss and step_accuracy belong to the logged batch
// alone. speed is optimizer steps per second since the previous
// row. An existing file is appended to, so a resumed
// run continues the same log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const METRICS_FILE: &str = "metrics.csv";
const HEADER: &str = "global_step,epoch,batch,loss,avg_loss,accuracy,step_accuracy,lr,speed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub global_step:   usize,
    pub epoch:         usize,
    /// 1-based batch index within the epoch
    pub batch:         usize,
    pub loss:          f64,
    pub avg_loss:      f64,
    pub accuracy:      f64,
    pub step_accuracy: f64,
    pub lr:            f64,
    pub speed:         f64,
}

impl StepMetrics {
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.8},{:.2}",
            self.global_step, self.epoch, self.batch, self.loss,
            self.avg_loss, self.accuracy, self.step_accuracy, self.lr, self.speed,
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `<dir>/metrics.csv`, writing the header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.to_csv_row())?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: usize) -> StepMetrics {
        StepMetrics {
            global_step: step,
            epoch:       1,
            batch:       step,
            loss:        0.5,
            avg_loss:    0.75,
            accuracy:    0.25,
            step_accuracy: 0.5,
            lr:          5e-5,
            speed:       3.0,
        }
    }

    #[test]
    fn test_header_then_rows() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&row(10)).unwrap();
        logger.log(&row(20)).unwrap();

        let csv = fs::read_to_string(dir.path().join(METRICS_FILE)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "10,1,10,0.500000,0.750000,0.250000,0.500000,0.00005000,3.00");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_reopening_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&row(1)).unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&row(2)).unwrap();

        let csv = fs::read_to_string(dir.path().join(METRICS_FILE)).unwrap();
        assert_eq!(csv.lines().filter(|l| *l == HEADER).count(), 1);
        assert_eq!(csv.lines().count(), 3);
    }
}
