//! The `progress` port defines [`ProgressSink`], the structured progress-reporting interface the
//! pipeline driver calls between batches, plus a `tracing`-backed adapter for non-interactive
//! runs and an `indicatif`-backed adapter for interactive ones.
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A snapshot of one stage's progress, reported after each batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageProgress {
    /// The stage name, e.g. `"l2_conservative"`.
    pub stage: &'static str,
    /// The batch index within the stage, starting at zero.
    pub batch: usize,
    /// Documents processed so far in this stage.
    pub processed: usize,
    /// Documents processed in total across the whole stage.
    pub total: usize,
    /// Documents matched (Accept or Review) so far.
    pub matched: usize,
    /// Documents flagged for manual review so far.
    pub review: usize,
    /// Documents rejected so far.
    pub rejected: usize,
    /// Wall-clock elapsed since the stage started.
    pub elapsed: Duration,
}

/// Receives progress updates from the pipeline driver. Kept separate from logging: a
/// `ProgressSink` reports structured, machine-checkable counts, whereas `tracing` events carry
/// free-form diagnostic detail.
pub trait ProgressSink: Send + Sync {
    /// Called once when a stage begins, with the total document count it will process.
    fn start_stage(&self, stage: &'static str, total: usize);

    /// Called after each batch completes within a stage.
    fn report(&self, progress: StageProgress);

    /// Called once when a stage finishes.
    fn finish_stage(&self, stage: &'static str);
}

/// A [`ProgressSink`] that emits one `tracing` event per call, for non-interactive runs (CI,
/// piped output) where an `indicatif` bar would just add escape-code noise to the log.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn start_stage(&self, stage: &'static str, total: usize) {
        tracing::info!(stage, total, "stage started");
    }

    fn report(&self, progress: StageProgress) {
        tracing::info!(
            stage = progress.stage,
            batch = progress.batch,
            processed = progress.processed,
            total = progress.total,
            matched = progress.matched,
            review = progress.review,
            rejected = progress.rejected,
            elapsed_ms = progress.elapsed.as_millis() as u64,
            "batch complete"
        );
    }

    fn finish_stage(&self, stage: &'static str) {
        tracing::info!(stage, "stage finished");
    }
}

/// A [`ProgressSink`] backed by an `indicatif` bar, for interactive CLI runs. Mirrors the
/// `ProgressStyle::with_template` usage a `clap`-driven CLI typically reaches for.
pub struct IndicatifProgressSink {
    bar: Mutex<Option<ProgressBar>>,
    started_at: Mutex<Option<Instant>>,
}

impl Default for IndicatifProgressSink {
    fn default() -> Self {
        Self {
            bar: Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }
}

impl ProgressSink for IndicatifProgressSink {
    fn start_stage(&self, stage: &'static str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .expect("valid progress template")
            .progress_chars("##-"),
        );
        bar.set_prefix(stage);
        *self.bar.lock().expect("progress bar lock poisoned") = Some(bar);
        *self.started_at.lock().expect("progress bar lock poisoned") = Some(Instant::now());
    }

    fn report(&self, progress: StageProgress) {
        if let Some(bar) = self.bar.lock().expect("progress bar lock poisoned").as_ref() {
            bar.set_position(progress.processed as u64);
            bar.set_message(format!(
                "matched {} review {} rejected {}",
                progress.matched, progress.review, progress.rejected
            ));
        }
    }

    fn finish_stage(&self, stage: &'static str) {
        if let Some(bar) = self.bar.lock().expect("progress bar lock poisoned").take() {
            bar.finish_with_message(format!("{stage} done"));
        }
    }
}

/// A [`ProgressSink`] that records every call, for tests that assert on stage sequencing.
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<String>>,
}

impl RecordingProgressSink {
    /// The recorded event log, in call order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("recording sink lock poisoned").clone()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn start_stage(&self, stage: &'static str, total: usize) {
        self.events
            .lock()
            .expect("recording sink lock poisoned")
            .push(format!("start:{stage}:{total}"));
    }

    fn report(&self, progress: StageProgress) {
        self.events
            .lock()
            .expect("recording sink lock poisoned")
            .push(format!("report:{}:{}", progress.stage, progress.processed));
    }

    fn finish_stage(&self, stage: &'static str) {
        self.events
            .lock()
            .expect("recording sink lock poisoned")
            .push(format!("finish:{stage}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_call_order() {
        let sink = RecordingProgressSink::default();
        sink.start_stage("l1_deterministic", 10);
        sink.report(StageProgress {
            stage: "l1_deterministic",
            batch: 0,
            processed: 5,
            total: 10,
            matched: 4,
            review: 0,
            rejected: 1,
            elapsed: Duration::from_millis(10),
        });
        sink.finish_stage("l1_deterministic");

        assert_eq!(
            sink.events(),
            vec![
                "start:l1_deterministic:10".to_string(),
                "report:l1_deterministic:5".to_string(),
                "finish:l1_deterministic".to_string(),
            ]
        );
    }
}
