// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch runner.
//
// Files are processed one at a time, in input order. Each pipeline call runs
// on tokio's blocking pool while a ticker advances the file's progress in
// fixed steps; every state change is sent to the caller as a `FileUpdate`.
// Pause takes effect between files. Stop abandons the in-flight call, puts
// that file back to pending and ends the run with `Cancelled`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, EngineConfig, FileUpdate, SourceFile};

use crate::batch::{Batch, NamedOutput};
use crate::control::{RunControl, RunState, wait_while_paused};
use crate::tools::FileProcessor;

/// Channel half that receives per-file status updates.
pub type UpdateSender = mpsc::UnboundedSender<FileUpdate>;

/// Counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives a batch through a `FileProcessor`.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    progress_step: u8,
    tick: Duration,
    control: RunControl,
}

enum Step {
    Finished(Result<Blob>),
    Stopped,
}

impl BatchRunner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            progress_step: config.progress_step,
            tick: Duration::from_millis(config.progress_tick_ms.max(1)),
            control: RunControl::new(),
        }
    }

    /// Handle for pausing, resuming and stopping runs of this runner.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Process every file in the batch. Files finished by an earlier run are
    /// processed again and their old output replaced.
    #[instrument(skip_all, fields(tool = processor.name(), files = batch.len()))]
    pub async fn process(
        &self,
        batch: &mut Batch,
        processor: Arc<dyn FileProcessor>,
        updates: Option<UpdateSender>,
    ) -> Result<RunReport> {
        if batch.is_processing() {
            return Err(WandelError::Busy);
        }
        let required = processor.min_files();
        if batch.len() < required {
            return Err(WandelError::Precondition(format!(
                "{} needs at least {} files, got {}",
                processor.name(),
                required,
                batch.len()
            )));
        }
        if self.control.state() == RunState::Stopped {
            self.control.reset();
        }

        batch.set_processing(true);
        let result = if processor.is_combining() {
            self.run_combined(batch, processor, updates.as_ref()).await
        } else {
            self.run_each(batch, processor, updates.as_ref()).await
        };
        batch.set_processing(false);

        match &result {
            Ok(report) => info!(
                processed = report.processed,
                succeeded = report.succeeded,
                failed = report.failed,
                "Batch run finished"
            ),
            Err(err) => warn!(%err, "Batch run ended early"),
        }
        result
    }

    async fn run_each(
        &self,
        batch: &mut Batch,
        processor: Arc<dyn FileProcessor>,
        updates: Option<&UpdateSender>,
    ) -> Result<RunReport> {
        let mut control = self.control.subscribe();
        let mut report = RunReport::default();

        for index in 0..batch.len() {
            if *control.borrow() == RunState::Paused {
                info!("Run paused");
            }
            if wait_while_paused(&mut control).await == RunState::Stopped {
                info!(remaining = batch.len() - index, "Run stopped before next file");
                return Err(WandelError::Cancelled);
            }

            let source = batch.items()[index].source.clone();
            let item = batch.item_mut(index);
            item.state.start();
            send(updates, FileUpdate::of(source.id(), &item.state));
            debug!(name = source.name(), "Processing file");

            let worker = Arc::clone(&processor);
            let job_source = source.clone();
            let step = self
                .supervise(
                    batch,
                    index,
                    &mut control,
                    updates,
                    tokio::task::spawn_blocking(move || worker.process(&job_source)),
                )
                .await;

            let item = batch.item_mut(index);
            match step {
                Step::Finished(Ok(blob)) => {
                    debug!(name = source.name(), output_bytes = blob.len(), "File completed");
                    item.state.complete(blob);
                    report.succeeded += 1;
                }
                Step::Finished(Err(err)) => {
                    warn!(name = source.name(), %err, "File failed");
                    item.state.fail(err.to_string());
                    report.failed += 1;
                }
                Step::Stopped => {
                    item.state.reset();
                    send(updates, FileUpdate::of(source.id(), &item.state));
                    info!(name = source.name(), "Run stopped mid-file");
                    return Err(WandelError::Cancelled);
                }
            }
            report.processed += 1;
            send(updates, FileUpdate::of(source.id(), &item.state));
        }
        Ok(report)
    }

    /// Atomic multi-input run: every file shares one outcome.
    async fn run_combined(
        &self,
        batch: &mut Batch,
        processor: Arc<dyn FileProcessor>,
        updates: Option<&UpdateSender>,
    ) -> Result<RunReport> {
        let mut control = self.control.subscribe();
        if wait_while_paused(&mut control).await == RunState::Stopped {
            return Err(WandelError::Cancelled);
        }

        batch.set_combined(None);
        let sources: Vec<SourceFile> = batch.items().iter().map(|item| item.source.clone()).collect();
        for index in 0..batch.len() {
            let item = batch.item_mut(index);
            item.state.start();
            send(updates, FileUpdate::of(item.source.id(), &item.state));
        }
        info!(files = sources.len(), "Combining files");

        let worker = Arc::clone(&processor);
        let job_sources = sources.clone();
        let step = self
            .supervise_all(
                batch,
                &mut control,
                updates,
                tokio::task::spawn_blocking(move || worker.combine(&job_sources)),
            )
            .await;

        let mut report = RunReport {
            processed: sources.len(),
            ..Default::default()
        };
        match step {
            Step::Finished(Ok(blob)) => {
                batch.set_combined(Some(NamedOutput {
                    name: processor.combined_name(),
                    blob,
                }));
                for index in 0..batch.len() {
                    batch.item_mut(index).state.complete_without_output();
                }
                report.succeeded = sources.len();
            }
            Step::Finished(Err(err)) => {
                error!(%err, "Combined run failed");
                let message = err.to_string();
                for index in 0..batch.len() {
                    batch.item_mut(index).state.fail(message.clone());
                }
                report.failed = sources.len();
            }
            Step::Stopped => {
                for index in 0..batch.len() {
                    batch.item_mut(index).state.reset();
                }
                for item in batch.items() {
                    send(updates, FileUpdate::of(item.source.id(), &item.state));
                }
                return Err(WandelError::Cancelled);
            }
        }
        for item in batch.items() {
            send(updates, FileUpdate::of(item.source.id(), &item.state));
        }
        Ok(report)
    }

    /// Wait for one file's job, ticking its progress, until it finishes or
    /// the run is stopped.
    async fn supervise(
        &self,
        batch: &mut Batch,
        index: usize,
        control: &mut watch::Receiver<RunState>,
        updates: Option<&UpdateSender>,
        job: tokio::task::JoinHandle<Result<Blob>>,
    ) -> Step {
        self.supervise_indices(batch, &[index], control, updates, job)
            .await
    }

    async fn supervise_all(
        &self,
        batch: &mut Batch,
        control: &mut watch::Receiver<RunState>,
        updates: Option<&UpdateSender>,
        job: tokio::task::JoinHandle<Result<Blob>>,
    ) -> Step {
        let indices: Vec<usize> = (0..batch.len()).collect();
        self.supervise_indices(batch, &indices, control, updates, job)
            .await
    }

    async fn supervise_indices(
        &self,
        batch: &mut Batch,
        indices: &[usize],
        control: &mut watch::Receiver<RunState>,
        updates: Option<&UpdateSender>,
        mut job: tokio::task::JoinHandle<Result<Blob>>,
    ) -> Step {
        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        let mut control_open = true;

        loop {
            tokio::select! {
                joined = &mut job => {
                    return Step::Finished(joined.unwrap_or_else(|err| {
                        Err(WandelError::Encode(format!("processing task failed: {}", err)))
                    }));
                }
                _ = ticker.tick() => {
                    for &index in indices {
                        let item = batch.item_mut(index);
                        let next = item.state.progress.saturating_add(self.progress_step);
                        item.state.advance(next);
                        send(updates, FileUpdate::of(item.source.id(), &item.state));
                    }
                }
                changed = control.changed(), if control_open => {
                    if changed.is_err() {
                        control_open = false;
                        continue;
                    }
                    if *control.borrow_and_update() == RunState::Stopped {
                        // The blocking task cannot be interrupted; its result is discarded.
                        job.abort();
                        return Step::Stopped;
                    }
                }
            }
        }
    }
}

fn send(updates: Option<&UpdateSender>, update: FileUpdate) {
    if let Some(sender) = updates {
        if sender.send(update).is_err() {
            debug!("Update receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::IntakePolicy;
    use crate::tools::{ImageToolProcessor, PdfToolProcessor, ProcessFn};
    use image::{DynamicImage, Rgba, RgbaImage};
    use wandelwerk_core::{FileStatus, ImageTool, ProcessingOptions};
    use wandelwerk_document::{ImagePipeline, ImageProcessor, PdfOperation, PdfPipeline, PdfWriter};

    fn config() -> EngineConfig {
        EngineConfig {
            progress_tick_ms: 5,
            progress_step: 10,
            ..Default::default()
        }
    }

    fn png(name: &str) -> SourceFile {
        let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            40,
            30,
            Rgba([90, 60, 30, 255]),
        )))
        .to_png_bytes()
        .unwrap();
        SourceFile::new(name, "image/png", bytes)
    }

    fn pdf(name: &str) -> SourceFile {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])));
        SourceFile::new(
            name,
            "application/pdf",
            PdfWriter::a4().create_from_images(&[page]).unwrap(),
        )
    }

    fn batch_of(files: Vec<SourceFile>) -> Batch {
        let mut batch = Batch::new(IntakePolicy::default());
        for file in files {
            batch.add(file).unwrap();
        }
        batch
    }

    fn compressor() -> Arc<dyn FileProcessor> {
        Arc::new(
            ImageToolProcessor::new(
                ImagePipeline::new(&config()),
                ImageTool::Compress,
                ProcessingOptions::default(),
            )
            .unwrap(),
        )
    }

    /// Processor that sleeps, so control signals land mid-file.
    fn slow(delay_ms: u64) -> Arc<dyn FileProcessor> {
        Arc::new(ProcessFn::new("slow", move |source: &SourceFile| {
            std::thread::sleep(Duration::from_millis(delay_ms));
            Ok(Blob::new(source.bytes().to_vec(), source.mime_type()))
        }))
    }

    #[tokio::test]
    async fn corrupt_file_fails_alone() {
        let corrupt = SourceFile::new("broken.png", "image/png", b"not a png".to_vec());
        let mut batch = batch_of(vec![png("one.png"), corrupt, png("three.png")]);
        let runner = BatchRunner::new(&config());

        let report = runner.process(&mut batch, compressor(), None).await.unwrap();

        assert_eq!(report, RunReport { processed: 3, succeeded: 2, failed: 1 });
        let statuses: Vec<FileStatus> = batch.items().iter().map(|i| i.state.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Completed, FileStatus::Error, FileStatus::Completed]
        );
        let outputs = batch.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].name, "one.jpg");
        assert_eq!(outputs[1].name, "three.jpg");
        assert_eq!(batch.errors().len(), 1);
        assert!(batch.errors()[0].message.starts_with("could not decode input"));
        assert!(!batch.is_processing());
    }

    #[tokio::test]
    async fn progress_updates_are_monotonic_per_file() {
        let mut batch = batch_of(vec![png("a.png"), png("b.png")]);
        let runner = BatchRunner::new(&config());
        let (sender, mut receiver) = mpsc::unbounded_channel::<FileUpdate>();

        runner.process(&mut batch, slow(40), Some(sender)).await.unwrap();

        let mut last = std::collections::HashMap::new();
        let mut saw_intermediate = false;
        while let Ok(update) = receiver.try_recv() {
            let previous = last.insert(update.id, update.progress).unwrap_or(0);
            assert!(update.progress >= previous, "progress went backwards");
            if update.progress < 100 {
                assert_ne!(update.status, FileStatus::Completed);
            }
            if update.progress > 0 && update.progress < 100 {
                saw_intermediate = true;
            }
        }
        assert!(saw_intermediate);
        assert!(last.values().all(|&progress| progress == 100));
    }

    #[tokio::test]
    async fn merge_needs_two_files_before_any_transition() {
        let mut batch = batch_of(vec![pdf("only.pdf")]);
        let runner = BatchRunner::new(&config());
        let merge = Arc::new(PdfToolProcessor::new(
            PdfPipeline::new(&config()),
            PdfOperation::Merge {
                bookmarks: true,
                copy_metadata: true,
            },
        ));

        let err = runner.process(&mut batch, merge, None).await.unwrap_err();
        assert!(matches!(err, WandelError::Precondition(_)));
        assert_eq!(batch.items()[0].state.status, FileStatus::Pending);
    }

    #[tokio::test]
    async fn merge_output_lives_on_the_batch() {
        let mut batch = batch_of(vec![pdf("a.pdf"), pdf("b.pdf")]);
        let runner = BatchRunner::new(&config());
        let merge = Arc::new(PdfToolProcessor::new(
            PdfPipeline::new(&config()),
            PdfOperation::Merge {
                bookmarks: false,
                copy_metadata: false,
            },
        ));

        let report = runner.process(&mut batch, merge, None).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(batch.items().iter().all(|i| i.state.status == FileStatus::Completed));
        let outputs = batch.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "merged.pdf");
    }

    #[tokio::test]
    async fn merge_with_corrupt_input_fails_every_file() {
        let corrupt = SourceFile::new("bad.pdf", "application/pdf", b"%PDF-garbage".to_vec());
        let mut batch = batch_of(vec![pdf("a.pdf"), corrupt]);
        let runner = BatchRunner::new(&config());
        let merge = Arc::new(PdfToolProcessor::new(
            PdfPipeline::new(&config()),
            PdfOperation::Merge {
                bookmarks: true,
                copy_metadata: true,
            },
        ));

        let report = runner.process(&mut batch, merge, None).await.unwrap();
        assert_eq!(report.failed, 2);
        assert!(batch.combined().is_none());
        assert!(batch.outputs().is_empty());
    }

    #[tokio::test]
    async fn stop_resets_in_flight_file_and_keeps_completed_ones() {
        let mut batch = batch_of(vec![png("a.png"), png("b.png"), png("c.png")]);
        let runner = BatchRunner::new(&config());
        let control = runner.control();
        let (sender, mut receiver) = mpsc::unbounded_channel::<FileUpdate>();

        let watcher = tokio::spawn(async move {
            // Stop once the second file starts.
            let mut started = 0;
            while let Some(update) = receiver.recv().await {
                if update.status == FileStatus::Processing && update.progress == 0 {
                    started += 1;
                    if started == 2 {
                        control.stop();
                    }
                }
            }
        });

        let err = runner.process(&mut batch, slow(60), Some(sender)).await.unwrap_err();
        assert!(matches!(err, WandelError::Cancelled));
        watcher.await.unwrap();

        let statuses: Vec<FileStatus> = batch.items().iter().map(|i| i.state.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Completed, FileStatus::Pending, FileStatus::Pending]
        );
        assert_eq!(batch.items()[1].state.progress, 0);
        assert_eq!(batch.outputs().len(), 1);
        assert!(!batch.is_processing());

        // A later run starts over from the first file.
        let report = runner.process(&mut batch, slow(1), None).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(batch.outputs().len(), 3);
    }

    #[tokio::test]
    async fn rerun_replaces_previous_output() {
        let mut batch = batch_of(vec![png("a.png")]);
        let runner = BatchRunner::new(&config());
        let returning = |text: &'static str| -> Arc<dyn FileProcessor> {
            Arc::new(ProcessFn::new("fixed", move |_: &SourceFile| {
                Ok(Blob::new(text.as_bytes().to_vec(), "text/plain"))
            }))
        };

        runner.process(&mut batch, returning("first"), None).await.unwrap();
        let report = runner.process(&mut batch, returning("second"), None).await.unwrap();

        assert_eq!(report, RunReport { processed: 1, succeeded: 1, failed: 0 });
        let outputs = batch.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].blob.bytes.as_slice(), b"second");
    }

    #[tokio::test]
    async fn paused_run_waits_for_resume() {
        let mut batch = batch_of(vec![png("a.png"), png("b.png")]);
        let runner = BatchRunner::new(&config());
        let control = runner.control();
        control.pause();

        let resumer = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            resumer.resume();
        });

        let started = std::time::Instant::now();
        let report = runner.process(&mut batch, slow(1), None).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn pause_lets_the_in_flight_file_finish() {
        let mut batch = batch_of(vec![png("a.png"), png("b.png")]);
        let runner = BatchRunner::new(&config());
        let control = runner.control();
        let (sender, mut receiver) = mpsc::unbounded_channel::<FileUpdate>();

        let watcher = tokio::spawn(async move {
            let mut statuses_while_paused = Vec::new();
            while let Some(update) = receiver.recv().await {
                if control.state() == RunState::Running && update.status == FileStatus::Processing {
                    control.pause();
                    let resumer = control.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        resumer.resume();
                    });
                    continue;
                }
                if control.state() == RunState::Paused {
                    statuses_while_paused.push(update.status);
                }
            }
            statuses_while_paused
        });

        let report = runner.process(&mut batch, slow(30), Some(sender)).await.unwrap();
        assert_eq!(report.succeeded, 2);
        let statuses = watcher.await.unwrap();
        assert!(statuses.contains(&FileStatus::Completed));
        assert!(!statuses.contains(&FileStatus::Pending));
    }
}
