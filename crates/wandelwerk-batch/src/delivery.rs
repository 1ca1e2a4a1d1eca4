// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Handing finished outputs to the caller: one by one on a fixed stagger, or
// as a single zip.

use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};
use wandelwerk_core::Blob;
use wandelwerk_core::error::Result;

use crate::archive::{NamingStrategy, ZIP_MIME, build_zip};
use crate::batch::{Batch, NamedOutput};

/// How a batch's outputs reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "naming", rename_all = "kebab-case")]
pub enum Delivery {
    /// Each output separately, spaced by the stagger delay.
    #[default]
    Individual,
    /// Everything in one zip.
    Archive(NamingStrategy),
}

/// Offset from the start of delivery at which each of `count` items is due.
pub fn stagger_schedule(count: usize, delay: Duration) -> Vec<Duration> {
    (0..count).map(|index| delay * index as u32).collect()
}

/// Feed `outputs` to `sink` in order, item `i` no earlier than `i * delay`
/// after the call. Stops at the first sink error.
#[instrument(skip_all, fields(outputs = outputs.len(), delay_ms = delay.as_millis() as u64))]
pub async fn deliver_staggered<F>(outputs: Vec<NamedOutput>, delay: Duration, mut sink: F) -> Result<usize>
where
    F: FnMut(NamedOutput) -> Result<()>,
{
    let start = Instant::now();
    let schedule = stagger_schedule(outputs.len(), delay);
    let mut delivered = 0;

    for (output, offset) in outputs.into_iter().zip(schedule) {
        sleep_until(start + offset).await;
        debug!(name = %output.name, bytes = output.blob.len(), "Delivering output");
        sink(output)?;
        delivered += 1;
    }
    info!(delivered, "Outputs delivered");
    Ok(delivered)
}

/// Zip every output of `batch` into one named archive.
pub fn archive_outputs(batch: &Batch, strategy: &NamingStrategy) -> Result<NamedOutput> {
    let outputs = batch.outputs();
    let bytes = build_zip(&outputs, strategy)?;
    Ok(NamedOutput {
        name: format!("wandelwerk-{}.zip", Local::now().format("%Y%m%d-%H%M%S")),
        blob: Blob::new(bytes, ZIP_MIME),
    })
}

/// Deliver the batch's outputs the way `delivery` asks.
pub async fn deliver<F>(batch: &Batch, delivery: &Delivery, delay: Duration, mut sink: F) -> Result<usize>
where
    F: FnMut(NamedOutput) -> Result<()>,
{
    let outputs = batch.outputs();
    if outputs.is_empty() {
        warn!("Nothing to deliver");
        return Ok(0);
    }
    match delivery {
        Delivery::Individual => deliver_staggered(outputs, delay, sink).await,
        Delivery::Archive(strategy) => {
            sink(archive_outputs(batch, strategy)?)?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::IntakePolicy;
    use std::io::Cursor;
    use wandelwerk_core::{SourceFile, WandelError};

    fn output(name: &str) -> NamedOutput {
        NamedOutput {
            name: name.into(),
            blob: Blob::new(name.as_bytes().to_vec(), "text/plain"),
        }
    }

    fn finished_batch(names: &[&str]) -> Batch {
        let mut batch = Batch::new(IntakePolicy::default());
        for (index, name) in names.iter().enumerate() {
            batch
                .add(SourceFile::new(*name, "image/png", vec![index as u8]))
                .unwrap();
            let item = batch.item_mut(index);
            item.state.start();
            item.state.complete(Blob::new(vec![index as u8; 4], "image/png"));
        }
        batch
    }

    #[test]
    fn schedule_is_linear() {
        assert_eq!(
            stagger_schedule(3, Duration::from_millis(300)),
            vec![
                Duration::ZERO,
                Duration::from_millis(300),
                Duration::from_millis(600)
            ]
        );
        assert!(stagger_schedule(0, Duration::from_millis(300)).is_empty());
    }

    #[tokio::test]
    async fn staggered_delivery_keeps_order_and_spacing() {
        let start = std::time::Instant::now();
        let mut seen = Vec::new();
        let delivered = deliver_staggered(
            vec![output("a"), output("b"), output("c")],
            Duration::from_millis(25),
            |item| {
                seen.push((item.name, start.elapsed()));
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(delivered, 3);
        let names: Vec<&str> = seen.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(seen[2].1 >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn sink_error_stops_delivery() {
        let mut calls = 0;
        let result = deliver_staggered(vec![output("a"), output("b")], Duration::ZERO, |_| {
            calls += 1;
            Err(WandelError::Io(std::io::Error::other("disk full")))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn archive_mode_yields_one_zip() {
        let batch = finished_batch(&["x.png", "x.png", "y.png"]);
        let mut delivered = Vec::new();
        let count = deliver(
            &batch,
            &Delivery::Archive(NamingStrategy::Original),
            Duration::from_millis(300),
            |item| {
                delivered.push(item);
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(count, 1);
        assert!(delivered[0].name.ends_with(".zip"));
        let archive = zip::ZipArchive::new(Cursor::new(delivered[0].blob.bytes.clone())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(archive.len(), 3);
        assert!(names.contains(&"x-2.png"));
    }

    #[tokio::test]
    async fn empty_batch_delivers_nothing() {
        let batch = Batch::new(IntakePolicy::default());
        let count = deliver(&batch, &Delivery::Individual, Duration::ZERO, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
