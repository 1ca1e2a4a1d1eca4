// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zip bundling of batch outputs.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use wandelwerk_core::Blob;
use wandelwerk_core::error::{Result, WandelError};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::batch::NamedOutput;

pub const ZIP_MIME: &str = "application/zip";

/// How entries inside an archive are named.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "prefix", rename_all = "kebab-case")]
pub enum NamingStrategy {
    /// Keep each output's own name.
    #[default]
    Original,
    /// `file-1.png`, `file-2.jpg`, ... in input order.
    Sequential,
    /// Original stem with the archive time appended.
    Timestamp,
    /// Original name behind a fixed prefix.
    CustomPrefix(String),
}

/// Entry names for `names` under `strategy`. Collisions get `-2`, `-3`, ...
/// before the extension.
pub fn entry_names(names: &[&str], strategy: &NamingStrategy, now: DateTime<Local>) -> Vec<String> {
    let stamp = now.format("%Y%m%d-%H%M%S").to_string();
    let mut taken = HashSet::new();

    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = sanitize_entry_name(name, index);
            let (stem, extension) = split_extension(&name);
            let candidate = match strategy {
                NamingStrategy::Original => name.clone(),
                NamingStrategy::Sequential => join(&format!("file-{}", index + 1), extension),
                NamingStrategy::Timestamp => join(&format!("{}_{}", stem, stamp), extension),
                NamingStrategy::CustomPrefix(prefix) => {
                    format!("{}{}", sanitize_prefix(prefix), name)
                }
            };
            unique_name(candidate, &mut taken)
        })
        .collect()
}

/// Bundle outputs into one zip, in the order given.
#[instrument(skip(outputs), fields(entries = outputs.len()))]
pub fn build_zip(outputs: &[NamedOutput], strategy: &NamingStrategy) -> Result<Vec<u8>> {
    let names: Vec<&str> = outputs.iter().map(|output| output.name.as_str()).collect();
    let entry_names = entry_names(&names, strategy, Local::now());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (output, entry_name) in outputs.iter().zip(&entry_names) {
        zip.start_file(entry_name.as_str(), options).map_err(|err| {
            WandelError::Archive(format!("cannot add {}: {}", entry_name, err))
        })?;
        zip.write_all(&output.blob.bytes)?;
        debug!(entry = %entry_name, bytes = output.blob.len(), "Archive entry written");
    }

    let buffer = zip
        .finish()
        .map_err(|err| WandelError::Archive(format!("cannot finalise zip: {}", err)))?
        .into_inner();
    info!(archive_bytes = buffer.len(), "Archive created");
    Ok(buffer)
}

/// Pack the several outputs of one file (split parts, page images) into a
/// single zip blob named `{stem}-{n}.{ext}` per part.
pub fn bundle_parts(stem: &str, parts: Vec<Blob>) -> Result<Blob> {
    let outputs: Vec<NamedOutput> = parts
        .into_iter()
        .enumerate()
        .map(|(index, blob)| {
            let extension = wandelwerk_core::OutputFormat::from_mime(&blob.mime_type)
                .map(|format| format.extension())
                .unwrap_or("bin");
            NamedOutput {
                name: format!("{}-{}.{}", stem, index + 1, extension),
                blob,
            }
        })
        .collect();
    Ok(Blob::new(
        build_zip(&outputs, &NamingStrategy::Original)?,
        ZIP_MIME,
    ))
}

/// Strip directories and dot-names so entries cannot escape the archive root.
fn sanitize_entry_name(name: &str, index: usize) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("output-{}", index + 1))
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix.replace(['/', '\\'], "_")
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    }
}

fn join(stem: &str, extension: Option<&str>) -> String {
    match extension {
        Some(extension) => format!("{}.{}", stem, extension),
        None => stem.to_string(),
    }
}

fn unique_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let (stem, extension) = split_extension(&candidate);
    let mut counter = 2;
    loop {
        let next = join(&format!("{}-{}", stem, counter), extension);
        if taken.insert(next.clone()) {
            return next;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 3).unwrap()
    }

    fn output(name: &str, bytes: &[u8]) -> NamedOutput {
        NamedOutput {
            name: name.into(),
            blob: Blob::new(bytes.to_vec(), "image/png"),
        }
    }

    #[test]
    fn naming_strategies() {
        let names = ["cat.png", "dog.jpg"];
        assert_eq!(
            entry_names(&names, &NamingStrategy::Sequential, fixed_time()),
            vec!["file-1.png", "file-2.jpg"]
        );
        assert_eq!(
            entry_names(&names, &NamingStrategy::Timestamp, fixed_time()),
            vec!["cat_20261019-080503.png", "dog_20261019-080503.jpg"]
        );
        assert_eq!(
            entry_names(
                &names,
                &NamingStrategy::CustomPrefix("holiday-".into()),
                fixed_time()
            ),
            vec!["holiday-cat.png", "holiday-dog.jpg"]
        );
    }

    #[test]
    fn duplicates_and_paths_are_made_safe() {
        let names = ["a.png", "a.png", "../../etc/a.png", ""];
        assert_eq!(
            entry_names(&names, &NamingStrategy::Original, fixed_time()),
            vec!["a.png", "a-2.png", "a-3.png", "output-4"]
        );
    }

    #[test]
    fn archive_keeps_input_order_and_bytes() {
        let outputs = vec![output("z.png", b"zzz"), output("a.png", b"aaa")];
        let bytes = build_zip(&outputs, &NamingStrategy::Original).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "z.png");
        let mut content = Vec::new();
        first.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"zzz");
        drop(first);
        assert_eq!(archive.by_index(1).unwrap().name(), "a.png");
    }

    #[test]
    fn parts_are_numbered() {
        let blob = bundle_parts(
            "report",
            vec![
                Blob::new(b"%PDF-1".to_vec(), "application/pdf"),
                Blob::new(b"%PDF-2".to_vec(), "application/pdf"),
            ],
        )
        .unwrap();
        assert_eq!(blob.mime_type, ZIP_MIME);
        let archive = zip::ZipArchive::new(Cursor::new(blob.bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"report-1.pdf"));
        assert!(names.contains(&"report-2.pdf"));
    }

    #[test]
    fn strategy_deserializes() {
        let strategy: NamingStrategy =
            serde_json::from_str(r#"{"strategy": "custom-prefix", "prefix": "x_"}"#).unwrap();
        assert_eq!(strategy, NamingStrategy::CustomPrefix("x_".into()));
        let strategy: NamingStrategy =
            serde_json::from_str(r#"{"strategy": "sequential"}"#).unwrap();
        assert_eq!(strategy, NamingStrategy::Sequential);
    }
}
