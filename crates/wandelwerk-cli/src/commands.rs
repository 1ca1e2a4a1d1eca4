// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command execution. Batch commands load the inputs from disk, run them
// through a `BatchRunner`, report per-file progress on stderr and write the
// outputs (or one zip) to the output directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wandelwerk_batch::{
    Batch, BatchRunner, ConvertProcessor, Delivery, FileProcessor, ImageToolProcessor,
    IntakePolicy, NamedOutput, NamingStrategy, PdfToolProcessor, QrDecodeProcessor, build_zip,
    deliver,
};
use wandelwerk_codes::barcode::validate;
use wandelwerk_codes::qr::{BulkEntry, LogoOverlay};
use wandelwerk_codes::{BarcodeGenerator, BarcodeOptions, CodePipeline, QrEncoder, QrOptions, QrPayload};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::human_errors::humanize_error;
use wandelwerk_core::{
    Blob, EngineConfig, FileId, FileStatus, FileUpdate, ProcessingOptions, SourceFile,
};
use wandelwerk_document::{DocumentConverter, ImagePipeline, PdfPipeline};

use crate::cli::{BarcodeArgs, BatchArgs, Cli, Command, QrArgs, QrBulkArgs};

/// Run the parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(&cli.config)?;

    match cli.command {
        Command::Image(args) => {
            let options = args.processing_options()?;
            let processor =
                ImageToolProcessor::new(ImagePipeline::new(&config), args.tool, options)?;
            run_batch(&config, Arc::new(processor), &args.batch).await
        }
        Command::Pdf(args) => {
            let (operation, batch) = args.operation.into_parts()?;
            let processor = PdfToolProcessor::new(PdfPipeline::new(&config), operation);
            run_batch(&config, Arc::new(processor), &batch).await
        }
        Command::Convert(args) => {
            let converter =
                DocumentConverter::new(ImagePipeline::new(&config), PdfPipeline::new(&config));
            let options = ProcessingOptions {
                quality: args.quality,
                ..Default::default()
            };
            let processor = ConvertProcessor::new(converter, args.to, options);
            run_batch(&config, Arc::new(processor), &args.batch).await
        }
        Command::Inspect { input } => inspect(&config, &input),
        Command::Qr(args) => generate_qr(&args),
        Command::QrBulk(args) => generate_qr_bulk(&args),
        Command::Barcode(args) => generate_barcode(&args),
        Command::Decode { batch } => {
            run_batch(&config, Arc::new(QrDecodeProcessor::new()), &batch).await
        }
        Command::Config { write } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                config.save(&cli.config)?;
                info!(path = %cli.config.display(), "Configuration written");
            }
            Ok(())
        }
    }
}

// -- Batch commands -----------------------------------------------------------

/// Queue `args.inputs`, run `processor` over them and deliver the outputs.
/// Outputs of files that finished before a stop are still written.
pub async fn run_batch(
    config: &EngineConfig,
    processor: Arc<dyn FileProcessor>,
    args: &BatchArgs,
) -> Result<()> {
    let mut batch = Batch::new(IntakePolicy::from_config(config));
    let mut names = HashMap::new();
    for path in &args.inputs {
        let source = read_source(path)?;
        let name = source.name().to_string();
        let id = batch.add(source)?;
        names.insert(id, name);
    }

    let runner = BatchRunner::new(config);
    let control = runner.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            control.stop();
        }
    });

    let (sender, receiver) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_progress(receiver, names));
    let outcome = runner.process(&mut batch, processor, Some(sender)).await;
    interrupt.abort();
    if reporter.await.is_err() {
        debug!("Progress reporter ended abnormally");
    }

    let written = deliver_to_disk(config, &batch, args).await?;
    let summary = batch.summary();
    eprintln!(
        "{} of {} files completed, {} failed, {} output(s) written to {}",
        summary.completed,
        summary.total,
        summary.failed,
        written,
        args.out_dir.display()
    );

    outcome.map(|_| ())
}

async fn deliver_to_disk(config: &EngineConfig, batch: &Batch, args: &BatchArgs) -> Result<usize> {
    std::fs::create_dir_all(&args.out_dir)?;
    let delivery = if args.zip {
        Delivery::Archive(args.naming.clone())
    } else {
        Delivery::Individual
    };
    let delay = if args.stagger {
        Duration::from_millis(config.stagger_delay_ms)
    } else {
        Duration::ZERO
    };
    deliver(batch, &delivery, delay, |output| write_output(&args.out_dir, &output)).await
}

fn write_output(dir: &Path, output: &NamedOutput) -> Result<()> {
    let path = dir.join(&output.name);
    std::fs::write(&path, &output.blob.bytes)?;
    debug!(path = %path.display(), bytes = output.blob.len(), "Output written");
    Ok(())
}

fn read_source(path: &Path) -> Result<SourceFile> {
    let bytes = std::fs::read(path)
        .map_err(|err| WandelError::Validation(format!("cannot read {}: {}", path.display(), err)))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("input")
        .to_string();
    Ok(SourceFile::sniffed(name, bytes))
}

/// Print one line per status change; ticks only go to the debug log.
async fn report_progress(
    mut receiver: mpsc::UnboundedReceiver<FileUpdate>,
    names: HashMap<FileId, String>,
) {
    let mut last = HashMap::new();
    while let Some(update) = receiver.recv().await {
        let name = names.get(&update.id).map(String::as_str).unwrap_or("?");
        if last.insert(update.id, update.status) == Some(update.status) {
            debug!(name, progress = update.progress, "Progress");
            continue;
        }
        match update.status {
            FileStatus::Processing => eprintln!("> {}", name),
            FileStatus::Completed => eprintln!("✓ {}", name),
            FileStatus::Error => {
                let message = update.error.as_deref().unwrap_or("failed");
                eprintln!("✗ {}: {}", name, message);
            }
            FileStatus::Pending => eprintln!("- {} (not processed)", name),
        }
    }
}

// -- Single-shot commands -----------------------------------------------------

fn inspect(config: &EngineConfig, input: &Path) -> Result<()> {
    let source = read_source(input)?;
    let summary = PdfPipeline::new(config).inspect(source.bytes())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn generate_qr(args: &QrArgs) -> Result<()> {
    let payload = match (&args.payload, &args.content) {
        (Some(json), _) => serde_json::from_str::<QrPayload>(json)
            .map_err(|err| WandelError::Validation(format!("invalid QR payload: {}", err)))?,
        (None, Some(content)) => QrPayload::text(content.clone()),
        (None, None) => return Err(WandelError::Validation("nothing to encode".into())),
    };

    let mut options = QrOptions::with_size(args.size)
        .with_margin(args.margin)
        .with_error_correction(args.ec)
        .with_format(args.format);
    options.dark = args.dark.clone();
    options.light = args.light.clone();
    if let Some(path) = &args.logo {
        options = options.with_logo(LogoOverlay::new(std::fs::read(path)?));
    }

    let blob = QrEncoder::new(options).encode_payload(&payload)?;
    write_blob(&args.output, &blob)
}

fn generate_qr_bulk(args: &QrBulkArgs) -> Result<()> {
    let data = std::fs::read_to_string(&args.entries)?;
    let entries: Vec<BulkEntry> = serde_json::from_str(&data).map_err(|err| {
        WandelError::Validation(format!("invalid entries {}: {}", args.entries.display(), err))
    })?;

    let options = QrOptions::with_size(args.size).with_format(args.format);
    let report = CodePipeline::new().bulk(&entries, options);
    for failure in &report.failures {
        eprintln!("✗ entry {} ({}): {}", failure.index + 1, failure.filename, failure.error);
    }

    std::fs::create_dir_all(&args.out_dir)?;
    let outputs: Vec<NamedOutput> = report
        .generated
        .into_iter()
        .map(|code| NamedOutput {
            name: code.filename,
            blob: code.blob,
        })
        .collect();
    if args.zip {
        let bytes = build_zip(&outputs, &NamingStrategy::Original)?;
        std::fs::write(args.out_dir.join("qr-codes.zip"), bytes)?;
    } else {
        for output in &outputs {
            write_output(&args.out_dir, output)?;
        }
    }
    eprintln!(
        "{} of {} codes generated",
        outputs.len(),
        outputs.len() + report.failures.len()
    );
    Ok(())
}

fn generate_barcode(args: &BarcodeArgs) -> Result<()> {
    let validation = validate(args.symbology, &args.data);
    if args.check {
        println!("{}", serde_json::to_string(&validation)?);
        return Ok(());
    }
    if let Some(message) = validation.error {
        return Err(WandelError::Validation(message));
    }

    let options = BarcodeOptions {
        bar_width: args.bar_width,
        height: args.height,
        show_text: !args.no_text,
        format: args.format,
        ..Default::default()
    };
    let blob = BarcodeGenerator::new(options).generate(args.symbology, &args.data)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("barcode.{}", args.format.extension())));
    write_blob(&output, &blob)
}

fn write_blob(path: &Path, blob: &Blob) -> Result<()> {
    std::fs::write(path, &blob.bytes)?;
    info!(path = %path.display(), bytes = blob.len(), mime = %blob.mime_type, "Written");
    Ok(())
}

/// Print a failed command the way the per-file errors read.
pub fn report_error(err: &WandelError) {
    let human = humanize_error(err);
    eprintln!("error: {}", human.message);
    eprintln!("  {}", human.suggestion);
    debug!(%err, "Command failed");
}
