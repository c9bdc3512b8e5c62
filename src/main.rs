use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use log::error;

use mrzscan::batch::{BatchOptions, BatchRunner, FileOutcome};
use mrzscan::processing::OcrConfig;
use mrzscan::{read_mrz_with_options, ReadOptions};

#[derive(Parser)]
#[command(name = "mrzscan", about = "Read the machine-readable zone of identity documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize the MRZ on a single image file
    Read {
        /// Image file to process
        file: PathBuf,
        /// Emit the result as JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Write the detected region image to this path
        #[arg(long, value_name = "PATH")]
        save_roi: Option<PathBuf>,
        /// OCR language model
        #[arg(long, default_value = "eng")]
        lang: String,
    },
    /// Run the recognizer over a directory and report the success rate
    Evaluate {
        /// Directory of sample images
        dir: PathBuf,
        /// Number of parallel workers
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
        /// Only process the first N files
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match Cli::parse().command {
        Command::Read {
            file,
            json,
            save_roi,
            lang,
        } => run_read(file, json, save_roi, lang),
        Command::Evaluate { dir, jobs, limit } => run_evaluate(dir, jobs, limit),
    }
}

fn run_read(file: PathBuf, json: bool, save_roi: Option<PathBuf>, lang: String) -> ExitCode {
    let options = ReadOptions {
        save_roi: save_roi.is_some(),
        ocr: OcrConfig {
            lang,
            ..OcrConfig::default()
        },
    };
    let record = match read_mrz_with_options(&file, options) {
        Ok(Some(record)) => record,
        Ok(None) => {
            eprintln!("{}: no MRZ found", file.display());
            return ExitCode::from(1);
        }
        Err(err) => {
            error!("{}: {}", file.display(), err);
            return ExitCode::from(2);
        }
    };

    if let (Some(path), Some(roi)) = (save_roi, &record.roi) {
        if let Err(err) = roi.image.save(&path) {
            error!("failed to save ROI to {}: {}", path.display(), err);
        }
    }

    if json {
        match serde_json::to_string_pretty(&record.to_field_map()) {
            Ok(out) => println!("{}", out),
            Err(err) => {
                error!("serialization failed: {}", err);
                return ExitCode::from(2);
            }
        }
    } else {
        for (name, value) in record.to_field_map() {
            println!("{:<22} {}", name, value);
        }
    }
    ExitCode::SUCCESS
}

fn run_evaluate(dir: PathBuf, jobs: usize, limit: Option<usize>) -> ExitCode {
    let runner = BatchRunner::new(BatchOptions {
        jobs,
        limit,
        ocr: OcrConfig::default(),
    });
    let cancel = AtomicBool::new(false);
    let summary = match runner.run_dir(&dir, &cancel) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{}: {}", dir.display(), err);
            return ExitCode::from(2);
        }
    };

    for result in &summary.results {
        let status = match &result.outcome {
            FileOutcome::Recognized(record) => {
                format!("ok ({}, score {:.2})", record.format.name(), record.valid_score)
            }
            FileOutcome::NoMrz => "no mrz".to_string(),
            FileOutcome::Failed(reason) => format!("error: {}", reason),
        };
        println!(
            "{:<50} {:>7.2}s  {}",
            result.path.display(),
            result.elapsed.as_secs_f32(),
            status
        );
    }
    println!(
        "recognized {}/{} ({:.0}%), {} failed",
        summary.recognized(),
        summary.total(),
        summary.success_rate() * 100.0,
        summary.failed()
    );
    ExitCode::SUCCESS
}
