use clap::{Parser, Subcommand};
use invoice_ocr_lib::excel::export_rows_to_excel;
use invoice_ocr_lib::table::{summary_rows, to_tsv};
use invoice_ocr_lib::{
    parse_remarks, process_batch, process_batch_parallel, BatchResults, Config, OcrOutcome, Result,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "invoice-ocr", version)]
#[command(about = "Normalize OCR invoice responses and export them", long_about = None)]
struct Cli {
    /// Process files on all cores
    #[arg(long, global = true, conflicts_with = "sequential")]
    parallel: bool,

    /// Process files one at a time, even if INVOICE_OCR_PARALLEL is set
    #[arg(long, global = true)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print normalized records for stored OCR responses as JSON
    Extract {
        /// OCR response files (raw vendor JSON or {"success": .., "data": ..} envelopes)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Parse bank name and account from a remarks string
    Remarks {
        text: String,
    },
    /// Export the summary table of stored OCR responses
    Export {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output .xlsx path (default: export dir or Downloads)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Worksheet name
        #[arg(long)]
        sheet: Option<String>,

        /// Print tab-separated text instead of writing a workbook
        #[arg(long)]
        tsv: bool,
    },
}

fn main() -> Result<()> {
    let config = Config::from_env()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let parallel = parallel_mode(&cli, &config);

    match cli.command {
        Commands::Extract { files } => {
            let results = run_batch(&files, parallel);
            println!("{}", serde_json::to_string_pretty(results.records())?);
        }
        Commands::Remarks { text } => {
            println!("{}", serde_json::to_string_pretty(&parse_remarks(&text))?);
        }
        Commands::Export { files, out, sheet, tsv } => {
            let results = run_batch(&files, parallel);
            let rows = summary_rows(results.records());
            if tsv {
                print!("{}", to_tsv(&rows));
            } else {
                let sheet = sheet.unwrap_or_else(|| config.sheet_name.clone());
                let path = export_rows_to_excel(
                    &rows,
                    out.as_deref(),
                    config.export_dir.as_deref(),
                    Some(sheet.as_str()),
                )?;
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn parallel_mode(cli: &Cli, config: &Config) -> bool {
    if cli.sequential {
        false
    } else {
        cli.parallel || config.parallel
    }
}

fn run_batch(files: &[PathBuf], parallel: bool) -> BatchResults {
    let items: Vec<(String, OcrOutcome)> = files
        .iter()
        .map(|path| (display_name(path), load_outcome(path)))
        .collect();
    info!("loaded {} OCR result file(s)", items.len());
    if parallel {
        process_batch_parallel(&items)
    } else {
        process_batch(&items)
    }
}

/// Unreadable or non-JSON files become OCR failures for that file only.
fn load_outcome(path: &Path) -> OcrOutcome {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return OcrOutcome::Failed(format!("文件不存在: {}", path.display()))
        }
        Err(e) => return OcrOutcome::Failed(format!("文件不可读: {}", e)),
    };
    match serde_json::from_str(&text) {
        Ok(value) => OcrOutcome::from_json(value),
        Err(e) => OcrOutcome::Failed(format!("JSON格式无效: {}", e)),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    fn config(parallel: bool) -> Config {
        Config {
            parallel,
            ..Config::default()
        }
    }

    #[test]
    fn test_parallel_flags_override_config() {
        let sequential = cli(&["invoice-ocr", "--sequential", "remarks", "x"]);
        assert!(!parallel_mode(&sequential, &config(true)));

        let parallel = cli(&["invoice-ocr", "remarks", "x", "--parallel"]);
        assert!(parallel_mode(&parallel, &config(false)));

        let plain = cli(&["invoice-ocr", "remarks", "x"]);
        assert!(parallel_mode(&plain, &config(true)));
        assert!(!parallel_mode(&plain, &config(false)));
    }

    #[test]
    fn test_parallel_and_sequential_conflict() {
        assert!(Cli::try_parse_from(["invoice-ocr", "--parallel", "--sequential", "remarks", "x"]).is_err());
    }

    #[test]
    fn test_unreadable_files_become_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        match load_outcome(&missing) {
            OcrOutcome::Failed(message) => assert!(message.starts_with("文件不存在")),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        match load_outcome(&broken) {
            OcrOutcome::Failed(message) => assert!(message.starts_with("JSON格式无效")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
