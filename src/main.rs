use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use matwave::frame::{samples_frame, summary_frame};
use matwave::{whosmat, ConvertOptions, MatWaveParser, OrdinalEpoch, WaveformConverter};
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// MATLAB waveform-suite MAT file to trace stream converter
#[derive(Parser)]
#[command(name = "matwave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Variables to load (comma-separated, default: all)
    #[arg(short, long, value_delimiter = ',')]
    variables: Option<Vec<String>>,

    /// Object class name identifying waveform variables
    #[arg(long, default_value = matwave::config::WAVEFORM_CLASS)]
    class: String,

    /// Keep yes/no/true/false extra field values as strings
    #[arg(long)]
    keep_flag_strings: bool,

    /// Interpret start times as MATLAB datenums (day 1 = year 0)
    #[arg(long)]
    matlab_datenum: bool,
}

impl ConvertArgs {
    fn to_options(&self) -> ConvertOptions {
        let mut options = ConvertOptions::new()
            .with_class_marker(self.class.clone())
            .with_normalize_flags(!self.keep_flag_strings);
        if let Some(names) = &self.variables {
            options = options.with_variables(names.iter().cloned());
        }
        if self.matlab_datenum {
            options = options.with_epoch(OrdinalEpoch::MatlabDatenum);
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the top-level variables of a MAT file
    Info {
        /// Input MAT file path
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Convert waveform variables and print their streams
    Show {
        /// Input MAT file path
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        convert: ConvertArgs,

        /// Also print every waveform record in full
        #[arg(short, long)]
        records: bool,
    },

    /// Export converted waveforms to CSV or Parquet
    Convert {
        /// Input MAT file path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        convert: ConvertArgs,

        /// Output format (auto-detected from extension if not specified)
        #[arg(short, long, value_enum)]
        format: Option<ConvertFormat>,

        /// Compression for Parquet files
        #[arg(long, value_enum, default_value = "snappy")]
        compression: Compression,

        /// Write one row per trace instead of one row per sample
        #[arg(long)]
        summary: bool,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum ConvertFormat {
    Csv,
    Parquet,
}

#[derive(Debug, Clone, ValueEnum)]
enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Lz4,
    Zstd,
}

fn to_parquet_compression(c: Compression) -> ParquetCompression {
    match c {
        Compression::Uncompressed => ParquetCompression::Uncompressed,
        Compression::Snappy => ParquetCompression::Snappy,
        Compression::Gzip => ParquetCompression::Gzip(None),
        Compression::Lz4 => ParquetCompression::Lz4Raw,
        Compression::Zstd => ParquetCompression::Zstd(None),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => info_command(input)?,

        Commands::Show {
            input,
            convert,
            records,
        } => show_command(input, convert, records)?,

        Commands::Convert {
            input,
            output,
            convert,
            format,
            compression,
            summary,
        } => convert_command(input, output, convert, format, compression, summary)?,
    }

    Ok(())
}

fn info_command(input: PathBuf) -> Result<()> {
    let data = std::fs::read(&input)
        .with_context(|| format!("Failed to read MAT file: {}", input.display()))?;
    let variables = whosmat(&data)
        .with_context(|| format!("Failed to list variables in: {}", input.display()))?;

    println!("File Information:");
    println!("  Path:           {}", input.display());
    println!(
        "  Size:           {} bytes ({:.2} MB)",
        data.len(),
        data.len() as f64 / 1_048_576.0
    );

    println!("\nVariables ({}):", variables.len());
    for var in &variables {
        let marker = if var.class_name.as_deref() == Some(matwave::config::WAVEFORM_CLASS) {
            "  [waveform]"
        } else {
            ""
        };
        println!(
            "  {:30} {:>12} {}{}",
            var.name,
            var.size_string(),
            var.type_name(),
            marker
        );
    }

    Ok(())
}

fn show_command(input: PathBuf, convert: ConvertArgs, records: bool) -> Result<()> {
    let options = convert.to_options();

    if records {
        // Records are printed before CALIB is moved into the trace header
        let data = std::fs::read(&input)
            .with_context(|| format!("Failed to read MAT file: {}", input.display()))?;
        let variables = matwave::MatLoader::load(&data, options.variable_names.as_deref())
            .with_context(|| format!("Failed to load variables from: {}", input.display()))?;

        for var in WaveformConverter::classify(variables, &options.class_marker) {
            let Some(array) = var.value.as_struct() else {
                continue;
            };
            println!("== {} ({} records)", var.name, array.len());
            for record in array.records() {
                let record = matwave::WaveformRecord::from_record(record, &options)?;
                println!("{}\n", record);
            }
        }
    }

    let parse_start = Instant::now();
    let streams = MatWaveParser::from_file(&input, &options)
        .with_context(|| format!("Failed to convert MAT file: {}", input.display()))?;
    log::info!(
        "Converted {} variable(s) in {:.3}s",
        streams.len(),
        parse_start.elapsed().as_secs_f64()
    );

    if streams.is_empty() {
        println!("No '{}' variables found in {}", options.class_marker, input.display());
    }
    for (name, stream) in &streams {
        println!("{}:\n{}\n", name, stream);
    }

    Ok(())
}

fn convert_command(
    input: PathBuf,
    output: PathBuf,
    convert: ConvertArgs,
    format: Option<ConvertFormat>,
    compression: Compression,
    summary: bool,
) -> Result<()> {
    println!("Converting {} to {}...", input.display(), output.display());

    // Determine output format
    let out_format = if let Some(f) = format {
        f
    } else {
        match output.extension().and_then(|s| s.to_str()) {
            Some("csv") => ConvertFormat::Csv,
            Some("parquet") => ConvertFormat::Parquet,
            _ => anyhow::bail!(
                "Cannot determine output format from extension. Use --format to specify."
            ),
        }
    };

    let parse_start = Instant::now();
    let streams = MatWaveParser::from_file(&input, &convert.to_options())
        .with_context(|| format!("Failed to convert MAT file: {}", input.display()))?;
    let traces: usize = streams.values().map(|s| s.len()).sum();
    println!(
        "Loaded {} variable(s), {} trace(s) ({:.3}s)",
        streams.len(),
        traces,
        parse_start.elapsed().as_secs_f64()
    );

    let mut df = if summary {
        summary_frame(&streams)?
    } else {
        samples_frame(&streams)?
    };

    match out_format {
        ConvertFormat::Csv => {
            let mut file = std::fs::File::create(&output)?;
            CsvWriter::new(&mut file).finish(&mut df)?;
            println!("Successfully converted to CSV: {}", output.display());
        }
        ConvertFormat::Parquet => {
            let file = std::fs::File::create(&output)?;
            let save_start = Instant::now();
            ParquetWriter::new(file)
                .with_compression(to_parquet_compression(compression))
                .finish(&mut df)?;
            println!(
                "Successfully converted to Parquet: {} ({:.3}s)",
                output.display(),
                save_start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}
