use clap::Parser;
use heic_convert::config::{self, ConvertConfig};
use heic_convert::imaging::{ChromaSubsampling, HeifBackend, OutputFormat};
use heic_convert::{output, process};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "heic-convert")]
#[command(about = "Batch-convert HEIC/HEIF photos to JPEG or PNG")]
#[command(long_about = "\
Batch-convert HEIC/HEIF photos to JPEG or PNG

Walks the source directory for .heic/.heif files (any case) and writes one
converted file per input under the destination directory, keeping the same
subfolders:

  fotos_heic/                     fotos_jpeg/
  ├── a.heic              →       ├── a.jpg
  └── 2023/                       └── 2023/
      └── IMG_0001.HEIC   →           └── IMG_0001.jpg

Color profiles and EXIF are kept by default and photos are stored upright.
Existing outputs are skipped unless --overwrite is given, so an interrupted
run can simply be started again.

Settings are layered: built-in defaults, then --config FILE, then flags.
Run 'heic-convert --gen-config' to print a documented config file.

Exit status is 1 when any file failed to convert.")]
#[command(version)]
struct Cli {
    /// Directory containing the HEIC/HEIF files [default: fotos_heic]
    #[arg(long = "origem", visible_alias = "source", value_name = "DIR")]
    source: Option<PathBuf>,

    /// Directory the converted files are written to [default: fotos_jpeg]
    #[arg(long = "destino", visible_alias = "dest", value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Output format [default: jpeg]
    #[arg(long = "formato", visible_alias = "format", value_enum)]
    format: Option<OutputFormat>,

    /// JPEG quality, 1-100 [default: 95]
    #[arg(
        long = "qualidade",
        visible_alias = "quality",
        value_parser = clap::value_parser!(u32).range(1..=100)
    )]
    quality: Option<u32>,

    /// JPEG chroma subsampling: 0 = 4:4:4, 1 = 4:2:2, 2 = 4:2:0 [default: 0]
    #[arg(long, value_parser = parse_subsampling)]
    subsampling: Option<ChromaSubsampling>,

    /// Replace outputs that already exist
    #[arg(long)]
    overwrite: bool,

    /// Only convert files directly inside the source directory
    #[arg(long = "nao-recursivo", visible_alias = "no-recursive")]
    no_recursive: bool,

    /// Write baseline instead of progressive JPEG
    #[arg(long = "sem-progressivo", visible_alias = "no-progressive")]
    no_progressive: bool,

    /// Skip Huffman table optimization
    #[arg(long = "sem-otimizar", visible_alias = "no-optimize")]
    no_optimize: bool,

    /// Drop ICC profile and EXIF; pixels are written as decoded
    #[arg(long = "sem-metadata", visible_alias = "no-metadata")]
    no_metadata: bool,

    /// Parallel conversions, 0 = one per CPU core [default: 0]
    #[arg(long)]
    threads: Option<usize>,

    /// Load settings from a TOML file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a stock config file with all options documented, then exit
    #[arg(long)]
    gen_config: bool,

    /// Log each conversion step to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply explicitly given flags on top of the loaded config.
    fn apply_overrides(&self, config: &mut ConvertConfig) {
        if let Some(source) = &self.source {
            config.paths.source = source.clone();
        }
        if let Some(dest) = &self.dest {
            config.paths.dest = dest.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(quality) = self.quality {
            config.output.quality = quality;
        }
        if let Some(subsampling) = self.subsampling {
            config.output.subsampling = subsampling;
        }
        if let Some(threads) = self.threads {
            config.processing.threads = threads;
        }
        if self.overwrite {
            config.output.overwrite = true;
        }
        if self.no_recursive {
            config.scan.recursive = false;
        }
        if self.no_progressive {
            config.output.progressive = false;
        }
        if self.no_optimize {
            config.output.optimize = false;
        }
        if self.no_metadata {
            config.output.preserve_metadata = false;
        }
    }
}

fn parse_subsampling(value: &str) -> Result<ChromaSubsampling, String> {
    let code: u8 = value
        .parse()
        .map_err(|_| format!("expected 0, 1 or 2, got '{value}'"))?;
    ChromaSubsampling::try_from(code)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            output::print_error(&*err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    // RUST_LOG wins; otherwise --verbose picks the level
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "heic_convert=debug".to_string()
        } else {
            "heic_convert=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    if let Some(warning) = output::format_quality_warning(config.output.format, config.output.quality)
    {
        eprintln!("{}", warning);
    }
    output::print_run_header(&config);

    let backend = HeifBackend::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::convert_tree(&backend, &config, Some(tx));
    if printer.join().is_err() {
        tracing::warn!("progress printer stopped early");
    }
    let summary = result?;

    output::print_summary(&summary);
    if summary.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["heic-convert"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn no_flags_leave_config_alone() {
        let mut config = ConvertConfig::default();
        parse(&[]).apply_overrides(&mut config);
        assert_eq!(config, ConvertConfig::default());
    }

    #[test]
    fn portuguese_and_english_names_are_equivalent() {
        let pt = parse(&["--origem", "in", "--destino", "out", "--formato", "png", "--qualidade", "80"]);
        let en = parse(&["--source", "in", "--dest", "out", "--format", "png", "--quality", "80"]);
        let (mut a, mut b) = (ConvertConfig::default(), ConvertConfig::default());
        pt.apply_overrides(&mut a);
        en.apply_overrides(&mut b);
        assert_eq!(a, b);
        assert_eq!(a.paths.source, PathBuf::from("in"));
        assert_eq!(a.output.format, OutputFormat::Png);
        assert_eq!(a.output.quality, 80);
    }

    #[test]
    fn negative_flags_turn_options_off() {
        let mut config = ConvertConfig::default();
        parse(&[
            "--nao-recursivo",
            "--sem-progressivo",
            "--no-optimize",
            "--sem-metadata",
            "--overwrite",
            "--subsampling",
            "2",
            "--threads",
            "3",
        ])
        .apply_overrides(&mut config);
        assert!(!config.scan.recursive);
        assert!(!config.output.progressive);
        assert!(!config.output.optimize);
        assert!(!config.output.preserve_metadata);
        assert!(config.output.overwrite);
        assert_eq!(config.output.subsampling, ChromaSubsampling::Yuv420);
        assert_eq!(config.processing.threads, 3);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Cli::try_parse_from(["heic-convert", "--quality", "0"]).is_err());
        assert!(Cli::try_parse_from(["heic-convert", "--quality", "101"]).is_err());
        assert!(Cli::try_parse_from(["heic-convert", "--subsampling", "3"]).is_err());
        assert!(Cli::try_parse_from(["heic-convert", "--format", "webp"]).is_err());
    }

    #[test]
    fn flags_override_config_file_values() {
        let mut config = ConvertConfig::default();
        config.output.quality = 70;
        parse(&["--quality", "90"]).apply_overrides(&mut config);
        assert_eq!(config.output.quality, 90);
    }
}
