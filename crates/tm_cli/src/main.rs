use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use swc_common::{sync::Lrc, SourceMap};
use tm_codegen::emit_module;
use tm_loader::{Pipeline, PipelineConfig};
use tm_parser::parse_module;
use tm_runtime::{compile, Runtime};

#[derive(Parser)]
#[command(name = "tm", about = "transmod: load-time rewriting for .tm modules")]
struct Cli {
    /// Log discovery, rewriting and loading decisions.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Pipeline configuration (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print each module as source after rewriting.
    Print {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Run each module as a script with the pipeline installed.
    Run {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Parse, rewrite and compile each module, reporting the first error.
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Parse the file and dump the tree.
    Parse {
        input: PathBuf,
        /// Dump as JSON instead of debug output.
        #[arg(long)]
        ast: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Print { inputs } => {
            let pipeline = Pipeline::with_config(config);
            for input in &inputs {
                let (source, filename) = read(input)?;
                let cm: Lrc<SourceMap> = Default::default();
                let module = pipeline.transform_source(&cm, &source, &filename)?;
                if inputs.len() > 1 {
                    println!("# {filename}");
                }
                print!("{}", emit_module(&module));
            }
        }
        Commands::Run { inputs } => {
            for input in &inputs {
                run(input, &config)?;
            }
        }
        Commands::Check { inputs } => {
            let pipeline = Pipeline::with_config(config);
            for input in &inputs {
                let (source, filename) = read(input)?;
                let cm: Lrc<SourceMap> = Default::default();
                let module = pipeline.transform_source(&cm, &source, &filename)?;
                compile(module, &filename)?;
                eprintln!("OK: {filename}");
            }
        }
        Commands::Parse { input, ast } => {
            let (source, filename) = read(&input)?;
            let parsed = parse_module(&source, &filename)?;

            if ast {
                let json = serde_json::to_string_pretty(&parsed.module)?;
                println!("{json}");
            } else {
                println!("{:#?}", parsed.module);
            }
        }
    }

    Ok(())
}

fn read(input: &Path) -> Result<(String, String)> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    Ok((source, input.display().to_string()))
}

/// Execute `input` as `__main__`, importing its siblings through the
/// pipeline.
fn run(input: &Path, config: &PipelineConfig) -> Result<()> {
    let name = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("not a module path: {}", input.display()))?;
    let dir = match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut rt = Runtime::new();
    rt.prepend_search_path(dir);
    let handle = Pipeline::with_config(config.clone()).setup(&mut rt);
    let result = rt.run_module(name);
    handle.teardown(&mut rt);

    result.map(drop).map_err(|err| {
        let at = rt
            .location(err.span)
            .unwrap_or_else(|| input.display().to_string());
        anyhow::Error::new(err).context(format!("{name} failed at {at}"))
    })
}
