use clap::{Args, Parser, Subcommand};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use protorec_compiler::{
    parse_schema_with, Compiler, CompilerConfig, FsLoader, NamespaceMode, ParseOptions, SchemaError,
};

#[derive(Parser)]
#[command(name = "protorec")]
#[command(about = "Generate prost-annotated Rust from Protocol Buffer schemas", long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Rust modules for the given schema files
    Generate {
        #[command(flatten)]
        session: SessionArgs,

        /// Output directory (if omitted, prints every artifact to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run both compiler passes without writing anything
    Check {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Parse a single schema file and print its model as JSON
    Parse {
        /// Input `.proto` file
        #[arg(short, long)]
        input: PathBuf,

        /// Reject malformed field statements
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Input `.proto` files
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Search roots for imports
    #[arg(short = 'I', long = "include")]
    includes: Vec<PathBuf>,

    /// JSON compiler configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// One Rust module per schema package
    #[arg(long)]
    nested: bool,

    /// Module path the generated tree is mounted at
    #[arg(long)]
    base_namespace: Option<String>,

    /// Reject malformed field statements
    #[arg(long)]
    strict: bool,

    /// Only generate the input files, not what they import
    #[arg(long)]
    no_imports: bool,
}

impl SessionArgs {
    fn config(&self) -> Result<CompilerConfig, SchemaError> {
        let mut config = match &self.config {
            Some(path) => CompilerConfig::from_json_file(path)?,
            None => CompilerConfig::default(),
        };
        if self.nested {
            config.namespace_mode = NamespaceMode::Nested;
        }
        if let Some(base) = &self.base_namespace {
            config.base_namespace = base.clone();
        }
        if self.strict {
            config.strict_fields = true;
        }
        if self.no_imports {
            config.include_imports = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn compile(&self) -> Result<BTreeMap<String, String>, SchemaError> {
        Compiler::new(self.config()?).compile(&self.inputs, &self.includes)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn write_artifacts(
    out_dir: &Path,
    artifacts: &BTreeMap<String, String>,
) -> Result<(), SchemaError> {
    for (name, content) in artifacts {
        let path = out_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SchemaError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(&path, content).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Commands::Generate { session, output } => {
            let artifacts = session.compile()?;
            if let Some(out_dir) = output {
                write_artifacts(out_dir, &artifacts)?;
                println!("Generated {} files in {}", artifacts.len(), out_dir.display());
            } else {
                for (name, content) in &artifacts {
                    println!("// ===== {} =====\n{}", name, content);
                }
            }
            Ok(())
        }

        Commands::Check { session } => {
            let artifacts = session.compile()?;
            println!(
                "OK: {} input files, {} artifacts",
                session.inputs.len(),
                artifacts.len()
            );
            Ok(())
        }

        Commands::Parse { input, strict } => {
            let text = fs::read_to_string(input).map_err(|source| SchemaError::Io {
                path: input.display().to_string(),
                source,
            })?;
            let name = FsLoader::default().identify(input);
            let options = ParseOptions { strict_fields: *strict };
            let schema = parse_schema_with(&text, &name, &options)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
