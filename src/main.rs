#![forbid(unsafe_code)]
//! docsig Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docsig::annotate::{ImportCollisionPolicy, UnpathedTypePolicy};
use docsig::commands::{
    execute_annotate, execute_init, execute_parse, AnnotateOptions, InitOptions, OutputFormat,
    ParseOptions,
};
use docsig::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "docsig")]
#[command(about = "Turn typed Google-style docstrings into PEP 484 type comments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: .docsig.json, .docsig.yaml or .docsig.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add `# type:` comments to functions with typed docstrings
    Annotate {
        /// Files or directories to process
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Write changes to the files
        #[arg(short, long)]
        write: bool,

        /// Confirm each file before writing
        #[arg(short, long)]
        interactive: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Diff)]
        format: OutputFormat,

        /// Annotate functions with untyped arguments (as `Any` or `...`)
        #[arg(long, env = "DOCSIG_ALLOW_UNTYPED_ARGS")]
        allow_untyped_args: bool,

        /// Fail functions without a documented return type
        #[arg(long, env = "DOCSIG_REQUIRE_RETURN_TYPE")]
        require_return_type: bool,

        /// How to handle names that may clash with existing bindings
        #[arg(long, value_enum, env = "DOCSIG_IMPORT_COLLISION_POLICY")]
        import_collision_policy: Option<ImportCollisionPolicy>,

        /// How to handle bare names that cannot be resolved
        #[arg(long, value_enum, env = "DOCSIG_UNPATHED_TYPE_POLICY")]
        unpathed_type_policy: Option<UnpathedTypePolicy>,

        /// Leave type text in docstrings after annotating
        #[arg(long)]
        keep_docstring_types: bool,

        /// Number of parallel workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Parse a type expression and print its canonical form
    Parse {
        /// Type expression, e.g. "Dict[str, List[int]]"
        expression: String,

        /// Output the parsed tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "docsig=debug" } else { "docsig=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Annotate {
            paths,
            write,
            interactive,
            format,
            allow_untyped_args,
            require_return_type,
            import_collision_policy,
            unpathed_type_policy,
            keep_docstring_types,
            workers,
        } => {
            let mut config = Config::discover(cli.config.as_deref())?;

            // CLI flags override config values
            if allow_untyped_args {
                config.annotate.allow_untyped_args = true;
            }
            if require_return_type {
                config.annotate.require_return_type = true;
            }
            if let Some(policy) = import_collision_policy {
                config.annotate.import_collision_policy = policy;
            }
            if let Some(policy) = unpathed_type_policy {
                config.annotate.unpathed_type_policy = policy;
            }
            if keep_docstring_types {
                config.annotate.strip_docstring_types = false;
            }

            let options = AnnotateOptions {
                paths,
                write,
                interactive,
                format,
                workers,
                verbose: cli.verbose,
            };
            execute_annotate(options, config)?;
        }

        Commands::Parse { expression, json } => {
            execute_parse(ParseOptions { expression, json })?;
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            execute_init(InitOptions { path, force })?;
        }
    }

    Ok(())
}
