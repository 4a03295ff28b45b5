//! Wenyan compiler and runtime CLI (§6 "External interfaces").

use clap::Parser as ClapParser;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use wenyan_compiler::config::{Config, Emit};
use wenyan_compiler::driver;

#[derive(ClapParser)]
#[command(name = "wenyanc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run Wenyan (文言) programs", long_about = None)]
struct Cli {
    /// Wenyan source file(s) to run
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print the token stream instead of running the program
    #[arg(long)]
    tokens: bool,

    /// Print the parsed AST instead of running the program
    #[arg(long, alias = "ast")]
    wyast: bool,

    /// Print the lowered IR instead of running the program
    #[arg(long)]
    pyast: bool,

    /// Suppress the Hanzi output-spacing conventions `__format` otherwise
    /// applies, matching the reference implementation's compatibility mode
    #[arg(long = "no-outputHanzi")]
    no_output_hanzi: bool,
}

fn default_lib_paths() -> Vec<PathBuf> {
    let Some(install_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) else {
        return Vec::new();
    };
    vec![install_dir.join("lib").join(std::env::consts::OS), install_dir.join("lib")]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WENYAN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let emit = if cli.tokens {
        Emit::Tokens
    } else if cli.wyast {
        Emit::WyAst
    } else if cli.pyast {
        Emit::PyAst
    } else {
        Emit::Run
    };

    let config = Config::new()
        .with_no_output_hanzi(cli.no_output_hanzi)
        .with_lib_paths(default_lib_paths())
        .with_emit(emit);

    let mut stdout = io::stdout();
    let mut exit_code = 0;
    for path in &cli.paths {
        match driver::run_emit(path, &config, &mut stdout) {
            Ok(rendered) => {
                if !rendered.is_empty() {
                    println!("{rendered}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                exit_code = 1;
            }
        }
    }
    process::exit(exit_code);
}
