use autograder::{Assignment, AssignmentConfig, Error, GradingOptions, Result};
use clap::Parser;
use log::{LevelFilter, debug, error, info};
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

const LOG_FILE: &str = "autograder.log";
const ARCHIVE_SRC_SUBDIR: &str = "src";

#[derive(Parser, Debug)]
#[command(
    name = "agrader",
    version,
    about = "Build a student submission and score it against reference tests."
)]
struct Cli {
    /// Print more output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print less output
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Directory containing program files
    #[arg(short, long, value_name = "DIR", default_value = "src")]
    src: PathBuf,

    /// Archive containing program files (overrides --src)
    #[arg(short, long, value_name = "TAR")]
    archive: Option<PathBuf>,

    /// Increase logging
    #[arg(short, long)]
    debug: bool,

    /// Assignment description
    #[arg(short, long, value_name = "FILE", default_value = "autograder.json")]
    config: PathBuf,

    /// Directory of reference tests [default: "data" next to the config file]
    #[arg(long, value_name = "DIR")]
    data: Option<PathBuf>,

    /// Names of programs or groups to grade
    requests: Vec<String>,
}

impl Cli {
    fn config_dir(&self) -> &Path {
        match self.config.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn options(&self) -> GradingOptions {
        GradingOptions {
            verbosity: i32::from(self.verbose) - i32::from(self.quiet),
            requests: self.requests.iter().cloned().collect(),
        }
    }

    fn enable_log(&self) {
        let level = if self.debug { LevelFilter::Debug } else { LevelFilter::Warn };
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level).parse_default_env();

        let log_path = self.config_dir().join(LOG_FILE);
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        builder.init();
    }
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config = AssignmentConfig::from_file(&cli.config)?;
    info!(
        "Starting autograder {} release {}. Library {}",
        config.name(),
        config.release(),
        env!("CARGO_PKG_VERSION")
    );

    let data_dir = cli.data.clone().unwrap_or_else(|| cli.config_dir().join("data"));
    debug!("Data directory: {data_dir:?}");

    let assignment = config.build_assignment()?;
    let options = cli.options();

    writeln!(out, "{} Auto-grader, Release {}", config.name(), config.release())?;

    if let Some(archive) = &cli.archive {
        return assignment.grade_archive(archive, Path::new(ARCHIVE_SRC_SUBDIR), &data_dir, &options, out);
    }

    if !cli.src.is_dir() {
        return Err(Error::Project(format!(
            "invalid src directory: {:?}",
            cli.src.display().to_string()
        )));
    }
    let src_dir = cli.src.canonicalize()?;
    debug!("Source directory: {src_dir:?}");

    assignment.grade(&src_dir, &data_dir, &options, out)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.enable_log();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Grading aborted: {e}");
            let _ = writeln!(out, "grader: {e}");
            ExitCode::FAILURE
        }
    }
}
