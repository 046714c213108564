use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use shapeout::config::{ConfigValue, Section, Setting};
use shapeout::session::{self, index};
use shapeout::{Analysis, Patch, Settings};

/// Inspect, create and modify ShapeOut analysis sessions.
#[derive(Parser)]
#[command(name = "shapeout", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Application settings file.
    #[arg(long, global = true, default_value = "shapeout.toml")]
    settings: PathBuf,

    /// Where to look for data files of moved sessions (overrides settings).
    #[arg(long, global = true)]
    search_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List measurements whose data file cannot be found.
    Check { session: PathBuf },
    /// Print the software version that wrote a session.
    Version { session: PathBuf },
    /// Load a session and print its measurements and statistics.
    Show { session: PathBuf },
    /// Create a session from data files.
    Create {
        /// Session directory to write.
        output: PathBuf,
        /// Measurement data files (.parquet, .csv, .json).
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory the recorded relative data paths start from
        /// (default: the session directory).
        #[arg(long)]
        rel_path: Option<PathBuf>,
    },
    /// Change a filtering or plotting key for all measurements and write
    /// the result as a new session.
    Set {
        session: PathBuf,
        output: PathBuf,
        /// `filtering` or `plotting`.
        section: String,
        key: String,
        value: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("loading {}", cli.settings.display()))?;
    let search_path = cli
        .search_path
        .clone()
        .unwrap_or_else(|| settings.session.search_path.clone());

    match cli.command {
        Command::Check { ref session } => cmd_check(session, &search_path),
        Command::Version { ref session } => {
            println!("{}", index::version(session)?);
            Ok(())
        }
        Command::Show { ref session } => cmd_show(&settings, session, &search_path),
        Command::Create {
            ref output,
            ref files,
            ref rel_path,
        } => cmd_create(&settings, output, files, rel_path.as_deref()),
        Command::Set {
            ref session,
            ref output,
            ref section,
            ref key,
            ref value,
        } => cmd_set(&settings, session, &search_path, output, section, key, value),
    }
}

fn open(settings: &Settings, session: &Path, search_path: &Path) -> Result<Analysis> {
    let mut analysis = Analysis::with_settings(&settings.analysis)?;
    let warnings = analysis
        .load_session(session, search_path, settings.load_options())
        .with_context(|| format!("opening session {}", session.display()))?;
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    Ok(analysis)
}

fn cmd_check(session: &Path, search_path: &Path) -> Result<()> {
    let missing = session::index_check(&index::index_path(session), search_path)?;
    if missing.is_empty() {
        println!("all data files found");
        return Ok(());
    }
    for m in &missing {
        println!("[{}] missing: {}", m.key, m.path.display());
    }
    bail!("{} data file(s) missing", missing.len())
}

fn cmd_show(settings: &Settings, session: &Path, search_path: &Path) -> Result<()> {
    let analysis = open(settings, session, search_path)?;

    for (i, mm) in analysis.measurements().iter().enumerate() {
        let source = match mm.data_path() {
            Some(p) => p.display().to_string(),
            None => "hierarchy child".to_string(),
        };
        println!(
            "{:>3}  {:<30} {:>8} / {:<8} {}",
            i + 1,
            mm.title(),
            mm.event_count(),
            mm.data().len(),
            source
        );
    }

    println!();
    for section in [Section::Filtering, Section::Plotting] {
        let uncommon = analysis.uncommon_parameters(section);
        for (key, values) in uncommon {
            let shown: Vec<String> = values
                .iter()
                .map(|v| v.as_ref().map_or("-".to_string(), ToString::to_string))
                .collect();
            println!("[{section}] {key}: {}", shown.join(" | "));
        }
    }

    let table = analysis.statistics_basic();
    println!();
    println!("{}", table.header.join("\t"));
    for (title, values) in &table.rows {
        let values: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
        println!("{title}\t{}", values.join("\t"));
    }
    Ok(())
}

fn cmd_create(
    settings: &Settings,
    output: &Path,
    files: &[PathBuf],
    rel_path: Option<&Path>,
) -> Result<()> {
    let mut analysis = Analysis::with_settings(&settings.analysis)?;
    analysis.load_files(files)?;
    analysis.assign_contour_colors(None);
    analysis.set_contour_accuracies(analysis.contour_accuracy_points());

    let index_file = analysis.dump(output, rel_path.unwrap_or(output), false)?;
    println!(
        "wrote {} measurement(s) to {}",
        analysis.len(),
        index_file.display()
    );
    Ok(())
}

fn cmd_set(
    settings: &Settings,
    session: &Path,
    search_path: &Path,
    output: &Path,
    section: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let section = match Section::from_name(section) {
        Some(s @ (Section::Filtering | Section::Plotting)) => s,
        _ => bail!("only [filtering] and [plotting] can be set, not [{section}]"),
    };
    let key = key.trim().to_lowercase();
    let value = match Setting::kind_of(section, &key) {
        Some(kind) => ConfigValue::parse(value, kind),
        None => ConfigValue::guess(value),
    };

    let mut analysis = open(settings, session, search_path)?;
    analysis.set_parameters(&Patch::new().set_key(section, &key, value));
    let index_file = analysis.dump(output, output, false)?;
    println!("wrote {}", index_file.display());
    Ok(())
}
