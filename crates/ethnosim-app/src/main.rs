use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ethnosim_app::report::Activity;
use ethnosim_app::{
    AppConfig, FrameSink, HistorySample, RunReport, SPEEDS, Session, SessionCommand, TimedCommand,
    ValidationConfig, ValidationSummary, run_validation, ticks_per_second,
};
use ethnosim_core::{
    Distribution, Generation, GridPreset, Phenotype, ScenarioMode, SimulationEngine, Stats,
};
use ethnosim_fx::CooperationFx;
use owo_colors::OwoColorize;
use tracing::{debug, info, trace, warn};

#[derive(Parser, Debug)]
#[command(
    name = "ethnosim",
    version,
    about = "Tag/strategy evolution on a toroidal grid"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON config file with `simulation`, `scheduler` and `particles` sections.
    #[arg(long, global = true, env = "ETHNOSIM_CONFIG")]
    config: Option<PathBuf>,
    /// Named grid size; overridden by --width/--height.
    #[arg(long, global = true, value_enum, env = "ETHNOSIM_GRID")]
    grid: Option<GridArg>,
    #[arg(long, global = true, env = "ETHNOSIM_WIDTH")]
    width: Option<u32>,
    #[arg(long, global = true, env = "ETHNOSIM_HEIGHT")]
    height: Option<u32>,
    #[arg(long, global = true, value_enum, env = "ETHNOSIM_SCENARIO")]
    scenario: Option<ScenarioArg>,
    /// RNG seed for reproducible runs.
    #[arg(long, global = true, env = "ETHNOSIM_SEED")]
    seed: Option<u64>,
    /// Seed the grid from a distribution preset (e.g. "equal-mix", "heavy-altruist")
    /// instead of starting empty.
    #[arg(long, global = true, env = "ETHNOSIM_PRESET")]
    preset: Option<String>,
    /// Fraction of cells filled when seeding from --preset.
    #[arg(long, global = true, default_value_t = 1.0)]
    fill: f32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the simulation in real time through the frame scheduler.
    Run {
        /// Wall-clock duration of the run.
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
        /// Index into the speed ladder (1, 2, 5, 10, 30, 60, 120, 300, 600, 1200 ticks/s).
        #[arg(long, env = "ETHNOSIM_SPEED_INDEX")]
        speed_index: Option<usize>,
        /// JSON array of timed session commands applied during the run.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Also spawn cooperation particles.
        #[arg(long)]
        cooperation_fx: bool,
        /// Write a JSON report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Tick as fast as possible for a fixed number of generations.
    Headless {
        #[arg(long, default_value_t = 2_000)]
        ticks: u64,
        /// Record a report frame every this many ticks.
        #[arg(long, default_value_t = 15)]
        sample_every: u64,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Repeat seeded runs and check that ethnocentrism dominates.
    Validate {
        #[arg(long, default_value_t = 10)]
        runs: usize,
        #[arg(long, default_value_t = 2_000)]
        ticks: u64,
        /// Trailing ticks averaged per run.
        #[arg(long, default_value_t = 100)]
        window: usize,
        #[arg(long, default_value_t = 0.65)]
        threshold: f64,
        /// Exit with an error status when validation fails.
        #[arg(long)]
        strict: bool,
        /// Write the summary as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScenarioArg {
    Standard,
    Clash,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GridArg {
    Single,
    Small,
    Medium,
    Sandbox,
}

impl From<GridArg> for GridPreset {
    fn from(value: GridArg) -> Self {
        match value {
            GridArg::Single => GridPreset::Single,
            GridArg::Small => GridPreset::Small,
            GridArg::Medium => GridPreset::Medium,
            GridArg::Sandbox => GridPreset::Sandbox,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli.common)?;
    let seeding = seeding_from(&cli.common)?;

    match cli.command {
        Command::Run {
            seconds,
            speed_index,
            script,
            cooperation_fx,
            report,
        } => {
            let mut config = config;
            if let Some(index) = speed_index {
                if index >= SPEEDS.len() {
                    warn!(index, max = SPEEDS.len() - 1, "speed index clamped to the fastest rate");
                }
                config.scheduler.speed_index = index;
            }
            if cooperation_fx {
                let particles = config.particles.get_or_insert_with(Default::default);
                particles.cooperation.get_or_insert_with(CooperationFx::default);
            }
            run_realtime(config, seeding, seconds, script.as_deref(), report.as_deref())
        }
        Command::Headless {
            ticks,
            sample_every,
            report,
        } => run_headless(config, seeding, ticks, sample_every, report.as_deref()),
        Command::Validate {
            runs,
            ticks,
            window,
            threshold,
            strict,
            report,
        } => {
            let validation = ValidationConfig {
                runs,
                ticks,
                window,
                threshold,
                base_seed: cli.common.seed,
                simulation: config.simulation,
            };
            let summary = validate(&validation)?;
            if let Some(path) = report.as_deref() {
                write_summary(&summary, path)?;
            }
            if strict && !summary.passed {
                bail!(
                    "mean ethnocentric share {:.3} below threshold {:.3}",
                    summary.mean_ethnocentric,
                    summary.threshold
                );
            }
            Ok(())
        }
    }
}

fn resolve_config(args: &CommonArgs) -> Result<AppConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let simulation = &mut config.simulation;
    if let Some(grid) = args.grid {
        let (width, height) = GridPreset::from(grid).dimensions();
        simulation.grid_width = width;
        simulation.grid_height = height;
    }
    if let Some(width) = args.width {
        simulation.grid_width = width;
    }
    if let Some(height) = args.height {
        simulation.grid_height = height;
    }
    if let Some(scenario) = args.scenario {
        simulation.scenario = match scenario {
            ScenarioArg::Standard => ScenarioMode::Standard,
            ScenarioArg::Clash => ScenarioMode::GroupMapped,
        };
    }
    if args.seed.is_some() {
        simulation.rng_seed = args.seed;
    }
    simulation
        .validate()
        .context("invalid simulation settings")?;
    Ok(config)
}

fn seeding_from(args: &CommonArgs) -> Result<Option<SessionCommand>> {
    let Some(name) = args.preset.as_deref() else {
        return Ok(None);
    };
    let distribution = Distribution::preset(name).ok_or_else(|| {
        let known: Vec<&str> = Distribution::PRESETS.iter().map(|(label, _)| *label).collect();
        anyhow!("unknown preset {name:?}; expected one of {}", known.join(", "))
    })?;
    Ok(Some(SessionCommand::SeedDistribution {
        distribution,
        fill_ratio: args.fill,
    }))
}

/// Logs published stats; the binary has no canvas.
#[derive(Default)]
struct LogSink {
    published: usize,
    samples: usize,
}

impl FrameSink for LogSink {
    fn draw(&mut self, engine: &SimulationEngine) {
        trace!(generation = engine.generation().0, "frame drawn");
    }

    fn publish_stats(&mut self, stats: &Stats, generation: Generation) {
        self.published += 1;
        debug!(
            generation = generation.0,
            total = stats.total,
            ethnocentric = stats.counts.ethnocentric,
            altruist = stats.counts.altruist,
            egoist = stats.counts.egoist,
            traitor = stats.counts.traitor,
            "stats"
        );
    }

    fn record_history(&mut self, _sample: &HistorySample) {
        self.samples += 1;
    }
}

fn load_script(path: &Path) -> Result<Vec<TimedCommand>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let mut script: Vec<TimedCommand> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse script {}", path.display()))?;
    script.sort_by_key(|entry| entry.at_ms);
    Ok(script)
}

fn run_realtime(
    config: AppConfig,
    seeding: Option<SessionCommand>,
    seconds: f64,
    script: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("--seconds must be a non-negative number");
    }
    let duration = Duration::from_secs_f64(seconds);
    let mut script = match script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    }
    .into_iter()
    .peekable();

    let start = Instant::now();
    let mut session = Session::new(config.session_options(), start)?;
    let mut sink = LogSink::default();
    // Seed before the report captures its initial frame.
    if let Some(command) = seeding {
        session.apply(command, start, &mut sink);
    }
    session.submit(SessionCommand::Play);

    let mut report = RunReport::new(
        config.simulation.clone(),
        session.engine().generation(),
        &session.engine().stats(),
    );
    let frame_interval = Duration::from_secs(1) / 60;
    info!(
        tps = ticks_per_second(config.scheduler.speed_index),
        seconds, "running in real time"
    );

    loop {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(start);
        while let Some(entry) = script.next_if(|entry| Duration::from_millis(entry.at_ms) <= elapsed) {
            session.submit(entry.command);
        }
        let frame = session.frame(now, &mut sink);
        report.observe_activity(Activity {
            births: frame.births,
            deaths: frame.deaths,
            immigrants: frame.immigrants,
            cooperations: frame.cooperations,
            encounters: frame.encounters,
        });
        if frame.stats_published {
            report.record(session.engine().generation(), session.scheduler().latest_stats());
        }
        if elapsed >= duration {
            break;
        }
        thread::sleep(frame_interval.min(duration - elapsed));
    }

    report.record(session.engine().generation(), &session.engine().stats());
    report.finalize();
    info!(
        published = sink.published,
        history = sink.samples,
        "real-time run finished"
    );
    print_summary(&report, "run");
    if let Some(path) = report_path {
        report.write_json(path)?;
        println!("{} {}", "report".green().bold(), path.display());
    }
    Ok(())
}

fn run_headless(
    config: AppConfig,
    seeding: Option<SessionCommand>,
    ticks: u64,
    sample_every: u64,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut engine = SimulationEngine::new(config.simulation.clone())?;
    if let Some(SessionCommand::SeedDistribution {
        distribution,
        fill_ratio,
    }) = seeding
    {
        engine.seed_by_distribution_with_fill(&distribution, fill_ratio);
    }
    let mut report = RunReport::new(config.simulation, engine.generation(), &engine.stats());
    let sample_every = sample_every.max(1);
    let started = Instant::now();
    for tick in 1..=ticks {
        let tick_report = engine.tick();
        report.observe(&tick_report);
        if tick % sample_every == 0 || tick == ticks {
            report.record(engine.generation(), &engine.stats());
        }
    }
    report.finalize();
    info!(
        ticks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "headless run finished"
    );
    print_summary(&report, "headless");
    if let Some(path) = report_path {
        report.write_json(path)?;
        println!("{} {}", "report".green().bold(), path.display());
    }
    Ok(())
}

fn print_summary(report: &RunReport, label: &str) {
    let summary = &report.summary;
    println!(
        "{} generation {} | population {} | births {} | deaths {}",
        label.cyan().bold(),
        summary.final_generation.0,
        summary.final_total,
        summary.total_births,
        summary.total_deaths
    );
    let shares = summary.final_shares;
    for (phenotype, share) in [
        (Phenotype::Ethnocentric, shares.ethnocentric),
        (Phenotype::Altruist, shares.altruist),
        (Phenotype::Egoist, shares.egoist),
        (Phenotype::Traitor, shares.traitor),
    ] {
        println!("  {:<14} {:>5.1}%", phenotype.label(), share * 100.0);
    }
    if summary.total_cooperations > 0 {
        println!(
            "  {:<14} {:>5.1}%",
            "cooperation".dimmed(),
            summary.cooperation_rate * 100.0
        );
    }
}

fn validate(config: &ValidationConfig) -> Result<ValidationSummary> {
    println!(
        "{}",
        format!(
            "Running validation ({} runs, {} ticks each, last {} averaged)",
            config.runs, config.ticks, config.window
        )
        .bold()
    );
    let summary = run_validation(config, |sample| {
        println!(
            "Run {:>2}: ethnocentrism {:>5.1}%, cooperation proxy {:>5.1}%, cooperation rate {:>5.1}% {}",
            sample.run + 1,
            sample.ethnocentric_share * 100.0,
            sample.cooperation_proxy * 100.0,
            sample.cooperation_rate * 100.0,
            format!("(seed {})", sample.seed).dimmed()
        );
    })?;

    println!();
    println!("{}", "--- Summary ---".bold());
    println!(
        "Mean ethnocentrism: {:.1}% (std dev {:.1}%)",
        summary.mean_ethnocentric * 100.0,
        summary.std_ethnocentric * 100.0
    );
    println!(
        "Cooperation proxy (strategy-based): {:.1}%",
        summary.mean_cooperation_proxy * 100.0
    );
    println!(
        "Cooperation rate (observed acts): {:.1}%",
        summary.mean_cooperation_rate * 100.0
    );
    if summary.passed {
        println!(
            "{} ethnocentrism dominates (>= {:.0}%)",
            "PASS".green().bold(),
            summary.threshold * 100.0
        );
    } else {
        println!(
            "{} ethnocentrism below {:.0}%; check parameters",
            "FAIL".red().bold(),
            summary.threshold * 100.0
        );
    }
    Ok(summary)
}

fn write_summary(summary: &ValidationSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary).context("failed to serialize validation summary")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_common_flags_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "ethnosim", "headless", "--ticks", "10", "--width", "8", "--scenario", "clash",
        ])
        .expect("parse");
        assert_eq!(cli.common.width, Some(8));
        assert!(matches!(cli.common.scenario, Some(ScenarioArg::Clash)));
        assert!(matches!(cli.command, Command::Headless { ticks: 10, .. }));
    }

    #[test]
    fn speed_ladder_matches_the_flag_help() {
        assert_eq!(SPEEDS, [1, 2, 5, 10, 30, 60, 120, 300, 600, 1200]);
    }

    #[test]
    fn unknown_presets_list_the_known_ones() {
        let args = CommonArgs {
            config: None,
            grid: None,
            width: None,
            height: None,
            scenario: None,
            seed: None,
            preset: Some("nope".into()),
            fill: 1.0,
        };
        let err = seeding_from(&args).expect_err("unknown preset");
        assert!(err.to_string().contains("Equal Mix"));
    }
}
