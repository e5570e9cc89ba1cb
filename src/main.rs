//! Bot Guard CLI - operator entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use bot_guard::api::commands;
use bot_guard::constants::{APP_NAME, APP_VERSION};
use bot_guard::logic::clock::ThreadRandom;
use bot_guard::logic::experiment::{Arm, Metric};
use bot_guard::logic::ledger::ExportFormat;
use bot_guard::logic::scoring::Recommendation;
use bot_guard::logic::storage::FileStorage;
use bot_guard::logic::threshold::ThresholdConfig;
use bot_guard::{BotGuard, GuardConfig};

#[derive(Debug, Parser)]
#[command(name = "bot-guard", version)]
#[command(about = "Sign-in bot scoring, attempt ledger and threshold experiments")]
struct Cli {
    /// Override the data directory (default: BOTGUARD_DATA_DIR or the local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a recorded session (JSON event list or signal snapshot) and record it
    Score {
        /// Input JSON file
        input: PathBuf,
        /// Session token for experiment assignment (sticky within one process only)
        #[arg(long)]
        session: Option<String>,
        /// Only score; do not touch the ledger or experiments
        #[arg(long)]
        dry_run: bool,
    },
    /// Attempt history
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// Live challenge/block thresholds
    Thresholds {
        #[command(subcommand)]
        action: ThresholdAction,
    },
    /// Threshold A/B experiments
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },
}

#[derive(Debug, Subcommand)]
enum LedgerAction {
    /// List recorded attempts
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Summary statistics
    Stats,
    /// Suggest a threshold adjustment from reviewed attempts
    Recommend,
    /// Export attempts, stats and thresholds
    Export {
        output: PathBuf,
        /// json or csv
        #[arg(long, default_value = "json")]
        format: ExportFormat,
    },
    /// Replace attempts and thresholds with a JSON export
    Import { input: PathBuf },
    /// Flag (or unflag) an attempt as a real user
    Mark {
        id: String,
        /// Clear the false-positive flag instead of setting it
        #[arg(long)]
        unset: bool,
    },
    /// Delete all attempts
    Clear,
}

#[derive(Debug, Subcommand)]
enum ThresholdAction {
    Get,
    Set {
        #[arg(long)]
        challenge: f64,
        #[arg(long)]
        block: f64,
    },
    /// Restore 35/60
    Reset,
}

#[derive(Debug, Subcommand)]
enum ExperimentAction {
    /// Start a new experiment (control defaults to the live thresholds)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, requires = "control_block")]
        control_challenge: Option<f64>,
        #[arg(long, requires = "control_challenge")]
        control_block: Option<f64>,
        #[arg(long)]
        variant_challenge: f64,
        #[arg(long)]
        variant_block: f64,
        /// Percent of sessions routed to the variant
        #[arg(long, default_value_t = 50.0)]
        split: f64,
        #[arg(long, default_value_t = 100)]
        min_samples: u64,
    },
    List,
    Pause { id: String },
    Resume { id: String },
    Complete { id: String },
    Delete { id: String },
    /// Draw an arm for a session. Assignments live only for one process,
    /// so a later invocation may draw a different arm.
    Assign {
        id: String,
        #[arg(long)]
        session: String,
    },
    /// Record an attempt result against one arm
    Record {
        id: String,
        #[arg(long)]
        arm: Arm,
        #[arg(long)]
        score: f64,
        #[arg(long, default_value_t = 0.0)]
        confidence: f64,
        #[arg(long)]
        recommendation: Recommendation,
        #[arg(long)]
        false_positive: bool,
    },
    /// Chi-squared test between the arms
    Significance {
        id: String,
        /// allowed, challenged, blocked or false_positives
        #[arg(long, default_value = "false_positives")]
        metric: Metric,
    },
    /// Winner recommendation on false-positive rate
    Recommend { id: String },
    /// Copy an arm's thresholds into production
    Promote {
        id: String,
        #[arg(long)]
        arm: Arm,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = GuardConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    log::debug!("{} v{} using {}", APP_NAME, APP_VERSION, config.data_dir.display());

    let storage = FileStorage::new(config.data_dir.clone()).with_quota(config.storage_quota_bytes);
    let guard = BotGuard::new(Arc::new(storage), Arc::new(ThreadRandom), &config);

    match cli.command {
        Command::Score {
            input,
            session,
            dry_run,
        } => {
            let input = commands::read_score_input(&input)
                .with_context(|| format!("reading score input {}", input.display()))?;
            if dry_run {
                print_json(&commands::score_input(&input))?;
            } else {
                print_json(&commands::evaluate_attempt(&guard, session.as_deref(), &input))?;
            }
        }
        Command::Ledger { action } => run_ledger(&guard, action)?,
        Command::Thresholds { action } => run_thresholds(&guard, action)?,
        Command::Experiment { action } => run_experiment(&guard, action)?,
    }

    Ok(())
}

fn run_ledger(guard: &BotGuard, action: LedgerAction) -> anyhow::Result<()> {
    match action {
        LedgerAction::List { limit } => print_json(&commands::list_attempts(guard, limit))?,
        LedgerAction::Stats => print_json(&commands::ledger_stats(guard))?,
        LedgerAction::Recommend => match commands::threshold_recommendation(guard) {
            Some(rec) => print_json(&rec)?,
            None => println!("No threshold change recommended"),
        },
        LedgerAction::Export { output, format } => {
            let count = commands::export_ledger(guard, &output, format)?;
            println!("Exported {} attempts to {}", count, output.display());
        }
        LedgerAction::Import { input } => {
            let count = commands::import_ledger(guard, &input)?;
            println!("Imported {} attempts from {}", count, input.display());
        }
        LedgerAction::Mark { id, unset } => {
            if !commands::mark_attempt(guard, &id, !unset)? {
                bail!("no attempt with id {}", id);
            }
        }
        LedgerAction::Clear => commands::clear_ledger(guard)?,
    }
    Ok(())
}

fn run_thresholds(guard: &BotGuard, action: ThresholdAction) -> anyhow::Result<()> {
    let config = match action {
        ThresholdAction::Get => commands::get_thresholds(guard),
        ThresholdAction::Set { challenge, block } => commands::set_thresholds(guard, challenge, block)?,
        ThresholdAction::Reset => commands::reset_thresholds(guard)?,
    };
    print_json(&config)
}

fn run_experiment(guard: &BotGuard, action: ExperimentAction) -> anyhow::Result<()> {
    match action {
        ExperimentAction::Create {
            name,
            description,
            control_challenge,
            control_block,
            variant_challenge,
            variant_block,
            split,
            min_samples,
        } => {
            let control = control_challenge
                .zip(control_block)
                .map(|(challenge, block)| ThresholdConfig::new(challenge, block));
            let experiment = commands::create_experiment(
                guard,
                &name,
                description,
                control,
                ThresholdConfig::new(variant_challenge, variant_block),
                split,
                min_samples,
            )?;
            print_json(&experiment)?;
        }
        ExperimentAction::List => print_json(&commands::list_experiments(guard))?,
        ExperimentAction::Pause { id } => print_json(&commands::pause_experiment(guard, &id)?)?,
        ExperimentAction::Resume { id } => print_json(&commands::resume_experiment(guard, &id)?)?,
        ExperimentAction::Complete { id } => print_json(&commands::complete_experiment(guard, &id)?)?,
        ExperimentAction::Delete { id } => commands::delete_experiment(guard, &id)?,
        ExperimentAction::Assign { id, session } => match commands::assign_session(guard, &session, &id) {
            Some(arm) => println!("{}", arm),
            None => println!("not participating (experiment unknown or not active)"),
        },
        ExperimentAction::Record {
            id,
            arm,
            score,
            confidence,
            recommendation,
            false_positive,
        } => commands::record_experiment_result(
            guard,
            &id,
            arm,
            score,
            confidence,
            recommendation,
            false_positive,
        )?,
        ExperimentAction::Significance { id, metric } => {
            print_json(&commands::experiment_significance(guard, &id, metric)?)?
        }
        ExperimentAction::Recommend { id } => print_json(&commands::winner_recommendation(guard, &id)?)?,
        ExperimentAction::Promote { id, arm } => print_json(&commands::promote_arm(guard, &id, arm)?)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
