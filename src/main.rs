use std::path::PathBuf;

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use health_risk_engine::analytics::HealthAnalytics;
use health_risk_engine::calendar::CalendarFormatter;
use health_risk_engine::config::AnalyticsConfig;
use health_risk_engine::db;
use health_risk_engine::models::HealthJournal;
use health_risk_engine::prediction::PredictionEngine;
use health_risk_engine::report::{render_markdown, ReportAssembler};
use health_risk_engine::repository::InMemoryStore;
use health_risk_engine::risk;
use health_risk_engine::score::{score_label, ScoreEngine};
use health_risk_engine::trend::{ComparisonMode, TrendEngine};

#[derive(Parser)]
#[command(name = "health-risk-engine")]
#[command(about = "Health journal scoring, risk tiers, trends and glycemia forecasts", long_about = None)]
struct Cli {
    /// TOML file with analytics settings (defaults to $HEALTH_ENGINE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the BMI used for the weight sub-score
    #[arg(long, global = true)]
    bmi: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import journal entries from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score a journal
    Score {
        #[arg(long)]
        journal: Uuid,
    },
    /// Assess the risk tier of a journal
    Risk {
        #[arg(long)]
        journal: Uuid,
    },
    /// Assess a single set of readings without touching the database
    QuickCheck {
        #[arg(long)]
        glycemia: Option<f64>,
        #[arg(long)]
        systolic: Option<i32>,
        #[arg(long)]
        sleep: Option<i32>,
        #[arg(long, default_value_t = 0)]
        intensity: i32,
    },
    /// Compare a journal with an earlier one
    Trend {
        #[arg(long)]
        journal: Uuid,
        #[arg(long)]
        year_over_year: bool,
    },
    /// Forecast glycemia from a user's history
    Predict {
        #[arg(long)]
        user: Uuid,
    },
    /// Export calendar events as JSON
    Calendar {
        #[arg(long)]
        journal: Uuid,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        journal: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_journal(
    pool: &PgPool,
    journal_id: Uuid,
) -> anyhow::Result<(HealthJournal, InMemoryStore)> {
    let journal = db::fetch_journal(pool, journal_id)
        .await?
        .with_context(|| format!("health journal {journal_id} not found"))?;
    let store = db::load_user_store(pool, journal.user_id).await?;
    Ok((journal, store))
}

fn print_assessment(assessment: &risk::RiskAssessment) {
    println!(
        "Risk: {} (score {:.3})",
        assessment.tier.label(),
        assessment.overall_score
    );
    println!("{}", assessment.summary);
    if assessment.requires_immediate_attention {
        println!("Requires immediate attention.");
    }
    for factor in &assessment.factors {
        println!(
            "- {} (severity {:.2}): {}",
            factor.name, factor.severity, factor.description
        );
    }
    for recommendation in &assessment.recommendations {
        println!("  * {recommendation}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AnalyticsConfig::load(cli.config.as_deref())
        .context("failed to load analytics config")?
        .with_bmi(cli.bmi)
        .context("invalid --bmi")?;
    let scorer = ScoreEngine::new(config.default_bmi);
    let today = Local::now().date_naive();

    if let Commands::QuickCheck {
        glycemia,
        systolic,
        sleep,
        intensity,
    } = cli.command
    {
        print_assessment(&risk::quick_check(glycemia, systolic, sleep, intensity));
        return Ok(());
    }

    let pool = connect().await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted for user {}.", db::SEED_USER_ID);
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} entries from {}.", csv.display());
        }
        Commands::Score { journal } => {
            let (journal, store) = load_journal(&pool, journal).await?;
            let analytics = HealthAnalytics::new(&store, &store, scorer, today.year());
            let bundle = analytics.analytics_for_journal(&journal);

            if !bundle.scores.has_data() {
                println!("No entries found for journal {}.", journal.name);
                return Ok(());
            }

            let scores = &bundle.scores;
            println!(
                "{}: global {:.2} ({}, grade {}) over {} entries",
                journal.name,
                scores.global,
                score_label(scores.global),
                scores.grade,
                bundle.statistics.entry_count
            );
            println!(
                "- glycemic {:.2}, blood pressure {:.2}, sleep {:.2}, symptom {:.2}, weight {:.2}",
                scores.glycemic, scores.blood_pressure, scores.sleep, scores.symptom, scores.weight
            );
        }
        Commands::Risk { journal } => {
            let (journal, store) = load_journal(&pool, journal).await?;
            let analytics = HealthAnalytics::new(&store, &store, scorer, today.year());
            let statistics = analytics.analytics_for_journal(&journal).statistics;
            print_assessment(&risk::assess_statistics(&statistics));
        }
        Commands::QuickCheck { .. } => unreachable!("handled before connecting"),
        Commands::Trend {
            journal,
            year_over_year,
        } => {
            let (journal, store) = load_journal(&pool, journal).await?;
            let analytics = HealthAnalytics::new(&store, &store, scorer, today.year());
            let engine = TrendEngine::new(&analytics);
            let mode = if year_over_year {
                ComparisonMode::YearOverYear
            } else {
                ComparisonMode::Previous
            };
            let trend = engine.compare(&journal, mode);

            println!(
                "Direction: {} ({:+.2}%)",
                trend.direction.as_str(),
                trend.global_evolution
            );
            if let (Some(start), Some(end)) =
                (trend.previous_period_start, trend.previous_period_end)
            {
                println!("Compared with {start} to {end}");
            }
            for (metric, evolution) in &trend.metric_evolutions {
                match evolution {
                    Some(value) => println!("- {}: {value:+.2}%", metric.as_str()),
                    None => println!("- {}: no data", metric.as_str()),
                }
            }

            println!("Recent journals:");
            for snapshot in engine.trend_summary(&journal, config.trend_summary_journals) {
                println!(
                    "- {}: global {:.2} ({})",
                    snapshot.journal.name, snapshot.scores.global, snapshot.scores.grade
                );
            }
        }
        Commands::Predict { user } => {
            let store = db::load_user_store(&pool, user).await?;
            let prediction = PredictionEngine::new(&store).predict_for_user(user);
            match (prediction.successful, prediction.predicted_glycemia) {
                (true, Some(value)) => println!(
                    "Predicted glycemia {value:.2} g/L from {} entries (confidence {})",
                    prediction.entries_used,
                    prediction.confidence.as_str()
                ),
                _ => println!(
                    "{}",
                    prediction.message.as_deref().unwrap_or("No prediction available.")
                ),
            }
        }
        Commands::Calendar { journal, out } => {
            let (journal, store) = load_journal(&pool, journal).await?;
            let events = CalendarFormatter::new(&store, &store, scorer).events_for_journal(&journal);
            let json = serde_json::to_string_pretty(&events)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Wrote {} events to {}.", events.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Report { journal, out } => {
            let (journal, store) = load_journal(&pool, journal).await?;
            let analytics = HealthAnalytics::new(&store, &store, scorer, today.year());
            let report = ReportAssembler::new(&analytics, config.report_lookback_days)
                .assemble(&journal, today);
            std::fs::write(&out, render_markdown(&report))?;
            info!(journal = %journal.id, tier = report.risk.tier.as_str(), "report generated");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
