//! Loan Approval Pipeline - Main Entry Point
//!
//! Trains and evaluates the loan approval model, predicts single
//! applications, and serves decisions over NATS.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use loan_approval::{
    config::{AppConfig, LoggingConfig},
    consumer::{self, ApplicationConsumer},
    evaluation,
    metrics::MetricsReporter,
    producer::DecisionProducer,
    training, LoanApplication, ServingSession,
};
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "loan-approval", version, about = "Loan approval model pipeline")]
struct Cli {
    /// Configuration file [default: config/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the preprocessor and forest, then save the model artifact
    Train,
    /// Score the saved model on the held-out split and write reports
    Evaluate,
    /// Decide a single application read as JSON
    Predict {
        /// JSON file with one application, or "-" for stdin
        #[arg(long, short)]
        input: String,
    },
    /// Consume applications from NATS and publish decisions
    Serve,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging)?;
    debug!(path = ?cli.config, "Configuration loaded");

    match cli.command {
        Command::Train => {
            let outcome = training::train_pipeline(&config)?;
            let metadata = outcome.artifact.metadata();
            println!(
                "Trained {} trees on {} rows ({} held out), training accuracy {:.4}",
                outcome.artifact.forest().n_trees(),
                metadata.train_rows,
                metadata.test_rows,
                outcome.train_accuracy
            );
            println!("Model saved to {}", config.paths.model.display());
        }
        Command::Evaluate => {
            let outcome = evaluation::evaluate_pipeline(&config)?;
            print!("{}", evaluation::render_metrics(&outcome.report));
            println!("Reports written to {}", config.paths.reports_dir.display());
        }
        Command::Predict { input } => predict(&config, &input)?,
        Command::Serve => serve(&config).await?,
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("loan_approval={}", logging.level).parse()?);

    // stdout carries command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}

fn predict(config: &AppConfig, input: &str) -> Result<()> {
    let session = ServingSession::open(&config.paths.model)?;

    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read application from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read application from {}", input))?
    };
    let application: LoanApplication =
        serde_json::from_str(&raw).context("Failed to parse application JSON")?;

    let decision = session.decide(&application);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

async fn serve(config: &AppConfig) -> Result<()> {
    info!("Starting Loan Approval Service");

    let session = ServingSession::open(&config.paths.model)?;

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = ApplicationConsumer::new(client.clone(), &config.nats.application_subject);
    let producer = DecisionProducer::new(client.clone(), &config.nats.decision_subject);
    info!(
        applications = consumer.subject(),
        decisions = producer.subject(),
        "Serving decisions"
    );

    let reporter = MetricsReporter::new(
        session.metrics().clone(),
        config.serving.metrics_interval_secs,
    );
    let reporter_handle = tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = subscription.next() => {
                let Some(message) = message else {
                    warn!("Subscription closed");
                    break;
                };
                handle_message(&session, &producer, &message.payload).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    reporter_handle.abort();
    info!("Service shutting down...");
    session.metrics().print_summary();

    Ok(())
}

async fn handle_message(session: &ServingSession, producer: &DecisionProducer, payload: &[u8]) {
    let start = Instant::now();

    let application = match consumer::decode(payload) {
        Ok(application) => application,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize application");
            return;
        }
    };

    let decision = session.decide(&application);

    if let Err(e) = producer.publish(&decision).await {
        error!(
            decision_id = %decision.decision_id,
            error = %e,
            "Failed to publish decision"
        );
        return;
    }

    info!(
        client_id = ?decision.client_id,
        decision = %decision.decision,
        approval_probability = ?decision.approval_probability,
        rejection_reason = ?decision.rejection_reason,
        processing_time_us = start.elapsed().as_micros() as u64,
        "Decision published"
    );
}
