//! Test Applicant Producer
//!
//! Generates random loan applications and publishes them to NATS for
//! end-to-end testing of the serving loop.

use clap::Parser;
use loan_approval::LoanApplication;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "test-applicant", about = "Publish random loan applications to NATS")]
struct Args {
    /// NATS server URL
    #[arg(long, default_value = "nats://localhost:4222")]
    nats_url: String,
    /// Subject to publish applications on
    #[arg(long, default_value = "loan.applications")]
    subject: String,
    /// Number of applications to publish
    #[arg(long, default_value_t = 100)]
    count: u64,
    /// Fraction of applications that are high risk
    #[arg(long, default_value_t = 0.3)]
    risky_rate: f64,
    /// Delay between messages in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

/// Application generator for testing
struct ApplicantGenerator {
    rng: rand::rngs::ThreadRng,
    next_client_id: u32,
}

impl ApplicantGenerator {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        let next_client_id = rng.gen_range(10_000_000..90_000_000);
        Self {
            rng,
            next_client_id,
        }
    }

    fn client_id(&mut self) -> String {
        self.next_client_id += 1;
        self.next_client_id.to_string()
    }

    /// Established applicant with a modest loan
    fn generate_solid(&mut self) -> LoanApplication {
        let income = self.rng.gen_range(45_000.0..150_000.0f64).round();
        let loan = (income * self.rng.gen_range(0.05..0.25)).round();
        LoanApplication {
            client_id: Some(self.client_id()),
            person_age: self.rng.gen_range(28..60) as f64,
            person_gender: self.random_choice(&["male", "female"]).to_string(),
            person_education: self
                .random_choice(&["Bachelor", "Master", "Doctorate", "Associate"])
                .to_string(),
            person_income: income,
            person_emp_exp: self.rng.gen_range(4..25) as f64,
            person_home_ownership: self.random_choice(&["MORTGAGE", "OWN", "RENT"]).to_string(),
            loan_amnt: loan,
            loan_intent: self
                .random_choice(&["EDUCATION", "HOMEIMPROVEMENT", "PERSONAL", "VENTURE"])
                .to_string(),
            loan_int_rate: (self.rng.gen_range(5.0..11.0f64) * 100.0).round() / 100.0,
            loan_percent_income: ((loan / income) * 100.0).round() / 100.0,
            cb_person_cred_hist_length: self.rng.gen_range(5..20) as f64,
            credit_score: self.rng.gen_range(660..820) as f64,
            previous_loan_defaults_on_file: "No".to_string(),
        }
    }

    /// Thin-file applicant with a prior default or a stretched loan
    fn generate_risky(&mut self) -> LoanApplication {
        let income = self.rng.gen_range(15_000.0..45_000.0f64).round();
        // Occasionally ask for more than income to exercise the pre-check
        let loan = (income * self.rng.gen_range(0.3..1.2)).round();
        LoanApplication {
            client_id: Some(self.client_id()),
            person_age: self.rng.gen_range(20..30) as f64,
            person_gender: self.random_choice(&["male", "female"]).to_string(),
            person_education: self.random_choice(&["High School", "Associate"]).to_string(),
            person_income: income,
            person_emp_exp: self.rng.gen_range(0..3) as f64,
            person_home_ownership: self.random_choice(&["RENT", "OTHER"]).to_string(),
            loan_amnt: loan,
            loan_intent: self
                .random_choice(&["MEDICAL", "DEBTCONSOLIDATION", "PERSONAL"])
                .to_string(),
            loan_int_rate: (self.rng.gen_range(13.0..20.0f64) * 100.0).round() / 100.0,
            loan_percent_income: ((loan / income) * 100.0).round() / 100.0,
            cb_person_cred_hist_length: self.rng.gen_range(2..5) as f64,
            credit_score: self.rng.gen_range(480..620) as f64,
            previous_loan_defaults_on_file: self.random_choice(&["Yes", "No"]).to_string(),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_applicant=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(
        nats_url = %args.nats_url,
        subject = %args.subject,
        count = args.count,
        risky_rate = args.risky_rate,
        delay_ms = args.delay_ms,
        "Starting test applicant producer"
    );

    let client = match async_nats::connect(&args.nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            Some(c)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            None
        }
    };

    let mut generator = ApplicantGenerator::new();
    let mut rng = rand::thread_rng();
    let mut solid_count = 0u64;
    let mut risky_count = 0u64;

    for i in 0..args.count {
        let application = if rng.gen_bool(args.risky_rate.clamp(0.0, 1.0)) {
            risky_count += 1;
            generator.generate_risky()
        } else {
            solid_count += 1;
            generator.generate_solid()
        };

        match &client {
            Some(client) => {
                let payload = serde_json::to_vec(&application)?;
                client.publish(args.subject.clone(), payload.into()).await?;
                if (i + 1) % 10 == 0 {
                    info!(
                        published = i + 1,
                        total = args.count,
                        solid = solid_count,
                        risky = risky_count,
                        "Publishing progress"
                    );
                }
            }
            None => {
                if i == 0 || (i + 1) % 10 == 0 {
                    info!(
                        "Sample application {}:\n{}",
                        i + 1,
                        serde_json::to_string_pretty(&application)?
                    );
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    if let Some(client) = client {
        client.flush().await?;
    }

    info!(
        total = args.count,
        solid = solid_count,
        risky = risky_count,
        "Completed"
    );

    Ok(())
}
