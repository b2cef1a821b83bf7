use anyhow::Result;
use clap::Parser;
use market_radar::analyzer::gemini::GeminiClient;
use market_radar::config::Config;
use market_radar::email::LeadNotifier;
use market_radar::pipeline::{self, AuditRequest, AuditTarget};
use market_radar::places::PlacesClient;
use market_radar::review_file;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "radar", about = "Market expectations radar — audit a local market from the command line")]
struct Cli {
    /// Business name to audit (business mode), e.g. "Poet's Bakery, Old Town"
    #[arg(long, conflicts_with = "address")]
    business: Option<String>,

    /// Center address for category mode, e.g. "5000 Colon Ave"
    #[arg(long, requires = "categories")]
    address: Option<String>,

    /// Category term for category mode (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Search radius in kilometers
    #[arg(long)]
    radius_km: Option<f64>,

    /// Your contact email (recorded with the search)
    #[arg(long)]
    email: String,

    /// CSV with your own reviews for the private gap analysis
    #[arg(long)]
    reviews_file: Option<PathBuf>,

    /// Pick candidate N from the business search instead of the first (1-based)
    #[arg(long, default_value_t = 1)]
    pick: usize,

    /// Load config from a specific .env file
    #[arg(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env_file(cli.config_file.as_deref())?;
    let radius_km = cli.radius_km.unwrap_or(cfg.default_radius_km);

    info!("══════════════════════════════════════════════════════");
    info!("  MARKET RADAR — local market audit");
    info!("  Radius: {radius_km} km | Language: {}", cfg.language_code);
    info!("══════════════════════════════════════════════════════");

    if cfg.places_api_key.is_empty() {
        error!("PLACES_API_KEY must be set");
        std::process::exit(1);
    }
    if cfg.gemini_api_key.is_empty() {
        error!("GEMINI_API_KEY must be set");
        std::process::exit(1);
    }
    if !cli.email.contains('@') {
        error!("--email must be a valid address");
        std::process::exit(1);
    }

    let places = PlacesClient::new(&cfg.places_api_key, &cfg.language_code);
    let gemini = GeminiClient::new(&cfg.gemini_api_key);
    let notifier = LeadNotifier::new(
        &cfg.smtp_host, cfg.smtp_port, &cfg.smtp_user, &cfg.smtp_pass,
        &cfg.lead_from, &cfg.lead_to,
    );
    if notifier.is_configured() {
        info!("Lead notifications configured -> {}", cfg.lead_to);
    } else {
        warn!("Lead notifications NOT configured (set SMTP_* / LEAD_* env vars)");
    }

    let own_reviews = match &cli.reviews_file {
        Some(path) => {
            let reviews = review_file::load_reviews(path)?;
            if reviews.is_empty() {
                warn!("No review column found in {}, skipping gap analysis", path.display());
            } else {
                info!("Loaded {} own reviews for gap analysis", reviews.len());
            }
            reviews
        }
        None => Vec::new(),
    };

    let target = match (&cli.business, &cli.address) {
        (Some(query), _) => {
            if query.trim().len() < 3 {
                error!("--business query is too short");
                std::process::exit(1);
            }
            let candidates = match places.resolve_by_name(query).await {
                Ok(c) => c,
                Err(e) => {
                    error!("Business search failed: {e}");
                    std::process::exit(1);
                }
            };
            if candidates.is_empty() {
                error!("No businesses matched '{query}'");
                std::process::exit(1);
            }
            for (i, c) in candidates.iter().enumerate() {
                info!("  [{}] {}", i + 1, c);
            }
            let Some(candidate) = candidates.get(cli.pick.saturating_sub(1)) else {
                error!("--pick {} is out of range ({} candidates)", cli.pick, candidates.len());
                std::process::exit(1);
            };
            info!("Auditing: {candidate}");
            AuditTarget::Business(candidate.clone())
        }
        (None, Some(address)) => {
            if address.trim().len() < 6 {
                error!("--address is too short");
                std::process::exit(1);
            }
            if cli.categories.is_empty() {
                error!("Category mode needs at least one --category");
                std::process::exit(1);
            }
            let validated = match places.resolve_by_address(address).await {
                Ok(Some(v)) => v,
                Ok(None) => {
                    error!("Could not validate address '{address}'");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Address validation failed: {e}");
                    std::process::exit(1);
                }
            };
            info!("Validated address: {}", validated.formatted_address);
            AuditTarget::Area {
                center: validated,
                categories: cli.categories.clone(),
            }
        }
        (None, None) => {
            error!("Pass either --business or --address with --category");
            std::process::exit(1);
        }
    };

    let request = AuditRequest {
        target,
        radius_km,
        user_email: cli.email.clone(),
        own_reviews,
    };

    match pipeline::run_audit(&places, &gemini, &notifier, request).await {
        Ok(report) => {
            println!("{}", report.to_markdown());
            Ok(())
        }
        Err(e) => {
            error!("Audit failed: {e}");
            std::process::exit(1);
        }
    }
}
