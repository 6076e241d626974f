//! # Seed Data Generator
//!
//! Populates the database with partners, commission rules and sales for
//! local development.
//!
//! ## Usage
//! ```bash
//! # Generate 20 partners (default)
//! cargo run -p payout-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p payout-db --bin seed -- --partners 100
//!
//! # Specify database path
//! cargo run -p payout-db --bin seed -- --db ./data/payouts.db
//! ```
//!
//! ## Generated Data
//! - Partners alternate between the flat and acquisition commission models
//! - Every partner gets a second, cheaper rule from the 15th of last month
//! - Sales spread over last month, with some buyers returning so the
//!   first-purchase flag is exercised

use chrono::{DateTime, Duration, Utc};
use payout_core::{
    CommissionRule, Currency, Money, NewSale, Partner, Percentage, Period, PeriodCadence,
    SaleEligibility,
};
use payout_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Business names for generated partners
const BUSINESSES: &[&str] = &[
    "Harbour Tours",
    "Alpine Guides",
    "City Bike Rentals",
    "Sunset Cruises",
    "Old Town Walks",
    "Canyon Rafting",
    "Museum Passes",
    "Vineyard Tastings",
    "Night Food Tours",
    "Island Ferries",
];

/// Gross amounts in minor units, cycled through per sale
const PRICES: &[i64] = &[2_500, 4_900, 7_500, 12_000, 19_900, 35_000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut partners: usize = 20;
    let mut sales_per_partner: usize = 25;
    let mut db_path = String::from("./payouts_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--partners" | "-p" => {
                if i + 1 < args.len() {
                    partners = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales_per_partner = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Payout Engine Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --partners <N>  Number of partners to generate (default: 20)");
                println!("  -s, --sales <N>     Sales per partner (default: 25)");
                println!("  -d, --db <PATH>     Database file path (default: ./payouts_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, partners, sales_per_partner, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.partners().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has partners, skipping seed");
        return Ok(());
    }

    let now = Utc::now();
    let last_month = Period::containing(PeriodCadence::Monthly, now)?.previous(PeriodCadence::Monthly)?;
    let rule_change = last_month.start + Duration::days(14);
    let since = last_month.start - Duration::days(365);

    let start = std::time::Instant::now();
    let mut recorded = 0usize;

    for index in 0..partners {
        let partner = generate_partner(index, now);
        db.partners().upsert(&partner).await?;

        for rule in generate_rules(index, &partner.id, since, rule_change) {
            db.rules().insert(&rule).await?;
        }

        for n in 0..sales_per_partner {
            let sale = generate_sale(&partner, &last_month, index, n);
            if let Err(e) = db.sales().record(sale).await {
                warn!(partner_id = %partner.id, error = %e, "Failed to record sale");
                continue;
            }
            recorded += 1;
        }
    }

    let elapsed = start.elapsed();
    info!(
        partners,
        sales = recorded,
        period = %last_month,
        elapsed_ms = elapsed.as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

fn generate_partner(index: usize, now: DateTime<Utc>) -> Partner {
    let name = BUSINESSES[index % BUSINESSES.len()];
    let business_name = if index < BUSINESSES.len() {
        name.to_string()
    } else {
        format!("{} {}", name, index / BUSINESSES.len() + 1)
    };

    Partner {
        id: format!("partner-{:04}", index + 1),
        business_name,
        currency: if index % 4 == 3 { Currency::USD } else { Currency::EUR },
        payout_destination: format!("DE89{:018}", 370_400_440_532_013_000u64 + index as u64),
        created_at: now,
    }
}

fn generate_rules(
    index: usize,
    partner_id: &str,
    since: DateTime<Utc>,
    rule_change: DateTime<Utc>,
) -> Vec<CommissionRule> {
    let tax = Percentage::from_percent(if index % 3 == 0 { 20 } else { 0 });
    if index % 2 == 0 {
        vec![
            CommissionRule::flat(partner_id, Percentage::from_percent(15), tax, since),
            CommissionRule::flat(partner_id, Percentage::from_percent(12), tax, rule_change),
        ]
    } else {
        vec![
            CommissionRule::acquisition(
                partner_id,
                Percentage::from_percent(20),
                Percentage::from_percent(10),
                tax,
                since,
            ),
            CommissionRule::acquisition(
                partner_id,
                Percentage::from_percent(18),
                Percentage::from_percent(8),
                tax,
                rule_change,
            ),
        ]
    }
}

fn generate_sale(partner: &Partner, period: &Period, index: usize, n: usize) -> NewSale {
    let span = (period.end - period.start).num_minutes().max(1);
    let offset = ((n as i64 * 7_919 + index as i64 * 131) % span).max(0);

    NewSale {
        partner_id: partner.id.clone(),
        // Every third sale goes to a returning buyer
        buyer_id: format!("buyer-{}", if n % 3 == 2 { n / 3 } else { n }),
        gross_amount: Money::new(PRICES[(n + index) % PRICES.len()], partner.currency),
        occurred_at: period.start + Duration::minutes(offset),
        eligibility: if n % 5 == 0 {
            SaleEligibility::Confirmed
        } else {
            SaleEligibility::Paid
        },
    }
}
