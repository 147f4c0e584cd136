use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use visitor_stats::analytics::{StatisticsReport, VisitorTracker};
use visitor_stats::config::Config;
use visitor_stats::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "visitor-stats-admin")]
#[command(about = "Visitor statistics admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statistics report for the configured window
    Stats,
    /// Register an image in the gallery catalog
    AddImage {
        /// Title shown in the gallery breakdown
        title: String,
        /// Image file name
        #[arg(long)]
        filename: Option<String>,
    },
    /// List the gallery catalog
    Images,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Stats => {
            let tracker = VisitorTracker::new(Arc::clone(&storage), config.tracking.clone());
            let report = tracker
                .try_get_statistics()
                .await
                .context("failed to build statistics report")?;
            print_report(&report);
        }
        Commands::AddImage { title, filename } => {
            let image = storage
                .create_gallery_image(&title, filename.as_deref())
                .await?;
            println!("✓ Added gallery image #{} '{}'", image.id, image.title);
        }
        Commands::Images => {
            let images = storage.list_gallery_images().await?;
            if images.is_empty() {
                println!("No gallery images found.");
            } else {
                println!("{:<8} {:<40} {}", "ID", "Title", "Filename");
                println!("{}", "-".repeat(80));
                for image in images {
                    println!(
                        "{:<8} {:<40} {}",
                        image.id,
                        image.title,
                        image.filename.as_deref().unwrap_or("N/A")
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &StatisticsReport) {
    println!(
        "Statistics {} .. {} ({} days with data)",
        report.window_start,
        report.window_end,
        report.daily_stats.len()
    );
    println!("{}", "-".repeat(80));
    println!("{:<24} {}", "Total visits", report.total_visits);
    println!("{:<24} {}", "Unique visitors", report.unique_visitors);
    println!("{:<24} {}", "Gallery views", report.total_gallery_views);
    println!("{:<24} {:.1}s", "Average duration", report.avg_duration);

    let b = &report.browser_stats;
    println!(
        "{:<24} Chrome {} / Firefox {} / Safari {} / Edge {} / Other {}",
        "Browsers", b.chrome, b.firefox, b.safari, b.edge, b.other
    );
    let os = &report.os_stats;
    println!(
        "{:<24} Windows {} / Mac {} / Linux {} / iOS {} / Android {} / Other {}",
        "Operating systems", os.windows, os.mac, os.linux, os.ios, os.android, os.other
    );
    println!(
        "{:<24} Desktop {} / Mobile {}",
        "Devices", report.device_stats.desktop, report.device_stats.mobile
    );
    println!(
        "{:<24} Analytics {} / Necessary only {}",
        "Cookie consent", report.cookie_consent.analytics, report.cookie_consent.only_necessary
    );

    if !report.page_visits.is_empty() {
        println!("\nPages:");
        for entry in &report.page_visits {
            println!("  {:<40} {}", entry.name, entry.count);
        }
    }

    if !report.gallery_views.is_empty() {
        println!("\nGallery:");
        for entry in &report.gallery_views {
            println!("  {:<40} {}", entry.name, entry.count);
        }
    }

    for day in &report.daily_unique_ips {
        if day.visitors.is_empty() {
            continue;
        }
        println!("\n{} ({} visitors):", day.date, day.visitors.len());
        for visitor in &day.visitors {
            println!("  {:<40} {}", visitor.ip_address, visitor.visit_count);
        }
    }
}
