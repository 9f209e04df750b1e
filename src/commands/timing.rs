//! `timing`: estadísticas de tiempos derivadas de los timestamps del state
//! store. Siempre sale 0 (informativo).

use std::path::Path;
use std::process::ExitCode;

use dock_core::{latest_generation, CoreError, StateStore, TimingReport, TimingStats};
use dock_persistence::FsCampaignStore;

pub fn run(config_path: &Path) -> Result<ExitCode, CoreError> {
    let (_cfg, layout) = super::load(config_path)?;
    let campaign = layout.load_campaign()?;
    let store = FsCampaignStore::new(layout.clone());
    let latest = latest_generation(&store.list(campaign.id)?);
    let report = TimingReport::build(&latest);

    println!("batch timing (seconds) for campaign {}:", campaign.id);
    print_stats("run", report.run_stats.as_ref());
    print_stats("queue wait", report.queue_stats.as_ref());
    match report.wall_span_secs {
        Some(span) => println!("  campaign wall-clock span: {span:.3}"),
        None => println!("  campaign wall-clock span: n/a"),
    }
    if report.missing > 0 {
        println!("{} tasks have no timing information yet", report.missing);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_stats(label: &str, stats: Option<&TimingStats>) {
    let Some(stats) = stats else {
        println!("  {label}: no data");
        return;
    };
    println!("  {label}:");
    println!("    number of tasks: {}", stats.count);
    println!("    sum: {:.3}", stats.sum);
    println!("    mean: {:.3}", stats.mean);
    println!("    median: {:.3}", stats.median);
    match stats.stdev {
        Some(sd) => println!("    standard deviation: {sd:.3}"),
        None => println!("    standard deviation: insufficient data"),
    }
    let top: Vec<String> = stats.top3.iter().map(|t| format!("{t:.3}")).collect();
    println!("    top 3: {}", top.join(", "));
}
