use shapesync_core::CycleReport;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let mut scheduler = super::scheduler(super::load(global)?);
    super::cancel_on_shutdown(scheduler.cancel_token());

    let report = scheduler.run_cycle().await?;
    println!("{}", summarize(&report));
    for failure in &report.failures {
        match failure.service {
            Some(service) => println!("  {} {service}: {}", failure.router, failure.error),
            None => println!("  {}: {}", failure.router, failure.error),
        }
    }
    Ok(())
}

fn summarize(report: &CycleReport) -> String {
    let state = if report.write.changed() {
        "artifacts updated"
    } else {
        "artifacts unchanged"
    };
    format!(
        "{} circuits ({} static), {} failed sources, {} collisions: {state}",
        report.records,
        report.static_records,
        report.failures.len(),
        report.collisions,
    )
}
