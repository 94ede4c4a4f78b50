use super::ui;
use crate::core::config::AppConfig;
use crate::core::report::{self, MISSING, format_spot};
use crate::core::spot::{self, AggregationMode, GlobalResult, SkipReason, SpotRun};
use crate::core::{PriceProvider, ReferenceDataProvider};
use anyhow::{Result, bail};
use comfy_table::{Cell, Color};
use std::path::Path;
use tracing::info;

impl SpotRun {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("ISIN"),
            ui::header_cell("Ticker/Security"),
            ui::header_cell("Dates"),
            ui::header_cell("Values"),
            ui::header_cell("Spot"),
            ui::header_cell("Weight"),
        ]);

        for result in &self.underlyings {
            let values = result
                .observations
                .iter()
                .map(|o| match o.price() {
                    Some(p) => p.to_string(),
                    None => ui::style_text(MISSING, ui::StyleType::Subtle),
                })
                .collect::<Vec<_>>()
                .join(", ");

            let ticker = match result.spec.record.symbol() {
                Some(symbol) => Cell::new(symbol),
                None => Cell::new(MISSING).fg(Color::Red),
            };

            table.add_row(vec![
                Cell::new(result.spec.identifier.as_str()),
                ticker,
                Cell::new(result.spec.dates.join("\n")),
                Cell::new(values),
                ui::format_optional_cell(result.spot, format_spot),
                ui::format_optional_cell(Some(result.effective_weight), |w| format!("{w:.2}")),
            ]);
        }

        format!(
            "{}\n\n{}",
            ui::style_text("Individual results per underlying", ui::StyleType::Title),
            table
        )
    }
}

pub fn display_global(global: &GlobalResult) -> String {
    format!(
        "{}: {}\n{}",
        ui::style_text("Weighted global spot", ui::StyleType::TotalLabel),
        ui::style_text(&format_spot(global.spot), ui::StyleType::TotalValue),
        ui::style_text(
            &format!(
                "Mode: {} | {} contributing underlying(s), total weight {:.2}",
                global.mode.label(),
                global.contributors,
                global.total_weight
            ),
            ui::StyleType::Subtle
        )
    )
}

fn print_skipped(skipped: &[spot::SkippedUnderlying]) {
    for s in skipped {
        let line = match &s.reason {
            SkipReason::NoDates => ui::style_text(
                &format!("Missing dates for ISIN {}, underlying ignored.", s.input.trim()),
                ui::StyleType::Warning,
            ),
            reason => ui::style_text(
                &format!("Unable to retrieve data for ISIN {}: {}", s.input.trim(), reason),
                ui::StyleType::Error,
            ),
        };
        eprintln!("{line}");
    }
}

/// Resolves the configured underlyings, prices them and prints the results.
///
/// Fails when no underlying can be used or when no global spot can be
/// computed; in the latter case the table is still printed but nothing is
/// charted or exported.
pub async fn run(
    config: &AppConfig,
    mode_override: Option<AggregationMode>,
    export_path: Option<&Path>,
    resolver: &(dyn ReferenceDataProvider + Send + Sync),
    prices: &(dyn PriceProvider + Send + Sync),
) -> Result<SpotRun> {
    config.validate()?;
    let mode = mode_override.unwrap_or(config.mode);
    info!("Computing spots for {} underlyings ({})", config.underlyings.len(), mode);

    let pb = ui::new_progress_bar(config.underlyings.len() as u64, true);
    pb.set_message("Resolving instruments...");
    let preparation = spot::prepare_underlyings(&config.underlyings, resolver, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    print_skipped(&preparation.skipped);
    if preparation.specs.is_empty() {
        bail!("No valid underlying for the calculation");
    }

    let pb = ui::new_progress_bar(preparation.specs.len() as u64, true);
    pb.set_message("Fetching prices...");
    let mut run = spot::aggregate(&preparation.specs, mode, prices, &|| pb.inc(1)).await;
    pb.finish_and_clear();
    run.skipped = preparation.skipped;

    println!("{}", run.display_as_table());

    let global = run.global_or_err()?;
    ui::print_separator();
    println!("{}", display_global(global));

    let bars: Vec<(String, f64)> = run
        .underlyings
        .iter()
        .filter_map(|r| r.spot.map(|s| (r.spec.identifier.to_string(), s)))
        .collect();
    println!(
        "\n{}\n\n{}",
        ui::style_text("Spot per underlying", ui::StyleType::Title),
        ui::bar_chart(&bars, ui::terminal_width())
    );

    if let Some(path) = export_path {
        report::write_report(path, &report::report_rows(&run))?;
        println!("\nExported results to {}", path.display());
    }

    Ok(run)
}
