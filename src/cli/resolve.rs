use super::ui;
use crate::core::{Identifier, InstrumentRecord, ReferenceDataProvider};
use anyhow::{Result, bail};
use comfy_table::Cell;
use tracing::debug;

/// Payload fields shown for a resolved instrument, in display order.
const DISPLAY_FIELDS: [(&str, &str); 6] = [
    ("figi", "FIGI"),
    ("name", "Name"),
    ("ticker", "Ticker"),
    ("exchCode", "Exchange"),
    ("securityType", "Security type"),
    ("marketSector", "Market sector"),
];

impl InstrumentRecord {
    pub fn display_as_table(&self, identifier: &Identifier) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);

        for (key, label) in DISPLAY_FIELDS {
            table.add_row(vec![
                Cell::new(label),
                ui::format_optional_cell(self.field(key), str::to_string),
            ]);
        }
        table.add_row(vec![
            Cell::new("Price symbol"),
            ui::format_optional_cell(self.symbol(), str::to_string),
        ]);

        format!(
            "ISIN: {}\n\n{}",
            ui::style_text(identifier.as_str(), ui::StyleType::Title),
            table
        )
    }
}

/// Resolves each identifier and prints its reference data.
pub async fn run(
    identifiers: &[String],
    resolver: &(dyn ReferenceDataProvider + Send + Sync),
) -> Result<()> {
    let mut failures = 0;

    for (i, raw) in identifiers.iter().enumerate() {
        if i > 0 {
            ui::print_separator();
        }

        let identifier = match Identifier::new(raw) {
            Ok(id) => id,
            Err(e) => {
                failures += 1;
                eprintln!("{}", ui::style_text(&format!("{raw:?}: {e}"), ui::StyleType::Error));
                continue;
            }
        };

        match resolver.resolve(&identifier).await {
            Ok(record) => {
                debug!("Resolved {}: {:?}", identifier, record.symbol());
                println!("{}", record.display_as_table(&identifier));
            }
            Err(e) => {
                failures += 1;
                eprintln!(
                    "{}",
                    ui::style_text(
                        &format!("Unable to retrieve data for ISIN {identifier}: {e:#}"),
                        ui::StyleType::Error
                    )
                );
            }
        }
    }

    if failures > 0 {
        bail!("Failed to resolve {} of {} identifier(s)", failures, identifiers.len());
    }
    Ok(())
}
