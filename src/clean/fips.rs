use std::collections::HashSet;

use super::{CleanReport, parse_code};
use crate::error::{PipelineError, Result};
use crate::records::FipsRecord;
use crate::table::RawTable;

/// Projects the state reference table onto [`FipsRecord`]s.
///
/// The fips code is the table's key, so a repeated code is an error rather
/// than something the merge would silently fan out.
#[tracing::instrument(skip(table), fields(table = %table.name, rows = table.shape().0))]
pub fn clean_fips(table: &RawTable) -> Result<(Vec<FipsRecord>, CleanReport)> {
    let fips_idx = table.require_column("fips")?;
    let postal_idx = table.require_column("postal")?;
    let name_idx = table.require_column("name")?;

    let mut report = CleanReport::new(&table.name, table.rows().len());
    let mut records = Vec::with_capacity(table.rows().len());
    let mut seen = HashSet::new();

    for (i, row) in table.rows().iter().enumerate() {
        let field = move |idx: usize| row.get(idx).unwrap_or("").trim();

        let Some(fips) = parse_code(field(fips_idx), "fips", i + 1)? else {
            report.drop_row("missing fips");
            continue;
        };

        if !seen.insert(fips) {
            return Err(PipelineError::DuplicateKey {
                table: table.name.clone(),
                key: fips.to_string(),
            });
        }

        records.push(FipsRecord {
            fips,
            postal: field(postal_idx).to_ascii_uppercase(),
            name: field(name_idx).to_string(),
        });
    }

    report.rows_out = records.len();
    report.log();

    Ok((records, report))
}
