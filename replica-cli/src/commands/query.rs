//! `replica query` — one statement against the replica, synced afterwards.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tabled::builder::Builder;
use tabled::settings::Style;

use replica_core::StatusStore;
use replica_daemon::ReplicaService;
use replica_sync::{LibsqlDriver, Rows, SqlValue};

use super::{home_dir, load_config, local_runtime};

/// Arguments for `replica query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL statement; bind positional `?` parameters with trailing args.
    pub sql: String,

    /// Positional parameters. Integers, reals and `null` are typed, the rest bind as text.
    pub params: Vec<String>,

    /// Emit rows as a JSON array of arrays.
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = load_config(&home)?;
        let service = ReplicaService::new(Arc::new(LibsqlDriver::new()), config, StatusStore::new());
        let params = self.params.iter().map(|raw| parse_param(raw)).collect();

        let rows = local_runtime()?
            .block_on(service.execute_query(&self.sql, params))
            .context("query failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize rows")?
            );
        } else {
            print_rows(&rows);
        }
        Ok(())
    }
}

fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        return SqlValue::Null;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return SqlValue::Integer(value);
    }
    if let Ok(value) = raw.parse::<f64>() {
        return SqlValue::Real(value);
    }
    SqlValue::Text(raw.to_owned())
}

fn print_rows(rows: &Rows) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        println!("({} rows)", rows.len());
        return;
    }

    let mut builder = Builder::default();
    builder.push_record((1..=width).map(|i| format!("#{i}")));
    for row in rows {
        builder.push_record((0..width).map(|i| row.get(i).map(render_value).unwrap_or_default()));
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");
    println!("({} rows)", rows.len());
}

fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Real(v) => v.to_string(),
        SqlValue::Text(v) => v.clone(),
        SqlValue::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
