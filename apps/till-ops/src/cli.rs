//! # Command Line
//!
//! ```text
//! till-ops [--config PATH] <command> [args]
//!
//!   sweep                           run the integrity sweep once
//!   watch                           sweep periodically until Ctrl-C
//!   summary [DATE]                  daily summary (default: today, UTC)
//!   totals FROM TO                  net total per day
//!   items FROM TO [LIMIT]           best-selling items
//!   cashiers FROM TO                per-cashier performance
//!   corrections FROM TO             voids and refunds
//!   export FROM TO [COLUMNS]        raw sales rows, comma-separated columns
//!   stock                           every item with its stock level
//!   receipt SALE_ID                 header, lines and corrections
//!   history ITEM [LIMIT]            recent sales of one item
//!   recent [LIMIT]                  latest sale headers
//! ```
//!
//! Dates are `YYYY-MM-DD`, interpreted as UTC business days.

use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use till_core::ExportColumn;

use crate::error::{OpsError, OpsResult};

const DEFAULT_LIMIT: i64 = 20;

pub const USAGE: &str = "\
Usage: till-ops [--config PATH] <command> [args]

Commands:
  sweep                      Run the integrity sweep once
  watch                      Run the integrity sweep periodically until Ctrl-C
  summary [DATE]             Daily summary (default: today, UTC)
  totals FROM TO             Net total per day
  items FROM TO [LIMIT]      Best-selling items
  cashiers FROM TO           Per-cashier performance
  corrections FROM TO        Voids and refunds
  export FROM TO [COLUMNS]   Raw sales rows (comma-separated column names)
  stock                      Every item with its stock level
  receipt SALE_ID            Header, lines and corrections of one sale
  history ITEM [LIMIT]       Recent sales of one item
  recent [LIMIT]             Latest sale headers

Dates are YYYY-MM-DD (UTC).
Export columns: id, transaction_id, kind, cashier, total, timestamp, status,
                void_reason, void_authorized_by, voided_at, original_sale_id";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sweep,
    Watch,
    Summary { date: NaiveDate },
    Totals { from: NaiveDate, to: NaiveDate },
    Items { from: NaiveDate, to: NaiveDate, limit: i64 },
    Cashiers { from: NaiveDate, to: NaiveDate },
    Corrections { from: NaiveDate, to: NaiveDate },
    Export { from: NaiveDate, to: NaiveDate, columns: Vec<ExportColumn> },
    Stock,
    Receipt { sale_id: i64 },
    History { item: String, limit: i64 },
    Recent { limit: i64 },
    Help,
}

impl Command {
    /// The command word as typed.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Sweep => "sweep",
            Command::Watch => "watch",
            Command::Summary { .. } => "summary",
            Command::Totals { .. } => "totals",
            Command::Items { .. } => "items",
            Command::Cashiers { .. } => "cashiers",
            Command::Corrections { .. } => "corrections",
            Command::Export { .. } => "export",
            Command::Stock => "stock",
            Command::Receipt { .. } => "receipt",
            Command::History { .. } => "history",
            Command::Recent { .. } => "recent",
            Command::Help => "help",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

/// Parses arguments, excluding the program name.
pub fn parse(args: &[String]) -> OpsResult<Invocation> {
    let mut config_path = None;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| OpsError::usage("--config needs a path"))?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--help" | "-h" => {
                return Ok(Invocation {
                    config_path,
                    command: Command::Help,
                })
            }
            other => positional.push(other),
        }
        i += 1;
    }

    let (name, rest) = match positional.split_first() {
        Some((name, rest)) => (*name, rest),
        None => ("help", &[][..]),
    };

    let command = match name {
        "sweep" => Command::Sweep,
        "watch" => Command::Watch,
        "summary" => Command::Summary {
            date: match rest.first() {
                Some(date) => parse_date(date)?,
                None => Utc::now().date_naive(),
            },
        },
        "totals" => {
            let (from, to) = date_range(rest)?;
            Command::Totals { from, to }
        }
        "items" => {
            let (from, to) = date_range(rest)?;
            Command::Items {
                from,
                to,
                limit: optional_limit(rest.get(2))?,
            }
        }
        "cashiers" => {
            let (from, to) = date_range(rest)?;
            Command::Cashiers { from, to }
        }
        "corrections" => {
            let (from, to) = date_range(rest)?;
            Command::Corrections { from, to }
        }
        "export" => {
            let (from, to) = date_range(rest)?;
            Command::Export {
                from,
                to,
                columns: ExportColumn::parse_selection(rest.get(2).copied().unwrap_or("")),
            }
        }
        "stock" => Command::Stock,
        "receipt" => {
            let id = rest
                .first()
                .ok_or_else(|| OpsError::usage("receipt needs a sale id"))?;
            Command::Receipt {
                sale_id: id
                    .parse()
                    .map_err(|_| OpsError::usage(format!("invalid sale id: {}", id)))?,
            }
        }
        "history" => Command::History {
            item: rest
                .first()
                .ok_or_else(|| OpsError::usage("history needs an item name"))?
                .to_string(),
            limit: optional_limit(rest.get(1))?,
        },
        "recent" => Command::Recent {
            limit: optional_limit(rest.first())?,
        },
        "help" => Command::Help,
        other => return Err(OpsError::usage(format!("unknown command: {}", other))),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn parse_date(value: &str) -> OpsResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| OpsError::usage(format!("invalid date (expected YYYY-MM-DD): {}", value)))
}

fn date_range(rest: &[&str]) -> OpsResult<(NaiveDate, NaiveDate)> {
    match rest {
        [from, to, ..] => {
            let (from, to) = (parse_date(from)?, parse_date(to)?);
            if from > to {
                return Err(OpsError::usage(format!("range starts after it ends: {} > {}", from, to)));
            }
            Ok((from, to))
        }
        _ => Err(OpsError::usage("expected FROM and TO dates")),
    }
}

fn optional_limit(value: Option<&&str>) -> OpsResult<i64> {
    match value {
        None => Ok(DEFAULT_LIMIT),
        Some(v) => match v.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(OpsError::usage(format!("limit must be a positive integer: {}", v))),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_no_command_is_help() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
        assert_eq!(parse(&args("--help")).unwrap().command, Command::Help);
    }

    #[test]
    fn test_config_flag() {
        let inv = parse(&args("--config /etc/till/ledger.toml sweep")).unwrap();
        assert_eq!(inv.config_path, Some(PathBuf::from("/etc/till/ledger.toml")));
        assert_eq!(inv.command, Command::Sweep);

        assert!(parse(&args("sweep --config")).is_err());
    }

    #[test]
    fn test_summary_date() {
        let inv = parse(&args("summary 2026-10-18")).unwrap();
        assert_eq!(inv.command, Command::Summary { date: date("2026-10-18") });

        let err = parse(&args("summary 18/10/2026")).unwrap_err();
        assert_eq!(err.code, "USAGE");
    }

    #[test]
    fn test_export_columns_fall_back_to_default() {
        let inv = parse(&args("export 2026-10-01 2026-10-31 total,bogus,status")).unwrap();
        assert_eq!(
            inv.command,
            Command::Export {
                from: date("2026-10-01"),
                to: date("2026-10-31"),
                columns: vec![ExportColumn::Total, ExportColumn::Status],
            }
        );

        let inv = parse(&args("export 2026-10-01 2026-10-31 password")).unwrap();
        match inv.command {
            Command::Export { columns, .. } => assert_eq!(columns, ExportColumn::DEFAULT.to_vec()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ranges_and_limits() {
        assert!(parse(&args("totals 2026-10-31 2026-10-01")).is_err());
        assert!(parse(&args("totals 2026-10-01")).is_err());

        let inv = parse(&args("items 2026-10-01 2026-10-31 5")).unwrap();
        assert_eq!(
            inv.command,
            Command::Items {
                from: date("2026-10-01"),
                to: date("2026-10-31"),
                limit: 5
            }
        );

        assert_eq!(parse(&args("recent")).unwrap().command, Command::Recent { limit: 20 });
        assert!(parse(&args("recent 0")).is_err());
    }

    #[test]
    fn test_receipt_and_unknown() {
        assert_eq!(
            parse(&args("receipt 42")).unwrap().command,
            Command::Receipt { sale_id: 42 }
        );
        assert!(parse(&args("receipt abc")).is_err());
        assert!(parse(&args("refund 42")).is_err());
    }

    #[test]
    fn test_command_names_round_trip() {
        for line in ["sweep", "watch", "stock", "recent", "receipt 7", "history Beer"] {
            let command = parse(&args(line)).unwrap().command;
            assert_eq!(command.name(), line.split_whitespace().next().unwrap());
        }
    }
}
