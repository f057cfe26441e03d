//! CLI argument parsing for the stockimport-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::ImportJobType;

#[derive(Parser)]
#[command(name = "stockimport-worker", about = "Background CSV import worker for stock data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Create the import tables and exit
    Migrate,
    /// Import a single CSV file in-process and print the final status
    Import {
        /// Kind of CSV file
        #[arg(long, value_enum)]
        kind: ImportKind,
        /// Path to the CSV file
        #[arg(long)]
        file: PathBuf,
        /// Target symbol (historical prices only)
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    ListedStocks,
    HistoricalPrices,
}

impl From<ImportKind> for ImportJobType {
    fn from(kind: ImportKind) -> Self {
        match kind {
            ImportKind::ListedStocks => ImportJobType::ListedStocksCsv,
            ImportKind::HistoricalPrices => ImportJobType::HistoricalPricesCsv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["stockimport-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["stockimport-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["stockimport-worker", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_import_command_parses() {
        let cli = Cli::parse_from([
            "stockimport-worker",
            "import",
            "--kind",
            "historical-prices",
            "--file",
            "msft.csv",
            "--symbol",
            "MSFT",
        ]);

        match cli.command {
            Some(Command::Import { kind, file, symbol }) => {
                assert_eq!(ImportJobType::from(kind), ImportJobType::HistoricalPricesCsv);
                assert_eq!(file, PathBuf::from("msft.csv"));
                assert_eq!(symbol.as_deref(), Some("MSFT"));
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn test_cli_import_requires_file() {
        assert!(Cli::try_parse_from(["stockimport-worker", "import", "--kind", "listed-stocks"]).is_err());
    }
}
