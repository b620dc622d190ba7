// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bank_ledger_rs::logging::init_logging;
use bank_ledger_rs::{
    AccountCategory, DepositRequest, Engine, EngineConfig, LedgerError, Request,
    SettlementRequest, TransactionId, TransactionKind, TransferMode, TransferPayload,
    TransferRequest,
};
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use tracing::{info, warn};

/// Bank Ledger - Replay a script of banking commands
///
/// Reads commands from a CSV file, applies them to a fresh ledger and writes
/// the resulting accounts or transactions to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "Replays banking commands against an in-memory ledger", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,user,counterparty,source,destination,direction,tx,amount
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// YAML file with seed balances for newly registered users
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// What to print once the script has run
    #[arg(long, value_enum, default_value_t = Output::Accounts)]
    output: Output,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Accounts,
    Transactions,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Error initialising logging: {}", e);
        process::exit(1);
    }

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = Engine::with_config(config);
    if let Err(e) = process_commands(&engine, BufReader::new(file)) {
        eprintln!("Error processing commands: {}", e);
        process::exit(1);
    }

    let written = match args.output {
        Output::Accounts => write_accounts(&engine, std::io::stdout()),
        Output::Transactions => write_transactions(&engine, std::io::stdout()),
    };
    if let Err(e) = written {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the script format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    user: String,
    counterparty: Option<String>,
    source: Option<String>,
    destination: Option<String>,
    direction: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tx: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Register(String),
    Submit { user: String, request: Request },
}

fn parse_opt<T>(field: Option<String>) -> Result<Option<T>, LedgerError>
where
    T: FromStr<Err = LedgerError>,
{
    field.filter(|s| !s.is_empty()).map(|s| s.parse()).transpose()
}

impl CsvRecord {
    /// Converts a CSV record into an engine command.
    fn into_command(self) -> Result<Command, LedgerError> {
        let request = match self.op.to_lowercase().as_str() {
            "register" => return Ok(Command::Register(self.user)),
            "deposit" => {
                let category: Option<AccountCategory> = parse_opt(self.source)?;
                Request::Deposit(DepositRequest {
                    category: category
                        .ok_or_else(|| LedgerError::InvalidRequest("account required".into()))?,
                    amount: self.amount,
                })
            }
            "transfer" => Request::Transfer(TransferRequest::try_from(TransferPayload {
                mode: TransferMode::BetweenAccounts,
                source_category: parse_opt(self.source)?,
                dest_category: parse_opt(self.destination)?,
                dest_username: None,
                direction: None,
                amount: self.amount,
            })?),
            "request" => Request::Transfer(TransferRequest::try_from(TransferPayload {
                mode: TransferMode::BetweenUsers,
                source_category: None,
                dest_category: None,
                dest_username: self.counterparty,
                direction: parse_opt::<TransactionKind>(self.direction)?,
                amount: self.amount,
            })?),
            action @ ("accept" | "decline" | "cancel") => {
                let transaction_id = self
                    .tx
                    .map(TransactionId)
                    .ok_or_else(|| LedgerError::InvalidRequest("missing transaction id".into()))?;
                Request::Settle(SettlementRequest {
                    action: action.parse()?,
                    transaction_id,
                })
            }
            other => {
                return Err(LedgerError::InvalidRequest(format!("unknown op '{other}'")));
            }
        };
        Ok(Command::Submit {
            user: self.user,
            request,
        })
    }
}

/// Applies commands from a CSV reader to `engine`.
///
/// Rows are streamed. Malformed rows, unknown users and rejected requests are
/// logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `op, user, counterparty, source, destination, direction, tx, amount`
///
/// | op | uses |
/// |----|------|
/// | register | user |
/// | deposit | user, source (category), amount |
/// | transfer | user, source, destination (categories), amount |
/// | request | user, counterparty, direction (send/receive), amount |
/// | accept / decline / cancel | user, tx |
///
/// # Example
///
/// ```csv
/// op,user,counterparty,source,destination,direction,tx,amount
/// register,alice,,,,,,
/// transfer,alice,,checking,savings,,,100.00
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
pub fn process_commands<R: Read>(engine: &Engine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed row");
                continue;
            }
        };

        match record.into_command() {
            Ok(Command::Register(username)) => match engine.register_user(&username) {
                Ok(user) => info!(line, %user, %username, "registered"),
                Err(e) => warn!(line, %username, error = %e, "registration rejected"),
            },
            Ok(Command::Submit { user, request }) => {
                let Ok(user_id) = engine.user_id(&user) else {
                    warn!(line, %user, "skipping command for unknown user");
                    continue;
                };
                let notice = engine.handle(user_id, request);
                info!(line, %user, success = notice.success, message = %notice.message, "handled");
            }
            Err(e) => warn!(line, error = %e, "skipping invalid command"),
        }
    }

    Ok(())
}

/// Writes every account as CSV: `user, account, category, balance`.
pub fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in engine.accounts() {
        wtr.serialize(account.as_ref())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the ledger history as CSV in creation order.
pub fn write_transactions<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for transaction in engine.history() {
        wtr.serialize(&transaction)?;
    }
    wtr.flush()?;
    Ok(())
}
