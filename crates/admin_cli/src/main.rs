use std::{error::Error, io::Write};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{DepositEligibility, Engine, NewUser, UserRole};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "passculture_admin")]
#[command(about = "Operator utilities for the pass Culture backend (users, deposits, finance jobs)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./passculture.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(alias = "users")]
    User(User),
    Deposit(Deposit),
    Bookings(Bookings),
    Finance(Finance),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
    /// Attaches a pro user to the offerer they work for.
    Attach(UserAttachArgs),
    /// Recredits underage beneficiaries whose birthday passed.
    Recredit(NowArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    email: String,
    /// One of `none`, `pro`, `admin`. Beneficiaries get their role from a deposit.
    #[arg(long, default_value = "none")]
    role: String,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
}

#[derive(Args, Debug)]
struct UserAttachArgs {
    #[arg(long)]
    user_id: Uuid,
    #[arg(long)]
    offerer_id: Uuid,
}

#[derive(Args, Debug)]
struct Deposit {
    #[command(subcommand)]
    command: DepositCommand,
}

#[derive(Subcommand, Debug)]
enum DepositCommand {
    Grant(DepositGrantArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Eligibility {
    Age18,
    Underage,
}

impl From<Eligibility> for DepositEligibility {
    fn from(value: Eligibility) -> Self {
        match value {
            Eligibility::Age18 => DepositEligibility::Age18,
            Eligibility::Underage => DepositEligibility::Underage,
        }
    }
}

#[derive(Args, Debug)]
struct DepositGrantArgs {
    #[arg(long)]
    user_id: Uuid,
    #[arg(long, value_enum)]
    eligibility: Eligibility,
    #[arg(long, default_value = "admin_cli")]
    source: String,
    /// Age to use instead of the validated birth date (underage grants).
    #[arg(long)]
    age: Option<i32>,
}

#[derive(Args, Debug)]
struct Bookings {
    #[command(subcommand)]
    command: BookingsCommand,
}

#[derive(Subcommand, Debug)]
enum BookingsCommand {
    /// Marks as used the bookings of events that ended 48h ago.
    AutoUse(NowArgs),
    /// Cancels the bookings that were never withdrawn.
    Expire(NowArgs),
}

#[derive(Args, Debug)]
struct Finance {
    #[command(subcommand)]
    command: FinanceCommand,
}

#[derive(Subcommand, Debug)]
enum FinanceCommand {
    PriceEvents(PriceEventsArgs),
    Cashflows(CashflowsArgs),
    Invoices(InvoicesArgs),
}

#[derive(Args, Debug)]
struct NowArgs {
    /// Reference date, RFC 3339. Defaults to the current time.
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct PriceEventsArgs {
    #[arg(long)]
    min_date: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct CashflowsArgs {
    /// Only pricings valued before this date are paid. Defaults to now.
    #[arg(long)]
    cutoff: Option<DateTime<Utc>>,
    /// Lifetime of the generation lock, in minutes.
    #[arg(long, default_value_t = engine::DEFAULT_CASHFLOW_LOCK_TIMEOUT_MINUTES)]
    lock_timeout_minutes: i64,
}

#[derive(Args, Debug)]
struct InvoicesArgs {
    #[arg(long)]
    batch_id: Uuid,
}

fn parse_role(raw: &str) -> Result<UserRole, String> {
    match UserRole::try_from(raw) {
        Ok(role) if !role.is_beneficiary() => Ok(role),
        Ok(role) => Err(format!("{role} is granted through a deposit")),
        Err(err) => Err(err.to_string()),
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let role = match parse_role(&args.role) {
                Ok(role) => role,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };
            let password = prompt_password_twice()?;

            let engine = Engine::builder().database(db).build().await?;
            let user = engine
                .create_user(NewUser {
                    email: args.email,
                    password,
                    first_name: args.first_name,
                    last_name: args.last_name,
                    date_of_birth: None,
                    role,
                })
                .await?;
            println!("created user: {} ({})", user.email, user.id);
        }
        Command::User(User {
            command: UserCommand::Attach(args),
        }) => {
            let engine = Engine::builder().database(db).build().await?;
            let attachment = engine
                .attach_user_to_offerer(args.user_id, args.offerer_id)
                .await?;
            println!(
                "attached user {} to offerer {}",
                attachment.user_id, attachment.offerer_id
            );
        }
        Command::User(User {
            command: UserCommand::Recredit(args),
        }) => {
            let engine = Engine::builder().database(db).build().await?;
            let count = engine
                .recredit_underage_users(args.now.unwrap_or_else(Utc::now))
                .await?;
            println!("recredited {count} users");
        }
        Command::Deposit(Deposit {
            command: DepositCommand::Grant(args),
        }) => {
            let engine = Engine::builder().database(db).build().await?;
            let deposit = engine
                .create_deposit(
                    args.user_id,
                    &args.source,
                    args.eligibility.into(),
                    args.age,
                    Utc::now(),
                )
                .await?;
            println!(
                "granted {} ({}) to {}",
                deposit.amount(),
                deposit.deposit_type,
                args.user_id
            );
        }
        Command::Bookings(Bookings { command }) => {
            let engine = Engine::builder().database(db).build().await?;
            match command {
                BookingsCommand::AutoUse(args) => {
                    let count = engine
                        .auto_mark_as_used_after_event(args.now.unwrap_or_else(Utc::now))
                        .await?;
                    println!("marked {count} bookings as used");
                }
                BookingsCommand::Expire(args) => {
                    let count = engine
                        .cancel_expired_bookings(args.now.unwrap_or_else(Utc::now))
                        .await?;
                    println!("cancelled {count} expired bookings");
                }
            }
        }
        Command::Finance(Finance { command }) => match command {
            FinanceCommand::PriceEvents(args) => {
                let engine = Engine::builder().database(db).build().await?;
                let summary = engine.price_events(args.min_date, Utc::now()).await?;
                println!(
                    "priced {}, failed {}, skipped {}",
                    summary.priced, summary.failed, summary.skipped
                );
            }
            FinanceCommand::Cashflows(args) => {
                let engine = Engine::builder()
                    .database(db)
                    .cashflow_lock_timeout(chrono::Duration::minutes(args.lock_timeout_minutes))
                    .build()
                    .await?;
                let now = Utc::now();
                let generation = engine
                    .generate_cashflows(args.cutoff.unwrap_or(now), now)
                    .await?;
                println!(
                    "batch {} ({}): {} cashflows, {} bank accounts skipped",
                    generation.batch.label,
                    generation.batch.id,
                    generation.cashflows.len(),
                    generation.skipped_bank_accounts.len()
                );
            }
            FinanceCommand::Invoices(args) => {
                let engine = Engine::builder().database(db).build().await?;
                let invoices = engine.generate_invoices(args.batch_id, Utc::now()).await?;
                for invoice in &invoices {
                    println!("{} {} cents", invoice.reference, invoice.amount);
                }
            }
        },
    }

    Ok(())
}
