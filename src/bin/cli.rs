//! `pwsafe3-cli`: a thin command-line front end over the `pwsafe3` library,
//! implementing `spec.md` §6's command surface. Grounded on
//! `bin/pwsafe-matrix/src/main.rs`'s use of `clap` + `eyre` + `tracing` for
//! exactly this kind of CLI plumbing; this binary is a new command surface
//! (`dump`/`get`/`init`/`add`/`delete`/`update` instead of a Matrix bot) over
//! the same three crates.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{eyre, Context, Result};
use uuid::Uuid;

use pwsafe3::codecs::timestamp::Timestamp;
use pwsafe3::{Record, RecordField, Safe};

#[derive(Parser)]
#[command(name = "pwsafe3-cli", about = "Inspect and edit Password Safe v3 databases")]
struct Cli {
    /// Path to the .psafe3 database file.
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every record, optionally restricted to a set of fields.
    Dump {
        #[arg(long = "display")]
        display: Vec<String>,
    },
    /// Print one record looked up by UUID or title.
    Get {
        #[arg(long)]
        uuid: Option<Uuid>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "display")]
        display: Vec<String>,
    },
    /// Create a brand-new, empty database.
    Init {
        #[arg(long)]
        dbname: Option<String>,
        #[arg(long)]
        dbdesc: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Add a new record.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD HH:MM")]
        expires: Option<String>,
    },
    /// Remove a record by UUID.
    Delete {
        #[arg(long)]
        uuid: Uuid,
    },
    /// Change one or more fields of an existing record.
    Update {
        #[arg(long)]
        uuid: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD HH:MM")]
        expires: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Init { dbname, dbdesc, username } => {
            let password = read_password()?;
            let mut safe = Safe::create_new(&cli.file, password.as_bytes())?;
            {
                let headers = safe.headers_mut()?;
                if let Some(name) = dbname {
                    headers.set_db_name(name.clone());
                }
                if let Some(desc) = dbdesc {
                    headers.set_db_description(desc.clone());
                }
                if let Some(user) = username {
                    headers.set_last_save_user(user.clone(), false);
                }
            }
            safe.save(true)?;
            println!("created {}", cli.file.display());
            Ok(())
        }
        Command::Dump { display } => {
            let password = read_password()?;
            let safe = Safe::open(&cli.file, password.as_bytes(), true)?;
            for record in safe.records().records() {
                print_record(record, display);
                println!();
            }
            Ok(())
        }
        Command::Get { uuid, title, display } => {
            let password = read_password()?;
            let safe = Safe::open(&cli.file, password.as_bytes(), true)?;
            let record = find_record(&safe, *uuid, title.as_deref())?;
            print_record(record, display);
            Ok(())
        }
        Command::Add {
            title,
            username,
            password,
            url,
            email,
            group,
            expires,
        } => {
            let master_password = read_password()?;
            let mut safe = Safe::open(&cli.file, master_password.as_bytes(), false)?;
            let uuid = Uuid::new_v4();
            let mut record = Record::new(uuid, title.clone(), password.clone());
            if let Some(u) = username {
                record.set(RecordField::Username(u.clone()));
            }
            if let Some(u) = url {
                record.set(RecordField::Url(u.clone()));
            }
            if let Some(e) = email {
                record.set(RecordField::Email(e.clone()));
            }
            if let Some(g) = group {
                record.set(RecordField::Group(g.clone()));
            }
            if let Some(exp) = expires {
                record.set(RecordField::PasswordExpiryTime(parse_expires(exp)?));
            }
            safe.add_record(record)?;
            safe.save(true)?;
            println!("added {uuid}");
            Ok(())
        }
        Command::Delete { uuid } => {
            let password = read_password()?;
            let mut safe = Safe::open(&cli.file, password.as_bytes(), false)?;
            safe.remove_record(*uuid)?;
            safe.save(true)?;
            println!("deleted {uuid}");
            Ok(())
        }
        Command::Update {
            uuid,
            title,
            username,
            password,
            url,
            email,
            group,
            expires,
        } => {
            let master_password = read_password()?;
            let mut safe = Safe::open(&cli.file, master_password.as_bytes(), false)?;
            let record = safe.record_mut(*uuid)?;
            if let Some(t) = title {
                record.set(RecordField::Title(t.clone()));
            }
            if let Some(u) = username {
                record.set(RecordField::Username(u.clone()));
            }
            if let Some(p) = password {
                record.set(RecordField::Password(p.clone()));
            }
            if let Some(u) = url {
                record.set(RecordField::Url(u.clone()));
            }
            if let Some(e) = email {
                record.set(RecordField::Email(e.clone()));
            }
            if let Some(g) = group {
                record.set(RecordField::Group(g.clone()));
            }
            if let Some(exp) = expires {
                let ts = parse_expires(exp)?;
                record.set(RecordField::PasswordExpiryTime(ts));
            }
            safe.save(true)?;
            println!("updated {uuid}");
            Ok(())
        }
    }
}

fn find_record<'a>(safe: &'a Safe, uuid: Option<Uuid>, title: Option<&str>) -> Result<&'a Record> {
    if let Some(uuid) = uuid {
        return Ok(safe.records().find(uuid)?);
    }
    if let Some(title) = title {
        return safe
            .records()
            .records()
            .iter()
            .find(|r| r.title() == Some(title))
            .ok_or_else(|| eyre!("no record titled {title:?}"));
    }
    Err(eyre!("--uuid or --title is required"))
}

fn print_record(record: &Record, display: &[String]) {
    let fields: &[(&str, Option<&str>)] = &[
        ("title", record.title()),
        ("username", record.username()),
        ("password", record.password()),
        ("url", record.url()),
        ("email", record.email()),
        ("group", record.group()),
    ];
    let wanted = |name: &str| display.is_empty() || display.iter().any(|d| d.eq_ignore_ascii_case(name));

    if let Some(uuid) = record.uuid() {
        println!("uuid: {uuid}");
    }
    for (name, value) in fields {
        if wanted(name) {
            if let Some(value) = value {
                println!("{name}: {value}");
            }
        }
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("PWSAFE3_PASSWORD") {
        return Ok(password);
    }
    print!("password: ");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Parses `YYYY-MM-DD HH:MM` into a `Timestamp` (seconds since the Unix
/// epoch, UTC). No `chrono`/`time` dependency exists in this crate's stack,
/// so the civil-calendar-to-days conversion is Howard Hinnant's well-known
/// `days_from_civil` formula, done by hand.
fn parse_expires(input: &str) -> Result<Timestamp> {
    let (date, time) = input
        .split_once(' ')
        .ok_or_else(|| eyre!("expected \"YYYY-MM-DD HH:MM\", got {input:?}"))?;

    let mut date_parts = date.split('-');
    let year: i64 = date_parts.next().ok_or_else(|| eyre!("missing year"))?.parse().context("year")?;
    let month: u32 = date_parts.next().ok_or_else(|| eyre!("missing month"))?.parse().context("month")?;
    let day: u32 = date_parts.next().ok_or_else(|| eyre!("missing day"))?.parse().context("day")?;

    let mut time_parts = time.split(':');
    let hour: i64 = time_parts.next().ok_or_else(|| eyre!("missing hour"))?.parse().context("hour")?;
    let minute: i64 = time_parts.next().ok_or_else(|| eyre!("missing minute"))?.parse().context("minute")?;

    let days = days_from_civil(year, month, day);
    let secs = days * 86_400 + hour * 3_600 + minute * 60;
    if secs < 0 {
        return Err(eyre!("date is before the Unix epoch"));
    }
    Ok(Timestamp(secs as u32))
}

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_from_civil_matches_known_epoch() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
    }

    #[test]
    fn parse_expires_round_trips_a_known_instant() {
        let ts = parse_expires("1970-01-01 00:00").unwrap();
        assert_eq!(ts.0, 0);
        let ts = parse_expires("1970-01-01 00:01").unwrap();
        assert_eq!(ts.0, 60);
    }

    #[test]
    fn parse_expires_rejects_malformed_input() {
        assert!(parse_expires("not a date").is_err());
    }
}
