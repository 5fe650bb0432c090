mod backend;
mod display;

use anyhow::{Context, bail};
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ritual_core::clock::{self, KST_OFFSET_HOURS};
use ritual_core::date::{MonthDay, format_date, normalize_date, parse_date};
use ritual_core::{
    Anniversary, CalendarType, Contact, Ping, PingKind, dday_label, lunar, upcoming_events,
};
use ritual_store::Storage;
use ritual_store::daily::{daily_picks, picked_contacts};
use serde::Serialize;

use crate::backend::StorageArgs;

#[derive(Parser)]
#[command(
    name = "ritual",
    version,
    about = "Anniversaries, lunar dates and daily contact care"
)]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    /// Owner of every row read or written.
    #[arg(long, env = "RITUAL_USER_ID", default_value = "local", global = true)]
    user: String,

    /// Hours east of UTC used for the calendar-day boundary.
    #[arg(
        long,
        env = "RITUAL_TZ_OFFSET",
        default_value_t = KST_OFFSET_HOURS,
        allow_negative_numbers = true,
        global = true
    )]
    tz_offset: i32,

    /// Pretend today is this date (YYYY-MM-DD).
    #[arg(long, global = true)]
    today: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Canonicalise MM/DD, MM-DD or YYYY-MM-DD input.
    Normalize { input: String },
    /// Convert a lunar month/day to its solar date.
    Lunar {
        /// Lunar MM-DD (or YYYY-MM-DD to take the year from the input).
        date: String,
        /// Lunar year; defaults to the input's year, then today's.
        #[arg(long)]
        year: Option<i32>,
        /// Treat DATE as a solar date and print its lunar date instead.
        #[arg(long)]
        reverse: bool,
    },
    /// Next occurrence of a stored date.
    Next {
        date: String,
        #[arg(long, default_value = "solar")]
        calendar: CalendarType,
        /// One-off event: resolve the stored date itself.
        #[arg(long)]
        once: bool,
    },
    /// D-Day label for a date relative to today.
    Dday { date: String },
    /// Manage anniversaries.
    Anniversary {
        #[command(subcommand)]
        action: AnniversaryAction,
    },
    /// Manage contacts and log care actions.
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },
    /// Today's recommended contacts.
    Picks,
    /// Anniversaries, birthdays and contact anniversaries by date.
    Upcoming {
        /// Only show events within this many days.
        #[arg(long)]
        within: Option<i64>,
    },
}

#[derive(Subcommand)]
enum AnniversaryAction {
    Add {
        title: String,
        /// YYYY-MM-DD, MM-DD or MM/DD.
        date: String,
        #[arg(long, default_value = "solar")]
        calendar: CalendarType,
        #[arg(long)]
        once: bool,
    },
    List,
    Remove { id: String },
}

#[derive(Subcommand)]
enum ContactAction {
    Add {
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        importance: Option<u8>,
        #[arg(long)]
        birthday: Option<String>,
        #[arg(long)]
        anniversary: Option<String>,
    },
    List,
    Remove { id: String },
    /// Record a call, message or share; updates last contacted.
    Ping {
        id: String,
        #[arg(long, default_value = "call")]
        kind: PingKind,
    },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Validate a stored "MM-DD plus optional year" value before it is written.
fn check_stored_date(input: &str, today: NaiveDate) -> anyhow::Result<()> {
    let md = MonthDay::parse(input).with_context(|| format!("invalid date {input:?}"))?;
    md.in_year(md.year_or(today.year()))
        .with_context(|| format!("invalid date {input:?}"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("ritual v{}", env!("CARGO_PKG_VERSION"));

    let Some(tz) = clock::offset_hours(cli.tz_offset) else {
        bail!("timezone offset {}h is out of range", cli.tz_offset);
    };
    let today = match &cli.today {
        Some(input) => parse_date(input, clock::today_in(&tz, Utc::now()))
            .with_context(|| format!("invalid --today {input:?}"))?,
        None => clock::today_in(&tz, Utc::now()),
    };

    run(&cli, &tz, today).await
}

async fn run(cli: &Cli, tz: &FixedOffset, today: NaiveDate) -> anyhow::Result<()> {
    match &cli.command {
        Command::Normalize { input } => {
            println!("{}", normalize_date(input, today));
        }
        Command::Lunar {
            date,
            year,
            reverse,
        } => {
            if *reverse {
                let solar = parse_date(date, today)?;
                let lunar = lunar::solar_to_lunar(solar)?;
                if cli.json {
                    return print_json(&lunar);
                }
                display::print_lunar_date(solar, &lunar);
            } else {
                let md = MonthDay::parse(date)?;
                let lunar_year = year.unwrap_or_else(|| md.year_or(today.year()));
                let solar = lunar::lunar_to_solar(md.month, md.day, lunar_year)?;
                if cli.json {
                    return print_json(&solar);
                }
                println!("{}", format_date(solar));
            }
        }
        Command::Next {
            date,
            calendar,
            once,
        } => {
            let next = ritual_core::next_occurrence(date, *calendar, !once, today)?;
            let dday = dday_label(next, today);
            if cli.json {
                return print_json(&serde_json::json!({ "date": next, "dday": dday }));
            }
            println!("{}  {}", format_date(next), dday.label);
        }
        Command::Dday { date } => {
            let target = parse_date(date, today)?;
            let dday = dday_label(target, today);
            if cli.json {
                return print_json(&dday);
            }
            display::print_dday(target, &dday);
        }
        Command::Anniversary { action } => anniversary(cli, action, today).await?,
        Command::Contact { action } => contact(cli, action, tz, today).await?,
        Command::Picks => {
            let storage = backend::open_storage(&cli.storage)?;
            let pick = daily_picks(storage.as_ref(), &cli.user, today, tz).await?;
            let contacts = storage.list_contacts(&cli.user).await?;
            let picked = picked_contacts(&contacts, &pick);
            if cli.json {
                return print_json(&pick);
            }
            display::print_picks(&picked, today, tz);
        }
        Command::Upcoming { within } => {
            let storage = backend::open_storage(&cli.storage)?;
            let anniversaries = storage.list_anniversaries(&cli.user).await?;
            let contacts = storage.list_contacts(&cli.user).await?;
            let mut events = upcoming_events(&anniversaries, &contacts, today);
            if let Some(days) = within {
                events.retain(|e| (0..=*days).contains(&e.dday.diff_days));
            }
            if cli.json {
                return print_json(&events);
            }
            display::print_upcoming(&events);
        }
    }
    Ok(())
}

async fn anniversary(
    cli: &Cli,
    action: &AnniversaryAction,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let storage = backend::open_storage(&cli.storage)?;
    match action {
        AnniversaryAction::Add {
            title,
            date,
            calendar,
            once,
        } => {
            check_stored_date(date, today)?;
            let ann = Anniversary {
                id: uuid::Uuid::new_v4().to_string(),
                title: title.clone(),
                date: date.clone(),
                calendar: *calendar,
                is_recurring: !once,
            };
            // Reject lunar dates the converter cannot place before storing them.
            ann.next_occurrence(today)
                .with_context(|| format!("cannot resolve {date:?} as a {calendar} date"))?;
            storage.upsert_anniversary(&cli.user, &ann).await?;
            if cli.json {
                return print_json(&ann);
            }
            println!("Added anniversary {}", ann.id);
        }
        AnniversaryAction::List => {
            let rows = storage.list_anniversaries(&cli.user).await?;
            if cli.json {
                return print_json(&rows);
            }
            display::print_anniversaries(&rows, today);
        }
        AnniversaryAction::Remove { id } => {
            if !storage.delete_anniversary(&cli.user, id).await? {
                bail!("no anniversary with id {id}");
            }
            println!("Removed anniversary {id}");
        }
    }
    Ok(())
}

async fn contact(
    cli: &Cli,
    action: &ContactAction,
    tz: &FixedOffset,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let storage = backend::open_storage(&cli.storage)?;
    match action {
        ContactAction::Add {
            name,
            phone,
            tags,
            importance,
            birthday,
            anniversary,
        } => {
            for stored in [birthday, anniversary].into_iter().flatten() {
                check_stored_date(stored, today)?;
            }
            let mut contact = Contact::new(uuid::Uuid::new_v4().to_string(), name.clone());
            contact.phone = phone.clone();
            contact.tags = tags.clone();
            contact.importance = *importance;
            contact.birthday = birthday.clone();
            contact.anniversary = anniversary.clone();
            storage.upsert_contact(&cli.user, &contact).await?;
            if cli.json {
                return print_json(&contact);
            }
            println!("Added contact {}", contact.id);
        }
        ContactAction::List => {
            let rows = storage.list_contacts(&cli.user).await?;
            if cli.json {
                return print_json(&rows);
            }
            display::print_contacts(&rows, today, tz);
        }
        ContactAction::Remove { id } => {
            if !storage.delete_contact(&cli.user, id).await? {
                bail!("no contact with id {id}");
            }
            println!("Removed contact {id}");
        }
        ContactAction::Ping { id, kind } => {
            let ping = Ping {
                contact_id: id.clone(),
                kind: *kind,
                at: Utc::now(),
            };
            storage
                .record_ping(&cli.user, &ping)
                .await
                .with_context(|| format!("logging {} for contact {id}", kind.as_str()))?;
            if cli.json {
                return print_json(&ping);
            }
            println!("Logged {} with {id}", kind.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn lunar_command_parses_year() {
        let cli = parse(&["ritual", "lunar", "01-01", "--year", "2025"]);
        match cli.command {
            Command::Lunar {
                date,
                year,
                reverse,
            } => {
                assert_eq!(date, "01-01");
                assert_eq!(year, Some(2025));
                assert!(!reverse);
            }
            _ => panic!("expected lunar"),
        }
    }

    #[test]
    fn anniversary_add_parses_calendar() {
        let cli = parse(&[
            "ritual",
            "anniversary",
            "add",
            "Grandma",
            "08-15",
            "--calendar",
            "lunar",
        ]);
        match cli.command {
            Command::Anniversary {
                action:
                    AnniversaryAction::Add {
                        calendar, once, ..
                    },
            } => {
                assert_eq!(calendar, CalendarType::Lunar);
                assert!(!once);
            }
            _ => panic!("expected anniversary add"),
        }
    }

    #[test]
    fn contact_add_collects_tags() {
        let cli = parse(&[
            "ritual",
            "contact",
            "add",
            "Jisoo",
            "--tag",
            "family",
            "--tag",
            "college",
            "--importance",
            "3",
        ]);
        match cli.command {
            Command::Contact {
                action:
                    ContactAction::Add {
                        tags, importance, ..
                    },
            } => {
                assert_eq!(tags, ["family", "college"]);
                assert_eq!(importance, Some(3));
            }
            _ => panic!("expected contact add"),
        }
    }

    #[test]
    fn importance_outside_range_is_rejected() {
        let result = Cli::try_parse_from([
            "ritual",
            "contact",
            "add",
            "Jisoo",
            "--importance",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_offset_and_global_flags() {
        let cli = parse(&["ritual", "picks", "--tz-offset", "-5", "--json"]);
        assert_eq!(cli.tz_offset, -5);
        assert!(cli.json);
    }

    #[test]
    fn stored_dates_are_checked() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert!(check_stored_date("12-25", today).is_ok());
        assert!(check_stored_date("02/29", today).is_ok());
        assert!(check_stored_date("13-01", today).is_err());
        assert!(check_stored_date("04-31", today).is_err());
    }
}
