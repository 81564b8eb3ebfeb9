use anyhow::{Error, format_err};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use stack_string::StackString;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use gcal_lib::datetimetype::{convert_datetime_to_str, convert_str_to_date};

use crate::{
    calendar_sync::{CalendarSync, PgCalendarSync, SyncRequest},
    config::Config,
    models::WorkspaceCalendarEvent,
    pgpool::PgPool,
    timezone::TimeZone,
};

fn parse_date(s: &str) -> Result<Date, Error> {
    convert_str_to_date(s)
}

fn check_window(start: OffsetDateTime, end: OffsetDateTime) -> Result<(), Error> {
    if end <= start {
        return Err(format_err!("start-date {start} must be before end-date {end}"));
    }
    Ok(())
}

#[derive(Subcommand, Debug)]
pub enum CalendarActions {
    /// Sync a workspace calendar with Google
    Sync {
        #[arg(short, long)]
        /// Workspace Id
        ws_id: StackString,
        #[arg(short, long)]
        /// User whose Google tokens are used
        user_id: Uuid,
        #[arg(short, long)]
        /// Google Calendar Id (defaults to `primary`)
        calendar_id: Option<StackString>,
        #[arg(long, value_parser=parse_date)]
        /// Start of the fallback window (defaults to one week ago)
        start_date: Option<Date>,
        #[arg(long, value_parser=parse_date)]
        /// End of the fallback window (defaults to four weeks ahead)
        end_date: Option<Date>,
    },
    /// Show the stored sync token
    ShowToken {
        #[arg(short, long)]
        ws_id: StackString,
    },
    /// Delete the stored sync token, forcing a date range sync
    ClearToken {
        #[arg(short, long)]
        ws_id: StackString,
    },
    /// List stored events
    ListEvents {
        #[arg(short, long)]
        ws_id: StackString,
        #[arg(long, value_parser=parse_date)]
        start_date: Option<Date>,
        #[arg(long, value_parser=parse_date)]
        end_date: Option<Date>,
    },
    /// Show recent sync runs
    SyncLogs {
        #[arg(short, long)]
        ws_id: StackString,
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
    /// Apply database migrations
    RunMigrations,
}

#[derive(Parser, Debug)]
pub struct CalendarCliOpts {
    #[command(subcommand)]
    action: CalendarActions,
}

fn format_event(event: &WorkspaceCalendarEvent) -> Result<StackString, Error> {
    let start = convert_datetime_to_str(event.start_at)?;
    let end = convert_datetime_to_str(event.end_at)?;
    let fields = [
        event.google_event_id.as_ref().map(StackString::as_str).unwrap_or(""),
        start.as_str(),
        end.as_str(),
        event.title.as_str(),
        event.location.as_ref().map(StackString::as_str).unwrap_or(""),
        event.color.as_ref().map(StackString::as_str).unwrap_or(""),
    ];
    Ok(fields.iter().join("\t").into())
}

impl CalendarCliOpts {
    /// # Errors
    /// Return error if config, db or sync fail
    pub async fn parse_opts() -> Result<(), Error> {
        let opts = Self::parse();

        let config = Config::init_config()?;
        let pool = PgPool::new(&config.database_url, config.n_db_workers)?;
        let cal_sync = CalendarSync::new(config, pool);

        opts.action.process(&cal_sync).await
    }
}

impl CalendarActions {
    async fn process(self, cal_sync: &PgCalendarSync) -> Result<(), Error> {
        let tz = cal_sync.config.default_time_zone.unwrap_or_else(TimeZone::utc);
        let to_datetime = |d: Option<Date>, default: OffsetDateTime| {
            d.map_or(default, |d| tz.local_midnight(d))
        };
        let (default_start, default_end) = cal_sync.default_sync_window();

        match self {
            Self::Sync {
                ws_id,
                user_id,
                calendar_id,
                start_date,
                end_date,
            } => {
                let start_date = to_datetime(start_date, default_start);
                let end_date = to_datetime(end_date, default_end);
                check_window(start_date, end_date)?;
                let request = SyncRequest {
                    ws_id,
                    user_id,
                    calendar_id,
                    start_date,
                    end_date,
                };
                let outcome = cal_sync.perform_incremental_sync(&request).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            Self::ShowToken { ws_id } => match cal_sync.get_sync_token(&ws_id).await? {
                Some(token) => println!(
                    "{} {} {}",
                    token.ws_id,
                    convert_datetime_to_str(token.updated_at)?,
                    token.token
                ),
                None => println!("no sync token for {ws_id}"),
            },
            Self::ClearToken { ws_id } => {
                if cal_sync.clear_sync_token(&ws_id).await? {
                    println!("cleared sync token for {ws_id}");
                } else {
                    println!("no sync token for {ws_id}");
                }
            }
            Self::ListEvents {
                ws_id,
                start_date,
                end_date,
            } => {
                let events = cal_sync
                    .list_events(
                        &ws_id,
                        to_datetime(start_date, default_start),
                        to_datetime(end_date, default_end),
                    )
                    .await?;
                for event in &events {
                    println!("{}", format_event(event)?);
                }
            }
            Self::SyncLogs { ws_id, limit } => {
                for log in cal_sync.get_sync_logs(&ws_id, limit).await? {
                    println!(
                        "{} {} {} {} inserted {} updated {} deleted {} {}",
                        convert_datetime_to_str(log.started_at)?,
                        log.calendar_id,
                        log.sync_type,
                        log.status,
                        log.events_inserted,
                        log.events_updated,
                        log.events_deleted,
                        log.error_message.as_ref().map(StackString::as_str).unwrap_or(""),
                    );
                }
            }
            Self::RunMigrations => {
                cal_sync.pool().run_migrations().await?;
            }
        }
        Ok(())
    }
}
