//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive the scheduler (or a single tick)
//! - add: create a task or meeting, optionally recurring
//! - list: list stored items
//! - occurrences: expand an item's recurrence over a horizon
//! - complete / cancel / reopen: explicit lifecycle commands

use cadence::domain::{
    Channel, EndCondition, Frequency, ItemKind, OffsetUnit, RecurrenceRule, ReminderSpec, SchedulableItem,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cadence - recurrence and lifecycle engine for tasks and meetings
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute; lists items when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Run {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Add a task, or a meeting when --end is given
    Add(AddArgs),

    /// List items
    List {
        /// Filter by status (pending, in_progress, completed, cancelled)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show upcoming occurrences of a recurring item
    Occurrences {
        /// Item ID
        id: String,

        /// Horizon in days (defaults to display.horizon_days)
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum occurrences to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Mark an item completed
    Complete {
        /// Item ID to complete
        id: String,
    },

    /// Cancel an item
    Cancel {
        /// Item ID to cancel
        id: String,
    },

    /// Reopen a completed or cancelled item
    Reopen {
        /// Item ID to reopen
        id: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<RepeatArg> for Frequency {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Daily => Frequency::Daily,
            RepeatArg::Weekly => Frequency::Weekly,
            RepeatArg::Monthly => Frequency::Monthly,
            RepeatArg::Yearly => Frequency::Yearly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitArg {
    Minutes,
    Hours,
    Days,
}

impl From<UnitArg> for OffsetUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Minutes => OffsetUnit::Minutes,
            UnitArg::Hours => OffsetUnit::Hours,
            UnitArg::Days => OffsetUnit::Days,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelArg {
    InApp,
    Email,
    Both,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::InApp => Channel::InApp,
            ChannelArg::Email => Channel::Email,
            ChannelArg::Both => Channel::Both,
        }
    }
}

/// Arguments of `cadence add`
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Title of the task or meeting
    pub title: String,

    /// Due time of a task, start time of a meeting (UTC)
    #[arg(long, value_parser = parse_instant)]
    pub at: DateTime<Utc>,

    /// End time; makes the item a meeting
    #[arg(long, value_parser = parse_instant)]
    pub end: Option<DateTime<Utc>>,

    /// Repeat frequency
    #[arg(short, long, value_enum)]
    pub repeat: Option<RepeatArg>,

    /// Repeat every N periods
    #[arg(long, default_value_t = 1, requires = "repeat")]
    pub every: i64,

    /// Weekdays for weekly rules, 0 = Sunday (e.g. --on 1,3)
    #[arg(long = "on", value_delimiter = ',', requires = "repeat")]
    pub weekdays: Vec<i64>,

    /// Day of month for monthly rules
    #[arg(long, requires = "repeat")]
    pub month_day: Option<i64>,

    /// Last date the series may occur on
    #[arg(long, value_parser = parse_date, conflicts_with = "count", requires = "repeat")]
    pub until: Option<NaiveDate>,

    /// Number of occurrences in the series
    #[arg(long, requires = "repeat")]
    pub count: Option<u32>,

    /// Reminder offset before the item's time
    #[arg(long)]
    pub remind: Option<i64>,

    /// Unit of the reminder offset
    #[arg(long, value_enum, default_value_t = UnitArg::Minutes)]
    pub remind_unit: UnitArg,

    /// Reminder delivery channel
    #[arg(long, value_enum, default_value_t = ChannelArg::InApp)]
    pub channel: ChannelArg,
}

impl AddArgs {
    pub fn kind(&self) -> ItemKind {
        if self.end.is_some() {
            ItemKind::Meeting
        } else {
            ItemKind::Task
        }
    }

    /// Recurrence rule described by the flags, if any
    pub fn rule(&self) -> cadence::Result<Option<RecurrenceRule>> {
        let Some(repeat) = self.repeat else {
            return Ok(None);
        };

        let mut builder = RecurrenceRule::builder(repeat.into())
            .interval(self.every)
            .weekdays(self.weekdays.iter().copied());
        if let Some(day) = self.month_day {
            builder = builder.month_day(day);
        }
        builder = match (self.until, self.count) {
            (Some(date), _) => builder.until(date),
            (None, Some(n)) => builder.count(n),
            (None, None) => builder.ends(EndCondition::Never),
        };
        Ok(Some(builder.build()?))
    }

    /// Reminder described by the flags, if any
    pub fn reminder(&self) -> cadence::Result<Option<ReminderSpec>> {
        self.remind
            .map(|value| ReminderSpec::new(value, self.remind_unit.into(), self.channel.into()))
            .transpose()
            .map_err(Into::into)
    }

    /// Build the item to insert under `id`
    pub fn to_item(&self, id: String) -> cadence::Result<SchedulableItem> {
        let mut item = match self.end {
            Some(end) => SchedulableItem::meeting(id, self.title.clone(), self.at, end),
            None => SchedulableItem::task(id, self.title.clone(), self.at),
        };
        item.recurrence = self.rule()?;
        item.reminder = self.reminder()?;
        Ok(item)
    }
}

/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM` read as UTC
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid time '{}': expected RFC 3339 or YYYY-MM-DD HH:MM", s))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::EngineError;
    use chrono::{TimeZone, Weekday};
    use clap::CommandFactory;

    fn add_args(extra: &[&str]) -> AddArgs {
        let mut argv = vec!["cadence", "add", "Standup", "--at", "2024-05-06 09:00"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Add(args)) => args,
            _ => panic!("Expected add command"),
        }
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["cadence"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["cadence", "list", "-v", "-c", "/path/to/cadence.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/cadence.yml")));
    }

    #[test]
    fn test_run_once() {
        let cli = Cli::try_parse_from(["cadence", "run", "--once"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run { once: true })));
    }

    #[test]
    fn test_list_with_status() {
        let cli = Cli::try_parse_from(["cadence", "list", "-s", "in_progress"]).unwrap();
        match cli.command {
            Some(Commands::List { status }) => assert_eq!(status.as_deref(), Some("in_progress")),
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_occurrences_defaults() {
        let cli = Cli::try_parse_from(["cadence", "occurrences", "task-1"]).unwrap();
        match cli.command {
            Some(Commands::Occurrences { id, days, limit }) => {
                assert_eq!(id, "task-1");
                assert!(days.is_none());
                assert_eq!(limit, 20);
            }
            _ => panic!("Expected occurrences command"),
        }
    }

    #[test]
    fn test_lifecycle_commands() {
        let cli = Cli::try_parse_from(["cadence", "complete", "t1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Complete { id }) if id == "t1"));
        let cli = Cli::try_parse_from(["cadence", "cancel", "t1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Cancel { id }) if id == "t1"));
        let cli = Cli::try_parse_from(["cadence", "reopen", "t1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Reopen { id }) if id == "t1"));
    }

    #[test]
    fn test_add_plain_task() {
        let args = add_args(&[]);
        assert_eq!(args.kind(), ItemKind::Task);
        let item = args.to_item("t1".to_string()).unwrap();
        assert_eq!(item.anchor_time, Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap());
        assert!(item.recurrence.is_none());
        assert!(item.reminder.is_none());
    }

    #[test]
    fn test_add_weekly_meeting_with_reminder() {
        let args = add_args(&[
            "--end",
            "2024-05-06T09:30:00Z",
            "--repeat",
            "weekly",
            "--on",
            "1,3",
            "--count",
            "10",
            "--remind",
            "1",
            "--remind-unit",
            "hours",
            "--channel",
            "both",
        ]);
        assert_eq!(args.kind(), ItemKind::Meeting);

        let item = args.to_item("m1".to_string()).unwrap();
        let rule = item.recurrence.unwrap();
        assert_eq!(rule.frequency(), Frequency::Weekly);
        assert_eq!(rule.weekdays(), &[Weekday::Mon, Weekday::Wed]);
        assert_eq!(rule.end_condition(), EndCondition::AfterCount(10));

        let reminder = item.reminder.unwrap();
        assert_eq!(reminder.offset_unit(), OffsetUnit::Hours);
        assert_eq!(reminder.channel(), Channel::Both);
    }

    #[test]
    fn test_add_invalid_rule_is_validation_error() {
        let args = add_args(&["--repeat", "daily", "--on", "1"]);
        let err = args.to_item("t1".to_string()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let args = add_args(&["--repeat", "daily", "--every", "0"]);
        assert!(args.rule().is_err());
    }

    #[test]
    fn test_add_until_conflicts_with_count() {
        let result = Cli::try_parse_from([
            "cadence",
            "add",
            "x",
            "--at",
            "2024-05-06 09:00",
            "--repeat",
            "daily",
            "--until",
            "2024-06-01",
            "--count",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        assert_eq!(parse_instant("2024-05-06T09:00:00Z"), Ok(expected));
        assert_eq!(parse_instant("2024-05-06T11:00:00+02:00"), Ok(expected));
        assert_eq!(parse_instant("2024-05-06 09:00"), Ok(expected));
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }
}
