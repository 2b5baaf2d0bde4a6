use clap::{Args, Parser, Subcommand};

// Required flags are `Option` here so that their absence is reported as a
// structured JSON error by the dispatcher rather than by clap.

#[derive(Parser, Debug)]
#[command(name = "proton-calendar", version, about = "Proton Calendar CLI (JSON output)")]
pub struct CalendarCli {
    /// Verbose logging to stderr.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Calendar id or name to act on (default: first calendar; list: all).
    #[arg(long, global = true, value_name = "ID|NAME")]
    pub calendar: Option<String>,

    #[command(subcommand)]
    pub command: CalendarCommand,
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// List events in a date range.
    List(EventListArgs),

    /// Get a single event.
    Get(IdArgs),

    /// Create an event.
    Create(EventCreateArgs),

    /// Update fields of an existing event.
    Update(EventUpdateArgs),

    /// Delete an event.
    Delete(IdArgs),

    /// List calendars on the account.
    Calendars,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IdArgs {
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EventListArgs {
    /// Range start (RFC 3339, YYYY-MM-DD[THH:MM]); default today.
    #[arg(long)]
    pub from: Option<String>,

    /// Range end; default 30 days after --from.
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EventCreateArgs {
    #[arg(long)]
    pub title: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,

    /// HH:MM
    #[arg(long)]
    pub time: Option<String>,

    /// Minutes (default 60).
    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub all_day: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EventUpdateArgs {
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub time: Option<String>,

    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "proton-mail", version, about = "Proton Mail CLI (JSON output)")]
pub struct MailCli {
    /// Verbose logging to stderr.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: MailCommand,
}

#[derive(Subcommand, Debug)]
pub enum MailCommand {
    /// List messages in a folder.
    List(MessageListArgs),

    /// Read a single message.
    Read(IdArgs),

    /// Send a plain-text message.
    Send(SendArgs),

    /// Reply to a message.
    Reply(ReplyArgs),

    /// Search messages.
    Search(SearchArgs),

    /// Delete a message.
    Delete(IdArgs),

    /// List folders and labels.
    Folders,
}

#[derive(Args, Debug, Clone)]
pub struct MessageListArgs {
    /// inbox, drafts, sent, trash, spam, all, archive.
    #[arg(long, default_value = "inbox")]
    pub folder: String,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SendArgs {
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,

    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReplyArgs {
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long)]
    pub query: Option<String>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}
