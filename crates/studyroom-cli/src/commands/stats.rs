use clap::Subcommand;
use studyroom_core::progress::{WeekProgress, WeekSlot};
use studyroom_core::storage::Database;
use studyroom_core::{Clock, Config, SystemClock};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Study minutes of one week (default: the current week)
    Week {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        week: Option<u32>,
    },
    /// All recorded weeks, newest first
    List,
}

pub fn run(action: StatsAction) -> CliResult {
    let config = Config::load()?;
    let user_id = config
        .user_id()
        .ok_or("identity.user_id is not set; run `config set identity.user_id <id>`")?
        .to_string();
    let db = Database::open()?;

    match action {
        StatsAction::Week { year, week } => {
            let current = WeekSlot::at(SystemClock.now_ms(), config.utc_offset());
            let year = year.unwrap_or(current.year);
            let week = week.unwrap_or(current.week);
            let progress = db
                .week_progress(&user_id, year, week)?
                .unwrap_or_else(|| WeekProgress::empty(year, week));
            print_json(&progress)?;
        }
        StatsAction::List => {
            let weeks = db.weeks_for_user(&user_id)?;
            print_json(&weeks)?;
        }
    }
    Ok(())
}
