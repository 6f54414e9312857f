use clap::ValueEnum;
use colored::Colorize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use loyalty_engine::{
    BonusOutcome, LoyaltyReport, PeriodSummary, RankedEntry, ReportSink, SlotGroup, Totals,
};

use crate::util::csv_field;

pub const SLOTWISE_EXPORT: &str = "slotwise_loyalty_points.csv";
pub const RANKING_EXPORT: &str = "monthly_ranking.csv";
pub const BONUS_EXPORT: &str = "bonus_distribution.csv";

const TOTALS_HEADER: &str =
    "deposit_amount,withdrawal_amount,num_deposit,num_withdrawal,games_played,loyalty_points";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable tables
    Console,
    /// Pretty-printed report document
    Json,
    /// Markdown tables
    Markdown,
    /// Leaderboard joined with bonus amounts
    Csv,
}

fn fmt_avg(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn totals_csv(totals: &Totals) -> String {
    format!(
        "{},{},{},{},{},{}",
        totals.deposit_amount,
        totals.withdrawal_amount,
        totals.num_deposit,
        totals.num_withdrawal,
        totals.games_played,
        totals.loyalty_points
    )
}

fn undistributable_note(pool: f64, cohort_size: usize) -> String {
    format!(
        "Bonus pool {pool:.2} could not be distributed: cohort of {cohort_size} holds zero loyalty points"
    )
}

pub fn generate_console_report(out: &mut impl Write, report: &LoyaltyReport) -> io::Result<()> {
    writeln!(out, "{}", "📊 Loyalty Report".bright_cyan().bold())?;
    writeln!(out, "{}", "=================".cyan())?;
    write_console_summary(out, &report.summary)?;

    writeln!(out)?;
    writeln!(out, "{}", "🕒 Slot Report".bright_yellow().bold())?;
    for group in &report.slot_report {
        write_console_slot(out, group)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "🏆 Leaderboard".bright_yellow().bold())?;
    if report.leaderboard.is_empty() {
        writeln!(out, "   No players.")?;
    }
    for entry in &report.leaderboard {
        writeln!(
            out,
            "   #{:<4} {:<16} {:>12.3} pts  {:>6} games  deposits {:>12.2}",
            entry.rank,
            entry.player_id.as_str(),
            entry.totals.loyalty_points,
            entry.totals.games_played,
            entry.totals.deposit_amount
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "💰 Bonus Distribution".bright_yellow().bold())?;
    match &report.bonus {
        BonusOutcome::Allocated(table) => {
            for entry in &table.entries {
                writeln!(
                    out,
                    "   #{:<4} {:<16} {:>12.3} pts  {:>14.2}",
                    entry.rank,
                    entry.player_id.as_str(),
                    entry.loyalty_points,
                    entry.bonus_amount
                )?;
            }
            writeln!(
                out,
                "   Distributed {} of {:.2} across {} players",
                format!("{:.2}", table.distributed()).green(),
                table.pool,
                table.entries.len()
            )?;
        }
        BonusOutcome::Undistributable { pool, cohort_size } => {
            writeln!(
                out,
                "   ⚠️  {}",
                undistributable_note(*pool, *cohort_size).red()
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "🔏 Fingerprint: {}", report.fingerprint()?)?;
    Ok(())
}

fn write_console_summary(out: &mut impl Write, summary: &PeriodSummary) -> io::Result<()> {
    writeln!(out, "Records: {}", summary.record_count)?;
    writeln!(out, "Players: {}", summary.player_count)?;
    writeln!(out, "Active days: {}", summary.active_days)?;
    writeln!(
        out,
        "Total loyalty points: {:.3}",
        summary.total_loyalty_points
    )?;
    writeln!(out, "Average deposit: {}", fmt_avg(summary.avg_deposit))?;
    writeln!(
        out,
        "Average deposit per player: {}",
        fmt_avg(summary.avg_deposit_per_player)
    )?;
    writeln!(
        out,
        "Average games per player: {}",
        fmt_avg(summary.avg_games_per_player)
    )
}

fn write_console_slot(out: &mut impl Write, group: &SlotGroup) -> io::Result<()> {
    writeln!(
        out,
        "{} ({} players)",
        group.query.to_string().bold(),
        group.rows.len()
    )?;
    if group.is_empty() {
        writeln!(out, "   {}", "no activity".dimmed())?;
    }
    for row in &group.rows {
        writeln!(
            out,
            "   {:<16} {:>12.3} pts  {:>6} games  deposits {:>12.2}  withdrawals {:>12.2}",
            row.player_id.as_str(),
            row.totals.loyalty_points,
            row.totals.games_played,
            row.totals.deposit_amount,
            row.totals.withdrawal_amount
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut impl Write, report: &LoyaltyReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

pub fn generate_markdown_report(out: &mut impl Write, report: &LoyaltyReport) -> io::Result<()> {
    writeln!(out, "# Loyalty Report\n")?;

    let summary = &report.summary;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Records**: {}", summary.record_count)?;
    writeln!(out, "- **Players**: {}", summary.player_count)?;
    writeln!(out, "- **Active days**: {}", summary.active_days)?;
    writeln!(
        out,
        "- **Total loyalty points**: {:.3}",
        summary.total_loyalty_points
    )?;
    writeln!(out, "- **Average deposit**: {}", fmt_avg(summary.avg_deposit))?;
    writeln!(
        out,
        "- **Average deposit per player**: {}",
        fmt_avg(summary.avg_deposit_per_player)
    )?;
    writeln!(
        out,
        "- **Average games per player**: {}\n",
        fmt_avg(summary.avg_games_per_player)
    )?;

    writeln!(out, "## Slot Report\n")?;
    for group in &report.slot_report {
        writeln!(out, "### {} {}\n", group.query.date, group.query.slot)?;
        if group.is_empty() {
            writeln!(out, "_No activity._\n")?;
            continue;
        }
        writeln!(
            out,
            "| Player | Deposits | Withdrawals | # Deposits | # Withdrawals | Games | Points |"
        )?;
        writeln!(out, "|---|---:|---:|---:|---:|---:|---:|")?;
        for row in &group.rows {
            writeln!(
                out,
                "| {} | {:.2} | {:.2} | {} | {} | {} | {:.3} |",
                row.player_id,
                row.totals.deposit_amount,
                row.totals.withdrawal_amount,
                row.totals.num_deposit,
                row.totals.num_withdrawal,
                row.totals.games_played,
                row.totals.loyalty_points
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Leaderboard\n")?;
    writeln!(out, "| Rank | Player | Points | Games | Deposits |")?;
    writeln!(out, "|---:|---|---:|---:|---:|")?;
    for entry in &report.leaderboard {
        writeln!(
            out,
            "| {} | {} | {:.3} | {} | {:.2} |",
            entry.rank,
            entry.player_id,
            entry.totals.loyalty_points,
            entry.totals.games_played,
            entry.totals.deposit_amount
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Bonus Distribution\n")?;
    match &report.bonus {
        BonusOutcome::Allocated(table) => {
            writeln!(out, "| Rank | Player | Points | Bonus |")?;
            writeln!(out, "|---:|---|---:|---:|")?;
            for entry in &table.entries {
                writeln!(
                    out,
                    "| {} | {} | {:.3} | {:.2} |",
                    entry.rank, entry.player_id, entry.loyalty_points, entry.bonus_amount
                )?;
            }
            writeln!(out)?;
        }
        BonusOutcome::Undistributable { pool, cohort_size } => {
            writeln!(out, "> ⚠️ {}\n", undistributable_note(*pool, *cohort_size))?;
        }
    }

    writeln!(out, "_Fingerprint: `{}`_", report.fingerprint()?)
}

/// Leaderboard rows with the bonus column filled for cohort members only.
pub fn generate_csv_report(out: &mut impl Write, report: &LoyaltyReport) -> io::Result<()> {
    writeln!(out, "rank,player_id,{TOTALS_HEADER},bonus_amount")?;
    let table = report.bonus.table();
    for entry in &report.leaderboard {
        let bonus = table
            .and_then(|table| {
                table
                    .entries
                    .iter()
                    .find(|bonus| bonus.rank == entry.rank)
            })
            .map(|bonus| bonus.bonus_amount.to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{}",
            entry.rank,
            csv_field(entry.player_id.as_str()),
            totals_csv(&entry.totals),
            bonus
        )?;
    }
    Ok(())
}

pub fn write_slotwise_csv(out: &mut impl Write, groups: &[SlotGroup]) -> io::Result<()> {
    writeln!(out, "player_id,{TOTALS_HEADER},date,slot")?;
    for row in groups.iter().flat_map(|group| &group.rows) {
        writeln!(
            out,
            "{},{},{},{}",
            csv_field(row.player_id.as_str()),
            totals_csv(&row.totals),
            row.date,
            row.slot
        )?;
    }
    Ok(())
}

pub fn write_ranking_csv(out: &mut impl Write, leaderboard: &[RankedEntry]) -> io::Result<()> {
    writeln!(out, "player_id,{TOTALS_HEADER},rank")?;
    for entry in leaderboard {
        writeln!(
            out,
            "{},{},{}",
            csv_field(entry.player_id.as_str()),
            totals_csv(&entry.totals),
            entry.rank
        )?;
    }
    Ok(())
}

/// Cohort rows with their full totals; header only when nothing was allocated.
pub fn write_bonus_csv(out: &mut impl Write, report: &LoyaltyReport) -> io::Result<()> {
    writeln!(out, "player_id,{TOTALS_HEADER},rank,bonus_amount")?;
    let Some(table) = report.bonus.table() else {
        return Ok(());
    };
    for (bonus, entry) in table.entries.iter().zip(&report.leaderboard) {
        writeln!(
            out,
            "{},{},{},{}",
            csv_field(bonus.player_id.as_str()),
            totals_csv(&entry.totals),
            bonus.rank,
            bonus.bonus_amount
        )?;
    }
    Ok(())
}

fn export_file(
    dir: &Path,
    name: &str,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(dir.join(name))?);
    write(&mut file)?;
    file.flush()
}

/// Write the three CSV tables into `dir`, creating it if needed.
pub fn export_tables(dir: &Path, report: &LoyaltyReport) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    export_file(dir, SLOTWISE_EXPORT, |out| {
        write_slotwise_csv(out, &report.slot_report)
    })?;
    export_file(dir, RANKING_EXPORT, |out| {
        write_ranking_csv(out, &report.leaderboard)
    })?;
    export_file(dir, BONUS_EXPORT, |out| write_bonus_csv(out, report))?;
    log::debug!("exported CSV tables to {}", dir.display());
    Ok(())
}

/// Renders reports in one format and optionally mirrors the CSV tables to disk.
pub struct ReportWriter<W: Write> {
    format: ReportFormat,
    out: W,
    export_dir: Option<PathBuf>,
}

impl<W: Write> ReportWriter<W> {
    pub const fn new(format: ReportFormat, out: W, export_dir: Option<PathBuf>) -> Self {
        Self {
            format,
            out,
            export_dir,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ReportWriter<W> {
    type Error = io::Error;

    fn export(&mut self, report: &LoyaltyReport) -> Result<(), Self::Error> {
        match self.format {
            ReportFormat::Console => generate_console_report(&mut self.out, report)?,
            ReportFormat::Json => generate_json_report(&mut self.out, report)?,
            ReportFormat::Markdown => generate_markdown_report(&mut self.out, report)?,
            ReportFormat::Csv => generate_csv_report(&mut self.out, report)?,
        }
        self.out.flush()?;
        if let Some(dir) = &self.export_dir {
            export_tables(dir, report)?;
        }
        Ok(())
    }
}
