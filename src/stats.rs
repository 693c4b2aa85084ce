use chrono::NaiveDate;
use itertools::Itertools;
use std::io::Write;

use crate::recorder::SessionRecord;

/// Words written on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub words: u64,
    pub sessions: usize,
}

/// Aggregate view of the session history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub total_words: u64,
    pub total_seconds: u64,
    pub longest_session_seconds: u64,
    /// completed sessions in a row, counting back from the latest
    pub current_streak: usize,
    pub daily: Vec<DailyTotal>,
}

impl HistorySummary {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let completed_sessions = records.iter().filter(|r| r.completed).count();
        let current_streak = records.iter().rev().take_while(|r| r.completed).count();

        let mut daily = Vec::new();
        for (day, group) in &records.iter().chunk_by(|r| r.timestamp.date_naive()) {
            let (words, sessions) = group.fold((0, 0), |(w, s), r| (w + r.words_written, s + 1));
            daily.push(DailyTotal {
                day,
                words,
                sessions,
            });
        }

        Self {
            total_sessions: records.len(),
            completed_sessions,
            total_words: records.iter().map(|r| r.words_written).sum(),
            total_seconds: records.iter().map(|r| r.duration_seconds).sum(),
            longest_session_seconds: records
                .iter()
                .map(|r| r.duration_seconds)
                .max()
                .unwrap_or(0),
            current_streak,
            daily,
        }
    }

    pub fn failed_sessions(&self) -> usize {
        self.total_sessions - self.completed_sessions
    }

    /// Percentage of sessions that reached their goal.
    pub fn success_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            0.0
        } else {
            (self.completed_sessions as f64 / self.total_sessions as f64 * 100.0).round()
        }
    }

    pub fn best_day(&self) -> Option<&DailyTotal> {
        self.daily.iter().max_by_key(|d| d.words)
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_clock(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Writes the history as CSV with a header row.
pub fn export_csv<W: Write>(records: &[SessionRecord], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "duration_secs", "words", "completed"])?;
    for record in records {
        wtr.write_record([
            record.timestamp.to_rfc3339(),
            record.duration_seconds.to_string(),
            record.words_written.to_string(),
            record.completed.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
