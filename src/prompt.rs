use std::io::{self, BufRead, Write};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::commands::RecordPatch;
use crate::error::Result;
use crate::models::{parse_date, DailyRecord, Metric};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self, label: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => write!(self.output, "{label} [{default}]: ")?,
            None => write!(self.output, "{label}: ")?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input for prompt").into());
        }
        Ok(line.trim().to_string())
    }

    /// Asks until the answer parses. An empty answer takes `default` when there is one.
    fn ask<T, E>(
        &mut self,
        label: &str,
        default: Option<T>,
        parse: impl Fn(&str) -> std::result::Result<T, E>,
    ) -> Result<T>
    where
        T: Clone + ToString,
        E: ToString,
    {
        let shown = default.as_ref().map(ToString::to_string);
        loop {
            let answer = self.read_answer(label, shown.as_deref())?;
            if answer.is_empty() {
                if let Some(value) = &default {
                    return Ok(value.clone());
                }
                continue;
            }
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(err) => writeln!(self.output, "Error: {}", err.to_string())?,
            }
        }
    }

    pub fn ask_date(&mut self, label: &str) -> Result<NaiveDate> {
        self.ask(label, None, parse_date)
    }

    pub fn ask_int(&mut self, label: &str, default: Option<i32>) -> Result<i32> {
        self.ask(label, default, |answer| {
            i32::from_str(answer).map_err(|_| format!("{answer:?} is not a valid integer"))
        })
    }

    pub fn complete_record(
        &mut self,
        date: Option<NaiveDate>,
        given: &RecordPatch,
    ) -> Result<DailyRecord> {
        let date = match date {
            Some(date) => date,
            None => self.ask_date("Date")?,
        };
        let mut record = DailyRecord {
            date,
            sleep_score: 0,
            body_battery_max: 0,
            body_battery_min: 0,
            active_time: 0,
            defecation: 0,
        };
        for metric in Metric::ALL {
            let value = match given.get(metric) {
                Some(value) => value,
                None => self.ask_int(metric.label(), None)?,
            };
            record.set_value(metric, value);
        }
        Ok(record)
    }

    pub fn complete_patch(
        &mut self,
        current: &DailyRecord,
        given: &RecordPatch,
    ) -> Result<RecordPatch> {
        let mut patch = *given;
        for metric in Metric::ALL {
            if patch.get(metric).is_none() {
                let value = self.ask_int(metric.label(), Some(current.value(metric)))?;
                patch.set(metric, value);
            }
        }
        Ok(patch)
    }
}
