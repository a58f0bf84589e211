use anyhow::{Context, Result};
use clap::ValueEnum;
use console::{style, StyledObject};
use libcloud_storm::{Access, Finding, FindingSink};
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
    Csv,
}

/// Append-mode log of findings in one of the supported formats.
pub struct FindingLog {
    file: File,
    format: LogFormat,
}

impl FindingLog {
    /// Open `path` for appending and stamp the start of this run.
    pub fn open(path: &Path, format: LogFormat) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Could not open log file {}", path.display()))?;

        let now = chrono::Local::now().format("%d/%m/%Y %H:%M:%S");
        write!(file, "\n\n#### CLOUDSTORM {} ####\n", now)?;

        Ok(Self { file, format })
    }

    fn write(&mut self, finding: &Finding) -> Result<()> {
        match self.format {
            LogFormat::Text => writeln!(self.file, "{}: {}", finding.msg, finding.target)?,
            LogFormat::Json => {
                serde_json::to_writer(&mut self.file, finding)?;
                writeln!(self.file)?;
            }
            LogFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(&mut self.file);
                writer.serialize(finding)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Prints findings as they arrive and mirrors them into the log file.
pub struct ConsoleSink {
    log: Option<Mutex<FindingLog>>,
}

impl ConsoleSink {
    pub fn new(log: Option<FindingLog>) -> Self {
        Self {
            log: log.map(Mutex::new),
        }
    }
}

fn paint(access: Access, line: String) -> StyledObject<String> {
    let line = style(line).bold();
    match access {
        Access::Public => line.green(),
        Access::Protected => line.yellow(),
        Access::Disabled => line.red(),
        Access::Unknown => line,
    }
}

impl FindingSink for ConsoleSink {
    fn report(&self, finding: &Finding) {
        println!(
            "  {}",
            paint(finding.access, format!("{}: {}", finding.msg, finding.target))
        );

        let Some(log) = &self.log else { return };
        let Ok(mut log) = log.lock() else { return };
        if let Err(e) = log.write(finding) {
            warn!("Could not write finding to log file: {}", e);
        }
    }

    fn listing(&self, _bucket: &str, files: &[String]) {
        if files.is_empty() {
            println!("      ...empty bucket, so sad. :(");
            return;
        }
        println!("      FILES:");
        for file in files {
            println!("      ->{}", file);
        }
    }
}
