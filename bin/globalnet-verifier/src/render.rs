use anyhow::{bail, Result};
use verifier_core::{AuditReport, Severity};

/// How the report is written to stdout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_env(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("") | Some("text") => Ok(OutputFormat::Text),
            Some("json") => Ok(OutputFormat::Json),
            Some(other) => bail!("unsupported VERIFIER_OUTPUT {:?}, expected text or json", other),
        }
    }
}

pub fn print(report: &AuditReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", to_text(report)),
    }
    Ok(())
}

fn to_text(report: &AuditReport) -> String {
    let mut out = String::new();
    for section in &report.sections {
        if section.entries.is_empty() {
            continue;
        }
        out.push_str(&format!("[{}]\n", section.name));
        let mut check = None;
        for entry in &section.entries {
            if entry.check.is_some() && entry.check != check {
                out.push_str(&format!(" {}\n", entry.check.as_deref().unwrap_or_default()));
            }
            check = entry.check.clone();
            out.push_str(&format!("  {}\n", entry));
        }
    }
    out.push_str(&format!(
        "\n{} failures, {} warnings (run {}, fingerprint {})\n",
        report.count(Severity::Failure),
        report.count(Severity::Warning),
        report.run_id,
        &report.fingerprint()[..12]
    ));
    out
}
