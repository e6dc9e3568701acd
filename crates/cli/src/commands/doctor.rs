use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use specwright_core::config::{AppConfig, LoadOptions};
use specwright_core::registry::SchemaRegistry;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 3] =
    ["registry_load", "output_dir_writable", "sessions_dir_writable"];

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_registry(&config));
            checks.push(check_writable("output_dir_writable", &config.output.dir));
            checks.push(check_writable("sessions_dir_writable", &config.sessions.dir));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_registry(config: &AppConfig) -> DoctorCheck {
    match SchemaRegistry::load(&config.registry.path) {
        Ok(registry) => DoctorCheck {
            name: "registry_load",
            status: CheckStatus::Pass,
            details: format!(
                "loaded {} requirement schema(s) from `{}`",
                registry.len(),
                config.registry.path.display()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "registry_load", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_writable(name: &'static str, dir: &Path) -> DoctorCheck {
    match probe_writable(dir) {
        Ok(()) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{}` is writable", dir.display()),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: format!("{error:#}") },
    }
}

fn probe_writable(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("cannot create `{}`", dir.display()))?;
    let probe = dir.join(".specwright-doctor-probe");
    fs::write(&probe, b"ok").with_context(|| format!("cannot write into `{}`", dir.display()))?;
    fs::remove_file(&probe).with_context(|| format!("cannot clean up `{}`", probe.display()))?;
    Ok(())
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
