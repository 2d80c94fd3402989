use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;
use unify_engine::StepOutcomeKind;
use unify_sdk::{
    Credential, DeviceId, MergeConfig, MergePair, MergeResponse, MergeService, MergeStatusRow,
    MergeStep, ResolveRequest, SecretKey, ServiceState, VoterId,
};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Merge(args) => cmd_merge(args, config, &format),
        Command::Resolve(args) => cmd_resolve(args, config, &format),
        Command::Status(args) => cmd_status(args, config, &format),
        Command::Log(args) => cmd_log(args, config, &format),
    }
}

// ---------------------------------------------------------------------------
// State and config files
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> anyhow::Result<MergeConfig> {
    let Some(path) = path else {
        return Ok(MergeConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn load_service(path: &Path, config: MergeConfig) -> anyhow::Result<MergeService> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file; starting empty");
        return Ok(MergeService::new(config));
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading state {}", path.display()))?;
    let state = ServiceState::from_json(&text)
        .with_context(|| format!("parsing state {}", path.display()))?;
    Ok(MergeService::from_state(state, config))
}

fn save_service(path: &Path, service: &MergeService) -> anyhow::Result<()> {
    let json = service.state()?.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("writing state {}", path.display()))
}

fn parse_pair(raw: &str) -> anyhow::Result<MergePair> {
    let Some((from, to)) = raw.split_once(':') else {
        bail!("pair must be written as from:to, got {raw:?}");
    };
    Ok(MergePair::new(VoterId::parse(from)?, VoterId::parse(to)?)?)
}

fn credential(args: CredentialArgs) -> anyhow::Result<Credential> {
    let credential = if let Some(s) = args.email_secret {
        Credential::EmailSecret(SecretKey::new(s))
    } else if let Some(s) = args.sms_secret {
        Credential::SmsSecret(SecretKey::new(s))
    } else if let Some(s) = args.facebook_secret {
        Credential::FacebookSecret(SecretKey::new(s))
    } else if let Some(id) = args.facebook_id {
        Credential::FacebookIdentity(id)
    } else if let Some(s) = args.twitter_secret {
        Credential::TwitterSecret(SecretKey::new(s))
    } else if let Some(id) = args.twitter_id {
        Credential::TwitterIdentity(id)
    } else if let Some(id) = args.apple_id {
        Credential::AppleIdentity(id)
    } else if let Some(s) = args.invitation_secret {
        Credential::InvitationSecret(SecretKey::new(s))
    } else {
        bail!("no credential given");
    };
    Ok(credential)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_merge(args: MergeArgs, config: MergeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let service = load_service(&args.state.state, config)?;
    let from = VoterId::parse(&args.from)?;
    let to = VoterId::parse(&args.to)?;
    let device = args.device.as_deref().map(DeviceId::parse).transpose()?;
    let response = service.merge_accounts(&from, &to, device.as_ref())?;
    save_service(&args.state.state, &service)?;
    print_response(&response, format)?;
    ensure_success(&response)
}

fn cmd_resolve(
    args: ResolveArgs,
    config: MergeConfig,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let service = load_service(&args.state.state, config)?;
    let mut request = ResolveRequest::new(DeviceId::parse(&args.device)?, credential(args.credential)?);
    if args.skip_if_signed_in {
        request = request.skip_if_signed_in();
    }
    let response = service.sign_in(&request)?;
    save_service(&args.state.state, &service)?;
    print_response(&response, format)?;
    ensure_success(&response)
}

fn cmd_status(args: StatusArgs, config: MergeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let service = load_service(&args.state.state, config)?;
    let from = VoterId::parse(&args.from)?;
    let to = VoterId::parse(&args.to)?;
    let row = service.status(&from, &to)?;
    match format {
        OutputFormat::Json => print_json(&row),
        OutputFormat::Text => {
            match row {
                Some(row) => print_status_row(&row),
                None => println!("No merge recorded for {} → {}.", from.as_str().yellow(), to.as_str().yellow()),
            }
            Ok(())
        }
    }
}

fn cmd_log(args: LogArgs, config: MergeConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let service = load_service(&args.state.state, config)?;
    let pair = args.pair.as_deref().map(parse_pair).transpose()?;
    let entries = service.log_entries(pair.as_ref())?;
    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("Merge log: no entries.");
            }
            for entry in &entries {
                let mark = if entry.success { "✓".green() } else { "✗".red() };
                println!(
                    "{} {} {} → {} {} ({} ms) {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    mark,
                    entry.from_voter_we_vote_id,
                    entry.to_voter_we_vote_id,
                    entry.step_name.as_str().cyan(),
                    entry.step_duration_ms,
                    entry.status,
                );
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_success(response: &MergeResponse) -> anyhow::Result<()> {
    if !response.success {
        bail!("{}", response.status);
    }
    Ok(())
}

fn print_response(response: &MergeResponse, format: &OutputFormat) -> anyhow::Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(response);
    }

    let mark = if response.success { "✓".green().bold() } else { "✗".red().bold() };
    println!("{} {}", mark, response.status);
    if let (Some(from), Some(to)) = (
        &response.merge_from_voter_we_vote_id,
        &response.merge_to_voter_we_vote_id,
    ) {
        println!("  Voters: {} → {}", from.as_str().yellow(), to.as_str().yellow());
    }
    if let Some(report) = &response.report {
        let count = |kind: StepOutcomeKind| report.steps.iter().filter(|s| s.outcome == kind).count();
        println!(
            "  Steps: {} succeeded, {} already complete, {} failed, {} not run",
            count(StepOutcomeKind::Succeeded).to_string().green(),
            count(StepOutcomeKind::AlreadyComplete),
            count(StepOutcomeKind::Failed).to_string().red(),
            count(StepOutcomeKind::NotRun),
        );
        for step in report.steps.iter().filter(|s| s.failed()) {
            println!("  {} {}: {}", "failed".red(), step.step.as_str(), step.detail);
        }
        if !report.tracked {
            println!("  {} progress was not recorded in the ledger", "warning:".yellow());
        }
    }
    if let Some(rebind) = &response.rebind {
        println!("  Session: {}", serde_json::to_string(rebind)?.dimmed());
    }
    Ok(())
}

fn print_status_row(row: &MergeStatusRow) {
    let state = if row.total_merge_complete {
        "complete".green().bold()
    } else {
        "incomplete".yellow().bold()
    };
    println!("Merge {} → {}: {}", row.pair.from, row.pair.to, state);
    println!("  Started: {}  Updated: {}", row.created_at, row.updated_at);
    for step in MergeStep::ORDER {
        if step == MergeStep::TotalMerge {
            continue;
        }
        match row.steps.get(&step).filter(|s| s.complete) {
            Some(status) => {
                println!("  {} {} ({} ms)", "✓".green(), step.as_str(), status.milliseconds)
            }
            None => println!("  {} {}", "·".dimmed(), step.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use unify_store::{ChannelRepository, DeviceSessionRepository, VoterRepository};
    use unify_types::{ChannelId, ChannelKind, ContactChannel, Voter};

    fn seed_state(dir: &Path) -> std::path::PathBuf {
        let service = MergeService::new(MergeConfig::default());
        let store = service.store();
        store.save_voter(&Voter::new(VoterId::new("a"))).unwrap();
        store.save_voter(&Voter::new(VoterId::new("b")).with_name("Sam", "Ray")).unwrap();
        store.bind_device(&DeviceId::new("d1"), &VoterId::new("a")).unwrap();
        store
            .save_channel(
                &ContactChannel::new(ChannelId(1), ChannelKind::Email, "sam@example.org", VoterId::new("b"))
                    .verified(),
            )
            .unwrap();
        store
            .save_channel(
                &ContactChannel::new(ChannelId(2), ChannelKind::Email, "sam@example.org", VoterId::new("a"))
                    .with_secret(SecretKey::new("s-1").digest()),
            )
            .unwrap();
        let path = dir.join("state.json");
        save_service(&path, &service).unwrap();
        path
    }

    fn run(args: &[&str]) -> anyhow::Result<()> {
        run_command(Cli::try_parse_from(args).unwrap())
    }

    fn reload(path: &Path) -> MergeService {
        load_service(path, MergeConfig::default()).unwrap()
    }

    #[test]
    fn merge_saves_ledger_progress() {
        let dir = tempfile::tempdir().unwrap();
        let state = seed_state(dir.path());
        let state = state.to_str().unwrap();

        run(&["unify", "merge", "--state", state, "--from", "a", "--to", "b"]).unwrap();

        let service = reload(Path::new(state));
        let row = service.status(&VoterId::new("a"), &VoterId::new("b")).unwrap().unwrap();
        assert!(row.total_merge_complete);
        assert!(service.store().voter(&VoterId::new("a")).unwrap().is_some());
        run(&["unify", "status", "--state", state, "--from", "a", "--to", "b"]).unwrap();
        run(&["unify", "--format", "json", "log", "--state", state, "--pair", "a:b"]).unwrap();
    }

    #[test]
    fn resolve_merges_and_rebinds_the_device() {
        let dir = tempfile::tempdir().unwrap();
        let state = seed_state(dir.path());
        let state = state.to_str().unwrap();

        run(&[
            "unify", "resolve", "--state", state, "--device", "d1", "--email-secret", "s-1",
        ])
        .unwrap();

        let service = reload(Path::new(state));
        assert_eq!(
            service.store().voter_for_device(&DeviceId::new("d1")).unwrap(),
            Some(VoterId::new("b"))
        );
    }

    #[test]
    fn merge_with_device_rebinds_it() {
        let dir = tempfile::tempdir().unwrap();
        let state = seed_state(dir.path());
        let state = state.to_str().unwrap();

        run(&[
            "unify", "merge", "--state", state, "--from", "a", "--to", "b", "--device", "d1",
        ])
        .unwrap();

        let service = reload(Path::new(state));
        assert_eq!(
            service.store().voter_for_device(&DeviceId::new("d1")).unwrap(),
            Some(VoterId::new("b"))
        );
    }

    #[test]
    fn unknown_credential_exits_with_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = seed_state(dir.path());
        let state = state.to_str().unwrap();

        let err = run(&[
            "unify", "resolve", "--state", state, "--device", "d1", "--sms-secret", "nope",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("CREDENTIAL_NOT_FOUND"));
    }

    #[test]
    fn missing_state_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        let service = load_service(&path, MergeConfig::default()).unwrap();
        assert!(service.ledger().is_empty());
        run(&["unify", "log", "--state", path.to_str().unwrap()]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.toml");
        fs::write(&path, "log_successful_steps = true\nstop_on_first_failure = true\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(config.log_successful_steps);
        assert!(config.stop_on_first_failure);
        assert!(config.release_deferred_messages);
        assert_eq!(load_config(None).unwrap(), MergeConfig::default());
    }

    #[test]
    fn pair_argument_needs_a_colon() {
        assert!(parse_pair("a:b").is_ok());
        assert!(parse_pair("ab").is_err());
        assert!(parse_pair("a:A").is_err());
    }
}
