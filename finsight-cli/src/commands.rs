//! CLI subcommand handlers.

use crate::render;
use crate::{Commands, ConfigAction, GlobalArgs};
use finsight_core::api::{AnalysisBackend, HttpBackend, Session, fetch_many};
use finsight_core::poller::{JobOutcome, PollOptions, PollPhase, watch_job};
use finsight_core::types::Credentials;
use finsight_core::{
    AnalysisResponse, FinsightConfig, GroundednessScorer, GroundingReport,
    analyze_retrieval_consensus, load_config,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, args: &GlobalArgs) -> anyhow::Result<()> {
    match command {
        Commands::Score {
            retrieval,
            logprobs,
            file,
        } => handle_score(retrieval, logprobs, file.as_deref(), args),
        Commands::Consensus { retrieval, file } => {
            handle_consensus(retrieval, file.as_deref(), args)
        }
        Commands::Watch {
            document_id,
            interval_ms,
            no_report,
        } => handle_watch(&document_id, interval_ms, no_report, args).await,
        Commands::Batch { document_ids } => handle_batch(&document_ids, args).await,
        Commands::Report { document_id } => handle_report(&document_id, args).await,
        Commands::Documents { document_id } => handle_documents(document_id.as_deref(), args).await,
        Commands::Upload { path, ticker } => handle_upload(&path, &ticker, args).await,
        Commands::Analyze { document_id, query } => {
            handle_analyze(&document_id, &query, args).await
        }
        Commands::Login { email, password } => handle_login(email, password, false, args).await,
        Commands::Register { email, password } => {
            handle_login(email, password, true, args).await
        }
        Commands::Logout => {
            let backend = build_backend(&load(args)?)?;
            backend.logout().await;
            println!("Logged out.");
            Ok(())
        }
        Commands::Whoami => {
            let backend = build_backend(&load(args)?)?;
            let user = backend.me().await?;
            emit(args, &user, || format!("{} ({})", user.email, user.id))
        }
        Commands::Stats => {
            let backend = build_backend(&load(args)?)?;
            let stats = backend.dashboard_stats().await;
            emit(args, &stats, || render::stats(&stats))
        }
        Commands::Config { action } => handle_config(action, args),
    }
}

/// Load configuration and apply command-line overrides.
fn load(args: &GlobalArgs) -> anyhow::Result<FinsightConfig> {
    let mut config = load_config(Some(&args.workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(token) = &args.token {
        config.api.auth_token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_backend(config: &FinsightConfig) -> anyhow::Result<HttpBackend> {
    let session = config
        .api
        .auth_token
        .clone()
        .map(Session::with_token)
        .unwrap_or_default();
    Ok(HttpBackend::new(&config.api, session)?)
}

/// Print `value` as JSON with `--json`, otherwise the text rendering.
fn emit<T: Serialize>(
    args: &GlobalArgs,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn read_analysis(path: &Path) -> anyhow::Result<AnalysisResponse> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("{} is not an analysis response: {}", path.display(), e))
}

/// Retrieval scores and log-probabilities, from flags or a saved analysis.
fn signals(
    retrieval: Vec<f64>,
    logprobs: Vec<f64>,
    file: Option<&Path>,
) -> anyhow::Result<(Vec<f64>, Vec<f64>)> {
    match file {
        Some(path) => {
            let analysis = read_analysis(path)?;
            Ok((analysis.retrieval_scores, analysis.generation_logprobs))
        }
        None => Ok((retrieval, logprobs)),
    }
}

fn handle_score(
    retrieval: Vec<f64>,
    logprobs: Vec<f64>,
    file: Option<&Path>,
    args: &GlobalArgs,
) -> anyhow::Result<()> {
    let config = load(args)?;
    let (retrieval, logprobs) = signals(retrieval, logprobs, file)?;
    let result = GroundednessScorer::new(config.groundedness).score(&retrieval, &logprobs);
    emit(args, &result, || render::groundedness(&result))
}

fn handle_consensus(
    retrieval: Vec<f64>,
    file: Option<&Path>,
    args: &GlobalArgs,
) -> anyhow::Result<()> {
    let (retrieval, _) = signals(retrieval, Vec::new(), file)?;
    let result = analyze_retrieval_consensus(&retrieval);
    emit(args, &result, || render::consensus(&result))
}

async fn handle_watch(
    document_id: &str,
    interval_ms: Option<u64>,
    no_report: bool,
    args: &GlobalArgs,
) -> anyhow::Result<()> {
    let config = load(args)?;
    let backend = Arc::new(build_backend(&config)?);
    let mut options = PollOptions::from(&config.polling);
    if let Some(ms) = interval_ms {
        options = options.with_interval(Duration::from_millis(ms.max(1)));
    }

    let mut handle = watch_job(backend.clone(), document_id, options);
    let mut updates = handle.subscribe();
    let mut last_line = String::new();

    loop {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(status) = &snapshot.status {
            let line = render::progress(status);
            if line != last_line {
                eprintln!("{line}");
                last_line = line;
            }
        }
        if snapshot.phase == PollPhase::Terminal {
            break;
        }
        if let Some(err) = snapshot.error {
            handle.shutdown().await;
            anyhow::bail!(
                "Giving up on {} after {} failed status checks: {}",
                document_id,
                snapshot.consecutive_failures,
                err
            );
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown().await;
                anyhow::bail!("Interrupted while watching {}", document_id);
            }
        }
    }

    let status = match handle.outcome().await {
        Some(JobOutcome::Completed(status)) => status,
        Some(JobOutcome::Failed { message, status }) => {
            eprintln!("{}", render::stages(&status));
            anyhow::bail!("Analysis of {} failed: {}", document_id, message);
        }
        None => anyhow::bail!("Stopped watching {} before it finished", document_id),
    };

    if no_report {
        return emit(args, &status, || format!("Analysis of {document_id} completed."));
    }

    let Some(analysis) = backend.get_analysis(document_id).await? else {
        anyhow::bail!("Job completed but no analysis is available for {}", document_id);
    };
    print_analysis(&config, &analysis, args)
}

#[derive(Serialize)]
struct AnalysisOutput<'a> {
    analysis: &'a AnalysisResponse,
    report: &'a GroundingReport,
}

fn print_analysis(
    config: &FinsightConfig,
    analysis: &AnalysisResponse,
    args: &GlobalArgs,
) -> anyhow::Result<()> {
    let scorer = GroundednessScorer::new(config.groundedness);
    let report = GroundingReport::from_analysis(&scorer, analysis);
    let output = AnalysisOutput {
        analysis,
        report: &report,
    };
    emit(args, &output, || {
        format!("{}\n\n{}", render::answer(analysis), render::report(&report))
    })
}

async fn handle_report(document_id: &str, args: &GlobalArgs) -> anyhow::Result<()> {
    let config = load(args)?;
    let backend = build_backend(&config)?;
    match backend.get_analysis(document_id).await? {
        Some(analysis) => print_analysis(&config, &analysis, args),
        None => anyhow::bail!("No analysis found for {}", document_id),
    }
}

async fn handle_batch(document_ids: &[String], args: &GlobalArgs) -> anyhow::Result<()> {
    let config = load(args)?;
    let backend = build_backend(&config)?;
    let scorer = GroundednessScorer::new(config.groundedness);

    let reports: BTreeMap<String, Option<GroundingReport>> = fetch_many(&backend, document_ids)
        .await
        .into_iter()
        .map(|(id, analysis)| {
            let report = analysis.map(|a| GroundingReport::from_analysis(&scorer, &a));
            (id, report)
        })
        .collect();

    emit(args, &reports, || {
        reports
            .iter()
            .map(|(id, report)| match report {
                Some(r) => format!(
                    "{id}: {} (R {:.0}%, G {:.0}%) {}",
                    r.groundedness.status,
                    r.groundedness.retrieval * 100.0,
                    r.groundedness.generation * 100.0,
                    r.consensus.kind.label()
                ),
                None => format!("{id}: no analysis"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

async fn handle_documents(document_id: Option<&str>, args: &GlobalArgs) -> anyhow::Result<()> {
    let backend = build_backend(&load(args)?)?;
    let docs = match document_id {
        Some(id) => vec![backend.get_document(id).await?],
        None => backend.list_documents().await?,
    };
    emit(args, &docs, || render::documents(&docs))
}

async fn handle_upload(path: &Path, ticker: &str, args: &GlobalArgs) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }
    let backend = build_backend(&load(args)?)?;
    let ingest = backend.upload(path, ticker).await?;
    emit(args, &ingest, || {
        format!(
            "Uploaded {} as {}: {} pages, {} chunks ({}).\nRun `finsight watch {}` to follow the analysis.",
            path.display(),
            ingest.document_id,
            ingest.num_pages,
            ingest.num_chunks,
            ingest.status,
            ingest.document_id
        )
    })
}

async fn handle_analyze(document_id: &str, query: &str, args: &GlobalArgs) -> anyhow::Result<()> {
    let config = load(args)?;
    let backend = build_backend(&config)?;
    eprintln!("Analyzing {document_id}, this can take a few minutes...");
    let analysis = backend.analyze(document_id, query).await?;
    print_analysis(&config, &analysis, args)
}

async fn handle_login(
    email: String,
    password: String,
    register: bool,
    args: &GlobalArgs,
) -> anyhow::Result<()> {
    let backend = build_backend(&load(args)?)?;
    let credentials = Credentials { email, password };
    let token = if register {
        backend.register(&credentials).await?
    } else {
        backend.login(&credentials).await?
    };
    emit(args, &token, || {
        format!(
            "Logged in as {}.\nexport FINSIGHT_API__AUTH_TOKEN={}",
            token.user.email, token.access_token
        )
    })
}

fn handle_config(action: ConfigAction, args: &GlobalArgs) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = args.workspace.join(".finsight");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            std::fs::write(&config_path, FinsightConfig::default().to_toml_string()?)?;
            println!("Created default configuration at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(&args.workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", config.to_toml_string()?);
            }
            Ok(())
        }
        ConfigAction::Validate => {
            load(args)?;
            println!("Configuration is valid.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(workspace: &Path) -> GlobalArgs {
        GlobalArgs {
            workspace: workspace.to_path_buf(),
            base_url: None,
            token: None,
            json: false,
        }
    }

    #[test]
    fn test_signals_from_flags() {
        let (r, l) = signals(vec![0.8], vec![-0.1], None).unwrap();
        assert_eq!(r, vec![0.8]);
        assert_eq!(l, vec![-0.1]);
    }

    #[test]
    fn test_signals_from_saved_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        std::fs::write(
            &path,
            r#"{
                "answer": "Revenue grew.",
                "verification_status": "PASS",
                "metadata": {"document_id": "doc-1"},
                "retrieval_scores": [0.9, 0.8],
                "generation_logprobs": [-0.2]
            }"#,
        )
        .unwrap();

        let (r, l) = signals(vec![], vec![], Some(&path)).unwrap();
        assert_eq!(r, vec![0.9, 0.8]);
        assert_eq!(l, vec![-0.2]);
    }

    #[test]
    fn test_signals_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        std::fs::write(&path, "not json").unwrap();
        let err = signals(vec![], vec![], Some(&path)).unwrap_err();
        assert!(err.to_string().contains("is not an analysis response"));
    }

    #[test]
    fn test_load_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut global = args(dir.path());
        global.base_url = Some("https://finsight.example.com".into());
        global.token = Some("secret".into());

        let config = load(&global).unwrap();
        assert_eq!(config.api.base_url, "https://finsight.example.com");
        assert_eq!(config.api.auth_token.as_deref(), Some("secret"));

        let backend = build_backend(&config).unwrap();
        assert!(backend.session().is_authenticated());
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut global = args(dir.path());
        global.base_url = Some("not a url".into());
        assert!(load(&global).is_err());
    }

    #[test]
    fn test_config_init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let global = args(dir.path());

        handle_config(ConfigAction::Init, &global).unwrap();
        let path = dir.path().join(".finsight").join("config.toml");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("base_url"));

        std::fs::write(&path, "[polling]\ninterval_ms = 500\n").unwrap();
        handle_config(ConfigAction::Init, &global).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[polling]\ninterval_ms = 500\n"
        );
        assert_eq!(load(&global).unwrap().polling.interval_ms, 500);
    }
}
