mod analytics;
mod cli;
mod config;
mod error;
mod events;
mod generator;
mod poller;
#[cfg(test)]
mod test_support;

use std::io::Write;
use std::sync::Arc;

use tracing::info;
use vg_core::{Credential, GenerationRequest};

use crate::cli::{Command, USAGE};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::events::{JobOutcome, TrackEvent};
use crate::generator::Generator;
use crate::generator::backend::GenBackend;
use crate::generator::db::JobDatabase;
use crate::generator::db::job::JobRecord;
use crate::poller::TrackingHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let command = cli::parse(std::env::args().skip(1))?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = AppConfig::load()?;
    let db = JobDatabase::open(config.data_dir.clone());
    let backend = GenBackend::new(config.backend.clone())?;
    info!("Using video service at {}", backend.endpoint());

    let generator = Generator::new(Arc::new(backend), db, config.poller.clone());
    run(command, &generator, &config).await
}

async fn run(command: Command, generator: &Generator, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Generate { prompt, settings } => {
            let key = api_key(generator, config).await?;
            let request = GenerationRequest::new(prompt, settings);
            let record = generator.submit_job(&request, &key).await?;
            println!("Submitted {} ({})", record.id, record.settings.summary());

            let credential = Credential::new(key)?;
            finish(follow(generator.track(record.id, credential)).await)
        }
        Command::Track { job_id } => {
            let credential = Credential::new(api_key(generator, config).await?)?;
            finish(follow(generator.track(job_id, credential)).await)
        }
        Command::Resume => {
            let credential = Credential::new(api_key(generator, config).await?)?;
            let handles = generator.resume(&credential).await;
            if handles.is_empty() {
                println!("No jobs in flight");
            }
            for handle in handles {
                println!("Tracking {}", handle.job_id());
                if follow(handle).await.is_none() {
                    break;
                }
            }
            Ok(())
        }
        Command::History => {
            let jobs = generator.get_jobs().await;
            if jobs.is_empty() {
                println!("No generations yet");
            }
            for job in &jobs {
                println!(
                    "{} {:<28} {:<12} {:<28} {}",
                    job.status.icon(),
                    job.id,
                    job.status.label(),
                    job.settings.summary(),
                    preview(&job.prompt, 48)
                );
            }
            Ok(())
        }
        Command::Show { job_id } => {
            let job = generator
                .get_job(&job_id)
                .await
                .ok_or(AppError::UnknownJob(job_id))?;
            print_job(&job);
            Ok(())
        }
        Command::Remove { job_id } => {
            if !generator.remove_job(&job_id).await {
                return Err(AppError::UnknownJob(job_id).into());
            }
            println!("Removed {job_id}");
            Ok(())
        }
        Command::Clear => {
            generator.clear_history().await;
            println!("History cleared");
            Ok(())
        }
        Command::ClearCompleted => {
            let removed = generator.clear_completed().await;
            println!("Removed {removed} finished job(s)");
            Ok(())
        }
        Command::Stats => {
            println!("{}", generator.stats().await);
            Ok(())
        }
        Command::SetKey(key) => {
            Credential::new(key.as_str())?;
            generator.set_api_key(&key).await;
            println!("API key saved");
            Ok(())
        }
        Command::ClearKey => {
            generator.set_api_key("").await;
            println!("API key removed");
            Ok(())
        }
        Command::Favorites => {
            let favorites = generator.favorites().await;
            if favorites.is_empty() {
                println!("No favorites yet");
            }
            for favorite in &favorites {
                println!(
                    "{:<36} {:<20} {:<28} {}",
                    favorite.id,
                    favorite.name,
                    favorite.settings.summary(),
                    preview(&favorite.prompt, 48)
                );
            }
            Ok(())
        }
        Command::ClearFavorites => {
            generator.clear_favorites().await;
            println!("Favorites cleared");
            Ok(())
        }
        Command::AddFavorite { name, prompt, settings } => {
            let favorite = generator.add_favorite(&name, &prompt, settings).await?;
            println!("Saved favorite {} as {}", favorite.name, favorite.id);
            Ok(())
        }
        Command::RemoveFavorite { id } => {
            if !generator.remove_favorite(&id).await {
                return Err(AppError::Usage(format!("No favorite with id {id}")).into());
            }
            println!("Removed favorite {id}");
            Ok(())
        }
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

/// Saved key first, then the environment.
async fn api_key(generator: &Generator, config: &AppConfig) -> Result<String, AppError> {
    generator
        .api_key()
        .await
        .or_else(|| config.api_key.clone())
        .ok_or(AppError::NoCredential)
}

/// Print events until the job ends. `None` if interrupted with Ctrl-C.
async fn follow(mut handle: TrackingHandle) -> Option<JobOutcome> {
    let job_id = handle.job_id().to_string();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(TrackEvent::Status { status, .. }) => {
                    println!("\r{} {}", status.icon(), status.label());
                }
                Some(TrackEvent::Progress { view, .. }) => {
                    print!("\r{:>3.0}% {} ({} left)", view.percent, view.clock(), view.remaining());
                    let _ = std::io::stdout().flush();
                }
                Some(event) => break JobOutcome::from_event(event),
                None => break None,
            },
            _ = &mut ctrl_c => break None,
        }
    };
    println!();

    if outcome.is_none() {
        handle.shutdown().await;
        println!("Stopped tracking {job_id}");
    }
    outcome
}

fn finish(outcome: Option<JobOutcome>) -> anyhow::Result<()> {
    match outcome {
        Some(JobOutcome::Completed { result_url }) => {
            println!("Video ready: {result_url}");
            Ok(())
        }
        Some(JobOutcome::Failed(e)) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_job(job: &JobRecord) {
    println!("Id:        {}", job.id);
    println!("Status:    {} {}", job.status.icon(), job.status.label());
    println!("Prompt:    {}", job.prompt);
    println!("Settings:  {}", job.settings.summary());
    println!(
        "Model:     {} ({})",
        job.settings.model.name(),
        job.settings.model.description()
    );
    println!("Created:   {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(done) = job.completed_at {
        println!("Completed: {}", done.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(secs) = job.generation_secs() {
        println!("Took:      {secs:.0}s");
    }
    if let Some(url) = &job.result_url {
        println!("Video:     {url}");
    }
    if let Some(error) = &job.error_message {
        println!("Error:     {error}");
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
