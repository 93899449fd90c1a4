mod config;

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use careful_core::{
    conflict_warnings, detect_conflicts,
    scan::{
        CameraConstraints, FacingMode, ScanHandle, ScanNotification, ScanService, ScanState,
        ScriptedCamera, Utf8PayloadDecoder,
    },
    steps_from_candidates, FavoritesLibrary, NewRoutine, ProductCatalog, RoutineStateManager,
    SampleCatalog, SessionContext,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Settings;
use shared::{
    domain::{CandidateProduct, ProductId, Routine, RoutineId, RoutineType, ScheduleTime},
    error::{CoreError, ErrorNotice},
};
use storage::Storage;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "careful", about = "Skincare routines, products and scanning")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        password: String,
    },
    Signup {
        email: String,
        password: String,
        confirmation: String,
    },
    Logout,
    Whoami,
    #[command(subcommand)]
    Routines(RoutineCommand),
    #[command(subcommand)]
    Products(ProductCommand),
    #[command(subcommand)]
    Favorites(FavoriteCommand),
    /// Checks candidate products for ingredient conflicts.
    Conflicts {
        #[arg(value_delimiter = ',', required = true)]
        product_ids: Vec<i64>,
    },
    /// Replays frames from a file, one payload per line, through a scan session.
    Scan {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        torch: bool,
        /// Request the front camera instead of the rear one.
        #[arg(long)]
        front: bool,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand, Debug)]
enum RoutineCommand {
    List {
        #[arg(long = "type")]
        routine_type: Option<RoutineType>,
    },
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "morning")]
        routine_type: RoutineType,
        #[arg(long, default_value = "08:00")]
        time: ScheduleTime,
        /// Candidate product ids in step order.
        #[arg(long, value_delimiter = ',', required = true)]
        products: Vec<i64>,
        #[arg(long)]
        disabled: bool,
        /// Create even when the selected products conflict.
        #[arg(long)]
        force: bool,
    },
    Toggle {
        id: i64,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    Step {
        routine_id: i64,
        product_id: i64,
    },
    Complete {
        id: i64,
    },
    ResetProgress {
        id: i64,
    },
    ResetSamples,
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    Search { query: String },
    Show { id: i64 },
}

#[derive(Subcommand, Debug)]
enum FavoriteCommand {
    List,
    Add { id: i64 },
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = config::load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let cli = Cli::parse();
    match run(cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// Core failures are printed as a `{code, message}` notice; anything else as its context chain.
fn report_error(err: &anyhow::Error) {
    let Some(core) = err.downcast_ref::<CoreError>() else {
        eprintln!("error: {err:#}");
        return;
    };
    let notice = ErrorNotice::from(core);
    match serde_json::to_string(&notice) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("error: {}", notice.message),
    }
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let database_url = cli
        .database_url
        .as_deref()
        .map(config::normalize_database_url)
        .unwrap_or_else(|| settings.database_url.clone());
    let storage = Storage::new(&database_url).await?;
    info!(database_url = %database_url, "storage ready");

    let catalog = SampleCatalog::new();

    match cli.command {
        Command::Login { username, password } => {
            let mut session = SessionContext::load(storage).await?;
            let user = session.login(&username, &password, Utc::now()).await?;
            println!("signed in as {} <{}>", user.name, user.email);
        }
        Command::Signup {
            email,
            password,
            confirmation,
        } => {
            let mut session = SessionContext::load(storage).await?;
            let user = session
                .signup(&email, &password, &confirmation, Utc::now())
                .await?;
            println!("account created for {}", user.name);
        }
        Command::Logout => {
            let mut session = SessionContext::load(storage).await?;
            session.logout().await?;
            println!("signed out");
        }
        Command::Whoami => {
            let session = SessionContext::load(storage).await?;
            match session.current_user() {
                Some(user) => println!("{}", serde_json::to_string_pretty(user)?),
                None => println!("not signed in"),
            }
        }
        Command::Routines(command) => run_routine_command(storage, &catalog, command).await?,
        Command::Products(ProductCommand::Search { query }) => {
            for product in catalog.search_products(&query) {
                println!("{}\t{}\t{}", product.id, product.brand, product.name);
            }
        }
        Command::Products(ProductCommand::Show { id }) => {
            let product = catalog
                .get_product_by_id(ProductId(id))
                .with_context(|| format!("product {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }
        Command::Favorites(command) => {
            let mut favorites = FavoritesLibrary::load(storage).await?;
            match command {
                FavoriteCommand::List => {
                    for product in favorites.list() {
                        println!("{}\t{}", product.id, product.name);
                    }
                }
                FavoriteCommand::Add { id } => {
                    let product = catalog
                        .get_product_by_id(ProductId(id))
                        .with_context(|| format!("product {id} not found"))?;
                    if favorites.add(product).await? {
                        println!("added product {id} to favorites");
                    } else {
                        println!("product {id} is already a favorite");
                    }
                }
                FavoriteCommand::Remove { id } => {
                    if favorites.remove(ProductId(id)).await? {
                        println!("removed product {id} from favorites");
                    } else {
                        println!("product {id} is not a favorite");
                    }
                }
            }
        }
        Command::Conflicts { product_ids } => {
            let selected = select_candidates(&catalog, &product_ids)?;
            let conflicts = detect_conflicts(&selected);
            if conflicts.is_empty() {
                println!("no conflicts");
            }
            for conflict in conflicts {
                println!("{conflict}");
            }
            for warning in conflict_warnings(&selected) {
                println!("warning: {warning}");
            }
        }
        Command::Scan {
            frames,
            torch,
            front,
            timeout_secs,
        } => {
            let constraints = CameraConstraints {
                facing_mode: if front {
                    FacingMode::User
                } else {
                    FacingMode::Environment
                },
                ideal_width: settings.camera_width,
                ideal_height: settings.camera_height,
            };
            run_scan(&catalog, frames, torch, constraints, timeout_secs).await?;
        }
    }

    Ok(())
}

async fn run_routine_command(
    storage: Storage,
    catalog: &SampleCatalog,
    command: RoutineCommand,
) -> Result<()> {
    let mut manager = RoutineStateManager::load(storage).await?;

    match command {
        RoutineCommand::List { routine_type } => {
            let types = match routine_type {
                Some(routine_type) => vec![routine_type],
                None => RoutineType::ALL.to_vec(),
            };
            for routine_type in types {
                println!("{routine_type}:");
                for routine in manager.list_routines(routine_type) {
                    let progress = manager.progress(routine.id)?;
                    println!(
                        "  {}\t{}\t{}\t{}\t{}%\tstreak {}",
                        routine.id,
                        routine.name,
                        routine.time,
                        if routine.enabled { "on" } else { "off" },
                        progress.rounded_percentage(),
                        routine.streak
                    );
                }
            }
        }
        RoutineCommand::Show { id } => {
            let id = RoutineId(id);
            let routine = manager
                .routine(id)
                .with_context(|| format!("routine {id} not found"))?;
            print_routine(routine, manager.completed_steps(id));
            let progress = manager.progress(id)?;
            println!(
                "progress: {}/{} ({}%){}",
                progress.completed_count,
                progress.step_count,
                progress.rounded_percentage(),
                if progress.is_completed {
                    ", complete"
                } else {
                    ""
                }
            );
        }
        RoutineCommand::Create {
            name,
            routine_type,
            time,
            products,
            disabled,
            force,
        } => {
            let selected = select_candidates(catalog, &products)?;
            let conflicts = detect_conflicts(&selected);
            if !conflicts.is_empty() && !force {
                for conflict in &conflicts {
                    eprintln!("{conflict}");
                }
                bail!("selected products conflict; pass --force to create anyway");
            }
            let id = manager
                .create_routine(NewRoutine {
                    name,
                    routine_type,
                    steps: steps_from_candidates(&selected),
                    time,
                    enabled: !disabled,
                })
                .await?;
            println!("created routine {id}");
        }
        RoutineCommand::Toggle { id } => {
            let enabled = manager.toggle_routine(RoutineId(id)).await?;
            println!(
                "routine {id} {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        RoutineCommand::Delete { id, yes } => {
            if !yes {
                bail!("deleting routine {id} cannot be undone; pass --yes to confirm");
            }
            if manager.delete_routine(RoutineId(id)).await? {
                println!("deleted routine {id}");
            } else {
                println!("routine {id} does not exist");
            }
        }
        RoutineCommand::Step {
            routine_id,
            product_id,
        } => {
            let routine_id = RoutineId(routine_id);
            let done = manager
                .toggle_step_completion(routine_id, ProductId(product_id))
                .await?;
            let progress = manager.progress(routine_id)?;
            println!(
                "step {product_id} {}; {}% complete",
                if done { "done" } else { "not done" },
                progress.rounded_percentage()
            );
        }
        RoutineCommand::Complete { id } => {
            let id = RoutineId(id);
            manager.mark_all_complete(id).await?;
            let streak = manager.increment_streak(id).await?;
            manager.mark_used(id, Utc::now()).await?;
            println!("routine {id} complete; streak {streak}");
        }
        RoutineCommand::ResetProgress { id } => {
            manager.reset_progress(RoutineId(id)).await?;
            println!("progress cleared for routine {id}");
        }
        RoutineCommand::ResetSamples => {
            manager.reset_to_samples().await?;
            println!("sample routines restored");
        }
    }

    Ok(())
}

fn select_candidates(
    catalog: &SampleCatalog,
    ids: &[i64],
) -> Result<Vec<CandidateProduct>> {
    let ids: Vec<ProductId> = ids.iter().copied().map(ProductId).collect();
    let selected = catalog.candidates_by_ids(&ids);
    if let Some(missing) = ids
        .iter()
        .find(|id| !selected.iter().any(|candidate| candidate.id == **id))
    {
        bail!("no candidate product with id {missing}");
    }
    Ok(selected)
}

fn print_routine(routine: &Routine, completed: &[ProductId]) {
    println!(
        "{} ({}, {}, {})",
        routine.name,
        routine.routine_type,
        routine.time,
        if routine.enabled { "enabled" } else { "disabled" }
    );
    if let Some(last_used) = routine.last_used {
        println!("last used {}", last_used.to_rfc3339());
    }
    for step in routine.ordered_steps() {
        let mark = if completed.contains(&step.product_id) {
            "x"
        } else {
            " "
        };
        println!(
            "  [{mark}] {}. {} (product {}) {}",
            step.order, step.category, step.product_id, step.instructions
        );
    }
}

async fn run_scan(
    catalog: &SampleCatalog,
    frames: PathBuf,
    torch: bool,
    constraints: CameraConstraints,
    timeout_secs: u64,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&frames)
        .await
        .with_context(|| format!("failed to read frames from '{}'", frames.display()))?;
    let camera = Arc::new(ScriptedCamera::from_payloads(raw.lines()).with_torch(torch));
    let (handle, _task) = ScanService::spawn(camera, Arc::new(Utf8PayloadDecoder), constraints);
    let mut notifications = handle.subscribe();
    handle.start()?;

    let outcome = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        wait_for_payload(&handle, &mut notifications, torch),
    )
    .await;

    let payload = match outcome {
        Ok(result) => result?,
        Err(_) => {
            handle.stop()?;
            bail!("no barcode found within {timeout_secs}s");
        }
    };

    println!("scanned {payload}");
    let product = payload
        .parse::<i64>()
        .ok()
        .and_then(|id| catalog.get_product_by_id(ProductId(id)));
    match product {
        Some(product) => println!("{} by {}", product.name, product.brand),
        None => println!("no product matches this code"),
    }
    Ok(())
}

async fn wait_for_payload(
    handle: &ScanHandle,
    notifications: &mut broadcast::Receiver<ScanNotification>,
    torch: bool,
) -> Result<String> {
    loop {
        match notifications.recv().await {
            Ok(ScanNotification::StateChanged(ScanState::Scanning)) => {
                if torch {
                    handle.toggle_torch()?;
                }
            }
            Ok(ScanNotification::StateChanged(ScanState::Failed { message })) => {
                bail!("scan failed: {message}");
            }
            Ok(ScanNotification::Decoded { payload }) => return Ok(payload),
            Ok(ScanNotification::TorchChanged(on)) => {
                println!("torch {}", if on { "on" } else { "off" });
            }
            Ok(ScanNotification::StateChanged(_)) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("scan service stopped"),
        }
    }
}
