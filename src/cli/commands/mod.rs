use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;

use crate::config::{config, CampTrackerConfig, StoreBackend};
use crate::models::{Beneficiary, BeneficiaryRef};
use crate::objects::{LocalObjectStore, ObjectStore};
use crate::scope::{EventScope, EventSelector};
use crate::store::{InMemoryRecordStore, RecordStore};
#[cfg(feature = "database")]
use crate::store::SqliteRecordStore;
use crate::tracker::{StageTracker, TrackerError, TransitionOutcome};

pub mod desk;
pub mod edit;
pub mod event;
pub mod register;
pub mod report;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Everything a command needs: the tracker and the remembered event.
pub struct Workspace {
    pub tracker: StageTracker,
    pub selector: EventSelector,
    #[cfg(feature = "database")]
    database: Option<Arc<SqliteRecordStore>>,
}

impl Workspace {
    pub async fn open(config: &CampTrackerConfig) -> Result<Self> {
        #[cfg(feature = "database")]
        let mut database = None;

        let records: Arc<dyn RecordStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(InMemoryRecordStore::new(config.store.enforce_transitions)),
            #[cfg(feature = "database")]
            StoreBackend::Sqlite => {
                let db_config = config
                    .database
                    .as_ref()
                    .context("store.backend is sqlite but no [database] section is configured")?;
                if let Some(parent) = sqlite_file_parent(&db_config.url) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let store = Arc::new(
                    SqliteRecordStore::from_config(db_config, config.store.enforce_transitions).await?,
                );
                database = Some(store.clone());
                store
            }
            #[cfg(not(feature = "database"))]
            StoreBackend::Sqlite => {
                anyhow::bail!("store.backend is sqlite but this build lacks the 'database' feature")
            }
        };

        let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::from_config(&config.objects).await?);
        let tracker = StageTracker::new(
            records,
            objects,
            config.tracker.rules(),
            config.objects.max_photo_bytes,
        )
        .with_compression(config.objects.compression());

        Ok(Self {
            tracker,
            selector: EventSelector::new(&config.store.data_dir),
            #[cfg(feature = "database")]
            database,
        })
    }

    /// The selected event, checked against the record store.
    pub async fn scope(&self) -> Result<EventScope> {
        let selected = self.selector.load().await?.ok_or(TrackerError::NoEventSelected)?;
        let scope = self.tracker.open_scope(&selected.event_id).await?;
        Ok(scope)
    }

    pub async fn find(&self, scope: &EventScope, reference: &BeneficiaryRef) -> Result<Beneficiary> {
        Ok(self.tracker.find(scope, reference).await?)
    }

    pub async fn shutdown(&self) {
        #[cfg(feature = "database")]
        if let Some(database) = &self.database {
            database.shutdown().await;
        }
    }
}

#[cfg(feature = "database")]
fn sqlite_file_parent(url: &str) -> Option<&std::path::Path> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    if path.starts_with(':') {
        return None;
    }
    std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}

pub async fn with_workspace<F, Fut, R>(f: F) -> Result<R>
where
    F: FnOnce(Arc<Workspace>) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    // Progress goes to stderr; stdout may carry exported JSON
    eprint!("🔄 Opening camp records... ");
    std::io::stderr().flush()?;

    let config = config()?;
    match Workspace::open(config).await {
        Ok(workspace) => {
            eprintln!("✅");
            let workspace = Arc::new(workspace);
            let result = f(workspace.clone()).await;
            workspace.shutdown().await;
            result
        }
        Err(e) => {
            eprintln!("❌ Failed to open camp records: {e:#}");
            Err(e)
        }
    }
}

pub fn print_beneficiary(b: &Beneficiary) {
    println!("📋 {} - {}", b.reg_number, b.details.name);
    println!("   🆔 {}", b.id);
    println!("   📍 Current step: {}", b.current_step.display_name());
    if !b.completed_steps.is_empty() {
        let done: Vec<&str> = b.completed_steps.iter().map(|s| s.display_name()).collect();
        println!("   ✅ Completed: {}", done.join(", "));
    }
    if let Some(father) = &b.details.father_name {
        println!("   👨 Father's name: {father}");
    }
    if let Some(age) = b.details.age {
        println!("   🎂 Age: {age}");
    }
    if let Some(phone) = &b.details.phone_number {
        println!("   📞 Phone: {phone}");
    }
    if let Some(state) = &b.details.state {
        println!("   🗺️  State: {state}");
    }
    println!("   🦿 Type of aid: {}", b.details.type_of_aid.display());
    if let Some(url) = &b.before_photo_url {
        println!("   📷 Before photo: {url}");
    }
    if let Some(m) = &b.measurement_data {
        println!("   📏 Measurement: length {}, circumference {}", m.length, m.circumference);
        if let Some(notes) = &m.notes {
            println!("      📝 {notes}");
        }
    }
    if let Some(f) = &b.fitment_data {
        println!("   🔧 Fitment: {}", f.comfort_level.description());
        if let Some(adjustments) = &f.adjustments_made {
            println!("      🛠️  Adjustments: {adjustments}");
        }
        if let Some(notes) = &f.fitment_notes {
            println!("      📝 {notes}");
        }
    }
    if b.extra_items.is_some() {
        println!("   🎁 Extra items: {}", b.extra_items_text());
    }
    if let Some(url) = &b.after_photo_url {
        println!("   📸 After photo: {url}");
    }
    if let Some(reason) = &b.cancel_reason {
        println!("   🚫 Cancel reason: {reason}");
    }
    for (step, volunteer) in &b.step_volunteers {
        println!("   🙋 {}: {}", step.display_name(), volunteer);
    }
}

pub fn print_outcome(outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::Applied { beneficiary, from, to } => {
            println!(
                "✅ {} moved from {} to {}",
                beneficiary.reg_number,
                from.display_name(),
                to.display_name()
            );
            match to.desk_number() {
                Some(desk) => println!("   👉 Next: desk {} ({})", desk, to.display_name()),
                None => println!("   🏁 Journey finished: {}", to.display_name()),
            }
        }
        TransitionOutcome::AlreadyApplied { beneficiary, step } => {
            println!(
                "ℹ️  {} already finished {} (now at {}); nothing changed",
                beneficiary.reg_number,
                step.display_name(),
                beneficiary.current_step.display_name()
            );
        }
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🦿 Camp Tracker - Limb Distribution Camp Stage Tracking");
    println!();
    println!("To get started:");
    println!("  📅 camp-tracker event create --name 'Jaipur Camp' --date 2025-02-14 --select");
    println!("  📝 camp-tracker register --name 'Asha Devi' --aid left_below_knee");
    println!("  📋 camp-tracker queue before_photo   # See who is waiting at a desk");
    println!();
    println!("Desk commands:");
    println!("  📷 camp-tracker photo REG-0001 before photo.jpg");
    println!("  📏 camp-tracker measure REG-0001 --length '42 cm' --circumference '28 cm' --volunteer Ravi");
    println!("  🔧 camp-tracker fit REG-0001 --comfort good --volunteer Ravi");
    println!("  🎁 camp-tracker items REG-0001 stick=2 --volunteer Ravi");
    println!();
    println!("Reports:");
    println!("  📊 camp-tracker summary");
    println!("  📤 camp-tracker export --from 2025-02-01 --to 2025-02-28");
    Ok(())
}
