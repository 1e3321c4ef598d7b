//! On-disk session state and settings.
//!
//! Only the plan and pin collections are stored. View state is rebuilt
//! fresh on every load.

pub mod config;

pub use config::{ConfigError, Settings};

use directories::ProjectDirs;
use inspect_model::{InspectResult, Inspection, PinStore, PlanRegistry, ZoomLimits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("session file has schema version {found}, expected {SESSION_SCHEMA_VERSION}")]
    UnsupportedVersion { found: u32 },
    #[error("stored pin {pin} references missing plan {plan}")]
    DanglingPin { pin: u64, plan: u64 },
    #[error("stored active plan {plan} does not exist")]
    MissingActivePlan { plan: u64 },
    #[error("stored pin {pin} lies outside the page at ({x}, {y})")]
    PinOutOfRange { pin: u64, x: f64, y: f64 },
    #[error("stored {kind} {id} is out of creation order")]
    OutOfOrder { kind: &'static str, id: u64 },
    #[error("stored {counter} counter {stored} is behind {highest}")]
    CounterBehind { counter: &'static str, stored: u64, highest: u64 },
}

/// The persisted part of an inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub plans: PlanRegistry,
    pub pins: PinStore,
}

impl SessionSnapshot {
    pub fn capture(inspection: &Inspection) -> Self {
        Self { plans: inspection.plans().clone(), pins: inspection.pins().clone() }
    }

    pub fn into_inspection(self, limits: ZoomLimits) -> InspectResult<Inspection> {
        Inspection::from_parts(self.plans, self.pins, limits)
    }

    /// Rejects collections the model could never have produced: dangling
    /// references, positions off the page, ids or numbers out of creation
    /// order, and id or number counters that would hand out a value again.
    fn check_integrity(&self) -> Result<(), StorageError> {
        if let Some(plan) = self.plans.active_id() {
            if !self.plans.contains(plan) {
                return Err(StorageError::MissingActivePlan { plan: plan.0 });
            }
        }

        let plan_ids: Vec<u64> = self.plans.all().iter().map(|plan| plan.id.0).collect();
        check_increasing("plan", &plan_ids)?;
        check_counter("plan id", self.plans.last_id(), plan_ids.last().copied())?;

        for pin in self.pins.all() {
            if !self.plans.contains(pin.plan_id()) {
                return Err(StorageError::DanglingPin { pin: pin.id().0, plan: pin.plan_id().0 });
            }
            let position = pin.position();
            if !position.is_in_range() {
                return Err(StorageError::PinOutOfRange {
                    pin: pin.id().0,
                    x: position.x,
                    y: position.y,
                });
            }
        }

        let pin_ids: Vec<u64> = self.pins.all().iter().map(|pin| pin.id().0).collect();
        let numbers: Vec<u64> =
            self.pins.all().iter().map(|pin| u64::from(pin.number())).collect();
        check_increasing("pin", &pin_ids)?;
        check_increasing("pin number", &numbers)?;
        check_counter("pin id", self.pins.last_id(), pin_ids.last().copied())?;
        check_counter("pin number", u64::from(self.pins.last_issued()), numbers.last().copied())
    }
}

fn check_increasing(kind: &'static str, ids: &[u64]) -> Result<(), StorageError> {
    match ids.windows(2).find(|pair| pair[1] <= pair[0]) {
        Some(pair) => Err(StorageError::OutOfOrder { kind, id: pair[1] }),
        None => Ok(()),
    }
}

fn check_counter(
    counter: &'static str,
    stored: u64,
    highest: Option<u64>,
) -> Result<(), StorageError> {
    match highest {
        Some(highest) if highest > stored => {
            Err(StorageError::CounterBehind { counter, stored, highest })
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionEnvelope {
    version: u32,
    session: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        Ok(Self { root: default_data_dir()? })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns an empty session when nothing has been saved yet.
    pub fn load_session(&self) -> Result<SessionSnapshot, StorageError> {
        let path = self.session_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no stored session");
            return Ok(SessionSnapshot::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: SessionEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != SESSION_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion { found: envelope.version });
        }

        envelope.session.check_integrity()?;
        tracing::debug!(
            plans = envelope.session.plans.len(),
            pins = envelope.session.pins.len(),
            "loaded session"
        );

        Ok(envelope.session)
    }

    /// Writes through a temporary file so a crash never leaves a torn file.
    pub fn save_session(&self, session: &SessionSnapshot) -> Result<PathBuf, StorageError> {
        session.check_integrity()?;
        fs::create_dir_all(&self.root)?;

        let envelope =
            SessionEnvelope { version: SESSION_SCHEMA_VERSION, session: session.clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let path = self.session_path();
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(path = %path.display(), "saved session");
        Ok(path)
    }

    pub fn session_path(&self) -> PathBuf {
        self.root.join("session.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.toml")
    }
}

/// Picks the directory holding the session and settings files: `explicit`
/// first, then `SITEINSPECT_DATA_DIR` from `lookup`, then the platform data
/// directory.
pub fn resolve_data_dir<F>(explicit: Option<&Path>, lookup: F) -> Result<PathBuf, StorageError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    match lookup(config::ENV_DATA_DIR).filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => default_data_dir(),
    }
}

pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    let dirs = ProjectDirs::from("dev", "SiteInspect", "SiteInspect")
        .ok_or(StorageError::NoDataDirectory)?;

    Ok(dirs.data_local_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspect_model::{Action, Category, PlanUpload, SourceRef, SurfaceBounds};
    use serde_json::{json, Value};

    fn sample_inspection() -> Inspection {
        let mut inspection = Inspection::default();
        inspection
            .apply(Action::RegisterPlans(vec![
                PlanUpload::new("siteA.pdf", SourceRef::new("/plans/siteA.pdf")),
                PlanUpload::new("siteB.pdf", SourceRef::new("/plans/siteB.pdf")),
            ]))
            .expect("registration always succeeds");
        inspection.apply(Action::TogglePlacement).expect("plan view");
        inspection
            .apply(Action::ClickSurface {
                pointer_x: 50.0,
                pointer_y: 100.0,
                bounds: SurfaceBounds::sized(200.0, 400.0),
            })
            .expect("armed click");
        inspection.apply(Action::SetCategory("Defect".to_owned())).expect("editor open");
        inspection.apply(Action::SetDescription("spalling".to_owned())).expect("editor open");
        inspection.apply(Action::Save).expect("editor open");
        inspection
    }

    #[test]
    fn session_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let snapshot = SessionSnapshot::capture(&sample_inspection());
        store.save_session(&snapshot).expect("save should succeed");
        let loaded = store.load_session().expect("load should succeed");

        assert_eq!(loaded, snapshot);
        let pin = &loaded.pins.all()[0];
        assert_eq!(pin.category, Category::Defect);
        assert_eq!(pin.description, "spalling");
        assert_eq!(loaded.plans.active_plan().map(|plan| plan.name.as_str()), Some("siteA.pdf"));
    }

    #[test]
    fn numbering_continues_after_reload() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        store
            .save_session(&SessionSnapshot::capture(&sample_inspection()))
            .expect("save should succeed");

        let mut inspection = store
            .load_session()
            .expect("load should succeed")
            .into_inspection(ZoomLimits::default())
            .expect("default limits are valid");
        inspection.apply(Action::TogglePlacement).expect("plan view");
        inspection
            .apply(Action::ClickSurface {
                pointer_x: 1.0,
                pointer_y: 1.0,
                bounds: SurfaceBounds::sized(10.0, 10.0),
            })
            .expect("armed click");

        assert_eq!(inspection.selected_pin().map(|pin| pin.number()), Some(2));
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_session().expect("load should succeed");
        assert_eq!(loaded, SessionSnapshot::default());
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let envelope = SessionEnvelope { version: 99, session: SessionSnapshot::default() };
        fs::write(store.session_path(), serde_json::to_vec(&envelope).expect("serializes"))
            .expect("write should succeed");

        let err = store.load_session().expect_err("version 99 is unknown");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 99 }));
    }

    #[test]
    fn rejects_pins_without_plans() {
        let mut snapshot = SessionSnapshot::capture(&sample_inspection());
        snapshot.plans = PlanRegistry::new();

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let err = store.save_session(&snapshot).expect_err("pin 1 has no plan");

        assert!(matches!(err, StorageError::DanglingPin { pin: 1, plan: 1 }));
        assert!(!store.session_path().exists());
    }

    #[test]
    fn explicit_data_dir_wins_over_environment() {
        let explicit = Path::new("/from/flag");
        let dir = resolve_data_dir(Some(explicit), |_| Some("/from/env".to_owned()))
            .expect("explicit dir always resolves");
        assert_eq!(dir, PathBuf::from("/from/flag"));
    }

    #[test]
    fn environment_data_dir_skips_platform_lookup() {
        let dir = resolve_data_dir(None, |key| {
            (key == config::ENV_DATA_DIR).then(|| "/from/env".to_owned())
        })
        .expect("env dir resolves");
        assert_eq!(dir, PathBuf::from("/from/env"));
    }

    fn load_tampered(edit: impl FnOnce(&mut Value)) -> Result<SessionSnapshot, StorageError> {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        store
            .save_session(&SessionSnapshot::capture(&sample_inspection()))
            .expect("save should succeed");

        let bytes = fs::read(store.session_path()).expect("session file exists");
        let mut envelope: Value = serde_json::from_slice(&bytes).expect("session is json");
        edit(&mut envelope["session"]);
        fs::write(store.session_path(), serde_json::to_vec(&envelope).expect("serializes"))
            .expect("write should succeed");

        store.load_session()
    }

    #[test]
    fn rejects_number_counter_behind_stored_pins() {
        let err = load_tampered(|session| session["pins"]["issued"] = json!(0))
            .expect_err("number 1 would be issued again");

        assert!(matches!(
            err,
            StorageError::CounterBehind { counter: "pin number", stored: 0, highest: 1 }
        ));
    }

    #[test]
    fn rejects_pin_id_counter_behind_stored_pins() {
        let err = load_tampered(|session| session["pins"]["next_pin_id"] = json!(0))
            .expect_err("pin id 1 would be issued again");

        assert!(matches!(err, StorageError::CounterBehind { counter: "pin id", .. }));
    }

    #[test]
    fn rejects_position_off_the_page() {
        let err = load_tampered(|session| {
            session["pins"]["pins"][0]["position"]["x"] = json!(500.0);
        })
        .expect_err("x is above 100");

        assert!(matches!(err, StorageError::PinOutOfRange { pin: 1, .. }));
    }

    #[test]
    fn rejects_repeated_pin_numbers() {
        let err = load_tampered(|session| {
            let pin = session["pins"]["pins"][0].clone();
            if let Some(pins) = session["pins"]["pins"].as_array_mut() {
                pins.push(pin);
            }
        })
        .expect_err("the same pin appears twice");

        assert!(matches!(err, StorageError::OutOfOrder { kind: "pin", id: 1 }));
    }

    #[test]
    fn rejects_missing_active_plan() {
        let err = load_tampered(|session| session["plans"]["active"] = json!(99))
            .expect_err("plan 99 was never registered");

        assert!(matches!(err, StorageError::MissingActivePlan { plan: 99 }));
    }

    #[test]
    fn rejects_plan_id_counter_behind_stored_plans() {
        let err = load_tampered(|session| session["plans"]["next_plan_id"] = json!(1))
            .expect_err("plan id 2 would be issued again");

        assert!(matches!(
            err,
            StorageError::CounterBehind { counter: "plan id", stored: 1, highest: 2 }
        ));
    }
}
