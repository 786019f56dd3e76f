use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tenant_maintenance::config::MaintenanceConfig;
use tenant_maintenance::error::AppError;
use tenant_maintenance::workflows::maintenance::{
    DirectoryError, IssueCategory, MaintenanceRepository, MaintenanceRequest,
    MaintenanceServiceError, NotificationError, NotificationPublisher, RepositoryError, RequestId,
    RequestLifecycleService, RequestStatus, StaffAssignmentPool, StaffDirectory, StaffId,
    StaffMember, StatusNotification, TenantId,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MaintenanceService =
    RequestLifecycleService<InMemoryMaintenanceRepository, LoggingNotificationPublisher>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryMaintenanceRepository {
    records: Arc<Mutex<BTreeMap<RequestId, MaintenanceRequest>>>,
}

impl InMemoryMaintenanceRepository {
    fn matching(&self, keep: impl Fn(&MaintenanceRequest) -> bool) -> Vec<MaintenanceRequest> {
        lock(&self.records)
            .values()
            .filter(|request| keep(request))
            .cloned()
            .collect()
    }
}

impl MaintenanceRepository for InMemoryMaintenanceRepository {
    fn insert(&self, request: MaintenanceRequest) -> Result<MaintenanceRequest, RepositoryError> {
        let mut guard = lock(&self.records);
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: MaintenanceRequest) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records);
        if guard.contains_key(&request.id) {
            guard.insert(request.id.clone(), request);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<MaintenanceRequest>, RepositoryError> {
        Ok(lock(&self.records).get(id).cloned())
    }

    fn for_tenant(&self, tenant: &TenantId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.matching(|request| &request.tenant_id == tenant))
    }

    fn for_staff(&self, staff: &StaffId) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.matching(|request| request.is_assigned_to(staff)))
    }

    fn with_status(
        &self,
        status: RequestStatus,
    ) -> Result<Vec<MaintenanceRequest>, RepositoryError> {
        Ok(self.matching(|request| request.status == status))
    }
}

/// Stand-in for the e-mail/SMS relay: logs each status update and keeps a copy.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationPublisher {
    sent: Arc<Mutex<Vec<StatusNotification>>>,
}

impl NotificationPublisher for LoggingNotificationPublisher {
    fn publish(&self, notification: StatusNotification) -> Result<(), NotificationError> {
        info!(
            recipient = %notification.recipient,
            request_id = %notification.request_id,
            status = %notification.status,
            "tenant status notification queued"
        );
        lock(&self.sent).push(notification);
        Ok(())
    }
}

impl LoggingNotificationPublisher {
    pub(crate) fn sent(&self) -> Vec<StatusNotification> {
        lock(&self.sent).clone()
    }
}

/// Roster entry as written in a seed file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StaffSeed {
    pub(crate) id: String,
    pub(crate) display_name: String,
    #[serde(default)]
    pub(crate) max_capacity: Option<u32>,
    #[serde(default = "default_available")]
    pub(crate) available: bool,
}

fn default_available() -> bool {
    true
}

/// Staff directory backed by seed entries; missing capacities fall back to config.
#[derive(Debug, Clone)]
pub(crate) struct SeedStaffDirectory {
    seeds: Vec<StaffSeed>,
    default_capacity: u32,
}

impl SeedStaffDirectory {
    pub(crate) fn new(seeds: Vec<StaffSeed>, config: &MaintenanceConfig) -> Self {
        Self {
            seeds,
            default_capacity: config.default_staff_capacity,
        }
    }

    pub(crate) fn builtin(config: &MaintenanceConfig) -> Self {
        let seed = |id: &str, display_name: &str, max_capacity: Option<u32>| StaffSeed {
            id: id.to_string(),
            display_name: display_name.to_string(),
            max_capacity,
            available: true,
        };

        Self::new(
            vec![
                seed("tech-avery", "Avery Chen (plumbing)", Some(3)),
                seed("tech-blake", "Blake Moreno (electrical)", Some(2)),
                seed("tech-casey", "Casey Patel (general)", None),
            ],
            config,
        )
    }

    pub(crate) fn from_json_str(raw: &str, config: &MaintenanceConfig) -> serde_json::Result<Self> {
        let seeds: Vec<StaffSeed> = serde_json::from_str(raw)?;
        Ok(Self::new(seeds, config))
    }

    pub(crate) fn from_json_file(
        path: &Path,
        config: &MaintenanceConfig,
    ) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw, config).map_err(|err| AppError::Io(err.into()))
    }
}

impl StaffDirectory for SeedStaffDirectory {
    fn roster(&self) -> Result<Vec<StaffMember>, DirectoryError> {
        Ok(self
            .seeds
            .iter()
            .map(|seed| {
                let mut member = StaffMember::new(
                    StaffId(seed.id.clone()),
                    seed.display_name.clone(),
                    seed.max_capacity.unwrap_or(self.default_capacity),
                );
                member.available = seed.available;
                member
            })
            .collect())
    }
}

/// Wire the lifecycle service to in-memory storage and a pool seeded from `directory`.
pub(crate) fn assemble_service<D>(
    directory: &D,
    config: MaintenanceConfig,
) -> Result<(Arc<MaintenanceService>, LoggingNotificationPublisher), AppError>
where
    D: StaffDirectory,
{
    let pool =
        StaffAssignmentPool::from_directory(directory).map_err(MaintenanceServiceError::from)?;
    info!(staff = pool.members().len(), "assignment pool seeded");

    let notifications = LoggingNotificationPublisher::default();
    let service = RequestLifecycleService::new(
        Arc::new(InMemoryMaintenanceRepository::default()),
        Arc::new(notifications.clone()),
        pool,
        config,
    );
    Ok((Arc::new(service), notifications))
}

/// Accepts the snake_case category names used on the wire, e.g. `pest_control`.
pub(crate) fn parse_category(raw: &str) -> Result<IssueCategory, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("unknown issue category '{raw}'"))
}
