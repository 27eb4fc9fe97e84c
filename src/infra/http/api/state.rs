use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::database::DatabaseService;
use crate::application::history::HistoryService;
use crate::application::profile::ProfileService;
use crate::application::repos::PushSubscriptionsRepo;
use crate::application::tasks::TaskService;
use crate::infra::assets::StaticFiles;
use crate::infra::uploads::UploadStorage;

use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub profile: Arc<ProfileService>,
    pub tasks: Arc<TaskService>,
    pub history: HistoryService,
    pub database: Arc<DatabaseService>,
    pub push: Arc<dyn PushSubscriptionsRepo>,
    pub uploads: Arc<UploadStorage>,
    pub files: StaticFiles,
    pub rate_limiter: Arc<ApiRateLimiter>,
    /// Bearer token for `/api/admin/`; those routes answer 403 when unset.
    pub admin_token: Option<Arc<str>>,
    pub body_limit: usize,
}
