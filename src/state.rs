/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - 起動時に一度だけ組み立て、handler には Clone で渡す (中身は Arc)
 */
use std::sync::Arc;

use crate::services::auth::IssuanceService;

#[derive(Clone, Debug)]
pub struct AppState {
    pub issuance: Arc<IssuanceService>,
}

impl AppState {
    pub fn new(issuance: Arc<IssuanceService>) -> Self {
        Self { issuance }
    }
}
