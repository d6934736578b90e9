pub mod claims;
pub mod payments;

use crate::database::claim_repository::ClaimRepository;
use crate::database::payment_repository::PaymentRepository;
use crate::health::HealthChecker;
use crate::services::callback_processor::CallbackProcessor;
use crate::services::claim_gate::ClaimService;
use crate::services::payment_initiation::PaymentInitiationService;
use std::sync::Arc;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub initiation: Arc<PaymentInitiationService>,
    pub callbacks: Arc<CallbackProcessor>,
    pub claims: Arc<ClaimService>,
    pub payments: Arc<PaymentRepository>,
    pub claim_repo: Arc<ClaimRepository>,
    pub health: HealthChecker,
}
