use crate::domain::credentials::ports::CredentialService;
use crate::domain::history::ports::HistoryService;
use crate::domain::inbound::ports::InboundService;
use crate::domain::outbound::ports::DispatchService;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DispatchState<DS: DispatchService> {
    dispatch_service: DS,
}

#[derive(Debug, Clone)]
pub struct SharedDispatchState<DS: DispatchService>(Arc<DispatchState<DS>>);

impl<DS: DispatchService> SharedDispatchState<DS> {
    pub fn new(dispatch_service: DS) -> Self {
        Self(Arc::new(DispatchState { dispatch_service }))
    }

    pub fn dispatch_service(&self) -> &DS {
        &self.0.dispatch_service
    }
}

#[derive(Debug, Clone)]
pub struct InboundState<IS: InboundService> {
    inbound_service: IS,
}

#[derive(Debug, Clone)]
pub struct SharedInboundState<IS: InboundService>(Arc<InboundState<IS>>);

impl<IS: InboundService> SharedInboundState<IS> {
    pub fn new(inbound_service: IS) -> Self {
        Self(Arc::new(InboundState { inbound_service }))
    }

    pub fn inbound_service(&self) -> &IS {
        &self.0.inbound_service
    }
}

#[derive(Debug, Clone)]
pub struct CredentialState<CS: CredentialService> {
    credential_service: CS,
}

#[derive(Debug, Clone)]
pub struct SharedCredentialState<CS: CredentialService>(Arc<CredentialState<CS>>);

impl<CS: CredentialService> SharedCredentialState<CS> {
    pub fn new(credential_service: CS) -> Self {
        Self(Arc::new(CredentialState { credential_service }))
    }

    pub fn credential_service(&self) -> &CS {
        &self.0.credential_service
    }
}

#[derive(Debug, Clone)]
pub struct HistoryState<HS: HistoryService> {
    history_service: HS,
}

#[derive(Debug, Clone)]
pub struct SharedHistoryState<HS: HistoryService>(Arc<HistoryState<HS>>);

impl<HS: HistoryService> SharedHistoryState<HS> {
    pub fn new(history_service: HS) -> Self {
        Self(Arc::new(HistoryState { history_service }))
    }

    pub fn history_service(&self) -> &HS {
        &self.0.history_service
    }
}
