use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Paging and filtering parameters of a history listing, as sent by clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u32,
    pub domain: Option<String>,
}

impl From<HistoryParams> for HistoryQuery {
    fn from(params: HistoryParams) -> Self {
        Self {
            limit: params
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            offset: params.offset.unwrap_or(0),
            domain: params
                .domain
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        HistoryParams::default().into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MailStats {
    pub sent_total: u64,
    pub sent_by_status: BTreeMap<String, u64>,
    pub received_total: u64,
    pub received_pending_content: u64,
}
