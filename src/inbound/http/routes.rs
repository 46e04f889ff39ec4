use crate::domain::credentials::ports::CredentialService;
use crate::domain::history::ports::HistoryService;
use crate::domain::inbound::ports::InboundService;
use crate::domain::outbound::ports::DispatchService;
use crate::inbound::http::handlers::{
    create_api_key, deactivate_api_key, delete_api_key, download_attachment, get_received,
    health_check, invalidate_api_keys, list_api_keys, list_attachments, list_domains,
    list_received, list_sent, refetch_received, send, send_batch, stats, update_api_key, webhook,
};
use actix_web::{web, FromRequest, Handler, Responder, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    fn route(self) -> Route {
        match self {
            RouteMethod::Get => web::get(),
            RouteMethod::Post => web::post(),
            RouteMethod::Put => web::put(),
            RouteMethod::Delete => web::delete(),
        }
    }
}

pub struct RouteEntry {
    pub method: RouteMethod,
    pub path: &'static str,
    route: Route,
}

impl RouteEntry {
    fn new<F, Args>(method: RouteMethod, path: &'static str, handler: F) -> Self
    where
        F: Handler<Args>,
        Args: FromRequest + 'static,
        F::Output: Responder + 'static,
    {
        Self {
            method,
            path,
            route: method.route().to(handler),
        }
    }
}

/// Every exposed route, in registration order. Literal segments come before
/// parameters sharing the same prefix.
pub fn routes<CS, DS, IS, HS>() -> Vec<RouteEntry>
where
    CS: CredentialService,
    DS: DispatchService,
    IS: InboundService,
    HS: HistoryService,
{
    use RouteMethod::*;

    vec![
        RouteEntry::new(Get, "/health_check", health_check),
        RouteEntry::new(Post, "/api/send", send::<DS>),
        RouteEntry::new(Post, "/api/send-batch", send_batch::<DS>),
        RouteEntry::new(Post, "/webhook", webhook::<IS>),
        RouteEntry::new(Get, "/api/domains", list_domains::<CS>),
        RouteEntry::new(Get, "/api/emails/sent", list_sent::<HS>),
        RouteEntry::new(Get, "/api/emails/received", list_received::<HS>),
        RouteEntry::new(Get, "/api/emails/received/{id}", get_received::<HS>),
        RouteEntry::new(
            Post,
            "/api/emails/received/{id}/refetch",
            refetch_received::<IS>,
        ),
        RouteEntry::new(
            Get,
            "/api/emails/received/{id}/attachments",
            list_attachments::<IS>,
        ),
        RouteEntry::new(
            Get,
            "/api/emails/received/{id}/attachments/{attachment_id}",
            download_attachment::<IS>,
        ),
        RouteEntry::new(Get, "/api/stats", stats::<HS>),
        RouteEntry::new(Get, "/api/admin/api-keys", list_api_keys::<CS>),
        RouteEntry::new(Post, "/api/admin/api-keys", create_api_key::<CS>),
        RouteEntry::new(
            Post,
            "/api/admin/api-keys/invalidate",
            invalidate_api_keys::<CS>,
        ),
        RouteEntry::new(Put, "/api/admin/api-keys/{domain}", update_api_key::<CS>),
        RouteEntry::new(
            Post,
            "/api/admin/api-keys/{domain}/deactivate",
            deactivate_api_key::<CS>,
        ),
        RouteEntry::new(Delete, "/api/admin/api-keys/{domain}", delete_api_key::<CS>),
    ]
}

pub fn configure<CS, DS, IS, HS>(cfg: &mut web::ServiceConfig)
where
    CS: CredentialService,
    DS: DispatchService,
    IS: InboundService,
    HS: HistoryService,
{
    for entry in routes::<CS, DS, IS, HS>() {
        cfg.route(entry.path, entry.route);
    }
}
