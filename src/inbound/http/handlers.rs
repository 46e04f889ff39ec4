pub mod admin;
pub mod attachments;
pub mod domains;
pub mod health_check;
pub mod history;
pub mod send;
pub mod webhook;

pub use admin::{
    create_api_key, deactivate_api_key, delete_api_key, invalidate_api_keys, list_api_keys,
    update_api_key,
};
pub use attachments::{download_attachment, list_attachments, refetch_received};
pub use domains::list_domains;
pub use health_check::health_check;
pub use history::{get_received, list_received, list_sent, stats};
pub use send::{send, send_batch};
pub use webhook::webhook;
