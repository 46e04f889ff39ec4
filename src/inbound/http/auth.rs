pub mod basic;
pub mod webhook_signature;
