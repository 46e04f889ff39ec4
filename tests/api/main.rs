mod admin;
mod batch;
mod health_check;
mod helpers;
mod history;
mod send;
mod webhook;
