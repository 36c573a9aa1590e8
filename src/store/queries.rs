//! Query functions organized by table.

pub mod activities;
pub mod entities;
pub mod notifications;
pub mod reference;
pub mod settings;
pub mod sync_queue;
pub mod translations;
