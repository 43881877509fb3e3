pub mod chat;
pub mod claude_api;
pub mod config;
pub mod draft_cleanup;
pub mod drafts;
pub mod identity;
pub mod object_store;
pub mod profile;
pub mod recipe_generator;
pub mod recipes;
pub mod validation;
