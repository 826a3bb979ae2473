//! Client-side coordination for a Kanban task and employee board

pub mod api;
pub mod audit;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod drag;
pub mod filter;
pub mod gateway;
pub mod labels;
pub mod migrate;
pub mod models;
pub mod permissions;
pub mod retry;
pub mod storage;
