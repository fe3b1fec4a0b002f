pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod downloads;
pub mod gateway;
pub mod humanize;
pub mod intercept;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod storage;
