//! Real-time market-data ingestion and technical-signal computation.
//!
//! The crate maintains a live multiplexed price feed with automatic
//! reconnection and REST fallback, aggregates ticks into rolling candle
//! windows, and recomputes technical indicators (RSI, MACD, Bollinger Bands,
//! Stochastic) plus a composite trading signal and risk profile on every
//! completed candle. It is a library consumed by presentation and
//! order-management layers; it renders, persists, and authenticates nothing.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
